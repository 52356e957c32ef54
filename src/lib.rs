//! Money Transfer - concurrent, fee- and FX-aware ledger transfers
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, TransferId, CurrencyCode)
//! - [`money`] - Scale-4 half-up money arithmetic
//! - [`account`] - Accounts and the debit/credit guards
//! - [`transfer`] - Transfer coordinator, fee cache, FX oracle, errors
//! - [`store`] - Ledger store contract plus in-memory and PostgreSQL adapters
//! - [`seed`] - Demo reference data
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod money;
pub mod store;
pub mod transfer;

pub mod config;
pub mod logging;
pub mod seed;

// Convenient re-exports at crate root
pub use account::{Account, AccountError, Currency};
pub use core_types::{AccountId, CurrencyCode, TransferId};
pub use store::{InMemoryLedger, LedgerAdmin, LedgerStore, PgLedgerStore, StoreError};
pub use transfer::{
    FeePolicyCache, InMemoryRateOracle, RateOracle, TransferCoordinator, TransferError,
    TransferRequest, TransferState,
};
