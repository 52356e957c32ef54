//! Money Transfer
//!
//! Moves money between two ledger accounts, applying a fee and an optional
//! currency conversion.
//!
//! # State Machine
//!
//! ```text
//! PROCESSING ──→ COMPLETED
//!      │
//!      └──────→ FAILED
//! ```
//!
//! The PROCESSING row is committed before any account is locked, so every
//! attempt leaves an audit record. A terminal state is written exactly once.
//!
//! # Safety Invariants
//!
//! 1. **Ordered Locking**: accounts are locked in ascending id order
//! 2. **Check Before Mutate**: funds, FX and ceiling checks all run before the
//!    first balance write
//! 3. **Atomic Commit**: both balances and the COMPLETED record commit together
//! 4. **Independent Compensation**: FAILED is written in its own commit and never
//!    replaces the original error

pub mod coordinator;
pub mod error;
pub mod fee;
pub mod fx;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use error::{ErrorKind, TransferError};
pub use fee::{FeeError, FeePolicyCache, TRANSFER_FEE_POLICY_KEY};
pub use fx::{InMemoryRateOracle, RateOracle};
pub use state::TransferState;
pub use types::{TransferIntent, TransferPolicy, TransferRecord, TransferRequest};
