//! Ledger Store
//!
//! Durable persistence contract used by the transfer coordinator.
//!
//! # Contract
//!
//! - [`LedgerStore::create_transfer`] and [`LedgerStore::update_transfer_state`]
//!   commit independently of any open [`UnitOfWork`].
//! - [`UnitOfWork::lock_account`] takes an exclusive per-account lock that is
//!   held until the unit of work commits, rolls back or is dropped.
//! - [`UnitOfWork::commit`] makes every staged write visible at once, or none.
//! - Every state write is a CAS on the current state: a terminal state is
//!   never overwritten.
//! - A unit of work reads only through its own connection. It never borrows
//!   a second one from the pool while holding row locks.
//!
//! Implementations:
//! - [`memory::InMemoryLedger`] - per-account async mutexes (tests, demo)
//! - [`postgres::PgLedgerStore`] - PostgreSQL with `SELECT ... FOR UPDATE`

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::InMemoryLedger;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::{Account, Currency};
use crate::core_types::{AccountId, CurrencyCode, IdOutOfRange, TransferId};
use crate::transfer::state::TransferState;
use crate::transfer::types::{TransferIntent, TransferPolicy, TransferRecord};

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Account {0} is not locked by this unit of work")]
    NotLocked(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Invalid state transition for transfer {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: TransferId,
        from: TransferState,
        to: TransferState,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                StoreError::Constraint(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::InvalidRow(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<IdOutOfRange> for StoreError {
    fn from(e: IdOutOfRange) -> Self {
        StoreError::InvalidArgument(e.to_string())
    }
}

/// Atomic, all-or-nothing group of ledger writes
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock an account exclusively and read its committed state.
    ///
    /// Blocks until the lock is free. Returns `Ok(None)` if the account does
    /// not exist. Locking an account twice in the same unit of work returns
    /// the staged state without blocking.
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Look up a registered currency inside this unit of work
    async fn find_currency(&mut self, code: CurrencyCode) -> Result<Option<Currency>, StoreError>;

    /// Stage a balance write. The account must be locked by this unit of work.
    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Stage the final transfer record. Applied only if the persisted row is
    /// still PROCESSING at commit time.
    async fn save_transfer(&mut self, record: &TransferRecord) -> Result<(), StoreError>;

    /// Apply all staged writes atomically and release the locks.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discard all staged writes and release the locks.
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Ledger persistence used by the coordinator
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Uow: UnitOfWork;

    /// Open a unit of work (READ COMMITTED or stronger)
    async fn begin(&self) -> Result<Self::Uow, StoreError>;

    /// Persist a PROCESSING record and commit it immediately
    async fn create_transfer(&self, intent: &TransferIntent) -> Result<TransferRecord, StoreError>;

    /// CAS the transfer state in its own commit.
    ///
    /// Returns `Ok(false)` if the row is no longer in `expected`.
    async fn update_transfer_state(
        &self,
        id: TransferId,
        expected: TransferState,
        new_state: TransferState,
    ) -> Result<bool, StoreError>;

    /// Look up a registered currency. Not for use while a unit of work is open.
    async fn find_currency(&self, code: CurrencyCode) -> Result<Option<Currency>, StoreError>;
}

/// Durable source of named fee policies
#[async_trait]
pub trait FeePolicyStore: Send + Sync {
    async fn load_policy(&self, name: &str) -> Result<Option<TransferPolicy>, StoreError>;
}

/// Administrative surface used for seeding and inspection
#[async_trait]
pub trait LedgerAdmin: Send + Sync {
    async fn create_currency(&self, currency: &Currency) -> Result<(), StoreError>;

    /// Open an account. Rejects a negative initial balance or an unknown currency.
    async fn create_account(
        &self,
        name: &str,
        currency: CurrencyCode,
        initial_balance: Decimal,
    ) -> Result<Account, StoreError>;

    /// Insert or replace a policy
    async fn put_policy(&self, policy: &TransferPolicy) -> Result<(), StoreError>;

    /// Read the committed state of an account
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>, StoreError>;
}
