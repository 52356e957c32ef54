//! Transfer Error Types
//!
//! Two-tier taxonomy:
//! - **Business** faults are deterministic and reported verbatim to the caller.
//! - **Infrastructure** faults are logged with context and reported with an
//!   internal reason code.
//!
//! Neither tier is retried by the coordinator.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::{AccountId, CurrencyCode};
use crate::store::StoreError;

/// Fault tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Business,
    Infrastructure,
}

/// Transfer error types
///
/// Error codes are stable and safe to expose to API clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Business Errors ===
    #[error("Self transfer not allowed")]
    SelfTransfer,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("FX rate not available for {from} -> {to}")]
    FxRateMissing { from: CurrencyCode, to: CurrencyCode },

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("Receiver balance would exceed the ledger limit of {limit}")]
    BalanceLimitExceeded { limit: Decimal },

    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),

    // === Infrastructure Errors ===
    #[error("Fee calculation failed: {0}")]
    FeeCalculationFailed(String),

    #[error("Could not save transfer: {0}")]
    CouldNotPersist(String),

    #[error("Storage constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid account state: {0}")]
    InvalidAccountState(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl TransferError {
    /// Get the reason code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SelfTransfer => "SELF_TRANSFER",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::FxRateMissing { .. } => "FX_RATE_MISSING",
            TransferError::InvalidCurrency(_) => "INVALID_CURRENCY",
            TransferError::BalanceLimitExceeded { .. } => "BALANCE_LIMIT_EXCEEDED",
            TransferError::InvalidRequest(_) => "INVALID_REQUEST",
            TransferError::FeeCalculationFailed(_) => "FEE_CALCULATION_FAILED",
            TransferError::CouldNotPersist(_) => "COULD_NOT_SAVE_TRANSFER",
            TransferError::ConstraintViolation(_) => "DB_CONSTRAINT_VIOLATION",
            TransferError::InvalidAccountState(_) => "INVALID_ACCOUNT_STATE",
            TransferError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Get the fault tier
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::SelfTransfer
            | TransferError::AccountNotFound(_)
            | TransferError::InsufficientFunds { .. }
            | TransferError::FxRateMissing { .. }
            | TransferError::InvalidCurrency(_)
            | TransferError::BalanceLimitExceeded { .. }
            | TransferError::InvalidRequest(_) => ErrorKind::Business,
            TransferError::FeeCalculationFailed(_)
            | TransferError::CouldNotPersist(_)
            | TransferError::ConstraintViolation(_)
            | TransferError::InvalidAccountState(_)
            | TransferError::Unknown(_) => ErrorKind::Infrastructure,
        }
    }

    #[inline]
    pub fn is_business(&self) -> bool {
        self.kind() == ErrorKind::Business
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Constraint(msg) => TransferError::ConstraintViolation(msg),
            StoreError::InvalidRow(msg) => TransferError::InvalidAccountState(msg),
            other => TransferError::CouldNotPersist(other.to_string()),
        }
    }
}
