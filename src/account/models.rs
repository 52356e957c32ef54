//! Account and currency models
//!
//! # Enforcement Strategy:
//! 1. `balance` is PRIVATE - no direct mutation
//! 2. [`Account::debit`] and [`Account::credit`] are the ONLY balance mutations
//! 3. Every result is rounded to the money scale
//! 4. All mutations return Result - errors are explicit

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{AccountId, CurrencyCode};
use crate::money;

/// Balance guard violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("{op} amount must be positive, got {amount}")]
    InvalidAmount { op: &'static str, amount: Decimal },

    #[error("Insufficient funds for debit: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Balance arithmetic overflow")]
    Overflow,
}

/// Currency registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: CurrencyCode,
    pub name: String,
}

impl Currency {
    pub fn new(code: CurrencyCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

/// Ledger account
///
/// # Invariants (ENFORCED by private fields):
/// - balance >= 0 between transactions
/// - balance always carries exactly 4 fractional digits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    name: String,
    currency: CurrencyCode,
    balance: Decimal,
}

impl Account {
    /// Rebuild an account from its persisted form.
    ///
    /// The balance is rounded; a negative persisted balance is kept as-is so
    /// callers can detect the corrupted state instead of masking it.
    pub fn new(
        id: AccountId,
        name: impl Into<String>,
        currency: CurrencyCode,
        balance: Decimal,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            currency,
            balance: money::round(balance),
        }
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[inline]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    // ============================================================
    // VALIDATED MUTATIONS
    // ============================================================

    /// Remove funds from the account
    ///
    /// # Errors
    /// - `InvalidAmount` if amount <= 0
    /// - `InsufficientFunds` if balance < amount
    pub fn debit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount { op: "Debit", amount });
        }
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance =
            money::subtract(self.balance, amount).map_err(|_| AccountError::Overflow)?;
        Ok(())
    }

    /// Add funds to the account
    ///
    /// # Errors
    /// - `InvalidAmount` if amount <= 0
    /// - `Overflow` if the sum is not representable
    pub fn credit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount {
                op: "Credit",
                amount,
            });
        }
        self.balance = money::add(self.balance, amount).map_err(|_| AccountError::Overflow)?;
        Ok(())
    }
}
