//! Transfer Core Types
//!
//! Type definitions shared by the coordinator and the ledger stores.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use super::state::TransferState;
use crate::core_types::{AccountId, CurrencyCode, MAX_ID, TransferId};
use crate::money;

/// Smallest amount accepted at the request boundary
pub const MIN_TRANSFER_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Transfer request from the boundary layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub sender_account_id: u64,
    pub receiver_account_id: u64,
    pub amount: Decimal,
    /// Requested currency code; must match the sender account
    pub currency: String,
}

impl TransferRequest {
    pub fn new(
        sender_account_id: u64,
        receiver_account_id: u64,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            sender_account_id,
            receiver_account_id,
            amount,
            currency: currency.into(),
        }
    }

    /// Check the input contract the boundary layer is expected to enforce.
    ///
    /// - ids are positive and fit a `BIGINT`
    /// - amount >= 0.01 with at most 4 fractional and 15 integer digits
    /// - currency is a 3-letter upper-case code
    pub fn validate(&self) -> Result<(), TransferError> {
        if !(1..=MAX_ID).contains(&self.sender_account_id) {
            return Err(TransferError::InvalidRequest(format!(
                "Sender account id must be in 1..={}",
                MAX_ID
            )));
        }
        if !(1..=MAX_ID).contains(&self.receiver_account_id) {
            return Err(TransferError::InvalidRequest(format!(
                "Receiver account id must be in 1..={}",
                MAX_ID
            )));
        }
        if self.amount < MIN_TRANSFER_AMOUNT {
            return Err(TransferError::InvalidRequest(format!(
                "Amount must be at least {}",
                MIN_TRANSFER_AMOUNT
            )));
        }
        money::check_precision(self.amount)
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        CurrencyCode::new(&self.currency)
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        Ok(())
    }
}

/// Intent written before any account is locked
///
/// Carries the raw, unresolved account ids exactly as requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub sender_id_raw: AccountId,
    pub receiver_id_raw: AccountId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
}

impl TransferIntent {
    /// Build an intent from a validated request
    pub fn from_request(req: &TransferRequest) -> Result<Self, TransferError> {
        let currency = CurrencyCode::new(&req.currency)
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            sender_id_raw: AccountId(req.sender_account_id),
            receiver_id_raw: AccountId(req.receiver_account_id),
            amount: money::round(req.amount),
            currency,
            created_at: Utc::now(),
        })
    }
}

/// Persistent transfer record (one row per request)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub sender_id_raw: AccountId,
    pub receiver_id_raw: AccountId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub sender_currency: Option<CurrencyCode>,
    pub receiver_currency: Option<CurrencyCode>,
    pub fee_applied: Option<Decimal>,
    /// Present only for cross-currency transfers
    pub fx_rate: Option<Decimal>,
    /// amount + fee
    pub debit_amount: Option<Decimal>,
    /// amount, or amount * fx_rate
    pub credit_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub state: TransferState,
}

impl TransferRecord {
    /// Create a PROCESSING record for a freshly assigned id
    pub fn processing(id: TransferId, intent: &TransferIntent) -> Self {
        Self {
            id,
            sender_id_raw: intent.sender_id_raw,
            receiver_id_raw: intent.receiver_id_raw,
            amount: intent.amount,
            currency: intent.currency,
            sender_currency: None,
            receiver_currency: None,
            fee_applied: None,
            fx_rate: None,
            debit_amount: None,
            credit_amount: None,
            created_at: intent.created_at,
            state: TransferState::Processing,
        }
    }

    #[inline]
    pub fn is_self_transfer(&self) -> bool {
        self.sender_id_raw == self.receiver_id_raw
    }

    #[inline]
    pub fn is_cross_currency(&self) -> bool {
        matches!(
            (self.sender_currency, self.receiver_currency),
            (Some(s), Some(r)) if s != r
        )
    }
}

/// Named fee policy row, e.g. `TRANSFER_FEE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPolicy {
    pub name: String,
    pub value: Decimal,
    pub enabled: bool,
}

impl TransferPolicy {
    pub fn new(name: impl Into<String>, value: Decimal, enabled: bool) -> Self {
        Self {
            name: name.into(),
            value,
            enabled,
        }
    }
}
