//! Demo data loader
//!
//! Registers currencies, the transfer fee policy and the FX rate table, then
//! opens accounts for the demo run.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::account::{Account, Currency};
use crate::core_types::CurrencyCode;
use crate::store::{FeePolicyStore, LedgerAdmin, StoreError};
use crate::transfer::fx::{FxError, InMemoryRateOracle};
use crate::transfer::types::TransferPolicy;

/// Currencies known to a freshly seeded ledger
pub const CURRENCIES: [(&str, &str); 4] = [
    ("USD", "US Dollar"),
    ("JPY", "Japanese Yen"),
    ("AUD", "Australian Dollar"),
    ("EUR", "Euro"),
];

/// `(from, to, rate)`; each direction is registered separately
pub const FX_RATES: [(&str, &str, &str); 8] = [
    ("USD", "AUD", "2.0"),
    ("AUD", "USD", "0.50"),
    ("USD", "JPY", "150"),
    ("JPY", "USD", "0.00667"),
    ("AUD", "JPY", "75"),
    ("JPY", "AUD", "0.0133"),
    ("USD", "EUR", "0.80"),
    ("EUR", "USD", "1.25"),
];

/// Default fee rate: 1%
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("FX error: {0}")]
    Fx(#[from] FxError),

    #[error("Bad seed value: {0}")]
    BadValue(String),
}

fn code(s: &str) -> Result<CurrencyCode, SeedError> {
    CurrencyCode::new(s).map_err(|e| SeedError::BadValue(e.to_string()))
}

/// Load currencies, the fee policy and FX rates.
///
/// An existing fee policy is left untouched.
pub async fn seed_reference_data<A>(
    admin: &A,
    rates: &InMemoryRateOracle,
    fee_policy_key: &str,
) -> Result<(), SeedError>
where
    A: LedgerAdmin + FeePolicyStore,
{
    info!("Loading reference data...");

    for (c, name) in CURRENCIES {
        admin.create_currency(&Currency::new(code(c)?, name)).await?;
    }

    if admin.load_policy(fee_policy_key).await?.is_some() {
        info!(policy = fee_policy_key, "Fee policy already exists, skipping");
    } else {
        let policy = TransferPolicy::new(fee_policy_key, DEFAULT_FEE_RATE, true);
        admin.put_policy(&policy).await?;
        info!(policy = fee_policy_key, value = %policy.value, "Fee policy created");
    }

    for (from, to, rate) in FX_RATES {
        let rate: Decimal = rate
            .parse()
            .map_err(|e: rust_decimal::Error| SeedError::BadValue(e.to_string()))?;
        rates.add_rate(code(from)?, code(to)?, rate)?;
    }
    info!(count = rates.len(), "FX rates seeded");

    Ok(())
}

/// Open `count` accounts in `currency`, each holding `balance`
pub async fn seed_accounts<A>(
    admin: &A,
    count: usize,
    currency: CurrencyCode,
    balance: Decimal,
) -> Result<Vec<Account>, SeedError>
where
    A: LedgerAdmin + ?Sized,
{
    let mut accounts = Vec::with_capacity(count);
    for i in 0..count {
        let account = admin
            .create_account(&format!("Account {}", i + 1), currency, balance)
            .await?;
        accounts.push(account);
    }
    info!(count, currency = %currency, balance = %balance, "Accounts seeded");
    Ok(accounts)
}
