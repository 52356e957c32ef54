//! FX Rate Oracle
//!
//! Rates are registered per ordered currency pair. `(A, B)` and `(B, A)` are
//! independent entries: no inverse or cross rate is ever derived.
//!
//! A registered rate must fit the `fx_rate NUMERIC(28, 12)` column exactly,
//! so the stored rate always reproduces the credited amount.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::CurrencyCode;

/// Most fractional digits a rate may carry
pub const MAX_RATE_SCALE: u32 = 12;

/// Exclusive upper bound on a rate (10^16)
pub const RATE_LIMIT: Decimal = Decimal::from_parts(0x6FC1_0000, 0x0023_86F2, 0, false, 0);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FxError {
    #[error("FX rate must be positive, got {rate} for {from} -> {to}")]
    InvalidRate {
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
    },

    #[error("FX rate {rate} for {from} -> {to} does not fit 12 decimals and 16 integer digits")]
    UnrepresentableRate {
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
    },
}

/// Conversion rate lookup
///
/// `None` means no rate is registered for the ordered pair.
#[async_trait]
pub trait RateOracle: Send + Sync {
    async fn lookup_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal>;
}

/// Rate table held in memory
#[derive(Debug, Default)]
pub struct InMemoryRateOracle {
    rates: DashMap<(CurrencyCode, CurrencyCode), Decimal>,
}

impl InMemoryRateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the rate for `from -> to`
    pub fn add_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
    ) -> Result<(), FxError> {
        if rate <= Decimal::ZERO {
            return Err(FxError::InvalidRate { from, to, rate });
        }
        if rate.normalize().scale() > MAX_RATE_SCALE || rate >= RATE_LIMIT {
            return Err(FxError::UnrepresentableRate { from, to, rate });
        }
        self.rates.insert((from, to), rate);
        Ok(())
    }

    pub fn remove_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal> {
        self.rates.remove(&(from, to)).map(|(_, rate)| rate)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[async_trait]
impl RateOracle for InMemoryRateOracle {
    async fn lookup_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Option<Decimal> {
        self.rates.get(&(from, to)).map(|r| *r.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_registered_pair() {
        let oracle = InMemoryRateOracle::new();
        oracle.add_rate(code("USD"), code("EUR"), dec!(0.80)).unwrap();
        assert_eq!(
            oracle.lookup_rate(code("USD"), code("EUR")).await,
            Some(dec!(0.80))
        );
    }

    #[tokio::test]
    async fn test_no_inverse_derivation() {
        let oracle = InMemoryRateOracle::new();
        oracle.add_rate(code("USD"), code("EUR"), dec!(0.80)).unwrap();
        assert_eq!(oracle.lookup_rate(code("EUR"), code("USD")).await, None);
    }

    #[tokio::test]
    async fn test_no_triangulation() {
        let oracle = InMemoryRateOracle::new();
        oracle.add_rate(code("USD"), code("AUD"), dec!(2.0)).unwrap();
        oracle.add_rate(code("AUD"), code("JPY"), dec!(75)).unwrap();
        assert_eq!(oracle.lookup_rate(code("USD"), code("JPY")).await, None);
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let oracle = InMemoryRateOracle::new();
        oracle.add_rate(code("USD"), code("JPY"), dec!(150)).unwrap();
        oracle.add_rate(code("USD"), code("JPY"), dec!(151)).unwrap();
        assert_eq!(oracle.len(), 1);
        assert_eq!(
            oracle.lookup_rate(code("USD"), code("JPY")).await,
            Some(dec!(151))
        );
        assert_eq!(oracle.remove_rate(code("USD"), code("JPY")), Some(dec!(151)));
        assert!(oracle.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let oracle = InMemoryRateOracle::new();
        assert!(oracle.add_rate(code("USD"), code("EUR"), dec!(0)).is_err());
        assert!(oracle.add_rate(code("USD"), code("EUR"), dec!(-1)).is_err());
        assert!(oracle.is_empty());
    }

    #[test]
    fn test_rate_must_fit_storage() {
        let oracle = InMemoryRateOracle::new();
        oracle
            .add_rate(code("USD"), code("EUR"), dec!(0.123456789012))
            .unwrap();
        // Trailing zeros do not count against the scale
        oracle
            .add_rate(code("USD"), code("JPY"), dec!(150.1234567000000))
            .unwrap();
        assert!(matches!(
            oracle.add_rate(code("USD"), code("AUD"), dec!(0.1234567890123)),
            Err(FxError::UnrepresentableRate { .. })
        ));
        assert!(matches!(
            oracle.add_rate(code("AUD"), code("USD"), RATE_LIMIT),
            Err(FxError::UnrepresentableRate { .. })
        ));
        assert_eq!(RATE_LIMIT, dec!(10000000000000000));
        assert_eq!(oracle.len(), 2);
    }
}
