//! Core types used throughout the system
//!
//! Identifier and code newtypes shared by the account, transfer and store
//! modules. They give semantic meaning to raw integers and strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest id a `BIGINT` column can hold
pub const MAX_ID: u64 = i64::MAX as u64;

/// An id above [`MAX_ID`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("id {0} does not fit a BIGINT column")]
pub struct IdOutOfRange(pub u64);

fn checked_i64(raw: u64) -> Result<i64, IdOutOfRange> {
    i64::try_from(raw).map_err(|_| IdOutOfRange(raw))
}

/// Account ID - stable, totally ordered, assigned monotonically by the ledger.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Positive**: 0 is never a valid account
/// - **Ordered**: The `Ord` impl defines the global lock order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Signed form for `BIGINT` columns
    #[inline]
    pub fn to_i64(self) -> Result<i64, IdOutOfRange> {
        checked_i64(self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Transfer ID - assigned by the ledger when the intent record is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransferId(pub u64);

impl TransferId {
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn to_i64(self) -> Result<i64, IdOutOfRange> {
        checked_i64(self.0)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Currency must be a 3-letter upper-case code, got {0:?}")]
pub struct InvalidCurrencyCode(pub String);

/// ISO-4217 style currency code, e.g. "USD"
///
/// Always exactly three ASCII upper-case letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, InvalidCurrencyCode> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(InvalidCurrencyCode(code.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII upper-case bytes
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CurrencyCode::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_ordering() {
        assert!(AccountId(1) < AccountId(2));
        assert_eq!(AccountId(7).min(AccountId(3)), AccountId(3));
    }

    #[test]
    fn test_bigint_conversion_is_checked() {
        assert_eq!(AccountId(42).to_i64(), Ok(42));
        assert_eq!(AccountId(MAX_ID).to_i64(), Ok(i64::MAX));
        assert_eq!(AccountId(MAX_ID + 1).to_i64(), Err(IdOutOfRange(MAX_ID + 1)));
        assert_eq!(TransferId(u64::MAX).to_i64(), Err(IdOutOfRange(u64::MAX)));
    }

    #[test]
    fn test_currency_code_valid() {
        let usd = CurrencyCode::new("USD").unwrap();
        assert_eq!(usd.as_str(), "USD");
        assert_eq!(usd.to_string(), "USD");
        assert_eq!("EUR".parse::<CurrencyCode>().unwrap().as_str(), "EUR");
    }

    #[test]
    fn test_currency_code_invalid() {
        assert!(CurrencyCode::new("usd").is_err());
        assert!(CurrencyCode::new("US").is_err());
        assert!(CurrencyCode::new("USDT").is_err());
        assert!(CurrencyCode::new("U1D").is_err());
        assert!(CurrencyCode::new("").is_err());
    }

    #[test]
    fn test_currency_code_serde() {
        let code = CurrencyCode::new("JPY").unwrap();
        let yaml = serde_yaml::to_string(&code).unwrap();
        assert_eq!(yaml.trim(), "JPY");
        let back: CurrencyCode = serde_yaml::from_str("AUD").unwrap();
        assert_eq!(back.as_str(), "AUD");
        assert!(serde_yaml::from_str::<CurrencyCode>("aud").is_err());
    }
}
