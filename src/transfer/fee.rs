//! Fee Policy Cache
//!
//! Holds the named transfer fee policy in memory. The policy must be loaded
//! with [`FeePolicyCache::refresh`] before any fee is calculated; an absent
//! policy is an error, never an implicit zero fee.

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use super::types::TransferPolicy;
use crate::money;
use crate::store::{FeePolicyStore, StoreError};

/// Default policy key
pub const TRANSFER_FEE_POLICY_KEY: &str = "TRANSFER_FEE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("{0} policy not found in store")]
    PolicyNotFound(String),

    #[error("{0} policy not loaded")]
    NotLoaded(String),

    #[error("Amount must not be negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("Fee arithmetic overflow")]
    Overflow,

    #[error("Failed to load fee policy: {0}")]
    Store(#[from] StoreError),
}

/// In-memory copy of one named fee policy
pub struct FeePolicyCache {
    store: Arc<dyn FeePolicyStore>,
    policy_name: String,
    policy: RwLock<Option<TransferPolicy>>,
}

impl FeePolicyCache {
    pub fn new(store: Arc<dyn FeePolicyStore>, policy_name: impl Into<String>) -> Self {
        Self {
            store,
            policy_name: policy_name.into(),
            policy: RwLock::new(None),
        }
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    /// Reload the policy from the store.
    ///
    /// On failure the previously cached policy (if any) is kept.
    pub async fn refresh(&self) -> Result<TransferPolicy, FeeError> {
        let policy = self
            .store
            .load_policy(&self.policy_name)
            .await?
            .ok_or_else(|| FeeError::PolicyNotFound(self.policy_name.clone()))?;

        info!(
            policy = %policy.name,
            value = %policy.value,
            enabled = policy.enabled,
            "Loaded transfer fee policy"
        );

        let mut slot = self.policy.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(policy.clone());
        Ok(policy)
    }

    /// Currently cached policy
    pub fn policy(&self) -> Option<TransferPolicy> {
        self.policy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `enabled ? round(amount * value) : 0`
    pub fn calculate_fee(&self, amount: Decimal) -> Result<Decimal, FeeError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(FeeError::NegativeAmount(amount));
        }

        let policy = self
            .policy()
            .ok_or_else(|| FeeError::NotLoaded(self.policy_name.clone()))?;

        if !policy.enabled {
            return Ok(money::round(Decimal::ZERO));
        }

        money::multiply(amount, policy.value).map_err(|_| FeeError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryLedger, LedgerAdmin};
    use rust_decimal_macros::dec;

    async fn cache_with(policy: Option<TransferPolicy>) -> FeePolicyCache {
        let ledger = InMemoryLedger::new();
        if let Some(p) = policy {
            ledger.put_policy(&p).await.unwrap();
        }
        FeePolicyCache::new(Arc::new(ledger), TRANSFER_FEE_POLICY_KEY)
    }

    #[tokio::test]
    async fn test_fee_one_percent() {
        let cache = cache_with(Some(TransferPolicy::new(
            TRANSFER_FEE_POLICY_KEY,
            dec!(0.01),
            true,
        )))
        .await;
        cache.refresh().await.unwrap();

        assert_eq!(cache.calculate_fee(dec!(100.00)).unwrap(), dec!(1.00));
        assert_eq!(cache.calculate_fee(dec!(12.345)).unwrap(), dec!(0.1235));
        assert_eq!(cache.calculate_fee(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_disabled_policy_is_zero_fee() {
        let cache = cache_with(Some(TransferPolicy::new(
            TRANSFER_FEE_POLICY_KEY,
            dec!(0.05),
            false,
        )))
        .await;
        cache.refresh().await.unwrap();
        assert_eq!(cache.calculate_fee(dec!(500)).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_missing_policy_is_fatal() {
        let cache = cache_with(None).await;
        assert_eq!(
            cache.refresh().await.unwrap_err(),
            FeeError::PolicyNotFound(TRANSFER_FEE_POLICY_KEY.into())
        );
        // Never silently zero
        assert_eq!(
            cache.calculate_fee(dec!(100)).unwrap_err(),
            FeeError::NotLoaded(TRANSFER_FEE_POLICY_KEY.into())
        );
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let cache = cache_with(Some(TransferPolicy::new(
            TRANSFER_FEE_POLICY_KEY,
            dec!(0.01),
            true,
        )))
        .await;
        cache.refresh().await.unwrap();
        assert_eq!(
            cache.calculate_fee(dec!(-1)).unwrap_err(),
            FeeError::NegativeAmount(dec!(-1))
        );
    }

    #[tokio::test]
    async fn test_refresh_picks_up_changes() {
        let ledger = InMemoryLedger::new();
        ledger
            .put_policy(&TransferPolicy::new(TRANSFER_FEE_POLICY_KEY, dec!(0.01), true))
            .await
            .unwrap();
        let cache = FeePolicyCache::new(Arc::new(ledger.clone()), TRANSFER_FEE_POLICY_KEY);
        cache.refresh().await.unwrap();
        assert_eq!(cache.calculate_fee(dec!(100)).unwrap(), dec!(1));

        ledger
            .put_policy(&TransferPolicy::new(TRANSFER_FEE_POLICY_KEY, dec!(0.02), true))
            .await
            .unwrap();
        // Cached value until refreshed
        assert_eq!(cache.calculate_fee(dec!(100)).unwrap(), dec!(1));
        cache.refresh().await.unwrap();
        assert_eq!(cache.calculate_fee(dec!(100)).unwrap(), dec!(2));
    }
}
