//! Transfer Coordinator
//!
//! Drives a single transfer from intent to a terminal state.
//!
//! # Flow
//!
//! ```text
//! validate → intent (own commit) → self-transfer → currency registry → fee
//!   → lock min(id) → lock max(id) → currency match → funds → FX → ceiling
//!   → debit + credit → COMPLETED + commit
//!
//! any failure after the intent: rollback → PROCESSING→FAILED (own commit)
//! ```
//!
//! Locks are always requested in ascending account id order, whichever side
//! is the sender, so two transfers over the same pair can never wait on each
//! other in a cycle.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::fee::FeePolicyCache;
use super::fx::RateOracle;
use super::state::TransferState;
use super::types::{TransferIntent, TransferRecord, TransferRequest};
use crate::account::{Account, AccountError};
use crate::core_types::{AccountId, TransferId};
use crate::money::{self, MAX_STORED_BALANCE, MoneyError};
use crate::store::{LedgerStore, UnitOfWork};

/// Transfer Coordinator - the only entry point that moves money
pub struct TransferCoordinator<S: LedgerStore> {
    store: Arc<S>,
    fees: Arc<FeePolicyCache>,
    rates: Arc<dyn RateOracle>,
    max_balance: Decimal,
}

impl<S: LedgerStore> TransferCoordinator<S> {
    /// Create a coordinator whose balance ceiling is the storage maximum
    pub fn new(store: Arc<S>, fees: Arc<FeePolicyCache>, rates: Arc<dyn RateOracle>) -> Self {
        Self::with_max_balance(store, fees, rates, MAX_STORED_BALANCE)
    }

    /// Create a coordinator with an explicit balance ceiling
    pub fn with_max_balance(
        store: Arc<S>,
        fees: Arc<FeePolicyCache>,
        rates: Arc<dyn RateOracle>,
        max_balance: Decimal,
    ) -> Self {
        Self {
            store,
            fees,
            rates,
            max_balance,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn max_balance(&self) -> Decimal {
        self.max_balance
    }

    /// Move `amount` (plus fee) from sender to receiver.
    ///
    /// Returns the id of the COMPLETED transfer. Every request that passes
    /// [`TransferRequest::validate`] leaves exactly one transfer row; on
    /// failure that row ends FAILED (best effort) and the original error is
    /// returned.
    pub async fn transfer_money(&self, req: &TransferRequest) -> Result<TransferId, TransferError> {
        if let Err(e) = req.validate() {
            warn!(
                sender = req.sender_account_id,
                receiver = req.receiver_account_id,
                amount = %req.amount,
                currency = %req.currency,
                reason = e.code(),
                "Transfer request rejected: {}", e
            );
            return Err(e);
        }

        let intent = TransferIntent::from_request(req)?;
        let record = self.store.create_transfer(&intent).await.map_err(|e| {
            error!(
                sender = %intent.sender_id_raw,
                receiver = %intent.receiver_id_raw,
                amount = %intent.amount,
                error = %e,
                "Failed to persist transfer intent"
            );
            TransferError::from(e)
        })?;

        let transfer_id = record.id;
        info!(
            transfer_id = %transfer_id,
            sender = %record.sender_id_raw,
            receiver = %record.receiver_id_raw,
            amount = %record.amount,
            currency = %record.currency,
            "Transfer created"
        );

        match self.execute(record).await {
            Ok(record) => {
                info!(
                    transfer_id = %transfer_id,
                    debit = ?record.debit_amount,
                    credit = ?record.credit_amount,
                    fee = ?record.fee_applied,
                    fx_rate = ?record.fx_rate,
                    "Transfer completed"
                );
                Ok(transfer_id)
            }
            Err(e) => {
                self.log_failure(transfer_id, &e);
                self.compensate(transfer_id, &e).await;
                Err(e)
            }
        }
    }

    /// Run everything after the intent write. No state is changed on error.
    async fn execute(&self, mut record: TransferRecord) -> Result<TransferRecord, TransferError> {
        // Before any lock is taken
        if record.is_self_transfer() {
            return Err(TransferError::SelfTransfer);
        }

        if self.store.find_currency(record.currency).await?.is_none() {
            return Err(TransferError::InvalidCurrency(format!(
                "{} is not a supported currency",
                record.currency
            )));
        }

        let fee = self.resolve_fee(record.amount)?;

        let mut uow = self.store.begin().await?;
        match self.apply(&mut uow, &mut record, fee).await {
            Ok(()) => {
                uow.commit().await?;
                Ok(record)
            }
            Err(e) => {
                if let Err(rb) = uow.rollback().await {
                    error!(
                        transfer_id = %record.id,
                        error = %rb,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Lock, check and stage every write of the transfer on `uow`.
    async fn apply(
        &self,
        uow: &mut S::Uow,
        record: &mut TransferRecord,
        fee: Decimal,
    ) -> Result<(), TransferError> {
        let (mut sender, mut receiver) =
            lock_ordered(uow, record.sender_id_raw, record.receiver_id_raw).await?;

        ensure_registered(uow, &sender).await?;
        ensure_registered(uow, &receiver).await?;
        record.sender_currency = Some(sender.currency());
        record.receiver_currency = Some(receiver.currency());

        if sender.currency() != record.currency {
            return Err(TransferError::InvalidCurrency(format!(
                "transfer currency {} does not match sender account currency {}",
                record.currency,
                sender.currency()
            )));
        }

        let debit_amount = money::add(record.amount, fee).map_err(arithmetic)?;
        if sender.balance() < debit_amount {
            return Err(TransferError::InsufficientFunds {
                required: debit_amount,
                available: sender.balance(),
            });
        }

        let (credit_amount, fx_rate) = if sender.currency() == receiver.currency() {
            (record.amount, None)
        } else {
            let from = sender.currency();
            let to = receiver.currency();
            let rate = self
                .rates
                .lookup_rate(from, to)
                .await
                .ok_or(TransferError::FxRateMissing { from, to })?;
            (money::multiply(record.amount, rate).map_err(arithmetic)?, Some(rate))
        };

        match receiver.balance().checked_add(credit_amount) {
            Some(projected) if projected <= self.max_balance => {}
            _ => {
                return Err(TransferError::BalanceLimitExceeded {
                    limit: self.max_balance,
                });
            }
        }

        sender.debit(debit_amount).map_err(guard_fault)?;
        receiver.credit(credit_amount).map_err(guard_fault)?;

        record.fee_applied = Some(fee);
        record.fx_rate = fx_rate;
        record.debit_amount = Some(debit_amount);
        record.credit_amount = Some(credit_amount);
        record.state = TransferState::Completed;

        uow.save_account(&sender).await?;
        uow.save_account(&receiver).await?;
        uow.save_transfer(record).await?;
        Ok(())
    }

    fn resolve_fee(&self, amount: Decimal) -> Result<Decimal, TransferError> {
        let fee = self
            .fees
            .calculate_fee(amount)
            .map_err(|e| TransferError::FeeCalculationFailed(e.to_string()))?;
        if fee < Decimal::ZERO {
            return Err(TransferError::FeeCalculationFailed(format!(
                "negative fee {} for amount {}",
                fee, amount
            )));
        }
        Ok(fee)
    }

    /// Mark the transfer FAILED in its own commit. Never masks `cause`.
    async fn compensate(&self, transfer_id: TransferId, cause: &TransferError) {
        match self
            .store
            .update_transfer_state(transfer_id, TransferState::Processing, TransferState::Failed)
            .await
        {
            Ok(true) => {
                info!(
                    transfer_id = %transfer_id,
                    reason = cause.code(),
                    "Transfer marked FAILED"
                );
            }
            Ok(false) => {
                warn!(
                    transfer_id = %transfer_id,
                    reason = cause.code(),
                    "Transfer no longer PROCESSING, FAILED not written"
                );
            }
            Err(e) => {
                error!(
                    transfer_id = %transfer_id,
                    reason = cause.code(),
                    error = %e,
                    "Failed to mark transfer FAILED"
                );
            }
        }
    }

    fn log_failure(&self, transfer_id: TransferId, e: &TransferError) {
        if e.is_business() {
            warn!(
                transfer_id = %transfer_id,
                reason = e.code(),
                "Transfer rejected: {}", e
            );
        } else {
            error!(
                transfer_id = %transfer_id,
                reason = e.code(),
                error = %e,
                "Transfer failed"
            );
        }
    }
}

/// Lock both accounts, smaller id first. Returns `(sender, receiver)`.
async fn lock_ordered<U: UnitOfWork>(
    uow: &mut U,
    sender: AccountId,
    receiver: AccountId,
) -> Result<(Account, Account), TransferError> {
    let (first, second) = if sender < receiver {
        (sender, receiver)
    } else {
        (receiver, sender)
    };

    let first_account = uow
        .lock_account(first)
        .await?
        .ok_or(TransferError::AccountNotFound(first))?;
    debug!(account_id = %first, "Locked first account");

    let second_account = uow
        .lock_account(second)
        .await?
        .ok_or(TransferError::AccountNotFound(second))?;
    debug!(account_id = %second, "Locked second account");

    if first == sender {
        Ok((first_account, second_account))
    } else {
        Ok((second_account, first_account))
    }
}

/// A locked account must carry a currency known to the registry. Read
/// through `uow` so the check shares the connection holding the row locks.
async fn ensure_registered<U: UnitOfWork>(
    uow: &mut U,
    account: &Account,
) -> Result<(), TransferError> {
    if uow.find_currency(account.currency()).await?.is_none() {
        return Err(TransferError::InvalidAccountState(format!(
            "account {} has unregistered currency {}",
            account.id(),
            account.currency()
        )));
    }
    Ok(())
}

fn guard_fault(e: AccountError) -> TransferError {
    match e {
        AccountError::InsufficientFunds {
            required,
            available,
        } => TransferError::InsufficientFunds {
            required,
            available,
        },
        other => TransferError::Unknown(other.to_string()),
    }
}

fn arithmetic(e: MoneyError) -> TransferError {
    TransferError::Unknown(e.to_string())
}
