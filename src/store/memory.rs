//! In-memory ledger store
//!
//! Each account lives behind its own `tokio::sync::Mutex`. A unit of work
//! keeps the owned guards of every account it locked, stages writes in a
//! private buffer and applies them only on commit. Dropping a unit of work
//! without committing discards its writes and releases its locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::{FeePolicyStore, LedgerAdmin, LedgerStore, StoreError, UnitOfWork};
use crate::account::{Account, Currency};
use crate::core_types::{AccountId, CurrencyCode, TransferId};
use crate::money;
use crate::transfer::state::TransferState;
use crate::transfer::types::{TransferIntent, TransferPolicy, TransferRecord};

/// Switches for simulating storage outages in tests
#[derive(Debug, Default)]
struct Faults {
    fail_create_transfer: AtomicBool,
    fail_state_update: AtomicBool,
    fail_commit: AtomicBool,
}

#[derive(Default)]
struct LedgerInner {
    accounts: DashMap<AccountId, Arc<AsyncMutex<Account>>>,
    currencies: DashMap<CurrencyCode, Currency>,
    transfers: DashMap<TransferId, TransferRecord>,
    policies: DashMap<String, TransferPolicy>,
    next_account_id: AtomicU64,
    next_transfer_id: AtomicU64,
    locks_acquired: AtomicUsize,
    lock_trace: Mutex<Vec<AccountId>>,
    registry_reads: AtomicUsize,
    faults: Faults,
}

impl LedgerInner {
    fn account_cell(&self, id: AccountId) -> Option<Arc<AsyncMutex<Account>>> {
        // Clone the Arc out so no map shard lock is held across an await
        self.accounts.get(&id).map(|e| e.value().clone())
    }
}

/// In-memory ledger
///
/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<LedgerInner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of account locks granted so far
    pub fn locks_acquired(&self) -> usize {
        self.inner.locks_acquired.load(Ordering::SeqCst)
    }

    /// Account ids in the order their locks were granted
    pub fn lock_trace(&self) -> Vec<AccountId> {
        self.inner
            .lock_trace
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Currency lookups served outside any unit of work
    pub fn registry_reads(&self) -> usize {
        self.inner.registry_reads.load(Ordering::SeqCst)
    }

    pub fn transfer_count(&self) -> usize {
        self.inner.transfers.len()
    }

    pub fn set_fail_create_transfer(&self, fail: bool) {
        self.inner
            .faults
            .fail_create_transfer
            .store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_state_update(&self, fail: bool) {
        self.inner
            .faults
            .fail_state_update
            .store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.inner.faults.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Drop a currency from the registry, leaving accounts that use it
    pub fn remove_currency(&self, code: CurrencyCode) -> Option<Currency> {
        self.inner.currencies.remove(&code).map(|(_, c)| c)
    }
}

/// Unit of work over [`InMemoryLedger`]
pub struct MemoryUnitOfWork {
    inner: Arc<LedgerInner>,
    held: BTreeMap<AccountId, OwnedMutexGuard<Account>>,
    staged_accounts: HashMap<AccountId, Account>,
    staged_transfer: Option<TransferRecord>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        if let Some(staged) = self.staged_accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        if let Some(guard) = self.held.get(&id) {
            return Ok(Some((**guard).clone()));
        }

        let Some(cell) = self.inner.account_cell(id) else {
            return Ok(None);
        };

        let guard = cell.lock_owned().await;
        self.inner.locks_acquired.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut trace) = self.inner.lock_trace.lock() {
            trace.push(id);
        }
        debug!(account_id = %id, "Account lock granted");

        let account = (*guard).clone();
        self.held.insert(id, guard);
        Ok(Some(account))
    }

    async fn find_currency(&mut self, code: CurrencyCode) -> Result<Option<Currency>, StoreError> {
        Ok(self.inner.currencies.get(&code).map(|c| c.value().clone()))
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if !self.held.contains_key(&account.id()) {
            return Err(StoreError::NotLocked(account.id()));
        }
        self.staged_accounts.insert(account.id(), account.clone());
        Ok(())
    }

    async fn save_transfer(&mut self, record: &TransferRecord) -> Result<(), StoreError> {
        if !self.inner.transfers.contains_key(&record.id) {
            return Err(StoreError::TransferNotFound(record.id));
        }
        self.staged_transfer = Some(record.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut this = self;
        if this.inner.faults.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected commit failure".into()));
        }

        // Apply the transfer CAS first: if it fails nothing else is written.
        if let Some(record) = this.staged_transfer.take() {
            let mut row = this
                .inner
                .transfers
                .get_mut(&record.id)
                .ok_or(StoreError::TransferNotFound(record.id))?;
            if !row.state.can_transition_to(record.state) {
                return Err(StoreError::InvalidStateTransition {
                    id: record.id,
                    from: row.state,
                    to: record.state,
                });
            }
            *row = record;
        }

        for (id, account) in this.staged_accounts.drain() {
            if let Some(guard) = this.held.get_mut(&id) {
                **guard = account;
            }
        }

        // Guards drop here, releasing the locks after the writes are visible
        this.held.clear();
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    type Uow = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, StoreError> {
        Ok(MemoryUnitOfWork {
            inner: self.inner.clone(),
            held: BTreeMap::new(),
            staged_accounts: HashMap::new(),
            staged_transfer: None,
        })
    }

    async fn create_transfer(&self, intent: &TransferIntent) -> Result<TransferRecord, StoreError> {
        if self.inner.faults.fail_create_transfer.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected insert failure".into()));
        }
        let id = TransferId(self.inner.next_transfer_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = TransferRecord::processing(id, intent);
        self.inner.transfers.insert(id, record.clone());
        Ok(record)
    }

    async fn update_transfer_state(
        &self,
        id: TransferId,
        expected: TransferState,
        new_state: TransferState,
    ) -> Result<bool, StoreError> {
        if self.inner.faults.fail_state_update.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected update failure".into()));
        }
        if !expected.can_transition_to(new_state) {
            return Err(StoreError::InvalidStateTransition {
                id,
                from: expected,
                to: new_state,
            });
        }
        let mut row = self
            .inner
            .transfers
            .get_mut(&id)
            .ok_or(StoreError::TransferNotFound(id))?;
        if row.state != expected {
            return Ok(false);
        }
        row.state = new_state;
        Ok(true)
    }

    async fn find_currency(&self, code: CurrencyCode) -> Result<Option<Currency>, StoreError> {
        self.inner.registry_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.currencies.get(&code).map(|c| c.value().clone()))
    }
}

#[async_trait]
impl FeePolicyStore for InMemoryLedger {
    async fn load_policy(&self, name: &str) -> Result<Option<TransferPolicy>, StoreError> {
        Ok(self.inner.policies.get(name).map(|p| p.value().clone()))
    }
}

#[async_trait]
impl LedgerAdmin for InMemoryLedger {
    async fn create_currency(&self, currency: &Currency) -> Result<(), StoreError> {
        self.inner
            .currencies
            .insert(currency.code, currency.clone());
        Ok(())
    }

    async fn create_account(
        &self,
        name: &str,
        currency: CurrencyCode,
        initial_balance: Decimal,
    ) -> Result<Account, StoreError> {
        if initial_balance < Decimal::ZERO {
            return Err(StoreError::InvalidArgument(
                "Initial balance cannot be negative".into(),
            ));
        }
        if !self.inner.currencies.contains_key(&currency) {
            return Err(StoreError::Constraint(format!(
                "currency {} is not registered",
                currency
            )));
        }
        let id = AccountId(self.inner.next_account_id.fetch_add(1, Ordering::SeqCst) + 1);
        let account = Account::new(id, name, currency, money::round(initial_balance));
        self.inner
            .accounts
            .insert(id, Arc::new(AsyncMutex::new(account.clone())));
        Ok(account)
    }

    async fn put_policy(&self, policy: &TransferPolicy) -> Result<(), StoreError> {
        self.inner
            .policies
            .insert(policy.name.clone(), policy.clone());
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match self.inner.account_cell(id) {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.inner.transfers.get(&id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    async fn ledger_with_accounts() -> (InMemoryLedger, AccountId, AccountId) {
        let ledger = InMemoryLedger::new();
        ledger
            .create_currency(&Currency::new(usd(), "US Dollar"))
            .await
            .unwrap();
        let a = ledger.create_account("Alice", usd(), dec!(1000)).await.unwrap();
        let b = ledger.create_account("Bob", usd(), dec!(500)).await.unwrap();
        (ledger, a.id(), b.id())
    }

    fn intent(from: AccountId, to: AccountId) -> TransferIntent {
        TransferIntent {
            sender_id_raw: from,
            receiver_id_raw: to,
            amount: dec!(10),
            currency: usd(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_account_assigns_monotonic_ids() {
        let (ledger, a, b) = ledger_with_accounts().await;
        assert_eq!(a, AccountId(1));
        assert_eq!(b, AccountId(2));
        let acc = ledger.get_account(a).await.unwrap().unwrap();
        assert_eq!(acc.balance(), dec!(1000));
    }

    #[tokio::test]
    async fn test_create_account_rejects_bad_input() {
        let (ledger, _, _) = ledger_with_accounts().await;
        assert!(matches!(
            ledger.create_account("Neg", usd(), dec!(-1)).await,
            Err(StoreError::InvalidArgument(_))
        ));
        let chf = CurrencyCode::new("CHF").unwrap();
        assert!(matches!(
            ledger.create_account("Swiss", chf, dec!(1)).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let (ledger, a, _) = ledger_with_accounts().await;
        let mut uow = ledger.begin().await.unwrap();
        let mut acc = uow.lock_account(a).await.unwrap().unwrap();
        acc.debit(dec!(100)).unwrap();
        uow.save_account(&acc).await.unwrap();

        // Relocking inside the same unit of work sees the staged state
        let again = uow.lock_account(a).await.unwrap().unwrap();
        assert_eq!(again.balance(), dec!(900));

        uow.commit().await.unwrap();
        let acc = ledger.get_account(a).await.unwrap().unwrap();
        assert_eq!(acc.balance(), dec!(900));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (ledger, a, _) = ledger_with_accounts().await;
        let mut uow = ledger.begin().await.unwrap();
        let mut acc = uow.lock_account(a).await.unwrap().unwrap();
        acc.debit(dec!(100)).unwrap();
        uow.save_account(&acc).await.unwrap();
        uow.rollback().await.unwrap();

        let acc = ledger.get_account(a).await.unwrap().unwrap();
        assert_eq!(acc.balance(), dec!(1000));
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let (ledger, a, _) = ledger_with_accounts().await;
        {
            let mut uow = ledger.begin().await.unwrap();
            uow.lock_account(a).await.unwrap();
        }
        // Would block forever if the guard leaked
        let mut uow = ledger.begin().await.unwrap();
        assert!(uow.lock_account(a).await.unwrap().is_some());
        assert_eq!(ledger.locks_acquired(), 2);
    }

    #[tokio::test]
    async fn test_lock_and_read_share_account_cell() {
        let (ledger, a, _) = ledger_with_accounts().await;
        let mut uow = ledger.begin().await.unwrap();
        let mut acc = uow.lock_account(a).await.unwrap().unwrap();
        acc.credit(dec!(1)).unwrap();
        uow.save_account(&acc).await.unwrap();
        uow.commit().await.unwrap();

        // Same cell behind both paths
        let read = ledger.get_account(a).await.unwrap().unwrap();
        assert_eq!(read.balance(), dec!(1001));
        assert!(ledger.inner.account_cell(a).unwrap().try_lock().is_ok());
        assert!(ledger.inner.account_cell(AccountId(99)).is_none());
    }

    #[tokio::test]
    async fn test_unit_of_work_reads_currency_registry() {
        let (ledger, a, _) = ledger_with_accounts().await;
        let mut uow = ledger.begin().await.unwrap();
        uow.lock_account(a).await.unwrap();
        let found = uow.find_currency(usd()).await.unwrap().unwrap();
        assert_eq!(found.code, usd());
        let chf = CurrencyCode::new("CHF").unwrap();
        assert!(uow.find_currency(chf).await.unwrap().is_none());
        assert_eq!(ledger.registry_reads(), 0);
    }

    #[tokio::test]
    async fn test_save_requires_lock() {
        let (ledger, a, _) = ledger_with_accounts().await;
        let acc = ledger.get_account(a).await.unwrap().unwrap();
        let mut uow = ledger.begin().await.unwrap();
        assert_eq!(
            uow.save_account(&acc).await,
            Err(StoreError::NotLocked(a))
        );
    }

    #[tokio::test]
    async fn test_missing_account_locks_nothing() {
        let (ledger, _, _) = ledger_with_accounts().await;
        let mut uow = ledger.begin().await.unwrap();
        assert!(uow.lock_account(AccountId(99)).await.unwrap().is_none());
        assert_eq!(ledger.locks_acquired(), 0);
    }

    #[tokio::test]
    async fn test_state_update_is_cas() {
        let (ledger, a, b) = ledger_with_accounts().await;
        let record = ledger.create_transfer(&intent(a, b)).await.unwrap();
        assert_eq!(record.state, TransferState::Processing);

        assert!(
            ledger
                .update_transfer_state(record.id, TransferState::Processing, TransferState::Failed)
                .await
                .unwrap()
        );
        // Already terminal: no-op
        assert!(
            !ledger
                .update_transfer_state(record.id, TransferState::Processing, TransferState::Completed)
                .await
                .unwrap()
        );
        let row = ledger.get_transfer(record.id).await.unwrap().unwrap();
        assert_eq!(row.state, TransferState::Failed);
    }

    #[tokio::test]
    async fn test_state_update_rejects_illegal_transition() {
        let (ledger, a, b) = ledger_with_accounts().await;
        let record = ledger.create_transfer(&intent(a, b)).await.unwrap();
        assert!(matches!(
            ledger
                .update_transfer_state(record.id, TransferState::Failed, TransferState::Completed)
                .await,
            Err(StoreError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_refuses_to_overwrite_terminal_row() {
        let (ledger, a, b) = ledger_with_accounts().await;
        let mut record = ledger.create_transfer(&intent(a, b)).await.unwrap();
        ledger
            .update_transfer_state(record.id, TransferState::Processing, TransferState::Failed)
            .await
            .unwrap();

        let mut uow = ledger.begin().await.unwrap();
        let mut acc = uow.lock_account(a).await.unwrap().unwrap();
        acc.debit(dec!(10)).unwrap();
        uow.save_account(&acc).await.unwrap();
        record.state = TransferState::Completed;
        uow.save_transfer(&record).await.unwrap();
        assert!(uow.commit().await.is_err());

        let acc = ledger.get_account(a).await.unwrap().unwrap();
        assert_eq!(acc.balance(), dec!(1000));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let (ledger, a, b) = ledger_with_accounts().await;
        ledger.set_fail_create_transfer(true);
        assert!(ledger.create_transfer(&intent(a, b)).await.is_err());
        ledger.set_fail_create_transfer(false);

        let record = ledger.create_transfer(&intent(a, b)).await.unwrap();
        ledger.set_fail_state_update(true);
        assert!(
            ledger
                .update_transfer_state(record.id, TransferState::Processing, TransferState::Failed)
                .await
                .is_err()
        );
    }
}
