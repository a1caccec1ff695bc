use crate::domain::account::{Account, CreditLine, Customer};
use crate::domain::key::{KeyType, PayeeKey};
use crate::domain::ledger::{CreditLineEntry, TransactionRecord};
use crate::domain::limit::{LimitCategory, LimitPolicy};
use crate::domain::money::Balance;
use crate::domain::ports::{
    AccountStore, CreditLineStore, CustomerDirectory, KeyStore, LedgerStore, LimitStore,
    ReceiptStore, ScheduledTransferStore, SeedStore, TransferStore,
};
use crate::domain::receipt::{Receipt, ReceiptDirection};
use crate::domain::schedule::{ScheduleStatus, ScheduledTransfer};
use crate::domain::transfer::{SettlementIssue, Transfer, TransferStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records keyed by id plus a `(customer, idempotency key)` index.
#[derive(Debug)]
struct Tokened<T> {
    by_id: HashMap<Uuid, T>,
    by_token: HashMap<(String, String), Uuid>,
}

impl<T> Default for Tokened<T> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_token: HashMap::new(),
        }
    }
}

impl<T: Clone> Tokened<T> {
    fn insert(&mut self, id: Uuid, customer_id: &str, token: &str, value: T) -> Result<()> {
        let index = (customer_id.to_string(), token.to_string());
        if self.by_token.contains_key(&index) {
            return Err(PaymentError::Conflict(format!(
                "idempotency key '{token}' already used"
            )));
        }
        self.by_token.insert(index, id);
        self.by_id.insert(id, value);
        Ok(())
    }

    fn by_token(&self, customer_id: &str, token: &str) -> Option<T> {
        self.by_token
            .get(&(customer_id.to_string(), token.to_string()))
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }
}

/// A thread-safe in-memory implementation of every storage port.
///
/// Each entity lives in its own `Arc<RwLock<..>>` so clones share state.
/// Ideal for tests and local runs where persistence is not required.
///
/// [`fail_next`](Self::fail_next) makes chosen operations fail, which is how
/// the settlement failure paths are exercised.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    customers: Arc<RwLock<HashMap<String, Customer>>>,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    keys: Arc<RwLock<HashMap<String, PayeeKey>>>,
    limits: Arc<RwLock<HashMap<(String, LimitCategory), LimitPolicy>>>,
    credit_lines: Arc<RwLock<HashMap<String, CreditLine>>>,
    records: Arc<RwLock<Vec<TransactionRecord>>>,
    credit_entries: Arc<RwLock<Vec<CreditLineEntry>>>,
    transfers: Arc<RwLock<Tokened<Transfer>>>,
    receipts: Arc<RwLock<HashMap<Uuid, Receipt>>>,
    scheduled: Arc<RwLock<Tokened<ScheduledTransfer>>>,
    faults: Arc<Mutex<HashMap<&'static str, u32>>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls of `operation` (the port method name, e.g.
    /// `"insert_record"`) fail with an internal error.
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.insert(operation, times);
    }

    fn check_fault(&self, operation: &'static str) -> Result<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(PaymentError::internal(format!("injected failure in {operation}")))
            }
            _ => Ok(()),
        }
    }

    pub async fn credit_entries(&self) -> Vec<CreditLineEntry> {
        self.credit_entries.read().await.clone()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        self.check_fault("get_account")?;
        Ok(self.accounts.read().await.get(account_id).cloned())
    }

    async fn primary_account(&self, customer_id: &str) -> Result<Option<Account>> {
        self.check_fault("primary_account")?;
        let primary_id = self
            .customers
            .read()
            .await
            .get(customer_id)
            .map(|c| c.primary_account_id.clone());
        let accounts = self.accounts.read().await;
        Ok(match primary_id {
            Some(id) => accounts.get(&id).cloned(),
            None => accounts
                .values()
                .find(|a| a.customer_id == customer_id)
                .cloned(),
        })
    }

    async fn adjust_balance(&self, account_id: &str, delta: Balance) -> Result<Account> {
        self.check_fault("adjust_balance")?;
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| PaymentError::not_found("account", account_id))?;
        account.apply_delta(delta);
        Ok(account.clone())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        self.check_fault("get_customer")?;
        Ok(self.customers.read().await.get(customer_id).cloned())
    }
}

#[async_trait]
impl KeyStore for InMemoryStore {
    async fn find_key(&self, key_type: KeyType, value: &str) -> Result<Option<PayeeKey>> {
        self.check_fault("find_key")?;
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .find(|k| k.key_type == key_type && k.value == value)
            .cloned())
    }

    async fn find_key_by_value(&self, value: &str) -> Result<Option<PayeeKey>> {
        self.check_fault("find_key_by_value")?;
        let keys = self.keys.read().await;
        Ok(keys.values().find(|k| k.value == value).cloned())
    }

    async fn insert_key(&self, key: PayeeKey) -> Result<()> {
        self.check_fault("insert_key")?;
        let mut keys = self.keys.write().await;
        if keys
            .values()
            .any(|k| k.key_type == key.key_type && k.value == key.value)
        {
            return Err(PaymentError::Conflict(format!(
                "pix key {}:{} already registered",
                key.key_type, key.value
            )));
        }
        keys.insert(key.id.clone(), key);
        Ok(())
    }
}

#[async_trait]
impl LimitStore for InMemoryStore {
    async fn get_limit(
        &self,
        customer_id: &str,
        category: LimitCategory,
    ) -> Result<Option<LimitPolicy>> {
        self.check_fault("get_limit")?;
        let limits = self.limits.read().await;
        Ok(limits.get(&(customer_id.to_string(), category)).cloned())
    }
}

#[async_trait]
impl CreditLineStore for InMemoryStore {
    async fn get_credit_line(
        &self,
        customer_id: &str,
        line_id: &str,
    ) -> Result<Option<CreditLine>> {
        self.check_fault("get_credit_line")?;
        let lines = self.credit_lines.read().await;
        Ok(lines
            .get(line_id)
            .filter(|line| line.customer_id == customer_id)
            .cloned())
    }

    async fn update_used_limit(
        &self,
        line_id: &str,
        used: Decimal,
        available: Decimal,
    ) -> Result<()> {
        self.check_fault("update_used_limit")?;
        let mut lines = self.credit_lines.write().await;
        let line = lines
            .get_mut(line_id)
            .ok_or_else(|| PaymentError::not_found("credit line", line_id))?;
        line.used_limit = used;
        line.available_limit = available;
        Ok(())
    }

    async fn update_pix_credit_used(&self, line_id: &str, used: Decimal) -> Result<()> {
        self.check_fault("update_pix_credit_used")?;
        let mut lines = self.credit_lines.write().await;
        let line = lines
            .get_mut(line_id)
            .ok_or_else(|| PaymentError::not_found("credit line", line_id))?;
        line.pix_credit_used = used;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn insert_record(&self, record: TransactionRecord) -> Result<()> {
        self.check_fault("insert_record")?;
        self.records.write().await.push(record);
        Ok(())
    }

    async fn insert_credit_entry(&self, entry: CreditLineEntry) -> Result<()> {
        self.check_fault("insert_credit_entry")?;
        self.credit_entries.write().await.push(entry);
        Ok(())
    }

    async fn records_for_customer(&self, customer_id: &str) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransferStore for InMemoryStore {
    async fn create_transfer(&self, transfer: Transfer) -> Result<()> {
        self.check_fault("create_transfer")?;
        let mut transfers = self.transfers.write().await;
        let (id, customer, token) = (
            transfer.id,
            transfer.source_customer_id.clone(),
            transfer.idempotency_key.clone(),
        );
        transfers.insert(id, &customer, &token, transfer)
    }

    async fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>> {
        self.check_fault("get_transfer")?;
        Ok(self.transfers.read().await.by_id.get(&id).cloned())
    }

    async fn find_transfer_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<Transfer>> {
        self.check_fault("find_transfer_by_token")?;
        Ok(self
            .transfers
            .read()
            .await
            .by_token(customer_id, idempotency_key))
    }

    async fn list_transfers(
        &self,
        customer_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Transfer>> {
        let transfers = self.transfers.read().await;
        let mut mine: Vec<Transfer> = transfers
            .by_id
            .values()
            .filter(|t| t.source_customer_id == customer_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine
            .into_iter()
            .skip(page.saturating_sub(1) * page_size)
            .take(page_size)
            .collect())
    }

    async fn transition_transfer_status(
        &self,
        id: Uuid,
        from: TransferStatus,
        to: TransferStatus,
        executed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.check_fault("transition_transfer_status")?;
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .by_id
            .get_mut(&id)
            .ok_or_else(|| PaymentError::not_found("transfer", id.to_string()))?;
        if transfer.status != from {
            return Err(PaymentError::Conflict(format!(
                "transfer {id} is '{}', expected '{from}'",
                transfer.status
            )));
        }
        transfer.status = to;
        if executed_at.is_some() {
            transfer.executed_at = executed_at;
        }
        Ok(())
    }

    async fn attach_receipt(&self, id: Uuid, receipt_id: Uuid) -> Result<()> {
        self.check_fault("attach_receipt")?;
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .by_id
            .get_mut(&id)
            .ok_or_else(|| PaymentError::not_found("transfer", id.to_string()))?;
        transfer.receipt_id = Some(receipt_id);
        Ok(())
    }

    async fn record_settlement_issues(
        &self,
        id: Uuid,
        issues: Vec<SettlementIssue>,
    ) -> Result<()> {
        self.check_fault("record_settlement_issues")?;
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .by_id
            .get_mut(&id)
            .ok_or_else(|| PaymentError::not_found("transfer", id.to_string()))?;
        transfer.settlement_issues = issues;
        Ok(())
    }
}

#[async_trait]
impl ReceiptStore for InMemoryStore {
    async fn save_receipt(&self, receipt: Receipt) -> Result<()> {
        self.check_fault("save_receipt")?;
        self.receipts.write().await.insert(receipt.id, receipt);
        Ok(())
    }

    async fn get_receipt(&self, id: Uuid) -> Result<Option<Receipt>> {
        Ok(self.receipts.read().await.get(&id).cloned())
    }

    async fn receipt_for_transfer(&self, transfer_id: Uuid) -> Result<Option<Receipt>> {
        let receipts = self.receipts.read().await;
        Ok(receipts
            .values()
            .find(|r| r.transfer_id == transfer_id && r.direction == ReceiptDirection::Sent)
            .cloned())
    }

    async fn list_receipts(&self, customer_id: &str) -> Result<Vec<Receipt>> {
        let receipts = self.receipts.read().await;
        let mut mine: Vec<Receipt> = receipts
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }
}

#[async_trait]
impl ScheduledTransferStore for InMemoryStore {
    async fn create_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()> {
        self.check_fault("create_scheduled")?;
        let mut table = self.scheduled.write().await;
        let (id, customer, token) = (
            scheduled.id,
            scheduled.customer_id.clone(),
            scheduled.idempotency_key.clone(),
        );
        table.insert(id, &customer, &token, scheduled)
    }

    async fn get_scheduled(&self, id: Uuid) -> Result<Option<ScheduledTransfer>> {
        Ok(self.scheduled.read().await.by_id.get(&id).cloned())
    }

    async fn find_scheduled_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<ScheduledTransfer>> {
        Ok(self
            .scheduled
            .read()
            .await
            .by_token(customer_id, idempotency_key))
    }

    async fn list_scheduled(&self, customer_id: &str) -> Result<Vec<ScheduledTransfer>> {
        let table = self.scheduled.read().await;
        let mut mine: Vec<ScheduledTransfer> = table
            .by_id
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect();
        mine.sort_by_key(|s| s.next_execution_date);
        Ok(mine)
    }

    async fn update_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()> {
        self.check_fault("update_scheduled")?;
        let mut table = self.scheduled.write().await;
        match table.by_id.get_mut(&scheduled.id) {
            Some(slot) => {
                *slot = scheduled;
                Ok(())
            }
            None => Err(PaymentError::not_found(
                "scheduled transfer",
                scheduled.id.to_string(),
            )),
        }
    }

    async fn update_scheduled_status(&self, id: Uuid, status: ScheduleStatus) -> Result<()> {
        self.check_fault("update_scheduled_status")?;
        let mut table = self.scheduled.write().await;
        let scheduled = table
            .by_id
            .get_mut(&id)
            .ok_or_else(|| PaymentError::not_found("scheduled transfer", id.to_string()))?;
        scheduled.status = status;
        scheduled.updated_at = Utc::now();
        Ok(())
    }

    async fn list_due(&self, today: NaiveDate) -> Result<Vec<ScheduledTransfer>> {
        self.check_fault("list_due")?;
        let table = self.scheduled.read().await;
        let mut due: Vec<ScheduledTransfer> = table
            .by_id
            .values()
            .filter(|s| s.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_execution_date);
        Ok(due)
    }
}

#[async_trait]
impl SeedStore for InMemoryStore {
    async fn upsert_customer(&self, customer: Customer) -> Result<()> {
        self.customers
            .write()
            .await
            .insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        self.accounts
            .write()
            .await
            .insert(account.id.clone(), account);
        Ok(())
    }

    async fn upsert_limit(&self, policy: LimitPolicy) -> Result<()> {
        self.limits
            .write()
            .await
            .insert((policy.customer_id.clone(), policy.category), policy);
        Ok(())
    }

    async fn upsert_credit_line(&self, line: CreditLine) -> Result<()> {
        self.credit_lines
            .write()
            .await
            .insert(line.id.clone(), line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::funding::FundingPlan;
    use crate::domain::key::KeyStatus;
    use crate::domain::money::Amount;
    use crate::domain::transfer::CorrelationId;
    use rust_decimal_macros::dec;

    fn transfer(customer: &str, token: &str) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            idempotency_key: token.into(),
            source_account_id: "acc-1".into(),
            source_customer_id: customer.into(),
            destination_key_type: KeyType::Email,
            destination_key_value: "x@y.com".into(),
            destination_name: None,
            destination_document: None,
            destination_customer_id: None,
            destination_account_id: None,
            amount: Amount::new(dec!(10)).unwrap(),
            memo: None,
            funding: FundingPlan::Balance { amount: dec!(10) },
            status: TransferStatus::Pending,
            end_to_end_id: CorrelationId::generate(),
            receipt_id: None,
            settlement_issues: Vec::new(),
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_account_store() {
        let store = InMemoryStore::new();
        store
            .upsert_account(Account::new("acc-1", "cust-1", Balance::new(dec!(100.0))))
            .await
            .unwrap();

        let updated = store
            .adjust_balance("acc-1", Balance::new(dec!(-40)))
            .await
            .unwrap();
        assert_eq!(updated.balance, Balance::new(dec!(60)));
        assert_eq!(updated.available_balance, Balance::new(dec!(60)));

        assert!(store.get_account("acc-2").await.unwrap().is_none());
        assert!(matches!(
            store.adjust_balance("acc-2", Balance::ZERO).await,
            Err(PaymentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_token_is_unique_per_customer() {
        let store = InMemoryStore::new();
        store.create_transfer(transfer("cust-1", "t1")).await.unwrap();
        assert!(matches!(
            store.create_transfer(transfer("cust-1", "t1")).await,
            Err(PaymentError::Conflict(_))
        ));
        // same token, other customer
        store.create_transfer(transfer("cust-2", "t1")).await.unwrap();

        let found = store.find_transfer_by_token("cust-1", "t1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_status_transition_requires_expected_status() {
        let store = InMemoryStore::new();
        let pending = transfer("cust-1", "t1");
        let id = pending.id;
        store.create_transfer(pending).await.unwrap();

        let now = Utc::now();
        store
            .transition_transfer_status(id, TransferStatus::Pending, TransferStatus::Completed, Some(now))
            .await
            .unwrap();
        assert!(matches!(
            store
                .transition_transfer_status(id, TransferStatus::Pending, TransferStatus::Cancelled, None)
                .await,
            Err(PaymentError::Conflict(_))
        ));

        let stored = store.get_transfer(id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert_eq!(stored.executed_at, Some(now));
    }

    #[tokio::test]
    async fn test_list_transfers_pages_newest_first() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let mut t = transfer("cust-1", &format!("t{i}"));
            t.created_at = Utc::now() + chrono::Duration::seconds(i);
            store.create_transfer(t).await.unwrap();
        }
        let first = store.list_transfers("cust-1", 1, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].idempotency_key, "t4");
        let last = store.list_transfers("cust-1", 3, 2).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].idempotency_key, "t0");
    }

    #[tokio::test]
    async fn test_duplicate_key_conflicts() {
        let store = InMemoryStore::new();
        let key = PayeeKey {
            id: "k1".into(),
            account_id: "acc-1".into(),
            customer_id: "cust-1".into(),
            key_type: KeyType::Email,
            value: "a@b.com".into(),
            status: KeyStatus::Active,
            created_at: Utc::now(),
        };
        store.insert_key(key.clone()).await.unwrap();
        let mut dup = key;
        dup.id = "k2".into();
        assert!(matches!(
            store.insert_key(dup).await,
            Err(PaymentError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failures_are_one_shot() {
        let store = InMemoryStore::new();
        store.fail_next("get_account", 1);
        assert!(store.get_account("acc-1").await.is_err());
        assert!(store.get_account("acc-1").await.is_ok());
    }
}
