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
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_CUSTOMERS: &str = "customers";
pub const CF_ACCOUNTS: &str = "accounts";
pub const CF_KEYS: &str = "keys";
pub const CF_LIMITS: &str = "limits";
pub const CF_CREDIT_LINES: &str = "credit_lines";
/// Statement rows, keyed `<customer>:<record id>`.
pub const CF_LEDGER: &str = "ledger";
pub const CF_CREDIT_ENTRIES: &str = "credit_entries";
pub const CF_TRANSFERS: &str = "transfers";
pub const CF_RECEIPTS: &str = "receipts";
pub const CF_SCHEDULED: &str = "scheduled";
/// Secondary indexes: `transfer:<customer>:<token>` and
/// `scheduled:<customer>:<token>` map to the record id.
pub const CF_TOKENS: &str = "tokens";

const COLUMN_FAMILIES: [&str; 11] = [
    CF_CUSTOMERS,
    CF_ACCOUNTS,
    CF_KEYS,
    CF_LIMITS,
    CF_CREDIT_LINES,
    CF_LEDGER,
    CF_CREDIT_ENTRIES,
    CF_TRANSFERS,
    CF_RECEIPTS,
    CF_SCHEDULED,
    CF_TOKENS,
];

/// A persistent store implementation using RocksDB.
///
/// One column family per entity, values serialized as JSON. Lookups that are
/// not by primary key scan the column family. Read-modify-write operations
/// are serialized through `write_lock` so balance deltas and token checks
/// never interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::internal(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf: &str, key: &str, value: &T) -> Result<()> {
        let handle = self.handle(cf)?;
        self.db.put_cf(handle, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf: &str, key: &str) -> Result<Option<T>> {
        let handle = self.handle(cf)?;
        match self.db.get_pinned_cf(handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.handle(cf)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    fn token_id(&self, kind: &str, customer_id: &str, token: &str) -> Result<Option<Uuid>> {
        self.fetch(CF_TOKENS, &format!("{kind}:{customer_id}:{token}"))
    }

    /// Writes a record and its idempotency index entry in one batch, so a
    /// crash can never leave one without the other. Caller holds `write_lock`.
    fn insert_with_token<T: Serialize>(
        &self,
        kind: &str,
        customer_id: &str,
        token: &str,
        id: Uuid,
        cf: &str,
        record: &T,
    ) -> Result<()> {
        if self.token_id(kind, customer_id, token)?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "idempotency key '{token}' already used"
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.handle(CF_TOKENS)?,
            format!("{kind}:{customer_id}:{token}"),
            serde_json::to_vec(&id)?,
        );
        batch.put_cf(self.handle(cf)?, id.to_string(), serde_json::to_vec(record)?);
        self.db.write(batch)?;
        Ok(())
    }

    fn limit_key(customer_id: &str, category: LimitCategory) -> String {
        format!("{customer_id}:{category}")
    }

    fn modify_transfer(&self, id: Uuid, f: impl FnOnce(&mut Transfer)) -> Result<()> {
        let key = id.to_string();
        let mut transfer: Transfer = self
            .fetch(CF_TRANSFERS, &key)?
            .ok_or_else(|| PaymentError::not_found("transfer", key.clone()))?;
        f(&mut transfer);
        self.put(CF_TRANSFERS, &key, &transfer)
    }

    fn modify_credit_line(&self, line_id: &str, f: impl FnOnce(&mut CreditLine)) -> Result<()> {
        let mut line: CreditLine = self
            .fetch(CF_CREDIT_LINES, line_id)?
            .ok_or_else(|| PaymentError::not_found("credit line", line_id))?;
        f(&mut line);
        self.put(CF_CREDIT_LINES, line_id, &line)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        self.fetch(CF_ACCOUNTS, account_id)
    }

    async fn primary_account(&self, customer_id: &str) -> Result<Option<Account>> {
        if let Some(customer) = self.fetch::<Customer>(CF_CUSTOMERS, customer_id)? {
            return self.fetch(CF_ACCOUNTS, &customer.primary_account_id);
        }
        let accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        Ok(accounts.into_iter().find(|a| a.customer_id == customer_id))
    }

    async fn adjust_balance(&self, account_id: &str, delta: Balance) -> Result<Account> {
        let _guard = self.write_lock.lock().await;
        let mut account: Account = self
            .fetch(CF_ACCOUNTS, account_id)?
            .ok_or_else(|| PaymentError::not_found("account", account_id))?;
        account.apply_delta(delta);
        self.put(CF_ACCOUNTS, account_id, &account)?;
        Ok(account)
    }
}

#[async_trait]
impl CustomerDirectory for RocksDBStore {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        self.fetch(CF_CUSTOMERS, customer_id)
    }
}

#[async_trait]
impl KeyStore for RocksDBStore {
    async fn find_key(&self, key_type: KeyType, value: &str) -> Result<Option<PayeeKey>> {
        let keys: Vec<PayeeKey> = self.scan(CF_KEYS)?;
        Ok(keys
            .into_iter()
            .find(|k| k.key_type == key_type && k.value == value))
    }

    async fn find_key_by_value(&self, value: &str) -> Result<Option<PayeeKey>> {
        let keys: Vec<PayeeKey> = self.scan(CF_KEYS)?;
        Ok(keys.into_iter().find(|k| k.value == value))
    }

    async fn insert_key(&self, key: PayeeKey) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.find_key(key.key_type, &key.value).await?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "pix key {}:{} already registered",
                key.key_type, key.value
            )));
        }
        self.put(CF_KEYS, &key.id, &key)
    }
}

#[async_trait]
impl LimitStore for RocksDBStore {
    async fn get_limit(
        &self,
        customer_id: &str,
        category: LimitCategory,
    ) -> Result<Option<LimitPolicy>> {
        self.fetch(CF_LIMITS, &Self::limit_key(customer_id, category))
    }
}

#[async_trait]
impl CreditLineStore for RocksDBStore {
    async fn get_credit_line(
        &self,
        customer_id: &str,
        line_id: &str,
    ) -> Result<Option<CreditLine>> {
        let line: Option<CreditLine> = self.fetch(CF_CREDIT_LINES, line_id)?;
        Ok(line.filter(|l| l.customer_id == customer_id))
    }

    async fn update_used_limit(
        &self,
        line_id: &str,
        used: Decimal,
        available: Decimal,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.modify_credit_line(line_id, |line| {
            line.used_limit = used;
            line.available_limit = available;
        })
    }

    async fn update_pix_credit_used(&self, line_id: &str, used: Decimal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.modify_credit_line(line_id, |line| line.pix_credit_used = used)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_record(&self, record: TransactionRecord) -> Result<()> {
        let key = format!("{}:{}", record.customer_id, record.id);
        self.put(CF_LEDGER, &key, &record)
    }

    async fn insert_credit_entry(&self, entry: CreditLineEntry) -> Result<()> {
        self.put(CF_CREDIT_ENTRIES, &entry.id.to_string(), &entry)
    }

    async fn records_for_customer(&self, customer_id: &str) -> Result<Vec<TransactionRecord>> {
        let handle = self.handle(CF_LEDGER)?;
        let prefix = format!("{customer_id}:");
        let mut records = Vec::new();
        for item in self.db.prefix_iterator_cf(handle, prefix.as_bytes()) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TransferStore for RocksDBStore {
    async fn create_transfer(&self, transfer: Transfer) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_with_token(
            "transfer",
            &transfer.source_customer_id,
            &transfer.idempotency_key,
            transfer.id,
            CF_TRANSFERS,
            &transfer,
        )
    }

    async fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>> {
        self.fetch(CF_TRANSFERS, &id.to_string())
    }

    async fn find_transfer_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<Transfer>> {
        match self.token_id("transfer", customer_id, idempotency_key)? {
            Some(id) => self.get_transfer(id).await,
            None => Ok(None),
        }
    }

    async fn list_transfers(
        &self,
        customer_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Transfer>> {
        let mut mine: Vec<Transfer> = self
            .scan::<Transfer>(CF_TRANSFERS)?
            .into_iter()
            .filter(|t| t.source_customer_id == customer_id)
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
        let _guard = self.write_lock.lock().await;
        let key = id.to_string();
        let mut transfer: Transfer = self
            .fetch(CF_TRANSFERS, &key)?
            .ok_or_else(|| PaymentError::not_found("transfer", key.clone()))?;
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
        self.put(CF_TRANSFERS, &key, &transfer)
    }

    async fn attach_receipt(&self, id: Uuid, receipt_id: Uuid) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.modify_transfer(id, |t| t.receipt_id = Some(receipt_id))
    }

    async fn record_settlement_issues(
        &self,
        id: Uuid,
        issues: Vec<SettlementIssue>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.modify_transfer(id, |t| t.settlement_issues = issues)
    }
}

#[async_trait]
impl ReceiptStore for RocksDBStore {
    async fn save_receipt(&self, receipt: Receipt) -> Result<()> {
        self.put(CF_RECEIPTS, &receipt.id.to_string(), &receipt)
    }

    async fn get_receipt(&self, id: Uuid) -> Result<Option<Receipt>> {
        self.fetch(CF_RECEIPTS, &id.to_string())
    }

    async fn receipt_for_transfer(&self, transfer_id: Uuid) -> Result<Option<Receipt>> {
        let receipts: Vec<Receipt> = self.scan(CF_RECEIPTS)?;
        Ok(receipts
            .into_iter()
            .find(|r| r.transfer_id == transfer_id && r.direction == ReceiptDirection::Sent))
    }

    async fn list_receipts(&self, customer_id: &str) -> Result<Vec<Receipt>> {
        let mut mine: Vec<Receipt> = self
            .scan::<Receipt>(CF_RECEIPTS)?
            .into_iter()
            .filter(|r| r.customer_id == customer_id)
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }
}

#[async_trait]
impl ScheduledTransferStore for RocksDBStore {
    async fn create_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_with_token(
            "scheduled",
            &scheduled.customer_id,
            &scheduled.idempotency_key,
            scheduled.id,
            CF_SCHEDULED,
            &scheduled,
        )
    }

    async fn get_scheduled(&self, id: Uuid) -> Result<Option<ScheduledTransfer>> {
        self.fetch(CF_SCHEDULED, &id.to_string())
    }

    async fn find_scheduled_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<ScheduledTransfer>> {
        match self.token_id("scheduled", customer_id, idempotency_key)? {
            Some(id) => self.get_scheduled(id).await,
            None => Ok(None),
        }
    }

    async fn list_scheduled(&self, customer_id: &str) -> Result<Vec<ScheduledTransfer>> {
        let mut mine: Vec<ScheduledTransfer> = self
            .scan::<ScheduledTransfer>(CF_SCHEDULED)?
            .into_iter()
            .filter(|s| s.customer_id == customer_id)
            .collect();
        mine.sort_by_key(|s| s.next_execution_date);
        Ok(mine)
    }

    async fn update_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = scheduled.id.to_string();
        if self.fetch::<ScheduledTransfer>(CF_SCHEDULED, &key)?.is_none() {
            return Err(PaymentError::not_found("scheduled transfer", key));
        }
        self.put(CF_SCHEDULED, &key, &scheduled)
    }

    async fn update_scheduled_status(&self, id: Uuid, status: ScheduleStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id.to_string();
        let mut scheduled: ScheduledTransfer = self
            .fetch(CF_SCHEDULED, &key)?
            .ok_or_else(|| PaymentError::not_found("scheduled transfer", key.clone()))?;
        scheduled.status = status;
        scheduled.updated_at = Utc::now();
        self.put(CF_SCHEDULED, &key, &scheduled)
    }

    async fn list_due(&self, today: NaiveDate) -> Result<Vec<ScheduledTransfer>> {
        let mut due: Vec<ScheduledTransfer> = self
            .scan::<ScheduledTransfer>(CF_SCHEDULED)?
            .into_iter()
            .filter(|s| s.is_due(today))
            .collect();
        due.sort_by_key(|s| s.next_execution_date);
        Ok(due)
    }
}

#[async_trait]
impl SeedStore for RocksDBStore {
    async fn upsert_customer(&self, customer: Customer) -> Result<()> {
        self.put(CF_CUSTOMERS, &customer.id, &customer)
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        self.put(CF_ACCOUNTS, &account.id, &account)
    }

    async fn upsert_limit(&self, policy: LimitPolicy) -> Result<()> {
        let key = Self::limit_key(&policy.customer_id, policy.category);
        self.put(CF_LIMITS, &key, &policy)
    }

    async fn upsert_credit_line(&self, line: CreditLine) -> Result<()> {
        self.put(CF_CREDIT_LINES, &line.id, &line)
    }
}
