use super::account::{Account, CreditLine, Customer};
use super::assistant::{AgentRequest, AgentResponse, CustomerProfile, HistoryEntry};
use super::key::{KeyType, PayeeKey};
use super::ledger::{CreditLineEntry, TransactionRecord};
use super::limit::{LimitCategory, LimitPolicy};
use super::money::Balance;
use super::receipt::Receipt;
use super::schedule::{ScheduleStatus, ScheduledTransfer};
use super::transfer::{SettlementIssue, Transfer, TransferStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>>;
    async fn primary_account(&self, customer_id: &str) -> Result<Option<Account>>;
    /// Applies a signed delta to balance and available balance.
    async fn adjust_balance(&self, account_id: &str, delta: Balance) -> Result<Account>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>>;
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn find_key(&self, key_type: KeyType, value: &str) -> Result<Option<PayeeKey>>;
    async fn find_key_by_value(&self, value: &str) -> Result<Option<PayeeKey>>;
    /// Fails with `Conflict` when the (type, value) pair is already bound.
    async fn insert_key(&self, key: PayeeKey) -> Result<()>;
}

#[async_trait]
pub trait LimitStore: Send + Sync {
    async fn get_limit(
        &self,
        customer_id: &str,
        category: LimitCategory,
    ) -> Result<Option<LimitPolicy>>;
}

#[async_trait]
pub trait CreditLineStore: Send + Sync {
    async fn get_credit_line(&self, customer_id: &str, line_id: &str)
    -> Result<Option<CreditLine>>;
    async fn update_used_limit(&self, line_id: &str, used: Decimal, available: Decimal)
    -> Result<()>;
    async fn update_pix_credit_used(&self, line_id: &str, used: Decimal) -> Result<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_record(&self, record: TransactionRecord) -> Result<()>;
    async fn insert_credit_entry(&self, entry: CreditLineEntry) -> Result<()>;
    async fn records_for_customer(&self, customer_id: &str) -> Result<Vec<TransactionRecord>>;
}

#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Fails with `Conflict` when the customer already used the token.
    async fn create_transfer(&self, transfer: Transfer) -> Result<()>;
    async fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>>;
    async fn find_transfer_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<Transfer>>;
    /// Newest first; `page` is 1-based.
    async fn list_transfers(
        &self,
        customer_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Transfer>>;
    /// Moves a transfer from `from` to `to`. Fails with `Conflict`, leaving the
    /// record untouched, when the stored status is no longer `from`.
    async fn transition_transfer_status(
        &self,
        id: Uuid,
        from: TransferStatus,
        to: TransferStatus,
        executed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn attach_receipt(&self, id: Uuid, receipt_id: Uuid) -> Result<()>;
    async fn record_settlement_issues(&self, id: Uuid, issues: Vec<SettlementIssue>)
    -> Result<()>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn save_receipt(&self, receipt: Receipt) -> Result<()>;
    async fn get_receipt(&self, id: Uuid) -> Result<Option<Receipt>>;
    /// The payer's receipt for a transfer.
    async fn receipt_for_transfer(&self, transfer_id: Uuid) -> Result<Option<Receipt>>;
    /// Newest first.
    async fn list_receipts(&self, customer_id: &str) -> Result<Vec<Receipt>>;
}

#[async_trait]
pub trait ScheduledTransferStore: Send + Sync {
    /// Fails with `Conflict` when the customer already used the token.
    async fn create_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()>;
    async fn get_scheduled(&self, id: Uuid) -> Result<Option<ScheduledTransfer>>;
    async fn find_scheduled_by_token(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<ScheduledTransfer>>;
    async fn list_scheduled(&self, customer_id: &str) -> Result<Vec<ScheduledTransfer>>;
    async fn update_scheduled(&self, scheduled: ScheduledTransfer) -> Result<()>;
    async fn update_scheduled_status(&self, id: Uuid, status: ScheduleStatus) -> Result<()>;
    /// Instructions in `scheduled` status whose next execution is on or before `today`.
    async fn list_due(&self, today: NaiveDate) -> Result<Vec<ScheduledTransfer>>;
}

/// Bulk loading of reference data (customers, accounts, limits, credit lines).
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn upsert_customer(&self, customer: Customer) -> Result<()>;
    async fn upsert_account(&self, account: Account) -> Result<()>;
    async fn upsert_limit(&self, policy: LimitPolicy) -> Result<()>;
    async fn upsert_credit_line(&self, line: CreditLine) -> Result<()>;
}

/// Every storage port a backend must provide.
pub trait PixStore:
    AccountStore
    + CustomerDirectory
    + KeyStore
    + LimitStore
    + CreditLineStore
    + LedgerStore
    + TransferStore
    + ReceiptStore
    + ScheduledTransferStore
    + SeedStore
{
}

impl<T> PixStore for T where
    T: AccountStore
        + CustomerDirectory
        + KeyStore
        + LimitStore
        + CreditLineStore
        + LedgerStore
        + TransferStore
        + ReceiptStore
        + ScheduledTransferStore
        + SeedStore
{
}

pub type StoreHandle = Arc<dyn PixStore>;

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn get_profile(&self, customer_id: &str) -> Result<CustomerProfile>;
}

#[async_trait]
pub trait TransactionsFetcher: Send + Sync {
    async fn get_transactions(&self, customer_id: &str) -> Result<Vec<HistoryEntry>>;
}

#[async_trait]
pub trait AgentCaller: Send + Sync {
    async fn call(&self, request: &AgentRequest) -> Result<AgentResponse>;
}

pub type ProfileFetcherBox = Box<dyn ProfileFetcher>;
pub type TransactionsFetcherBox = Box<dyn TransactionsFetcher>;
pub type AgentCallerBox = Box<dyn AgentCaller>;
