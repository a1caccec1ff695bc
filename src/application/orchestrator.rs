use super::funding::FundingResolver;
use super::key_directory::{Destination, KeyDirectory};
use super::limit_guard::LimitGuard;
use super::settlement::{Parties, Settler};
use crate::domain::account::{Account, PartyIdentity};
use crate::domain::clock::Clock;
use crate::domain::key::display_value;
use crate::domain::limit::LimitCategory;
use crate::domain::ports::StoreHandle;
use crate::domain::transfer::{
    CorrelationId, Transfer, TransferRequest, TransferStatus, ValidatedRequest,
};
use crate::error::{PaymentError, Result};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Drives an instant transfer from request to completed record.
///
/// validate → replay check → resolve → limits/funding → persist pending →
/// settle. Anything rejected before the pending row is written leaves no
/// trace in the store.
#[derive(Clone)]
pub struct TransferOrchestrator {
    store: StoreHandle,
    keys: KeyDirectory,
    limits: LimitGuard,
    funding: FundingResolver,
    settler: Settler,
    clock: Arc<dyn Clock>,
}

struct Resolved {
    account: Account,
    destination: Destination,
    parties: Parties,
    destination_name: Option<String>,
    destination_document: Option<String>,
}

impl TransferOrchestrator {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: KeyDirectory::new(store.clone(), clock.clone()),
            limits: LimitGuard::new(store.clone()),
            funding: FundingResolver::new(store.clone()),
            settler: Settler::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    pub fn keys(&self) -> &KeyDirectory {
        &self.keys
    }

    pub async fn submit(&self, customer_id: &str, request: TransferRequest) -> Result<Transfer> {
        let request = request.validate().inspect_err(|err| {
            tracing::warn!(customer_id, error = %err, "pix transfer rejected");
        })?;

        if let Some(existing) = self
            .store
            .find_transfer_by_token(customer_id, &request.idempotency_key)
            .await?
        {
            tracing::info!(
                customer_id,
                transfer_id = %existing.id,
                idempotency_key = %request.idempotency_key,
                "idempotent replay of pix transfer"
            );
            return Ok(existing);
        }

        let (transfer, parties) = match self.prepare(customer_id, &request).await {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(customer_id, kind = err.kind(), error = %err, "pix transfer rejected");
                return Err(err);
            }
        };

        if let Err(err) = self.store.create_transfer(transfer.clone()).await {
            return match err {
                PaymentError::Conflict(_) => self
                    .store
                    .find_transfer_by_token(customer_id, &request.idempotency_key)
                    .await?
                    .ok_or(err),
                other => Err(other),
            };
        }
        tracing::info!(
            customer_id,
            transfer_id = %transfer.id,
            amount = %transfer.amount,
            funding = %transfer.funding.source(),
            "pix transfer accepted"
        );

        // Once the pending row exists the settlement must run to the end,
        // even if the caller goes away.
        let settler = self.settler.clone();
        let transfer_id = transfer.id;
        tokio::spawn(async move { settler.settle(transfer, parties).await })
            .await
            .map_err(|err| {
                tracing::error!(%transfer_id, error = %err, "settlement task failed");
                PaymentError::Internal(Box::new(err))
            })
    }

    async fn prepare(
        &self,
        customer_id: &str,
        request: &ValidatedRequest,
    ) -> Result<(Transfer, Parties)> {
        let resolved = self.resolve(customer_id, request).await?;

        self.limits
            .check(customer_id, LimitCategory::Pix, request.amount.value())
            .await?;
        let funding = self
            .funding
            .resolve(customer_id, &resolved.account, request)
            .await?;

        let (destination_customer_id, destination_account_id) = match &resolved.destination {
            Destination::Internal(key) => {
                (Some(key.customer_id.clone()), Some(key.account_id.clone()))
            }
            Destination::External => (None, None),
        };

        let transfer = Transfer {
            id: Uuid::new_v4(),
            idempotency_key: request.idempotency_key.clone(),
            source_account_id: resolved.account.id.clone(),
            source_customer_id: customer_id.to_string(),
            destination_key_type: KeyDirectory::effective_type(
                request.destination_key_type,
                &request.destination_key_value,
            ),
            destination_key_value: request.destination_key_value.clone(),
            destination_name: resolved.destination_name,
            destination_document: resolved.destination_document,
            destination_customer_id,
            destination_account_id,
            amount: request.amount,
            memo: request.memo.clone(),
            funding,
            status: TransferStatus::Pending,
            end_to_end_id: CorrelationId::generate(),
            receipt_id: None,
            settlement_issues: Vec::new(),
            created_at: self.clock.now(),
            executed_at: None,
        };
        Ok((transfer, resolved.parties))
    }

    async fn resolve(&self, customer_id: &str, request: &ValidatedRequest) -> Result<Resolved> {
        let account = self
            .owned_account(customer_id, &request.source_account_id)
            .await?;

        let destination = self
            .keys
            .destination(request.destination_key_type, &request.destination_key_value)
            .await?;
        if let Destination::Internal(key) = &destination
            && key.customer_id == customer_id
        {
            return Err(PaymentError::validation(
                "destination_key_value",
                "cannot pay yourself",
            ));
        }

        let sender = self.identity(customer_id).await;
        let (recipient, destination_name, destination_document) = match &destination {
            Destination::Internal(key) => {
                let identity = self.identity(&key.customer_id).await;
                let name = Some(identity.name.clone()).filter(|n| !n.is_empty());
                let document = Some(identity.document.clone()).filter(|d| !d.is_empty());
                (identity, name, document)
            }
            Destination::External => {
                let key_type = KeyDirectory::effective_type(
                    request.destination_key_type,
                    &request.destination_key_value,
                );
                let identity = PartyIdentity {
                    name: display_value(key_type, &request.destination_key_value),
                    ..Default::default()
                };
                (identity, None, None)
            }
        };

        Ok(Resolved {
            account,
            destination,
            parties: Parties { sender, recipient },
            destination_name,
            destination_document,
        })
    }

    /// The caller's active account; someone else's account reads as missing.
    pub(crate) async fn owned_account(&self, customer_id: &str, account_id: &str) -> Result<Account> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .filter(|account| account.customer_id == customer_id)
            .ok_or_else(|| PaymentError::not_found("account", account_id))?;
        account.ensure_active()?;
        Ok(account)
    }

    /// Receipt identity of a customer; lookup problems degrade to blanks.
    async fn identity(&self, customer_id: &str) -> PartyIdentity {
        match self.store.get_customer(customer_id).await {
            Ok(Some(customer)) => customer.identity,
            Ok(None) => PartyIdentity::default(),
            Err(err) => {
                tracing::warn!(customer_id, error = %err, "customer identity lookup failed");
                PartyIdentity::default()
            }
        }
    }

    pub async fn cancel(&self, customer_id: &str, transfer_id: Uuid) -> Result<Transfer> {
        let mut transfer = self.get(customer_id, transfer_id).await?;
        transfer.status.ensure_cancellable()?;
        self.store
            .transition_transfer_status(
                transfer_id,
                TransferStatus::Pending,
                TransferStatus::Cancelled,
                None,
            )
            .await?;
        transfer.status = TransferStatus::Cancelled;
        tracing::info!(customer_id, %transfer_id, "pix transfer cancelled");
        Ok(transfer)
    }

    pub async fn get(&self, customer_id: &str, transfer_id: Uuid) -> Result<Transfer> {
        self.store
            .get_transfer(transfer_id)
            .await?
            .filter(|t| t.source_customer_id == customer_id)
            .ok_or_else(|| PaymentError::not_found("transfer", transfer_id.to_string()))
    }

    pub async fn list(
        &self,
        customer_id: &str,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> Result<Vec<Transfer>> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(PaymentError::validation("page", "must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(PaymentError::validation(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        self.store.list_transfers(customer_id, page, page_size).await
    }
}
