use crate::domain::account::PartyIdentity;
use crate::domain::clock::Clock;
use crate::domain::funding::FundingPlan;
use crate::domain::ledger::{CreditLineEntry, TransactionRecord};
use crate::domain::money::Balance;
use crate::domain::ports::StoreHandle;
use crate::domain::receipt::Receipt;
use crate::domain::transfer::{SettlementIssue, SettlementStep, Transfer, TransferStatus};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Display identities of both sides, resolved before settlement starts.
#[derive(Debug, Clone, Default)]
pub struct Parties {
    pub sender: PartyIdentity,
    pub recipient: PartyIdentity,
}

/// Moves the money for a persisted pending transfer.
///
/// Every sub-step is attempted once and never rolled back. Failures are
/// logged, collected on the transfer and persisted for reconciliation;
/// the transfer still ends up `completed`.
#[derive(Clone)]
pub struct Settler {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
}

impl Settler {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn settle(&self, mut transfer: Transfer, parties: Parties) -> Transfer {
        let now = self.clock.now();
        let mut issues = Vec::new();
        let counterparty = transfer
            .destination_name
            .clone()
            .unwrap_or_else(|| transfer.destination_key_value.clone());

        // a. payer side
        match &transfer.funding {
            FundingPlan::Balance { amount } => {
                let debit = self
                    .store
                    .adjust_balance(&transfer.source_account_id, -Balance::new(*amount))
                    .await;
                note(&mut issues, &transfer, SettlementStep::DebitSender, debit.map(drop));
            }
            FundingPlan::CreditLine {
                credit_line_id,
                plan,
            } => {
                let charge = self
                    .charge_credit_line(&transfer.source_customer_id, credit_line_id, plan.total)
                    .await;
                note(&mut issues, &transfer, SettlementStep::DebitSender, charge);

                let entry = CreditLineEntry::pix_credit(
                    credit_line_id,
                    &transfer.source_customer_id,
                    transfer.id,
                    &counterparty,
                    plan.total,
                    plan.installments,
                    now,
                );
                let statement = self.store.insert_credit_entry(entry).await;
                note(
                    &mut issues,
                    &transfer,
                    SettlementStep::CreditLineStatement,
                    statement,
                );
            }
        }
        let sent = TransactionRecord::sent(
            &transfer.source_customer_id,
            transfer.id,
            &counterparty,
            transfer.total_with_fees(),
            now,
        );
        let history = self.store.insert_record(sent).await;
        note(&mut issues, &transfer, SettlementStep::SenderHistory, history);

        // b. internal payee
        if let (Some(account_id), Some(customer_id)) = (
            transfer.destination_account_id.clone(),
            transfer.destination_customer_id.clone(),
        ) {
            let credit = self
                .store
                .adjust_balance(&account_id, transfer.amount.into())
                .await;
            note(
                &mut issues,
                &transfer,
                SettlementStep::CreditRecipient,
                credit.map(drop),
            );

            let received = TransactionRecord::received(
                &customer_id,
                transfer.id,
                &parties.sender.name,
                transfer.amount.value(),
                now,
            );
            let history = self.store.insert_record(received).await;
            note(&mut issues, &transfer, SettlementStep::RecipientHistory, history);
        }

        // c. completed
        let completed = self
            .store
            .transition_transfer_status(
                transfer.id,
                TransferStatus::Pending,
                TransferStatus::Completed,
                Some(now),
            )
            .await;
        let superseded = matches!(completed, Err(PaymentError::Conflict(_)));
        note(&mut issues, &transfer, SettlementStep::MarkCompleted, completed);
        if superseded {
            // finalized elsewhere while the money moved; report the stored status
            if let Ok(Some(stored)) = self.store.get_transfer(transfer.id).await {
                transfer.status = stored.status;
                transfer.executed_at = stored.executed_at;
            }
        } else {
            transfer.status = TransferStatus::Completed;
            transfer.executed_at = Some(now);
        }

        // d. receipts
        let receipt = Receipt::for_sender(
            &transfer,
            parties.sender.clone(),
            parties.recipient.clone(),
            now,
        );
        let receipt_id = receipt.id;
        let saved = match self.store.save_receipt(receipt).await {
            Ok(()) => self.store.attach_receipt(transfer.id, receipt_id).await,
            Err(err) => Err(err),
        };
        if saved.is_ok() {
            transfer.receipt_id = Some(receipt_id);
        }
        note(&mut issues, &transfer, SettlementStep::SenderReceipt, saved);

        if let Some(customer_id) = transfer.destination_customer_id.clone() {
            let receipt =
                Receipt::for_recipient(&transfer, &customer_id, parties.sender, parties.recipient, now);
            let saved = self.store.save_receipt(receipt).await;
            note(&mut issues, &transfer, SettlementStep::RecipientReceipt, saved);
        }

        if !issues.is_empty() {
            if let Err(err) = self
                .store
                .record_settlement_issues(transfer.id, issues.clone())
                .await
            {
                tracing::error!(transfer_id = %transfer.id, error = %err, "failed to persist settlement issues");
            }
            transfer.settlement_issues = issues;
        }

        tracing::info!(
            transfer_id = %transfer.id,
            e2e_id = %transfer.end_to_end_id,
            amount = %transfer.amount,
            issues = transfer.settlement_issues.len(),
            "pix transfer completed"
        );
        transfer
    }

    async fn charge_credit_line(
        &self,
        customer_id: &str,
        line_id: &str,
        total: Decimal,
    ) -> Result<()> {
        let line = self
            .store
            .get_credit_line(customer_id, line_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("credit line", line_id))?;
        let (used, available) = line.charged(total);
        self.store
            .update_used_limit(line_id, used, available)
            .await?;
        self.store
            .update_pix_credit_used(line_id, line.pix_credit_used + total)
            .await
    }
}

fn note(issues: &mut Vec<SettlementIssue>, transfer: &Transfer, step: SettlementStep, outcome: Result<()>) {
    if let Err(err) = outcome {
        tracing::error!(transfer_id = %transfer.id, ?step, error = %err, "settlement step failed");
        issues.push(SettlementIssue {
            step,
            error: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, CreditLine};
    use crate::domain::clock::SystemClock;
    use crate::domain::funding::InstallmentPlan;
    use crate::domain::key::KeyType;
    use crate::domain::money::Amount;
    use crate::domain::ports::{AccountStore, CreditLineStore, SeedStore, TransferStore};
    use crate::domain::transfer::CorrelationId;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn credit_transfer() -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            idempotency_key: "idem".into(),
            source_account_id: "acc-1".into(),
            source_customer_id: "cust-1".into(),
            destination_key_type: KeyType::Email,
            destination_key_value: "bob@bank.com".into(),
            destination_name: Some("Bob".into()),
            destination_document: None,
            destination_customer_id: Some("cust-2".into()),
            destination_account_id: Some("acc-2".into()),
            amount: Amount::new(dec!(100)).unwrap(),
            memo: None,
            funding: FundingPlan::CreditLine {
                credit_line_id: "card-1".into(),
                plan: InstallmentPlan::compute(dec!(100), Some(3), None).unwrap(),
            },
            status: TransferStatus::Pending,
            end_to_end_id: CorrelationId::generate(),
            receipt_id: None,
            settlement_issues: Vec::new(),
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    async fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_account(Account::new("acc-1", "cust-1", Balance::new(dec!(0))))
            .await
            .unwrap();
        store
            .upsert_account(Account::new("acc-2", "cust-2", Balance::new(dec!(10))))
            .await
            .unwrap();
        store
            .upsert_credit_line(CreditLine {
                id: "card-1".into(),
                customer_id: "cust-1".into(),
                credit_limit: dec!(1000),
                used_limit: dec!(0),
                available_limit: dec!(1000),
                pix_credit_enabled: true,
                pix_credit_limit: dec!(500),
                pix_credit_used: dec!(0),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_credit_line_settlement() {
        let store = store().await;
        let transfer = credit_transfer();
        store.create_transfer(transfer.clone()).await.unwrap();

        let settler = Settler::new(store.clone(), Arc::new(SystemClock));
        let settled = settler.settle(transfer, Parties::default()).await;

        assert_eq!(settled.status, TransferStatus::Completed);
        assert!(settled.settlement_issues.is_empty());
        let line = store.get_credit_line("cust-1", "card-1").await.unwrap().unwrap();
        assert_eq!(line.used_limit, dec!(104.00));
        assert_eq!(line.available_limit, dec!(896.00));
        assert_eq!(line.pix_credit_used, dec!(104.00));
        assert_eq!(store.credit_entries().await.len(), 1);
        let payee = store.get_account("acc-2").await.unwrap().unwrap();
        assert_eq!(payee.balance, Balance::new(dec!(110)));
    }

    #[tokio::test]
    async fn test_failed_charge_is_noted_and_settlement_continues() {
        let store = store().await;
        let transfer = credit_transfer();
        store.create_transfer(transfer.clone()).await.unwrap();
        store.fail_next("get_credit_line", 1);

        let settler = Settler::new(store.clone(), Arc::new(SystemClock));
        let settled = settler.settle(transfer, Parties::default()).await;

        assert_eq!(settled.status, TransferStatus::Completed);
        assert_eq!(settled.settlement_issues.len(), 1);
        assert_eq!(settled.settlement_issues[0].step, SettlementStep::DebitSender);
        assert!(settled.receipt_id.is_some());
        let payee = store.get_account("acc-2").await.unwrap().unwrap();
        assert_eq!(payee.balance, Balance::new(dec!(110)));
        let stored = store.get_transfer(settled.id).await.unwrap().unwrap();
        assert_eq!(stored.settlement_issues.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_transfer_is_not_overwritten_as_completed() {
        let store = store().await;
        let transfer = credit_transfer();
        store.create_transfer(transfer.clone()).await.unwrap();
        store
            .transition_transfer_status(
                transfer.id,
                TransferStatus::Pending,
                TransferStatus::Cancelled,
                None,
            )
            .await
            .unwrap();

        let settler = Settler::new(store.clone(), Arc::new(SystemClock));
        let settled = settler.settle(transfer, Parties::default()).await;

        assert_eq!(settled.status, TransferStatus::Cancelled);
        assert!(
            settled
                .settlement_issues
                .iter()
                .any(|issue| issue.step == SettlementStep::MarkCompleted)
        );
        let stored = store.get_transfer(settled.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Cancelled);
        assert!(stored.executed_at.is_none());
        assert!(!stored.settlement_issues.is_empty());
    }
}
