use super::key_directory::{Destination, KeyDirectory};
use super::limit_guard::LimitGuard;
use super::orchestrator::TransferOrchestrator;
use crate::domain::clock::Clock;
use crate::domain::limit::LimitCategory;
use crate::domain::ports::StoreHandle;
use crate::domain::schedule::{
    Recurrence, ScheduleStatus, ScheduledTransfer, ScheduledTransferRequest, parse_future_date,
};
use crate::error::{PaymentError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one pass of the due runner.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct RunSummary {
    pub due: usize,
    pub executed: usize,
    pub failed: usize,
    pub transfers: Vec<Uuid>,
}

/// Future-dated and recurring transfer instructions.
#[derive(Clone)]
pub struct ScheduledTransfers {
    store: StoreHandle,
    keys: KeyDirectory,
    limits: LimitGuard,
    orchestrator: TransferOrchestrator,
    clock: Arc<dyn Clock>,
}

impl ScheduledTransfers {
    pub fn new(store: StoreHandle, orchestrator: TransferOrchestrator, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: orchestrator.keys().clone(),
            limits: LimitGuard::new(store.clone()),
            store,
            orchestrator,
            clock,
        }
    }

    pub async fn create(
        &self,
        customer_id: &str,
        request: ScheduledTransferRequest,
    ) -> Result<ScheduledTransfer> {
        let validated = request.as_transfer_request().validate()?;
        let today = self.clock.today();
        let scheduled_date = parse_future_date("scheduled_date", &request.scheduled_date, today)?;
        let recurrence_end_date = match request.recurrence_end_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let end = parse_future_date("recurrence_end_date", raw, today)?;
                if end < scheduled_date {
                    return Err(PaymentError::validation(
                        "recurrence_end_date",
                        "must not be before scheduled_date",
                    ));
                }
                Some(end)
            }
            _ => None,
        };
        if request.max_occurrences == Some(0) {
            return Err(PaymentError::validation(
                "max_occurrences",
                "must be at least 1",
            ));
        }

        if let Some(existing) = self
            .store
            .find_scheduled_by_token(customer_id, &validated.idempotency_key)
            .await?
        {
            return Ok(existing);
        }

        self.orchestrator
            .owned_account(customer_id, &validated.source_account_id)
            .await?;
        let destination_name = match self
            .keys
            .destination(validated.destination_key_type, &validated.destination_key_value)
            .await?
        {
            Destination::Internal(key) if key.customer_id == customer_id => {
                return Err(PaymentError::validation(
                    "destination_key_value",
                    "cannot pay yourself",
                ));
            }
            Destination::Internal(key) => self
                .store
                .get_customer(&key.customer_id)
                .await?
                .map(|customer| customer.identity.name),
            Destination::External => None,
        };
        self.limits
            .check(customer_id, LimitCategory::Pix, validated.amount.value())
            .await?;

        let now = self.clock.now();
        let scheduled = ScheduledTransfer {
            id: Uuid::new_v4(),
            idempotency_key: validated.idempotency_key.clone(),
            customer_id: customer_id.to_string(),
            source_account_id: validated.source_account_id,
            destination_key_type: validated.destination_key_type,
            destination_key_value: validated.destination_key_value,
            destination_name,
            amount: validated.amount.value(),
            memo: validated.memo,
            funding_source: validated.funding_source,
            credit_line_id: validated.credit_line_id,
            installments: validated.installments,
            scheduled_date,
            next_execution_date: scheduled_date,
            recurrence: request.recurrence.unwrap_or(Recurrence::Once),
            recurrence_end_date,
            max_occurrences: request.max_occurrences,
            occurrences: 0,
            status: ScheduleStatus::Scheduled,
            last_failure_reason: None,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.store.create_scheduled(scheduled.clone()).await {
            return match err {
                PaymentError::Conflict(_) => self
                    .store
                    .find_scheduled_by_token(customer_id, &validated.idempotency_key)
                    .await?
                    .ok_or(err),
                other => Err(other),
            };
        }
        tracing::info!(
            customer_id,
            schedule_id = %scheduled.id,
            date = %scheduled.scheduled_date,
            recurrence = ?scheduled.recurrence,
            "scheduled pix transfer created"
        );
        Ok(scheduled)
    }

    pub async fn get(&self, customer_id: &str, id: Uuid) -> Result<ScheduledTransfer> {
        self.store
            .get_scheduled(id)
            .await?
            .filter(|s| s.customer_id == customer_id)
            .ok_or_else(|| PaymentError::not_found("scheduled transfer", id.to_string()))
    }

    pub async fn list(&self, customer_id: &str) -> Result<Vec<ScheduledTransfer>> {
        self.store.list_scheduled(customer_id).await
    }

    pub async fn cancel(&self, customer_id: &str, id: Uuid) -> Result<()> {
        let scheduled = self.get(customer_id, id).await?;
        scheduled.status.ensure_cancellable()?;
        self.store
            .update_scheduled_status(id, ScheduleStatus::Cancelled)
            .await?;
        tracing::info!(customer_id, schedule_id = %id, "scheduled pix transfer cancelled");
        Ok(())
    }

    pub async fn pause(&self, customer_id: &str, id: Uuid) -> Result<()> {
        let scheduled = self.get(customer_id, id).await?;
        scheduled.status.ensure_pausable()?;
        self.store
            .update_scheduled_status(id, ScheduleStatus::Paused)
            .await?;
        tracing::info!(customer_id, schedule_id = %id, "scheduled pix transfer paused");
        Ok(())
    }

    /// Paused back to scheduled. A missed execution date moves to today.
    pub async fn resume(&self, customer_id: &str, id: Uuid) -> Result<()> {
        let mut scheduled = self.get(customer_id, id).await?;
        scheduled.status.ensure_resumable()?;
        scheduled.status = ScheduleStatus::Scheduled;
        scheduled.next_execution_date = scheduled.next_execution_date.max(self.clock.today());
        scheduled.updated_at = self.clock.now();
        self.store.update_scheduled(scheduled).await?;
        tracing::info!(customer_id, schedule_id = %id, "scheduled pix transfer resumed");
        Ok(())
    }

    /// Executes every instruction due on or before `today`.
    ///
    /// Each occurrence is submitted with the token `<id>:<occurrence>`, so
    /// running this twice for the same day pays nothing twice.
    pub async fn run_due(&self, today: NaiveDate) -> Result<RunSummary> {
        let due = self.store.list_due(today).await?;
        let mut summary = RunSummary {
            due: due.len(),
            ..Default::default()
        };

        for mut scheduled in due {
            let outcome = self
                .orchestrator
                .submit(&scheduled.customer_id, scheduled.to_transfer_request())
                .await;
            let succeeded = match outcome {
                Ok(transfer) => {
                    summary.executed += 1;
                    summary.transfers.push(transfer.id);
                    true
                }
                Err(err) => {
                    tracing::warn!(schedule_id = %scheduled.id, error = %err, "scheduled pix transfer rejected");
                    summary.failed += 1;
                    scheduled.last_failure_reason = Some(err.to_string());
                    false
                }
            };

            let status = scheduled.advance(succeeded, self.clock.now());
            let schedule_id = scheduled.id;
            if let Err(err) = self.store.update_scheduled(scheduled).await {
                tracing::error!(%schedule_id, error = %err, "failed to advance scheduled transfer");
            } else {
                tracing::debug!(%schedule_id, %status, "scheduled pix transfer advanced");
            }
        }

        tracing::info!(
            %today,
            due = summary.due,
            executed = summary.executed,
            failed = summary.failed,
            "scheduled run finished"
        );
        Ok(summary)
    }
}
