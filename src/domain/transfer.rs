use super::funding::{FundingPlan, FundingSource};
use super::key::KeyType;
use super::money::Amount;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a persisted transfer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    /// Pending is the only state a transfer can be cancelled from.
    pub fn ensure_cancellable(&self) -> Result<(), PaymentError> {
        if self.is_terminal() {
            return Err(PaymentError::validation(
                "status",
                format!("cannot cancel transfer with status '{self}'"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End-to-end identifier shown to both parties: `E` followed by 31 hex chars.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("E{}", &hex[..31]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw request as handed over by the transport layer.
///
/// Fields are deliberately loose (empty strings, raw decimals); the
/// orchestrator's validation step turns this into a [`ValidatedRequest`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct TransferRequest {
    pub idempotency_key: String,
    pub source_account_id: String,
    pub destination_key_type: Option<KeyType>,
    pub destination_key_value: String,
    pub amount: Decimal,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub funding_source: Option<FundingSource>,
    #[serde(default)]
    pub credit_line_id: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
    #[serde(default)]
    pub fee_rate: Option<Decimal>,
}

/// A request that passed field validation.
#[derive(Debug, PartialEq, Clone)]
pub struct ValidatedRequest {
    pub idempotency_key: String,
    pub source_account_id: String,
    pub destination_key_type: Option<KeyType>,
    pub destination_key_value: String,
    pub amount: Amount,
    pub memo: Option<String>,
    pub funding_source: FundingSource,
    pub credit_line_id: Option<String>,
    pub installments: Option<i32>,
    pub fee_rate: Option<Decimal>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<ValidatedRequest, PaymentError> {
        let amount = Amount::new(self.amount)?;
        let destination = self.destination_key_value.trim();
        if destination.is_empty() {
            return Err(PaymentError::validation("destination_key_value", "required"));
        }
        if self.idempotency_key.trim().is_empty() {
            return Err(PaymentError::validation("idempotency_key", "required"));
        }
        if self.source_account_id.trim().is_empty() {
            return Err(PaymentError::validation("source_account_id", "required"));
        }
        Ok(ValidatedRequest {
            idempotency_key: self.idempotency_key.trim().to_string(),
            source_account_id: self.source_account_id.trim().to_string(),
            destination_key_type: self.destination_key_type,
            destination_key_value: destination.to_string(),
            amount,
            memo: self.memo.clone().filter(|m| !m.trim().is_empty()),
            funding_source: self.funding_source.unwrap_or_default(),
            credit_line_id: self.credit_line_id.clone().filter(|id| !id.is_empty()),
            installments: self.installments,
            fee_rate: self.fee_rate,
        })
    }
}

/// Settlement sub-step that can fail after the transfer was persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStep {
    DebitSender,
    SenderHistory,
    CreditLineStatement,
    CreditRecipient,
    RecipientHistory,
    MarkCompleted,
    SenderReceipt,
    RecipientReceipt,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SettlementIssue {
    pub step: SettlementStep,
    pub error: String,
}

/// Persisted transfer record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transfer {
    pub id: Uuid,
    pub idempotency_key: String,
    pub source_account_id: String,
    pub source_customer_id: String,
    pub destination_key_type: KeyType,
    pub destination_key_value: String,
    pub destination_name: Option<String>,
    pub destination_document: Option<String>,
    pub destination_customer_id: Option<String>,
    pub destination_account_id: Option<String>,
    pub amount: Amount,
    pub memo: Option<String>,
    pub funding: FundingPlan,
    pub status: TransferStatus,
    pub end_to_end_id: CorrelationId,
    pub receipt_id: Option<Uuid>,
    #[serde(default)]
    pub settlement_issues: Vec<SettlementIssue>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn is_internal(&self) -> bool {
        self.destination_account_id.is_some()
    }

    pub fn total_with_fees(&self) -> Decimal {
        self.funding.debit_total()
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {}:{} amount={} status={}",
            self.id,
            self.source_account_id,
            self.destination_key_type,
            self.destination_key_value,
            self.amount,
            self.status
        )
    }
}
