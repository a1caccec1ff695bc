//! Wire shapes of the HTTP surface. Requests are camelCase and loose;
//! conversion into domain requests is where key types get parsed.

use crate::application::key_directory::KeyLookup;
use crate::domain::account::PartyIdentity;
use crate::domain::assistant::{AgentResponse, AssistantResult, CustomerProfile};
use crate::domain::funding::{FundingPlan, FundingSource, MAX_INSTALLMENTS};
use crate::domain::key::{KeyStatus, KeyType, PayeeKey, display_value};
use crate::domain::receipt::{Receipt, ReceiptDirection};
use crate::domain::schedule::{
    Recurrence, ScheduleStatus, ScheduledTransfer, ScheduledTransferRequest,
};
use crate::domain::transfer::{
    CorrelationId, SettlementIssue, Transfer, TransferRequest, TransferStatus,
};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn parse_key_type(field: &str, raw: Option<&str>) -> Result<Option<KeyType>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<KeyType>()
            .map(Some)
            .map_err(|msg: String| PaymentError::validation(field, msg)),
    }
}

/// Header token wins over the body field.
fn pick_token(header: Option<String>, body: Option<String>) -> String {
    header
        .filter(|t| !t.trim().is_empty())
        .or(body)
        .unwrap_or_default()
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub source_account_id: String,
    #[serde(default, alias = "recipientKeyType")]
    pub destination_key_type: Option<String>,
    #[serde(default, alias = "recipientKey")]
    pub destination_key_value: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default, alias = "description")]
    pub memo: Option<String>,
    #[serde(default)]
    pub funding_source: Option<FundingSource>,
    #[serde(default)]
    pub credit_line_id: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
}

impl TransferBody {
    pub fn into_request(self, header_token: Option<String>) -> Result<TransferRequest> {
        Ok(TransferRequest {
            idempotency_key: pick_token(header_token, self.idempotency_key),
            source_account_id: self.source_account_id,
            destination_key_type: parse_key_type(
                "destination_key_type",
                self.destination_key_type.as_deref(),
            )?,
            destination_key_value: self.destination_key_value,
            amount: self.amount,
            memo: self.memo,
            funding_source: self.funding_source,
            credit_line_id: self.credit_line_id,
            installments: self.installments,
            fee_rate: None,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardBody {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub source_account_id: String,
    #[serde(default, alias = "recipientKeyType")]
    pub destination_key_type: Option<String>,
    #[serde(default, alias = "recipientKey")]
    pub destination_key_value: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default, alias = "description")]
    pub memo: Option<String>,
    #[serde(default, alias = "cardId")]
    pub credit_line_id: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
}

impl CreditCardBody {
    pub fn into_request(self, header_token: Option<String>) -> Result<TransferRequest> {
        if let Some(n) = self.installments
            && !(1..=MAX_INSTALLMENTS).contains(&n)
        {
            return Err(PaymentError::validation(
                "installments",
                format!("must be between 1 and {MAX_INSTALLMENTS}"),
            ));
        }
        Ok(TransferRequest {
            idempotency_key: pick_token(header_token, self.idempotency_key),
            source_account_id: self.source_account_id,
            destination_key_type: parse_key_type(
                "destination_key_type",
                self.destination_key_type.as_deref(),
            )?,
            destination_key_value: self.destination_key_value,
            amount: self.amount,
            memo: self.memo,
            funding_source: Some(FundingSource::CreditLine),
            credit_line_id: self.credit_line_id,
            installments: self.installments,
            fee_rate: None,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientView {
    pub name: Option<String>,
    pub document: Option<String>,
    pub key_type: KeyType,
    pub key_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub original_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_with_fees: Decimal,
    pub installments: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub installment_value: Decimal,
    pub credit_line_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transfer_id: Uuid,
    pub status: TransferStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub funding_source: FundingSource,
    pub recipient: RecipientView,
    pub e2e_id: CorrelationId,
    pub receipt_id: Option<Uuid>,
    pub memo: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub settlement_issues: Vec<SettlementIssue>,
    #[serde(flatten)]
    pub fees: Option<FeeBreakdown>,
}

impl From<&Transfer> for TransferResponse {
    fn from(t: &Transfer) -> Self {
        let fees = match &t.funding {
            FundingPlan::Balance { .. } => None,
            FundingPlan::CreditLine {
                credit_line_id,
                plan,
            } => Some(FeeBreakdown {
                original_amount: plan.amount,
                fee_amount: plan.fee(),
                total_with_fees: t.total_with_fees(),
                installments: plan.installments,
                installment_value: plan.installment_value(),
                credit_line_id: credit_line_id.clone(),
            }),
        };
        Self {
            transfer_id: t.id,
            status: t.status,
            amount: t.amount.value(),
            funding_source: t.funding.source(),
            recipient: RecipientView {
                name: t.destination_name.clone(),
                document: t.destination_document.clone(),
                key_type: t.destination_key_type,
                key_value: display_value(t.destination_key_type, &t.destination_key_value),
            },
            e2e_id: t.end_to_end_id.clone(),
            receipt_id: t.receipt_id,
            memo: t.memo.clone(),
            timestamp: t.created_at,
            executed_at: t.executed_at,
            settlement_issues: t.settlement_issues.clone(),
            fees,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferList {
    pub transfers: Vec<TransferResponse>,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct KeyLookupQuery {
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "type")]
    pub key_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLookupResponse {
    pub key_type: KeyType,
    pub key_value: String,
    pub display_value: String,
    pub owner: PartyIdentity,
}

impl From<KeyLookup> for KeyLookupResponse {
    fn from(lookup: KeyLookup) -> Self {
        Self {
            key_type: lookup.key_type,
            key_value: lookup.value,
            display_value: lookup.display_value,
            owner: lookup.owner,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterKeyBody {
    #[serde(default)]
    pub key_type: String,
    #[serde(default)]
    pub key_value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayeeKeyResponse {
    pub key_id: String,
    pub account_id: String,
    pub key_type: KeyType,
    pub key_value: String,
    pub display_value: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

impl From<PayeeKey> for PayeeKeyResponse {
    fn from(key: PayeeKey) -> Self {
        Self {
            display_value: display_value(key.key_type, &key.value),
            key_id: key.id,
            account_id: key.account_id,
            key_type: key.key_type,
            key_value: key.value,
            status: key.status,
            created_at: key.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub source_account_id: String,
    #[serde(default, alias = "recipientKeyType")]
    pub destination_key_type: Option<String>,
    #[serde(default, alias = "recipientKey")]
    pub destination_key_value: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default, alias = "description")]
    pub memo: Option<String>,
    #[serde(default)]
    pub scheduled_date: String,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub recurrence_end_date: Option<String>,
    #[serde(default)]
    pub max_occurrences: Option<u32>,
    #[serde(default)]
    pub funding_source: Option<FundingSource>,
    #[serde(default)]
    pub credit_line_id: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
}

impl ScheduleBody {
    pub fn into_request(self, header_token: Option<String>) -> Result<ScheduledTransferRequest> {
        Ok(ScheduledTransferRequest {
            idempotency_key: pick_token(header_token, self.idempotency_key),
            source_account_id: self.source_account_id,
            destination_key_type: parse_key_type(
                "destination_key_type",
                self.destination_key_type.as_deref(),
            )?,
            destination_key_value: self.destination_key_value,
            amount: self.amount,
            memo: self.memo,
            scheduled_date: self.scheduled_date,
            recurrence: self.recurrence,
            recurrence_end_date: self.recurrence_end_date,
            max_occurrences: self.max_occurrences,
            funding_source: self.funding_source,
            credit_line_id: self.credit_line_id,
            installments: self.installments,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub schedule_id: Uuid,
    pub status: ScheduleStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub destination_key_value: String,
    pub destination_name: Option<String>,
    pub funding_source: FundingSource,
    pub scheduled_date: NaiveDate,
    pub next_execution_date: NaiveDate,
    pub recurrence: Recurrence,
    pub recurrence_end_date: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
    pub occurrences: u32,
    pub last_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ScheduledTransfer> for ScheduleResponse {
    fn from(s: &ScheduledTransfer) -> Self {
        Self {
            schedule_id: s.id,
            status: s.status,
            amount: s.amount,
            destination_key_value: s.destination_key_value.clone(),
            destination_name: s.destination_name.clone(),
            funding_source: s.funding_source,
            scheduled_date: s.scheduled_date,
            next_execution_date: s.next_execution_date,
            recurrence: s.recurrence,
            recurrence_end_date: s.recurrence_end_date,
            max_occurrences: s.max_occurrences,
            occurrences: s.occurrences,
            last_failure_reason: s.last_failure_reason.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub receipt_id: Uuid,
    pub transfer_id: Uuid,
    pub direction: ReceiptDirection,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub sender: PartyIdentity,
    pub recipient: PartyIdentity,
    pub memo: Option<String>,
    pub e2e_id: CorrelationId,
    pub funding_source: FundingSource,
    pub installments: u32,
    pub key_type: KeyType,
    pub key_value: String,
    pub status: TransferStatus,
    pub executed_at: DateTime<Utc>,
}

impl From<&Receipt> for ReceiptResponse {
    fn from(r: &Receipt) -> Self {
        Self {
            receipt_id: r.id,
            transfer_id: r.transfer_id,
            direction: r.direction,
            amount: r.amount,
            original_amount: r.original_amount,
            fee_amount: r.fee_amount,
            total_amount: r.total_amount,
            sender: r.sender.clone(),
            recipient: r.recipient.clone(),
            memo: r.memo.clone(),
            e2e_id: r.end_to_end_id.clone(),
            funding_source: r.funding_source,
            installments: r.installments,
            key_type: r.key_type,
            key_value: display_value(r.key_type, &r.key_value),
            status: r.status,
            executed_at: r.executed_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AssistantBody {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantResponse {
    pub customer_id: String,
    pub profile: CustomerProfile,
    pub recommendation: AgentResponse,
    pub processed_at: DateTime<Utc>,
}

impl From<AssistantResult> for AssistantResponse {
    fn from(result: AssistantResult) -> Self {
        Self {
            customer_id: result.customer_id,
            profile: result.profile,
            recommendation: result.recommendation,
            processed_at: result.processed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}
