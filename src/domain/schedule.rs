use super::funding::FundingSource;
use super::key::KeyType;
use super::transfer::TransferRequest;
use crate::error::PaymentError;
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    Once,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Recurrence {
    /// Next execution date after `from`, `None` for one-shot instructions.
    pub fn advance(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            Recurrence::Once => None,
            Recurrence::Daily => from.checked_add_days(Days::new(1)),
            Recurrence::Weekly => from.checked_add_days(Days::new(7)),
            Recurrence::Biweekly => from.checked_add_days(Days::new(14)),
            Recurrence::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Paused,
    Cancelled,
    Executed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Cancelled => "cancelled",
            ScheduleStatus::Executed => "executed",
        }
    }

    pub fn ensure_cancellable(&self) -> Result<(), PaymentError> {
        match self {
            ScheduleStatus::Scheduled | ScheduleStatus::Paused => Ok(()),
            other => Err(PaymentError::validation(
                "status",
                format!("cannot cancel scheduled transfer with status '{other}'"),
            )),
        }
    }

    pub fn ensure_pausable(&self) -> Result<(), PaymentError> {
        match self {
            ScheduleStatus::Scheduled => Ok(()),
            other => Err(PaymentError::validation(
                "status",
                format!("cannot pause scheduled transfer with status '{other}'"),
            )),
        }
    }

    pub fn ensure_resumable(&self) -> Result<(), PaymentError> {
        match self {
            ScheduleStatus::Paused => Ok(()),
            other => Err(PaymentError::validation(
                "status",
                format!("cannot resume scheduled transfer with status '{other}'"),
            )),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a `YYYY-MM-DD` date that must not lie before `today`.
pub fn parse_future_date(field: &str, raw: &str, today: NaiveDate) -> Result<NaiveDate, PaymentError> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| PaymentError::validation(field, "invalid date format, use YYYY-MM-DD"))?;
    if date < today {
        return Err(PaymentError::validation(
            field,
            "must be today or in the future",
        ));
    }
    Ok(date)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct ScheduledTransferRequest {
    pub idempotency_key: String,
    pub source_account_id: String,
    pub destination_key_type: Option<KeyType>,
    pub destination_key_value: String,
    pub amount: Decimal,
    #[serde(default)]
    pub memo: Option<String>,
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

impl ScheduledTransferRequest {
    /// The immediate-transfer view of this instruction, used for the shared
    /// field validation.
    pub fn as_transfer_request(&self) -> TransferRequest {
        TransferRequest {
            idempotency_key: self.idempotency_key.clone(),
            source_account_id: self.source_account_id.clone(),
            destination_key_type: self.destination_key_type,
            destination_key_value: self.destination_key_value.clone(),
            amount: self.amount,
            memo: self.memo.clone(),
            funding_source: self.funding_source,
            credit_line_id: self.credit_line_id.clone(),
            installments: self.installments,
            fee_rate: None,
        }
    }
}

/// A persisted future-dated (and possibly recurring) transfer instruction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ScheduledTransfer {
    pub id: Uuid,
    pub idempotency_key: String,
    pub customer_id: String,
    pub source_account_id: String,
    pub destination_key_type: Option<KeyType>,
    pub destination_key_value: String,
    pub destination_name: Option<String>,
    pub amount: Decimal,
    pub memo: Option<String>,
    pub funding_source: FundingSource,
    pub credit_line_id: Option<String>,
    pub installments: Option<i32>,
    pub scheduled_date: NaiveDate,
    pub next_execution_date: NaiveDate,
    pub recurrence: Recurrence,
    pub recurrence_end_date: Option<NaiveDate>,
    pub max_occurrences: Option<u32>,
    #[serde(default)]
    pub occurrences: u32,
    pub status: ScheduleStatus,
    pub last_failure_reason: Option<String>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTransfer {
    /// Idempotency token of the occurrence currently due.
    ///
    /// Stable until the occurrence succeeds, so a re-run of the due runner
    /// replays instead of paying twice.
    pub fn occurrence_token(&self) -> String {
        format!("{}:{}", self.id, self.occurrences + 1)
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == ScheduleStatus::Scheduled && self.next_execution_date <= today
    }

    pub fn to_transfer_request(&self) -> TransferRequest {
        TransferRequest {
            idempotency_key: self.occurrence_token(),
            source_account_id: self.source_account_id.clone(),
            destination_key_type: self.destination_key_type,
            destination_key_value: self.destination_key_value.clone(),
            amount: self.amount,
            memo: self.memo.clone(),
            funding_source: Some(self.funding_source),
            credit_line_id: self.credit_line_id.clone(),
            installments: self.installments,
            fee_rate: None,
        }
    }

    /// Moves past the occurrence that was just attempted.
    ///
    /// Returns the new status: still `Scheduled` while occurrences remain,
    /// otherwise `Executed`, or `Cancelled` when nothing was ever paid.
    pub fn advance(&mut self, succeeded: bool, now: DateTime<Utc>) -> ScheduleStatus {
        if succeeded {
            self.occurrences += 1;
            self.last_executed_at = Some(now);
            self.last_failure_reason = None;
        }
        self.updated_at = now;

        let next = self
            .recurrence
            .advance(self.next_execution_date)
            .filter(|next| self.recurrence_end_date.is_none_or(|end| *next <= end))
            .filter(|_| self.max_occurrences.is_none_or(|max| self.occurrences < max));

        match next {
            Some(date) => {
                self.next_execution_date = date;
                self.status = ScheduleStatus::Scheduled;
            }
            None if self.occurrences == 0 => self.status = ScheduleStatus::Cancelled,
            None => self.status = ScheduleStatus::Executed,
        }
        self.status
    }
}
