use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    PixSent,
    PixReceived,
}

/// One customer-visible history row.
///
/// Only constructible through [`TransactionRecord::sent`] and
/// [`TransactionRecord::received`], so sign, kind and category always agree.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub customer_id: String,
    pub kind: RecordKind,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    pub transfer_id: Uuid,
}

impl TransactionRecord {
    /// Outgoing row; `debited` is stored negated.
    pub fn sent(
        customer_id: &str,
        transfer_id: Uuid,
        counterparty: &str,
        debited: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            kind: RecordKind::PixSent,
            date: at,
            description: format!("Pix sent - {counterparty}"),
            amount: -debited.abs(),
            category: "pix".to_string(),
            transfer_id,
        }
    }

    pub fn received(
        customer_id: &str,
        transfer_id: Uuid,
        counterparty: &str,
        credited: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            kind: RecordKind::PixReceived,
            date: at,
            description: format!("Pix received - {counterparty}"),
            amount: credited.abs(),
            category: "received".to_string(),
            transfer_id,
        }
    }
}

/// Statement line on a credit line for a credit-funded transfer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CreditLineEntry {
    pub id: Uuid,
    pub credit_line_id: String,
    pub customer_id: String,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub description: String,
    pub installments: u32,
    pub current_installment: u32,
    pub entry_type: String,
    pub status: String,
    pub transfer_id: Uuid,
}

impl CreditLineEntry {
    pub fn pix_credit(
        credit_line_id: &str,
        customer_id: &str,
        transfer_id: Uuid,
        counterparty: &str,
        total: Decimal,
        installments: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            credit_line_id: credit_line_id.to_string(),
            customer_id: customer_id.to_string(),
            date: at,
            amount: total,
            description: format!("Pix via credit card - {counterparty}"),
            installments,
            current_installment: 1,
            entry_type: "pix_credit".to_string(),
            status: "confirmed".to_string(),
            transfer_id,
        }
    }
}
