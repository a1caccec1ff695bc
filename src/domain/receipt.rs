use super::account::PartyIdentity;
use super::funding::FundingSource;
use super::key::KeyType;
use super::transfer::{CorrelationId, Transfer, TransferStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptDirection {
    Sent,
    Received,
}

/// Immutable proof of a transfer, one per party.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Receipt {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub customer_id: String,
    pub direction: ReceiptDirection,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub fee_amount: Decimal,
    pub total_amount: Decimal,
    pub sender: PartyIdentity,
    pub recipient: PartyIdentity,
    pub memo: Option<String>,
    pub end_to_end_id: CorrelationId,
    pub funding_source: FundingSource,
    pub installments: u32,
    pub key_type: KeyType,
    pub key_value: String,
    pub status: TransferStatus,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Payer's copy. Carries the installment fee when credit funded.
    pub fn for_sender(
        transfer: &Transfer,
        sender: PartyIdentity,
        recipient: PartyIdentity,
        at: DateTime<Utc>,
    ) -> Self {
        let amount = transfer.amount.value();
        let total = transfer.total_with_fees();
        Self {
            id: Uuid::new_v4(),
            transfer_id: transfer.id,
            customer_id: transfer.source_customer_id.clone(),
            direction: ReceiptDirection::Sent,
            amount,
            original_amount: amount,
            fee_amount: total - amount,
            total_amount: total,
            sender,
            recipient,
            memo: transfer.memo.clone(),
            end_to_end_id: transfer.end_to_end_id.clone(),
            funding_source: transfer.funding.source(),
            installments: transfer.funding.installments(),
            key_type: transfer.destination_key_type,
            key_value: transfer.destination_key_value.clone(),
            status: TransferStatus::Completed,
            executed_at: at,
            created_at: at,
        }
    }

    /// Payee's copy, only for internal destinations. Never shows the payer's fee.
    pub fn for_recipient(
        transfer: &Transfer,
        recipient_customer_id: &str,
        sender: PartyIdentity,
        recipient: PartyIdentity,
        at: DateTime<Utc>,
    ) -> Self {
        let amount = transfer.amount.value();
        Self {
            id: Uuid::new_v4(),
            transfer_id: transfer.id,
            customer_id: recipient_customer_id.to_string(),
            direction: ReceiptDirection::Received,
            amount,
            original_amount: amount,
            fee_amount: Decimal::ZERO,
            total_amount: amount,
            sender,
            recipient,
            memo: transfer.memo.clone(),
            end_to_end_id: transfer.end_to_end_id.clone(),
            funding_source: FundingSource::Balance,
            installments: 1,
            key_type: transfer.destination_key_type,
            key_value: transfer.destination_key_value.clone(),
            status: TransferStatus::Completed,
            executed_at: at,
            created_at: at,
        }
    }
}
