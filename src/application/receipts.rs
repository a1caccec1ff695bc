use crate::domain::ports::StoreHandle;
use crate::domain::receipt::Receipt;
use crate::error::{PaymentError, Result};
use uuid::Uuid;

/// Read access to receipts. Receipts are written only by settlement.
#[derive(Clone)]
pub struct Receipts {
    store: StoreHandle,
}

impl Receipts {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn get(&self, customer_id: &str, id: Uuid) -> Result<Receipt> {
        self.store
            .get_receipt(id)
            .await?
            .filter(|r| r.customer_id == customer_id)
            .ok_or_else(|| PaymentError::not_found("receipt", id.to_string()))
    }

    /// The payer's receipt of one of the caller's transfers.
    pub async fn by_transfer(&self, customer_id: &str, transfer_id: Uuid) -> Result<Receipt> {
        self.store
            .receipt_for_transfer(transfer_id)
            .await?
            .filter(|r| r.customer_id == customer_id)
            .ok_or_else(|| PaymentError::not_found("receipt", transfer_id.to_string()))
    }

    pub async fn list(&self, customer_id: &str) -> Result<Vec<Receipt>> {
        self.store.list_receipts(customer_id).await
    }
}
