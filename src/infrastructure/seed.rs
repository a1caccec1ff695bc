//! JSON seed files used to populate a store for local runs and tests.

use crate::domain::account::{Account, CreditLine, Customer};
use crate::domain::key::PayeeKey;
use crate::domain::limit::LimitPolicy;
use crate::domain::ports::StoreHandle;
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct SeedData {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub keys: Vec<PayeeKey>,
    #[serde(default)]
    pub limits: Vec<LimitPolicy>,
    #[serde(default)]
    pub credit_lines: Vec<CreditLine>,
}

impl SeedData {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Writes every entity into the store. Safe to apply twice: upserts
    /// overwrite and keys that are already bound are skipped.
    pub async fn apply(&self, store: &StoreHandle) -> Result<()> {
        for customer in &self.customers {
            store.upsert_customer(customer.clone()).await?;
        }
        for account in &self.accounts {
            store.upsert_account(account.clone()).await?;
        }
        for policy in &self.limits {
            store.upsert_limit(policy.clone()).await?;
        }
        for line in &self.credit_lines {
            store.upsert_credit_line(line.clone()).await?;
        }
        for key in &self.keys {
            match store.insert_key(key.clone()).await {
                Ok(()) | Err(PaymentError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }
        tracing::info!(
            customers = self.customers.len(),
            accounts = self.accounts.len(),
            keys = self.keys.len(),
            "seed data applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::domain::key::KeyType;
    use crate::domain::money::Balance;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const SEED: &str = r#"{
        "customers": [{
            "id": "cust-1",
            "identity": {"name": "Ana Lima", "document": "11144477735", "bank": "Pixflow", "branch": "0001", "account": "12345-6"},
            "primary_account_id": "acc-1"
        }],
        "accounts": [{
            "id": "acc-1", "customer_id": "cust-1",
            "balance": "1000.00", "available_balance": "1000.00"
        }],
        "keys": [{
            "id": "key-1", "account_id": "acc-1", "customer_id": "cust-1",
            "key_type": "email", "value": "ana@lima.com",
            "created_at": "2026-01-01T00:00:00Z"
        }]
    }"#;

    #[tokio::test]
    async fn test_apply_seed_is_repeatable() {
        let seed = SeedData::from_json(SEED).unwrap();
        let store = InMemoryStore::new();
        let handle: StoreHandle = Arc::new(store.clone());

        seed.apply(&handle).await.unwrap();
        seed.apply(&handle).await.unwrap();

        let account = handle.get_account("acc-1").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(1000)));
        let key = handle
            .find_key(KeyType::Email, "ana@lima.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.customer_id, "cust-1");
    }

    #[test]
    fn test_invalid_seed_is_rejected() {
        assert!(SeedData::from_json("{\"accounts\": 3}").is_err());
    }
}
