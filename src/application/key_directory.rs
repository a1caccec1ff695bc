use crate::domain::account::PartyIdentity;
use crate::domain::clock::Clock;
use crate::domain::key::{KeyStatus, KeyType, PayeeKey, detect_key_type, display_value};
use crate::domain::ports::StoreHandle;
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Where a transfer's money is going.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// The key is registered with us.
    Internal(PayeeKey),
    /// Unknown key; treated as an external payee.
    External,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyLookup {
    pub key_type: KeyType,
    pub value: String,
    pub display_value: String,
    pub owner: PartyIdentity,
}

/// Resolves and registers payee keys.
#[derive(Clone)]
pub struct KeyDirectory {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
}

impl KeyDirectory {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Finds the key bound to `value`. The type is inferred when omitted;
    /// when it cannot be inferred the lookup matches on the value alone.
    pub async fn resolve(&self, key_type: Option<KeyType>, value: &str) -> Result<PayeeKey> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PaymentError::validation("key", "key is required"));
        }

        let found = match key_type.or_else(|| detect_key_type(value)) {
            Some(KeyType::Unresolved) | None => self.store.find_key_by_value(value).await?,
            Some(kind) => self.store.find_key(kind, value).await?,
        };

        found
            .filter(|key| key.status == KeyStatus::Active)
            .ok_or_else(|| PaymentError::not_found("pix key", value))
    }

    /// Like [`resolve`](Self::resolve), but an unknown key is a valid
    /// external payee rather than an error. Store failures still propagate.
    pub async fn destination(&self, key_type: Option<KeyType>, value: &str) -> Result<Destination> {
        match self.resolve(key_type, value).await {
            Ok(key) => Ok(Destination::Internal(key)),
            Err(err) if err.is_not_found() => Ok(Destination::External),
            Err(err) => Err(err),
        }
    }

    /// The wire type recorded on a transfer: supplied, inferred, or `manual`.
    pub fn effective_type(key_type: Option<KeyType>, value: &str) -> KeyType {
        key_type
            .or_else(|| detect_key_type(value))
            .unwrap_or(KeyType::Unresolved)
    }

    pub async fn lookup(&self, key_type: Option<KeyType>, value: &str) -> Result<KeyLookup> {
        let key = self.resolve(key_type, value).await?;
        let owner = self
            .store
            .get_customer(&key.customer_id)
            .await?
            .map(|customer| customer.identity)
            .unwrap_or_default();
        Ok(KeyLookup {
            key_type: key.key_type,
            display_value: display_value(key.key_type, &key.value),
            value: key.value,
            owner,
        })
    }

    /// Binds a new key to the customer's primary account.
    pub async fn register(
        &self,
        customer_id: &str,
        key_type: KeyType,
        value: Option<String>,
    ) -> Result<PayeeKey> {
        if customer_id.trim().is_empty() {
            return Err(PaymentError::validation("customer_id", "required"));
        }
        if !key_type.is_registrable() {
            return Err(PaymentError::validation(
                "key_type",
                "must be cnpj, email, phone or random",
            ));
        }

        let account = self
            .store
            .primary_account(customer_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("account", customer_id))?;

        let value = match (key_type, value) {
            (KeyType::RandomToken, _) => Uuid::new_v4().to_string(),
            (_, Some(v)) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                return Err(PaymentError::validation(
                    "key_value",
                    "required for non-random key type",
                ));
            }
        };

        let key = PayeeKey {
            id: Uuid::new_v4().to_string(),
            account_id: account.id,
            customer_id: customer_id.to_string(),
            key_type,
            value,
            status: KeyStatus::Active,
            created_at: self.clock.now(),
        };

        self.store.insert_key(key.clone()).await.inspect_err(|err| {
            tracing::error!(customer_id, key_type = %key_type, error = %err, "failed to register pix key");
        })?;
        tracing::info!(customer_id, key_type = %key_type, key_id = %key.id, "pix key registered");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, Customer};
    use crate::domain::clock::SystemClock;
    use crate::domain::money::Balance;
    use crate::domain::ports::SeedStore;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;

    async fn directory() -> (KeyDirectory, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_customer(Customer {
                id: "cust-1".into(),
                identity: PartyIdentity {
                    name: "Acme Ltda".into(),
                    ..Default::default()
                },
                primary_account_id: "acc-1".into(),
            })
            .await
            .unwrap();
        store
            .upsert_account(Account::new("acc-1", "cust-1", Balance::new(dec!(100))))
            .await
            .unwrap();
        let handle: StoreHandle = store.clone();
        (KeyDirectory::new(handle, Arc::new(SystemClock)), store)
    }

    #[tokio::test]
    async fn test_register_and_resolve_by_inferred_type() {
        let (keys, _) = directory().await;
        let key = keys
            .register("cust-1", KeyType::Email, Some("billing@acme.com".into()))
            .await
            .unwrap();
        assert_eq!(key.account_id, "acc-1");

        let resolved = keys.resolve(None, "billing@acme.com").await.unwrap();
        assert_eq!(resolved.id, key.id);

        let lookup = keys.lookup(None, "billing@acme.com").await.unwrap();
        assert_eq!(lookup.owner.name, "Acme Ltda");
    }

    #[tokio::test]
    async fn test_register_random_generates_value() {
        let (keys, _) = directory().await;
        let key = keys
            .register("cust-1", KeyType::RandomToken, None)
            .await
            .unwrap();
        assert_eq!(detect_key_type(&key.value), Some(KeyType::RandomToken));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_individual_tax_ids() {
        let (keys, _) = directory().await;
        keys.register("cust-1", KeyType::Phone, Some("+5511987654321".into()))
            .await
            .unwrap();
        let dup = keys
            .register("cust-1", KeyType::Phone, Some("+5511987654321".into()))
            .await;
        assert!(matches!(dup, Err(PaymentError::Conflict(_))));

        let cpf = keys
            .register("cust-1", KeyType::TaxIdIndividual, Some("11144477735".into()))
            .await;
        assert!(matches!(cpf, Err(PaymentError::Validation { .. })));

        let missing = keys.register("cust-1", KeyType::Email, None).await;
        assert!(matches!(missing, Err(PaymentError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_unknown_key_is_external_destination() {
        let (keys, _) = directory().await;
        assert!(matches!(
            keys.resolve(None, "nobody@else.com").await,
            Err(PaymentError::NotFound { .. })
        ));
        assert_eq!(
            keys.destination(None, "nobody@else.com").await.unwrap(),
            Destination::External
        );
        assert!(matches!(
            keys.resolve(None, "  ").await,
            Err(PaymentError::Validation { .. })
        ));
    }

    #[test]
    fn test_effective_type_falls_back_to_manual() {
        assert_eq!(KeyDirectory::effective_type(None, "abc"), KeyType::Unresolved);
        assert_eq!(
            KeyDirectory::effective_type(Some(KeyType::Email), "abc"),
            KeyType::Email
        );
    }
}
