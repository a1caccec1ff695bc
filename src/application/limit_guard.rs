use crate::domain::limit::LimitCategory;
use crate::domain::ports::StoreHandle;
use crate::error::Result;
use rust_decimal::Decimal;

/// Checks an amount against the customer's spending policy.
#[derive(Clone)]
pub struct LimitGuard {
    store: StoreHandle,
}

impl LimitGuard {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// A customer without a policy has no limit.
    pub async fn check(
        &self,
        customer_id: &str,
        category: LimitCategory,
        amount: Decimal,
    ) -> Result<()> {
        match self.store.get_limit(customer_id, category).await? {
            Some(policy) => policy.check(amount),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::limit::LimitPolicy;
    use crate::domain::ports::SeedStore;
    use crate::error::PaymentError;
    use crate::infrastructure::in_memory::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_policy_means_no_limit() {
        let guard = LimitGuard::new(Arc::new(InMemoryStore::new()));
        assert!(guard
            .check("cust-1", LimitCategory::Pix, dec!(1_000_000))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_policy_is_enforced() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_limit(LimitPolicy {
                customer_id: "cust-1".into(),
                category: LimitCategory::Pix,
                single_limit: dec!(500),
                daily_limit: dec!(5000),
                daily_used: dec!(0),
            })
            .await
            .unwrap();
        let guard = LimitGuard::new(store);
        assert!(matches!(
            guard.check("cust-1", LimitCategory::Pix, dec!(501)).await,
            Err(PaymentError::LimitExceeded { which: "single_pix", .. })
        ));
    }
}
