use crate::domain::assistant::{AgentRequest, AssistantResult, CustomerProfile};
use crate::domain::clock::Clock;
use crate::domain::ports::{
    AgentCaller, AgentCallerBox, ProfileFetcher, ProfileFetcherBox, TransactionsFetcher,
    TransactionsFetcherBox,
};
use crate::error::{PaymentError, Result};
use crate::infrastructure::cache::TtlCache;
use std::sync::Arc;

/// Read-only assistant path: profile and history in parallel, then the agent.
#[derive(Clone)]
pub struct Assistant {
    profiles: Arc<dyn ProfileFetcher>,
    transactions: Arc<dyn TransactionsFetcher>,
    agent: Arc<dyn AgentCaller>,
    cache: TtlCache<CustomerProfile>,
    clock: Arc<dyn Clock>,
}

impl Assistant {
    pub fn new(
        profiles: ProfileFetcherBox,
        transactions: TransactionsFetcherBox,
        agent: AgentCallerBox,
        cache: TtlCache<CustomerProfile>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles: Arc::from(profiles),
            transactions: Arc::from(transactions),
            agent: Arc::from(agent),
            cache,
            clock,
        }
    }

    pub async fn profile(&self, customer_id: &str) -> Result<CustomerProfile> {
        let cache_key = format!("profile:{customer_id}");
        if let Some(profile) = self.cache.get(&cache_key).await {
            tracing::debug!(customer_id, "profile cache hit");
            return Ok(profile);
        }
        let profile = self.profiles.get_profile(customer_id).await.inspect_err(|err| {
            tracing::error!(customer_id, error = %err, "failed to fetch profile");
        })?;
        self.cache.set(cache_key, profile.clone()).await;
        Ok(profile)
    }

    /// Fails as a whole if either fetch fails; no partial answer is produced.
    pub async fn respond(&self, customer_id: &str, query: Option<String>) -> Result<AssistantResult> {
        if customer_id.trim().is_empty() {
            return Err(PaymentError::validation("customer_id", "required"));
        }

        let history = async {
            self.transactions
                .get_transactions(customer_id)
                .await
                .inspect_err(|err| {
                    tracing::error!(customer_id, error = %err, "failed to fetch transactions");
                })
        };
        let (profile, transactions) = tokio::try_join!(self.profile(customer_id), history)?;

        let request = AgentRequest {
            customer_id: customer_id.to_string(),
            profile: profile.clone(),
            transactions,
            query,
        };
        let recommendation = self.agent.call(&request).await.inspect_err(|err| {
            tracing::error!(customer_id, error = %err, "agent call failed");
        })?;
        tracing::info!(
            customer_id,
            prompt_tokens = recommendation.tokens_used.prompt_tokens,
            completion_tokens = recommendation.tokens_used.completion_tokens,
            "assistant response ready"
        );

        Ok(AssistantResult {
            customer_id: customer_id.to_string(),
            profile,
            recommendation,
            processed_at: self.clock.now(),
        })
    }
}
