//! reqwest clients for the profile, transactions and agent services.
//!
//! Every call runs through its own [`Resilience`] guard.

use super::resilience::Resilience;
use crate::domain::assistant::{AgentRequest, AgentResponse, CustomerProfile, HistoryEntry};
use crate::domain::ports::{AgentCaller, ProfileFetcher, TransactionsFetcher};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| PaymentError::external("http", err))
}

fn transport_error(service: &'static str, operation: &'static str, err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::Timeout { operation }
    } else {
        PaymentError::external(service, err)
    }
}

async fn decode<T: DeserializeOwned>(
    service: &'static str,
    resource: &'static str,
    id: &str,
    response: reqwest::Response,
) -> Result<T> {
    match response.status() {
        StatusCode::OK => response
            .json::<T>()
            .await
            .map_err(|err| PaymentError::external(service, err)),
        StatusCode::NOT_FOUND => Err(PaymentError::not_found(resource, id)),
        status => Err(PaymentError::external(
            service,
            format!("{service} API returned status {}", status.as_u16()),
        )),
    }
}

pub struct ProfileClient {
    http: Client,
    base_url: String,
    guard: Resilience,
}

impl ProfileClient {
    pub fn new(http: Client, base_url: impl Into<String>, guard: Resilience) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            guard,
        }
    }
}

#[async_trait]
impl ProfileFetcher for ProfileClient {
    async fn get_profile(&self, customer_id: &str) -> Result<CustomerProfile> {
        let url = format!("{}/v1/customers/{}/profile", self.base_url, customer_id);
        self.guard
            .run(|| async {
                let response = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|err| transport_error("profile", "profile fetch", err))?;
                decode("profile", "profile", customer_id, response).await
            })
            .await
    }
}

pub struct TransactionsClient {
    http: Client,
    base_url: String,
    guard: Resilience,
}

impl TransactionsClient {
    pub fn new(http: Client, base_url: impl Into<String>, guard: Resilience) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            guard,
        }
    }
}

#[async_trait]
impl TransactionsFetcher for TransactionsClient {
    async fn get_transactions(&self, customer_id: &str) -> Result<Vec<HistoryEntry>> {
        let url = format!("{}/v1/customers/{}/transactions", self.base_url, customer_id);
        self.guard
            .run(|| async {
                let response = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|err| transport_error("transactions", "transactions fetch", err))?;
                decode("transactions", "transactions", customer_id, response).await
            })
            .await
    }
}

pub struct AgentClient {
    http: Client,
    base_url: String,
    guard: Resilience,
}

impl AgentClient {
    pub fn new(http: Client, base_url: impl Into<String>, guard: Resilience) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            guard,
        }
    }
}

#[async_trait]
impl AgentCaller for AgentClient {
    async fn call(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let url = format!("{}/v1/agent/invoke", self.base_url);
        self.guard
            .run(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(request)
                    .send()
                    .await
                    .map_err(|err| transport_error("agent", "agent call", err))?;
                decode("agent", "agent", &request.customer_id, response).await
            })
            .await
    }
}
