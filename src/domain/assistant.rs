use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Business profile as served by the profile service.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub name: String,
    pub document: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub segment: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub monthly_revenue: Decimal,
    #[serde(default, rename = "account_age_months")]
    pub account_age: u32,
    #[serde(default)]
    pub credit_score: u32,
}

/// One row of the transactions service feed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct HistoryEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AgentRequest {
    pub customer_id: String,
    pub profile: CustomerProfile,
    pub transactions: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AgentResponse {
    pub answer: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub tokens_used: TokenUsage,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AssistantResult {
    pub customer_id: String,
    pub profile: CustomerProfile,
    pub recommendation: AgentResponse,
    pub processed_at: DateTime<Utc>,
}
