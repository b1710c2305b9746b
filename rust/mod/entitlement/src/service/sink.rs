//! Outbound delivery of aggregated entitlements.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::model::AggregatedEntitlement;
use crate::service::EntitlementError;

/// Receives the aggregator's output.
#[async_trait]
pub trait PolicySink: Send + Sync {
    async fn publish(&self, result: &AggregatedEntitlement) -> Result<(), EntitlementError>;
}

/// Sink that only logs. Used when no publish endpoint is configured.
pub struct LogSink;

#[async_trait]
impl PolicySink for LogSink {
    async fn publish(&self, result: &AggregatedEntitlement) -> Result<(), EntitlementError> {
        info!(
            "entitlement {} for {}: {} policy entries (not published, no endpoint)",
            result.id,
            result.username,
            result.policy.len()
        );
        Ok(())
    }
}

const PUBLISH_POLICY_MUTATION: &str = r#"
mutation PublishPolicy($result: PolicyInput) {
  publishPolicy(result: $result) {
    id
    policy {
      accounts { name id }
      permissions { name id }
      approvalRequired
      duration
    }
    username
  }
}
"#;

/// Sink posting the `publishPolicy` GraphQL mutation.
pub struct GraphqlSink {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GraphqlSink {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EntitlementError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EntitlementError::Internal(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl PolicySink for GraphqlSink {
    async fn publish(&self, result: &AggregatedEntitlement) -> Result<(), EntitlementError> {
        let payload = serde_json::json!({
            "query": PUBLISH_POLICY_MUTATION,
            "variables": { "result": result },
        });

        let mut req = self.http.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| EntitlementError::Publish(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EntitlementError::Publish(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EntitlementError::Publish(format!("decode response: {e}")))?;
        if let Some(errors) = body.get("errors") {
            return Err(EntitlementError::Publish(format!("graphql errors: {errors}")));
        }

        info!("published entitlement {} for {}", result.id, result.username);
        Ok(())
    }
}
