use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle state of an access request. Only `InProgress` (an active
/// elevation) matters to the overlap check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Revoked,
    Other(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Revoked => "revoked",
            RequestStatus::Other(s) => s,
        }
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => RequestStatus::Pending,
            "in progress" => RequestStatus::InProgress,
            "completed" => RequestStatus::Completed,
            "failed" => RequestStatus::Failed,
            "revoked" => RequestStatus::Revoked,
            _ => RequestStatus::Other(s),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(s: RequestStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access request record, as far as the overlap check reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub email: String,
    pub account_id: String,
    /// Permission-set identifier.
    pub role_id: String,
    pub status: RequestStatus,
}

/// Input event for the overlap check. Every field is optional on the wire
/// so that incomplete events produce a decision instead of a decode error.
/// Numbers are taken as their decimal text (account ids often arrive
/// unquoted); any other non-string value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapQuery {
    /// Name of the request table to search.
    #[serde(default, rename = "requests_table", deserialize_with = "de_text")]
    pub requests_table: Option<String>,
    /// The request about to be revoked.
    #[serde(default, deserialize_with = "de_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub role_id: Option<String>,
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Result of an overlap check. `error` is diagnostic only: a decision is
/// always returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapDecision {
    #[serde(rename = "hasOverlappingSessions")]
    pub has_overlap: bool,
    #[serde(rename = "overlappingCount")]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OverlapDecision {
    pub fn found(count: usize) -> Self {
        Self {
            has_overlap: count > 0,
            count,
            error: None,
        }
    }

    /// No overlap, with the reason the check could not run.
    pub fn fail_open(error: impl Into<String>) -> Self {
        Self {
            has_overlap: false,
            count: 0,
            error: Some(error.into()),
        }
    }
}
