use serde::{Deserialize, Deserializer, Serialize};

use super::{AccountRef, PermissionRef};

/// Input event for an aggregation: the requester plus their groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// Correlation id of the originating access request.
    pub id: String,

    #[serde(default, deserialize_with = "de_lenient_id")]
    pub user_id: String,

    #[serde(default, deserialize_with = "de_lenient_ids")]
    pub group_ids: Vec<String>,

    #[serde(default)]
    pub username: String,
}

impl AggregateRequest {
    /// The identity set: requester first, then groups, empty ids skipped.
    pub fn identities(&self) -> Vec<&str> {
        std::iter::once(self.user_id.as_str())
            .chain(self.group_ids.iter().map(String::as_str))
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// One merged entry, derived from exactly one eligibility policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntry {
    /// Explicit accounts followed by OU-expanded accounts. Not deduplicated.
    pub accounts: Vec<AccountRef>,
    pub permissions: Vec<PermissionRef>,
    pub approval_required: bool,
    pub duration: String,
}

/// The aggregator's output, published to the policy sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEntitlement {
    pub id: String,
    pub policy: Vec<PolicyEntry>,
    pub username: String,
}

/// `null` becomes the empty id, which the identity set skips.
fn de_lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_lenient_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(ids.into_iter().map(Option::unwrap_or_default).collect())
}
