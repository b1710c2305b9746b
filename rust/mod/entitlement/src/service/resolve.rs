use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::model::EligibilityPolicy;
use crate::service::records::PolicyRecords;
use crate::service::{EntitlementError, EntitlementService};

/// One way of finding the policies attached to an entity.
#[async_trait]
pub trait PolicyLookup: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn lookup(
        &self,
        records: &dyn PolicyRecords,
        entity_id: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError>;
}

/// Current schema: secondary index on `entityId`.
pub struct EntityIndexLookup;

#[async_trait]
impl PolicyLookup for EntityIndexLookup {
    fn name(&self) -> &'static str {
        "entity-index"
    }

    async fn lookup(
        &self,
        records: &dyn PolicyRecords,
        entity_id: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError> {
        records.query_by_entity(entity_id).await
    }
}

/// Legacy schema: the record key is the entity id.
pub struct LegacyKeyLookup;

#[async_trait]
impl PolicyLookup for LegacyKeyLookup {
    fn name(&self) -> &'static str {
        "legacy-key"
    }

    async fn lookup(
        &self,
        records: &dyn PolicyRecords,
        entity_id: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError> {
        Ok(records.get_by_key(entity_id).await?.into_iter().collect())
    }
}

/// Lookups in precedence order. Earlier lookups win on duplicate ids.
pub const LOOKUPS: &[&dyn PolicyLookup] = &[&EntityIndexLookup, &LegacyKeyLookup];

/// Run every lookup and merge the results by record `id`, first seen wins.
///
/// A failing lookup is logged and contributes nothing; the remaining
/// lookups still run.
pub async fn resolve_with(
    records: &dyn PolicyRecords,
    lookups: &[&dyn PolicyLookup],
    entity_id: &str,
) -> Vec<EligibilityPolicy> {
    let mut seen = HashSet::new();
    let mut policies = Vec::new();

    for lookup in lookups {
        let found = match lookup.lookup(records, entity_id).await {
            Ok(found) => found,
            Err(EntitlementError::MissingSchema(msg)) => {
                warn!("{} lookup unavailable for {entity_id} (older schema?): {msg}", lookup.name());
                continue;
            }
            Err(e) => {
                warn!("{} lookup failed for {entity_id}: {e}", lookup.name());
                continue;
            }
        };
        for policy in found {
            if seen.insert(policy.id.clone()) {
                policies.push(policy);
            } else {
                debug!("{} lookup: skipping duplicate policy {}", lookup.name(), policy.id);
            }
        }
    }

    policies
}

impl EntitlementService {
    /// All eligibility policies attached to one user or group, across both
    /// record schemas. Never fails; see [`resolve_with`].
    pub async fn resolve_policies(&self, entity_id: &str) -> Vec<EligibilityPolicy> {
        resolve_with(self.policies.as_ref(), LOOKUPS, entity_id).await
    }
}
