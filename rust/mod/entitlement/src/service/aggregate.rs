use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::model::{AccountRef, AggregateRequest, AggregatedEntitlement, EligibilityPolicy, PolicyEntry};
use crate::service::EntitlementService;

impl EntitlementService {
    /// Compute the effective entitlement of a requester across their own
    /// identity and every group they belong to, then publish it.
    ///
    /// Flow:
    /// 1. Resolve policies for each identity (requester first, then groups)
    /// 2. Expand every policy's OUs into accounts
    /// 3. Merge in identity order, tracking the running maximum duration
    /// 4. Publish once; a publish failure is logged, not returned
    ///
    /// Steps 1 and 2 fan out concurrently (the store reads run on the
    /// blocking pool). Step 3 is strictly sequential, so the output order
    /// and the duration defaults match a one-by-one walk.
    pub async fn aggregate(&self, request: &AggregateRequest) -> AggregatedEntitlement {
        let identities = request.identities();
        info!(
            "aggregating entitlement {} for {} ({} identities)",
            request.id,
            request.username,
            identities.len()
        );

        let resolved = join_all(identities.iter().map(|id| self.resolve_policies(id))).await;
        for (id, policies) in identities.iter().zip(&resolved) {
            debug!("{id}: {} policies", policies.len());
        }

        let policies: Vec<&EligibilityPolicy> = resolved.iter().flatten().collect();
        let expanded = join_all(policies.iter().map(|p| self.expand_accounts(p))).await;

        let mut max_duration: i64 = 0;
        let mut entries = Vec::with_capacity(policies.len());
        for (policy, accounts) in policies.into_iter().zip(expanded) {
            match policy.duration_value() {
                Ok(d) if d > max_duration => max_duration = d,
                Ok(_) => {}
                Err(e) => warn!("policy {}: unparseable duration {:?}: {e}", policy.id, policy.duration),
            }

            entries.push(PolicyEntry {
                accounts,
                permissions: policy.permissions.clone(),
                approval_required: policy.approval_required,
                // Absent durations take the maximum seen *so far*, not the
                // final one. Later policies do not revise earlier entries.
                duration: policy
                    .duration
                    .clone()
                    .unwrap_or_else(|| max_duration.to_string()),
            });
        }

        let result = AggregatedEntitlement {
            id: request.id.clone(),
            policy: entries,
            username: request.username.clone(),
        };
        info!(
            "entitlement {}: {} policy entries, max duration {max_duration}",
            result.id,
            result.policy.len()
        );

        if let Err(e) = self.sink.publish(&result).await {
            warn!("failed to publish entitlement {}: {e}", result.id);
        }

        result
    }

    /// Explicit accounts followed by the accounts of each OU, in OU order.
    /// An OU whose lookup fails contributes nothing.
    async fn expand_accounts(&self, policy: &EligibilityPolicy) -> Vec<AccountRef> {
        let mut accounts = policy.accounts.clone();
        let listings = join_all(
            policy
                .ous
                .iter()
                .map(|ou| self.directory.list_accounts_for_ou(ou.id())),
        )
        .await;

        for (ou, listing) in policy.ous.iter().zip(listings) {
            match listing {
                Ok(found) => accounts.extend(found),
                Err(e) => warn!("policy {}: cannot expand ou {}: {e}", policy.id, ou.id()),
            }
        }
        accounts
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{AccountRef, AggregateRequest};
    use crate::service::test_support::{fixture, policy, RecordingSink, StaticDirectory};
    use serde_json::json;

    fn request(user: &str, groups: &[&str]) -> AggregateRequest {
        AggregateRequest {
            id: "req-1".into(),
            user_id: user.into(),
            group_ids: groups.iter().map(|g| g.to_string()).collect(),
            username: "alice".into(),
        }
    }

    fn account_ids(accounts: &[AccountRef]) -> Vec<&str> {
        accounts.iter().map(|a| a.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_no_policies_yields_empty_result() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        let result = fx.service.aggregate(&request("u1", &["g1", "g2"])).await;
        assert_eq!(result.id, "req-1");
        assert_eq!(result.username, "alice");
        assert!(result.policy.is_empty());
        // Published even when empty.
        assert_eq!(fx.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_group_policy_with_ou_expansion() {
        let fx = fixture(
            StaticDirectory::default().with("ou-1", &["acc2"]),
            RecordingSink::default(),
        );
        fx.policies
            .put_policy(&policy(json!({
                "id": "rec-g1",
                "entityId": "g1",
                "duration": "10",
                "accounts": [{"id": "acc1", "name": "acc1"}],
                "ous": [{"id": "ou-1"}],
                "permissions": [{"id": "p1", "name": "Admin"}],
                "approvalRequired": false
            })))
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &["g1"])).await;
        assert_eq!(result.policy.len(), 1);
        let entry = &result.policy[0];
        assert_eq!(account_ids(&entry.accounts), vec!["acc1", "acc2"]);
        assert_eq!(entry.duration, "10");
        assert!(!entry.approval_required);
        assert_eq!(entry.permissions[0].id, "p1");

        let published = fx.sink.published.lock().unwrap();
        assert_eq!(published[0], result);
    }

    #[tokio::test]
    async fn test_missing_duration_takes_running_max() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        fx.policies
            .put_policy(&policy(json!({"id": "pa", "entityId": "A", "duration": "5"})))
            .unwrap();
        fx.policies
            .put_policy(&policy(json!({"id": "pb", "entityId": "B"})))
            .unwrap();
        fx.policies
            .put_policy(&policy(json!({"id": "pc", "entityId": "C", "duration": "9"})))
            .unwrap();

        let result = fx.service.aggregate(&request("A", &["B", "C"])).await;
        let durations: Vec<&str> = result.policy.iter().map(|e| e.duration.as_str()).collect();
        assert_eq!(durations, vec!["5", "5", "9"]);
    }

    #[tokio::test]
    async fn test_missing_duration_first_is_zero() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        fx.policies
            .put_policy(&policy(json!({"id": "pb", "entityId": "B"})))
            .unwrap();
        fx.policies
            .put_policy(&policy(json!({"id": "pa", "entityId": "A", "duration": "5"})))
            .unwrap();

        let result = fx.service.aggregate(&request("B", &["A"])).await;
        let durations: Vec<&str> = result.policy.iter().map(|e| e.duration.as_str()).collect();
        assert_eq!(durations, vec!["0", "5"]);
    }

    #[tokio::test]
    async fn test_entries_follow_identity_order() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        for (id, owner) in [("p-user", "u1"), ("p-g2", "g2"), ("p-g1", "g1")] {
            fx.policies
                .put_policy(&policy(json!({
                    "id": id,
                    "entityId": owner,
                    "duration": "1",
                    "permissions": [{"id": id, "name": id}]
                })))
                .unwrap();
        }

        let result = fx.service.aggregate(&request("u1", &["g1", "", "g2"])).await;
        let order: Vec<&str> = result
            .policy
            .iter()
            .map(|e| e.permissions[0].id.as_str())
            .collect();
        assert_eq!(order, vec!["p-user", "p-g1", "p-g2"]);
    }

    #[tokio::test]
    async fn test_duplicate_accounts_are_kept() {
        let fx = fixture(
            StaticDirectory::default().with("ou-1", &["acc1", "acc3"]),
            RecordingSink::default(),
        );
        fx.policies
            .put_policy(&policy(json!({
                "id": "p1",
                "entityId": "g1",
                "accounts": [{"id": "acc1", "name": "acc1"}],
                "ous": ["ou-1"]
            })))
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &["g1"])).await;
        assert_eq!(
            account_ids(&result.policy[0].accounts),
            vec!["acc1", "acc1", "acc3"]
        );
        // No duration and nothing before it: defaults to the running max.
        assert_eq!(result.policy[0].duration, "0");
        assert!(result.policy[0].approval_required);
    }

    #[tokio::test]
    async fn test_failed_ou_contributes_nothing() {
        let fx = fixture(
            StaticDirectory::default().with("ou-ok", &["acc2"]),
            RecordingSink::default(),
        );
        fx.policies
            .put_policy(&policy(json!({
                "id": "p1",
                "entityId": "g1",
                "duration": "2",
                "accounts": [{"id": "acc1", "name": "acc1"}],
                "ous": ["ou-missing", "ou-ok"]
            })))
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &["g1"])).await;
        assert_eq!(account_ids(&result.policy[0].accounts), vec!["acc1", "acc2"]);
    }

    #[tokio::test]
    async fn test_publish_failure_still_returns_result() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::failing());
        fx.policies
            .put_policy(&policy(json!({"id": "u1", "duration": "3"})))
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &[])).await;
        assert_eq!(fx.sink.count(), 1);
        assert_eq!(result.policy.len(), 1);
        assert_eq!(result.policy[0].duration, "3");
    }

    #[tokio::test]
    async fn test_legacy_and_current_policy_counted_once() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        fx.policies
            .put_policy(&policy(json!({"id": "g1", "entityId": "g1", "duration": "6"})))
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &["g1"])).await;
        assert_eq!(result.policy.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_duration_does_not_raise_max() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        fx.policies
            .put_policy(&policy(json!({"id": "pa", "entityId": "A", "duration": "forever"})))
            .unwrap();
        fx.policies
            .put_policy(&policy(json!({"id": "pb", "entityId": "B"})))
            .unwrap();

        let result = fx.service.aggregate(&request("A", &["B"])).await;
        let durations: Vec<&str> = result.policy.iter().map(|e| e.duration.as_str()).collect();
        assert_eq!(durations, vec!["forever", "0"]);
    }

    #[tokio::test]
    async fn test_corrupt_policy_row_skipped() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        fx.policies
            .put_policy(&policy(json!({"id": "good", "entityId": "g1", "duration": "7"})))
            .unwrap();
        fx.sql
            .exec(
                "INSERT INTO policies (id, entity_id, data) VALUES (?1, ?2, ?3)",
                &[
                    team_sql::Value::from("bad"),
                    team_sql::Value::from("g1"),
                    team_sql::Value::from(r#"{"id": "bad", "entityId": "g1", "approvalRequired": "false"}"#),
                ],
            )
            .unwrap();

        let result = fx.service.aggregate(&request("u1", &["g1"])).await;
        assert_eq!(result.policy.len(), 1);
        assert_eq!(result.policy[0].duration, "7");
    }
}
