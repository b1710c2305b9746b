use tracing::{error, info, warn};

use crate::model::{OverlapDecision, OverlapQuery};
use crate::service::EntitlementService;

pub const MISSING_PARAMETERS: &str = "Missing required parameters";

impl EntitlementService {
    /// Decide whether revoking `query.id` would strip access that another
    /// active ("in progress") request for the same user, account and
    /// permission set still relies on.
    ///
    /// Fails open: missing input or an unavailable record store yields
    /// `has_overlap = false` with `error` set, so revocation can proceed.
    /// A wrong "no overlap" revokes early; a wrong "overlap" would leave
    /// access elevated indefinitely.
    pub async fn check_overlap(&self, query: &OverlapQuery) -> OverlapDecision {
        let Some((source, current_id, email, account_id, role_id)) = required_fields(query) else {
            warn!("overlap check rejected: {MISSING_PARAMETERS}");
            return OverlapDecision::fail_open(MISSING_PARAMETERS);
        };

        match self
            .requests
            .scan_in_progress(source, email, account_id, role_id, current_id)
            .await
        {
            Ok(ids) => {
                info!(
                    "found {} overlapping session(s) for user {email}, account {account_id}, role {role_id}",
                    ids.len()
                );
                if !ids.is_empty() {
                    info!("overlapping session ids: {ids:?}");
                }
                OverlapDecision::found(ids.len())
            }
            Err(e) => {
                error!("error checking for overlapping sessions of {current_id}: {e}");
                OverlapDecision::fail_open(e.to_string())
            }
        }
    }
}

/// All five inputs, or `None` if any is absent or empty.
fn required_fields(query: &OverlapQuery) -> Option<(&str, &str, &str, &str, &str)> {
    fn field(v: &Option<String>) -> Option<&str> {
        v.as_deref().filter(|s| !s.is_empty())
    }
    Some((
        field(&query.requests_table)?,
        field(&query.id)?,
        field(&query.email)?,
        field(&query.account_id)?,
        field(&query.role_id)?,
    ))
}
