//! Organization directory: OU → member accounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use team_kv::KVStore;

use crate::model::AccountRef;
use crate::service::{blocking, EntitlementError};

const OU_PREFIX: &str = "directory/ou/";

/// Resolves an organizational unit to the accounts directly under it.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_accounts_for_ou(&self, ou_id: &str) -> Result<Vec<AccountRef>, EntitlementError>;
}

/// One page of an OU listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPage {
    pub accounts: Vec<AccountRef>,
    /// Token for the following page, `None` on the last page.
    pub next_token: Option<String>,
}

/// Paginated access to an OU's accounts.
#[async_trait]
pub trait AccountPager: Send + Sync {
    async fn page(&self, ou_id: &str, token: Option<&str>) -> Result<AccountPage, EntitlementError>;
}

/// Where this service runs, relative to the organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub account_id: String,
    pub management_account_id: Option<String>,
}

impl DeploymentContext {
    pub fn new(account_id: impl Into<String>, management_account_id: Option<String>) -> Self {
        Self {
            account_id: account_id.into(),
            management_account_id,
        }
    }

    pub fn deployed_in_management(&self) -> bool {
        self.management_account_id.as_deref() == Some(self.account_id.as_str())
    }

    /// Whether OU expansion must drop `account`. Only the management
    /// account is ever hidden, and only from non-management deployments.
    pub fn hides(&self, account: &AccountRef) -> bool {
        match &self.management_account_id {
            Some(mgmt) => !self.deployed_in_management() && account.id == *mgmt,
            None => false,
        }
    }
}

/// Directory that drains every page of an OU listing and applies the
/// management-account filter for its deployment.
pub struct OrgDirectory {
    pager: Arc<dyn AccountPager>,
    deployment: DeploymentContext,
}

impl OrgDirectory {
    pub fn new(pager: Arc<dyn AccountPager>, deployment: DeploymentContext) -> Self {
        Self { pager, deployment }
    }
}

#[async_trait]
impl DirectoryService for OrgDirectory {
    async fn list_accounts_for_ou(&self, ou_id: &str) -> Result<Vec<AccountRef>, EntitlementError> {
        let mut accounts = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = self.pager.page(ou_id, token.as_deref()).await?;
            pages += 1;
            accounts.extend(
                page.accounts
                    .into_iter()
                    .filter(|acct| !self.deployment.hides(acct)),
            );
            match page.next_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(EntitlementError::Directory(format!(
                        "pager for {ou_id} repeated token {next}"
                    )));
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!("ou {ou_id}: {} accounts over {pages} page(s)", accounts.len());
        Ok(accounts)
    }
}

/// Pager over a directory snapshot kept in the KV store under
/// `directory/ou/{ou_id}/{account_id}`.
pub struct KvAccountPager {
    kv: Arc<dyn KVStore>,
    page_size: usize,
}

impl KvAccountPager {
    pub fn new(kv: Arc<dyn KVStore>, page_size: usize) -> Self {
        Self { kv, page_size }
    }
}

#[async_trait]
impl AccountPager for KvAccountPager {
    async fn page(&self, ou_id: &str, token: Option<&str>) -> Result<AccountPage, EntitlementError> {
        let kv = Arc::clone(&self.kv);
        let prefix = ou_prefix(ou_id);
        let token = token.map(str::to_string);
        let page_size = self.page_size;

        blocking(move || {
            let page = kv.scan_page(&prefix, token.as_deref(), page_size)?;
            let mut accounts = Vec::with_capacity(page.entries.len());
            for (key, value) in &page.entries {
                let account: AccountRef = serde_json::from_slice(value)
                    .map_err(|e| EntitlementError::Directory(format!("{key}: {e}")))?;
                accounts.push(account);
            }
            Ok(AccountPage {
                accounts,
                next_token: page.next,
            })
        })
        .await
    }
}

fn ou_prefix(ou_id: &str) -> String {
    format!("{OU_PREFIX}{ou_id}/")
}

/// Load a directory snapshot `{"<ou id>": [{"id", "name"}, ...], ...}` into
/// the KV store. Each listed OU is replaced in one transaction, so a failed
/// write leaves its previous accounts in place. Returns the number of
/// accounts written.
pub fn import_snapshot(kv: &dyn KVStore, document: &str) -> Result<usize, EntitlementError> {
    let snapshot: BTreeMap<String, Vec<AccountRef>> = serde_json::from_str(document)
        .map_err(|e| EntitlementError::Validation(format!("directory snapshot: {e}")))?;

    let mut total = 0;
    for (ou_id, accounts) in &snapshot {
        if ou_id.is_empty() || ou_id.contains('/') {
            return Err(EntitlementError::Validation(format!("invalid ou id '{ou_id}'")));
        }
        let prefix = ou_prefix(ou_id);
        let mut encoded = Vec::with_capacity(accounts.len());
        for account in accounts {
            let value = serde_json::to_vec(account)
                .map_err(|e| EntitlementError::Internal(e.to_string()))?;
            encoded.push((format!("{prefix}{}", account.id), value));
        }
        let entries: Vec<(&str, &[u8])> = encoded
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        kv.replace_prefix(&prefix, &entries)?;
        info!("imported {} accounts for {ou_id}", accounts.len());
        total += accounts.len();
    }
    Ok(total)
}
