//! Record store collaborators: eligibility policies and access requests.
//!
//! The SQL stores are synchronous; every read runs on the blocking pool so
//! concurrent lookups do not hold up the async workers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use team_sql::{SQLStore, Value};

use crate::model::{AccessRequest, EligibilityPolicy, RequestStatus};
use crate::service::schema::table_ident;
use crate::service::{blocking, EntitlementError};

/// Read access to eligibility policy records.
#[async_trait]
pub trait PolicyRecords: Send + Sync {
    /// All records whose `entityId` equals `entity_id` (current schema).
    async fn query_by_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError>;

    /// The record whose primary key is `id`.
    async fn get_by_key(&self, id: &str) -> Result<Option<EligibilityPolicy>, EntitlementError>;
}

/// Read access to access-request records.
#[async_trait]
pub trait RequestRecords: Send + Sync {
    /// Ids of "in progress" requests in `source` for the given
    /// (email, account, permission set), excluding `exclude_id`.
    async fn scan_in_progress(
        &self,
        source: &str,
        email: &str,
        account_id: &str,
        role_id: &str,
        exclude_id: &str,
    ) -> Result<Vec<String>, EntitlementError>;
}

/// Policy records in a SQL table `(id, entity_id, data)`.
pub struct SqlPolicyRecords {
    sql: Arc<dyn SQLStore>,
    table: String,
}

impl SqlPolicyRecords {
    pub fn new(sql: Arc<dyn SQLStore>, table: impl Into<String>) -> Self {
        Self {
            sql,
            table: table.into(),
        }
    }

    /// Insert or replace a policy record. Legacy records (no `entityId`)
    /// are stored with a NULL `entity_id`.
    pub fn put_policy(&self, policy: &EligibilityPolicy) -> Result<(), EntitlementError> {
        let table = table_ident(&self.table)?;
        let json =
            serde_json::to_string(policy).map_err(|e| EntitlementError::Internal(e.to_string()))?;
        self.sql.exec(
            &format!("INSERT OR REPLACE INTO {table} (id, entity_id, data) VALUES (?1, ?2, ?3)"),
            &[
                Value::from(policy.id.as_str()),
                Value::from(policy.entity_id.as_deref()),
                Value::Text(json),
            ],
        )?;
        Ok(())
    }

    async fn select(
        &self,
        statement: String,
        key: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError> {
        let sql = Arc::clone(&self.sql);
        let key = key.to_string();
        blocking(move || decode_rows(sql.as_ref(), &statement, &key)).await
    }
}

/// Run `statement` and decode each row's `data`. A row that does not
/// decode is logged and skipped; it does not hide the other rows.
fn decode_rows(
    sql: &dyn SQLStore,
    statement: &str,
    key: &str,
) -> Result<Vec<EligibilityPolicy>, EntitlementError> {
    let rows = sql.query(statement, &[Value::from(key)])?;
    let mut policies = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = row.get_str("id").unwrap_or("?");
        let Some(data) = row.get_str("data") else {
            warn!("policy {id}: no data, skipped");
            continue;
        };
        match serde_json::from_str::<EligibilityPolicy>(data) {
            Ok(policy) => policies.push(policy),
            Err(e) => warn!("policy {id}: undecodable record skipped: {e}"),
        }
    }
    Ok(policies)
}

#[async_trait]
impl PolicyRecords for SqlPolicyRecords {
    async fn query_by_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<EligibilityPolicy>, EntitlementError> {
        let table = table_ident(&self.table)?;
        let policies = self
            .select(
                format!("SELECT id, data FROM {table} WHERE entity_id = ?1 ORDER BY id"),
                entity_id,
            )
            .await?;
        debug!("entity index returned {} policies for {entity_id}", policies.len());
        Ok(policies)
    }

    async fn get_by_key(&self, id: &str) -> Result<Option<EligibilityPolicy>, EntitlementError> {
        let table = table_ident(&self.table)?;
        let mut policies = self
            .select(format!("SELECT id, data FROM {table} WHERE id = ?1"), id)
            .await?;
        Ok(policies.pop())
    }
}

/// Access-request records in SQL tables `(id, email, account_id, role_id,
/// status, data)`. The table is chosen per call.
pub struct SqlRequestRecords {
    sql: Arc<dyn SQLStore>,
}

impl SqlRequestRecords {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self { sql }
    }

    /// Insert or replace a request record in `source`.
    pub fn put_request(&self, source: &str, request: &AccessRequest) -> Result<(), EntitlementError> {
        let table = table_ident(source)?;
        let json =
            serde_json::to_string(request).map_err(|e| EntitlementError::Internal(e.to_string()))?;
        self.sql.exec(
            &format!(
                "INSERT OR REPLACE INTO {table} (id, email, account_id, role_id, status, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            &[
                Value::from(request.id.as_str()),
                Value::from(request.email.as_str()),
                Value::from(request.account_id.as_str()),
                Value::from(request.role_id.as_str()),
                Value::from(request.status.as_str()),
                Value::Text(json),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl RequestRecords for SqlRequestRecords {
    async fn scan_in_progress(
        &self,
        source: &str,
        email: &str,
        account_id: &str,
        role_id: &str,
        exclude_id: &str,
    ) -> Result<Vec<String>, EntitlementError> {
        let table = table_ident(source)?;
        let statement = format!(
            "SELECT id FROM {table}
             WHERE status = ?1 AND email = ?2 AND account_id = ?3 AND role_id = ?4 AND id <> ?5
             ORDER BY id"
        );
        let params = vec![
            Value::from(RequestStatus::InProgress.as_str()),
            Value::from(email),
            Value::from(account_id),
            Value::from(role_id),
            Value::from(exclude_id),
        ];
        let sql = Arc::clone(&self.sql);
        let rows = blocking(move || Ok(sql.query(&statement, &params)?)).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_str("id").map(str::to_string))
            .collect())
    }
}
