pub mod aggregate;
pub mod directory;
pub mod overlap;
pub mod records;
pub mod resolve;
pub mod schema;
pub mod sink;

use std::sync::Arc;

use thiserror::Error;

use team_kv::KVError;
use team_sql::SQLError;

use crate::service::directory::DirectoryService;
use crate::service::records::{PolicyRecords, RequestRecords};
use crate::service::sink::PolicySink;

/// Entitlement service error type.
///
/// These never escape the two decision routines; they are logged and
/// turned into defaults there. Startup and seeding paths do propagate them.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The statement referenced a table/column/index this deployment lacks.
    #[error("missing schema: {0}")]
    MissingSchema(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("directory: {0}")]
    Directory(String),

    #[error("publish: {0}")]
    Publish(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for EntitlementError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::MissingSchema(m) => EntitlementError::MissingSchema(m),
            other => EntitlementError::Storage(other.to_string()),
        }
    }
}

impl From<KVError> for EntitlementError {
    fn from(e: KVError) -> Self {
        EntitlementError::Directory(e.to_string())
    }
}

impl From<EntitlementError> for team_core::ServiceError {
    fn from(e: EntitlementError) -> Self {
        match e {
            EntitlementError::MissingSchema(m) | EntitlementError::Storage(m) => {
                team_core::ServiceError::Storage(m)
            }
            EntitlementError::Directory(m) | EntitlementError::Publish(m) => {
                team_core::ServiceError::Unavailable(m)
            }
            EntitlementError::Validation(m) => team_core::ServiceError::Validation(m),
            EntitlementError::Internal(m) => team_core::ServiceError::Internal(m),
        }
    }
}

/// Run a synchronous store call on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, EntitlementError>
where
    F: FnOnce() -> Result<T, EntitlementError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EntitlementError::Internal(format!("blocking task: {e}")))?
}

/// The entitlement service: effective-entitlement aggregation and the
/// revocation overlap guard, over four narrow collaborators.
///
/// Holds no state between invocations beyond the collaborator handles.
pub struct EntitlementService {
    pub(crate) policies: Arc<dyn PolicyRecords>,
    pub(crate) requests: Arc<dyn RequestRecords>,
    pub(crate) directory: Arc<dyn DirectoryService>,
    pub(crate) sink: Arc<dyn PolicySink>,
}

impl EntitlementService {
    pub fn new(
        policies: Arc<dyn PolicyRecords>,
        requests: Arc<dyn RequestRecords>,
        directory: Arc<dyn DirectoryService>,
        sink: Arc<dyn PolicySink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            policies,
            requests,
            directory,
            sink,
        })
    }
}
