//! Entitlement module — effective-entitlement aggregation and the
//! revocation overlap guard.
//!
//! # Operations
//!
//! - **aggregate** — merge the eligibility policies of a requester and their
//!   groups into one entitlement, expanding OUs into accounts, then publish it
//! - **check_overlap** — decide whether another active request still needs
//!   the access that revoking a request would remove (fails open)
//!
//! # Usage
//!
//! ```ignore
//! use entitlement::EntitlementModule;
//!
//! let module = EntitlementModule::new(sql, kv, &config)?;
//! let router = module.routes(); // POST /entitlements/aggregate, /sessions/overlap
//! ```

pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing::info;

use team_core::{Module, ServiceConfig, ServiceError};
use team_kv::KVStore;
use team_sql::SQLStore;

use crate::service::directory::{DeploymentContext, KvAccountPager, OrgDirectory};
use crate::service::records::{SqlPolicyRecords, SqlRequestRecords};
use crate::service::sink::{GraphqlSink, LogSink, PolicySink};
use crate::service::{schema, EntitlementService};

/// Entitlement module implementing the Module trait.
pub struct EntitlementModule {
    service: Arc<EntitlementService>,
}

impl EntitlementModule {
    /// Wire the service over the shared stores.
    ///
    /// Creates the configured policy and request tables if missing. The
    /// GraphQL sink is used when `publish.endpoint` is set, otherwise
    /// results are only logged.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        config: &ServiceConfig,
    ) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref(), &config.tables.policies, &config.tables.requests)?;

        let policies = Arc::new(SqlPolicyRecords::new(Arc::clone(&sql), &config.tables.policies));
        let requests = Arc::new(SqlRequestRecords::new(sql));

        let deployment = DeploymentContext::new(
            &config.deployment.account_id,
            config.deployment.management_account_id.clone(),
        );
        if deployment.management_account_id.is_none() {
            info!("no management account configured, OU expansion filters nothing");
        }
        let pager = Arc::new(KvAccountPager::new(kv, config.directory.page_size));
        let directory = Arc::new(OrgDirectory::new(pager, deployment));

        let sink: Arc<dyn PolicySink> = match &config.publish.endpoint {
            Some(endpoint) => {
                info!("publishing entitlements to {endpoint}");
                Arc::new(GraphqlSink::new(
                    endpoint.as_str(),
                    config.publish.api_key.clone(),
                    Duration::from_secs(config.publish.timeout_secs),
                )?)
            }
            None => Arc::new(LogSink),
        };

        Ok(Self {
            service: EntitlementService::new(policies, requests, directory, sink),
        })
    }

    /// Get a reference to the underlying EntitlementService.
    pub fn service(&self) -> &Arc<EntitlementService> {
        &self.service
    }
}

impl Module for EntitlementModule {
    fn name(&self) -> &str {
        "entitlement"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
