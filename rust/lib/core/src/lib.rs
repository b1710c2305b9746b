pub mod config;
pub mod error;
pub mod module;

pub use config::{
    DeploymentConfig, DirectoryConfig, PublishConfig, ServiceConfig, StorageConfig, TablesConfig,
};
pub use error::ServiceError;
pub use module::Module;
