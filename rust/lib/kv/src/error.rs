use thiserror::Error;

/// Errors from the directory snapshot store.
#[derive(Error, Debug)]
pub enum KVError {
    /// The redb backend failed (open, transaction, table or commit).
    #[error("kv storage: {0}")]
    Storage(String),

    /// A page cursor that does not belong to the scanned prefix.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
