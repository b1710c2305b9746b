use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A table, column or index named by the statement does not exist.
    /// Older deployments hit this when a newer query meets an older schema.
    #[error("missing schema object: {0}")]
    MissingSchema(String),
}

impl SQLError {
    /// Classify a rusqlite error raised while preparing or running `Query`.
    pub(crate) fn from_query(e: rusqlite::Error) -> Self {
        let msg = e.to_string();
        if is_missing_schema(&msg) {
            SQLError::MissingSchema(msg)
        } else {
            SQLError::Query(msg)
        }
    }

    /// Classify a rusqlite error raised by a write statement.
    pub(crate) fn from_exec(e: rusqlite::Error) -> Self {
        let msg = e.to_string();
        if is_missing_schema(&msg) {
            SQLError::MissingSchema(msg)
        } else {
            SQLError::Execution(msg)
        }
    }
}

fn is_missing_schema(msg: &str) -> bool {
    msg.contains("no such table") || msg.contains("no such column") || msg.contains("no such index")
}
