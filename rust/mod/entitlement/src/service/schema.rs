use team_sql::SQLStore;

use crate::service::EntitlementError;

/// Initialize the SQLite schema for policy and request records.
///
/// Both tables keep the full record as JSON in `data` and copy the fields
/// that are queried into indexed columns.
pub fn init_schema(
    sql: &dyn SQLStore,
    policies_table: &str,
    requests_table: &str,
) -> Result<(), EntitlementError> {
    init_policy_table(sql, policies_table)?;
    init_request_table(sql, requests_table)
}

/// Create a policy table with the `entity_id` column and its index.
pub fn init_policy_table(sql: &dyn SQLStore, name: &str) -> Result<(), EntitlementError> {
    let table = table_ident(name)?;
    let index = table_ident(&format!("idx_{name}_entity_id"))?;
    sql.exec_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            entity_id TEXT,
            data TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {index} ON {table}(entity_id);"
    ))?;
    Ok(())
}

/// Create a request table. The composite index covers the overlap filter.
pub fn init_request_table(sql: &dyn SQLStore, name: &str) -> Result<(), EntitlementError> {
    let table = table_ident(name)?;
    let index = table_ident(&format!("idx_{name}_active_triple"))?;
    sql.exec_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            account_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            status TEXT NOT NULL,
            data TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {index} ON {table}(status, email, account_id, role_id);"
    ))?;
    Ok(())
}

/// Quote a table name for interpolation into SQL.
///
/// Table names arrive in invocation events, so only letters, digits, `_`,
/// `-` and `.` are accepted.
pub fn table_ident(name: &str) -> Result<String, EntitlementError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(EntitlementError::Validation(format!(
            "invalid table name '{name}'"
        )));
    }
    Ok(format!("\"{name}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use team_sql::SqliteStore;

    #[test]
    fn test_table_ident() {
        assert_eq!(table_ident("requests").unwrap(), "\"requests\"");
        assert_eq!(
            table_ident("Requests-abc123-dev").unwrap(),
            "\"Requests-abc123-dev\""
        );
        assert!(table_ident("").is_err());
        assert!(table_ident("requests; DROP TABLE x").is_err());
        assert!(table_ident("a\"b").is_err());
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let sql = SqliteStore::open_in_memory().unwrap();
        init_schema(&sql, "policies", "requests").unwrap();
        init_schema(&sql, "policies", "requests").unwrap();
        let rows = sql
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name",
                &[],
            )
            .unwrap();
        let names: Vec<&str> = rows.iter().filter_map(|r| r.get_str("name")).collect();
        assert_eq!(
            names,
            vec!["idx_policies_entity_id", "idx_requests_active_triple"]
        );
    }
}
