use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL keeps readers from blocking on the occasional writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut stmt = conn.prepare(sql).map_err(SQLError::from_query)?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(SQLError::from_query)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(SQLError::from_query)?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let affected = conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(SQLError::from_exec)?;

        Ok(affected as u64)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        conn.execute_batch(sql).map_err(SQLError::from_exec)
    }
}

/// Read column `idx` as one of our Value variants. Reals and blobs are not
/// stored by any table here; they come back as text / null.
fn value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Text(f.to_string()),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec_batch("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER, note TEXT);")
            .unwrap();
        store
    }

    #[test]
    fn test_exec_and_query() {
        let store = store();
        let n = store
            .exec(
                "INSERT INTO t (id, n, note) VALUES (?1, ?2, ?3)",
                &[Value::from("a"), Value::Integer(7), Value::Null],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = store
            .query("SELECT id, n, note FROM t WHERE id = ?1", &[Value::from("a")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("a"));
        assert_eq!(rows[0].get_i64("n"), Some(7));
        assert_eq!(rows[0].get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_column_is_classified() {
        let store = store();
        let err = store
            .query("SELECT id FROM t WHERE entity_id = ?1", &[Value::from("x")])
            .unwrap_err();
        assert!(matches!(err, SQLError::MissingSchema(_)), "got {err:?}");
    }

    #[test]
    fn test_missing_table_is_classified() {
        let store = store();
        let err = store.query("SELECT id FROM nope", &[]).unwrap_err();
        assert!(matches!(err, SQLError::MissingSchema(_)));
    }

    #[test]
    fn test_constraint_violation_is_execution_error() {
        let store = store();
        store
            .exec("INSERT INTO t (id) VALUES (?1)", &[Value::from("a")])
            .unwrap();
        let err = store
            .exec("INSERT INTO t (id) VALUES (?1)", &[Value::from("a")])
            .unwrap_err();
        assert!(matches!(err, SQLError::Execution(_)));
    }
}
