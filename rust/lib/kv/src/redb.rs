use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::{KVStore, ScanPage};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// RedbStore is a KVStore implementation backed by redb — a pure-Rust embedded
/// key-value database.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Storage(e.to_string()))?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;

        debug!("opened redb store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    fn write<F>(&self, f: F) -> Result<(), KVError>
    where
        F: FnOnce(&mut redb::Table<'_, &'static str, &'static [u8]>) -> Result<(), redb::StorageError>,
    {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            f(&mut table).map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(|table| table.insert(key, value).map(|_| ()))
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.write(|table| {
            for (key, value) in entries {
                table.insert(*key, *value)?;
            }
            Ok(())
        })
    }

    fn replace_prefix(&self, prefix: &str, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        if let Some((key, _)) = entries.iter().find(|(k, _)| !k.starts_with(prefix)) {
            return Err(KVError::Storage(format!("key {key} is outside prefix {prefix}")));
        }
        self.write(|table| {
            let mut stale = Vec::new();
            for entry in table.range::<&str>(prefix..)? {
                let (key, _) = entry?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    break;
                }
                stale.push(key.to_string());
            }
            for key in &stale {
                table.remove(key.as_str())?;
            }
            for (key, value) in entries {
                table.insert(*key, *value)?;
            }
            Ok(())
        })?;
        debug!("replaced prefix {prefix} with {} entries", entries.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(|table| table.remove(key).map(|_| ()))
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let mut results = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.scan_page(prefix, after.as_deref(), 256)?;
            results.extend(page.entries);
            match page.next {
                Some(next) => after = Some(next),
                None => return Ok(results),
            }
        }
    }

    fn scan_page(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, KVError> {
        if let Some(cursor) = after {
            if !cursor.starts_with(prefix) {
                return Err(KVError::InvalidCursor(cursor.to_string()));
            }
        }
        let limit = limit.max(1);

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        let start = match after {
            Some(cursor) => Bound::Excluded(cursor),
            None => Bound::Included(prefix),
        };
        let iter = table
            .range::<&str>((start, Bound::Unbounded))
            .map_err(|e| KVError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        let mut more = false;
        for entry in iter {
            let entry = entry.map_err(|e| KVError::Storage(e.to_string()))?;
            let key = entry.0.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            if entries.len() == limit {
                more = true;
                break;
            }
            entries.push((key, entry.1.value().to_vec()));
        }

        let next = if more {
            entries.last().map(|(k, _)| k.clone())
        } else {
            None
        };
        Ok(ScanPage { entries, next })
    }
}
