use crate::error::KVError;

/// One page of a prefix scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Sorted (key, value) pairs.
    pub entries: Vec<(String, Vec<u8>)>,
    /// Key to resume after. `None` when the prefix is exhausted.
    pub next: Option<String>,
}

/// KVStore provides a key-value storage interface.
///
/// Keys follow a namespaced convention: `directory/ou/ou-1/123456789012`.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Write many pairs in a single transaction.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Atomically replace every key under `prefix` with `entries`.
    ///
    /// All entry keys must carry the prefix. Either the whole replacement
    /// is committed or nothing changes.
    fn replace_prefix(&self, prefix: &str, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Scan at most `limit` keys matching a prefix, strictly after `after`.
    ///
    /// `after` must itself carry the prefix; pass the previous page's
    /// `next` to continue.
    fn scan_page(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, KVError>;
}
