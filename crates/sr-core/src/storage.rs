//! Storage port and durable key layout
//!
//! All state shared between the observer, the rule editor and the session
//! settings lives in one flat string-to-string map. The browser side backs it
//! with `chrome.storage.local`; tests use [`MemoryStore`]. Values are JSON
//! encoded, matching what the extension storage would hold.

use std::collections::HashMap;

use crate::types::TabId;

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("corrupt value under '{key}': {reason}")]
    CorruptValue { key: String, reason: String },
}

/// Durable string map the engine runs against.
///
/// Implementations are expected to be cheap and non-blocking; callers treat
/// writes as fire-and-forget and accept eventual consistency under bursts.
pub trait StoragePort {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    /// Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// Key Layout
// =============================================================================

/// Key prefixes and constructors for everything the engine persists.
/// The spellings match what the extension has always written, so an upgraded
/// engine keeps reading existing state.
pub mod keys {
    use super::TabId;

    pub const HOST_FOR_TAB: &str = "host_for_tab_";
    pub const DOMAINS_FOR_TAB: &str = "domains_for_tab_";
    pub const STATS_FOR_TAB: &str = "domain_stats_for_tab_";

    /// The three per-tab families, in the order they are cleaned up.
    pub const PER_TAB_PREFIXES: [&str; 3] = [HOST_FOR_TAB, DOMAINS_FOR_TAB, STATS_FOR_TAB];

    pub fn host_for_tab(tab: TabId) -> String {
        format!("{HOST_FOR_TAB}{tab}")
    }

    pub fn domains_for_tab(tab: TabId) -> String {
        format!("{DOMAINS_FOR_TAB}{tab}")
    }

    pub fn stats_for_tab(tab: TabId) -> String {
        format!("{STATS_FOR_TAB}{tab}")
    }

    /// If `key` belongs to one of the per-tab families, return the embedded
    /// tab id. Session keys and rule drafts never match.
    pub fn per_tab_id(key: &str) -> Option<TabId> {
        for prefix in PER_TAB_PREFIXES {
            if let Some(rest) = key.strip_prefix(prefix) {
                return rest.parse().ok();
            }
        }
        None
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory storage backend, used in tests and as the state layer under the
/// journaling store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StoragePort for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

// =============================================================================
// Journal Store
// =============================================================================

/// One recorded mutation, ready to be replayed into the real backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set { key: String, value: String },
    Remove { key: String },
}

/// Store for hosts whose real backend is asynchronous (the extension's
/// `chrome.storage.local`): reads and writes hit an in-memory image
/// immediately, and every mutation is also appended to a journal the host
/// drains and replays, write-through and without awaiting.
#[derive(Debug, Default)]
pub struct JournalStore {
    image: MemoryStore,
    journal: Vec<StorageOp>,
}

impl JournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the in-memory image from previously persisted entries without
    /// journaling them back.
    pub fn hydrate(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in entries {
            let _ = self.image.set(&key, value);
        }
    }

    /// Take all mutations recorded since the last drain.
    pub fn drain_ops(&mut self) -> Vec<StorageOp> {
        std::mem::take(&mut self.journal)
    }

    pub fn pending_ops(&self) -> usize {
        self.journal.len()
    }
}

impl StoragePort for JournalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.image.get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.image.set(key, value.clone())?;
        self.journal.push(StorageOp::Set {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.image.remove(key)?;
        self.journal.push(StorageOp::Remove {
            key: key.to_string(),
        });
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.image.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_tab_id() {
        assert_eq!(keys::per_tab_id("host_for_tab_12"), Some(12));
        assert_eq!(keys::per_tab_id("domains_for_tab_7"), Some(7));
        assert_eq!(keys::per_tab_id("domain_stats_for_tab_0"), Some(0));
        assert_eq!(keys::per_tab_id("draft_rules_example.com"), None);
        assert_eq!(keys::per_tab_id("serverUrl"), None);
        assert_eq!(keys::per_tab_id("host_for_tab_"), None);
        assert_eq!(keys::per_tab_id("host_for_tab_abc"), None);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        store.set("a", "1".into()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // removing again stays fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_journal_records_mutations() {
        let mut store = JournalStore::new();
        store.hydrate([("old".to_string(), "1".to_string())]);
        assert_eq!(store.pending_ops(), 0);

        store.set("a", "2".into()).unwrap();
        store.remove("old").unwrap();

        assert_eq!(store.get("a").unwrap(), Some("2".to_string()));
        assert_eq!(store.get("old").unwrap(), None);

        let ops = store.drain_ops();
        assert_eq!(
            ops,
            vec![
                StorageOp::Set { key: "a".into(), value: "2".into() },
                StorageOp::Remove { key: "old".into() },
            ]
        );
        assert_eq!(store.pending_ops(), 0);
    }
}
