//! The durable document store for edited files (spec §1: "specified
//! only as a capability"; spec §5: "The document store is shared
//! between the parent loop and every live subagent for that session.
//! The parent is the only writer... Readers see monotonically
//! increasing version numbers").
//!
//! This module fixes the trait every backend implements plus an
//! in-memory default good enough for tests and single-process
//! deployments; a durable backend (e.g. content-addressable storage on
//! object storage) is a drop-in alternative implementation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

/// Monotonic document version, bumped on every write or delete to the
/// store as a whole.
pub type Version = u64;

/// Content-addressable `path -> content` map with a single monotonic
/// version counter (spec §6.1's `GET /files` / `PUT /file/{path}` /
/// `DELETE /file/{path}`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &str) -> Option<String>;
    async fn write(&self, path: &str, content: String) -> Version;
    async fn delete(&self, path: &str) -> bool;
    async fn list(&self) -> Vec<String>;
    async fn version(&self) -> Version;
}

const _: () = {
    fn _assert_object_safe(_: &dyn DocumentStore) {}
};

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, String>,
    version: Version,
}

/// Single-process, in-memory [`DocumentStore`]. Sufficient for tests and
/// a headless driver (spec §1); a production deployment may swap in a
/// persisted implementation without the orchestrator noticing.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, path: &str) -> Option<String> {
        self.inner.read().unwrap().files.get(path).cloned()
    }

    async fn write(&self, path: &str, content: String) -> Version {
        let mut inner = self.inner.write().unwrap();
        inner.files.insert(path.to_string(), content);
        inner.version += 1;
        inner.version
    }

    async fn delete(&self, path: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.files.remove(path).is_some();
        if removed {
            inner.version += 1;
        }
        removed
    }

    async fn list(&self) -> Vec<String> {
        self.inner.read().unwrap().files.keys().cloned().collect()
    }

    async fn version(&self) -> Version {
        self.inner.read().unwrap().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = MemoryDocumentStore::new();
        let v1 = store.write("a.txt", "hello".into()).await;
        assert_eq!(v1, 1);
        assert_eq!(store.read("a.txt").await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn version_increases_monotonically() {
        let store = MemoryDocumentStore::new();
        let v1 = store.write("a.txt", "one".into()).await;
        let v2 = store.write("b.txt", "two".into()).await;
        let v3 = store.write("a.txt", "one-updated".into()).await;
        assert!(v1 < v2);
        assert!(v2 < v3);
    }

    #[tokio::test]
    async fn delete_missing_file_returns_false_without_bumping_version() {
        let store = MemoryDocumentStore::new();
        let before = store.version().await;
        assert!(!store.delete("missing.txt").await);
        assert_eq!(store.version().await, before);
    }

    #[tokio::test]
    async fn list_returns_all_paths() {
        let store = MemoryDocumentStore::new();
        store.write("a.txt", "1".into()).await;
        store.write("b.txt", "2".into()).await;
        let mut files = store.list().await;
        files.sort();
        assert_eq!(files, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }
}
