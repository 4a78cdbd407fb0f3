//! Object-store seam.
//!
//! The mirror talks to storage through this trait so the remote side can
//! be swapped for the in-memory store in tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("upload rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("missing credentials: {0}")]
    Credentials(String),
}

/// Whole-object storage: overwrite-if-exists, no conditional checks, no
/// retry beyond what the underlying client already does.
pub trait ObjectStore {
    /// Human-readable name of this store.
    fn name(&self) -> &str;

    /// Store `body` at `key` in `bucket`, replacing any existing object.
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError>;
}

/// In-memory store for tests and dry runs. Keys are `bucket/key`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Contents of one object, if present.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(&format!("{bucket}/{key}")).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), body.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.put_object("b", "k", b"one").unwrap();
        store.put_object("b", "k", b"two").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b", "k").unwrap(), b"two");
    }
}
