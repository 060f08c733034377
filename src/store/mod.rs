//! Blob storage holding the raw inbound messages.
//!
//! The pipeline only ever reads one object per invocation, by bucket and key.

pub mod fs;

use std::collections::HashMap;

use crate::error::{ForwardError, Result};
use crate::model::event::ObjectLocation;

pub use fs::FsBlobStore;

/// Read access to stored message blobs.
pub trait BlobStore {
    /// Fetch the object at `bucket/key`.
    ///
    /// A missing object is [`ForwardError::BlobNotFound`].
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        self.get(&location.bucket, &location.key)
    }
}

/// An in-memory store, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    objects: HashMap<(String, String), Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .insert((bucket.to_string(), key.to_string()), bytes.into());
    }

    pub fn with_object(mut self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(bucket, key, bytes);
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ForwardError::BlobNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new().with_object("mail", "emails/m1", "Subject: hi\n\n");
        assert_eq!(store.get("mail", "emails/m1").unwrap(), b"Subject: hi\n\n");
    }

    #[test]
    fn test_memory_store_missing_object() {
        let store = MemoryBlobStore::new();
        let location = ObjectLocation {
            bucket: "mail".into(),
            key: "emails/none".into(),
        };
        assert!(matches!(
            store.fetch(&location),
            Err(ForwardError::BlobNotFound { .. })
        ));
    }
}
