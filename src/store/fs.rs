//! Directory-backed blob store: `root/bucket/key`.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{ForwardError, Result};

use super::BlobStore;

/// Reads blobs from a local directory tree, one sub-directory per bucket.
///
/// Useful with a synced copy of the inbound bucket or a local receiver
/// writing messages to disk.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `bucket/key` below the root, refusing anything that could escape it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            let safe = !part.is_empty()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !safe {
                return Err(ForwardError::InvalidPath(format!("{bucket}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "Reading message blob");
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForwardError::BlobNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ForwardError::BlobFetch {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_nested_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("inbound").join("emails")).unwrap();
        std::fs::write(dir.path().join("inbound/emails/m1"), b"Subject: x\n\n").unwrap();

        let store = FsBlobStore::new(dir.path());
        assert_eq!(store.get("inbound", "emails/m1").unwrap(), b"Subject: x\n\n");
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(
            store.get("inbound", "emails/none"),
            Err(ForwardError::BlobNotFound { .. })
        ));
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let store = FsBlobStore::new("/srv/mail");
        for (bucket, key) in [("inbound", "../secret"), ("..", "x"), ("inbound", "/etc/passwd"), ("", "k")] {
            let err = store.get(bucket, key).unwrap_err();
            assert!(
                matches!(err, ForwardError::InvalidPath(_)),
                "{bucket}/{key} should be rejected"
            );
            assert!(err.is_blob_fetch());
        }
    }
}
