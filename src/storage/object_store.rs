// Object storage abstraction
// Raw interview audio lives in a bucket/key namespace; the pipeline only
// ever reads it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object in full
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed store: buckets are directories under a root
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read object {}/{}", bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_objects_under_bucket_dirs() {
        let dir = tempdir().unwrap();
        let audio_dir = dir.path().join("interview-audio/recordings/f1/c1");
        std::fs::create_dir_all(&audio_dir).unwrap();
        std::fs::write(audio_dir.join("sess.webm"), b"fake audio").unwrap();

        let store = FsObjectStore::new(dir.path().to_path_buf());
        let bytes = store
            .get_bytes("interview-audio", "recordings/f1/c1/sess.webm")
            .await
            .unwrap();
        assert_eq!(bytes, b"fake audio");

        assert!(store.get_bytes("interview-audio", "missing").await.is_err());
    }
}
