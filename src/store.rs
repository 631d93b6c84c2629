use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
}

/// Write-once sink for accepted file bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists the full stream under `name` and returns the stored name.
    /// Either the whole stream lands or the call fails; a failed write must
    /// not leave a truncated blob visible to readers.
    async fn write(
        &self,
        name: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<String, StoreError>;

    /// Discards a previously written blob. Used when a write loses the
    /// dedup-insert race and the bytes are no longer wanted.
    async fn remove(&self, name: &str) -> Result<(), StoreError>;
}

/// Filesystem blob store. Streams into a `.part` temp file in the same
/// directory and renames into place, so readers never see a partial blob.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(
        &self,
        name: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<String, StoreError> {
        let final_path = self.root.join(name);
        let part_path = self.root.join(format!("{name}.part"));

        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(StoreError::WriteFailed)?;

        let copied = async {
            tokio::io::copy(source, &mut file).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = copied {
            if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                warn!(path = %part_path.display(), error = %cleanup, "failed to clean up partial blob");
            }
            return Err(StoreError::WriteFailed(e));
        }

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(StoreError::WriteFailed)?;
        Ok(name.to_string())
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        tokio::fs::remove_file(self.root.join(name))
            .await
            .map_err(StoreError::WriteFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_persists_full_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("blobs")).await.unwrap();

        let stored = store
            .write("x1-notes.txt", &mut Cursor::new(b"line one\nline two\n".to_vec()))
            .await
            .unwrap();
        assert_eq!(stored, "x1-notes.txt");

        let bytes = tokio::fs::read(store.root().join("x1-notes.txt")).await.unwrap();
        assert_eq!(bytes, b"line one\nline two\n");
    }

    #[tokio::test]
    async fn write_leaves_no_part_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("blobs")).await.unwrap();
        store
            .write("x2-data.bin", &mut Cursor::new(vec![7u8; 1024]))
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(store.root()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().into_string().unwrap());
        }
        assert_eq!(names, vec!["x2-data.bin"]);
    }

    #[tokio::test]
    async fn remove_discards_a_written_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("blobs")).await.unwrap();
        store
            .write("x3-loser.bin", &mut Cursor::new(b"raced".to_vec()))
            .await
            .unwrap();

        store.remove("x3-loser.bin").await.unwrap();
        assert!(!store.root().join("x3-loser.bin").exists());
    }
}
