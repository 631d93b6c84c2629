use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::broadcast::Broadcaster;
use crate::hash;
use crate::index::{DedupIndex, IndexError};
use crate::progress::ProgressTracker;
use crate::store::BlobStore;

pub const DEFAULT_GROUP_SIZE: usize = 5;

/// One file from an accepted batch, fully buffered off the transport.
pub struct IncomingFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Stored { stored_name: String },
    AlreadyExists,
    WriteFailed { reason: String },
}

/// Runs a batch through the dedup pipeline: fingerprint, index lookup,
/// blob write, conditional index insert. Files are processed in fixed-size
/// groups; members of a group run concurrently, groups run one after
/// another, which caps concurrent blob writes at the group size.
pub struct BatchIngestor {
    index: Arc<dyn DedupIndex>,
    store: Arc<dyn BlobStore>,
    progress: Arc<ProgressTracker>,
    broadcaster: Arc<Broadcaster>,
    group_size: usize,
}

impl BatchIngestor {
    pub fn new(
        index: Arc<dyn DedupIndex>,
        store: Arc<dyn BlobStore>,
        progress: Arc<ProgressTracker>,
        broadcaster: Arc<Broadcaster>,
        group_size: usize,
    ) -> Self {
        Self {
            index,
            store,
            progress,
            broadcaster,
            group_size: group_size.max(1),
        }
    }

    /// Processes the whole batch and returns one outcome per file, in input
    /// order. Progress advances once per completed group, after that group's
    /// file work and before its broadcast; a failed file never aborts its
    /// group or the batch.
    pub async fn ingest(&self, batch: Vec<IncomingFile>) -> Vec<FileOutcome> {
        self.progress.reset(batch.len() as u64);
        info!(files = batch.len(), group_size = self.group_size, "batch accepted");

        let mut outcomes = Vec::with_capacity(batch.len());
        for group in batch.chunks(self.group_size) {
            let results = join_all(group.iter().map(|file| self.process_file(file))).await;
            outcomes.extend(results);

            self.progress.advance(group.len() as u64);
            self.broadcaster.publish(self.progress.snapshot());
        }

        info!(files = outcomes.len(), "batch finished");
        outcomes
    }

    async fn process_file(&self, file: &IncomingFile) -> FileOutcome {
        let mut source = Cursor::new(file.bytes.clone());
        let fingerprint = match hash::fingerprint(&mut source).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "failed to read upload");
                return FileOutcome::WriteFailed { reason: e.to_string() };
            }
        };

        // Fast path; the index unique constraint below is the authoritative
        // dedup check.
        match self.index.lookup(&fingerprint).await {
            Ok(Some(_)) => {
                info!(filename = %file.filename, fingerprint = %fingerprint, "content already stored");
                return FileOutcome::AlreadyExists;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "index lookup failed");
                return FileOutcome::WriteFailed { reason: e.to_string() };
            }
        }

        let name = stored_name_for(&file.filename);
        let stored_name = match self.store.write(&name, &mut source).await {
            Ok(stored_name) => stored_name,
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "blob write failed");
                return FileOutcome::WriteFailed { reason: e.to_string() };
            }
        };

        match self.index.insert(&fingerprint, &stored_name).await {
            Ok(()) => {
                info!(
                    filename = %file.filename,
                    fingerprint = %fingerprint,
                    stored_name = %stored_name,
                    "stored new content"
                );
                FileOutcome::Stored { stored_name }
            }
            Err(IndexError::DuplicateFingerprint) => {
                // Lost the insert race to a concurrent upload of the same
                // content; keep the winner's copy and drop ours.
                if let Err(e) = self.store.remove(&stored_name).await {
                    warn!(stored_name = %stored_name, error = %e, "failed to discard raced blob");
                }
                info!(filename = %file.filename, fingerprint = %fingerprint, "lost dedup race");
                FileOutcome::AlreadyExists
            }
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "index insert failed");
                FileOutcome::WriteFailed { reason: e.to_string() }
            }
        }
    }
}

/// Stored names keep the original filename readable but get a random prefix,
/// so two uploads that share a filename never collide on disk or in the
/// index's unique stored-name column.
fn stored_name_for(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-{}", nanoid::nanoid!(8), safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_for_the_same_filename_differ() {
        let a = stored_name_for("report.pdf");
        let b = stored_name_for("report.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("-report.pdf"));
    }

    #[test]
    fn stored_names_strip_path_characters() {
        let name = stored_name_for("../etc/pass wd");
        assert!(!name.contains('/'));
        assert!(!name.contains(' '));
        assert!(name.ends_with("-.._etc_pass_wd"));
    }
}
