use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::index::DedupIndex;
use crate::ingest::BatchIngestor;
use crate::progress::ProgressTracker;
use crate::store::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<BatchIngestor>,
    pub progress: Arc<ProgressTracker>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(index: Arc<dyn DedupIndex>, store: Arc<dyn BlobStore>, group_size: usize) -> Self {
        let progress = Arc::new(ProgressTracker::new());
        let broadcaster = Arc::new(Broadcaster::new());
        let ingestor = Arc::new(BatchIngestor::new(
            index,
            store,
            progress.clone(),
            broadcaster.clone(),
            group_size,
        ));
        Self {
            ingestor,
            progress,
            broadcaster,
        }
    }
}
