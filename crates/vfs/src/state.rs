use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use library::{CatalogIndex, LibraryStats};
use parking_lot::RwLock;

#[derive(Clone, Debug)]
pub enum IndexStatus {
    Empty,
    Scanning { started: SystemTime },
    Ready(LibraryStats),
    /// The last build failed. A previously published index stays in use.
    Error(String),
}

/// The currently published index. Readers take a snapshot `Arc` and keep
/// using it for as long as they need; a rebuild swaps in a new one.
pub struct IndexState {
    index: RwLock<Option<Arc<CatalogIndex>>>,
    status: RwLock<IndexStatus>,
    published_secs: RwLock<u64>,
}

impl IndexState {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(None),
            status: RwLock::new(IndexStatus::Empty),
            published_secs: RwLock::new(0),
        }
    }

    pub fn current(&self) -> Option<Arc<CatalogIndex>> {
        self.index.read().clone()
    }

    pub fn status(&self) -> IndexStatus {
        self.status.read().clone()
    }

    /// Seconds since the epoch at which the current index was published.
    pub fn published_secs(&self) -> u64 {
        *self.published_secs.read()
    }

    pub fn begin_scan(&self) {
        *self.status.write() = IndexStatus::Scanning {
            started: SystemTime::now(),
        };
    }

    pub fn publish(&self, index: CatalogIndex) -> LibraryStats {
        let stats = index.stats();
        *self.index.write() = Some(Arc::new(index));
        *self.published_secs.write() = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|value| value.as_secs())
            .unwrap_or(0);
        *self.status.write() = IndexStatus::Ready(stats.clone());
        stats
    }

    pub fn fail(&self, message: String) {
        *self.status.write() = IndexStatus::Error(message);
    }
}

impl Default for IndexState {
    fn default() -> Self {
        Self::new()
    }
}
