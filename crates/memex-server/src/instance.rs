//! Instance (C3): binds one tenant name to one record store, one vector
//! collection handle, and the fixed tool set.

use memex_core::{MemoryVectorIndex, RecordStore, VectorIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lazily-initialized vector handle. A failed first attempt is retried on
/// next use rather than cached as a permanent failure, mirroring the
/// source's `get_chroma_collection` retry shape.
enum VectorSlot {
    Uninit,
    Ready(Arc<dyn VectorIndex>),
}

pub struct Instance {
    pub name: String,
    pub pages_dir: PathBuf,
    store: RecordStore,
    vector: RwLock<VectorSlot>,
}

impl Instance {
    pub fn new(name: impl Into<String>, record_dir: PathBuf, pages_dir: PathBuf) -> Self {
        Instance {
            name: name.into(),
            pages_dir,
            store: RecordStore::new(record_dir),
            vector: RwLock::new(VectorSlot::Uninit),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Return the vector handle, initializing it on first use. The default
    /// backend shipped with this crate is the in-process
    /// [`MemoryVectorIndex`]; a real engine is wired in by constructing an
    /// `Instance` whose slot is pre-populated, or by extending this method
    /// to dial an external service instead.
    pub async fn vector(&self) -> Option<Arc<dyn VectorIndex>> {
        {
            let slot = self.vector.read().await;
            if let VectorSlot::Ready(index) = &*slot {
                return Some(index.clone());
            }
        }
        let mut slot = self.vector.write().await;
        if let VectorSlot::Ready(index) = &*slot {
            return Some(index.clone());
        }
        let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new());
        *slot = VectorSlot::Ready(index.clone());
        Some(index)
    }
}
