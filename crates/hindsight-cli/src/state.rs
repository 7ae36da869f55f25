//! Application state wiring the store to its file backend.

use std::sync::Arc;

use hindsight_core::memory::MemoryLimits;
use hindsight_core::snapshotter::{SnapshotPersister, restore_store};
use hindsight_core::store::RootStore;
use hindsight_infra::snapshot::FileSnapshotStore;
use hindsight_types::config::HindsightConfig;

pub type ConcretePersister = SnapshotPersister<FileSnapshotStore>;

/// Shared state used by every command.
#[derive(Clone)]
pub struct AppState {
    pub config: HindsightConfig,
    pub backend: FileSnapshotStore,
    pub store: Arc<RootStore>,
}

impl AppState {
    /// Restore the store from the configured snapshot file.
    pub async fn init(config: HindsightConfig) -> Self {
        let backend = FileSnapshotStore::new(&config.snapshot.path);
        let store = restore_store(&backend, &config.memory.shared_conversations).await;
        Self {
            config,
            backend,
            store: Arc::new(store),
        }
    }

    pub fn limits(&self) -> MemoryLimits {
        MemoryLimits::from(&self.config.memory)
    }

    pub fn persister(&self) -> Arc<ConcretePersister> {
        Arc::new(SnapshotPersister::new(
            Arc::clone(&self.store),
            self.backend.clone(),
        ))
    }
}
