//! Snapshot store trait definition.

use hindsight_types::error::SnapshotError;
use hindsight_types::snapshot::RootSnapshot;

/// Durable home of the persisted store.
///
/// Implementations live in hindsight-infra (e.g., FileSnapshotStore).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot. `Ok(None)` when nothing was saved yet.
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<RootSnapshot>, SnapshotError>> + Send;

    /// Replace the saved snapshot with `snapshot`.
    fn save(
        &self,
        snapshot: &RootSnapshot,
    ) -> impl std::future::Future<Output = Result<(), SnapshotError>> + Send;
}
