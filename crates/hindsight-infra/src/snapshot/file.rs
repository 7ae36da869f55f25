//! Snapshot store backed by a single file.
//!
//! Saves write the encoded snapshot to a temporary file in the target
//! directory and rename it over the target, so an interrupted save leaves the
//! previous snapshot intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use hindsight_core::repository::snapshot::SnapshotStore;
use hindsight_types::error::SnapshotError;
use hindsight_types::snapshot::RootSnapshot;
use tempfile::NamedTempFile;

use super::codec;

/// Permissions of a written snapshot; temp files start out owner-only.
#[cfg(unix)]
const SNAPSHOT_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn read_file(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(SNAPSHOT_MODE))?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<RootSnapshot>, SnapshotError> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || read_file(&path))
            .await
            .map_err(|e| self.io_error(std::io::Error::other(e)))?
            .map_err(|e| self.io_error(e))?;

        match bytes {
            Some(bytes) => {
                let snapshot = codec::decode(&bytes)?;
                tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot read");
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &RootSnapshot) -> Result<(), SnapshotError> {
        let bytes = codec::encode(snapshot)?;
        let len = bytes.len();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| self.io_error(std::io::Error::other(e)))?
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), bytes = len, "snapshot written");
        Ok(())
    }
}
