//! File-backed snapshot persistence.

pub mod codec;
pub mod file;

pub use file::FileSnapshotStore;
