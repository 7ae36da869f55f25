//! Conversation store and background tasks for Hindsight.
//!
//! This crate holds the in-memory store, the sweeper and snapshotter tasks,
//! and the storage port (`SnapshotStore`) that the infrastructure layer
//! implements. It depends only on `hindsight-types` -- never on
//! `hindsight-infra` or any file format crate.

pub mod memory;
pub mod repository;
pub mod snapshotter;
pub mod store;
pub mod sweeper;
