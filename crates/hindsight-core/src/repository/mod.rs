//! Storage trait definitions (ports).
//!
//! The infrastructure layer (hindsight-infra) implements these traits. The
//! core crate never depends on a specific storage technology.

pub mod snapshot;
