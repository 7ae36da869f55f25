//! Infrastructure layer for Hindsight.
//!
//! Contains implementations of the storage traits defined in `hindsight-core`
//! (the file-backed snapshot store and its binary codec) and the startup
//! configuration loader.

pub mod config;
pub mod snapshot;
