//! Shared domain types for Hindsight.
//!
//! This crate contains the value types used across the Hindsight workspace:
//! line entries and reply links, contact metadata, the persisted snapshot
//! layout, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod contact;
pub mod error;
pub mod line;
pub mod snapshot;
