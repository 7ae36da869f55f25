//! Observability setup for Hindsight: tracing subscriber and optional
//! OpenTelemetry export.

pub mod tracing_setup;
