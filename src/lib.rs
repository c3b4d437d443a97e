//! Health probe aggregation and graceful shutdown for services that run
//! behind an orchestrator routing traffic on probe results.
//!
//! - `health` - pluggable dependency indicators and their aggregation
//! - `server` - probe endpoints, readiness gating, and shutdown sequencing

pub mod health;
pub mod server;
