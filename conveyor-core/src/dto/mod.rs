//! Data Transfer Objects for inter-service communication
//!
//! Request and response bodies exchanged between the orchestrator, the
//! workers and the CLI.

pub mod batch;
pub mod item;
pub mod template;
