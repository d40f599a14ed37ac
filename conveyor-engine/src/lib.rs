//! Conveyor Pipeline Engine
//!
//! Executes pipeline templates against collections of elements.
//! It includes:
//! - Service registry resolving logical service names to base addresses
//! - Remote service client abstraction with an HTTP implementation
//! - Field projections between the running context and remote calls
//! - Chunked, bounded-concurrency batch execution with per-step timeout/retry
//! - Batch-level retry classification and advisory compensation plans

pub mod chunk;
pub mod client;
pub mod compensation;
pub mod engine;
pub mod error;
pub mod projection;
pub mod registry;

pub use chunk::{chunk, chunk_count};
pub use client::{HttpServiceClient, ServiceClient, ServiceResponse, TransportError};
pub use compensation::{RetryClassifier, create_compensation_plan};
pub use engine::{EngineConfig, PipelineEngine};
pub use error::ExecutionError;
pub use registry::{RegistryError, ServiceRegistry};

pub use conveyor_core::domain::item::ItemElement;
