//! Repository layer
//!
//! The worker's view of the Work-Item Store and the Pipeline Template Store.
//! Both are traits so the scheduler can run against the orchestrator over
//! HTTP in production and against in-memory stores in tests.

mod items;
mod templates;

#[cfg(test)]
pub mod memory;

pub use items::{HttpWorkItemRepository, WorkItemRepository};
pub use templates::{HttpTemplateRepository, TemplateRepository};
