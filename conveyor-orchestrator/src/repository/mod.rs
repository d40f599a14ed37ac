//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity.

pub mod batch;
pub mod item;
pub mod template;

pub use batch as batch_repository;
pub use item as item_repository;
pub use template as template_repository;
