//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and contain domain logic.

pub mod batch;
pub mod item;
pub mod lease;
pub mod template;

pub use batch as batch_service;
pub use item as item_service;
pub use lease as lease_service;
pub use template as template_service;
