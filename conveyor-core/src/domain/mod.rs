//! Core domain types
//!
//! These types are shared between the orchestrator (which persists them) and
//! the worker (which claims and executes them).

pub mod batch;
pub mod compensation;
pub mod item;
pub mod result;
pub mod template;
