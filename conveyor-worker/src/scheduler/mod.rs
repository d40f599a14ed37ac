//! Scheduler layer for the worker
//!
//! Polls the store for pending items of this worker's capability, claims
//! them, and runs each claimed item to a terminal status.

pub mod backoff;
pub mod claim;
pub mod poller;

pub use poller::ItemPoller;
