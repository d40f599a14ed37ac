//! Service layer
//!
//! Processors turn a claimed work item into its result. Each capability
//! maps to one processor in an explicitly constructed registry.

mod processor;

pub use processor::{PipelineProcessor, Processor, ProcessorRegistry};
