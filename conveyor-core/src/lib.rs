//! Conveyor Core
//!
//! Core types shared by every Conveyor service.
//!
//! This crate contains:
//! - Domain types: work items, pipeline templates, batch types and execution results
//! - DTOs: request/response bodies exchanged between orchestrator, worker and CLI

pub mod domain;
pub mod dto;
