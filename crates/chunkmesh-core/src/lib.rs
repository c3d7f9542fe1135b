//! Shared types for the chunkmesh server coordinator.
//!
//! This crate holds everything that both the coordinator and the (external)
//! calculator, client coordinator and cluster registry implementations need to
//! agree on: chunk and output-chunk shapes, identity newtypes, the hook
//! abstraction used for per-job pre/post side effects, and the unified error
//! type.

mod common;
pub use common::*;
