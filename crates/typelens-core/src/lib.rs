//! Core infrastructure for typelens.
//!
//! This crate provides the server-side type-graph cache:
//! - Type model: arena-backed nodes with id-set edges
//! - Fragment ingest types for the bytecode-parser boundary
//! - Merge engine for incremental, one-level fragment merges
//! - FQN and hash indices, maintained through change notifications
//! - Lock-guarded store with read/write closure primitives
//! - Read-only lookup service
//! - Instrumentation coordinator and applier boundary
//! - Error types

pub mod error;
pub mod events;
pub mod fragment;
pub mod index;
pub mod instrument;
pub mod lookup;
mod merge;
pub mod model;
pub mod pattern;
pub mod store;
