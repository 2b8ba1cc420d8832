//! typelens: type-graph cache for instrumented agent fleets.
//!
//! This crate is the front door over `typelens-core`:
//! - JSON output types for CLI responses
//! - CLI command implementations (`ingest`, `query`, `stats`)

pub mod cli;
pub mod output;
