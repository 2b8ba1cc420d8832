//! JSON output types for CLI responses.
//!
//! Every `tlens` invocation prints exactly one JSON document on stdout.
//! Error responses carry a stable integer code that doubles as the process
//! exit code.

use serde::Serialize;

use typelens_core::lookup::TypeSnapshot;

/// Output schema version, bumped on breaking changes to response shapes.
pub const SCHEMA_VERSION: u32 = 1;

/// Error codes for JSON output and process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Fragment file could not be read or parsed.
    FragmentError = 3,
    /// The cache rejected a fragment.
    MergeError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Response of `tlens ingest`.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub schema_version: u32,
    pub status: String,
    /// Fragments merged, across all input files.
    pub fragments_merged: usize,
    /// Node events fired by the merges.
    pub node_events: usize,
    /// Reference events fired by the merges.
    pub reference_events: usize,
    /// Nodes in the cache after ingest, stubs included.
    pub node_count: usize,
}

/// One match of a `tlens query`.
#[derive(Debug, Serialize)]
pub struct TypeSummary {
    pub fqn: String,
    pub kind: String,
    pub initialized: bool,
    pub hashes: Vec<String>,
}

impl From<TypeSnapshot> for TypeSummary {
    fn from(snapshot: TypeSnapshot) -> Self {
        TypeSummary {
            fqn: snapshot.fqn,
            kind: snapshot.kind.to_string(),
            initialized: snapshot.initialized,
            hashes: snapshot.hashes.into_iter().collect(),
        }
    }
}

/// Response of `tlens query`.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub schema_version: u32,
    pub status: String,
    pub pattern: String,
    pub matches: Vec<TypeSummary>,
}

/// Response of `tlens stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub schema_version: u32,
    pub status: String,
    pub node_count: usize,
    pub initialized: usize,
    pub classes: usize,
    pub interfaces: usize,
    pub annotations: usize,
    pub exception_classes: usize,
}

/// Error payload of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

/// Error response, printed on stderr.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub schema_version: u32,
    pub status: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(code: OutputErrorCode, message: impl Into<String>) -> Self {
        ErrorResponse {
            schema_version: SCHEMA_VERSION,
            status: "error".to_string(),
            error: ErrorInfo {
                code: code.code(),
                message: message.into(),
            },
        }
    }
}
