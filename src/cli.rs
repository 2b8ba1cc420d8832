//! CLI command implementations.
//!
//! The `tlens` binary is an offline inspector for fragment dumps: it builds
//! a fresh cache from one or more JSON fragment files, then reports events,
//! query results, or graph statistics as a single JSON document.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use typelens_core::error::ModificationError;
use typelens_core::fragment::TypeFragment;
use typelens_core::model::TypeKindTag;
use typelens_core::store::TypeCache;

use crate::output::{
    IngestResponse, OutputErrorCode, QueryResponse, StatsResponse, TypeSummary, SCHEMA_VERSION,
};

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum TlensError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A fragment file could not be read.
    #[error("cannot read fragment file {path}: {message}")]
    FragmentFile { path: String, message: String },

    /// A fragment file could not be parsed.
    #[error("cannot parse fragment file {path}: {message}")]
    FragmentParse { path: String, message: String },

    /// The cache rejected a fragment.
    #[error("merge rejected for {path}: {source}")]
    Merge {
        path: String,
        #[source]
        source: ModificationError,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TlensError {
    /// Get the output error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        match self {
            TlensError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            TlensError::FragmentFile { .. } => OutputErrorCode::FragmentError,
            TlensError::FragmentParse { .. } => OutputErrorCode::FragmentError,
            TlensError::Merge { .. } => OutputErrorCode::MergeError,
            TlensError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

/// Totals accumulated while replaying fragment files.
struct IngestTotals {
    fragments: usize,
    node_events: usize,
    reference_events: usize,
}

/// Build a cache from the given fragment files.
fn load_cache(paths: &[PathBuf]) -> Result<(TypeCache, IngestTotals), TlensError> {
    if paths.is_empty() {
        return Err(TlensError::InvalidArguments {
            message: "at least one fragment file is required".to_string(),
        });
    }

    let cache = TypeCache::new();
    let mut totals = IngestTotals {
        fragments: 0,
        node_events: 0,
        reference_events: 0,
    };
    for path in paths {
        let fragments = read_fragments(path)?;
        debug!(path = %path.display(), count = fragments.len(), "replaying fragments");
        for fragment in fragments {
            let events = cache.merge(fragment).map_err(|source| TlensError::Merge {
                path: path.display().to_string(),
                source,
            })?;
            totals.fragments += 1;
            totals.node_events += events.node_events.len();
            totals.reference_events += events.reference_events.len();
        }
    }
    Ok((cache, totals))
}

fn read_fragments(path: &Path) -> Result<Vec<TypeFragment>, TlensError> {
    let content = std::fs::read_to_string(path).map_err(|err| TlensError::FragmentFile {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|err| TlensError::FragmentParse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TlensError> {
    serde_json::to_string_pretty(value).map_err(|err| TlensError::Internal {
        message: err.to_string(),
    })
}

/// Replay fragment files and report merge totals.
pub fn run_ingest(paths: &[PathBuf]) -> Result<String, TlensError> {
    let (cache, totals) = load_cache(paths)?;
    to_json(&IngestResponse {
        schema_version: SCHEMA_VERSION,
        status: "ok".to_string(),
        fragments_merged: totals.fragments,
        node_events: totals.node_events,
        reference_events: totals.reference_events,
        node_count: cache.node_count(),
    })
}

/// Replay fragment files and query the resulting cache by pattern.
pub fn run_query(
    paths: &[PathBuf],
    pattern: &str,
    only_initialized: bool,
    kind: Option<&str>,
) -> Result<String, TlensError> {
    let (cache, _totals) = load_cache(paths)?;
    let lookup = cache.lookup();
    let matches = match kind {
        None => lookup.find_by_pattern(pattern, only_initialized),
        Some("class") => lookup.find_classes_by_pattern(pattern, only_initialized),
        Some("interface") => lookup.find_interfaces_by_pattern(pattern, only_initialized),
        Some("annotation") => lookup.find_annotations_by_pattern(pattern, only_initialized),
        Some("exception") => lookup.find_exception_classes_by_pattern(pattern, only_initialized),
        Some(other) => {
            return Err(TlensError::InvalidArguments {
                message: format!(
                    "unknown kind filter '{}': expected class, interface, annotation, or exception",
                    other
                ),
            });
        }
    };

    to_json(&QueryResponse {
        schema_version: SCHEMA_VERSION,
        status: "ok".to_string(),
        pattern: pattern.to_string(),
        matches: matches.into_iter().map(TypeSummary::from).collect(),
    })
}

/// Replay fragment files and report graph statistics.
pub fn run_stats(paths: &[PathBuf]) -> Result<String, TlensError> {
    let (cache, _totals) = load_cache(paths)?;
    let all = cache.lookup().find_all();
    let response = StatsResponse {
        schema_version: SCHEMA_VERSION,
        status: "ok".to_string(),
        node_count: all.len(),
        initialized: all.iter().filter(|s| s.initialized).count(),
        classes: all.iter().filter(|s| s.kind == TypeKindTag::Class).count(),
        interfaces: all
            .iter()
            .filter(|s| s.kind == TypeKindTag::Interface)
            .count(),
        annotations: all
            .iter()
            .filter(|s| s.kind == TypeKindTag::Annotation)
            .count(),
        exception_classes: all.iter().filter(|s| s.exception).count(),
    };
    to_json(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fragment_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const FRAGMENTS: &str = r#"[
        {
            "kind": "class",
            "fqn": "com.acme.Foo",
            "hashes": ["h1"],
            "modifiers": 1,
            "super_classes": [{"fqn": "java.lang.Object"}]
        },
        {
            "kind": "interface",
            "fqn": "com.acme.Service",
            "hashes": ["s1"],
            "modifiers": 1
        }
    ]"#;

    #[test]
    fn ingest_reports_totals() {
        let dir = std::env::temp_dir().join("tlens-test-ingest");
        std::fs::create_dir_all(&dir).unwrap();
        let path = fragment_file(&dir, "fragments.json", FRAGMENTS);

        let json = run_ingest(&[path]).unwrap();
        assert!(json.contains("\"fragments_merged\": 2"));
        // Foo + Object stub + Service.
        assert!(json.contains("\"node_count\": 3"));
    }

    #[test]
    fn query_filters_by_kind() {
        let dir = std::env::temp_dir().join("tlens-test-query");
        std::fs::create_dir_all(&dir).unwrap();
        let path = fragment_file(&dir, "fragments.json", FRAGMENTS);

        let json = run_query(&[path], "com.acme.*", true, Some("interface")).unwrap();
        assert!(json.contains("com.acme.Service"));
        assert!(!json.contains("com.acme.Foo"));
    }

    #[test]
    fn unknown_kind_is_invalid_arguments() {
        let dir = std::env::temp_dir().join("tlens-test-kind");
        std::fs::create_dir_all(&dir).unwrap();
        let path = fragment_file(&dir, "fragments.json", FRAGMENTS);

        let err = run_query(&[path], "*", false, Some("enum")).unwrap_err();
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }

    #[test]
    fn missing_file_is_fragment_error() {
        let err = run_ingest(&[PathBuf::from("/nonexistent/fragments.json")]).unwrap_err();
        assert_eq!(err.error_code(), OutputErrorCode::FragmentError);
    }

    #[test]
    fn no_files_is_invalid_arguments() {
        let err = run_stats(&[]).unwrap_err();
        assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
    }
}
