//! Library error type. Binary-level control flow (`main.rs`) wraps these
//! with `anyhow::Context` to name the failing path or operation; the
//! library itself stays precise about *what* went wrong.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForceLayoutError {
    #[error("input graph has no items")]
    EmptyGraph,

    #[error("no vertex has positive weight; nothing to lay out")]
    NoHeaviestVertex,

    #[error("item id {0:?} is not a non-negative integer")]
    InvalidId(String),

    #[error("failed to parse document as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}
