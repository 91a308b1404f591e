use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("diagram has no nodes")]
    EmptyDiagram,

    #[error("cluster `{inner}` cannot be nested inside cluster `{outer}`")]
    NestedCluster { outer: String, inner: String },

    #[error("cluster `{label}` is missing its `end`")]
    UnclosedCluster { label: String },

    #[error("line {line}: edge references undeclared node `{key}`")]
    UnknownNode { line: usize, key: String },

    #[error("edge {from} -> {to} refers to a node outside this diagram ({nodes} nodes)")]
    DanglingEdge { from: usize, to: usize, nodes: usize },

    #[error("line {line}: node `{key}` is already declared")]
    DuplicateNode { line: usize, key: String },

    #[error("line {line}: syntax error: unexpected `{context}`")]
    Syntax { line: usize, context: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("raster rendering failed: {0}")]
    Raster(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
