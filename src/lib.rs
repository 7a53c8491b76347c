//! BBAnn: benchmark-harness adapter for the BBAnn vector index
//!
//! This crate exposes a native approximate-nearest-neighbor index library to a
//! big-ann style benchmark harness. The harness drives an algorithm through a
//! fixed lifecycle (construct, fit or load, query, read results); the adapter
//! translates those calls into typed calls against the native index and turns
//! the harness's loosely-typed option maps into a validated parameter struct.

#![warn(missing_docs)]

/// Element types and vector matrices (int8, uint8, float32)
pub mod types;

/// Distance metrics and scalar distance kernels
pub mod distance;

/// File format support (big-ann .bin, knn and range answer files)
pub mod formats;

/// Index parameters and option-map validation
pub mod params;

/// Native index library boundary and the reference backend
pub mod native;

/// Benchmark harness boundary (datasets, algorithm lifecycle)
pub mod harness;

/// The BBAnn harness adapter
pub mod adapter;

/// Recall computation and timing helpers
pub mod utils;

/// Command-line interface modules
pub mod cli;

/// CLI configuration structure
#[derive(Debug)]
pub struct Cli {
    /// Print extra diagnostics
    pub verbose: bool,
    /// Plain text output without progress bars
    pub no_progress: bool,
}

// Re-export commonly used types
pub use adapter::BbAnn;
pub use distance::Metric;
pub use harness::{BaseAnn, Dataset, LocalDataset};
pub use native::{AnnIndex, IndexFactory, KnnResults, RangeResults, TypedIndex};
pub use params::{BBAnnParameters, ParamKey, UnknownKeyPolicy};
pub use types::{AnyMatrix, DataType, Matrix, VectorElement};

/// Result type for BBAnn operations
pub type Result<T> = anyhow::Result<T>;

/// Error types for BBAnn operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid dimension for vectors
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index or file was built with
        expected: usize,
        /// Dimension that was supplied
        actual: usize,
    },

    /// Query element type differs from the index element type
    #[error("Data type mismatch: index holds {expected}, got {actual}")]
    DataTypeMismatch {
        /// Element type of the index
        expected: DataType,
        /// Element type of the supplied vectors
        actual: DataType,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Option name not recognized by the parameter registry
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bytes per page; the CLI expresses block sizes in pages.
pub const PAGE_SIZE: u64 = 4096;
