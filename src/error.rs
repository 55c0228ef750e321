//! Error types for split and merge operations
//!
//! Following structured error handling principles with thiserror

use std::path::PathBuf;
use thiserror::Error;

/// Result type for split/merge operations
pub type SplitResult<T> = Result<T, SplitError>;

/// Structured error hierarchy for the splitting engine
///
/// Precondition failures (`NotFound`, `SchemaInvalid`, `InsufficientSpace`,
/// `InvalidInput`) are raised before any output is written. `IntegrityViolation`
/// and `ReconstructionMismatch` are raised during merge, before any output is
/// treated as valid.
#[derive(Error, Debug)]
pub enum SplitError {
    /// Source file or a referenced part file is missing
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// Structural schema validation failed before any write
    #[error("Schema validation failed for {path}: {reason}")]
    SchemaInvalid { path: PathBuf, reason: String },

    /// A part's size or checksum disagrees with the manifest
    #[error("Integrity violation in part {part_number} ({path}): expected {expected}, got {actual}")]
    IntegrityViolation {
        part_number: u32,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Final whole-file checksum disagrees after merge
    #[error("Reconstruction mismatch for {path}: manifest checksum {expected}, reconstructed {actual}")]
    ReconstructionMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Pre-flight disk space check failed
    #[error("Insufficient disk space in {dir}: {required} bytes required")]
    InsufficientSpace { dir: PathBuf, required: u64 },

    /// Invalid input parameters
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Manifest file is missing, unreadable, or structurally invalid
    #[error("Manifest error for {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// File system I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-table parse errors
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parse or serialize errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blocking task join errors
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SplitError {
    /// Create a not-found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a schema validation error
    pub fn schema_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an integrity violation error
    pub fn integrity_violation(
        part_number: u32,
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::IntegrityViolation {
            part_number,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a reconstruction mismatch error
    pub fn reconstruction_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ReconstructionMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a manifest error
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
