//! Chunked splitting and checksum-verified reconstruction of large
//! structured text files
//!
//! Divides delimited tables (CSV/TSV), line-delimited records (JSONL),
//! and array-based JSON documents into size-bounded parts suitable for
//! storage systems with per-file size limits, and reconstructs the
//! original file from those parts. Every split writes a manifest binding
//! the source to its parts with per-part and whole-file checksums; every
//! merge re-verifies those checksums before and after reconstruction.
//!
//! # Architecture
//!
//! - `integrity`: hashing, disk-space probing, filename sanitization
//! - `format`: one codec strategy per supported format
//! - `split`: chunk planner, generic splitter, scenario-aware splitter
//! - `manifest`: the serializable splitter/merger contract
//! - `merge`: manifest-driven, checksum-gated reconstruction
//!
//! Atomic units (one row, one line, one array element, one scenario) are
//! never fractured across parts: a unit larger than the chunk budget
//! stays whole in its own part.

pub mod cli;
pub mod error;
pub mod format;
pub mod integrity;
pub mod logging;
pub mod manifest;
pub mod merge;
pub mod split;

pub use error::{SplitError, SplitResult};
pub use format::FileFormat;
pub use manifest::{FormatInfo, PartManifest, SplitManifest, UnitRange};
pub use merge::{MergeConfig, Merger};
pub use split::{
    ChunkPlanner, FileSplitter, ProgressCallback, ScenarioSplitter, SplitConfig, SplitProgress,
    Splitter, QA_PAIRS_PER_SCENARIO,
};

/// Default target chunk size in bytes
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 5 * 1024 * 1024; // 5MB

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        error::{SplitError, SplitResult},
        manifest::SplitManifest,
        merge::{MergeConfig, Merger},
        split::{FileSplitter, ScenarioSplitter, SplitConfig, Splitter},
    };
}
