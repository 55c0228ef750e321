//! Merging: manifest validation and checksum-verified reconstruction

pub mod merger;

pub use merger::{MergeConfig, Merger};
