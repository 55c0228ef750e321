//! Splitting: chunk planning, the generic splitter, and the
//! scenario-aware specialization

pub mod planner;
pub mod scenario;
pub mod splitter;

pub use planner::ChunkPlanner;
pub use scenario::{ProgressCallback, ScenarioSplitter, SplitProgress, QA_PAIRS_PER_SCENARIO};
pub use splitter::{FileSplitter, SplitConfig, Splitter};
