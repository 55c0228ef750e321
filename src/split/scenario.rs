//! Scenario-aware splitter for the fixed QA-scenario table schema
//!
//! Specializes the generic splitter for a wide delimited table in which
//! every row is one assessment scenario carrying a fixed number of
//! question/answer sub-records. Beyond the generic byte-budget planning,
//! this splitter validates the column schema up front, estimates a
//! rows-per-part target from a sample pre-pass, tracks scenario and
//! QA-pair counters, reports progress through a synchronous callback,
//! and emits the richer scenario manifest metadata.

use crate::error::{SplitError, SplitResult};
use crate::format::{DelimitedScanner, HeaderRecord, RangeKind};
use crate::integrity;
use crate::manifest::{ReconstructionInfo, ScenarioSchema, SplitManifest};
use crate::split::splitter::{
    assemble_manifest, checksum_parts, persist_manifest, EngineOutcome, PartWriter, SplitConfig,
    SplitLayout, Splitter,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Fixed number of question/answer sub-records per scenario row
pub const QA_PAIRS_PER_SCENARIO: u64 = 4;

/// `dataset_type` value written into scenario manifests
pub const SCENARIO_DATASET_TYPE: &str = "scenario_qa";

/// Expected column set of the scenario table, order-independent
pub const EXPECTED_COLUMNS: &[&str] = &[
    "scenario_id",
    "scenario",
    "category",
    "attack_type",
    "risk_score",
    "confidence_score",
    "question_1",
    "answer_1",
    "question_2",
    "answer_2",
    "question_3",
    "answer_3",
    "question_4",
    "answer_4",
];

/// Rows sampled by the pre-pass for size and type estimation
const SAMPLE_ROWS: usize = 100;

/// Fraction of sampled values that must parse as numbers for a
/// score-hinted column to be typed numeric
const NUMERIC_SAMPLE_THRESHOLD: f64 = 0.8;

/// Column-name fragments that hint at a numeric score or metric
const NUMERIC_NAME_HINTS: &[&str] = &["score", "rating", "count", "weight", "metric"];

/// Rows between two progress callback invocations
const PROGRESS_REPORT_INTERVAL: u64 = 250;

/// Progress snapshot passed to the callback
#[derive(Debug, Clone)]
pub struct SplitProgress {
    pub units_processed: u64,
    pub total_units: u64,
    pub message: String,
}

/// Synchronous progress callback; runs on the splitting thread
pub type ProgressCallback = Box<dyn Fn(&SplitProgress) + Send + Sync>;

/// Splitter for the fixed scenario table schema
#[derive(Debug, Clone, Default)]
pub struct ScenarioSplitter;

impl ScenarioSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Split a scenario table, reporting progress through `progress`
    ///
    /// The callback fires at a bounded row interval and once more at
    /// completion with `units_processed == total_units`.
    #[instrument(skip_all, fields(file = %source.display()))]
    pub async fn split_with_progress(
        &self,
        source: &Path,
        config: &SplitConfig,
        progress: Option<ProgressCallback>,
    ) -> SplitResult<SplitManifest> {
        let layout = SplitLayout::resolve(source, config).await?;
        if !layout.format.has_header() {
            return Err(SplitError::invalid_input(format!(
                "Scenario-aware splitting requires a delimited table, got {}",
                layout.format.file_type()
            )));
        }

        let budget = config.chunk_size_bytes;

        // Pre-pass: schema validation, scenario count, size/type sampling.
        // Nothing is written until this succeeds.
        let prepass_layout = layout.clone();
        let prepass = tokio::task::spawn_blocking(move || prepass_blocking(&prepass_layout)).await??;

        let target_rows = rows_per_part_target(budget, &prepass);
        debug!(
            "Pre-pass: {} scenarios, avg row {} bytes, targeting {} rows per part",
            prepass.total_scenarios, prepass.average_row_size, target_rows
        );

        let engine_layout = layout.clone();
        let total_scenarios = prepass.total_scenarios;
        let outcome = tokio::task::spawn_blocking(move || {
            split_scenarios_blocking(&engine_layout, budget, target_rows, total_scenarios, progress)
        })
        .await??;

        // Scenario accounting must hold before the manifest is written
        let covered: u64 = outcome
            .parts
            .iter()
            .map(|p| p.last_unit - p.first_unit + 1)
            .sum();
        if covered != total_scenarios {
            return Err(SplitError::invalid_input(format!(
                "Scenario accounting mismatch: parts cover {} of {} scenarios",
                covered, total_scenarios
            )));
        }

        let checksum = integrity::hash_file(source).await?;

        let mut parts = checksum_parts(&outcome.parts, RangeKind::Row).await?;
        for part in &mut parts {
            let range = part.row_range.expect("scenario parts carry row ranges");
            part.scenario_range = Some(range);
            part.scenario_count = Some(range.count());
            part.qa_pairs = Some(range.count() * QA_PAIRS_PER_SCENARIO);
        }

        let validation_checksums: Vec<String> =
            parts.iter().map(|p| p.checksum.clone()).collect();
        let merge_order: Vec<u32> = parts.iter().map(|p| p.part_number).collect();

        let mut manifest =
            assemble_manifest(&layout, config, &outcome, checksum.clone(), Some(parts)).await?;
        manifest.dataset_type = Some(SCENARIO_DATASET_TYPE.to_string());
        manifest.total_scenarios = Some(total_scenarios);
        manifest.total_qa_pairs = Some(total_scenarios * QA_PAIRS_PER_SCENARIO);
        manifest.total_size_display = Some(integrity::format_size(layout.total_size));
        manifest.schema = Some(ScenarioSchema {
            columns: prepass.header.columns.clone(),
            column_count: prepass.header.columns.len(),
            column_types: infer_column_types(&prepass.header.columns, &prepass.samples),
            encoding: "utf-8".to_string(),
        });
        manifest.reconstruction_info = Some(ReconstructionInfo {
            merge_order,
            validation_checksums,
            total_validation_checksum: checksum,
        });

        persist_manifest(&layout, &manifest).await?;

        info!(
            "Split {} scenarios ({} QA pairs) into {} parts",
            total_scenarios,
            total_scenarios * QA_PAIRS_PER_SCENARIO,
            manifest.total_parts
        );

        Ok(manifest)
    }
}

#[async_trait]
impl Splitter for ScenarioSplitter {
    async fn split(&self, source: &Path, config: &SplitConfig) -> SplitResult<SplitManifest> {
        self.split_with_progress(source, config, None).await
    }
}

/// Pre-pass results: validated header, totals, and sampled rows
struct PrePass {
    header: HeaderRecord,
    total_scenarios: u64,
    average_row_size: u64,
    samples: Vec<Vec<String>>,
}

fn prepass_blocking(layout: &SplitLayout) -> SplitResult<PrePass> {
    let delimiter = layout.format.delimiter().expect("delimited format");
    let mut scanner = DelimitedScanner::open(&layout.source, delimiter)?;
    let header = scanner.read_header()?;

    validate_schema(&layout.source, &header.columns)?;

    let mut total = 0u64;
    let mut sampled_bytes = 0u64;
    let mut samples = Vec::new();
    while samples.len() < SAMPLE_ROWS {
        match scanner.next_record()? {
            Some((unit, fields)) => {
                total += 1;
                sampled_bytes += unit.bytes.len() as u64;
                samples.push(fields);
            }
            None => break,
        }
    }
    total += scanner.count_remaining()?;

    let average_row_size = if samples.is_empty() {
        0
    } else {
        sampled_bytes / samples.len() as u64
    };

    Ok(PrePass {
        header,
        total_scenarios: total,
        average_row_size,
        samples,
    })
}

/// The table's column set must exactly equal the expected set,
/// order-independent
fn validate_schema(source: &Path, columns: &[String]) -> SplitResult<()> {
    let expected: BTreeSet<&str> = EXPECTED_COLUMNS.iter().copied().collect();
    let actual: BTreeSet<&str> = columns.iter().map(String::as_str).collect();

    if expected == actual {
        return Ok(());
    }

    let missing: Vec<&str> = expected.difference(&actual).copied().collect();
    let unexpected: Vec<&str> = actual.difference(&expected).copied().collect();

    let mut reason = String::from("column set does not match the scenario schema");
    if !missing.is_empty() {
        reason.push_str(&format!("; missing: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        reason.push_str(&format!("; unexpected: {}", unexpected.join(", ")));
    }

    Err(SplitError::schema_invalid(source, reason))
}

/// Rows-per-part target that best approximates the byte budget
///
/// An optimization over the per-unit byte check, which stays the
/// authoritative boundary condition even when the estimate is off.
fn rows_per_part_target(budget: u64, prepass: &PrePass) -> u64 {
    let header_len = prepass.header.raw.len() as u64;
    let usable = budget.saturating_sub(header_len);
    let avg = prepass.average_row_size.max(1);
    (usable / avg).max(1)
}

fn split_scenarios_blocking(
    layout: &SplitLayout,
    budget: u64,
    target_rows: u64,
    total_scenarios: u64,
    progress: Option<ProgressCallback>,
) -> SplitResult<EngineOutcome> {
    let delimiter = layout.format.delimiter().expect("delimited format");
    let mut scanner = DelimitedScanner::open(&layout.source, delimiter)?;
    let header = scanner.read_header()?;

    let report = |processed: u64, message: String| {
        if let Some(cb) = &progress {
            cb(&SplitProgress {
                units_processed: processed,
                total_units: total_scenarios,
                message,
            });
        }
    };

    let mut writer = PartWriter::new(layout, budget, Some(header.raw.clone()));
    let mut processed = 0u64;
    while let Some(unit) = scanner.next_unit()? {
        // The sampled target closes parts early; the byte budget inside
        // `append` remains the hard boundary.
        if writer.units_in_part() >= target_rows {
            writer.force_close()?;
        }
        writer.append(&unit)?;

        processed += 1;
        if processed % PROGRESS_REPORT_INTERVAL == 0 {
            report(
                processed,
                format!("Split {} of {} scenarios", processed, total_scenarios),
            );
        }
    }

    let parts = writer.finish()?;
    report(
        total_scenarios,
        format!("Split complete: {} scenarios", total_scenarios),
    );

    Ok(EngineOutcome {
        parts,
        total_units: total_scenarios,
        header: Some(header),
        canonical_checksum: None,
    })
}

/// Infer column types from the sampled rows
///
/// A column is `numeric` when its name hints at a score or metric and at
/// least 80% of its sampled values parse as numbers; otherwise `text`.
fn infer_column_types(
    columns: &[String],
    samples: &[Vec<String>],
) -> BTreeMap<String, String> {
    let mut types = BTreeMap::new();

    for (i, column) in columns.iter().enumerate() {
        let lower = column.to_ascii_lowercase();
        let hinted = NUMERIC_NAME_HINTS.iter().any(|hint| lower.contains(hint));

        let inferred = if hinted {
            let values: Vec<&str> = samples
                .iter()
                .filter_map(|row| row.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            let numeric = values
                .iter()
                .filter(|v| v.parse::<f64>().is_ok())
                .count();

            if !values.is_empty()
                && numeric as f64 / values.len() as f64 >= NUMERIC_SAMPLE_THRESHOLD
            {
                "numeric"
            } else {
                "text"
            }
        } else {
            "text"
        };

        types.insert(column.clone(), inferred.to_string());
    }

    types
}
