//! Serializable manifest contract between splitter and merger
//!
//! The manifest is the single source of truth binding a source file to its
//! parts. It is written once at split time, co-located with the parts, and
//! read-only thereafter; its existence is the commit signal for a split.

use crate::error::{SplitError, SplitResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive range of source-level unit indices covered by one part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRange {
    /// First unit index covered (1-based)
    pub start: u64,
    /// Last unit index covered (inclusive)
    pub end: u64,
}

impl UnitRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of units in the range
    pub fn count(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Manifest entry describing one written part file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartManifest {
    /// Sequence number (1-based, contiguous)
    pub part_number: u32,
    /// Part filename, `<stem>.part<NN>.<ext>`
    pub filename: String,
    /// On-disk size in bytes
    pub size: u64,
    /// Content checksum of the written part
    pub checksum: String,
    /// Row range for delimited-table parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_range: Option<UnitRange>,
    /// Line range for line-delimited parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<UnitRange>,
    /// Item range for array-document parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_range: Option<UnitRange>,
    /// Scenario range for the scenario-aware table format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_range: Option<UnitRange>,
    /// Number of scenarios in this part (scenario-aware format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_count: Option<u64>,
    /// Number of question/answer sub-records in this part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_pairs: Option<u64>,
}

impl PartManifest {
    /// The unit range of this part, whichever key the format uses
    pub fn unit_range(&self) -> Option<UnitRange> {
        self.row_range.or(self.line_range).or(self.item_range)
    }
}

/// Structural descriptor of the source format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatInfo {
    /// One of `csv`, `tsv`, `jsonl`, `json`
    pub file_type: String,
    /// Field delimiter for delimited tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    /// Column names for delimited tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Raw header record including its terminator, re-emitted per part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Document shape for array documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_shape: Option<String>,
    /// What the top-level checksum was computed over: `source` bytes, or
    /// the `canonical` serialization (array documents)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_basis: Option<String>,
}

/// Column schema of the scenario-aware table format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSchema {
    /// Column names in header order
    pub columns: Vec<String>,
    pub column_count: usize,
    /// Column name to inferred type (`numeric` or `text`)
    pub column_types: std::collections::BTreeMap<String, String>,
    pub encoding: String,
}

/// Reconstruction metadata duplicated for fast pre-merge validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionInfo {
    /// Part numbers in merge order (ascending)
    pub merge_order: Vec<u32>,
    /// Per-part checksums, in merge order
    pub validation_checksums: Vec<String>,
    /// Whole-file checksum, duplicated from the top level
    pub total_validation_checksum: String,
}

/// The manifest binding a source file to its parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitManifest {
    /// Original source filename
    pub original_file: String,
    /// When the split was performed (RFC3339)
    pub split_timestamp: DateTime<Utc>,
    /// Source file size in bytes
    pub total_size: u64,
    /// Number of parts written
    pub total_parts: u32,
    /// Target chunk byte budget used for planning
    pub chunk_size: u64,
    /// Whole-file checksum; see `format_info.checksum_basis`
    pub checksum: String,
    /// Ordered part list
    pub parts: Vec<PartManifest>,
    /// Structural descriptor of the source format
    pub format_info: FormatInfo,

    // Scenario-aware extensions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_scenarios: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_qa_pairs: Option<u64>,
    /// Human-readable source size, e.g. `4.2 MB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<ScenarioSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruction_info: Option<ReconstructionInfo>,
}

impl SplitManifest {
    /// Manifest filename for a sanitized source stem
    pub fn manifest_filename(stem: &str) -> String {
        format!("{}.manifest.json", stem)
    }

    /// Part filename for a sanitized stem, 1-based part number, and extension
    pub fn part_filename(stem: &str, part_number: u32, extension: &str) -> String {
        format!("{}.part{:02}.{}", stem, part_number, extension)
    }

    /// True when this manifest carries the scenario-aware extensions
    pub fn is_scenario_manifest(&self) -> bool {
        self.total_scenarios.is_some()
    }

    /// Part numbers in reconstruction order
    ///
    /// Normally ascending sequence numbers; `reconstruction_info.merge_order`
    /// takes precedence when present.
    pub fn merge_order(&self) -> Vec<u32> {
        match &self.reconstruction_info {
            Some(info) if !info.merge_order.is_empty() => info.merge_order.clone(),
            _ => self.parts.iter().map(|p| p.part_number).collect(),
        }
    }

    /// Validate the structural invariants of the manifest
    ///
    /// Part numbers must be contiguous from 1 and the unit ranges must
    /// partition the full source index range in ascending order with no
    /// gaps and no overlaps. An empty part list is valid only for an
    /// empty source.
    pub fn validate(&self, manifest_path: &Path) -> SplitResult<()> {
        if self.total_parts as usize != self.parts.len() {
            return Err(SplitError::manifest(
                manifest_path,
                format!(
                    "total_parts is {} but {} parts are listed",
                    self.total_parts,
                    self.parts.len()
                ),
            ));
        }

        let mut expected_start = 1u64;
        for (i, part) in self.parts.iter().enumerate() {
            let expected_number = (i + 1) as u32;
            if part.part_number != expected_number {
                return Err(SplitError::manifest(
                    manifest_path,
                    format!(
                        "part numbering not contiguous: expected {}, got {}",
                        expected_number, part.part_number
                    ),
                ));
            }

            let range = part.unit_range().ok_or_else(|| {
                SplitError::manifest(
                    manifest_path,
                    format!("part {} has no unit range", part.part_number),
                )
            })?;

            if range.start > range.end {
                return Err(SplitError::manifest(
                    manifest_path,
                    format!(
                        "part {} has inverted range {}..{}",
                        part.part_number, range.start, range.end
                    ),
                ));
            }

            if range.start != expected_start {
                return Err(SplitError::manifest(
                    manifest_path,
                    format!(
                        "part {} range starts at {} but {} was expected",
                        part.part_number, range.start, expected_start
                    ),
                ));
            }
            expected_start = range.end + 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn part(number: u32, start: u64, end: u64) -> PartManifest {
        PartManifest {
            part_number: number,
            filename: format!("data.part{:02}.csv", number),
            size: 100,
            checksum: "sha256:0000".to_string(),
            row_range: Some(UnitRange::new(start, end)),
            line_range: None,
            item_range: None,
            scenario_range: None,
            scenario_count: None,
            qa_pairs: None,
        }
    }

    fn manifest(parts: Vec<PartManifest>) -> SplitManifest {
        SplitManifest {
            original_file: "data.csv".to_string(),
            split_timestamp: Utc::now(),
            total_size: 300,
            total_parts: parts.len() as u32,
            chunk_size: 100,
            checksum: "sha256:ffff".to_string(),
            parts,
            format_info: FormatInfo {
                file_type: "csv".to_string(),
                delimiter: Some(','),
                columns: Some(vec!["id".to_string(), "name".to_string()]),
                header: Some("id,name\n".to_string()),
                document_shape: None,
                checksum_basis: Some("source".to_string()),
            },
            dataset_type: None,
            total_scenarios: None,
            total_qa_pairs: None,
            total_size_display: None,
            schema: None,
            reconstruction_info: None,
        }
    }

    #[test]
    fn test_validate_accepts_contiguous_partition() {
        let m = manifest(vec![part(1, 1, 10), part(2, 11, 20), part(3, 21, 25)]);
        assert!(m.validate(&PathBuf::from("m.json")).is_ok());
    }

    #[test]
    fn test_validate_accepts_empty_part_list() {
        let m = manifest(vec![]);
        assert!(m.validate(&PathBuf::from("m.json")).is_ok());
    }

    #[test]
    fn test_validate_rejects_gap() {
        let m = manifest(vec![part(1, 1, 10), part(2, 12, 20)]);
        assert!(m.validate(&PathBuf::from("m.json")).is_err());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let m = manifest(vec![part(1, 1, 10), part(2, 10, 20)]);
        assert!(m.validate(&PathBuf::from("m.json")).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_numbering() {
        let m = manifest(vec![part(1, 1, 10), part(3, 11, 20)]);
        assert!(m.validate(&PathBuf::from("m.json")).is_err());
    }

    #[test]
    fn test_part_and_manifest_filenames() {
        assert_eq!(
            SplitManifest::part_filename("data", 7, "csv"),
            "data.part07.csv"
        );
        assert_eq!(SplitManifest::manifest_filename("data"), "data.manifest.json");
    }

    #[test]
    fn test_serde_round_trip_keeps_range_key() {
        let m = manifest(vec![part(1, 1, 3)]);
        let json = serde_json::to_string_pretty(&m).unwrap();
        assert!(json.contains("row_range"));
        assert!(!json.contains("line_range"));
        assert!(!json.contains("item_range"));

        let back: SplitManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parts[0].unit_range(), Some(UnitRange::new(1, 3)));
        assert_eq!(back.total_parts, 1);
    }

    #[test]
    fn test_merge_order_defaults_to_ascending() {
        let m = manifest(vec![part(1, 1, 10), part(2, 11, 20)]);
        assert_eq!(m.merge_order(), vec![1, 2]);
    }
}
