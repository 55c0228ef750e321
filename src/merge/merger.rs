//! Manifest-driven reconstruction of split files
//!
//! Validates a manifest against the on-disk parts, then rebuilds the
//! original file. Reconstruction writes to a temporary sibling path and
//! is only renamed into place after the whole-file checksum matches the
//! manifest, so a failed merge never leaves a misleadingly-named output.

use crate::error::{SplitError, SplitResult};
use crate::format::delimited;
use crate::format::{array, DelimitedScanner, FileFormat};
use crate::integrity;
use crate::manifest::{PartManifest, SplitManifest};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Configuration for a merge operation
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    /// Delete the part files after a successful merge
    pub delete_parts: bool,
}

/// Reconstructs source files from parts and a manifest
#[derive(Debug, Clone, Default)]
pub struct Merger;

/// One integrity discrepancy found while checking parts
struct PartIssue {
    part_number: u32,
    path: PathBuf,
    expected: String,
    actual: String,
}

impl Merger {
    pub fn new() -> Self {
        Self
    }

    /// Read and structurally validate a manifest file
    pub async fn read_manifest(path: &Path) -> SplitResult<SplitManifest> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SplitError::not_found(path));
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: SplitManifest = serde_json::from_slice(&bytes)
            .map_err(|e| SplitError::manifest(path, format!("invalid manifest JSON: {}", e)))?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Check every part against the manifest: existence, size, checksum
    ///
    /// Any mismatch returns `false`; each offending part is logged.
    #[instrument(skip_all, fields(part_count = manifest.parts.len()))]
    pub async fn verify_integrity(
        &self,
        manifest: &SplitManifest,
        dir: &Path,
    ) -> SplitResult<bool> {
        let issues = self.check_parts(manifest, dir).await?;
        for issue in &issues {
            warn!(
                "Part {} failed integrity check ({}): expected {}, got {}",
                issue.part_number,
                issue.path.display(),
                issue.expected,
                issue.actual
            );
        }
        Ok(issues.is_empty())
    }

    /// Reconstruct the original file from its parts
    ///
    /// Fails with `NotFound` when a referenced part is absent,
    /// `IntegrityViolation` when a part disagrees with the manifest, and
    /// `ReconstructionMismatch` when the final whole-file checksum does
    /// not match, which is the authoritative correctness gate.
    #[instrument(skip_all, fields(target = %output.display()))]
    pub async fn merge(
        &self,
        manifest: &SplitManifest,
        dir: &Path,
        output: &Path,
        config: &MergeConfig,
    ) -> SplitResult<PathBuf> {
        manifest.validate(dir)?;

        // A missing part is reported as NotFound, not as a generic
        // integrity failure
        for part in &manifest.parts {
            let path = dir.join(&part.filename);
            if !tokio::fs::try_exists(&path).await? {
                return Err(SplitError::not_found(path));
            }
        }

        let issues = self.check_parts(manifest, dir).await?;
        if let Some(issue) = issues.first() {
            for issue in &issues {
                warn!(
                    "Part {} failed pre-merge validation ({}): expected {}, got {}",
                    issue.part_number,
                    issue.path.display(),
                    issue.expected,
                    issue.actual
                );
            }
            return Err(SplitError::integrity_violation(
                issue.part_number,
                issue.path.clone(),
                issue.expected.clone(),
                issue.actual.clone(),
            ));
        }

        if manifest.is_scenario_manifest() {
            self.validate_scenario_counts(manifest, dir).await?;
        }

        let temp = temp_output_path(output);
        let blocking_manifest = manifest.clone();
        let blocking_dir = dir.to_path_buf();
        let blocking_temp = temp.clone();
        tokio::task::spawn_blocking(move || {
            reconstruct_blocking(&blocking_manifest, &blocking_dir, &blocking_temp)
        })
        .await??;

        let actual = integrity::hash_file(&temp).await?;
        if actual != manifest.checksum {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(SplitError::reconstruction_mismatch(
                output,
                manifest.checksum.clone(),
                actual,
            ));
        }

        tokio::fs::rename(&temp, output).await?;
        info!(
            "Merged {} parts into {} ({} bytes checksum-verified)",
            manifest.total_parts,
            output.display(),
            manifest.total_size
        );

        if config.delete_parts {
            for part in &manifest.parts {
                let path = dir.join(&part.filename);
                tokio::fs::remove_file(&path).await?;
                debug!("Deleted consumed part {}", path.display());
            }
        }

        Ok(output.to_path_buf())
    }

    async fn check_parts(
        &self,
        manifest: &SplitManifest,
        dir: &Path,
    ) -> SplitResult<Vec<PartIssue>> {
        let mut issues = Vec::new();

        for part in &manifest.parts {
            let path = dir.join(&part.filename);

            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    issues.push(PartIssue {
                        part_number: part.part_number,
                        path,
                        expected: "part file present".to_string(),
                        actual: "missing".to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if meta.len() != part.size {
                issues.push(PartIssue {
                    part_number: part.part_number,
                    path,
                    expected: format!("{} bytes", part.size),
                    actual: format!("{} bytes", meta.len()),
                });
                continue;
            }

            let checksum = integrity::hash_file(&path).await?;
            if checksum != part.checksum {
                issues.push(PartIssue {
                    part_number: part.part_number,
                    path,
                    expected: part.checksum.clone(),
                    actual: checksum,
                });
            }
        }

        Ok(issues)
    }

    /// Re-validate per-part scenario counts and the running total against
    /// the manifest before the final checksum gate
    async fn validate_scenario_counts(
        &self,
        manifest: &SplitManifest,
        dir: &Path,
    ) -> SplitResult<()> {
        let delimiter = match manifest.format_info.delimiter {
            Some(d) => d as u8,
            None => {
                return Err(SplitError::manifest(
                    dir,
                    "scenario manifest has no delimiter in format_info",
                ))
            }
        };

        let blocking_manifest = manifest.clone();
        let blocking_dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut running_total = 0u64;
            for part in &blocking_manifest.parts {
                let path = blocking_dir.join(&part.filename);
                let mut scanner = DelimitedScanner::open(&path, delimiter)?;
                scanner.read_header()?;
                let observed = scanner.count_remaining()?;

                let declared = part.scenario_count.unwrap_or(0);
                if observed != declared {
                    return Err(SplitError::integrity_violation(
                        part.part_number,
                        path,
                        format!("{} scenarios", declared),
                        format!("{} scenarios", observed),
                    ));
                }
                running_total += observed;
            }

            let declared_total = blocking_manifest.total_scenarios.unwrap_or(0);
            if running_total != declared_total {
                return Err(SplitError::manifest(
                    &blocking_dir,
                    format!(
                        "scenario totals disagree: manifest declares {}, parts contain {}",
                        declared_total, running_total
                    ),
                ));
            }
            Ok(())
        })
        .await?
    }
}

/// Look up a manifest part by its sequence number
fn find_part<'a>(
    manifest: &'a SplitManifest,
    dir: &Path,
    number: u32,
) -> SplitResult<&'a PartManifest> {
    manifest
        .parts
        .iter()
        .find(|p| p.part_number == number)
        .ok_or_else(|| {
            SplitError::manifest(dir, format!("merge order references unknown part {}", number))
        })
}

/// Temporary sibling path the reconstruction is written to
fn temp_output_path(output: &Path) -> PathBuf {
    let mut os: OsString = output.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn reconstruct_blocking(
    manifest: &SplitManifest,
    dir: &Path,
    temp: &Path,
) -> SplitResult<()> {
    let format = match manifest.format_info.file_type.as_str() {
        "csv" => FileFormat::Csv,
        "tsv" => FileFormat::Tsv,
        "jsonl" => FileFormat::Jsonl,
        "json" => FileFormat::JsonArray,
        other => {
            return Err(SplitError::manifest(
                dir,
                format!("unknown file_type in manifest: {}", other),
            ))
        }
    };

    let order = manifest.merge_order();

    match format {
        FileFormat::Csv | FileFormat::Tsv => {
            let delimiter = format.delimiter().expect("delimited format");
            let mut writer = BufWriter::new(File::create(temp)?);

            if manifest.parts.is_empty() {
                // Zero data units: the source was its header alone
                if let Some(header) = &manifest.format_info.header {
                    writer.write_all(header.as_bytes())?;
                }
            }

            for (i, number) in order.iter().enumerate() {
                let part = find_part(manifest, dir, *number)?;
                let path = dir.join(&part.filename);
                let mut file = File::open(&path)?;

                // The header is written exactly once, from the first part;
                // subsequent parts drop their repeated header record
                if i > 0 {
                    let skip = delimited::header_span_len(&path, delimiter)?;
                    file.seek(SeekFrom::Start(skip))?;
                }
                std::io::copy(&mut file, &mut writer)?;
            }
            writer.flush()?;
        }
        FileFormat::Jsonl => {
            let mut writer = BufWriter::new(File::create(temp)?);
            for number in &order {
                let part = find_part(manifest, dir, *number)?;
                let mut file = File::open(dir.join(&part.filename))?;
                std::io::copy(&mut file, &mut writer)?;
            }
            writer.flush()?;
        }
        FileFormat::JsonArray => {
            // Inter-part and intra-part element order is preserved
            let mut elements = Vec::new();
            for number in &order {
                let part = find_part(manifest, dir, *number)?;
                elements.extend(array::parse_part(&dir.join(&part.filename))?);
            }
            std::fs::write(temp, array::canonical_bytes(&elements)?)?;
        }
    }

    debug!("Reconstructed {} parts into {}", order.len(), temp.display());
    Ok(())
}
