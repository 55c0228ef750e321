//! Generic splitter: validate source, plan chunks, write parts, manifest
//!
//! The public API is async; the unit-streaming and part-writing loop runs
//! as a synchronous engine inside a blocking task. Parts are flushed to
//! disk as soon as they close, so table and line formats never buffer
//! more than one unit at a time. The manifest's top-level checksum is
//! computed independently over the original source bytes (canonical
//! serialization for array documents), never reassembled from parts.

use crate::error::{SplitError, SplitResult};
use crate::format::{ArrayDocument, DelimitedScanner, FileFormat, HeaderRecord, LineScanner, RangeKind, Unit};
use crate::format::array;
use crate::integrity;
use crate::manifest::{FormatInfo, PartManifest, SplitManifest, UnitRange};
use crate::split::planner::ChunkPlanner;
use async_trait::async_trait;
use chrono::Utc;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Configuration for a split operation
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Target maximum byte size of one part
    pub chunk_size_bytes: u64,
    /// Run the best-effort disk space pre-flight check
    pub check_disk_space: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: crate::DEFAULT_CHUNK_SIZE_BYTES,
            check_disk_space: true,
        }
    }
}

impl SplitConfig {
    /// Create a configuration with the given chunk byte budget
    pub fn with_chunk_size(chunk_size_bytes: u64) -> Self {
        Self {
            chunk_size_bytes,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> SplitResult<()> {
        if self.chunk_size_bytes == 0 {
            return Err(SplitError::invalid_input("Chunk size must be positive"));
        }

        if self.chunk_size_bytes < 1024 {
            warn!(
                "Chunk size {} bytes is very small and may create many parts",
                self.chunk_size_bytes
            );
        }

        if self.chunk_size_bytes > 1024 * 1024 * 1024 {
            warn!(
                "Chunk size {} bytes is very large, parts may exceed storage limits",
                self.chunk_size_bytes
            );
        }

        Ok(())
    }
}

/// Trait for splitting a source file into size-bounded parts
///
/// # Contract
///
/// ## Preconditions
/// - Source file exists and is a regular, readable file
/// - Configuration is valid
///
/// ## Postconditions
/// - Part files and one manifest are written beside the source
/// - The source file is never mutated
/// - The manifest's part ranges partition the source unit range
///
/// ## Error Conditions
/// - `SplitError::NotFound` if the source does not exist
/// - `SplitError::InvalidInput` for unsupported formats or bad config
/// - `SplitError::InsufficientSpace` if the pre-flight disk check fails
#[async_trait]
pub trait Splitter: Send + Sync {
    /// Split `source` into parts, returning the persisted manifest
    async fn split(&self, source: &Path, config: &SplitConfig) -> SplitResult<SplitManifest>;
}

/// Splitter for the generic table, line, and array formats
#[derive(Debug, Clone, Default)]
pub struct FileSplitter;

impl FileSplitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Splitter for FileSplitter {
    #[instrument(skip_all, fields(file = %source.display()))]
    async fn split(&self, source: &Path, config: &SplitConfig) -> SplitResult<SplitManifest> {
        let layout = SplitLayout::resolve(source, config).await?;
        let format = layout.format;
        let budget = config.chunk_size_bytes;

        debug!(
            "Splitting {} ({} bytes) as {} with {} byte chunks",
            source.display(),
            layout.total_size,
            format.file_type(),
            budget
        );

        let engine_layout = layout.clone();
        let outcome = tokio::task::spawn_blocking(move || match format {
            FileFormat::Csv | FileFormat::Tsv => split_delimited_blocking(&engine_layout, budget),
            FileFormat::Jsonl => split_lines_blocking(&engine_layout, budget),
            FileFormat::JsonArray => split_array_blocking(&engine_layout, budget),
        })
        .await??;

        let checksum = match &outcome.canonical_checksum {
            Some(canonical) => canonical.clone(),
            None => integrity::hash_file(source).await?,
        };

        let manifest = assemble_manifest(&layout, config, &outcome, checksum, None).await?;
        persist_manifest(&layout, &manifest).await?;

        info!(
            "Split {} into {} parts ({} units)",
            source.display(),
            manifest.total_parts,
            outcome.total_units
        );

        Ok(manifest)
    }
}

/// Resolved paths and naming for one split operation
#[derive(Debug, Clone)]
pub(crate) struct SplitLayout {
    pub source: PathBuf,
    pub dir: PathBuf,
    pub stem: String,
    pub extension: String,
    pub original_file: String,
    pub format: FileFormat,
    pub total_size: u64,
}

impl SplitLayout {
    /// Check preconditions and resolve naming; no output is written here
    pub(crate) async fn resolve(source: &Path, config: &SplitConfig) -> SplitResult<Self> {
        let meta = match tokio::fs::metadata(source).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SplitError::not_found(source));
            }
            Err(e) => return Err(e.into()),
        };

        if !meta.is_file() {
            return Err(SplitError::invalid_input(format!(
                "Not a regular file: {}",
                source.display()
            )));
        }

        config.validate()?;

        let format = FileFormat::from_path(source).ok_or_else(|| {
            SplitError::invalid_input(format!(
                "Unsupported file extension: {}",
                source.display()
            ))
        })?;

        let dir = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if config.check_disk_space && !integrity::has_enough_space(&dir, meta.len()) {
            return Err(SplitError::InsufficientSpace {
                dir,
                required: meta.len(),
            });
        }

        let original_file = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = source
            .file_stem()
            .map(|s| integrity::sanitize_name(&s.to_string_lossy()))
            .unwrap_or_else(|| "file".to_string());
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            source: source.to_path_buf(),
            dir,
            stem,
            extension,
            original_file,
            format,
            total_size: meta.len(),
        })
    }

    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.dir.join(SplitManifest::manifest_filename(&self.stem))
    }
}

/// One part file written by the engine, before checksumming
#[derive(Debug, Clone)]
pub(crate) struct WrittenPart {
    pub part_number: u32,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub first_unit: u64,
    pub last_unit: u64,
}

/// Everything the blocking engine hands back to the async wrapper
#[derive(Debug)]
pub(crate) struct EngineOutcome {
    pub parts: Vec<WrittenPart>,
    pub total_units: u64,
    pub header: Option<HeaderRecord>,
    pub canonical_checksum: Option<String>,
}

/// Incremental writer that opens, fills, and closes part files
///
/// Memory stays bounded: units pass straight through to a buffered file,
/// and only bookkeeping is retained per part.
pub(crate) struct PartWriter {
    layout: SplitLayout,
    planner: ChunkPlanner,
    header: Option<Vec<u8>>,
    file: Option<BufWriter<File>>,
    current_size: u64,
    units_in_part: u64,
    part_first_unit: u64,
    last_unit: u64,
    parts: Vec<WrittenPart>,
}

impl PartWriter {
    pub(crate) fn new(layout: &SplitLayout, budget: u64, header: Option<Vec<u8>>) -> Self {
        Self {
            layout: layout.clone(),
            planner: ChunkPlanner::new(budget),
            header,
            file: None,
            current_size: 0,
            units_in_part: 0,
            part_first_unit: 0,
            last_unit: 0,
            parts: Vec::new(),
        }
    }

    /// Units already written into the currently open part
    pub(crate) fn units_in_part(&self) -> u64 {
        self.units_in_part
    }

    /// Append one unit, closing the current part first if the byte budget
    /// requires it
    pub(crate) fn append(&mut self, unit: &Unit) -> SplitResult<()> {
        let unit_size = unit.bytes.len() as u64;

        if self.file.is_some()
            && self
                .planner
                .should_close(self.units_in_part, self.current_size, unit_size)
        {
            self.close_current()?;
        }

        if self.file.is_none() {
            self.open_next(unit.index)?;
        }

        let writer = self.file.as_mut().expect("part file just opened");
        writer.write_all(&unit.bytes)?;
        self.current_size += unit_size;
        self.units_in_part += 1;
        self.last_unit = unit.index;
        Ok(())
    }

    /// Close the current part regardless of remaining budget
    ///
    /// Used by the scenario splitter's rows-per-part target; a no-op when
    /// no part is open.
    pub(crate) fn force_close(&mut self) -> SplitResult<()> {
        if self.file.is_some() {
            self.close_current()?;
        }
        Ok(())
    }

    /// Flush the final part and return all written parts in order
    pub(crate) fn finish(mut self) -> SplitResult<Vec<WrittenPart>> {
        if self.file.is_some() {
            self.close_current()?;
        }
        Ok(self.parts)
    }

    fn open_next(&mut self, first_unit: u64) -> SplitResult<()> {
        let part_number = self.parts.len() as u32 + 1;
        let filename =
            SplitManifest::part_filename(&self.layout.stem, part_number, &self.layout.extension);
        let path = self.layout.dir.join(&filename);

        let mut writer = BufWriter::new(File::create(&path)?);
        self.current_size = 0;
        if let Some(header) = &self.header {
            writer.write_all(header)?;
            self.current_size = header.len() as u64;
        }

        debug!("Opened part {} at {}", part_number, path.display());
        self.file = Some(writer);
        self.units_in_part = 0;
        self.part_first_unit = first_unit;
        Ok(())
    }

    fn close_current(&mut self) -> SplitResult<()> {
        let mut writer = self.file.take().expect("close_current with open part");
        writer.flush()?;
        drop(writer);

        let part_number = self.parts.len() as u32 + 1;
        let filename =
            SplitManifest::part_filename(&self.layout.stem, part_number, &self.layout.extension);
        let path = self.layout.dir.join(&filename);

        self.parts.push(WrittenPart {
            part_number,
            filename,
            path,
            size: self.current_size,
            first_unit: self.part_first_unit,
            last_unit: self.last_unit,
        });

        self.current_size = 0;
        self.units_in_part = 0;
        Ok(())
    }
}

fn split_delimited_blocking(layout: &SplitLayout, budget: u64) -> SplitResult<EngineOutcome> {
    let delimiter = layout.format.delimiter().expect("delimited format");
    let mut scanner = DelimitedScanner::open(&layout.source, delimiter)?;
    let header = scanner.read_header()?;

    let mut writer = PartWriter::new(layout, budget, Some(header.raw.clone()));
    let mut total_units = 0;
    while let Some(unit) = scanner.next_unit()? {
        writer.append(&unit)?;
        total_units += 1;
    }

    Ok(EngineOutcome {
        parts: writer.finish()?,
        total_units,
        header: Some(header),
        canonical_checksum: None,
    })
}

fn split_lines_blocking(layout: &SplitLayout, budget: u64) -> SplitResult<EngineOutcome> {
    let mut scanner = LineScanner::open(&layout.source)?;

    let mut writer = PartWriter::new(layout, budget, None);
    let mut total_units = 0;
    while let Some(unit) = scanner.next_unit()? {
        writer.append(&unit)?;
        total_units += 1;
    }

    Ok(EngineOutcome {
        parts: writer.finish()?,
        total_units,
        header: None,
        canonical_checksum: None,
    })
}

fn split_array_blocking(layout: &SplitLayout, budget: u64) -> SplitResult<EngineOutcome> {
    let document = ArrayDocument::load(&layout.source)?;
    let canonical_checksum = document.canonical_checksum()?;
    let planner = ChunkPlanner::new(budget);

    let mut parts = Vec::new();
    let mut current: Vec<serde_json::Value> = Vec::new();
    let mut current_size = 0u64;
    let mut part_first_unit = 0u64;
    let mut total_units = 0u64;

    for (i, element) in document.into_elements().into_iter().enumerate() {
        let index = i as u64 + 1;
        let estimate = array::element_size_estimate(&element)?;

        if planner.should_close(current.len() as u64, current_size, estimate) {
            flush_array_part(layout, &mut parts, std::mem::take(&mut current), part_first_unit, index - 1)?;
            current_size = 0;
        }

        if current.is_empty() {
            part_first_unit = index;
        }
        current.push(element);
        current_size += estimate;
        total_units = index;
    }

    if !current.is_empty() {
        flush_array_part(layout, &mut parts, current, part_first_unit, total_units)?;
    }

    Ok(EngineOutcome {
        parts,
        total_units,
        header: None,
        canonical_checksum: Some(canonical_checksum),
    })
}

fn flush_array_part(
    layout: &SplitLayout,
    parts: &mut Vec<WrittenPart>,
    elements: Vec<serde_json::Value>,
    first_unit: u64,
    last_unit: u64,
) -> SplitResult<()> {
    let part_number = parts.len() as u32 + 1;
    let filename =
        SplitManifest::part_filename(&layout.stem, part_number, &layout.extension);
    let path = layout.dir.join(&filename);

    let bytes = array::serialize_part(elements)?;
    std::fs::write(&path, &bytes)?;
    debug!("Wrote array part {} ({} bytes)", part_number, bytes.len());

    parts.push(WrittenPart {
        part_number,
        filename,
        path,
        size: bytes.len() as u64,
        first_unit,
        last_unit,
    });
    Ok(())
}

/// Build part manifest entries, checksumming each written file
pub(crate) async fn checksum_parts(
    parts: &[WrittenPart],
    range_kind: RangeKind,
) -> SplitResult<Vec<PartManifest>> {
    let mut entries = Vec::with_capacity(parts.len());
    for part in parts {
        let checksum = integrity::hash_file(&part.path).await?;
        let range = UnitRange::new(part.first_unit, part.last_unit);

        entries.push(PartManifest {
            part_number: part.part_number,
            filename: part.filename.clone(),
            size: part.size,
            checksum,
            row_range: (range_kind == RangeKind::Row).then_some(range),
            line_range: (range_kind == RangeKind::Line).then_some(range),
            item_range: (range_kind == RangeKind::Item).then_some(range),
            scenario_range: None,
            scenario_count: None,
            qa_pairs: None,
        });
    }
    Ok(entries)
}

/// Assemble and validate the manifest for a completed engine run
pub(crate) async fn assemble_manifest(
    layout: &SplitLayout,
    config: &SplitConfig,
    outcome: &EngineOutcome,
    checksum: String,
    parts_override: Option<Vec<PartManifest>>,
) -> SplitResult<SplitManifest> {
    let parts = match parts_override {
        Some(parts) => parts,
        None => checksum_parts(&outcome.parts, layout.format.range_kind()).await?,
    };

    let header_text = match &outcome.header {
        Some(header) => Some(String::from_utf8(header.raw.clone()).map_err(|_| {
            SplitError::schema_invalid(&layout.source, "header record is not valid UTF-8")
        })?),
        None => None,
    };

    let format_info = FormatInfo {
        file_type: layout.format.file_type().to_string(),
        delimiter: layout.format.delimiter().map(|d| d as char),
        columns: outcome.header.as_ref().map(|h| h.columns.clone()),
        header: header_text,
        document_shape: matches!(layout.format, FileFormat::JsonArray)
            .then(|| "array".to_string()),
        checksum_basis: Some(
            if matches!(layout.format, FileFormat::JsonArray) {
                "canonical"
            } else {
                "source"
            }
            .to_string(),
        ),
    };

    let manifest = SplitManifest {
        original_file: layout.original_file.clone(),
        split_timestamp: Utc::now(),
        total_size: layout.total_size,
        total_parts: parts.len() as u32,
        chunk_size: config.chunk_size_bytes,
        checksum,
        parts,
        format_info,
        dataset_type: None,
        total_scenarios: None,
        total_qa_pairs: None,
        total_size_display: None,
        schema: None,
        reconstruction_info: None,
    };

    manifest.validate(&layout.manifest_path())?;
    Ok(manifest)
}

/// Persist the manifest beside the parts; its existence is the commit signal
pub(crate) async fn persist_manifest(
    layout: &SplitLayout,
    manifest: &SplitManifest,
) -> SplitResult<()> {
    let path = layout.manifest_path();
    let bytes = serde_json::to_vec_pretty(manifest)?;
    tokio::fs::write(&path, bytes).await?;
    debug!("Wrote manifest {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_config_validation() {
        assert!(SplitConfig::with_chunk_size(1024).validate().is_ok());
        assert!(SplitConfig::with_chunk_size(0).validate().is_err());
        // Extreme sizes warn but do not fail
        assert!(SplitConfig::with_chunk_size(2 * 1024 * 1024 * 1024).validate().is_ok());
    }

    #[tokio::test]
    async fn test_resolve_missing_source_is_not_found() {
        let config = SplitConfig::default();
        let err = SplitLayout::resolve(Path::new("/nonexistent/data.csv"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_unsupported_extension() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let config = SplitConfig::default();
        let err = SplitLayout::resolve(temp.path(), &config).await.unwrap_err();
        assert!(matches!(err, SplitError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_resolve_sanitizes_stem() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("my data set.csv");
        tokio::fs::write(&source, "id,name\n1,a\n").await.unwrap();

        let layout = SplitLayout::resolve(&source, &SplitConfig::default())
            .await
            .unwrap();
        assert_eq!(layout.stem, "my_data_set");
        assert_eq!(layout.extension, "csv");
        assert_eq!(layout.original_file, "my data set.csv");
    }
}
