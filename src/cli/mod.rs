use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use crate::merge::{MergeConfig, Merger};
use crate::split::{
    FileSplitter, ProgressCallback, ScenarioSplitter, SplitConfig, Splitter,
};

#[derive(Parser)]
#[command(name = "dataset-splitter")]
#[command(about = "Split large structured text files into checksum-verified parts")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a source file into size-bounded parts plus a manifest
    Split {
        /// Source file (csv, tsv, jsonl, or json array document)
        source: PathBuf,
        /// Target chunk size in MB
        #[arg(long, default_value_t = 5.0)]
        chunk_size_mb: f64,
        /// Use the scenario-aware splitter for the fixed QA-scenario schema
        #[arg(long)]
        scenario: bool,
        /// Skip the best-effort disk space pre-flight check
        #[arg(long)]
        no_space_check: bool,
    },

    /// Reconstruct the original file from a manifest and its parts
    Merge {
        /// Manifest file written by a previous split
        manifest: PathBuf,
        /// Output path (defaults to `<stem>.merged.<ext>` beside the parts)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Delete the parts and manifest after a verified merge
        #[arg(long)]
        delete_parts: bool,
    },

    /// Verify that all parts match the manifest without merging
    Verify {
        /// Manifest file written by a previous split
        manifest: PathBuf,
    },
}

impl Cli {
    pub fn new() -> Self {
        Self::parse()
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Split {
                source,
                chunk_size_mb,
                scenario,
                no_space_check,
            } => run_split(&source, chunk_size_mb, scenario, no_space_check).await,
            Commands::Merge {
                manifest,
                output,
                delete_parts,
            } => run_merge(&manifest, output, delete_parts).await,
            Commands::Verify { manifest } => run_verify(&manifest).await,
        }
    }
}

async fn run_split(
    source: &Path,
    chunk_size_mb: f64,
    scenario: bool,
    no_space_check: bool,
) -> Result<()> {
    if chunk_size_mb <= 0.0 {
        anyhow::bail!("--chunk-size-mb must be positive, got {}", chunk_size_mb);
    }

    let config = SplitConfig {
        chunk_size_bytes: (chunk_size_mb * 1024.0 * 1024.0) as u64,
        check_disk_space: !no_space_check,
    };

    let manifest = if scenario {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} scenarios {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let bar_handle = bar.clone();
        let callback: ProgressCallback = Box::new(move |progress| {
            if bar_handle.length() != Some(progress.total_units) {
                bar_handle.set_length(progress.total_units);
            }
            bar_handle.set_position(progress.units_processed);
            bar_handle.set_message(progress.message.clone());
        });

        let manifest = ScenarioSplitter::new()
            .split_with_progress(source, &config, Some(callback))
            .await?;
        bar.finish_and_clear();
        manifest
    } else {
        FileSplitter::new().split(source, &config).await?
    };

    println!(
        "Split {} into {} parts ({} bytes, checksum {})",
        manifest.original_file, manifest.total_parts, manifest.total_size, manifest.checksum
    );
    for part in &manifest.parts {
        println!("  {} ({} bytes)", part.filename, part.size);
    }
    if let Some(scenarios) = manifest.total_scenarios {
        println!(
            "  {} scenarios, {} QA pairs",
            scenarios,
            manifest.total_qa_pairs.unwrap_or_default()
        );
    }

    Ok(())
}

async fn run_merge(
    manifest_path: &Path,
    output: Option<PathBuf>,
    delete_parts: bool,
) -> Result<()> {
    let manifest = Merger::read_manifest(manifest_path).await?;
    let dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let output = output.unwrap_or_else(|| dir.join(default_merge_name(&manifest.original_file)));

    let merger = Merger::new();
    let config = MergeConfig { delete_parts };
    let written = merger.merge(&manifest, &dir, &output, &config).await?;

    println!(
        "Merged {} parts into {} (checksum verified)",
        manifest.total_parts,
        written.display()
    );

    if delete_parts {
        tokio::fs::remove_file(manifest_path).await?;
        println!("Deleted consumed parts and manifest");
    }

    Ok(())
}

async fn run_verify(manifest_path: &Path) -> Result<()> {
    let manifest = Merger::read_manifest(manifest_path).await?;
    let dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let ok = Merger::new().verify_integrity(&manifest, &dir).await?;
    if ok {
        println!(
            "All {} parts of {} verified",
            manifest.total_parts, manifest.original_file
        );
        Ok(())
    } else {
        anyhow::bail!("Integrity check failed for {}", manifest.original_file)
    }
}

/// Default output name: `data.csv` becomes `data.merged.csv`
fn default_merge_name(original_file: &str) -> String {
    let path = Path::new(original_file);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_file.to_string());
    match path.extension() {
        Some(ext) => format!("{}.merged.{}", stem, ext.to_string_lossy()),
        None => format!("{}.merged", stem),
    }
}
