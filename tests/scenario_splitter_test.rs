//! Scenario-aware splitter tests: schema validation, scenario/QA-pair
//! accounting, progress reporting, and the richer manifest metadata

use dataset_splitter::merge::{MergeConfig, Merger};
use dataset_splitter::split::{
    ScenarioSplitter, SplitConfig, Splitter, QA_PAIRS_PER_SCENARIO,
};
use dataset_splitter::SplitError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const HEADER: &str = "scenario_id,scenario,category,attack_type,risk_score,confidence_score,\
question_1,answer_1,question_2,answer_2,question_3,answer_3,question_4,answer_4";

fn scenario_row(id: u64) -> String {
    format!(
        "{},Scenario text {},prompt_injection,direct,0.{},0.9{},q1-{},a1-{},q2-{},a2-{},q3-{},a3-{},q4-{},a4-{}",
        id,
        id,
        id % 10,
        id % 10,
        id, id, id, id, id, id, id, id
    )
}

fn scenario_csv(rows: u64) -> String {
    let mut content = String::from(HEADER);
    content.push('\n');
    for id in 1..=rows {
        content.push_str(&scenario_row(id));
        content.push('\n');
    }
    content
}

async fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

#[tokio::test]
async fn test_scenario_accounting_holds_per_part_and_in_aggregate() {
    let dir = TempDir::new().unwrap();
    let content = scenario_csv(20);
    let source = write_source(&dir, "scenarios.csv", &content).await;

    let config = SplitConfig {
        chunk_size_bytes: 600,
        check_disk_space: false,
    };
    let manifest = ScenarioSplitter::new().split(&source, &config).await.unwrap();

    assert_eq!(manifest.dataset_type.as_deref(), Some("scenario_qa"));
    assert_eq!(manifest.total_scenarios, Some(20));
    assert_eq!(manifest.total_qa_pairs, Some(20 * QA_PAIRS_PER_SCENARIO));
    assert!(manifest.total_parts >= 2);

    let mut scenario_sum = 0;
    for part in &manifest.parts {
        let count = part.scenario_count.unwrap();
        assert_eq!(part.qa_pairs, Some(count * QA_PAIRS_PER_SCENARIO));
        assert_eq!(part.scenario_range, part.row_range);
        scenario_sum += count;
    }
    assert_eq!(scenario_sum, 20);
}

#[tokio::test]
async fn test_scenario_schema_mismatch_fails_before_any_write() {
    let dir = TempDir::new().unwrap();
    let content = "scenario_id,scenario,category\n1,text,misc\n";
    let source = write_source(&dir, "bad.csv", content).await;

    let config = SplitConfig {
        chunk_size_bytes: 1000,
        check_disk_space: false,
    };
    let err = ScenarioSplitter::new().split(&source, &config).await.unwrap_err();
    assert!(matches!(err, SplitError::SchemaInvalid { .. }));
    assert!(err.to_string().contains("attack_type"));

    // Only the source file exists: no parts, no manifest
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert_eq!(names, vec!["bad.csv".to_string()]);
}

#[tokio::test]
async fn test_scenario_columns_accepted_in_any_order() {
    let dir = TempDir::new().unwrap();
    // Reverse the column order; values follow the shuffled header
    let columns: Vec<&str> = HEADER.split(',').rev().collect();
    let mut content = columns.join(",");
    content.push('\n');
    content.push_str(&vec!["v"; columns.len()].join(","));
    content.push('\n');
    let source = write_source(&dir, "shuffled.csv", &content).await;

    let config = SplitConfig {
        chunk_size_bytes: 10_000,
        check_disk_space: false,
    };
    let manifest = ScenarioSplitter::new().split(&source, &config).await.unwrap();
    assert_eq!(manifest.total_scenarios, Some(1));
}

#[tokio::test]
async fn test_progress_callback_fires_and_completes() {
    let dir = TempDir::new().unwrap();
    // More rows than the reporting interval so intermediate calls fire
    let content = scenario_csv(600);
    let source = write_source(&dir, "many.csv", &content).await;

    let seen: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let config = SplitConfig {
        chunk_size_bytes: 50_000,
        check_disk_space: false,
    };
    ScenarioSplitter::new()
        .split_with_progress(
            &source,
            &config,
            Some(Box::new(move |progress| {
                sink.lock()
                    .unwrap()
                    .push((progress.units_processed, progress.total_units));
            })),
        )
        .await
        .unwrap();

    let calls = seen.lock().unwrap();
    assert!(calls.len() >= 2, "interval calls plus the completion call");

    // Monotonic progress against a constant total
    for window in calls.windows(2) {
        assert!(window[0].0 <= window[1].0);
        assert_eq!(window[0].1, window[1].1);
    }

    // The final call reports completion exactly
    let last = calls.last().unwrap();
    assert_eq!(last.0, 600);
    assert_eq!(last.1, 600);
}

#[tokio::test]
async fn test_scenario_manifest_schema_and_types() {
    let dir = TempDir::new().unwrap();
    let content = scenario_csv(10);
    let source = write_source(&dir, "typed.csv", &content).await;

    let config = SplitConfig {
        chunk_size_bytes: 100_000,
        check_disk_space: false,
    };
    let manifest = ScenarioSplitter::new().split(&source, &config).await.unwrap();

    let schema = manifest.schema.as_ref().unwrap();
    assert_eq!(schema.column_count, 14);
    assert_eq!(schema.encoding, "utf-8");
    // Score columns sample as numbers; free-text columns stay textual
    assert_eq!(schema.column_types["risk_score"], "numeric");
    assert_eq!(schema.column_types["confidence_score"], "numeric");
    assert_eq!(schema.column_types["scenario"], "text");
    assert_eq!(schema.column_types["question_1"], "text");

    assert!(manifest.total_size_display.is_some());

    let info = manifest.reconstruction_info.as_ref().unwrap();
    assert_eq!(info.merge_order.len(), manifest.parts.len());
    assert_eq!(info.validation_checksums.len(), manifest.parts.len());
    assert_eq!(info.total_validation_checksum, manifest.checksum);
    for (checksum, part) in info.validation_checksums.iter().zip(&manifest.parts) {
        assert_eq!(checksum, &part.checksum);
    }
}

#[tokio::test]
async fn test_scenario_split_merges_back_byte_exactly() {
    let dir = TempDir::new().unwrap();
    let content = scenario_csv(30);
    let source = write_source(&dir, "roundtrip.csv", &content).await;

    let config = SplitConfig {
        chunk_size_bytes: 800,
        check_disk_space: false,
    };
    let manifest = ScenarioSplitter::new().split(&source, &config).await.unwrap();
    assert!(manifest.total_parts >= 2);

    let output = dir.path().join("roundtrip.merged.csv");
    Merger::new()
        .merge(&manifest, dir.path(), &output, &MergeConfig::default())
        .await
        .unwrap();

    assert_eq!(
        tokio::fs::read(&output).await.unwrap(),
        content.as_bytes()
    );
}

#[tokio::test]
async fn test_scenario_splitter_rejects_non_delimited_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.jsonl");
    tokio::fs::write(&path, b"{\"id\":1}\n").await.unwrap();

    let config = SplitConfig {
        chunk_size_bytes: 1000,
        check_disk_space: false,
    };
    let err = ScenarioSplitter::new().split(&path, &config).await.unwrap_err();
    assert!(matches!(err, SplitError::InvalidInput { .. }));
}
