//! End-to-end pipelines: fetch → raw dataset, raw dataset → enriched dataset.
//!
//! The two runs are decoupled through the persisted raw dataset, so the
//! expensive LLM stage can be retried without re-fetching anything.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use medharvest_enrichment::{EnrichProgress, EnrichSummary, Enricher, GroqClient};
use medharvest_retrieval::{FetchSummary, Harvester};
use medharvest_shared::{EnrichConfig, EnrichmentMeta, FetchConfig, Result, RunId};

use crate::dataset::{self, DATASET_FILE};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called per record during enrichment.
    fn record_processed(&self, name: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_processed(&self, _name: &str, _current: usize, _total: usize) {}
}

/// Adapts a [`ProgressReporter`] to the enricher's progress interface.
struct PipelineEnrichProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl EnrichProgress for PipelineEnrichProgress<'_> {
    fn record(&self, current: usize, total: usize, name: &str) {
        self.inner.record_processed(name, current, total);
    }
}

// ---------------------------------------------------------------------------
// Fetch pipeline
// ---------------------------------------------------------------------------

/// Configuration for the fetch pipeline.
#[derive(Debug, Clone)]
pub struct FetchPipelineConfig {
    /// Desired distinct-record count.
    pub target_count: usize,
    /// Page size requested per call.
    pub batch_size: usize,
    /// Root directory for dataset output (the raw dataset lands in `raw/`).
    pub output_root: PathBuf,
    /// Retrieval configuration.
    pub fetch: FetchConfig,
    /// Tool version string for the manifest.
    pub tool_version: String,
}

/// Result of a fetch pipeline run.
#[derive(Debug)]
pub struct FetchReport {
    /// Path to the written dataset artifact.
    pub dataset_path: PathBuf,
    /// Run identifier.
    pub run_id: RunId,
    /// Engine summary.
    pub summary: FetchSummary,
}

/// Run the fetch pipeline: paginate the source, then persist the dataset.
///
/// The dataset is persisted only after the engine pass completes, so the
/// artifact on disk is always whole: partial on exhaustion, never corrupt.
#[instrument(skip_all, fields(target_count = config.target_count, batch_size = config.batch_size))]
pub async fn run_fetch(
    config: &FetchPipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<FetchReport> {
    let run_id = RunId::new();
    info!(%run_id, "starting fetch pipeline");

    progress.phase("Fetching drug labels");
    let harvester = Harvester::new(config.fetch.clone())?;
    let (summary, dataset) = harvester
        .fetch(config.target_count, config.batch_size)
        .await;

    if dataset.is_empty() {
        warn!("fetch collected no records; writing an empty dataset");
    }

    progress.phase("Writing dataset");
    let dir = config.output_root.join("raw");
    dataset::write_dataset(&dir, &dataset, &run_id, &config.tool_version, None)?;

    let report = FetchReport {
        dataset_path: dir.join(DATASET_FILE),
        run_id,
        summary,
    };

    info!(
        run_id = %report.run_id,
        records = report.summary.records_collected,
        exhausted = report.summary.exhausted,
        path = %report.dataset_path.display(),
        "fetch pipeline complete"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Enrich pipeline
// ---------------------------------------------------------------------------

/// Configuration for the enrich pipeline.
#[derive(Debug, Clone)]
pub struct EnrichPipelineConfig {
    /// Path to the input dataset artifact (any key → record map).
    pub input: PathBuf,
    /// Root directory for dataset output (the result lands in `enriched/`).
    pub output_root: PathBuf,
    /// Enrichment configuration.
    pub enrich: EnrichConfig,
    /// Resolved API credential. Callers resolve this before building the
    /// config, so a missing key fails before any request is issued.
    pub api_key: String,
    /// Tool version string for the manifest.
    pub tool_version: String,
}

/// Result of an enrich pipeline run.
#[derive(Debug)]
pub struct EnrichReport {
    /// Path to the written dataset artifact.
    pub dataset_path: PathBuf,
    /// Run identifier.
    pub run_id: RunId,
    /// Engine summary.
    pub summary: EnrichSummary,
}

/// Run the enrich pipeline: load the raw dataset, enrich every record,
/// persist the result.
#[instrument(skip_all, fields(input = %config.input.display(), model = %config.enrich.model))]
pub async fn run_enrich(
    config: &EnrichPipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<EnrichReport> {
    let run_id = RunId::new();
    info!(%run_id, "starting enrich pipeline");

    progress.phase("Loading dataset");
    let raw = dataset::read_raw_dataset(&config.input)?;
    info!(records = raw.len(), "dataset loaded");

    progress.phase("Enriching records");
    let client = GroqClient::new(config.api_key.clone(), &config.enrich)?;
    let enricher = Enricher::new(client, &config.enrich);

    let enrich_progress = PipelineEnrichProgress { inner: progress };
    let (summary, enriched) = enricher.enrich(&raw, &enrich_progress).await;

    progress.phase("Writing dataset");
    let dir = config.output_root.join("enriched");
    let meta = EnrichmentMeta {
        model: config.enrich.model.clone(),
        enriched: summary.enriched,
        fallbacks: summary.fallbacks,
    };
    dataset::write_dataset(&dir, &enriched, &run_id, &config.tool_version, Some(meta))?;

    let report = EnrichReport {
        dataset_path: dir.join(DATASET_FILE),
        run_id,
        summary,
    };

    info!(
        run_id = %report.run_id,
        records = report.summary.records,
        fallbacks = report.summary.fallbacks,
        path = %report.dataset_path.display(),
        "enrich pipeline complete"
    );

    Ok(report)
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use std::time::Duration;

    use medharvest_shared::{RawDataset, RawRecord, RetryPolicy};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("mh-pipeline-test-{}", RunId::new()))
    }

    #[tokio::test]
    async fn fetch_pipeline_persists_dataset_and_manifest() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("skip", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "openfda": { "brand_name": ["Aspirin"] }, "purpose": ["pain"] },
                    { "openfda": { "brand_name": ["Tylenol"] }, "purpose": ["fever"] }
                ]
            })))
            .mount(&server)
            .await;

        let root = temp_root();
        let config = FetchPipelineConfig {
            target_count: 2,
            batch_size: 2,
            output_root: root.clone(),
            fetch: FetchConfig {
                base_url: server.uri(),
                search: String::new(),
                page_delay: Duration::ZERO,
                retry: RetryPolicy::linear(2, Duration::ZERO),
            },
            tool_version: "0.1.0".into(),
        };

        let report = run_fetch(&config, &SilentProgress).await.unwrap();
        assert_eq!(report.summary.records_collected, 2);

        let read_back = dataset::read_raw_dataset(&report.dataset_path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert!(read_back.contains_key("Aspirin"));

        let manifest = dataset::read_manifest(&root.join("raw")).unwrap();
        assert_eq!(manifest.record_count, 2);
        assert!(manifest.enrichment.is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn enrich_pipeline_reads_standalone_input_and_persists_result() {
        let server = MockServer::start().await;

        let content = "{\"symptoms\":[\"fever\"],\"category\":\"fever\",\
                       \"tags\":[\"fever\"],\"clean_indications\":\"treats fever\"}";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(&server)
            .await;

        // Input artifact written by hand: the pipeline must accept any
        // dataset-shaped map, independent of how it was produced.
        let root = temp_root();
        let mut raw = RawDataset::new();
        raw.insert(
            "Doliprane".into(),
            RawRecord {
                name: "Doliprane".into(),
                generic_name: "paracetamol".into(),
                substance_name: "PARACETAMOL".into(),
                purpose: "fever".into(),
                indications_and_usage: "fièvre et douleurs".into(),
                warnings: String::new(),
                adverse_reactions: String::new(),
                dosage: String::new(),
            },
        );
        let input_dir = root.join("raw");
        dataset::write_dataset(&input_dir, &raw, &RunId::new(), "0.1.0", None).unwrap();

        let config = EnrichPipelineConfig {
            input: input_dir.join(DATASET_FILE),
            output_root: root.clone(),
            enrich: EnrichConfig {
                base_url: server.uri(),
                model: "llama-3.1-8b-instant".into(),
                temperature: 0.2,
                max_tokens: 300,
                retry: RetryPolicy::fixed(3, Duration::ZERO),
                record_delay: Duration::ZERO,
            },
            api_key: "test-key".into(),
            tool_version: "0.1.0".into(),
        };

        let report = run_enrich(&config, &SilentProgress).await.unwrap();
        assert_eq!(report.summary.records, 1);
        assert_eq!(report.summary.enriched, 1);

        let content = std::fs::read_to_string(&report.dataset_path).unwrap();
        let enriched: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(enriched["Doliprane"]["category"], "fever");
        assert_eq!(enriched["Doliprane"]["indications_and_usage"], "fièvre et douleurs");

        let manifest = dataset::read_manifest(&root.join("enriched")).unwrap();
        let meta = manifest.enrichment.expect("enrichment metadata");
        assert_eq!(meta.enriched, 1);
        assert_eq!(meta.fallbacks, 0);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn enrich_pipeline_fails_on_missing_input() {
        let root = temp_root();
        let config = EnrichPipelineConfig {
            input: root.join("does-not-exist.json"),
            output_root: root.clone(),
            enrich: EnrichConfig {
                base_url: "http://localhost:1".into(),
                model: "m".into(),
                temperature: 0.2,
                max_tokens: 300,
                retry: RetryPolicy::fixed(1, Duration::ZERO),
                record_delay: Duration::ZERO,
            },
            api_key: "test-key".into(),
            tool_version: "0.1.0".into(),
        };

        let result = run_enrich(&config, &SilentProgress).await;
        assert!(result.is_err());
    }
}
