//! Per-record enrichment loop.
//!
//! One request per record, strictly sequential. A record's attempts share
//! one retry budget across transport failures and unrecoverable output; when
//! the budget is spent the record gets the fallback structure, so the output
//! key set always equals the input key set.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, instrument, warn};

use medharvest_shared::{
    EnrichConfig, EnrichedDataset, EnrichedRecord, Enrichment, MedHarvestError, RawDataset,
    RawRecord, Result, RetryPolicy, retry,
};

use crate::provider::CompletionProvider;
use crate::recover::{recover_object, strip_code_fences};

// ---------------------------------------------------------------------------
// EnrichSummary
// ---------------------------------------------------------------------------

/// Summary of a completed enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichSummary {
    /// Total records processed (== input size).
    pub records: usize,
    /// Records with a genuine model-produced enrichment.
    pub enriched: usize,
    /// Records that received the fallback structure.
    pub fallbacks: usize,
    /// Total duration of the pass.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for enrichment runs.
pub trait EnrichProgress: Send + Sync {
    /// Called before each record is processed.
    fn record(&self, current: usize, total: usize, name: &str);
}

/// No-op enrichment progress.
pub struct SilentEnrichProgress;

impl EnrichProgress for SilentEnrichProgress {
    fn record(&self, _current: usize, _total: usize, _name: &str) {}
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Sequential enrichment engine over any [`CompletionProvider`].
pub struct Enricher<P> {
    provider: P,
    retry: RetryPolicy,
    record_delay: Duration,
}

impl<P: CompletionProvider> Enricher<P> {
    /// Create an enricher from a provider and the enrichment config.
    pub fn new(provider: P, config: &EnrichConfig) -> Self {
        Self {
            provider,
            retry: config.retry,
            record_delay: config.record_delay,
        }
    }

    /// Enrich every record of `dataset`.
    ///
    /// Never fails: a record whose attempts are all spent gets
    /// [`Enrichment::fallback`], so the output contains exactly the input's
    /// keys. The original record fields are carried over untouched.
    #[instrument(skip_all, fields(records = dataset.len()))]
    pub async fn enrich(
        &self,
        dataset: &RawDataset,
        progress: &dyn EnrichProgress,
    ) -> (EnrichSummary, EnrichedDataset) {
        let start = std::time::Instant::now();
        let total = dataset.len();

        let mut out = EnrichedDataset::new();
        let mut enriched = 0usize;
        let mut fallbacks = 0usize;

        info!(records = total, "starting enrichment");

        for (i, (key, record)) in dataset.iter().enumerate() {
            progress.record(i + 1, total, key);

            let enrichment = match self.enrich_record(key, record).await {
                Some(enrichment) => {
                    enriched += 1;
                    enrichment
                }
                None => {
                    fallbacks += 1;
                    Enrichment::fallback()
                }
            };

            out.insert(
                key.clone(),
                EnrichedRecord {
                    record: record.clone(),
                    enrichment,
                },
            );

            // Rate-limit pause after every record, success or not.
            sleep(self.record_delay).await;
        }

        let summary = EnrichSummary {
            records: total,
            enriched,
            fallbacks,
            duration: start.elapsed(),
        };

        info!(
            records = summary.records,
            enriched = summary.enriched,
            fallbacks = summary.fallbacks,
            duration_ms = summary.duration.as_millis() as u64,
            "enrichment complete"
        );

        (summary, out)
    }

    /// Enrich one record; `None` means all attempts were spent.
    async fn enrich_record(&self, key: &str, record: &RawRecord) -> Option<Enrichment> {
        let prompt = build_prompt(&record.name, &record.indications_and_usage);

        match retry(&self.retry, || self.attempt(&prompt)).await {
            Ok(enrichment) => Some(enrichment),
            Err(e) => {
                warn!(record = %key, error = %e, "enrichment failed, using fallback structure");
                None
            }
        }
    }

    /// One attempt: request, strip fences, recover JSON, deserialize.
    async fn attempt(&self, prompt: &str) -> Result<Enrichment> {
        let response = self.provider.complete(prompt).await?;
        let cleaned = strip_code_fences(&response);

        let value = recover_object(&cleaned).ok_or_else(|| {
            MedHarvestError::Enrichment("no parseable JSON object in response".into())
        })?;

        serde_json::from_value(value).map_err(|e| {
            MedHarvestError::Enrichment(format!("recovered object has the wrong shape: {e}"))
        })
    }
}

/// Build the extraction prompt for one record.
pub fn build_prompt(name: &str, indications: &str) -> String {
    format!(
        "You are a medical NLP expert. Extract structured information from \
         the medication description.\n\
         \n\
         MEDICATION NAME: {name}\n\
         INDICATIONS: {indications}\n\
         \n\
         Return a JSON object with:\n\
         - symptoms: list of symptoms mentioned\n\
         - category: one medical category (pain relief, cold & flu, \
         antibacterial, skin care, allergy, fever, stomach, etc.)\n\
         - tags: 5-10 relevant keywords\n\
         - clean_indications: a short normalized rewritten version (one sentence)\n\
         \n\
         Return ONLY valid JSON, no explanation.\n"
    )
}
