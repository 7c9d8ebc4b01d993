//! Paginated drug-label harvester.
//!
//! Walks the source page by page with a `skip` cursor, retries each page
//! request with linear backoff, deduplicates records by brand name
//! (first seen wins), and stops at the target count or on exhaustion.
//! Every failure mode degrades to "return what was collected so far", so a
//! long acquisition run never loses already-fetched data to one bad page.

use std::collections::btree_map::Entry;
use std::time::Duration;

use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, instrument};
use url::Url;

use medharvest_shared::{FetchConfig, MedHarvestError, RawDataset, Result, retry};

use crate::page::Page;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("MedHarvest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchSummary
// ---------------------------------------------------------------------------

/// Summary of a completed fetch operation.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    /// Distinct records collected.
    pub records_collected: usize,
    /// Pages successfully fetched and decoded.
    pub pages_fetched: usize,
    /// Items dropped for a missing/placeholder brand name.
    pub items_discarded: usize,
    /// Items skipped because their key was already present.
    pub duplicates_skipped: usize,
    /// Whether the loop ended on exhaustion rather than target count.
    pub exhausted: bool,
    /// Total duration of the fetch.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Harvester
// ---------------------------------------------------------------------------

/// Sequential, rate-limited pagination client for the drug-label source.
pub struct Harvester {
    config: FetchConfig,
    client: Client,
    endpoint: Url,
}

impl Harvester {
    /// Create a new harvester with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| {
            MedHarvestError::config(format!("invalid source URL '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MedHarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    /// Fetch until `target_count` distinct records are collected or the
    /// source is exhausted.
    ///
    /// Exhaustion (an empty page, or a page whose retries ran out) is a
    /// normal termination condition, not an error: the partial dataset
    /// accumulated so far is returned either way.
    #[instrument(skip_all, fields(target_count = target_count, batch_size = batch_size))]
    pub async fn fetch(&self, target_count: usize, batch_size: usize) -> (FetchSummary, RawDataset) {
        let start = std::time::Instant::now();

        let mut dataset = RawDataset::new();
        let mut skip: usize = 0;
        let mut pages_fetched = 0usize;
        let mut items_discarded = 0usize;
        let mut duplicates_skipped = 0usize;
        let mut exhausted = false;

        info!(target_count, batch_size, "starting fetch");

        while dataset.len() < target_count {
            let page = match self.fetch_page(batch_size, skip).await {
                Ok(page) => page,
                Err(e) => {
                    info!(skip, error = %e, "page retries exhausted, stopping with partial data");
                    exhausted = true;
                    break;
                }
            };
            pages_fetched += 1;

            if page.results.is_empty() {
                info!(skip, "source exhausted");
                exhausted = true;
                break;
            }

            for item in page.results {
                match item.into_record() {
                    None => items_discarded += 1,
                    Some((key, record)) => match dataset.entry(key) {
                        // First seen wins: a later duplicate never
                        // overwrites data from an earlier page.
                        Entry::Occupied(_) => duplicates_skipped += 1,
                        Entry::Vacant(slot) => {
                            slot.insert(record);
                        }
                    },
                }
                if dataset.len() >= target_count {
                    break;
                }
            }

            debug!(
                skip,
                collected = dataset.len(),
                "page processed"
            );

            if dataset.len() >= target_count {
                break;
            }

            // Pages may repeat already-seen keys, so the cursor always moves
            // by the requested batch size, not by how many keys were new.
            skip += batch_size;
            sleep(self.config.page_delay).await;
        }

        let summary = FetchSummary {
            records_collected: dataset.len(),
            pages_fetched,
            items_discarded,
            duplicates_skipped,
            exhausted,
            duration: start.elapsed(),
        };

        info!(
            records_collected = summary.records_collected,
            pages_fetched = summary.pages_fetched,
            items_discarded = summary.items_discarded,
            duplicates_skipped = summary.duplicates_skipped,
            exhausted = summary.exhausted,
            duration_ms = summary.duration.as_millis() as u64,
            "fetch complete"
        );

        (summary, dataset)
    }

    /// Request one page, retrying per the configured policy.
    async fn fetch_page(&self, limit: usize, skip: usize) -> Result<Page> {
        retry(&self.config.retry, || self.request_page(limit, skip)).await
    }

    /// A single page request attempt.
    async fn request_page(&self, limit: usize, skip: usize) -> Result<Page> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("limit", limit.to_string()), ("skip", skip.to_string())]);

        if !self.config.search.is_empty() {
            request = request.query(&[("search", self.config.search.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MedHarvestError::Network(format!("skip {skip}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MedHarvestError::Network(format!(
                "skip {skip}: HTTP {status}"
            )));
        }

        response
            .json::<Page>()
            .await
            .map_err(|e| MedHarvestError::decode(format!("skip {skip}: {e}")))
    }
}
