//! Shared types, error model, retry policy, and configuration for MedHarvest.
//!
//! This crate is the foundation depended on by all other MedHarvest crates.
//! It provides:
//! - [`MedHarvestError`] — the unified error type
//! - Domain types ([`RawRecord`], [`EnrichedRecord`], [`DatasetManifest`], [`RunId`])
//! - [`RetryPolicy`] — the attempt/backoff schedule used by both engines
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`EnrichConfig`], config loading)

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EnrichConfig, FetchConfig, GroqConfig, SourceConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{MedHarvestError, Result};
pub use retry::{Backoff, RetryPolicy, retry};
pub use types::{
    CURRENT_SCHEMA_VERSION, Dataset, DatasetManifest, EnrichedDataset, EnrichedRecord, Enrichment,
    EnrichmentMeta, FALLBACK_CATEGORY, RawDataset, RawRecord, RunId,
};
