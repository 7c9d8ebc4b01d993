//! Core domain types for MedHarvest datasets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the dataset manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Category assigned when enrichment could not produce one.
pub const FALLBACK_CATEGORY: &str = "unknown";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One normalized drug-label record from the external source.
///
/// All text fields are free-form and may be empty. The brand name doubles as
/// the dataset key and is guaranteed non-empty and non-placeholder by the
/// retrieval engine; everything else carries whatever the source provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Brand name — the natural key.
    pub name: String,
    pub generic_name: String,
    pub substance_name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub indications_and_usage: String,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub adverse_reactions: String,
    #[serde(default)]
    pub dosage: String,
}

/// Structured annotations produced by the LLM for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Symptoms/indications extracted from the label text.
    pub symptoms: Vec<String>,
    /// Single category label (open vocabulary, conventionally small).
    pub category: String,
    /// 5–10 free-text keywords.
    pub tags: Vec<String>,
    /// One-sentence normalized rewrite of the indications.
    pub clean_indications: String,
}

impl Enrichment {
    /// The fixed structure used when genuine enrichment cannot be obtained.
    ///
    /// Always well-formed, so `enrich` can guarantee an output entry for
    /// every input key.
    pub fn fallback() -> Self {
        Self {
            symptoms: Vec::new(),
            category: FALLBACK_CATEGORY.to_string(),
            tags: Vec::new(),
            clean_indications: String::new(),
        }
    }

    /// Whether this is the fallback structure rather than a genuine result.
    pub fn is_fallback(&self) -> bool {
        self == &Self::fallback()
    }
}

/// A raw record extended with its enrichment, serialized as one flat object.
///
/// The field sets are disjoint by construction; serde's flatten gives the
/// union, with enrichment fields winning if a collision ever appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: RawRecord,
    #[serde(flatten)]
    pub enrichment: Enrichment,
}

/// A keyed record collection. Access is by key; iteration order is not
/// meaningful downstream, so a sorted map keeps serialization stable.
pub type Dataset<T> = BTreeMap<String, T>;

/// Output of the retrieval engine.
pub type RawDataset = Dataset<RawRecord>;

/// Output of the enrichment engine.
pub type EnrichedDataset = Dataset<EnrichedRecord>;

// ---------------------------------------------------------------------------
// DatasetManifest
// ---------------------------------------------------------------------------

/// Sidecar `manifest.json` written next to each persisted dataset.
///
/// The dataset artifact itself is exactly the key → record map; the manifest
/// records provenance and integrity metadata for the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Unique identifier for the run that produced this dataset.
    pub run_id: RunId,
    /// When the dataset was written.
    pub created_at: DateTime<Utc>,
    /// Number of records in the dataset.
    pub record_count: usize,
    /// File name of the dataset artifact this manifest describes.
    pub dataset_file: String,
    /// SHA-256 of the dataset artifact bytes.
    pub sha256: String,
    /// Size of the dataset artifact in bytes.
    pub size_bytes: usize,
    /// Tool version that produced this dataset.
    pub tool_version: String,
    /// Enrichment metadata (model, counts) — absent for raw datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentMeta>,
}

/// Metadata about an enrichment run, embedded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentMeta {
    /// Model id used for the run.
    pub model: String,
    /// Records with a genuine LLM-produced enrichment.
    pub enriched: usize,
    /// Records that received the fallback structure.
    pub fallbacks: usize,
}
