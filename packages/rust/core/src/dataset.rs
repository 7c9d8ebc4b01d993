//! Dataset persistence.
//!
//! A persisted dataset is a directory holding `dataset.json` (the key →
//! record map, pretty-printed, non-ASCII preserved) and a sidecar
//! `manifest.json` with provenance and integrity metadata. Writes are
//! atomic (temp file + rename), so a crashed run never leaves a
//! half-written artifact behind.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use medharvest_shared::{
    CURRENT_SCHEMA_VERSION, Dataset, DatasetManifest, EnrichmentMeta, MedHarvestError, RawDataset,
    Result, RunId,
};

/// File name of the dataset artifact within its directory.
pub const DATASET_FILE: &str = "dataset.json";

/// File name of the sidecar manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Write a dataset directory: `dataset.json` plus `manifest.json`.
///
/// Returns the manifest that was written. The dataset must already be fully
/// built in memory; persistence is the last step of an engine pass, never
/// an incremental one.
#[instrument(skip_all, fields(dir = %dir.display(), records = dataset.len()))]
pub fn write_dataset<T: Serialize>(
    dir: &Path,
    dataset: &Dataset<T>,
    run_id: &RunId,
    tool_version: &str,
    enrichment: Option<EnrichmentMeta>,
) -> Result<DatasetManifest> {
    std::fs::create_dir_all(dir).map_err(|e| MedHarvestError::io(dir, e))?;

    // serde_json keeps non-ASCII characters as-is, which downstream
    // consumers of the dataset rely on.
    let content = serde_json::to_string_pretty(dataset)
        .map_err(|e| MedHarvestError::decode(format!("dataset serialization: {e}")))?;

    let dataset_path = dir.join(DATASET_FILE);
    write_atomic(&dataset_path, &content)?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    let manifest = DatasetManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: run_id.clone(),
        created_at: Utc::now(),
        record_count: dataset.len(),
        dataset_file: DATASET_FILE.to_string(),
        sha256,
        size_bytes: content.len(),
        tool_version: tool_version.to_string(),
        enrichment,
    };

    let manifest_content = serde_json::to_string_pretty(&manifest)
        .map_err(|e| MedHarvestError::decode(format!("manifest serialization: {e}")))?;
    write_atomic(&dir.join(MANIFEST_FILE), &manifest_content)?;

    info!(
        records = manifest.record_count,
        size_bytes = manifest.size_bytes,
        path = %dataset_path.display(),
        "dataset written"
    );

    Ok(manifest)
}

/// Read a raw dataset artifact.
///
/// Accepts any key → record JSON map of the dataset shape, regardless of
/// what produced it; the enrichment pipeline does not care whether the
/// file came from a fetch run or elsewhere.
pub fn read_raw_dataset(path: &Path) -> Result<RawDataset> {
    let content = std::fs::read_to_string(path).map_err(|e| MedHarvestError::io(path, e))?;

    serde_json::from_str(&content)
        .map_err(|e| MedHarvestError::decode(format!("{}: {e}", path.display())))
}

/// Read a dataset directory's manifest.
pub fn read_manifest(dir: &Path) -> Result<DatasetManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| MedHarvestError::io(&path, e))?;

    serde_json::from_str(&content)
        .map_err(|e| MedHarvestError::decode(format!("{}: {e}", path.display())))
}

/// Write `content` to `path` via a temp file and rename.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MedHarvestError::validation(format!("bad path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| MedHarvestError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| MedHarvestError::io(path, e))?;

    debug!(file = %path.display(), size = content.len(), "wrote artifact");
    Ok(())
}
