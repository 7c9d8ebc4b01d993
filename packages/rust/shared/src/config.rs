//! Application configuration for MedHarvest.
//!
//! User config lives at `~/.medharvest/medharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MedHarvestError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "medharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".medharvest";

// ---------------------------------------------------------------------------
// Config structs (matching medharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Drug-label source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Groq enrichment settings.
    #[serde(default)]
    pub groq: GroqConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default dataset output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default number of distinct records to collect.
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Default page size requested per call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            target_count: default_target_count(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_output_dir() -> String {
    "~/medharvest-data".into()
}
fn default_target_count() -> usize {
    500
}
fn default_batch_size() -> usize {
    100
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the drug-label endpoint.
    #[serde(default = "default_source_url")]
    pub base_url: String,

    /// Optional filter expression passed as the `search` query parameter.
    #[serde(default = "default_search_filter")]
    pub search: String,

    /// Fixed pause between page requests, in ms.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Attempts per page request before giving up on the page.
    #[serde(default = "default_source_retry_attempts")]
    pub retry_attempts: usize,

    /// Base delay for linear backoff between page attempts, in ms.
    #[serde(default = "default_source_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_url(),
            search: default_search_filter(),
            page_delay_ms: default_page_delay_ms(),
            retry_attempts: default_source_retry_attempts(),
            retry_base_ms: default_source_retry_base_ms(),
        }
    }
}

fn default_source_url() -> String {
    "https://api.fda.gov/drug/label.json".into()
}
fn default_search_filter() -> String {
    "_exists_:openfda.brand_name".into()
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_source_retry_attempts() -> usize {
    5
}
fn default_source_retry_base_ms() -> u64 {
    1000
}

/// `[groq]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible chat endpoint.
    #[serde(default = "default_groq_url")]
    pub base_url: String,

    /// Model to use for enrichment.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature (deterministic-leaning).
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Completion token budget per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Attempts per record before falling back.
    #[serde(default = "default_groq_retry_attempts")]
    pub retry_attempts: usize,

    /// Fixed pause between attempts, in ms.
    #[serde(default = "default_groq_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Fixed pause after each record, in ms.
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_groq_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry_attempts: default_groq_retry_attempts(),
            retry_delay_ms: default_groq_retry_delay_ms(),
            record_delay_ms: default_record_delay_ms(),
        }
    }
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_groq_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    300
}
fn default_groq_retry_attempts() -> usize {
    3
}
fn default_groq_retry_delay_ms() -> u64 {
    1000
}
fn default_record_delay_ms() -> u64 {
    100
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime retrieval configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the drug-label endpoint.
    pub base_url: String,
    /// Filter expression for the `search` query parameter (empty = none).
    pub search: String,
    /// Fixed pause between page requests.
    pub page_delay: Duration,
    /// Retry schedule for a single page request.
    pub retry: RetryPolicy,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            search: config.source.search.clone(),
            page_delay: Duration::from_millis(config.source.page_delay_ms),
            retry: RetryPolicy::linear(
                config.source.retry_attempts,
                Duration::from_millis(config.source.retry_base_ms),
            ),
        }
    }
}

/// Runtime enrichment configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Base URL of the OpenAI-compatible chat endpoint.
    pub base_url: String,
    /// Model id sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token budget per request.
    pub max_tokens: u32,
    /// Retry schedule for a single record.
    pub retry: RetryPolicy,
    /// Fixed pause after each record.
    pub record_delay: Duration,
}

impl From<&AppConfig> for EnrichConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.groq.base_url.clone(),
            model: config.groq.model.clone(),
            temperature: config.groq.temperature,
            max_tokens: config.groq.max_tokens,
            retry: RetryPolicy::fixed(
                config.groq.retry_attempts,
                Duration::from_millis(config.groq.retry_delay_ms),
            ),
            record_delay: Duration::from_millis(config.groq.record_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.medharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MedHarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.medharvest/medharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MedHarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MedHarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MedHarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MedHarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MedHarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the Groq API key from the configured env var.
///
/// Enrichment must not start without a credential, so this is called before
/// any request is issued; a missing or empty var is a fatal config error.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.groq.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(MedHarvestError::config(format!(
            "Groq API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://console.groq.com/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("GROQ_API_KEY"));
        assert!(toml_str.contains("api.fda.gov"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.target_count, 500);
        assert_eq!(parsed.defaults.batch_size, 100);
        assert_eq!(parsed.groq.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
target_count = 50

[groq]
model = "llama-3.3-70b-versatile"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.target_count, 50);
        assert_eq!(config.defaults.batch_size, 100);
        assert_eq!(config.groq.model, "llama-3.3-70b-versatile");
        assert_eq!(config.groq.retry_attempts, 3);
    }

    #[test]
    fn fetch_config_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.page_delay, Duration::from_millis(1000));
        assert_eq!(fetch.retry.max_attempts, 5);
        assert_eq!(
            fetch.retry.delay_after(2),
            Duration::from_millis(2000),
            "page retries back off linearly"
        );
    }

    #[test]
    fn enrich_config_from_app_config() {
        let app = AppConfig::default();
        let enrich = EnrichConfig::from(&app);
        assert_eq!(enrich.retry.max_attempts, 3);
        assert_eq!(
            enrich.retry.delay_after(3),
            Duration::from_millis(1000),
            "record retries use a fixed pause"
        );
        assert_eq!(enrich.record_delay, Duration::from_millis(100));
    }

    #[test]
    fn api_key_resolution_fails_without_env() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.groq.api_key_env = "MH_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
