//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use medharvest_core::pipeline::{
    EnrichPipelineConfig, FetchPipelineConfig, ProgressReporter, run_enrich, run_fetch,
};
use medharvest_shared::{
    AppConfig, EnrichConfig, FetchConfig, config_file_path, init_config, load_config,
    resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MedHarvest — build and enrich a drug-label dataset.
#[derive(Parser)]
#[command(
    name = "medharvest",
    version,
    about = "Fetch drug labels from a paginated source and enrich them with an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch drug labels into a raw dataset.
    Fetch {
        /// Number of distinct records to collect.
        #[arg(short, long)]
        target: Option<usize>,

        /// Page size requested per call.
        #[arg(short, long)]
        batch: Option<usize>,

        /// Output root directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<String>,

        /// Override the source base URL.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Enrich a raw dataset with LLM-extracted fields.
    Enrich {
        /// Input dataset file (defaults to <out>/raw/dataset.json).
        #[arg(short, long)]
        input: Option<String>,

        /// Output root directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<String>,

        /// Override the enrichment model id.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Fetch and then enrich in one go, through the persisted raw dataset.
    Run {
        /// Number of distinct records to collect.
        #[arg(short, long)]
        target: Option<usize>,

        /// Page size requested per call.
        #[arg(short, long)]
        batch: Option<usize>,

        /// Output root directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<String>,

        /// Override the enrichment model id.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
    /// Print the config file path.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "medharvest=info",
        1 => "medharvest=debug",
        _ => "medharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fetch {
            target,
            batch,
            out,
            base_url,
        } => cmd_fetch(target, batch, out.as_deref(), base_url.as_deref()).await,
        Command::Enrich { input, out, model } => {
            cmd_enrich(input.as_deref(), out.as_deref(), model.as_deref()).await
        }
        Command::Run {
            target,
            batch,
            out,
            model,
        } => cmd_run(target, batch, out.as_deref(), model.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Path => cmd_config_path(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(
    target: Option<usize>,
    batch: Option<usize>,
    out: Option<&str>,
    base_url: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let pipeline_config = fetch_pipeline_config(&config, target, batch, out, base_url);

    info!(
        target_count = pipeline_config.target_count,
        batch_size = pipeline_config.batch_size,
        "fetching drug labels"
    );

    let reporter = CliProgress::new();
    let report = run_fetch(&pipeline_config, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Raw dataset written!");
    println!("  Run:        {}", report.run_id);
    println!("  Records:    {}", report.summary.records_collected);
    println!("  Pages:      {}", report.summary.pages_fetched);
    println!("  Discarded:  {}", report.summary.items_discarded);
    println!("  Duplicates: {}", report.summary.duplicates_skipped);
    println!("  Exhausted:  {}", report.summary.exhausted);
    println!("  Path:       {}", report.dataset_path.display());
    println!("  Time:       {:.1}s", report.summary.duration.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_enrich(input: Option<&str>, out: Option<&str>, model: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let pipeline_config = enrich_pipeline_config(&config, input, out, model)?;

    info!(
        input = %pipeline_config.input.display(),
        model = %pipeline_config.enrich.model,
        "enriching dataset"
    );

    let reporter = CliProgress::new();
    let report = run_enrich(&pipeline_config, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Enriched dataset written!");
    println!("  Run:       {}", report.run_id);
    println!("  Records:   {}", report.summary.records);
    println!("  Enriched:  {}", report.summary.enriched);
    println!("  Fallbacks: {}", report.summary.fallbacks);
    println!("  Path:      {}", report.dataset_path.display());
    println!("  Time:      {:.1}s", report.summary.duration.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_run(
    target: Option<usize>,
    batch: Option<usize>,
    out: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let config = load_config()?;

    // Resolve the credential before fetching anything: a missing key must
    // fail fast, not after the fetch stage already ran.
    resolve_api_key(&config)?;

    let fetch_config = fetch_pipeline_config(&config, target, batch, out, None);

    let reporter = CliProgress::new();
    let fetch_report = run_fetch(&fetch_config, &reporter).await?;

    let input = fetch_report.dataset_path.to_string_lossy().to_string();
    let enrich_config = enrich_pipeline_config(&config, Some(&input), out, model)?;
    let enrich_report = run_enrich(&enrich_config, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Pipeline complete!");
    println!("  Fetched:   {}", fetch_report.summary.records_collected);
    println!("  Enriched:  {}", enrich_report.summary.enriched);
    println!("  Fallbacks: {}", enrich_report.summary.fallbacks);
    println!("  Raw:       {}", fetch_report.dataset_path.display());
    println!("  Enriched:  {}", enrich_report.dataset_path.display());
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", config_file_path()?.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Config merging
// ---------------------------------------------------------------------------

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the output root from a CLI override or the configured default.
fn output_root(config: &AppConfig, out: Option<&str>) -> PathBuf {
    match out {
        Some(p) => PathBuf::from(p),
        None => expand_home(&config.defaults.output_dir),
    }
}

fn fetch_pipeline_config(
    config: &AppConfig,
    target: Option<usize>,
    batch: Option<usize>,
    out: Option<&str>,
    base_url: Option<&str>,
) -> FetchPipelineConfig {
    let mut fetch = FetchConfig::from(config);
    if let Some(url) = base_url {
        fetch.base_url = url.to_string();
    }

    FetchPipelineConfig {
        target_count: target.unwrap_or(config.defaults.target_count),
        batch_size: batch.unwrap_or(config.defaults.batch_size),
        output_root: output_root(config, out),
        fetch,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn enrich_pipeline_config(
    config: &AppConfig,
    input: Option<&str>,
    out: Option<&str>,
    model: Option<&str>,
) -> Result<EnrichPipelineConfig> {
    // Fail fast: no credential, no run.
    let api_key = resolve_api_key(config)?;

    let mut enrich = EnrichConfig::from(config);
    if let Some(model) = model {
        enrich.model = model.to_string();
    }

    let root = output_root(config, out);
    let input = match input {
        Some(p) => PathBuf::from(p),
        None => root.join("raw").join("dataset.json"),
    };

    Ok(EnrichPipelineConfig {
        input,
        output_root: root,
        enrich,
        api_key,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_processed(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {name}"));
    }
}
