//! CLI entry point for CareerLens.
//!
//! This binary provides the `careerlens` command, which analyses a
//! professional profile read from a text file and writes the structured
//! result as JSON.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use careerlens_adapters::SearchClient;
use careerlens_agent::{
    Agent, AgentCore, GenerationClient, ProfileAnalyzer, ProfileInput, Settings,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// CareerLens: structured career profile analysis.
#[derive(Parser, Debug)]
#[command(
    name = "careerlens",
    version,
    about = "Analyse a professional profile into skills and a career assessment",
    long_about = "Reads a professional profile from a text file, extracts skills and a \
                  holistic career assessment with a language model, and writes the result \
                  as JSON."
)]
struct Cli {
    /// Path to a text file containing the profile to analyse.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Where to write the analysis.
    #[arg(long, default_value = "profile_analysis_results.json")]
    output: PathBuf,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env();
    let level = settings
        .as_ref()
        .map(|s| s.log_level.to_lowercase())
        .unwrap_or_else(|_| "info".to_owned());
    init_tracing(&level);

    let Some(profile_path) = cli.profile else {
        info!("no profile given; run `careerlens --profile <FILE> [--output <FILE>]`");
        return Ok(());
    };

    let settings = settings.context("failed to load settings")?;
    settings.validate().context("invalid configuration")?;

    run(&settings, profile_path, cli.output).await
}

async fn run(settings: &Settings, profile_path: PathBuf, output: PathBuf) -> Result<()> {
    info!("starting CareerLens");

    let llm = GenerationClient::new(settings.llm_config())
        .context("failed to create generation client")?;
    let search =
        SearchClient::new(settings.search_config()).context("failed to create search client")?;
    let core = AgentCore::new(Arc::new(llm)).with_search(Arc::new(search));
    let analyzer = ProfileAnalyzer::new(core);

    let profile_text = report::read_profile(&profile_path)?;
    info!(path = %profile_path.display(), bytes = profile_text.len(), "profile loaded");

    let analysis = analyzer
        .execute(ProfileInput::new(profile_text))
        .await
        .context("profile analysis failed")?;

    report::log_summary(&analysis);
    report::write_results(&output, &analysis)?;
    info!(path = %output.display(), "results written");

    info!(stats = %analyzer.core().performance_stats(), "performance");
    Ok(())
}

/// Initialise the tracing subscriber.  `RUST_LOG` wins over
/// `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
