// This is the entry point of the GA4 report generator.
//
// **Architecture Overview:**
// - `core/` = Business logic (date ranges, formatting, fallback, pipeline)
// - `infra/` = Implementations of core traits (GA4, Gemini, filesystem)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize clients (dependency injection)
// 3. Run the configured report flavor once
// 4. Map the outcome to an exit code

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;

use crate::core::config::ReportConfig;
use crate::core::narrative::NarrativeService;
use crate::core::pipeline::ReportPipeline;
use crate::core::reporting::date_ranges::local_today;
use crate::infra::ai::GeminiClient;
use crate::infra::ga4::{Ga4DataClient, ANALYTICS_READONLY_SCOPE};
use crate::infra::google_auth::ServiceAccountAuth;
use crate::infra::output::FileArtifactStore;

async fn run() -> anyhow::Result<PathBuf> {
    // Validated before any client is built, so a bad environment never
    // reaches the network.
    let config = ReportConfig::from_env()?;
    tracing::info!(
        "Producing {} report into {}",
        config.flavor.as_str(),
        config.output_path().display()
    );

    let auth = ServiceAccountAuth::from_source(&config.credentials, ANALYTICS_READONLY_SCOPE)
        .await
        .context("Failed to load Google service account credentials")?;
    tracing::info!("Authenticating to GA4 as {}", auth.client_email());

    let narrative = config.narrative.as_ref().map(|settings| {
        tracing::info!("Narrative models: {}", settings.models.join(" -> "));
        NarrativeService::new(
            GeminiClient::new(settings.api_key.clone()),
            settings.models.clone(),
            settings.google_search,
        )
        .with_temperature(settings.temperature)
    });

    let store = FileArtifactStore::new(&config.output_dir);
    let pipeline = ReportPipeline::new(config, Ga4DataClient::new(auth), store);

    let path = pipeline.run(local_today(), narrative.as_ref()).await?;
    Ok(path)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load .env file if present
    dotenv::dotenv().ok();

    match run().await {
        Ok(path) => {
            tracing::info!("Report written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("Report run failed: {:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
