mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use plantdiag::config::Config;
use plantdiag::invokers::ImageInput;
use plantdiag::logic::search;
use plantdiag::logic::{DiagnosisRequest, DiagnosisService, ModelKind};
use plantdiag::models::{Diagnosis, EnvReading};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            Config::setup_interactive()?;
        }
        Commands::Check => check(cli.config).await?,
        Commands::Diagnose {
            image,
            plant_type,
            models,
            env,
            json,
        } => {
            let config = load_config(cli.config)?;
            let image = ImageInput::from_path(&image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;

            let mut request = DiagnosisRequest::new(image);
            if let Some(plant_type) = plant_type {
                request = request.with_plant_type(plant_type);
            }
            if let Some(env) = env {
                request = request.with_environment(
                    EnvReading::from_pairs(&env).context("Invalid --env readings")?,
                );
            }
            if let Some(models) = models {
                request = request.with_models(ModelKind::parse_list(&models)?);
            }

            let service = DiagnosisService::new(config);
            let diagnosis = service.diagnose(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&diagnosis)?);
            } else {
                print_diagnosis(&diagnosis, request.plant_type.as_deref());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load(path).context("Configuration error (run `plantdiag init` to create one)")
}

async fn check(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!("Configuration OK");

    let service = DiagnosisService::new(config);
    let status = service.check_connections().await;
    if status.models.is_empty() {
        println!("No models enabled");
        return Ok(());
    }

    for (kind, connected) in &status.models {
        println!(
            "  {:<10} {}",
            kind.as_str(),
            if *connected { "OK" } else { "OFFLINE" }
        );
    }

    if !status.any_connected() {
        anyhow::bail!("no model endpoint is reachable");
    }
    Ok(())
}

fn print_diagnosis(diagnosis: &Diagnosis, plant_type: Option<&str>) {
    if diagnosis.is_failure_sentinel() {
        println!("Analysis failed: every model call was unsuccessful.");
        println!();
    }

    let provenance = diagnosis.provenance();
    println!("Disease:     {}", diagnosis.name());
    println!("Confidence:  {:.0}%", diagnosis.confidence() * 100.0);
    if provenance.is_consensus() {
        println!(
            "Source:      consensus ({}/{} models agreed)",
            provenance.models_agreed, provenance.models_succeeded
        );
    } else {
        println!("Source:      {}", provenance.source);
    }
    println!("Description: {}", diagnosis.description());
    println!();
    println!("Treatments:");
    for (i, t) in diagnosis.treatments().iter().enumerate() {
        println!(
            "  {}. {} [cost {}, effectiveness {}, {}]",
            i + 1,
            t.method,
            t.cost,
            t.effectiveness,
            t.estimated_price
        );
        println!("     {}", t.description);
    }

    if diagnosis.is_failure_sentinel() {
        return;
    }

    println!();
    println!("Further reading:");
    for query in search::suggested_queries(diagnosis, plant_type) {
        match search::search_url(&query) {
            Ok(url) => println!("  {}", url),
            Err(e) => tracing::debug!("Skipping search link: {}", e),
        }
    }
}
