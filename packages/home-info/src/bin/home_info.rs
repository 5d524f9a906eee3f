//! CLI for property lookups against Firecrawl
//!
//! Prints the JSON response, then cache and usage statistics as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use home_info::{
    CacheStore, ExtractFromUrlsRequest, FirecrawlClient, HomeInfoRequest, Orchestrator, Settings,
};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "home-info")]
#[command(about = "Look up property facts for an address")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and extract property data for an address
    Lookup {
        #[command(flatten)]
        address: AddressArgs,

        /// Run the same lookup this many times (later runs hit the cache)
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// Find validated listing URLs without extracting
    FindUrls {
        #[command(flatten)]
        address: AddressArgs,
    },

    /// Extract property data from known listing URLs
    Extract {
        /// Listing URL (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,

        /// Address the listings describe
        #[arg(long)]
        address: String,
    },
}

#[derive(clap::Args)]
struct AddressArgs {
    /// Street address, or a full single-line address
    address: String,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    zip: Option<String>,
}

impl AddressArgs {
    fn into_request(self) -> HomeInfoRequest {
        HomeInfoRequest {
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip,
        }
    }
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", label))?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,home_info=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env().context("Failed to load settings")?;
    settings
        .lookup
        .validate()
        .context("Invalid lookup configuration")?;
    tracing::debug!(?settings, "Settings loaded");

    let client =
        FirecrawlClient::from_settings(&settings).context("Failed to create Firecrawl client")?;
    let cache = Arc::new(CacheStore::new().with_default_ttl(settings.lookup.cache_ttl()));
    let orchestrator = Orchestrator::new(client, cache).with_config(settings.lookup.clone());
    let timeout = settings.request_timeout;

    match cli.command {
        Commands::Lookup { address, repeat } => {
            let request = address.into_request();
            for run in 1..=repeat.max(1) {
                let outcome = tokio::time::timeout(timeout, orchestrator.lookup(&request))
                    .await
                    .with_context(|| format!("Lookup timed out after {:?}", timeout))?;
                tracing::info!(run, success = outcome.response.success, "Lookup finished");
                print_json("response", &outcome.response)?;
                if let Some(report) = &outcome.report {
                    print_json("report", report)?;
                }
            }
        }
        Commands::FindUrls { address } => {
            let request = address.into_request();
            let response = tokio::time::timeout(timeout, orchestrator.find_property_urls(&request))
                .await
                .with_context(|| format!("URL discovery timed out after {:?}", timeout))?;
            print_json("response", &response)?;
        }
        Commands::Extract { urls, address } => {
            let request = ExtractFromUrlsRequest::new(urls, address);
            let response = tokio::time::timeout(timeout, orchestrator.extract_from_urls(&request))
                .await
                .with_context(|| format!("Extraction timed out after {:?}", timeout))?;
            print_json("response", &response)?;
        }
    }

    print_json("cache health", &orchestrator.cache().health())?;
    print_json("usage", &orchestrator.usage().snapshot())?;

    Ok(())
}
