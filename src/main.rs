//! forecast-delta command-line front end.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use forecast_delta::{
    BaseTimeResolver, CachedGeocoder, ForecastDeltaConfig, ForecastFetchOrchestrator,
    ForecastProduct, GridCell, GridProjector, KmaForecastClient, LocatingMethod, LocationInput,
    LocationParser, OpenMeteoGeocoder, PersistentCache, PreferenceStore, logging,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "forecast-delta")]
#[command(version, about = "Compare today's forecast temperature with yesterday's")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "FORECAST_DELTA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Project a location onto the forecast grid
    Grid {
        /// `lat,lon` or a place name
        location: String,
    },
    /// Convert a grid cell back to the coordinates of its center
    Geo { nx: i32, ny: i32 },
    /// Show the issuance times that would be requested
    BaseTime {
        #[arg(short, long)]
        product: Option<ForecastProduct>,
        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Compare today's and yesterday's forecast temperature
    Compare {
        /// `lat,lon` or a place name; defaults to the last used cell
        location: Option<String>,
        #[arg(short, long)]
        product: Option<ForecastProduct>,
        /// Attempts per leg
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ForecastDeltaConfig::load_from_path(cli.config.clone())?;
    logging::init(&config.logging, cli.verbose)?;
    debug!(?cli, "starting forecast-delta");

    match cli.command {
        Command::Grid { location } => {
            let prefs = open_preferences(&config)?;
            let cell = locate(&config, &prefs, &location).await?;
            println!("{cell}");
        }
        Command::Geo { nx, ny } => {
            let point = GridProjector::kma().to_geo(GridCell::from_raw(nx, ny));
            println!("{}", point.format_coordinates());
        }
        Command::BaseTime { product, at } => {
            let product = product.unwrap_or(config.defaults.product);
            let now = at.unwrap_or_else(|| Utc::now().fixed_offset());
            let resolver = BaseTimeResolver::for_product(product);
            println!("product:   {product}");
            println!("today:     {}", resolver.resolve(&now, 0));
            println!("yesterday: {}", resolver.resolve(&now, -1));
        }
        Command::Compare {
            location,
            product,
            max_attempts,
            json,
        } => {
            let mut retry = config.retry.clone();
            if let Some(max_attempts) = max_attempts {
                retry.max_attempts = max_attempts;
            }
            retry.validate()?;
            let policy = retry.to_policy();

            let prefs = open_preferences(&config)?;
            let cell = match location {
                Some(location) => locate(&config, &prefs, &location).await?,
                None => prefs
                    .last_cell()
                    .await?
                    .context("No location given and no previous location stored")?,
            };

            let fetcher = KmaForecastClient::new(&config.api)?;
            let orchestrator = ForecastFetchOrchestrator::new(
                Arc::new(fetcher),
                product.unwrap_or(config.defaults.product),
            )
            .with_policy(policy);

            let cancel = orchestrator.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling comparison");
                    cancel.cancel();
                }
            });

            let outcome = orchestrator
                .spawn_comparison(cell, &Utc::now())
                .await
                .context("Comparison task ended without a result")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.summary());
            }
            if outcome.is_empty() {
                bail!("Neither forecast could be fetched");
            }
        }
    }

    Ok(())
}

fn open_preferences(config: &ForecastDeltaConfig) -> Result<PreferenceStore> {
    let path = config.cache.resolved_location();
    let cache = PersistentCache::open(&path)
        .with_context(|| format!("Failed to open cache at {}", path.display()))?;
    Ok(PreferenceStore::new(Arc::new(cache)))
}

async fn locate(
    config: &ForecastDeltaConfig,
    prefs: &PreferenceStore,
    location: &str,
) -> Result<GridCell> {
    let input = LocationParser::parse(location)?;
    let method = match input {
        LocationInput::Coordinates(_) => LocatingMethod::Device,
        LocationInput::Name(_) => LocatingMethod::Address,
    };

    let geocoder = CachedGeocoder::new(
        OpenMeteoGeocoder::new(Duration::from_secs(config.api.timeout_seconds.into()))?,
        prefs.cache(),
        Duration::from_secs(u64::from(config.cache.ttl_hours) * 3600),
    );
    let point = input
        .resolve(&geocoder)
        .await
        .map_err(forecast_delta::ForecastDeltaError::from)?;

    let cell = GridProjector::kma().to_grid(point);
    info!(%cell, %method, "located {}", point.format_coordinates());

    prefs.set_last_cell(cell).await?;
    prefs.set_locating_method(method).await?;
    Ok(cell)
}
