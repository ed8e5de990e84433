//! `forecast-delta` - today-vs-yesterday temperature comparison on the
//! Korean village forecast grid
//!
//! This library provides the grid projection, issuance-time resolution and
//! the retrying fetch orchestrator, plus the geocoding and persistence
//! collaborators used by the command-line front end.

pub mod base_time;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod grid;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod preferences;
pub mod retry;
pub mod weather;

// Re-export core types for public API
pub use base_time::BaseTimeResolver;
pub use cache::PersistentCache;
pub use config::ForecastDeltaConfig;
pub use error::{FetchFailure, ForecastDeltaError, GeocodeError};
pub use geocode::{CachedGeocoder, Geocoder, LocationInput, LocationParser, OpenMeteoGeocoder};
pub use grid::{GridProjector, LambertParams};
pub use models::{
    FetchFailureReason, FetchOutcome, ForecastProduct, ForecastQuery, ForecastRoundingRule,
    ForecastValue, GeoPoint, GridCell, IssuanceTime, PublishSpeed,
};
pub use orchestrator::ForecastFetchOrchestrator;
pub use preferences::{LocatingMethod, PreferenceStore};
pub use retry::{AttemptResult, RetryPolicy, RetryState, RetryStep};
pub use weather::{ForecastFetcher, KmaForecastClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, ForecastDeltaError>;
