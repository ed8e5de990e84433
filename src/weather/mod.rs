//! Forecast-fetch collaborator.
//!
//! The orchestrator only sees the [`ForecastFetcher`] trait; [`kma::KmaForecastClient`]
//! is the HTTP implementation against the village forecast service.

use crate::error::FetchFailure;
use crate::models::{ForecastQuery, ForecastValue};
use async_trait::async_trait;

pub mod kma;

pub use kma::KmaForecastClient;

/// Fetch one forecast temperature for a query.
///
/// Implementations must classify every failure as [`FetchFailure::Timeout`],
/// [`FetchFailure::Malformed`] or [`FetchFailure::Fatal`] and must not retry on
/// their own.
#[async_trait]
pub trait ForecastFetcher: Send + Sync {
    async fn fetch(&self, query: &ForecastQuery) -> Result<ForecastValue, FetchFailure>;
}
