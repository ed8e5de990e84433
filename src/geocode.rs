//! Place-name geocoding and location input parsing

use crate::ForecastDeltaError;
use crate::cache::PersistentCache;
use crate::error::GeocodeError;
use crate::models::GeoPoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::RngExt;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";
const DEFAULT_TRANSIENT_RETRIES: u32 = 3;

/// Turns a free-form place name into coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, place: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Open-Meteo geocoding API client (no key required)
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenMeteoGeocoder {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(OPEN_METEO_GEOCODING_URL, timeout, DEFAULT_TRANSIENT_RETRIES)
    }

    /// Point the client at another host, e.g. a local mock
    pub fn with_base_url(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("forecast-delta/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    #[instrument(skip(self))]
    async fn resolve(&self, place: &str) -> Result<GeoPoint, GeocodeError> {
        let start = Instant::now();
        let url = format!(
            "{}/v1/search?name={}&count=1&language=en&format=json",
            self.base_url,
            urlencoding::encode(place)
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Api(format!(
                "geocoding request failed: {status}"
            )));
        }

        let parsed: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Api(format!("invalid geocoding response: {e}")))?;

        let Some(best) = parsed.results.unwrap_or_default().into_iter().next() else {
            warn!("No results found for location '{}'", place);
            return Err(GeocodeError::NotFound(place.to_string()));
        };

        info!(
            "Geocoded '{}' to {}{} ({:.4}, {:.4}) in {:.3}s",
            place,
            best.name,
            best.admin1.as_deref().map(|a| format!(", {a}")).unwrap_or_default(),
            best.latitude,
            best.longitude,
            start.elapsed().as_secs_f64()
        );
        Ok(GeoPoint::new(best.latitude, best.longitude))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    admin1: Option<String>,
}

/// Wraps a geocoder with the persistent cache
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Arc<PersistentCache>,
    ttl: Duration,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: Arc<PersistentCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn cache_key(place: &str) -> String {
        format!("geocode:{}", place.trim().to_lowercase())
    }

    /// Spread expiries so entries written together do not all lapse together
    fn jittered_ttl(&self) -> Duration {
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        self.ttl.mul_f64(jitter)
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    async fn resolve(&self, place: &str) -> Result<GeoPoint, GeocodeError> {
        let key = Self::cache_key(place);

        match self.cache.get::<GeoPoint>(&key).await {
            Ok(Some(point)) => {
                debug!(%key, "geocode cache hit");
                return Ok(point);
            }
            Ok(None) => {}
            Err(e) => warn!("Geocode cache read failed: {}", e),
        }

        let point = self.inner.resolve(place).await?;
        if let Err(e) = self.cache.put(&key, point, self.jittered_ttl()).await {
            warn!("Geocode cache write failed: {}", e);
        }
        Ok(point)
    }
}

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates given directly
    Coordinates(GeoPoint),
    /// Place name (city, district, address)
    Name(String),
}

impl LocationInput {
    /// Resolve to coordinates, consulting `geocoder` for names only
    pub async fn resolve(&self, geocoder: &dyn Geocoder) -> Result<GeoPoint, GeocodeError> {
        match self {
            LocationInput::Coordinates(point) => Ok(*point),
            LocationInput::Name(name) => {
                debug!("Geocoding location name: {}", name);
                geocoder.resolve(name).await
            }
        }
    }
}

/// Location parsing utilities
pub struct LocationParser;

impl LocationParser {
    /// Parse location input (coordinates or place names)
    pub fn parse(input: &str) -> Result<LocationInput> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ForecastDeltaError::validation("Location cannot be empty").into());
        }

        // Try to parse as coordinates (lat,lon)
        if let Ok(point) = Self::parse_coordinates(input) {
            return Ok(LocationInput::Coordinates(point));
        }

        Ok(LocationInput::Name(input.to_string()))
    }

    /// Parse coordinates from string like "37.5665,126.978" or "37.5665 126.978"
    fn parse_coordinates(input: &str) -> Result<GeoPoint> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return Err(
                ForecastDeltaError::validation("Coordinates must be in format 'lat,lon'").into(),
            );
        }

        let lat = parts[0]
            .parse::<f64>()
            .with_context(|| format!("Invalid latitude: {}", parts[0]))?;
        let lon = parts[1]
            .parse::<f64>()
            .with_context(|| format!("Invalid longitude: {}", parts[1]))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(ForecastDeltaError::validation(format!(
                "Latitude must be between -90 and 90, got: {lat}"
            ))
            .into());
        }

        if !(-180.0..=180.0).contains(&lon) {
            return Err(ForecastDeltaError::validation(format!(
                "Longitude must be between -180 and 180, got: {lon}"
            ))
            .into());
        }

        Ok(GeoPoint::new(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_location_parser_coordinates() {
        assert_eq!(
            LocationParser::parse("37.5665,126.978").unwrap(),
            LocationInput::Coordinates(GeoPoint::new(37.5665, 126.978))
        );
        assert_eq!(
            LocationParser::parse("35.1796 129.0756").unwrap(),
            LocationInput::Coordinates(GeoPoint::new(35.1796, 129.0756))
        );
        assert_eq!(
            LocationParser::parse(" -33.8688, 151.2093 ").unwrap(),
            LocationInput::Coordinates(GeoPoint::new(-33.8688, 151.2093))
        );
    }

    #[test]
    fn test_location_parser_out_of_range_is_name() {
        assert!(matches!(
            LocationParser::parse("91.0,126.0").unwrap(),
            LocationInput::Name(_)
        ));
        assert!(matches!(
            LocationParser::parse("37.0,181.0").unwrap(),
            LocationInput::Name(_)
        ));
        assert!(matches!(
            LocationParser::parse("37.0,126.0,0.0").unwrap(),
            LocationInput::Name(_)
        ));
    }

    #[test]
    fn test_location_parser_names() {
        assert_eq!(
            LocationParser::parse("Seoul").unwrap(),
            LocationInput::Name("Seoul".to_string())
        );
        assert!(matches!(
            LocationParser::parse("Jung-gu, Busan").unwrap(),
            LocationInput::Name(_)
        ));
    }

    #[test]
    fn test_location_parser_rejects_empty() {
        assert!(LocationParser::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_open_meteo_resolves_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Seoul"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"name": "Seoul", "latitude": 37.566, "longitude": 126.9784, "country": "South Korea", "admin1": "Seoul"},
                    {"name": "Seoul", "latitude": 30.0, "longitude": -90.0}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder =
            OpenMeteoGeocoder::with_base_url(&server.uri(), Duration::from_secs(5), 0).unwrap();
        let point = geocoder.resolve("Seoul").await.unwrap();
        assert_eq!(point, GeoPoint::new(37.566, 126.9784));
    }

    #[tokio::test]
    async fn test_open_meteo_no_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let geocoder =
            OpenMeteoGeocoder::with_base_url(&server.uri(), Duration::from_secs(5), 0).unwrap();
        let err = geocoder.resolve("Atlantis").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(place) if place == "Atlantis"));
    }

    #[tokio::test]
    async fn test_open_meteo_error_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let geocoder =
            OpenMeteoGeocoder::with_base_url(&server.uri(), Duration::from_secs(5), 0).unwrap();
        assert!(matches!(
            geocoder.resolve("Seoul").await,
            Err(GeocodeError::Api(_))
        ));
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for Counting {
        async fn resolve(&self, place: &str) -> Result<GeoPoint, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if place == "nowhere" {
                return Err(GeocodeError::NotFound(place.to_string()));
            }
            Ok(GeoPoint::new(35.1796, 129.0756))
        }
    }

    #[tokio::test]
    async fn test_cached_geocoder_hits_inner_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(PersistentCache::open(dir.path()).unwrap());
        let geocoder = CachedGeocoder::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            cache,
            Duration::from_secs(3600),
        );

        let first = geocoder.resolve("Busan").await.unwrap();
        let second = geocoder.resolve("  busan ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_geocoder_does_not_cache_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(PersistentCache::open(dir.path()).unwrap());
        let geocoder = CachedGeocoder::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            cache,
            Duration::from_secs(3600),
        );

        assert!(geocoder.resolve("nowhere").await.is_err());
        assert!(geocoder.resolve("nowhere").await.is_err());
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_coordinates_skip_geocoder() {
        let counting = Counting {
            calls: AtomicUsize::new(0),
        };
        let input = LocationInput::Coordinates(GeoPoint::new(37.5665, 126.978));
        let point = input.resolve(&counting).await.unwrap();
        assert_eq!(point, GeoPoint::new(37.5665, 126.978));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }
}
