//! Village forecast service client (`VilageFcstInfoService_2.0`)
//!
//! Requests are keyed by issuance date/time and grid cell. The service answers
//! HTTP 200 for most application errors and reports them in `header.resultCode`,
//! so classification looks at both the transport and the envelope.

use super::ForecastFetcher;
use crate::config::ApiConfig;
use crate::error::FetchFailure;
use crate::models::{ForecastProduct, ForecastQuery, ForecastValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const RESULT_OK: &str = "00";
const RESULT_NO_DATA: &str = "03";
const PAGE_SIZE: u32 = 1000;
const PLAUSIBLE_CELSIUS: std::ops::RangeInclusive<f64> = -90.0..=60.0;

/// HTTP client for the village forecast service
#[derive(Debug, Clone)]
pub struct KmaForecastClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl KmaForecastClient {
    /// Create a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let service_key = config
            .service_key
            .clone()
            .context("A service key is required for the forecast API")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("forecast-delta/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn url_for(&self, product: ForecastProduct) -> String {
        format!("{}/{}", self.base_url, product.endpoint())
    }
}

#[async_trait]
impl ForecastFetcher for KmaForecastClient {
    #[instrument(skip(self), fields(product = %query.product, cell = %query.cell, issuance = %query.issuance))]
    async fn fetch(&self, query: &ForecastQuery) -> Result<ForecastValue, FetchFailure> {
        let start = Instant::now();
        let params = [
            ("serviceKey", self.service_key.clone()),
            ("pageNo", "1".to_string()),
            ("numOfRows", PAGE_SIZE.to_string()),
            ("dataType", "JSON".to_string()),
            ("base_date", query.issuance.date()),
            ("base_time", query.issuance.hour()),
            ("nx", query.cell.nx().to_string()),
            ("ny", query.cell.ny().to_string()),
        ];

        let response = self
            .client
            .get(self.url_for(query.product))
            .query(&params)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        debug!(%status, elapsed = ?start.elapsed(), "forecast response received");
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response.text().await.map_err(classify_transport)?;
        parse_temperature(&body, query.product)
    }
}

fn classify_transport(error: reqwest::Error) -> FetchFailure {
    if error.is_timeout() || error.is_connect() || error.is_body() {
        debug!("transient transport error: {}", error);
        FetchFailure::Timeout
    } else if error.is_decode() {
        FetchFailure::malformed(error.to_string())
    } else {
        FetchFailure::fatal(error.to_string())
    }
}

fn classify_status(status: StatusCode) -> FetchFailure {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        warn!(%status, "forecast service unavailable");
        FetchFailure::Timeout
    } else {
        FetchFailure::fatal(format!(
            "forecast request rejected: {} - {}",
            status,
            status.canonical_reason().unwrap_or("Unknown error")
        ))
    }
}

/// Pull the product's temperature out of a raw response body
pub(crate) fn parse_temperature(
    body: &str,
    product: ForecastProduct,
) -> Result<ForecastValue, FetchFailure> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FetchFailure::malformed(format!("undecodable body: {e}")))?;
    let header = envelope.response.header;

    match header.result_code.as_str() {
        RESULT_OK => {}
        RESULT_NO_DATA => {
            return Err(FetchFailure::malformed(format!(
                "no data for issuance: {}",
                header.result_msg
            )));
        }
        code => {
            return Err(FetchFailure::fatal(format!(
                "service error {code}: {}",
                header.result_msg
            )));
        }
    }

    let category = product.temperature_category();
    let item = envelope
        .response
        .body
        .map(|b| b.items.item)
        .unwrap_or_default()
        .into_iter()
        .find(|item| item.category == category)
        .ok_or_else(|| FetchFailure::malformed(format!("no {category} item in response")))?;

    let raw = item
        .obsr_value
        .or(item.fcst_value)
        .ok_or_else(|| FetchFailure::malformed(format!("{category} item has no value")))?;
    let celsius: f64 = raw
        .trim()
        .parse()
        .map_err(|_| FetchFailure::malformed(format!("{category} value '{raw}' is not a number")))?;

    // also rejects the service's missing-value sentinels (+900, -999)
    if !celsius.is_finite() || !PLAUSIBLE_CELSIUS.contains(&celsius) {
        return Err(FetchFailure::malformed(format!(
            "{category} value '{raw}' is not a plausible temperature"
        )));
    }

    Ok(ForecastValue {
        temperature: celsius.round() as i32,
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: ServiceResponse,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    header: Header,
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    result_code: String,
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    items: Items,
}

#[derive(Debug, Deserialize)]
struct Items {
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    category: String,
    obsr_value: Option<String>,
    fcst_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOWCAST: &str = r#"{"response":{"header":{"resultCode":"00","resultMsg":"NORMAL_SERVICE"},
        "body":{"dataType":"JSON","items":{"item":[
            {"baseDate":"20220916","baseTime":"1400","category":"PTY","nx":60,"ny":127,"obsrValue":"0"},
            {"baseDate":"20220916","baseTime":"1400","category":"T1H","nx":60,"ny":127,"obsrValue":"24.6"}
        ]},"pageNo":1,"numOfRows":1000,"totalCount":2}}}"#;

    const VILLAGE: &str = r#"{"response":{"header":{"resultCode":"00","resultMsg":"NORMAL_SERVICE"},
        "body":{"dataType":"JSON","items":{"item":[
            {"baseDate":"20220916","baseTime":"0500","category":"TMP","fcstDate":"20220916","fcstTime":"0600","fcstValue":"-3","nx":60,"ny":127},
            {"baseDate":"20220916","baseTime":"0500","category":"TMN","fcstDate":"20220916","fcstTime":"0600","fcstValue":"-4.5","nx":60,"ny":127},
            {"baseDate":"20220916","baseTime":"0500","category":"TMX","fcstDate":"20220916","fcstTime":"1500","fcstValue":"8.0","nx":60,"ny":127}
        ]},"pageNo":1,"numOfRows":1000,"totalCount":3}}}"#;

    #[test]
    fn test_parse_observation() {
        let value = parse_temperature(NOWCAST, ForecastProduct::CurrentObservation).unwrap();
        assert_eq!(value.temperature, 25);
    }

    #[test]
    fn test_parse_village_categories() {
        assert_eq!(
            parse_temperature(VILLAGE, ForecastProduct::ShortTerm).unwrap().temperature,
            -3
        );
        assert_eq!(
            parse_temperature(VILLAGE, ForecastProduct::DailyLow).unwrap().temperature,
            -5
        );
        assert_eq!(
            parse_temperature(VILLAGE, ForecastProduct::DailyHigh).unwrap().temperature,
            8
        );
    }

    #[test]
    fn test_no_data_is_malformed() {
        let body = r#"{"response":{"header":{"resultCode":"03","resultMsg":"NO_DATA"}}}"#;
        assert!(matches!(
            parse_temperature(body, ForecastProduct::ShortTerm),
            Err(FetchFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_service_error_is_fatal() {
        let body = r#"{"response":{"header":{"resultCode":"30","resultMsg":"SERVICE_KEY_IS_NOT_REGISTERED_ERROR"}}}"#;
        assert!(matches!(
            parse_temperature(body, ForecastProduct::ShortTerm),
            Err(FetchFailure::Fatal(_))
        ));
    }

    #[test]
    fn test_xml_body_is_malformed() {
        let body = "<OpenAPI_ServiceResponse><cmmMsgHeader><errMsg>SERVICE ERROR</errMsg></cmmMsgHeader></OpenAPI_ServiceResponse>";
        assert!(matches!(
            parse_temperature(body, ForecastProduct::CurrentObservation),
            Err(FetchFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_category_is_malformed() {
        let err = parse_temperature(NOWCAST, ForecastProduct::DailyHigh).unwrap_err();
        assert_eq!(err, FetchFailure::malformed("no TMX item in response"));
    }

    fn village_with_tmp(value: &str) -> String {
        format!(
            r#"{{"response":{{"header":{{"resultCode":"00","resultMsg":"NORMAL_SERVICE"}},
            "body":{{"items":{{"item":[{{"category":"TMP","fcstValue":"{value}"}}]}}}}}}}}"#
        )
    }

    #[test]
    fn test_nan_value_is_malformed() {
        assert!(matches!(
            parse_temperature(&village_with_tmp("NaN"), ForecastProduct::ShortTerm),
            Err(FetchFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_infinite_value_is_malformed() {
        assert!(matches!(
            parse_temperature(&village_with_tmp("inf"), ForecastProduct::ShortTerm),
            Err(FetchFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_value_sentinels_are_malformed() {
        for sentinel in ["-999", "900", "-99.5"] {
            assert!(
                matches!(
                    parse_temperature(&village_with_tmp(sentinel), ForecastProduct::ShortTerm),
                    Err(FetchFailure::Malformed(_))
                ),
                "{sentinel}"
            );
        }
    }

    #[test]
    fn test_extreme_but_real_values_pass() {
        assert_eq!(
            parse_temperature(&village_with_tmp("-32.4"), ForecastProduct::ShortTerm)
                .unwrap()
                .temperature,
            -32
        );
        assert_eq!(
            parse_temperature(&village_with_tmp("41.0"), ForecastProduct::ShortTerm)
                .unwrap()
                .temperature,
            41
        );
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), FetchFailure::Timeout);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), FetchFailure::Timeout);
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            FetchFailure::Fatal(_)
        ));
    }

    #[test]
    fn test_client_requires_service_key() {
        let config = ApiConfig {
            service_key: None,
            ..ApiConfig::default()
        };
        assert!(KmaForecastClient::new(&config).is_err());
    }
}
