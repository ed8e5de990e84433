//! Forecast products and the issuance rules that govern them

use crate::error::ForecastDeltaError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a raw timestamp is snapped onto a valid issuance slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastRoundingRule {
    /// Every hour on the hour
    Hourly,
    /// 02:00, 05:00, ..., 23:00
    Village,
    /// 11:00 and 23:00
    Noon,
    /// 23:00 of the previous day
    Daily,
}

impl ForecastRoundingRule {
    /// Distance between two consecutive issuance slots
    #[must_use]
    pub fn issuance_interval(&self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Village => Duration::hours(3),
            Self::Noon => Duration::hours(12),
            Self::Daily => Duration::days(1),
        }
    }
}

/// When a product's current-hour data becomes available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishSpeed {
    Quick,
    Slow,
}

impl PublishSpeed {
    /// Minute of the hour from which the current hour is considered published
    #[must_use]
    pub fn ready_minute(&self) -> u32 {
        match self {
            Self::Quick => 10,
            Self::Slow => 45,
        }
    }
}

/// Forecast products exposed by the village forecast service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastProduct {
    /// Ultra short-term observation (hourly temperature)
    CurrentObservation,
    /// Short-term village forecast (3-hourly temperature)
    #[default]
    ShortTerm,
    /// Daytime maximum temperature
    DailyHigh,
    /// Morning minimum temperature
    DailyLow,
}

impl ForecastProduct {
    pub const ALL: [ForecastProduct; 4] = [
        Self::CurrentObservation,
        Self::ShortTerm,
        Self::DailyHigh,
        Self::DailyLow,
    ];

    #[must_use]
    pub fn rounding_rule(&self) -> ForecastRoundingRule {
        match self {
            Self::CurrentObservation => ForecastRoundingRule::Hourly,
            Self::ShortTerm => ForecastRoundingRule::Village,
            Self::DailyHigh => ForecastRoundingRule::Noon,
            Self::DailyLow => ForecastRoundingRule::Daily,
        }
    }

    #[must_use]
    pub fn publish_speed(&self) -> PublishSpeed {
        match self {
            Self::CurrentObservation => PublishSpeed::Slow,
            _ => PublishSpeed::Quick,
        }
    }

    /// Operation name on the upstream service
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::CurrentObservation => "getUltraSrtNcst",
            _ => "getVilageFcst",
        }
    }

    /// Item category carrying the temperature value
    #[must_use]
    pub fn temperature_category(&self) -> &'static str {
        match self {
            Self::CurrentObservation => "T1H",
            Self::ShortTerm => "TMP",
            Self::DailyHigh => "TMX",
            Self::DailyLow => "TMN",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentObservation => "current-observation",
            Self::ShortTerm => "short-term",
            Self::DailyHigh => "daily-high",
            Self::DailyLow => "daily-low",
        }
    }
}

impl fmt::Display for ForecastProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastProduct {
    type Err = ForecastDeltaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                ForecastDeltaError::validation(format!(
                    "Unknown forecast product '{}'. Must be one of: {}",
                    s,
                    Self::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}
