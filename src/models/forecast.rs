//! Issuance times, fetch queries and the comparison outcome

use super::{ForecastProduct, GridCell};
use crate::error::FetchFailure;
use chrono::NaiveDateTime;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Forecast issuance slot, always expressed in Korea Standard Time.
///
/// Only [`crate::base_time::BaseTimeResolver`] creates these. Serializes as
/// `{"date": "YYYYMMDD", "hour": "HHMM"}`, the upstream request format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssuanceTime {
    slot: NaiveDateTime,
}

impl IssuanceTime {
    pub(crate) fn from_slot(slot: NaiveDateTime) -> Self {
        Self { slot }
    }

    /// Issuance date as `YYYYMMDD`
    #[must_use]
    pub fn date(&self) -> String {
        self.slot.format("%Y%m%d").to_string()
    }

    /// Issuance hour as `HHMM`, always on the hour
    #[must_use]
    pub fn hour(&self) -> String {
        self.slot.format("%H00").to_string()
    }

    /// Wall-clock slot in Korea Standard Time
    #[must_use]
    pub fn slot(&self) -> NaiveDateTime {
        self.slot
    }
}

impl fmt::Display for IssuanceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date(), self.hour())
    }
}

impl Serialize for IssuanceTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("IssuanceTime", 2)?;
        state.serialize_field("date", &self.date())?;
        state.serialize_field("hour", &self.hour())?;
        state.end()
    }
}

/// Everything the forecast-fetch collaborator needs for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastQuery {
    pub product: ForecastProduct,
    pub cell: GridCell,
    pub issuance: IssuanceTime,
    /// 0 for today, -1 for yesterday
    pub day_offset: i64,
}

impl ForecastQuery {
    /// Same query, one issuance interval earlier
    #[must_use]
    pub fn shifted(&self) -> Self {
        Self {
            issuance: self.issuance.previous(self.product.rounding_rule()),
            ..*self
        }
    }
}

/// A single temperature reading in whole degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastValue {
    pub temperature: i32,
}

/// Result of comparing today's and yesterday's forecast for one cell.
///
/// A missing temperature means that leg failed; the matching failure field
/// says why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub today_temp: Option<i32>,
    pub yesterday_temp: Option<i32>,
    pub today_failure: Option<FetchFailureReason>,
    pub yesterday_failure: Option<FetchFailureReason>,
}

/// Serializable summary of why a leg produced no value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum FetchFailureReason {
    Timeout,
    Malformed(String),
    Fatal(String),
}

impl From<FetchFailure> for FetchFailureReason {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Timeout => Self::Timeout,
            FetchFailure::Malformed(msg) => Self::Malformed(msg),
            FetchFailure::Fatal(msg) => Self::Fatal(msg),
        }
    }
}

impl FetchOutcome {
    /// Today minus yesterday, only when both legs succeeded
    #[must_use]
    pub fn difference(&self) -> Option<i32> {
        Some(self.today_temp? - self.yesterday_temp?)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.today_temp.is_some() && self.yesterday_temp.is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.today_temp.is_none() && self.yesterday_temp.is_none()
    }

    /// One-line human summary, with a neutral placeholder for missing data
    #[must_use]
    pub fn summary(&self) -> String {
        let fmt_temp = |t: Option<i32>| t.map_or_else(|| "--".to_string(), |t| format!("{t}°C"));
        let delta = match self.difference() {
            Some(d) if d > 0 => format!("{d}° warmer than yesterday"),
            Some(d) if d < 0 => format!("{}° colder than yesterday", -d),
            Some(_) => "same as yesterday".to_string(),
            None => "comparison unavailable".to_string(),
        };
        format!(
            "today {}, yesterday {}: {}",
            fmt_temp(self.today_temp),
            fmt_temp(self.yesterday_temp),
            delta
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn slot(y: i32, m: u32, d: u32, h: u32) -> IssuanceTime {
        IssuanceTime::from_slot(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_issuance_formatting() {
        let issuance = slot(2022, 9, 6, 5);
        assert_eq!(issuance.date(), "20220906");
        assert_eq!(issuance.hour(), "0500");
        assert_eq!(issuance.to_string(), "20220906 0500");
    }

    #[test]
    fn test_issuance_serializes_as_date_and_hour() {
        let json = serde_json::to_value(slot(2022, 9, 15, 23)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"date": "20220915", "hour": "2300"})
        );
    }

    #[test]
    fn test_difference_requires_both_legs() {
        let both = FetchOutcome {
            today_temp: Some(10),
            yesterday_temp: Some(8),
            ..Default::default()
        };
        assert_eq!(both.difference(), Some(2));
        assert!(both.is_complete());

        let partial = FetchOutcome {
            today_temp: Some(10),
            yesterday_temp: None,
            yesterday_failure: Some(FetchFailureReason::Timeout),
            ..Default::default()
        };
        assert_eq!(partial.difference(), None);
        assert!(!partial.is_complete());
        assert!(!partial.is_empty());
    }

    #[test]
    fn test_summary_placeholder() {
        let outcome = FetchOutcome::default();
        assert!(outcome.is_empty());
        assert_eq!(
            outcome.summary(),
            "today --, yesterday --: comparison unavailable"
        );

        let colder = FetchOutcome {
            today_temp: Some(3),
            yesterday_temp: Some(7),
            ..Default::default()
        };
        assert!(colder.summary().ends_with("4° colder than yesterday"));
    }

    #[test]
    fn test_shifted_query_moves_one_interval_back() {
        let query = ForecastQuery {
            product: ForecastProduct::ShortTerm,
            cell: GridCell::from_raw(60, 127),
            issuance: slot(2022, 9, 16, 2),
            day_offset: 0,
        };
        let shifted = query.shifted();
        assert_eq!(shifted.issuance, slot(2022, 9, 15, 23));
        assert_eq!(shifted.cell, query.cell);
        assert_eq!(shifted.day_offset, 0);
    }
}
