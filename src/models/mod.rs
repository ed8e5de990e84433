//! Data models for the forecast-delta application
//!
//! This module contains the core domain models organized by concern:
//! - Location: geodetic points and projected grid cells
//! - Product: forecast products and their issuance rules
//! - Forecast: issuance times, queries and comparison outcomes

pub mod forecast;
pub mod location;
pub mod product;

// Re-export all public types for convenient access
pub use forecast::{FetchFailureReason, FetchOutcome, ForecastQuery, ForecastValue, IssuanceTime};
pub use location::{GeoPoint, GridCell};
pub use product::{ForecastProduct, ForecastRoundingRule, PublishSpeed};
