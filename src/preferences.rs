//! Remembers the user's last grid cell and how it was located

use crate::cache::PersistentCache;
use crate::models::GridCell;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const LAST_CELL_KEY: &str = "preferences:last_cell";
const LOCATING_METHOD_KEY: &str = "preferences:locating_method";
const PREFERENCE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How the user's location was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LocatingMethod {
    /// Coordinates supplied by the device or typed as `lat,lon`
    #[default]
    Device,
    /// A place name or address that had to be geocoded
    Address,
}

impl fmt::Display for LocatingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatingMethod::Device => write!(f, "device"),
            LocatingMethod::Address => write!(f, "address"),
        }
    }
}

impl FromStr for LocatingMethod {
    type Err = crate::ForecastDeltaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "device" | "gps" => Ok(LocatingMethod::Device),
            "address" => Ok(LocatingMethod::Address),
            other => Err(crate::ForecastDeltaError::validation(format!(
                "Unknown locating method '{other}'"
            ))),
        }
    }
}

/// Small preference store on top of the persistent cache
#[derive(Clone)]
pub struct PreferenceStore {
    cache: Arc<PersistentCache>,
}

impl PreferenceStore {
    pub fn new(cache: Arc<PersistentCache>) -> Self {
        Self { cache }
    }

    /// Shared handle to the underlying cache
    #[must_use]
    pub fn cache(&self) -> Arc<PersistentCache> {
        Arc::clone(&self.cache)
    }

    pub async fn last_cell(&self) -> Result<Option<GridCell>> {
        self.cache.get(LAST_CELL_KEY).await
    }

    pub async fn set_last_cell(&self, cell: GridCell) -> Result<()> {
        self.cache.put(LAST_CELL_KEY, cell, PREFERENCE_TTL).await
    }

    /// Stored method, falling back to [`LocatingMethod::Device`]
    pub async fn locating_method(&self) -> Result<LocatingMethod> {
        Ok(self
            .cache
            .get(LOCATING_METHOD_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_locating_method(&self, method: LocatingMethod) -> Result<()> {
        self.cache.put(LOCATING_METHOD_KEY, method, PREFERENCE_TTL).await
    }
}
