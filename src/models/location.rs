//! Location models: geodetic points and forecast grid cells

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geodetic coordinates in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Integer cell of the forecast grid.
///
/// Obtained from [`crate::grid::GridProjector::to_grid`]; never typed in by hand.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    nx: i32,
    ny: i32,
}

impl GridCell {
    pub(crate) fn new(nx: i32, ny: i32) -> Self {
        Self { nx, ny }
    }

    /// Rebuild a cell that was previously projected and stored, e.g. by the
    /// preference store or passed back on the command line.
    #[must_use]
    pub fn from_raw(nx: i32, ny: i32) -> Self {
        Self::new(nx, ny)
    }

    #[must_use]
    pub fn nx(&self) -> i32 {
        self.nx
    }

    #[must_use]
    pub fn ny(&self) -> i32 {
        self.ny
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.nx, self.ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_format() {
        let point = GeoPoint::new(37.5665, 126.978);
        assert_eq!(point.format_coordinates(), "37.5665, 126.9780");
    }

    #[test]
    fn test_grid_cell_display() {
        assert_eq!(GridCell::from_raw(60, 127).to_string(), "(60, 127)");
    }
}
