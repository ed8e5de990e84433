//! Lambert Conformal Conic projection onto the village forecast grid.
//!
//! The forecast service addresses locations by integer grid cells instead of
//! latitude/longitude. The grid is a secant Lambert Conformal Conic projection:
//! - Standard parallels: 30°N and 60°N
//! - Reference point: 38°N, 126°E, sitting at grid cell (43, 136)
//! - Earth radius 6371.00877 km, 5 km cells

use crate::models::{GeoPoint, GridCell};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::LazyLock;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

static KMA_PROJECTOR: LazyLock<GridProjector> =
    LazyLock::new(|| GridProjector::new(LambertParams::KMA));

/// Fixed parameters of a Lambert Conformal Conic grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertParams {
    /// Earth radius (km)
    pub earth_radius_km: f64,
    /// Grid cell size (km)
    pub grid_km: f64,
    /// First standard parallel (degrees)
    pub standard_parallel_1: f64,
    /// Second standard parallel (degrees)
    pub standard_parallel_2: f64,
    /// Reference longitude (degrees)
    pub ref_lon: f64,
    /// Reference latitude (degrees)
    pub ref_lat: f64,
    /// Grid x of the reference point
    pub origin_x: f64,
    /// Grid y of the reference point
    pub origin_y: f64,
}

impl LambertParams {
    /// Grid used by the Korea Meteorological Administration forecast API
    pub const KMA: LambertParams = LambertParams {
        earth_radius_km: 6371.00877,
        grid_km: 5.0,
        standard_parallel_1: 30.0,
        standard_parallel_2: 60.0,
        ref_lon: 126.0,
        ref_lat: 38.0,
        origin_x: 43.0,
        origin_y: 136.0,
    };
}

/// Bidirectional lat/lon ⇄ grid cell converter.
///
/// The cone constant, scale factor and origin radius are derived once from
/// the parameters in [`GridProjector::new`].
#[derive(Debug, Clone)]
pub struct GridProjector {
    params: LambertParams,
    /// Earth radius in grid units
    re: f64,
    /// Cone constant
    sn: f64,
    /// Scale factor
    sf: f64,
    /// Radius at the reference latitude
    ro: f64,
    ref_lon: f64,
}

impl GridProjector {
    #[must_use]
    pub fn new(params: LambertParams) -> Self {
        let re = params.earth_radius_km / params.grid_km;
        let slat1 = params.standard_parallel_1 * DEG_TO_RAD;
        let slat2 = params.standard_parallel_2 * DEG_TO_RAD;
        let olat = params.ref_lat * DEG_TO_RAD;

        let sn = (slat1.cos() / slat2.cos()).ln()
            / ((FRAC_PI_4 + slat2 * 0.5).tan() / (FRAC_PI_4 + slat1 * 0.5).tan()).ln();
        let sf = (FRAC_PI_4 + slat1 * 0.5).tan().powf(sn) * slat1.cos() / sn;
        let ro = re * sf / (FRAC_PI_4 + olat * 0.5).tan().powf(sn);

        Self {
            params,
            re,
            sn,
            sf,
            ro,
            ref_lon: params.ref_lon * DEG_TO_RAD,
        }
    }

    /// Shared projector for the forecast service grid
    #[must_use]
    pub fn kma() -> &'static GridProjector {
        &KMA_PROJECTOR
    }

    #[must_use]
    pub fn params(&self) -> &LambertParams {
        &self.params
    }

    /// Project a geodetic point onto its grid cell
    #[must_use]
    pub fn to_grid(&self, point: GeoPoint) -> GridCell {
        let ra = self.re * self.sf / (FRAC_PI_4 + point.lat * DEG_TO_RAD * 0.5).tan().powf(self.sn);

        // wrap in degrees so both spellings of a meridian land on the same value
        let mut dlon = (point.lon - self.params.ref_lon + 180.0).rem_euclid(360.0) - 180.0;
        if dlon <= -180.0 {
            dlon = 180.0;
        }
        let theta = dlon * DEG_TO_RAD * self.sn;

        let x = ra * theta.sin() + self.params.origin_x;
        let y = self.ro - ra * theta.cos() + self.params.origin_y;

        GridCell::new((x + 0.5).floor() as i32, (y + 0.5).floor() as i32)
    }

    /// Geodetic coordinates of a grid cell's center
    #[must_use]
    pub fn to_geo(&self, cell: GridCell) -> GeoPoint {
        let xn = f64::from(cell.nx()) - self.params.origin_x;
        let yn = self.ro - f64::from(cell.ny()) + self.params.origin_y;

        let mut ra = (xn * xn + yn * yn).sqrt();
        if self.sn < 0.0 {
            ra = -ra;
        }
        let lat = 2.0 * (self.re * self.sf / ra).powf(1.0 / self.sn).atan() - FRAC_PI_2;

        let theta = if xn.abs() <= 0.0 {
            0.0
        } else if yn.abs() <= 0.0 {
            if xn < 0.0 { -FRAC_PI_2 } else { FRAC_PI_2 }
        } else {
            xn.atan2(yn)
        };
        let lon = theta / self.sn + self.ref_lon;

        GeoPoint::new(lat * RAD_TO_DEG, lon * RAD_TO_DEG)
    }
}
