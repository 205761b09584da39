//! Pure geometry helpers: great-circle distance, marker radius scaling and
//! canonical position keys.

use serde::{Deserialize, Serialize};

use crate::config::RadiusScale;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Finest rounding a position key can use. An f64 degree value carries no
/// more decimals than this.
pub const MAX_COORDINATE_PRECISION: usize = 15;

/// A WGS84 position in decimal degrees.
///
/// Serialized as a `[lat, lng]` pair, the shape map surfaces expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_km(&self, other: &LatLng) -> f64 {
        haversine_distance_km(self.lat, self.lng, other.lat, other.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

/// Great-circle distance in kilometres, rounded to one decimal.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h slightly outside [0, 1] for antipodal points,
    // which would turn the sqrt(1 - h) below into NaN.
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round_to(EARTH_RADIUS_KM * c, 1)
}

/// Marker radius for a site capacity at a zoom level.
///
/// Missing, zero, negative or non-finite capacities get the default radius.
/// Otherwise the radius grows with `log10(capacity)` and linearly with zoom,
/// and never drops below `min_radius`.
pub fn radius_for_capacity(capacity: Option<f64>, zoom_level: i32, scale: &RadiusScale) -> f64 {
    let capacity = match capacity {
        Some(c) if c.is_finite() && c > 0.0 => c,
        _ => return scale.default_radius,
    };

    let fraction = capacity.log10() / scale.reference_capacity.log10();
    let zoom_factor = f64::from(zoom_level.max(0)) / scale.reference_zoom;
    let radius = scale.min_radius + fraction * (scale.max_radius - scale.min_radius) * zoom_factor;

    radius.max(scale.min_radius.max(0.0))
}

/// Canonical string key of a position rounded to `precision` decimals.
///
/// Two positions share a key exactly when they round to the same pair.
/// `precision` is capped at [`MAX_COORDINATE_PRECISION`].
pub fn position_key(position: &LatLng, precision: usize) -> String {
    let precision = precision.min(MAX_COORDINATE_PRECISION);
    format!(
        "{:.*},{:.*}",
        precision,
        round_to(position.lat, precision),
        precision,
        round_to(position.lng, precision)
    )
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    // + 0.0 folds negative zero so keys never read "-0.0".
    (value * factor).round() / factor + 0.0
}
