use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FlowmapError;
use crate::geometry::{LatLng, MAX_COORDINATE_PRECISION};

// ── Filter mode ─────────────────────────────────────────────────────────────

/// How a selection filters and highlights edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// An edge is connected when either endpoint is the selected site.
    #[default]
    SiteBased,
    /// Only edges arriving at the selected site are connected.
    DestinationOnly,
}

// ── Radius scaling ──────────────────────────────────────────────────────────

/// Logarithmic marker radius scaling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusScale {
    /// Radius used when capacity is missing, zero or negative.
    pub default_radius: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    /// Capacity that maps to `max_radius` at `reference_zoom`.
    pub reference_capacity: f64,
    pub reference_zoom: f64,
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            default_radius: 20.0,
            min_radius: 0.0,
            max_radius: 20.0,
            reference_capacity: 100_000.0,
            reference_zoom: 12.0,
        }
    }
}

// ── Palette ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Edge color with no selection or for unrelated edges.
    pub neutral: String,
    /// Edge color when the selected site is the destination.
    pub destination_match: String,
    /// Edge color when the selected site is the origin.
    pub origin_match: String,
    pub marker_stroke: String,
    pub treatment_center: String,
    /// Used for sectors without a color of their own.
    pub sector_fallback: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            neutral: "#7AC6E8".to_string(),
            destination_match: "#008EB7".to_string(),
            origin_match: "orange".to_string(),
            marker_stroke: "#008EB7".to_string(),
            treatment_center: "orange".to_string(),
            sector_fallback: "blue".to_string(),
        }
    }
}

// ── Render config ───────────────────────────────────────────────────────────

/// Every tunable of the render pass.
///
/// Deserializes with defaults for anything a document leaves out, so
/// `{"min_zoom_for_text": 12}` is a complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Site name and capacity labels appear from this zoom level.
    pub min_zoom_for_text: i32,
    /// Quantity labels on edges and the legend appear from this zoom level.
    pub min_zoom_for_quantities: i32,
    pub filter_mode: FilterMode,
    pub radius: RadiusScale,
    pub treatment_center_radius: f64,
    /// Decimals kept when building marker position keys.
    pub coordinate_precision: usize,
    pub palette: Palette,
    pub edge_weight: f64,
    pub edge_opacity: f64,
    pub marker_weight: f64,
    pub origin_fill_opacity: f64,
    pub destination_fill_opacity: f64,
    pub sector_weight: f64,
    pub sector_fill_opacity: f64,
    pub center: LatLng,
    pub initial_zoom: i32,
    pub map_opacity: f64,
    pub capacity_prefix: String,
    pub capacity_suffix: String,
    pub treatment_center_caption: String,
    pub legend_text: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_zoom_for_text: 11,
            min_zoom_for_quantities: 11,
            filter_mode: FilterMode::SiteBased,
            radius: RadiusScale::default(),
            treatment_center_radius: 10.0,
            coordinate_precision: 6,
            palette: Palette::default(),
            edge_weight: 2.0,
            edge_opacity: 1.0,
            marker_weight: 1.0,
            origin_fill_opacity: 0.3,
            destination_fill_opacity: 0.8,
            sector_weight: 1.0,
            sector_fill_opacity: 0.3,
            center: LatLng::new(50.3, 5.8),
            initial_zoom: 9,
            map_opacity: 0.5,
            capacity_prefix: "Capacité".to_string(),
            capacity_suffix: "EH".to_string(),
            treatment_center_caption: "Centre de traitement".to_string(),
            legend_text: "Boues liquides (m³) - Boues déshydratées (t)".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, FlowmapError> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, FlowmapError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject settings the radius formula or the opacity fields cannot use.
    pub fn validate(&self) -> Result<(), FlowmapError> {
        if !(self.radius.reference_capacity > 1.0) {
            return Err(FlowmapError::InvalidData(format!(
                "radius.reference_capacity must be greater than 1, got {}",
                self.radius.reference_capacity
            )));
        }
        if !(self.radius.reference_zoom > 0.0) {
            return Err(FlowmapError::InvalidData(format!(
                "radius.reference_zoom must be positive, got {}",
                self.radius.reference_zoom
            )));
        }
        if self.radius.max_radius < self.radius.min_radius {
            return Err(FlowmapError::InvalidData(
                "radius.max_radius must not be below radius.min_radius".to_string(),
            ));
        }
        if self.coordinate_precision > MAX_COORDINATE_PRECISION {
            return Err(FlowmapError::InvalidData(format!(
                "coordinate_precision must be at most {MAX_COORDINATE_PRECISION}, got {}",
                self.coordinate_precision
            )));
        }
        for (name, value) in [
            ("edge_opacity", self.edge_opacity),
            ("origin_fill_opacity", self.origin_fill_opacity),
            ("destination_fill_opacity", self.destination_fill_opacity),
            ("sector_fill_opacity", self.sector_fill_opacity),
            ("map_opacity", self.map_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FlowmapError::InvalidData(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}
