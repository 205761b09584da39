//! Render pass: turns the aggregated edges, the sectors and the current
//! selection into a flat list of map primitives.
//!
//! The pass is a pure function of its inputs and is re-run from scratch on
//! every selection, zoom or data change:
//! - Sector polygons are always emitted, as a background layer
//! - Edges not connected to the selection are left out entirely
//! - Each physical position gets at most one site marker per pass
//! - Labels are gated on zoom thresholds from [`RenderConfig`]
//!
//! Drawing is left to the map surface. The tree serializes to JSON for it.

use std::collections::HashSet;

use serde::Serialize;

use crate::aggregation::{AggregatedEdge, EdgeSet};
use crate::config::RenderConfig;
use crate::geometry::{position_key, radius_for_capacity, LatLng};
use crate::records::SectorRecord;
use crate::selection::{HighlightClass, SelectionState};

// ── Primitives ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelDirection {
    Top,
    Right,
    Center,
}

/// A permanent text overlay attached to a primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub text: String,
    pub direction: LabelDirection,
    /// Pixel offset from the anchor.
    pub offset: [i32; 2],
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorPolygon {
    pub name: String,
    pub positions: Vec<LatLng>,
    pub color: String,
    pub weight: f64,
    pub fill_opacity: f64,
    pub interactive: bool,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeLine {
    pub origin: String,
    pub destination: String,
    pub positions: [LatLng; 2],
    pub highlight: HighlightClass,
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    /// Quantity and unit, only at or above the quantity zoom threshold.
    pub label: Option<Label>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Origin,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Circle,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMarker {
    /// Site selected when the marker is clicked.
    pub site: String,
    pub endpoint: Endpoint,
    pub position: LatLng,
    pub shape: MarkerShape,
    pub treatment_center: bool,
    pub radius: f64,
    pub stroke_color: String,
    pub fill_color: String,
    pub weight: f64,
    pub fill_opacity: f64,
    /// Name and capacity, only at or above the text zoom threshold.
    pub label: Option<Label>,
}

/// Everything the map surface draws for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTree {
    pub zoom_level: i32,
    pub tile_opacity: f64,
    pub selected_site: Option<String>,
    pub sectors: Vec<SectorPolygon>,
    pub edges: Vec<EdgeLine>,
    pub markers: Vec<SiteMarker>,
    pub legend: Option<String>,
}

impl RenderTree {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Marker de-duplication ───────────────────────────────────────────────────

/// Positions already holding a marker in the current pass.
///
/// Created empty at the start of every pass and dropped at its end.
#[derive(Debug)]
pub struct RenderedPositionSet {
    keys: HashSet<String>,
    precision: usize,
}

impl RenderedPositionSet {
    pub fn new(precision: usize) -> Self {
        Self {
            keys: HashSet::new(),
            precision,
        }
    }

    /// Claim `position` for a marker. False if an earlier edge already did.
    pub fn claim(&mut self, position: &LatLng) -> bool {
        self.keys.insert(position_key(position, self.precision))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ── Render pass ─────────────────────────────────────────────────────────────

/// Build the render tree for one state.
///
/// Works with either dataset empty, so a view can be drawn while one of the
/// loads is still pending or after it failed.
pub fn render(
    edges: &EdgeSet,
    sectors: &[SectorRecord],
    state: &SelectionState,
    config: &RenderConfig,
) -> RenderTree {
    let zoom = state.zoom_level;
    let show_text = zoom >= config.min_zoom_for_text;
    let show_quantities = zoom >= config.min_zoom_for_quantities;

    let matcher = state.matcher(config.filter_mode);
    let mut rendered = RenderedPositionSet::new(config.coordinate_precision);

    let mut lines = Vec::new();
    let mut markers = Vec::new();

    for edge in edges {
        let classification = matcher.classify(edge);
        if !classification.connected {
            continue;
        }
        let color = line_color(classification.highlight, config);

        lines.push(EdgeLine {
            origin: edge.origin.clone(),
            destination: edge.destination.clone(),
            positions: [edge.origin_position, edge.destination_position],
            highlight: classification.highlight,
            color: color.to_string(),
            weight: config.edge_weight,
            opacity: config.edge_opacity,
            label: show_quantities.then(|| Label {
                text: format!("{} {}", edge.quantity, edge.unit),
                direction: LabelDirection::Center,
                offset: [0, 0],
                class_name: "quantity-tooltip".to_string(),
            }),
        });

        if rendered.claim(&edge.origin_position) {
            markers.push(origin_marker(edge, color, zoom, show_text, config));
        }
        if rendered.claim(&edge.destination_position) {
            markers.push(destination_marker(edge, color, zoom, show_text, config));
        }
    }

    RenderTree {
        zoom_level: zoom,
        tile_opacity: state.map_opacity,
        selected_site: state.selection.site().map(str::to_string),
        sectors: sectors.iter().map(|s| sector_polygon(s, config)).collect(),
        edges: lines,
        markers,
        legend: show_quantities.then(|| config.legend_text.clone()),
    }
}

/// A destination whose capacity is exactly zero is a treatment center.
pub fn is_treatment_center(edge: &AggregatedEdge) -> bool {
    edge.destination_capacity == Some(0.0)
}

fn line_color(highlight: HighlightClass, config: &RenderConfig) -> &str {
    match highlight {
        HighlightClass::Neutral => &config.palette.neutral,
        HighlightClass::DestinationMatch => &config.palette.destination_match,
        HighlightClass::OriginMatch => &config.palette.origin_match,
    }
}

fn origin_marker(
    edge: &AggregatedEdge,
    line_color: &str,
    zoom: i32,
    show_text: bool,
    config: &RenderConfig,
) -> SiteMarker {
    SiteMarker {
        site: edge.origin.clone(),
        endpoint: Endpoint::Origin,
        position: edge.origin_position,
        shape: MarkerShape::Circle,
        treatment_center: false,
        radius: radius_for_capacity(edge.origin_capacity, zoom, &config.radius),
        stroke_color: config.palette.marker_stroke.clone(),
        fill_color: line_color.to_string(),
        weight: config.marker_weight,
        fill_opacity: config.origin_fill_opacity,
        label: show_text.then(|| Label {
            text: capacity_text(&edge.origin, edge.origin_capacity, config),
            direction: LabelDirection::Top,
            offset: [0, -10],
            class_name: "zoom-tooltip".to_string(),
        }),
    }
}

fn destination_marker(
    edge: &AggregatedEdge,
    line_color: &str,
    zoom: i32,
    show_text: bool,
    config: &RenderConfig,
) -> SiteMarker {
    let treatment_center = is_treatment_center(edge);
    let (shape, radius, stroke_color, fill_color) = if treatment_center {
        (
            MarkerShape::Square,
            config.treatment_center_radius,
            config.palette.treatment_center.clone(),
            config.palette.treatment_center.clone(),
        )
    } else {
        (
            MarkerShape::Circle,
            radius_for_capacity(edge.destination_capacity, zoom, &config.radius),
            config.palette.marker_stroke.clone(),
            line_color.to_string(),
        )
    };

    let label = show_text.then(|| {
        if treatment_center {
            Label {
                text: format!("{}\n{}", edge.destination, config.treatment_center_caption),
                direction: LabelDirection::Right,
                offset: [20, 0],
                class_name: "treatment-center-tooltip".to_string(),
            }
        } else {
            Label {
                text: capacity_text(&edge.destination, edge.destination_capacity, config),
                direction: LabelDirection::Right,
                offset: [20, 0],
                class_name: "zoom-tooltip".to_string(),
            }
        }
    });

    SiteMarker {
        site: edge.destination.clone(),
        endpoint: Endpoint::Destination,
        position: edge.destination_position,
        shape,
        treatment_center,
        radius,
        stroke_color,
        fill_color,
        weight: config.marker_weight,
        fill_opacity: config.destination_fill_opacity,
        label,
    }
}

fn sector_polygon(sector: &SectorRecord, config: &RenderConfig) -> SectorPolygon {
    SectorPolygon {
        name: sector.name.clone(),
        positions: sector.polygon.clone(),
        color: sector
            .color
            .clone()
            .unwrap_or_else(|| config.palette.sector_fallback.clone()),
        weight: config.sector_weight,
        fill_opacity: config.sector_fill_opacity,
        interactive: false,
        tooltip: sector.name.clone(),
    }
}

/// `"<site>\n<prefix>: 12 000 <suffix>"`, or just the site without capacity.
fn capacity_text(site: &str, capacity: Option<f64>, config: &RenderConfig) -> String {
    match capacity {
        Some(c) => format!(
            "{site}\n{}: {} {}",
            config.capacity_prefix,
            group_thousands(c.trunc() as i64),
            config.capacity_suffix
        ),
        None => site.to_string(),
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::config::FilterMode;
    use crate::records::TrajectoryRecord;
    use crate::selection::InteractionEvent;

    fn record(
        origin: &str,
        destination: &str,
        from: (f64, f64),
        to: (f64, f64),
        destination_capacity: Option<f64>,
    ) -> TrajectoryRecord {
        TrajectoryRecord {
            origin: origin.to_string(),
            destination: destination.to_string(),
            origin_capacity: Some(12_000.0),
            destination_capacity,
            quantity: 10.0.into(),
            unit: "t".to_string(),
            origin_position: LatLng::new(from.0, from.1),
            destination_position: LatLng::new(to.0, to.1),
        }
    }

    /// A and C ship to the treatment center T; A also ships to B.
    fn network() -> EdgeSet {
        aggregate(&[
            record("A", "T", (50.60, 5.50), (50.50, 5.80), Some(0.0)),
            record("C", "T", (50.70, 5.60), (50.50, 5.80), Some(0.0)),
            record("A", "B", (50.60, 5.50), (50.40, 5.40), Some(5_000.0)),
        ])
    }

    #[test]
    fn one_marker_per_distinct_position() {
        let edges = network();
        let state = SelectionState::new(9, 0.5);
        let tree = render(&edges, &[], &state, &RenderConfig::default());

        assert_eq!(tree.edges.len(), 3);
        // A, T, C, B
        assert_eq!(tree.markers.len(), 4);
        let keys: HashSet<String> = tree
            .markers
            .iter()
            .map(|m| position_key(&m.position, 6))
            .collect();
        assert_eq!(keys.len(), tree.markers.len());
    }

    #[test]
    fn first_edge_claims_shared_marker() {
        let edges = network();
        let state = SelectionState::new(9, 0.5);
        let tree = render(&edges, &[], &state, &RenderConfig::default());
        let t = tree
            .markers
            .iter()
            .find(|m| m.position == LatLng::new(50.50, 5.80))
            .unwrap();
        assert_eq!(t.site, "T");
        assert_eq!(t.endpoint, Endpoint::Destination);
        assert_eq!(tree.markers[0].site, "A");
    }

    #[test]
    fn markers_match_distinct_connected_endpoints_under_selection() {
        let edges = network();
        let config = RenderConfig::default();
        let mut state = SelectionState::new(9, 0.5);
        state.select("a");
        let tree = render(&edges, &[], &state, &config);

        let matcher = state.matcher(config.filter_mode);
        let expected: HashSet<String> = edges
            .iter()
            .filter(|e| matcher.is_connected(e))
            .flat_map(|e| [e.origin_position, e.destination_position])
            .map(|p| position_key(&p, config.coordinate_precision))
            .collect();
        assert_eq!(tree.edges.len(), 2);
        assert_eq!(tree.markers.len(), expected.len());
        assert!(tree.markers.iter().all(|m| m.site != "C"));
    }

    #[test]
    fn text_labels_gated_on_zoom() {
        let edges = network();
        let config = RenderConfig::default();
        let mut state = SelectionState::new(10, 0.5);

        let tree = render(&edges, &[], &state, &config);
        assert!(tree.markers.iter().all(|m| m.label.is_none()));
        assert!(tree.edges.iter().all(|e| e.label.is_none()));
        assert!(tree.legend.is_none());

        state.apply(InteractionEvent::ZoomChanged(11));
        let tree = render(&edges, &[], &state, &config);
        assert!(tree.markers.iter().all(|m| m.label.is_some()));
        assert!(tree.edges.iter().all(|e| e.label.is_some()));
        assert!(tree.legend.is_some());
    }

    #[test]
    fn thresholds_are_configurable() {
        let edges = network();
        let config = RenderConfig {
            min_zoom_for_text: 8,
            min_zoom_for_quantities: 14,
            ..RenderConfig::default()
        };
        let state = SelectionState::new(9, 0.5);
        let tree = render(&edges, &[], &state, &config);
        assert!(tree.markers.iter().all(|m| m.label.is_some()));
        assert!(tree.edges.iter().all(|e| e.label.is_none()));
    }

    #[test]
    fn treatment_center_is_square_with_fixed_style() {
        let edges = network();
        let config = RenderConfig::default();
        let state = SelectionState::new(12, 0.5);
        let tree = render(&edges, &[], &state, &config);

        let t = tree.markers.iter().find(|m| m.site == "T").unwrap();
        assert!(t.treatment_center);
        assert_eq!(t.shape, MarkerShape::Square);
        assert_eq!(t.radius, config.treatment_center_radius);
        assert_eq!(t.fill_color, "orange");
        let label = t.label.as_ref().unwrap();
        assert_eq!(label.text, "T\nCentre de traitement");
        assert_eq!(label.class_name, "treatment-center-tooltip");

        let b = tree.markers.iter().find(|m| m.site == "B").unwrap();
        assert!(!b.treatment_center);
        assert_eq!(b.shape, MarkerShape::Circle);
        assert_eq!(b.label.as_ref().unwrap().text, "B\nCapacité: 5 000 EH");
    }

    #[test]
    fn line_colors_follow_highlight() {
        let edges = network();
        let config = RenderConfig::default();
        let mut state = SelectionState::new(9, 0.5);
        state.select("T");
        let tree = render(&edges, &[], &state, &config);
        assert_eq!(tree.edges.len(), 2);
        assert!(tree.edges.iter().all(|e| e.color == "#008EB7"));

        state.select("A");
        let tree = render(&edges, &[], &state, &config);
        assert!(tree
            .edges
            .iter()
            .all(|e| e.highlight == HighlightClass::OriginMatch && e.color == "orange"));
        let a = tree.markers.iter().find(|m| m.site == "A").unwrap();
        assert_eq!(a.fill_color, "orange");
        assert_eq!(a.stroke_color, "#008EB7");
    }

    #[test]
    fn destination_only_mode_hides_outgoing_edges() {
        let edges = network();
        let config = RenderConfig {
            filter_mode: FilterMode::DestinationOnly,
            ..RenderConfig::default()
        };
        let mut state = SelectionState::new(9, 0.5);
        state.select("A");
        let tree = render(&edges, &[], &state, &config);
        assert!(tree.edges.is_empty());
        assert!(tree.markers.is_empty());
    }

    #[test]
    fn sectors_render_without_trajectories() {
        let sectors = vec![SectorRecord {
            name: "Ourthe".to_string(),
            color: None,
            polygon: vec![
                LatLng::new(50.0, 5.0),
                LatLng::new(50.1, 5.0),
                LatLng::new(50.1, 5.1),
            ],
        }];
        let state = SelectionState::new(9, 0.5);
        let tree = render(&EdgeSet::default(), &sectors, &state, &RenderConfig::default());
        assert!(tree.edges.is_empty());
        assert_eq!(tree.sectors.len(), 1);
        assert_eq!(tree.sectors[0].color, "blue");
        assert!(!tree.sectors[0].interactive);
        assert_eq!(tree.tile_opacity, 0.5);
    }

    #[test]
    fn tree_serializes_for_the_surface() {
        let edges = network();
        let mut state = SelectionState::new(11, 0.5);
        state.select("T");
        let json = render(&edges, &[], &state, &RenderConfig::default())
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["selected_site"], "T");
        assert_eq!(value["edges"][0]["highlight"], "destination_match");
        assert_eq!(value["edges"][0]["positions"][0][0], 50.6);
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1 000");
        assert_eq!(group_thousands(1234567), "1 234 567");
        assert_eq!(group_thousands(-45000), "-45 000");
    }
}
