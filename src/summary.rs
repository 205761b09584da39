use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;

use crate::aggregation::{AggregatedEdge, EdgeSet};
use crate::error::FlowmapError;
use crate::schema::summary;
use crate::selection::{normalize_site, Selection};
use crate::site_graph::SiteGraph;

/// One row of the incoming or outgoing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRow {
    /// The other end: destination for outgoing rows, origin for incoming.
    pub site: String,
    pub quantity: f64,
    pub unit: String,
    pub distance_km: f64,
}

impl FlowRow {
    fn new(site: &str, edge: &AggregatedEdge) -> Self {
        Self {
            site: site.to_string(),
            quantity: edge.quantity,
            unit: edge.unit.clone(),
            distance_km: edge.distance_km(),
        }
    }
}

/// Flows into and out of the selected site.
///
/// Totals are kept per unit. Liquid sludge in m³ and dewatered sludge in t
/// are never added together.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SiteSummary {
    pub site: String,
    pub incoming: Vec<FlowRow>,
    pub outgoing: Vec<FlowRow>,
    pub total_incoming: BTreeMap<String, f64>,
    pub total_outgoing: BTreeMap<String, f64>,
}

/// Partition the edges touching the selected site.
///
/// Returns `None` without a selection. A selection naming no known site
/// yields an empty summary. An edge whose origin and destination both match
/// is listed once, as outgoing. `graph` is expected to come from `edges`;
/// adjacency that does not line up with `edges` is ignored.
pub fn summarize(edges: &EdgeSet, graph: &SiteGraph, selection: &Selection) -> Option<SiteSummary> {
    let site = selection.site()?;
    let selected = normalize_site(site);
    let all = edges.as_slice();

    let mut result = SiteSummary {
        site: site.to_string(),
        ..SiteSummary::default()
    };

    // Indices from a graph built over another edge set are skipped, not trusted.
    let outgoing = graph
        .outgoing(site)
        .into_iter()
        .filter_map(|i| all.get(i))
        .filter(|e| normalize_site(&e.origin) == selected);
    for edge in outgoing {
        result.outgoing.push(FlowRow::new(&edge.destination, edge));
        *result.total_outgoing.entry(edge.unit.clone()).or_insert(0.0) += edge.quantity;
    }

    let incoming = graph
        .incoming(site)
        .into_iter()
        .filter_map(|i| all.get(i))
        .filter(|e| normalize_site(&e.destination) == selected);
    for edge in incoming {
        if normalize_site(&edge.origin) == selected {
            continue;
        }
        result.incoming.push(FlowRow::new(&edge.origin, edge));
        *result.total_incoming.entry(edge.unit.clone()).or_insert(0.0) += edge.quantity;
    }

    Some(result)
}

impl SiteSummary {
    pub fn incoming_frame(&self) -> Result<DataFrame, FlowmapError> {
        rows_frame(&self.incoming)
    }

    pub fn outgoing_frame(&self) -> Result<DataFrame, FlowmapError> {
        rows_frame(&self.outgoing)
    }

    pub fn total_incoming_frame(&self) -> Result<DataFrame, FlowmapError> {
        totals_frame(&self.total_incoming)
    }

    pub fn total_outgoing_frame(&self) -> Result<DataFrame, FlowmapError> {
        totals_frame(&self.total_outgoing)
    }
}

fn rows_frame(rows: &[FlowRow]) -> Result<DataFrame, FlowmapError> {
    let sites: Vec<&str> = rows.iter().map(|r| r.site.as_str()).collect();
    let quantities: Vec<f64> = rows.iter().map(|r| r.quantity).collect();
    let units: Vec<&str> = rows.iter().map(|r| r.unit.as_str()).collect();
    let distances: Vec<f64> = rows.iter().map(|r| r.distance_km).collect();

    let df = DataFrame::new(vec![
        Column::new(summary::SITE.into(), &sites),
        Column::new(summary::QUANTITY.into(), &quantities),
        Column::new(summary::UNIT.into(), &units),
        Column::new(summary::DISTANCE_KM.into(), &distances),
    ])?;
    Ok(df)
}

fn totals_frame(totals: &BTreeMap<String, f64>) -> Result<DataFrame, FlowmapError> {
    let units: Vec<&str> = totals.keys().map(String::as_str).collect();
    let values: Vec<f64> = totals.values().copied().collect();

    let df = DataFrame::new(vec![
        Column::new(summary::UNIT.into(), &units),
        Column::new(summary::TOTAL.into(), &values),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::geometry::LatLng;
    use crate::records::TrajectoryRecord;
    use approx::assert_abs_diff_eq;

    fn record(origin: &str, destination: &str, quantity: f64, unit: &str) -> TrajectoryRecord {
        TrajectoryRecord {
            origin: origin.to_string(),
            destination: destination.to_string(),
            origin_capacity: None,
            destination_capacity: None,
            quantity: quantity.into(),
            unit: unit.to_string(),
            origin_position: LatLng::new(50.0, 5.0),
            destination_position: LatLng::new(50.0, 6.0),
        }
    }

    fn fixture() -> (EdgeSet, SiteGraph) {
        let edges = aggregate(&[
            record("A", "X", 12.0, "m³"),
            record("B", "X", 3.0, "t"),
            record("C", "x ", 8.0, "m³"),
            record("X", "Z", 5.0, "t"),
            record("Q", "R", 100.0, "t"),
        ]);
        let graph = SiteGraph::from_edges(&edges);
        (edges, graph)
    }

    #[test]
    fn unselected_has_no_summary() {
        let (edges, graph) = fixture();
        assert!(summarize(&edges, &graph, &Selection::Unselected).is_none());
    }

    #[test]
    fn partitions_by_direction_with_per_unit_totals() {
        let (edges, graph) = fixture();
        let s = summarize(&edges, &graph, &Selection::SiteSelected("x".to_string())).unwrap();

        let from: Vec<&str> = s.incoming.iter().map(|r| r.site.as_str()).collect();
        assert_eq!(from, ["A", "B", "C"]);
        assert_eq!(s.outgoing.len(), 1);
        assert_eq!(s.outgoing[0].site, "Z");

        assert_eq!(s.total_incoming.len(), 2);
        assert_eq!(s.total_incoming["m³"], 20.0);
        assert_eq!(s.total_incoming["t"], 3.0);
        assert_eq!(s.total_outgoing["t"], 5.0);
        assert!(!s.total_outgoing.contains_key("m³"));
    }

    #[test]
    fn rows_carry_edge_distance() {
        let (edges, graph) = fixture();
        let s = summarize(&edges, &graph, &Selection::SiteSelected("Z".to_string())).unwrap();
        // one degree of longitude at 50°N
        assert_abs_diff_eq!(s.incoming[0].distance_km, 71.5, epsilon = 0.1);
    }

    #[test]
    fn self_loop_counts_as_outgoing_only() {
        let edges = aggregate(&[record("A", "a", 4.0, "t"), record("B", "A", 1.0, "t")]);
        let graph = SiteGraph::from_edges(&edges);
        let s = summarize(&edges, &graph, &Selection::SiteSelected("A".to_string())).unwrap();

        assert_eq!(s.outgoing.len(), 1);
        assert_eq!(s.incoming.len(), 1);
        assert_eq!(s.incoming[0].site, "B");
        let listed: f64 = s.total_incoming.values().chain(s.total_outgoing.values()).sum();
        assert_eq!(listed, 5.0);
    }

    #[test]
    fn graph_from_other_edge_set_does_not_panic() {
        let big = aggregate(&[record("X", "A", 1.0, "t"), record("Y", "A", 2.0, "t")]);
        let small = aggregate(&[record("Q", "R", 3.0, "t")]);
        let graph = SiteGraph::from_edges(&big);

        let s = summarize(&small, &graph, &Selection::SiteSelected("A".to_string())).unwrap();
        assert!(s.incoming.is_empty());
        assert!(s.outgoing.is_empty());
        assert!(s.total_incoming.is_empty());
    }

    #[test]
    fn unknown_site_is_empty() {
        let (edges, graph) = fixture();
        let s = summarize(&edges, &graph, &Selection::SiteSelected("nowhere".to_string())).unwrap();
        assert!(s.incoming.is_empty() && s.outgoing.is_empty());
        assert!(s.total_incoming.is_empty());
    }

    #[test]
    fn frames_match_rows() {
        let (edges, graph) = fixture();
        let s = summarize(&edges, &graph, &Selection::SiteSelected("X".to_string())).unwrap();

        let incoming = s.incoming_frame().unwrap();
        assert_eq!(incoming.height(), 3);
        assert_eq!(
            incoming.get_column_names_str(),
            [summary::SITE, summary::QUANTITY, summary::UNIT, summary::DISTANCE_KM]
        );

        let totals = s.total_incoming_frame().unwrap();
        assert_eq!(totals.height(), 2);
        let values = totals.column(summary::TOTAL).unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(20.0));
        assert_eq!(s.outgoing_frame().unwrap().height(), 1);
        assert_eq!(s.total_outgoing_frame().unwrap().height(), 1);
    }
}
