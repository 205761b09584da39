use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use polars::prelude::*;
use serde::Serialize;

use crate::error::FlowmapError;
use crate::geometry::LatLng;
use crate::loader::Dataset;
use crate::records::{FieldParseIssue, TrajectoryRecord};
use crate::schema::{edge, trajectory};

/// Identity of an aggregated edge: the exact (origin, destination) pair.
///
/// No trimming or case folding happens here. `"A "` and `"A"` are different
/// origins for aggregation even though a selection matches both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub origin: String,
    pub destination: String,
}

impl EdgeKey {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

/// All shipments between one origin and one destination, merged.
///
/// Everything except `quantity` and `record_count` comes from the first
/// record seen for the key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEdge {
    pub origin: String,
    pub destination: String,
    pub origin_capacity: Option<f64>,
    pub destination_capacity: Option<f64>,
    pub quantity: f64,
    pub unit: String,
    pub origin_position: LatLng,
    pub destination_position: LatLng,
    pub record_count: usize,
}

impl AggregatedEdge {
    fn from_first(record: &TrajectoryRecord, quantity: f64) -> Self {
        Self {
            origin: record.origin.clone(),
            destination: record.destination.clone(),
            origin_capacity: record.origin_capacity,
            destination_capacity: record.destination_capacity,
            quantity,
            unit: record.unit.clone(),
            origin_position: record.origin_position,
            destination_position: record.destination_position,
            record_count: 1,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.origin.as_str(), self.destination.as_str())
    }

    /// Great-circle length of the edge in km, one decimal.
    pub fn distance_km(&self) -> f64 {
        self.origin_position.distance_km(&self.destination_position)
    }
}

/// The aggregated edges of one load cycle, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSet {
    edges: Vec<AggregatedEdge>,
    index: HashMap<EdgeKey, usize>,
    issues: Vec<FieldParseIssue>,
}

/// Merge trajectory records into one edge per (origin, destination) pair.
///
/// Quantities are coerced with comma-or-dot decimal parsing and summed with
/// Neumaier compensation, so a sum does not drift with record order. A
/// quantity that is missing or does not parse contributes zero and is
/// recorded in [`EdgeSet::issues`], with `row` being its index in `records`.
pub fn aggregate(records: &[TrajectoryRecord]) -> EdgeSet {
    let mut edges: Vec<AggregatedEdge> = Vec::new();
    // Running rounding error per edge, folded in once all records are seen.
    let mut compensation: Vec<f64> = Vec::new();
    let mut index: HashMap<EdgeKey, usize> = HashMap::new();
    let mut issues = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let quantity = match record.quantity.coerce() {
            Ok(Some(q)) => q,
            Ok(None) | Err(_) => {
                debug!(
                    "trajectories row {row}: quantity {:?} counted as zero",
                    record.quantity.raw()
                );
                issues.push(FieldParseIssue {
                    dataset: Dataset::Trajectories,
                    row,
                    field: trajectory::QUANTITY.to_string(),
                    raw: record.quantity.raw(),
                });
                0.0
            }
        };

        let key = EdgeKey::new(record.origin.as_str(), record.destination.as_str());
        match index.get(&key) {
            Some(&i) => {
                let edge = &mut edges[i];
                compensated_add(&mut edge.quantity, &mut compensation[i], quantity);
                edge.record_count += 1;
            }
            None => {
                index.insert(key, edges.len());
                edges.push(AggregatedEdge::from_first(record, quantity));
                compensation.push(0.0);
            }
        }
    }
    for (edge, c) in edges.iter_mut().zip(&compensation) {
        edge.quantity += c;
    }

    if !issues.is_empty() {
        warn!(
            "aggregation: {} quantities could not be parsed and count as zero",
            issues.len()
        );
    }
    debug!(
        "aggregation: {} records merged into {} edges",
        records.len(),
        edges.len()
    );

    EdgeSet {
        edges,
        index,
        issues,
    }
}

fn compensated_add(sum: &mut f64, compensation: &mut f64, value: f64) {
    let t = *sum + value;
    if sum.abs() >= value.abs() {
        *compensation += (*sum - t) + value;
    } else {
        *compensation += (value - t) + *sum;
    }
    *sum = t;
}

impl EdgeSet {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AggregatedEdge> {
        self.edges.iter()
    }

    pub fn as_slice(&self) -> &[AggregatedEdge] {
        &self.edges
    }

    pub fn get(&self, origin: &str, destination: &str) -> Option<&AggregatedEdge> {
        self.index
            .get(&EdgeKey::new(origin, destination))
            .map(|&i| &self.edges[i])
    }

    /// Quantities that failed coercion during aggregation.
    pub fn issues(&self) -> &[FieldParseIssue] {
        &self.issues
    }

    /// The edge table as a DataFrame, one row per edge in first-seen order.
    pub fn to_dataframe(&self) -> Result<DataFrame, FlowmapError> {
        let origins: Vec<String> = self.edges.iter().map(|e| e.origin.clone()).collect();
        let destinations: Vec<String> = self.edges.iter().map(|e| e.destination.clone()).collect();
        let quantities: Vec<f64> = self.edges.iter().map(|e| e.quantity).collect();
        let units: Vec<String> = self.edges.iter().map(|e| e.unit.clone()).collect();
        let counts: Vec<u64> = self.edges.iter().map(|e| e.record_count as u64).collect();
        let distances: Vec<f64> = self.edges.iter().map(AggregatedEdge::distance_km).collect();

        let df = DataFrame::new(vec![
            Column::new(edge::ORIGIN.into(), &origins),
            Column::new(edge::DESTINATION.into(), &destinations),
            Column::new(edge::QUANTITY.into(), &quantities),
            Column::new(edge::UNIT.into(), &units),
            Column::new(edge::RECORD_COUNT.into(), &counts),
            Column::new(edge::DISTANCE_KM.into(), &distances),
        ])?;
        Ok(df)
    }

    /// Write the edge table to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, separator: u8) -> Result<(), FlowmapError> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(separator)
            .finish(&mut df)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EdgeSet {
    type Item = &'a AggregatedEdge;
    type IntoIter = std::slice::Iter<'a, AggregatedEdge>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}
