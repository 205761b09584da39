use serde::{Deserialize, Serialize};

use crate::error::FlowmapError;
use crate::geometry::LatLng;
use crate::loader::Dataset;
use crate::numeric::NumericField;
use crate::schema::{sector, trajectory};

/// One raw shipment between two sites, as loaded.
///
/// Names are kept exactly as given; matching against a selection normalizes
/// them later. The quantity stays raw until aggregation coerces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryRecord {
    pub origin: String,
    pub destination: String,
    pub origin_capacity: Option<f64>,
    pub destination_capacity: Option<f64>,
    pub quantity: NumericField,
    pub unit: String,
    pub origin_position: LatLng,
    pub destination_position: LatLng,
}

/// A background sector polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorRecord {
    pub name: String,
    pub color: Option<String>,
    pub polygon: Vec<LatLng>,
}

/// A field that failed numeric coercion or validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldParseIssue {
    pub dataset: Dataset,
    /// Zero-based position of the record in its source file.
    pub row: usize,
    pub field: String,
    pub raw: String,
}

impl From<FieldParseIssue> for FlowmapError {
    fn from(issue: FieldParseIssue) -> Self {
        FlowmapError::FieldParse {
            dataset: issue.dataset,
            row: issue.row,
            field: issue.field,
            raw: issue.raw,
        }
    }
}

// ── Raw shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawTrajectory {
    #[serde(rename = "ORIGINE", default)]
    pub origin: String,
    #[serde(rename = "DESTINATION", default)]
    pub destination: String,
    #[serde(rename = "ORIGINE_CAPACITE", default)]
    pub origin_capacity: NumericField,
    #[serde(rename = "DESTINATION_CAPACITE", default)]
    pub destination_capacity: NumericField,
    #[serde(rename = "QUANTITE", default)]
    pub quantity: NumericField,
    #[serde(rename = "UNITE", default)]
    pub unit: String,
    #[serde(rename = "LAT01", default)]
    pub origin_lat: NumericField,
    #[serde(rename = "LONG01", default)]
    pub origin_lon: NumericField,
    #[serde(rename = "LAT02", default)]
    pub destination_lat: NumericField,
    #[serde(rename = "LONG02", default)]
    pub destination_lon: NumericField,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawSector {
    #[serde(rename = "secteur", default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(rename = "polygone", default)]
    pub polygon: Vec<Vec<NumericField>>,
}

impl RawTrajectory {
    /// Validate into a record.
    ///
    /// Records without both names or without four usable coordinates cannot
    /// be placed on the map and are skipped. An unparsable capacity is
    /// treated as absent. Every problem is appended to `issues`.
    pub(crate) fn into_record(
        self,
        row: usize,
        issues: &mut Vec<FieldParseIssue>,
    ) -> Option<TrajectoryRecord> {
        let issue = |field: &str, raw: String| FieldParseIssue {
            dataset: Dataset::Trajectories,
            row,
            field: field.to_string(),
            raw,
        };
        let mut usable = true;

        for (field, name) in [
            (trajectory::ORIGIN, &self.origin),
            (trajectory::DESTINATION, &self.destination),
        ] {
            if name.trim().is_empty() {
                issues.push(issue(field, name.clone()));
                usable = false;
            }
        }

        let mut coordinate = |field: &str, value: &NumericField| match value.coerce() {
            Ok(Some(v)) => Some(v),
            Ok(None) | Err(_) => {
                issues.push(issue(field, value.raw()));
                None
            }
        };
        let origin_lat = coordinate(trajectory::ORIGIN_LAT, &self.origin_lat);
        let origin_lon = coordinate(trajectory::ORIGIN_LON, &self.origin_lon);
        let destination_lat = coordinate(trajectory::DESTINATION_LAT, &self.destination_lat);
        let destination_lon = coordinate(trajectory::DESTINATION_LON, &self.destination_lon);

        let mut capacity = |field: &str, value: &NumericField| match value.coerce() {
            Ok(v) => v,
            Err(raw) => {
                issues.push(issue(field, raw));
                None
            }
        };
        let origin_capacity = capacity(trajectory::ORIGIN_CAPACITY, &self.origin_capacity);
        let destination_capacity =
            capacity(trajectory::DESTINATION_CAPACITY, &self.destination_capacity);

        let (
            Some(origin_lat),
            Some(origin_lon),
            Some(destination_lat),
            Some(destination_lon),
        ) = (origin_lat, origin_lon, destination_lat, destination_lon)
        else {
            return None;
        };

        for (field, value, bound) in [
            (trajectory::ORIGIN_LAT, origin_lat, 90.0),
            (trajectory::ORIGIN_LON, origin_lon, 180.0),
            (trajectory::DESTINATION_LAT, destination_lat, 90.0),
            (trajectory::DESTINATION_LON, destination_lon, 180.0),
        ] {
            if !(-bound..=bound).contains(&value) {
                issues.push(issue(field, value.to_string()));
                usable = false;
            }
        }
        let origin_position = LatLng::new(origin_lat, origin_lon);
        let destination_position = LatLng::new(destination_lat, destination_lon);

        if !usable {
            return None;
        }

        Some(TrajectoryRecord {
            origin: self.origin,
            destination: self.destination,
            origin_capacity,
            destination_capacity,
            quantity: self.quantity,
            unit: self.unit,
            origin_position,
            destination_position,
        })
    }
}

impl RawSector {
    /// Validate into a sector, dropping unusable vertices.
    ///
    /// A sector left with fewer than three vertices is skipped.
    pub(crate) fn into_record(
        self,
        row: usize,
        issues: &mut Vec<FieldParseIssue>,
    ) -> Option<SectorRecord> {
        let issue = |raw: String| FieldParseIssue {
            dataset: Dataset::Sectors,
            row,
            field: sector::POLYGON.to_string(),
            raw,
        };

        let mut polygon = Vec::with_capacity(self.polygon.len());
        for vertex in &self.polygon {
            let point = match vertex.as_slice() {
                [lat, lng] => match (lat.coerce(), lng.coerce()) {
                    (Ok(Some(lat)), Ok(Some(lng))) => Some(LatLng::new(lat, lng)),
                    _ => None,
                },
                _ => None,
            };
            match point.filter(LatLng::is_valid) {
                Some(p) => polygon.push(p),
                None => {
                    let raw: Vec<String> = vertex.iter().map(NumericField::raw).collect();
                    issues.push(issue(format!("[{}]", raw.join(", "))));
                }
            }
        }

        if polygon.len() < 3 {
            issues.push(issue(format!(
                "{} usable vertices in sector {:?}",
                polygon.len(),
                self.name
            )));
            return None;
        }

        let color = self.color.filter(|c| !c.trim().is_empty());
        Some(SectorRecord {
            name: self.name,
            color,
            polygon,
        })
    }
}
