//! Dataset loading: JSON arrays for trajectories and sectors, and CSV exports
//! of the trajectory table.
//!
//! Loaders never fail on a bad field. They fail only when the file itself
//! cannot be read or parsed, and report that as [`FlowmapError::DataLoad`].

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FlowmapError;
use crate::numeric::NumericField;
use crate::records::{FieldParseIssue, RawSector, RawTrajectory, SectorRecord, TrajectoryRecord};
use crate::schema::trajectory;

/// The two independently loaded datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Trajectories,
    Sectors,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Trajectories => write!(f, "trajectories"),
            Dataset::Sectors => write!(f, "sectors"),
        }
    }
}

/// Records that survived validation plus every field that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub issues: Vec<FieldParseIssue>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    /// The records, or the first field failure as a [`FlowmapError::FieldParse`].
    pub fn into_strict(self) -> Result<Vec<T>, FlowmapError> {
        match self.issues.into_iter().next() {
            Some(issue) => Err(issue.into()),
            None => Ok(self.records),
        }
    }
}

// ── Trajectories ────────────────────────────────────────────────────────────

pub fn parse_trajectories_json(json: &str) -> Result<Loaded<TrajectoryRecord>, FlowmapError> {
    let raw: Vec<RawTrajectory> = serde_json::from_str(json)
        .map_err(|e| FlowmapError::load(Dataset::Trajectories, e))?;
    Ok(validate_trajectories(raw))
}

pub fn read_trajectories_json<P: AsRef<Path>>(
    path: P,
) -> Result<Loaded<TrajectoryRecord>, FlowmapError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| {
        FlowmapError::load(Dataset::Trajectories, format!("{}: {e}", path.display()))
    })?;
    parse_trajectories_json(&json)
}

/// Load a trajectory table exported as CSV.
///
/// Every column is read as text so comma decimals survive untouched.
/// Column names are trimmed. All fields of [`trajectory::REQUIRED`] must exist.
pub fn read_trajectories_csv<P: AsRef<Path>>(
    path: P,
    separator: u8,
) -> Result<Loaded<TrajectoryRecord>, FlowmapError> {
    let df = read_csv_as_strings(path.as_ref(), separator)
        .map_err(|e| FlowmapError::load(Dataset::Trajectories, e))?;
    require_columns(&df, &trajectory::REQUIRED)?;

    let origin = df.column(trajectory::ORIGIN)?.str()?;
    let destination = df.column(trajectory::DESTINATION)?.str()?;
    let origin_capacity = df.column(trajectory::ORIGIN_CAPACITY)?.str()?;
    let destination_capacity = df.column(trajectory::DESTINATION_CAPACITY)?.str()?;
    let quantity = df.column(trajectory::QUANTITY)?.str()?;
    let unit = df.column(trajectory::UNIT)?.str()?;
    let origin_lat = df.column(trajectory::ORIGIN_LAT)?.str()?;
    let origin_lon = df.column(trajectory::ORIGIN_LON)?.str()?;
    let destination_lat = df.column(trajectory::DESTINATION_LAT)?.str()?;
    let destination_lon = df.column(trajectory::DESTINATION_LON)?.str()?;

    let numeric = |col: &StringChunked, i: usize| {
        col.get(i)
            .map(NumericField::from)
            .unwrap_or(NumericField::Missing)
    };
    let text = |col: &StringChunked, i: usize| col.get(i).unwrap_or("").to_string();

    let raw: Vec<RawTrajectory> = (0..df.height())
        .map(|i| RawTrajectory {
            origin: text(origin, i),
            destination: text(destination, i),
            origin_capacity: numeric(origin_capacity, i),
            destination_capacity: numeric(destination_capacity, i),
            quantity: numeric(quantity, i),
            unit: text(unit, i),
            origin_lat: numeric(origin_lat, i),
            origin_lon: numeric(origin_lon, i),
            destination_lat: numeric(destination_lat, i),
            destination_lon: numeric(destination_lon, i),
        })
        .collect();

    Ok(validate_trajectories(raw))
}

fn validate_trajectories(raw: Vec<RawTrajectory>) -> Loaded<TrajectoryRecord> {
    let total = raw.len();
    let mut issues = Vec::new();
    let records: Vec<TrajectoryRecord> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(row, r)| r.into_record(row, &mut issues))
        .collect();

    report(Dataset::Trajectories, total, records.len(), &issues);
    Loaded { records, issues }
}

// ── Sectors ─────────────────────────────────────────────────────────────────

pub fn parse_sectors_json(json: &str) -> Result<Loaded<SectorRecord>, FlowmapError> {
    let raw: Vec<RawSector> =
        serde_json::from_str(json).map_err(|e| FlowmapError::load(Dataset::Sectors, e))?;

    let total = raw.len();
    let mut issues = Vec::new();
    let records: Vec<SectorRecord> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(row, r)| r.into_record(row, &mut issues))
        .collect();

    report(Dataset::Sectors, total, records.len(), &issues);
    Ok(Loaded { records, issues })
}

pub fn read_sectors_json<P: AsRef<Path>>(path: P) -> Result<Loaded<SectorRecord>, FlowmapError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .map_err(|e| FlowmapError::load(Dataset::Sectors, format!("{}: {e}", path.display())))?;
    parse_sectors_json(&json)
}

// ── Private helpers ─────────────────────────────────────────────────────────

fn report(dataset: Dataset, total: usize, kept: usize, issues: &[FieldParseIssue]) {
    for issue in issues {
        debug!("{}", FlowmapError::from(issue.clone()));
    }
    if !issues.is_empty() {
        warn!(
            "{dataset}: {} field parse failures, {} of {total} records skipped",
            issues.len(),
            total - kept
        );
    }
    info!("{dataset}: loaded {kept} records");
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace and a leading byte-order mark from column names.
fn read_csv_as_strings(path: &Path, separator: u8) -> Result<DataFrame, FlowmapError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .map_parse_options(|opts| opts.with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), FlowmapError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(FlowmapError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRAJECTORIES: &str = r#"[
        {"ORIGINE": "A", "DESTINATION": "B", "ORIGINE_CAPACITE": "1500",
         "DESTINATION_CAPACITE": "0", "QUANTITE": "10", "UNITE": "t",
         "LAT01": "50,61", "LONG01": "5,57", "LAT02": "50,59", "LONG02": "5,86"},
        {"ORIGINE": "C", "DESTINATION": "B", "ORIGINE_CAPACITE": 800,
         "DESTINATION_CAPACITE": 0, "QUANTITE": 4.5, "UNITE": "m³",
         "LAT01": 50.5, "LONG01": 5.4, "LAT02": 50.59, "LONG02": 5.86},
        {"ORIGINE": "D", "DESTINATION": "B", "QUANTITE": "3", "UNITE": "t",
         "LAT01": "nord", "LONG01": "5,4", "LAT02": "50,59", "LONG02": "5,86"}
    ]"#;

    #[test]
    fn json_trajectories_accept_numbers_and_comma_strings() {
        let loaded = parse_trajectories_json(TRAJECTORIES).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1].origin_capacity, Some(800.0));
        assert_eq!(loaded.issues.len(), 1);
        assert_eq!(loaded.issues[0].row, 2);
        assert_eq!(loaded.issues[0].field, trajectory::ORIGIN_LAT);
    }

    #[test]
    fn strict_load_surfaces_first_field_failure() {
        let err = parse_trajectories_json(TRAJECTORIES)
            .unwrap()
            .into_strict()
            .unwrap_err();
        match err {
            FlowmapError::FieldParse {
                dataset, row, field, ..
            } => {
                assert_eq!(dataset, Dataset::Trajectories);
                assert_eq!(row, 2);
                assert_eq!(field, trajectory::ORIGIN_LAT);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let clean = r#"[{"ORIGINE": "A", "DESTINATION": "B", "QUANTITE": "1", "UNITE": "t",
            "LAT01": "50,61", "LONG01": "5,57", "LAT02": "50,59", "LONG02": "5,86"}]"#;
        let records = parse_trajectories_json(clean).unwrap().into_strict().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn malformed_json_is_a_load_failure() {
        let err = parse_trajectories_json("{not json").unwrap_err();
        assert!(matches!(
            err,
            FlowmapError::DataLoad {
                dataset: Dataset::Trajectories,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        let err = read_sectors_json("/definitely/not/here.json").unwrap_err();
        assert!(matches!(
            err,
            FlowmapError::DataLoad {
                dataset: Dataset::Sectors,
                ..
            }
        ));
    }

    #[test]
    fn sectors_parse_comma_decimal_polygons() {
        let json = r##"[
            {"secteur": "Ourthe", "color": "#ff0000",
             "polygone": [["50,1", "5,1"], [50.2, 5.2], ["50,3", 5.3]]},
            {"secteur": "Vide", "color": "", "polygone": []}
        ]"##;
        let loaded = parse_sectors_json(json).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].name, "Ourthe");
        assert_eq!(loaded.records[0].polygon.len(), 3);
        assert_eq!(loaded.issues.len(), 1);
    }

    #[test]
    fn csv_trajectories_keep_comma_decimals() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ORIGINE;DESTINATION;ORIGINE_CAPACITE;DESTINATION_CAPACITE;QUANTITE;UNITE;LAT01;LONG01;LAT02;LONG02 "
        )
        .unwrap();
        writeln!(file, "A;B;1500;0;5,5;t;50,61;5,57;50,59;5,86").unwrap();
        writeln!(file, "A;B;1500;0;10;t;50,61;5,57;50,59;5,86").unwrap();
        file.flush().unwrap();

        let loaded = read_trajectories_csv(file.path(), b';').unwrap();
        assert!(loaded.issues.is_empty());
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].quantity, NumericField::from("5,5"));
        assert_eq!(loaded.records[0].destination_position.lng, 5.86);
    }

    #[test]
    fn csv_without_required_column_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ORIGINE;DESTINATION\nA;B").unwrap();
        file.flush().unwrap();

        let err = read_trajectories_csv(file.path(), b';').unwrap_err();
        assert!(matches!(err, FlowmapError::MissingColumn(_)));
    }
}
