#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

use crate::loader::Dataset;

#[derive(Error, Debug)]
pub enum FlowmapError {
    #[error("Failed to load {dataset}: {reason}")]
    DataLoad { dataset: Dataset, reason: String },

    #[error("Unparsable {field} in {dataset} row {row}: {raw:?}")]
    FieldParse {
        dataset: Dataset,
        row: usize,
        field: String,
        raw: String,
    },

    #[error("Selected site no longer exists: {0}")]
    UnmatchedSelection(String),

    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowmapError {
    pub(crate) fn load(dataset: Dataset, reason: impl ToString) -> Self {
        FlowmapError::DataLoad {
            dataset,
            reason: reason.to_string(),
        }
    }
}

#[cfg(feature = "python")]
impl From<FlowmapError> for PyErr {
    fn from(err: FlowmapError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}
