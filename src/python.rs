use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::config::RenderConfig;
use crate::error::FlowmapError;
use crate::model::FlowMapModel;
use crate::schema;
use crate::selection::InteractionEvent;
use crate::summary::SiteSummary;

#[pyclass(name = "FlowMap")]
pub struct PyFlowMap {
    model: FlowMapModel,
}

#[pymethods]
impl PyFlowMap {
    /// Create a view, optionally from a JSON render config.
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => RenderConfig::from_json_str(json)?,
            None => RenderConfig::default(),
        };
        Ok(Self {
            model: FlowMapModel::new(config),
        })
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the trajectory table from JSON or `;` separated CSV.
    ///
    /// Returns False when the file could not be read; the layer is then empty.
    fn load_trajectories(&mut self, path: &str) -> bool {
        self.model.load_trajectories_file(path).is_applied()
    }

    fn load_sectors(&mut self, path: &str) -> bool {
        self.model.load_sectors_file(path).is_applied()
    }

    fn dispose(&mut self) {
        self.model.dispose();
    }

    // ── Interaction ─────────────────────────────────────────────────────────

    fn select(&mut self, site: &str) {
        self.model
            .apply(InteractionEvent::DropdownChanged(site.to_string()));
    }

    fn clear(&mut self) {
        self.model.apply(InteractionEvent::Reset);
    }

    fn set_zoom(&mut self, zoom: i32) {
        self.model.apply(InteractionEvent::ZoomChanged(zoom));
    }

    fn set_map_opacity(&mut self, opacity: f64) {
        self.model.apply(InteractionEvent::MapOpacityChanged(opacity));
    }

    #[getter]
    fn selected_site(&self) -> Option<String> {
        self.model.state().selection.site().map(str::to_string)
    }

    // ── Derived views ───────────────────────────────────────────────────────

    fn sites(&self) -> Vec<String> {
        self.model.sites()
    }

    /// The render tree as JSON for the map surface.
    fn render_json(&self) -> PyResult<String> {
        Ok(self.model.render_json()?)
    }

    fn diagnostics_json(&self) -> PyResult<String> {
        let json = serde_json::to_string(self.model.diagnostics()).map_err(FlowmapError::from)?;
        Ok(json)
    }

    fn edges(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.model.edges_frame()?))
    }

    fn write_edges_csv(&self, path: &str) -> PyResult<()> {
        Ok(self.model.write_edges_csv(path)?)
    }

    /// Flows into the selected site, or None without a selection.
    fn incoming(&self) -> PyResult<Option<PyDataFrame>> {
        self.summary_frame(SiteSummary::incoming_frame)
    }

    fn outgoing(&self) -> PyResult<Option<PyDataFrame>> {
        self.summary_frame(SiteSummary::outgoing_frame)
    }

    fn total_incoming(&self) -> PyResult<Option<PyDataFrame>> {
        self.summary_frame(SiteSummary::total_incoming_frame)
    }

    fn total_outgoing(&self) -> PyResult<Option<PyDataFrame>> {
        self.summary_frame(SiteSummary::total_outgoing_frame)
    }
}

impl PyFlowMap {
    fn summary_frame(
        &self,
        frame: fn(&SiteSummary) -> Result<polars::prelude::DataFrame, FlowmapError>,
    ) -> PyResult<Option<PyDataFrame>> {
        match self.model.summary() {
            Some(summary) => Ok(Some(PyDataFrame(frame(&summary)?))),
            None => Ok(None),
        }
    }
}

/// Export column names as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let trajectory = PyModule::new(m.py(), "trajectory")?;
    trajectory.add("ORIGIN", schema::trajectory::ORIGIN)?;
    trajectory.add("DESTINATION", schema::trajectory::DESTINATION)?;
    trajectory.add("ORIGIN_CAPACITY", schema::trajectory::ORIGIN_CAPACITY)?;
    trajectory.add(
        "DESTINATION_CAPACITY",
        schema::trajectory::DESTINATION_CAPACITY,
    )?;
    trajectory.add("QUANTITY", schema::trajectory::QUANTITY)?;
    trajectory.add("UNIT", schema::trajectory::UNIT)?;
    m.add_submodule(&trajectory)?;

    let edge = PyModule::new(m.py(), "edge")?;
    edge.add("ORIGIN", schema::edge::ORIGIN)?;
    edge.add("DESTINATION", schema::edge::DESTINATION)?;
    edge.add("QUANTITY", schema::edge::QUANTITY)?;
    edge.add("UNIT", schema::edge::UNIT)?;
    edge.add("RECORD_COUNT", schema::edge::RECORD_COUNT)?;
    edge.add("DISTANCE_KM", schema::edge::DISTANCE_KM)?;
    m.add_submodule(&edge)?;

    let summary = PyModule::new(m.py(), "summary")?;
    summary.add("SITE", schema::summary::SITE)?;
    summary.add("QUANTITY", schema::summary::QUANTITY)?;
    summary.add("UNIT", schema::summary::UNIT)?;
    summary.add("DISTANCE_KM", schema::summary::DISTANCE_KM)?;
    summary.add("TOTAL", schema::summary::TOTAL)?;
    m.add_submodule(&summary)?;

    Ok(())
}

#[pymodule]
fn sludge_flowmap(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFlowMap>()?;
    add_schema_exports(m)?;
    Ok(())
}
