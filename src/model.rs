use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use polars::prelude::DataFrame;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregation::{aggregate, EdgeSet};
use crate::config::RenderConfig;
use crate::error::FlowmapError;
use crate::loader::{self, Dataset, Loaded};
use crate::records::{SectorRecord, TrajectoryRecord};
use crate::render::{self, RenderTree};
use crate::selection::{InteractionEvent, SelectionState};
use crate::site_graph::SiteGraph;
use crate::summary::{self, SiteSummary};

// ── Load lifecycle ──────────────────────────────────────────────────────────

/// Handed out by [`FlowMapModel::begin_load`] and given back on completion.
///
/// A ticket is only honoured by the view that issued it, and only while no
/// newer load of the same dataset has been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadTicket {
    view: Uuid,
    dataset: Dataset,
    generation: u64,
}

impl LoadTicket {
    pub fn view(&self) -> Uuid {
        self.view
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub dataset: Dataset,
    pub records: usize,
    /// Field-level failures, including quantities counted as zero.
    pub issues: usize,
    /// Set when the load removed the selected site.
    pub dropped_selection: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The view was disposed before the load finished.
    Disposed,
    /// A newer load of the same dataset was started.
    Stale,
    /// The ticket belongs to another view.
    ForeignTicket,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Applied(LoadReport),
    /// The load failed; the dataset is now empty.
    Degraded(FlowmapError),
    Ignored(IgnoreReason),
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied(_))
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────────────

/// Counters for everything that went wrong without stopping the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub trajectory_field_failures: usize,
    pub sector_field_failures: usize,
    pub quantity_failures: usize,
    pub degraded_loads: usize,
    pub last_load_failure: Option<String>,
    pub dropped_selections: usize,
}

// ── Model ───────────────────────────────────────────────────────────────────

/// One flow map view: the two datasets, everything derived from them and
/// the interaction state.
///
/// Either dataset may be absent. Every query answers from whatever is loaded.
#[derive(Debug)]
pub struct FlowMapModel {
    view_id: Uuid,
    config: RenderConfig,
    disposed: bool,
    generations: HashMap<Dataset, u64>,
    trajectories: Option<Vec<TrajectoryRecord>>,
    sectors: Option<Vec<SectorRecord>>,
    edges: EdgeSet,
    graph: SiteGraph,
    state: SelectionState,
    diagnostics: Diagnostics,
}

impl Default for FlowMapModel {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl FlowMapModel {
    pub fn new(config: RenderConfig) -> Self {
        let state = SelectionState::new(config.initial_zoom, config.map_opacity);
        Self {
            view_id: Uuid::new_v4(),
            config,
            disposed: false,
            generations: HashMap::new(),
            trajectories: None,
            sectors: None,
            edges: EdgeSet::default(),
            graph: SiteGraph::default(),
            state,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn view_id(&self) -> Uuid {
        self.view_id
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_loaded(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Trajectories => self.trajectories.is_some(),
            Dataset::Sectors => self.sectors.is_some(),
        }
    }

    /// Tear the view down. Loads still in flight become no-ops.
    pub fn dispose(&mut self) {
        debug!("view {}: disposed", self.view_id);
        self.disposed = true;
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Start a load of `dataset`, superseding any load of it still in flight.
    pub fn begin_load(&mut self, dataset: Dataset) -> LoadTicket {
        let generation = self.generations.entry(dataset).or_insert(0);
        *generation += 1;
        LoadTicket {
            view: self.view_id,
            dataset,
            generation: *generation,
        }
    }

    pub fn finish_trajectories(
        &mut self,
        ticket: LoadTicket,
        result: Result<Loaded<TrajectoryRecord>, FlowmapError>,
    ) -> LoadOutcome {
        if let Some(reason) = self.check_ticket(&ticket, Dataset::Trajectories) {
            return LoadOutcome::Ignored(reason);
        }

        let (loaded, failure) = match result {
            Ok(loaded) => (loaded, None),
            Err(err) => (Loaded::default(), Some(err)),
        };

        self.edges = aggregate(&loaded.records);
        self.graph = SiteGraph::from_edges(&self.edges);
        self.diagnostics.trajectory_field_failures = loaded.issues.len();
        self.diagnostics.quantity_failures = self.edges.issues().len();
        let records = loaded.records.len();
        self.trajectories = Some(loaded.records);

        let dropped_selection = self.reconcile_selection();

        match failure {
            Some(err) => LoadOutcome::Degraded(self.degrade(err)),
            None => {
                info!(
                    "view {}: {} trajectories aggregated into {} edges over {} sites",
                    self.view_id,
                    records,
                    self.edges.len(),
                    self.graph.site_count()
                );
                LoadOutcome::Applied(LoadReport {
                    dataset: Dataset::Trajectories,
                    records,
                    issues: loaded.issues.len() + self.edges.issues().len(),
                    dropped_selection,
                })
            }
        }
    }

    pub fn finish_sectors(
        &mut self,
        ticket: LoadTicket,
        result: Result<Loaded<SectorRecord>, FlowmapError>,
    ) -> LoadOutcome {
        if let Some(reason) = self.check_ticket(&ticket, Dataset::Sectors) {
            return LoadOutcome::Ignored(reason);
        }

        match result {
            Ok(loaded) => {
                let report = LoadReport {
                    dataset: Dataset::Sectors,
                    records: loaded.records.len(),
                    issues: loaded.issues.len(),
                    dropped_selection: None,
                };
                self.diagnostics.sector_field_failures = loaded.issues.len();
                self.sectors = Some(loaded.records);
                info!("view {}: {} sectors loaded", self.view_id, report.records);
                LoadOutcome::Applied(report)
            }
            Err(err) => {
                self.diagnostics.sector_field_failures = 0;
                self.sectors = Some(Vec::new());
                LoadOutcome::Degraded(self.degrade(err))
            }
        }
    }

    /// Load trajectories from a `.csv` (`;` separated) or JSON file.
    pub fn load_trajectories_file<P: AsRef<Path>>(&mut self, path: P) -> LoadOutcome {
        let path = path.as_ref();
        let ticket = self.begin_load(Dataset::Trajectories);
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let result = if is_csv {
            loader::read_trajectories_csv(path, b';')
        } else {
            loader::read_trajectories_json(path)
        };
        self.finish_trajectories(ticket, result)
    }

    pub fn load_sectors_file<P: AsRef<Path>>(&mut self, path: P) -> LoadOutcome {
        let ticket = self.begin_load(Dataset::Sectors);
        let result = loader::read_sectors_json(path);
        self.finish_sectors(ticket, result)
    }

    // ── Interaction ─────────────────────────────────────────────────────────

    pub fn apply(&mut self, event: InteractionEvent) {
        if self.disposed {
            return;
        }
        self.state.apply(event);
    }

    // ── Derived views ───────────────────────────────────────────────────────

    pub fn render(&self) -> RenderTree {
        render::render(
            &self.edges,
            self.sectors.as_deref().unwrap_or_default(),
            &self.state,
            &self.config,
        )
    }

    pub fn render_json(&self) -> Result<String, FlowmapError> {
        Ok(self.render().to_json()?)
    }

    /// Incoming and outgoing flows of the selected site.
    pub fn summary(&self) -> Option<SiteSummary> {
        summary::summarize(&self.edges, &self.graph, &self.state.selection)
    }

    /// Dropdown entries for the configured filter mode.
    pub fn sites(&self) -> Vec<String> {
        self.graph.selectable_sites(self.config.filter_mode)
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    pub fn sectors(&self) -> &[SectorRecord] {
        self.sectors.as_deref().unwrap_or_default()
    }

    pub fn edges_frame(&self) -> Result<DataFrame, FlowmapError> {
        self.require(Dataset::Trajectories)?;
        self.edges.to_dataframe()
    }

    pub fn write_edges_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), FlowmapError> {
        self.require(Dataset::Trajectories)?;
        self.edges.write_csv(path, b';')
    }

    // ── Private helpers ─────────────────────────────────────────────────────

    fn check_ticket(&self, ticket: &LoadTicket, dataset: Dataset) -> Option<IgnoreReason> {
        let reason = if self.disposed {
            IgnoreReason::Disposed
        } else if ticket.view != self.view_id || ticket.dataset != dataset {
            IgnoreReason::ForeignTicket
        } else if self.generations.get(&dataset) != Some(&ticket.generation) {
            IgnoreReason::Stale
        } else {
            return None;
        };
        debug!(
            "view {}: {} load ignored ({reason:?})",
            self.view_id, ticket.dataset
        );
        Some(reason)
    }

    fn degrade(&mut self, err: FlowmapError) -> FlowmapError {
        warn!("view {}: {err}; continuing with an empty layer", self.view_id);
        self.diagnostics.degraded_loads += 1;
        self.diagnostics.last_load_failure = Some(err.to_string());
        err
    }

    /// Drop a selection that names no site of the freshly loaded data.
    fn reconcile_selection(&mut self) -> Option<String> {
        let site = self.state.selection.site()?;
        if self.graph.is_selectable(site, self.config.filter_mode) {
            return None;
        }
        let site = site.to_string();
        warn!("view {}: {}", self.view_id, FlowmapError::UnmatchedSelection(site.clone()));
        self.state.clear();
        self.diagnostics.dropped_selections += 1;
        Some(site)
    }

    fn require(&self, dataset: Dataset) -> Result<(), FlowmapError> {
        if self.is_loaded(dataset) {
            Ok(())
        } else {
            Err(FlowmapError::NotLoaded(dataset.to_string()))
        }
    }
}
