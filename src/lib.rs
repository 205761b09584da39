//! Sludge transport flow map engine.
//!
//! Aggregates origin→destination shipment records into edges, tracks the
//! selected site and zoom level, and derives the map primitives and per-site
//! flow summaries a map surface needs. See [`FlowMapModel`] for the entry
//! point.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod model;
pub mod numeric;
pub mod records;
pub mod render;
pub mod schema;
pub mod selection;
pub mod site_graph;
pub mod summary;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{aggregate, AggregatedEdge, EdgeKey, EdgeSet};
pub use config::{FilterMode, RenderConfig};
pub use error::FlowmapError;
pub use geometry::{haversine_distance_km, radius_for_capacity, LatLng};
pub use loader::{Dataset, Loaded};
pub use model::{FlowMapModel, LoadOutcome, LoadTicket};
pub use records::{SectorRecord, TrajectoryRecord};
pub use render::{render, RenderTree};
pub use selection::{InteractionEvent, Selection, SelectionState};
pub use summary::{summarize, SiteSummary};
