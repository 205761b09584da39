//! Interactive selection state and the per-edge classification it drives.
//!
//! Site names in the datasets carry inconsistent casing and stray spaces, so
//! every comparison against the selection goes through [`normalize_site`].

use serde::Serialize;

use crate::aggregation::AggregatedEdge;
use crate::config::FilterMode;

/// Canonical form used whenever a site name is compared with a selection.
pub fn normalize_site(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Which site, if any, the user is focused on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Selection {
    #[default]
    Unselected,
    SiteSelected(String),
}

impl Selection {
    /// Build from free user input; blank input means no selection.
    pub fn from_input(name: &str) -> Self {
        if name.trim().is_empty() {
            Selection::Unselected
        } else {
            Selection::SiteSelected(name.to_string())
        }
    }

    pub fn site(&self) -> Option<&str> {
        match self {
            Selection::Unselected => None,
            Selection::SiteSelected(name) => Some(name),
        }
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::SiteSelected(_))
    }
}

/// Input events coming back from the map surface and the side panel.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    MarkerClicked(String),
    RowClicked(String),
    /// The dropdown value; an empty string is the "no site" entry.
    DropdownChanged(String),
    BackgroundClicked,
    Reset,
    ZoomChanged(i32),
    MapOpacityChanged(f64),
}

/// Everything the interaction layer owns. Passed by reference into every
/// derivation; nothing reads selection from anywhere else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    pub selection: Selection,
    pub zoom_level: i32,
    /// Opacity of the background tile layer.
    pub map_opacity: f64,
}

impl SelectionState {
    pub fn new(zoom_level: i32, map_opacity: f64) -> Self {
        Self {
            selection: Selection::Unselected,
            zoom_level,
            map_opacity: map_opacity.clamp(0.0, 1.0),
        }
    }

    pub fn select(&mut self, name: &str) {
        self.selection = Selection::from_input(name);
    }

    pub fn clear(&mut self) {
        self.selection = Selection::Unselected;
    }

    pub fn apply(&mut self, event: InteractionEvent) {
        match event {
            InteractionEvent::MarkerClicked(site)
            | InteractionEvent::RowClicked(site)
            | InteractionEvent::DropdownChanged(site) => self.select(&site),
            InteractionEvent::BackgroundClicked | InteractionEvent::Reset => self.clear(),
            InteractionEvent::ZoomChanged(zoom) => self.zoom_level = zoom,
            InteractionEvent::MapOpacityChanged(opacity) => {
                if opacity.is_finite() {
                    self.map_opacity = opacity.clamp(0.0, 1.0);
                }
            }
        }
    }

    pub fn matcher(&self, mode: FilterMode) -> SelectionMatcher {
        SelectionMatcher::new(&self.selection, mode)
    }
}

/// How an edge relates to the current selection, for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightClass {
    Neutral,
    DestinationMatch,
    OriginMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeClassification {
    pub connected: bool,
    pub highlight: HighlightClass,
}

/// A selection with its name normalized once, ready to test many edges.
#[derive(Debug, Clone)]
pub struct SelectionMatcher {
    selected: Option<String>,
    mode: FilterMode,
}

impl SelectionMatcher {
    pub fn new(selection: &Selection, mode: FilterMode) -> Self {
        let selected = selection
            .site()
            .map(normalize_site)
            .filter(|s| !s.is_empty());
        Self { selected, mode }
    }

    /// True when `name` denotes the selected site.
    pub fn matches(&self, name: &str) -> bool {
        self.selected
            .as_deref()
            .is_some_and(|selected| normalize_site(name) == selected)
    }

    pub fn classify(&self, edge: &AggregatedEdge) -> EdgeClassification {
        if self.selected.is_none() {
            return EdgeClassification {
                connected: true,
                highlight: HighlightClass::Neutral,
            };
        }

        let destination = self.matches(&edge.destination);
        let origin = self.matches(&edge.origin);

        match self.mode {
            FilterMode::SiteBased => EdgeClassification {
                connected: destination || origin,
                highlight: if destination {
                    HighlightClass::DestinationMatch
                } else if origin {
                    HighlightClass::OriginMatch
                } else {
                    HighlightClass::Neutral
                },
            },
            FilterMode::DestinationOnly => EdgeClassification {
                connected: destination,
                highlight: if destination {
                    HighlightClass::DestinationMatch
                } else {
                    HighlightClass::Neutral
                },
            },
        }
    }

    pub fn is_connected(&self, edge: &AggregatedEdge) -> bool {
        self.classify(edge).connected
    }

    pub fn highlight_class(&self, edge: &AggregatedEdge) -> HighlightClass {
        self.classify(edge).highlight
    }
}
