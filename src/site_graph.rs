use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::aggregation::EdgeSet;
use crate::config::FilterMode;
use crate::selection::normalize_site;

/// Directed site graph over the aggregated edges.
///
/// Nodes are sites keyed by their normalized name, so `"PlantX"` and
/// `" plantx "` are the same node. Edge payloads are indices into the
/// [`EdgeSet`] the graph was built from.
#[derive(Debug, Clone, Default)]
pub struct SiteGraph {
    graph: DiGraph<String, usize>,
    /// Normalized site name → NodeIndex for fast lookup.
    node_map: HashMap<String, NodeIndex>,
    /// Every name as spelled in the data.
    names: BTreeSet<String>,
    /// Names that appear as a destination, as spelled in the data.
    destination_names: BTreeSet<String>,
}

impl SiteGraph {
    pub fn from_edges(edges: &EdgeSet) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();
        let mut names = BTreeSet::new();
        let mut destination_names = BTreeSet::new();

        let get_or_insert = |map: &mut HashMap<String, NodeIndex>,
                             g: &mut DiGraph<String, usize>,
                             name: &str|
         -> NodeIndex {
            *map.entry(normalize_site(name))
                .or_insert_with(|| g.add_node(name.to_string()))
        };

        for (i, edge) in edges.iter().enumerate() {
            let src = get_or_insert(&mut node_map, &mut graph, &edge.origin);
            let dst = get_or_insert(&mut node_map, &mut graph, &edge.destination);
            graph.add_edge(src, dst, i);

            names.insert(edge.origin.clone());
            names.insert(edge.destination.clone());
            destination_names.insert(edge.destination.clone());
        }

        Self {
            graph,
            node_map,
            names,
            destination_names,
        }
    }

    /// Number of distinct sites after normalization.
    pub fn site_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Whether `name` can be chosen under `mode`: any site for site-based
    /// filtering, only sites receiving shipments for destination filtering.
    pub fn is_selectable(&self, name: &str, mode: FilterMode) -> bool {
        match (self.node(name), mode) {
            (None, _) => false,
            (Some(_), FilterMode::SiteBased) => true,
            (Some(node), FilterMode::DestinationOnly) => self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .next()
                .is_some(),
        }
    }

    /// Sorted dropdown entries for `mode`, spelled as in the data.
    pub fn selectable_sites(&self, mode: FilterMode) -> Vec<String> {
        match mode {
            FilterMode::SiteBased => self.names.iter().cloned().collect(),
            FilterMode::DestinationOnly => self.destination_names.iter().cloned().collect(),
        }
    }

    /// First spelling seen for the site `name` normalizes to.
    pub fn display_name(&self, name: &str) -> Option<&str> {
        self.node(name).map(|n| self.graph[n].as_str())
    }

    /// Indices of edges leaving `name`, in edge-set order.
    pub fn outgoing(&self, name: &str) -> Vec<usize> {
        self.edge_indices(name, Direction::Outgoing)
    }

    /// Indices of edges arriving at `name`, in edge-set order.
    pub fn incoming(&self, name: &str) -> Vec<usize> {
        self.edge_indices(name, Direction::Incoming)
    }

    fn node(&self, name: &str) -> Option<NodeIndex> {
        self.node_map.get(&normalize_site(name)).copied()
    }

    fn edge_indices(&self, name: &str, direction: Direction) -> Vec<usize> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        // petgraph yields adjacent edges newest first
        let mut indices: Vec<usize> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| *e.weight())
            .collect();
        indices.sort_unstable();
        indices
    }
}
