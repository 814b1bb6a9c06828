//! petgraph interop, gated behind the `petgraph-compat` feature.
//!
//! Converts the execution graph into a [`petgraph::graph::DiGraph`] for
//! external algorithms and DOT visualization.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use super::Graph;
use crate::types::NodeId;

/// A petgraph view of an execution graph plus the id→index mapping.
pub struct PetgraphConversion {
    pub graph: DiGraph<String, ()>,
    pub index_of: FxHashMap<NodeId, NodeIndex>,
}

impl Graph {
    /// Build a petgraph `DiGraph` whose node weights are `"{id}:{kind}"`
    /// labels.
    #[must_use]
    pub fn to_petgraph(&self) -> PetgraphConversion {
        let mut graph = DiGraph::new();
        let mut index_of = FxHashMap::default();
        for &id in self.node_ids() {
            let node = self.node_ref(id);
            let index = graph.add_node(format!("{}:{}", node.id(), node.kind()));
            index_of.insert(id, index);
        }
        for (from, to) in self.edges() {
            graph.add_edge(index_of[&from], index_of[&to], ());
        }
        PetgraphConversion { graph, index_of }
    }

    /// Render the graph as DOT for visualization.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let conversion = self.to_petgraph();
        format!(
            "{:?}",
            Dot::with_config(&conversion.graph, &[Config::EdgeNoLabel])
        )
    }
}
