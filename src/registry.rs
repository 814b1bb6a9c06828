//! Live-set registry for handle validity checks at the API boundary.
//!
//! One lock-guarded set per entity kind tracks every live node, graph, and
//! executable graph. Entities register on construction and deregister exactly
//! once, on drop. The registry is an injected service — embedders share one
//! instance per runtime through [`EngineContext`](crate::context::EngineContext)
//! rather than relying on hidden process globals.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::types::{ExecId, GraphId, NodeId};

/// Process-wide (per runtime) live-sets for node/graph/exec handles.
#[derive(Default)]
pub struct HandleRegistry {
    nodes: Mutex<FxHashSet<NodeId>>,
    graphs: Mutex<FxHashSet<GraphId>>,
    execs: Mutex<FxHashSet<ExecId>>,
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track_node(&self, id: NodeId) {
        self.nodes.lock().insert(id);
    }

    pub(crate) fn release_node(&self, id: NodeId) {
        let removed = self.nodes.lock().remove(&id);
        debug_assert!(removed, "node {id} released twice");
    }

    pub(crate) fn track_graph(&self, id: GraphId) {
        self.graphs.lock().insert(id);
    }

    pub(crate) fn release_graph(&self, id: GraphId) {
        let removed = self.graphs.lock().remove(&id);
        debug_assert!(removed, "graph {id} released twice");
    }

    pub(crate) fn track_exec(&self, id: ExecId) {
        self.execs.lock().insert(id);
    }

    pub(crate) fn release_exec(&self, id: ExecId) {
        let removed = self.execs.lock().remove(&id);
        debug_assert!(removed, "exec {id} released twice");
    }

    /// Whether a node handle refers to a live node.
    #[must_use]
    pub fn node_is_live(&self, id: NodeId) -> bool {
        self.nodes.lock().contains(&id)
    }

    /// Whether a graph handle refers to a live graph.
    #[must_use]
    pub fn graph_is_live(&self, id: GraphId) -> bool {
        self.graphs.lock().contains(&id)
    }

    /// Whether an executable-graph handle refers to a live instance.
    #[must_use]
    pub fn exec_is_live(&self, id: ExecId) -> bool {
        self.execs.lock().contains(&id)
    }

    /// Number of live nodes, including clones owned by executable graphs and
    /// nodes embedded in child graphs.
    #[must_use]
    pub fn live_nodes(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Number of live graphs, including clones and embedded child graphs.
    #[must_use]
    pub fn live_graphs(&self) -> usize {
        self.graphs.lock().len()
    }

    /// Number of live executable graphs.
    #[must_use]
    pub fn live_execs(&self) -> usize {
        self.execs.lock().len()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live_nodes", &self.live_nodes())
            .field("live_graphs", &self.live_graphs())
            .field("live_execs", &self.live_execs())
            .finish()
    }
}
