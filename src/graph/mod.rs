//! The mutable execution graph: an insertion-ordered, owned collection of
//! nodes and the dependency edges between them.
//!
//! A [`Graph`] exclusively owns every node in its vertex list — destroying the
//! graph destroys every node transitively, which detaches edges and (for child
//! graph nodes) tears down embedded sub-graphs. All public entry points
//! validate their handles against the vertex list; construction parameters are
//! validated before any mutation, so a failed call leaves the graph untouched.
//!
//! Levels are maintained incrementally: adding an edge relaxes the child's
//! level to at least `parent + 1` and propagates the bump through its
//! descendants; removing an edge recomputes the child's level from its
//! remaining parents only. The scheduling analysis built on top of this lives
//! in [`analysis`](self) (`run_list`, `level_order`).

mod analysis;

#[cfg(feature = "petgraph-compat")]
mod petgraph_compat;

pub use analysis::RunList;

#[cfg(feature = "petgraph-compat")]
pub use petgraph_compat::PetgraphConversion;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::context::EngineContext;
use crate::error::GraphError;
use crate::exec::QueuePool;
use crate::nodes::{
    ChildGraphNode, EventRecordNode, EventWaitNode, GraphNode, HostNode, HostParams, KernelNode,
    KernelParams, Memcpy1dNode, Memcpy1dParams, Memcpy3dParams, MemcpyFromSymbolNode,
    MemcpyFromSymbolParams, MemcpyNode, MemcpyToSymbolNode, MemcpyToSymbolParams, MemsetNode,
    MemsetParams, NodeOp, NodeParams,
};
use crate::substrate::{EventRef, QueueRef};
use crate::types::{GraphId, NodeId};

/// A DAG of nodes plus their dependency edges.
pub struct Graph {
    id: GraphId,
    /// Vertex insertion order; drives every deterministic traversal.
    order: Vec<NodeId>,
    nodes: FxHashMap<NodeId, GraphNode>,
    original: Option<GraphId>,
    ctx: EngineContext,
}

impl Graph {
    /// Create an empty graph bound to the given engine context.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        let id = GraphId::next();
        ctx.registry.track_graph(id);
        Self {
            id,
            order: Vec::new(),
            nodes: FxHashMap::default(),
            original: None,
            ctx,
        }
    }

    #[must_use]
    pub fn id(&self) -> GraphId {
        self.id
    }

    #[must_use]
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// The graph this instance was cloned from, if any.
    #[must_use]
    pub fn original_graph(&self) -> Option<GraphId> {
        self.original
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node ids in vertex insertion order.
    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> &GraphNode {
        self.nodes.get(&id).expect("node id present in arena")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        self.nodes.get_mut(&id).expect("node id present in arena")
    }

    // ========================================================================
    // Node construction
    // ========================================================================

    pub fn add_kernel_node(
        &mut self,
        params: KernelParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = KernelNode::new(params)?;
        self.attach(NodeOp::Kernel(node), deps)
    }

    pub fn add_memcpy_node(
        &mut self,
        params: Memcpy3dParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = MemcpyNode::new(params, &self.ctx)?;
        self.attach(NodeOp::Memcpy(node), deps)
    }

    pub fn add_memcpy1d_node(
        &mut self,
        params: Memcpy1dParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = Memcpy1dNode::new(params, &self.ctx)?;
        self.attach(NodeOp::Memcpy1d(node), deps)
    }

    pub fn add_memcpy_to_symbol_node(
        &mut self,
        params: MemcpyToSymbolParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = MemcpyToSymbolNode::new(params, &self.ctx)?;
        self.attach(NodeOp::MemcpyToSymbol(node), deps)
    }

    pub fn add_memcpy_from_symbol_node(
        &mut self,
        params: MemcpyFromSymbolParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = MemcpyFromSymbolNode::new(params, &self.ctx)?;
        self.attach(NodeOp::MemcpyFromSymbol(node), deps)
    }

    pub fn add_memset_node(
        &mut self,
        params: MemsetParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = MemsetNode::new(params, &self.ctx)?;
        self.attach(NodeOp::Memset(node), deps)
    }

    pub fn add_event_record_node(
        &mut self,
        event: EventRef,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        self.attach(NodeOp::EventRecord(EventRecordNode::new(event)), deps)
    }

    pub fn add_event_wait_node(
        &mut self,
        event: EventRef,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        self.attach(NodeOp::EventWait(EventWaitNode::new(event)), deps)
    }

    pub fn add_host_node(
        &mut self,
        params: HostParams,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        self.attach(NodeOp::Host(HostNode::new(params)), deps)
    }

    pub fn add_empty_node(&mut self, deps: &[NodeId]) -> Result<NodeId, GraphError> {
        self.attach(NodeOp::Empty, deps)
    }

    /// Embed `child` as a single schedulable node. The sub-graph is deep
    /// cloned; later mutation of `child` does not affect this graph.
    pub fn add_child_graph_node(
        &mut self,
        child: &Graph,
        deps: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node = ChildGraphNode::new(child);
        self.attach(NodeOp::ChildGraph(Box::new(node)), deps)
    }

    fn attach(&mut self, op: NodeOp, deps: &[NodeId]) -> Result<NodeId, GraphError> {
        let mut seen = FxHashSet::default();
        for dep in deps {
            if !self.nodes.contains_key(dep) {
                return Err(GraphError::InvalidHandle { kind: "node" });
            }
            if !seen.insert(*dep) {
                return Err(GraphError::invalid_argument("duplicate dependency"));
            }
        }
        let node = GraphNode::new(op, self.ctx.registry.clone());
        let id = node.id();
        self.nodes.insert(id, node);
        self.order.push(id);
        for &dep in deps {
            self.add_edge(dep, id)?;
        }
        Ok(id)
    }

    // ========================================================================
    // Edge mutation
    // ========================================================================

    /// Add a dependency edge `from → to`.
    ///
    /// Both handles must belong to this graph, the edge must not duplicate an
    /// existing one, and it must not close a cycle. The child's level is
    /// relaxed to at least `from.level + 1` and the bump propagates through
    /// its descendants.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return Err(GraphError::InvalidHandle { kind: "node" });
        }
        if from == to {
            return Err(GraphError::invalid_argument("self edge"));
        }
        if self.node_ref(from).edges.contains(&to) {
            return Err(GraphError::invalid_argument("duplicate edge"));
        }
        if self.reaches(to, from) {
            return Err(GraphError::invalid_argument("edge would create a cycle"));
        }

        let parent_level = self.node_ref(from).level();
        {
            let parent = self.node_mut(from);
            parent.edges.push(to);
            parent.out_degree += 1;
        }
        {
            let child = self.node_mut(to);
            child.dependencies.push(from);
            child.in_degree += 1;
            let level = child.level().max(parent_level + 1);
            child.set_level(level);
        }
        self.bump_descendants(to);
        Ok(())
    }

    /// Remove the dependency edge `from → to`.
    ///
    /// Returns `Ok(false)` without altering either node when the edge does not
    /// exist. On removal the child's level is recomputed from its remaining
    /// parents (0 when none remain).
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return Err(GraphError::InvalidHandle { kind: "node" });
        }
        let Some(pos) = self.node_ref(from).edges.iter().position(|e| *e == to) else {
            return Ok(false);
        };
        {
            let parent = self.node_mut(from);
            parent.edges.remove(pos);
            parent.out_degree -= 1;
        }
        let remaining_level = {
            let child = self.node_ref(to);
            child
                .dependencies
                .iter()
                .filter(|d| **d != from)
                .map(|d| self.node_ref(*d).level() + 1)
                .max()
                .unwrap_or(0)
        };
        {
            let child = self.node_mut(to);
            if let Some(dep_pos) = child.dependencies.iter().position(|d| *d == from) {
                child.dependencies.remove(dep_pos);
            }
            child.in_degree -= 1;
            child.set_level(remaining_level);
        }
        Ok(true)
    }

    /// Remove a node, severing every edge that touches it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::InvalidHandle { kind: "node" });
        }
        let parents = self.node_ref(id).dependencies.clone();
        let children = self.node_ref(id).edges.clone();
        for parent in parents {
            let node = self.node_mut(parent);
            if let Some(pos) = node.edges.iter().position(|e| *e == id) {
                node.edges.remove(pos);
                node.out_degree -= 1;
            }
        }
        for child in children {
            {
                let node = self.node_mut(child);
                if let Some(pos) = node.dependencies.iter().position(|d| *d == id) {
                    node.dependencies.remove(pos);
                    node.in_degree -= 1;
                }
            }
            let level = self
                .node_ref(child)
                .dependencies
                .iter()
                .map(|d| self.node_ref(*d).level() + 1)
                .max()
                .unwrap_or(0);
            self.node_mut(child).set_level(level);
        }
        self.nodes.remove(&id);
        self.order.retain(|n| *n != id);
        Ok(())
    }

    /// True when `to` is reachable from `from` along edges.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();
        while let Some(id) = stack.pop() {
            for &edge in &self.node_ref(id).edges {
                if edge == to {
                    return true;
                }
                if seen.insert(edge) {
                    stack.push(edge);
                }
            }
        }
        false
    }

    /// Worklist relaxation: push `level + 1` through descendants of `start`
    /// until a fixpoint.
    fn bump_descendants(&mut self, start: NodeId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let level = self.node_ref(id).level();
            let edges = self.node_ref(id).edges.clone();
            for edge in edges {
                let child = self.node_mut(edge);
                if child.level() < level + 1 {
                    child.set_level(level + 1);
                    stack.push(edge);
                }
            }
        }
    }

    // ========================================================================
    // Structure queries
    // ========================================================================

    /// All vertices with no incoming edges, in insertion order.
    #[must_use]
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.node_ref(*id).in_degree() == 0)
            .collect()
    }

    /// All vertices with no outgoing edges, in insertion order.
    #[must_use]
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.node_ref(*id).out_degree() == 0)
            .collect()
    }

    #[must_use]
    pub fn leaf_node_count(&self) -> usize {
        self.leaf_nodes().len()
    }

    /// Every edge as a `(from, to)` pair, in insertion-then-attachment order.
    #[must_use]
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::new();
        for &id in &self.order {
            for &edge in &self.node_ref(id).edges {
                pairs.push((id, edge));
            }
        }
        pairs
    }

    // ========================================================================
    // Cloning and parameter updates
    // ========================================================================

    /// Deep-copy every node and rebuild every edge, producing a structurally
    /// identical but fully independent graph plus the original→clone map.
    #[must_use]
    pub fn clone_graph(&self) -> (Graph, FxHashMap<NodeId, NodeId>) {
        let mut clone = Graph::new(self.ctx.clone());
        clone.original = Some(self.id);
        let mut map = FxHashMap::default();
        for &id in &self.order {
            let cloned = self.node_ref(id).clone_into();
            map.insert(id, cloned.id());
            clone.order.push(cloned.id());
            clone.nodes.insert(cloned.id(), cloned);
        }
        for &id in &self.order {
            let src = self.node_ref(id);
            let edges: Vec<NodeId> = src.edges.iter().map(|e| map[e]).collect();
            let deps: Vec<NodeId> = src.dependencies.iter().map(|d| map[d]).collect();
            let dst = clone
                .nodes
                .get_mut(&map[&id])
                .expect("cloned node present in arena");
            dst.edges = edges;
            dst.dependencies = deps;
        }
        debug!(source = %self.id, clone = %clone.id, nodes = self.order.len(), "cloned graph");
        (clone, map)
    }

    /// Validate and atomically replace a node's operation parameters.
    pub fn set_node_params(&mut self, id: NodeId, params: NodeParams) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::InvalidHandle { kind: "node" });
        }
        let ctx = self.ctx.clone();
        self.node_mut(id).op_mut().set_params(params, &ctx)
    }

    pub(crate) fn update_node_from(&mut self, id: NodeId, other: &NodeOp) -> Result<(), GraphError> {
        let ctx = self.ctx.clone();
        self.node_mut(id).op_mut().set_params_from(other, &ctx)
    }

    // ========================================================================
    // Instantiation plumbing
    // ========================================================================

    pub(crate) fn set_node_queue(&mut self, id: NodeId, queue: &QueueRef, pool: &mut QueuePool) {
        self.node_mut(id).set_queue(queue, pool);
    }

    pub(crate) fn create_node_command(&mut self, id: NodeId) -> Result<(), GraphError> {
        let ctx = self.ctx.clone();
        self.node_mut(id).create_command(&ctx)
    }

    pub(crate) fn enqueue_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.node_mut(id).enqueue_commands()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        // Nodes deregister themselves; the vertex map must go first so child
        // graphs tear down while the registry still sees this graph as live.
        self.nodes.clear();
        self.ctx.registry.release_graph(self.id);
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("nodes", &self.order.len())
            .field("original", &self.original)
            .finish()
    }
}
