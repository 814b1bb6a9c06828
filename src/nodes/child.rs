//! Child graph nodes: an entire sub-graph embedded as one schedulable unit.
//!
//! The node owns a private clone of the embedded graph, so later mutation of
//! the source never perturbs a parent plan. The parent scheduler sees a single
//! node; internally the sub-graph keeps its own parallel-list partition, wait
//! lists, and level order, prepared once per instantiation.

use rustc_hash::FxHashMap;

use crate::error::GraphError;
use crate::exec::QueuePool;
use crate::graph::Graph;
use crate::substrate::{CommandRef, QueueRef};
use crate::types::NodeId;

pub struct ChildGraphNode {
    graph: Graph,
    level_order: Vec<NodeId>,
    lists: Vec<Vec<NodeId>>,
    waits: FxHashMap<NodeId, Vec<NodeId>>,
}

impl ChildGraphNode {
    /// Embed a private clone of `source`.
    pub(crate) fn new(source: &Graph) -> Self {
        let (graph, _) = source.clone_graph();
        Self {
            graph,
            level_order: Vec::new(),
            lists: Vec::new(),
            waits: FxHashMap::default(),
        }
    }

    pub(crate) fn clone_node(&self) -> Self {
        Self::new(&self.graph)
    }

    /// The embedded (cloned) sub-graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Compute the sub-graph's own partition, wait lists, and level order.
    /// Recurses into nested child graphs through `Graph::run_list`.
    pub(crate) fn prepare(&mut self) -> Result<(), GraphError> {
        let run = self.graph.run_list()?;
        self.lists = run.lists;
        self.waits = run.waits;
        self.level_order = self.graph.level_order();
        Ok(())
    }

    /// Queues this sub-graph needs beyond the parent's: its nested
    /// requirements plus one per parallel list after the first (the first list
    /// reuses the parent's queue).
    pub(crate) fn num_parallel_queues(&self) -> usize {
        let mut num = self.lists.len().saturating_sub(1);
        for &id in &self.level_order {
            num += self.graph.node_ref(id).num_parallel_queues();
        }
        num
    }

    /// Bulk queue assignment: the first list rides `queue`, every other list
    /// takes the next pool queue.
    pub(crate) fn set_queue(&mut self, queue: &QueueRef, pool: &mut QueuePool) {
        for li in 0..self.lists.len() {
            let q = if li == 0 { queue.clone() } else { pool.next() };
            let members = self.lists[li].clone();
            for id in members {
                self.graph.set_node_queue(id, &q, pool);
            }
        }
    }

    /// Create commands for every internal node, wire internal wait lists, and
    /// build the fan-out/fan-in barriers on the parent queue when the
    /// sub-graph spans more than one list. Returns the barrier commands (zero
    /// or two) held by the wrapping node.
    pub(crate) fn create_commands(
        &mut self,
        queue: &QueueRef,
    ) -> Result<Vec<CommandRef>, GraphError> {
        let order = self.level_order.clone();
        for &id in &order {
            self.graph.create_node_command(id)?;
        }
        for (id, wait_nodes) in self.waits.clone() {
            let commands: Vec<CommandRef> = wait_nodes
                .iter()
                .filter_map(|w| self.graph.node_ref(*w).command_for_dependents())
                .collect();
            if !commands.is_empty() {
                self.graph.node_mut(id).add_wait_commands(&commands);
            }
        }
        if self.lists.len() <= 1 {
            return Ok(Vec::new());
        }
        let start = queue.marker(Vec::new())?;
        for list in &self.lists {
            if let Some(&first) = list.first() {
                self.graph
                    .node_mut(first)
                    .add_wait_commands(std::slice::from_ref(&start));
            }
        }
        let tails: Vec<CommandRef> = self
            .lists
            .iter()
            .filter_map(|list| list.last())
            .filter_map(|id| self.graph.node_ref(*id).command_for_dependents())
            .collect();
        let end = queue.marker(tails)?;
        Ok(vec![start, end])
    }

    /// Route incoming cross-node waits to the first node of the first list.
    /// Used when the sub-graph is a single chain and carries no start barrier.
    pub(crate) fn forward_waits(&mut self, waits: &[CommandRef]) {
        if let Some(&first) = self.lists.first().and_then(|list| list.first()) {
            self.graph.node_mut(first).add_wait_commands(waits);
        }
    }

    /// The command dependents of the wrapping node must wait on when no end
    /// barrier exists: the last command of the first list.
    pub(crate) fn tail_command(&self) -> Option<CommandRef> {
        let last = *self.lists.first()?.last()?;
        self.graph.node_ref(last).command_for_dependents()
    }

    /// Submit every internal node in the sub-graph's own level order.
    pub(crate) fn enqueue_internal(&mut self) -> Result<(), GraphError> {
        let order = self.level_order.clone();
        for &id in &order {
            self.graph.enqueue_node(id)?;
        }
        Ok(())
    }

    /// Positional parameter update from a structurally identical graph:
    /// the i-th node of `source` updates the i-th embedded node.
    pub(crate) fn set_params_from_graph(&mut self, source: &Graph) -> Result<(), GraphError> {
        if source.node_count() != self.graph.node_count() {
            return Err(GraphError::invalid_argument(
                "replacement child graph has a different node count",
            ));
        }
        let own_ids = self.graph.node_ids().to_vec();
        for (own, src) in own_ids.into_iter().zip(source.node_ids()) {
            self.graph.update_node_from(own, source.node_ref(*src).op())?;
        }
        Ok(())
    }
}
