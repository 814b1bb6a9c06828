//! The instantiated, replayable execution plan.
//!
//! Instantiation deep-clones the source graph so later mutation never
//! perturbs an executing plan, runs the scheduling analysis once, and creates
//! the queue pool up front — sized to the maximum number of parallel lists the
//! whole plan (including embedded child graphs) can occupy simultaneously.
//!
//! Each [`run`](ExecutableGraph::run) re-creates per-node commands bound to
//! the queue assignment of that replay, wires cross-list dependencies as
//! command wait-lists, and submits everything in level order. The calling
//! thread never blocks: ordering across queues is enforced by the substrate's
//! own dependency mechanism. Replays on one `ExecutableGraph` must be
//! externally serialized — the `&mut` receiver encodes that — because the
//! round-robin cursor and per-node command state mutate in place.

use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::nodes::NodeParams;
use crate::substrate::{CommandRef, QueueRef};
use crate::types::{ExecId, NodeId};

/// Round-robin pool of queues owned by an executable graph.
pub struct QueuePool {
    queues: Vec<QueueRef>,
    cursor: usize,
}

impl QueuePool {
    pub(crate) fn empty() -> Self {
        Self {
            queues: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn next(&mut self) -> QueueRef {
        let queue = self.queues[self.cursor % self.queues.len()].clone();
        self.cursor += 1;
        queue
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

/// A fixed topological plan bound to a pool of execution queues.
pub struct ExecutableGraph {
    id: ExecId,
    /// Private clone of the source graph; this instance owns every node in it.
    graph: Graph,
    /// Original node id → cloned node id, for in-place updates.
    cloned: FxHashMap<NodeId, NodeId>,
    lists: Vec<Vec<NodeId>>,
    waits: FxHashMap<NodeId, Vec<NodeId>>,
    /// Level-order submission sequence; child-graph internals are not inlined.
    level_order: Vec<NodeId>,
    pool: QueuePool,
    last_enqueued: Option<CommandRef>,
}

impl Graph {
    /// Instantiate this graph into a replayable plan. The graph is snapshot
    /// by deep clone; an empty graph cannot be instantiated.
    pub fn instantiate(&self) -> Result<ExecutableGraph, GraphError> {
        ExecutableGraph::instantiate(self)
    }
}

impl ExecutableGraph {
    #[instrument(skip(source), fields(graph = %source.id()))]
    pub fn instantiate(source: &Graph) -> Result<Self, GraphError> {
        if source.is_empty() {
            return Err(GraphError::invalid_argument(
                "cannot instantiate an empty graph",
            ));
        }
        let (graph, cloned) = source.clone_graph();
        let id = ExecId::next();
        graph.context().registry().track_exec(id);
        let mut exec = Self {
            id,
            graph,
            cloned,
            lists: Vec::new(),
            waits: FxHashMap::default(),
            level_order: Vec::new(),
            pool: QueuePool::empty(),
            last_enqueued: None,
        };
        exec.init()?;
        Ok(exec)
    }

    /// Run the scheduling analysis and create the queue pool. Failure leaves
    /// the instance unusable; `instantiate` surfaces the error.
    fn init(&mut self) -> Result<(), GraphError> {
        let run = self.graph.run_list()?;
        self.level_order = self.graph.level_order();

        let mut pool_size = run.lists.len();
        for &id in &self.level_order {
            pool_size += self.graph.node_ref(id).num_parallel_queues();
        }
        if let Some(limit) = self.graph.context().config().queue_pool_limit
            && pool_size > limit
        {
            return Err(GraphError::NotSupported {
                what: format!(
                    "plan needs {pool_size} queues, LANEGRAPH_MAX_QUEUES caps the pool at {limit}"
                ),
            });
        }
        debug!(
            exec = %self.id,
            lists = run.lists.len(),
            pool_size,
            nodes = self.level_order.len(),
            "instantiated execution plan"
        );

        let provider = self.graph.context().substrate().queues.clone();
        let mut queues = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            queues.push(provider.create_queue()?);
        }
        self.pool = QueuePool { queues, cursor: 0 };
        self.lists = run.lists;
        self.waits = run.waits;
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> ExecId {
        self.id
    }

    /// The plan's submission sequence (cloned node ids, level order).
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.level_order
    }

    /// The cloned snapshot this plan executes.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn queue_pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of parallel lists in the top-level partition.
    #[must_use]
    pub fn parallel_list_count(&self) -> usize {
        self.lists.len()
    }

    /// Map a node handle of the source graph to its clone in this plan.
    #[must_use]
    pub fn cloned_node(&self, original: NodeId) -> Option<NodeId> {
        self.cloned.get(&original).copied()
    }

    /// The trailing marker of the most recent replay, if any.
    #[must_use]
    pub fn last_enqueued(&self) -> Option<CommandRef> {
        self.last_enqueued.clone()
    }

    /// Replay the plan on the caller's stream.
    ///
    /// The first parallel list rides `stream` itself; every other list takes a
    /// pool queue round-robin. Commands are (re)created for every node, wired
    /// with their cross-list wait-lists, and submitted in level order. A
    /// trailing marker depending on every leaf's last command is enqueued on
    /// `stream`, so stream-ordered work submitted afterwards observes the
    /// whole graph.
    ///
    /// On a command-creation or submission failure the remaining submission is
    /// aborted; commands already enqueued keep running on their queues.
    #[instrument(skip(self, stream), fields(exec = %self.id))]
    pub fn run(&mut self, stream: &QueueRef) -> Result<(), GraphError> {
        self.pool.reset();

        // Per-list queue assignment.
        let lists = self.lists.clone();
        let graph = &mut self.graph;
        let pool = &mut self.pool;
        for (index, list) in lists.iter().enumerate() {
            let queue = if index == 0 {
                stream.clone()
            } else {
                pool.next()
            };
            for &id in list {
                graph.set_node_queue(id, &queue, pool);
            }
        }

        // (Re)create commands in level order.
        let order = self.level_order.clone();
        for &id in &order {
            self.graph.create_node_command(id)?;
        }

        // Translate wait-list nodes into their current command objects.
        let waits = std::mem::take(&mut self.waits);
        for (&id, wait_nodes) in &waits {
            let commands: Vec<CommandRef> = wait_nodes
                .iter()
                .filter_map(|w| self.graph.node_ref(*w).command_for_dependents())
                .collect();
            if !commands.is_empty() {
                self.graph.node_mut(id).add_wait_commands(&commands);
            }
        }
        self.waits = waits;

        // Collect leaf tails before submission releases them.
        let leaf_commands: Vec<CommandRef> = self
            .graph
            .leaf_nodes()
            .into_iter()
            .filter_map(|id| self.graph.node_ref(id).command_for_dependents())
            .collect();

        // Submit in level order.
        for &id in &order {
            self.graph.enqueue_node(id)?;
        }

        // Stream-ordering fence across every lane.
        let marker = stream.marker(leaf_commands)?;
        marker.enqueue()?;
        self.last_enqueued = Some(marker);
        debug!(exec = %self.id, nodes = order.len(), "graph replay submitted");
        Ok(())
    }

    /// Update an instantiated node's parameters in place, without rebuilding
    /// the plan. `node` is a handle of the *source* graph; the update applies
    /// to its clone. When the clone currently holds commands they are released
    /// and re-created against the same queue.
    pub fn update_node_params(
        &mut self,
        node: NodeId,
        params: NodeParams,
    ) -> Result<(), GraphError> {
        let clone_id = self
            .cloned
            .get(&node)
            .copied()
            .ok_or(GraphError::InvalidHandle { kind: "node" })?;
        self.graph.set_node_params(clone_id, params)?;
        let rebuild =
            self.graph.node_ref(clone_id).is_bound() && self.graph.node_ref(clone_id).assigned_queue().is_some();
        if rebuild {
            self.graph.node_mut(clone_id).release_commands();
            self.graph.create_node_command(clone_id)?;
        }
        Ok(())
    }

    /// Positionally update an embedded child graph from a structurally
    /// identical replacement graph.
    pub fn update_child_graph(&mut self, node: NodeId, source: &Graph) -> Result<(), GraphError> {
        let clone_id = self
            .cloned
            .get(&node)
            .copied()
            .ok_or(GraphError::InvalidHandle { kind: "node" })?;
        use crate::nodes::NodeOp;
        match self.graph.node_mut(clone_id).op_mut() {
            NodeOp::ChildGraph(child) => child.set_params_from_graph(source),
            _ => Err(GraphError::invalid_argument(
                "node is not a child graph node",
            )),
        }
    }
}

impl Drop for ExecutableGraph {
    fn drop(&mut self) {
        // The queue pool and cloned nodes release with their owners.
        self.graph.context().registry().release_exec(self.id);
    }
}

impl std::fmt::Debug for ExecutableGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableGraph")
            .field("id", &self.id)
            .field("nodes", &self.level_order.len())
            .field("lists", &self.lists.len())
            .field("queue_pool", &self.pool.len())
            .finish()
    }
}
