//! Graph nodes: the polymorphic unit of work.
//!
//! [`GraphNode`] carries the structural state every node shares — identity,
//! level, dependency and edge lists, the queue binding and the commands
//! produced by the most recent instantiation. The operation itself lives in
//! [`NodeOp`], a closed sum type over the enumerated node kinds; all
//! kind-specific behavior (validation, command creation, in-place parameter
//! update, cloning) dispatches over it.
//!
//! # Node lifecycle
//!
//! ```text
//! Unbound ──create_command──▶ Bound ──enqueue_commands──▶ Submitted
//!    ▲                          │
//!    └──────release_commands────┘
//! ```
//!
//! Commands are released when submitted; each replay re-creates them against
//! the queue assignment of that run.

mod child;
mod event;
mod host;
mod kernel;
mod memcpy;
mod memset;

pub use child::ChildGraphNode;
pub use event::{EventRecordNode, EventWaitNode};
pub use host::{HostNode, HostParams};
pub use kernel::{KernelNode, KernelParams};
pub use memcpy::{
    Memcpy1dNode, Memcpy1dParams, Memcpy3dParams, MemcpyFromSymbolNode, MemcpyFromSymbolParams,
    MemcpyNode, MemcpyToSymbolNode, MemcpyToSymbolParams,
};
pub use memset::{MemsetNode, MemsetParams};

use std::fmt;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::GraphError;
use crate::exec::QueuePool;
use crate::registry::HandleRegistry;
use crate::substrate::{CommandRef, EventRef, QueueRef};
use crate::types::{NodeId, NodeKind};

// ============================================================================
// Operation sum type
// ============================================================================

/// The operation carried by a node. Closed: one variant per [`NodeKind`].
pub enum NodeOp {
    Kernel(KernelNode),
    Memcpy(MemcpyNode),
    Memcpy1d(Memcpy1dNode),
    MemcpyToSymbol(MemcpyToSymbolNode),
    MemcpyFromSymbol(MemcpyFromSymbolNode),
    Memset(MemsetNode),
    EventRecord(EventRecordNode),
    EventWait(EventWaitNode),
    Host(HostNode),
    Empty,
    ChildGraph(Box<ChildGraphNode>),
}

/// Replacement parameters for an in-place node update, one variant per
/// updatable node kind.
pub enum NodeParams {
    Kernel(KernelParams),
    Memcpy(Memcpy3dParams),
    Memcpy1d(Memcpy1dParams),
    MemcpyToSymbol(MemcpyToSymbolParams),
    MemcpyFromSymbol(MemcpyFromSymbolParams),
    Memset(MemsetParams),
    EventRecord(EventRef),
    EventWait(EventRef),
    Host(HostParams),
}

impl NodeParams {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Kernel(_) => NodeKind::Kernel,
            Self::Memcpy(_) => NodeKind::Memcpy,
            Self::Memcpy1d(_) => NodeKind::Memcpy1D,
            Self::MemcpyToSymbol(_) => NodeKind::MemcpyToSymbol,
            Self::MemcpyFromSymbol(_) => NodeKind::MemcpyFromSymbol,
            Self::Memset(_) => NodeKind::Memset,
            Self::EventRecord(_) => NodeKind::EventRecord,
            Self::EventWait(_) => NodeKind::EventWait,
            Self::Host(_) => NodeKind::Host,
        }
    }
}

impl NodeOp {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Kernel(_) => NodeKind::Kernel,
            Self::Memcpy(_) => NodeKind::Memcpy,
            Self::Memcpy1d(_) => NodeKind::Memcpy1D,
            Self::MemcpyToSymbol(_) => NodeKind::MemcpyToSymbol,
            Self::MemcpyFromSymbol(_) => NodeKind::MemcpyFromSymbol,
            Self::Memset(_) => NodeKind::Memset,
            Self::EventRecord(_) => NodeKind::EventRecord,
            Self::EventWait(_) => NodeKind::EventWait,
            Self::Host(_) => NodeKind::Host,
            Self::Empty => NodeKind::Empty,
            Self::ChildGraph(_) => NodeKind::ChildGraph,
        }
    }

    fn clone_op(&self) -> NodeOp {
        match self {
            Self::Kernel(n) => Self::Kernel(n.clone()),
            Self::Memcpy(n) => Self::Memcpy(n.clone()),
            Self::Memcpy1d(n) => Self::Memcpy1d(n.clone()),
            Self::MemcpyToSymbol(n) => Self::MemcpyToSymbol(n.clone()),
            Self::MemcpyFromSymbol(n) => Self::MemcpyFromSymbol(n.clone()),
            Self::Memset(n) => Self::Memset(n.clone()),
            Self::EventRecord(n) => Self::EventRecord(n.clone()),
            Self::EventWait(n) => Self::EventWait(n.clone()),
            Self::Host(n) => Self::Host(n.clone()),
            Self::Empty => Self::Empty,
            Self::ChildGraph(n) => Self::ChildGraph(Box::new(n.clone_node())),
        }
    }

    fn create_commands(
        &mut self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        match self {
            Self::Kernel(n) => n.create_commands(queue, ctx),
            Self::Memcpy(n) => n.create_commands(queue, ctx),
            Self::Memcpy1d(n) => n.create_commands(queue, ctx),
            Self::MemcpyToSymbol(n) => n.create_commands(queue, ctx),
            Self::MemcpyFromSymbol(n) => n.create_commands(queue, ctx),
            Self::Memset(n) => n.create_commands(queue, ctx),
            Self::EventRecord(n) => n.create_commands(queue),
            Self::EventWait(n) => n.create_commands(queue),
            Self::Host(n) => n.create_commands(queue),
            Self::Empty => Ok(vec![queue.marker(Vec::new())?]),
            Self::ChildGraph(n) => n.create_commands(queue),
        }
    }

    /// Atomically replace the operation's parameters. The node kind cannot
    /// change; a mismatched variant is rejected before any validation.
    pub(crate) fn set_params(
        &mut self,
        params: NodeParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        let expected = self.kind();
        match (&mut *self, params) {
            (Self::Kernel(n), NodeParams::Kernel(p)) => n.set_params(p, ctx),
            (Self::Memcpy(n), NodeParams::Memcpy(p)) => n.set_params(p, ctx),
            (Self::Memcpy1d(n), NodeParams::Memcpy1d(p)) => n.set_params(p, ctx),
            (Self::MemcpyToSymbol(n), NodeParams::MemcpyToSymbol(p)) => n.set_params(p, ctx),
            (Self::MemcpyFromSymbol(n), NodeParams::MemcpyFromSymbol(p)) => n.set_params(p, ctx),
            (Self::Memset(n), NodeParams::Memset(p)) => n.set_params(p, ctx),
            (Self::EventRecord(n), NodeParams::EventRecord(event)) => {
                n.set_params(event);
                Ok(())
            }
            (Self::EventWait(n), NodeParams::EventWait(event)) => {
                n.set_params(event);
                Ok(())
            }
            (Self::Host(n), NodeParams::Host(p)) => {
                n.set_params(p);
                Ok(())
            }
            (_, params) => Err(GraphError::invalid_argument(format!(
                "{} parameters applied to a {expected} node",
                params.kind()
            ))),
        }
    }

    /// Copy parameters from another node of the same kind (positional child
    /// graph updates and whole-node replacement).
    pub(crate) fn set_params_from(
        &mut self,
        other: &NodeOp,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        match (&mut *self, other) {
            (Self::Empty, Self::Empty) => Ok(()),
            (Self::ChildGraph(own), Self::ChildGraph(src)) => {
                own.set_params_from_graph(src.graph())
            }
            (own, other) => {
                let params = other.extract_params().ok_or_else(|| {
                    GraphError::invalid_argument(format!(
                        "{} node does not carry transferable parameters",
                        other.kind()
                    ))
                })?;
                own.set_params(params, ctx)
            }
        }
    }

    fn extract_params(&self) -> Option<NodeParams> {
        match self {
            Self::Kernel(n) => Some(NodeParams::Kernel(n.params().clone())),
            Self::Memcpy(n) => Some(NodeParams::Memcpy(n.params().clone())),
            Self::Memcpy1d(n) => Some(NodeParams::Memcpy1d(n.params().clone())),
            Self::MemcpyToSymbol(n) => Some(NodeParams::MemcpyToSymbol(n.params().clone())),
            Self::MemcpyFromSymbol(n) => Some(NodeParams::MemcpyFromSymbol(n.params().clone())),
            Self::Memset(n) => Some(NodeParams::Memset(n.params().clone())),
            Self::EventRecord(n) => Some(NodeParams::EventRecord(n.event().clone())),
            Self::EventWait(n) => Some(NodeParams::EventWait(n.event().clone())),
            Self::Host(n) => Some(NodeParams::Host(n.params().clone())),
            Self::Empty | Self::ChildGraph(_) => None,
        }
    }
}

// ============================================================================
// Node carrier
// ============================================================================

/// One operation in the execution graph, plus its structural position.
pub struct GraphNode {
    id: NodeId,
    level: u32,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) edges: Vec<NodeId>,
    pub(crate) in_degree: usize,
    pub(crate) out_degree: usize,
    queue: Option<QueueRef>,
    commands: Vec<CommandRef>,
    op: NodeOp,
    registry: Arc<HandleRegistry>,
}

impl GraphNode {
    pub(crate) fn new(op: NodeOp, registry: Arc<HandleRegistry>) -> Self {
        let id = NodeId::next();
        registry.track_node(id);
        Self {
            id,
            level: 0,
            dependencies: Vec::new(),
            edges: Vec::new(),
            in_degree: 0,
            out_degree: 0,
            queue: None,
            commands: Vec::new(),
            op,
            registry,
        }
    }

    /// Structural-parameter copy with a fresh identity: the level and cached
    /// degrees carry over, edge wiring is rebuilt by the cloning graph, and
    /// queue/command state starts empty.
    pub(crate) fn clone_into(&self) -> GraphNode {
        let mut node = GraphNode::new(self.op.clone_op(), self.registry.clone());
        node.level = self.level;
        node.in_degree = self.in_degree;
        node.out_degree = self.out_degree;
        node
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.op.kind()
    }

    /// Longest-path distance from any root, maintained incrementally on edge
    /// mutation.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    #[must_use]
    pub fn in_degree(&self) -> usize {
        self.in_degree
    }

    #[must_use]
    pub fn out_degree(&self) -> usize {
        self.out_degree
    }

    /// Incoming edges, in attachment order.
    #[must_use]
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Outgoing edges, in attachment order.
    #[must_use]
    pub fn edges(&self) -> &[NodeId] {
        &self.edges
    }

    #[must_use]
    pub fn op(&self) -> &NodeOp {
        &self.op
    }

    pub(crate) fn op_mut(&mut self) -> &mut NodeOp {
        &mut self.op
    }

    /// Commands exist and have not yet been submitted.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !self.commands.is_empty()
    }

    pub(crate) fn assigned_queue(&self) -> Option<&QueueRef> {
        self.queue.as_ref()
    }

    pub(crate) fn set_queue(&mut self, queue: &QueueRef, pool: &mut QueuePool) {
        self.queue = Some(queue.clone());
        if let NodeOp::ChildGraph(child) = &mut self.op {
            child.set_queue(queue, pool);
        }
    }

    /// Validate parameters, then (re)create this node's commands bound to its
    /// assigned queue, replacing any previously held commands.
    pub(crate) fn create_command(&mut self, ctx: &EngineContext) -> Result<(), GraphError> {
        let queue = self
            .queue
            .clone()
            .ok_or_else(|| GraphError::invalid_argument("node has no queue assignment"))?;
        self.commands = self.op.create_commands(&queue, ctx)?;
        Ok(())
    }

    /// Drop held commands without touching parameters (Bound → Unbound).
    pub(crate) fn release_commands(&mut self) {
        self.commands.clear();
    }

    /// Extend this node's commands with cross-list dependencies. Child graphs
    /// route the waits to their start barrier or, lacking one, to the first
    /// node of their first list.
    pub(crate) fn add_wait_commands(&mut self, waits: &[CommandRef]) {
        match &mut self.op {
            NodeOp::ChildGraph(child) => {
                if let Some(start) = self.commands.first() {
                    start.add_wait_list(waits);
                } else {
                    child.forward_waits(waits);
                }
            }
            _ => {
                for command in &self.commands {
                    command.add_wait_list(waits);
                }
            }
        }
    }

    /// The command a dependent of this node must wait on: the last held
    /// command, or for child graphs the end barrier / first-list tail.
    #[must_use]
    pub(crate) fn command_for_dependents(&self) -> Option<CommandRef> {
        match &self.op {
            NodeOp::ChildGraph(child) => {
                if self.commands.len() == 2 {
                    self.commands.last().cloned()
                } else {
                    child.tail_command()
                }
            }
            _ => self.commands.last().cloned(),
        }
    }

    pub(crate) fn num_parallel_queues(&self) -> usize {
        match &self.op {
            NodeOp::ChildGraph(child) => child.num_parallel_queues(),
            _ => 0,
        }
    }

    /// Submit held commands in creation order, then release them
    /// (Bound → Submitted).
    pub(crate) fn enqueue_commands(&mut self) -> Result<(), GraphError> {
        match &mut self.op {
            NodeOp::Host(host) => {
                let queue = self
                    .queue
                    .clone()
                    .ok_or_else(|| GraphError::invalid_argument("node has no queue assignment"))?;
                host.enqueue(&self.commands, &queue)?;
            }
            NodeOp::ChildGraph(child) => {
                if self.commands.len() == 2 {
                    self.commands[0].enqueue()?;
                }
                child.enqueue_internal()?;
                if self.commands.len() == 2 {
                    self.commands[1].enqueue()?;
                }
            }
            _ => {
                for command in &self.commands {
                    command.enqueue()?;
                }
            }
        }
        self.commands.clear();
        Ok(())
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("level", &self.level)
            .field("in_degree", &self.in_degree)
            .field("out_degree", &self.out_degree)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl Drop for GraphNode {
    fn drop(&mut self) {
        self.registry.release_node(self.id);
    }
}
