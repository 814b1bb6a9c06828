//! Scheduling analysis: parallel-list partition, wait lists, and level order.
//!
//! `run_list` partitions the vertices into *parallel lists* — maximal chains
//! that must execute in sequence on one queue — and records, for every node
//! with a dependency outside its own list, the wait list enforcing that
//! cross-list edge. Lists are discovered from the roots in vertex insertion
//! order, so the partition is deterministic given deterministic construction.
//!
//! `level_order` flattens the graph into a submission order: non-decreasing
//! level with insertion order breaking ties. Nodes embedded in child graphs
//! are not inlined; the child node stands in for its whole sub-graph.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use super::Graph;
use crate::error::GraphError;
use crate::nodes::NodeOp;
use crate::types::NodeId;

/// Result of the run-list analysis.
///
/// The union of `lists` is exactly the vertex set: every node appears in
/// precisely one list. `waits` maps a node to the dependencies that live in a
/// different list and therefore need explicit command-level wait edges; a
/// dependency in the same list is ordered by the queue itself.
#[derive(Clone, Debug, Default)]
pub struct RunList {
    pub lists: Vec<Vec<NodeId>>,
    pub waits: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    /// Partition the graph into parallel lists and compute cross-list wait
    /// lists. Child graph nodes are prepared (their own analysis run and
    /// cached) first, recursively.
    pub fn run_list(&mut self) -> Result<RunList, GraphError> {
        self.prepare_children()?;
        Ok(self.partition())
    }

    fn prepare_children(&mut self) -> Result<(), GraphError> {
        let ids = self.order.clone();
        for id in ids {
            if let NodeOp::ChildGraph(child) = self.node_mut(id).op_mut() {
                child.prepare()?;
            }
        }
        Ok(())
    }

    fn partition(&self) -> RunList {
        let mut lists: Vec<Vec<NodeId>> = Vec::new();
        let mut list_of: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();

        for root in self.root_nodes() {
            if visited.contains(&root) {
                continue;
            }
            lists.push(Vec::new());
            let idx = lists.len() - 1;
            self.chain_visit(root, idx, &mut lists, &mut list_of, &mut visited);
        }

        let mut waits: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for &id in &self.order {
            let mine = list_of.get(&id).copied();
            let cross: Vec<NodeId> = self
                .node_ref(id)
                .dependencies
                .iter()
                .filter(|dep| list_of.get(*dep).copied() != mine)
                .copied()
                .collect();
            if !cross.is_empty() {
                waits.insert(id, cross);
            }
        }

        lists.retain(|list| !list.is_empty());
        trace!(lists = lists.len(), waits = waits.len(), "run-list partition");
        RunList { lists, waits }
    }

    /// Append `v` (and its chain) to `lists[idx]`. The first outgoing edge
    /// continues the current chain; every other edge starts a fresh list.
    /// A visited node ends the chain — joins are processed exactly once.
    fn chain_visit(
        &self,
        v: NodeId,
        idx: usize,
        lists: &mut Vec<Vec<NodeId>>,
        list_of: &mut FxHashMap<NodeId, usize>,
        visited: &mut FxHashSet<NodeId>,
    ) {
        if !visited.insert(v) {
            return;
        }
        lists[idx].push(v);
        list_of.insert(v, idx);
        let edges = self.node_ref(v).edges.clone();
        for (i, child) in edges.into_iter().enumerate() {
            let target = if i == 0 {
                idx
            } else {
                lists.push(Vec::new());
                lists.len() - 1
            };
            self.chain_visit(child, target, lists, list_of, visited);
        }
    }

    /// Flat submission order: non-decreasing level, stable within a level by
    /// vertex insertion order. A valid topological order for any DAG whose
    /// levels satisfy the edge invariant.
    #[must_use]
    pub fn level_order(&self) -> Vec<NodeId> {
        let mut out = self.order.clone();
        out.sort_by_key(|id| self.node_ref(*id).level());
        out
    }
}
