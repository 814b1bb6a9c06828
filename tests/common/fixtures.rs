//! Shared graph fixtures and trace helpers.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use lanegraph::config::EngineConfig;
use lanegraph::context::EngineContext;
use lanegraph::graph::Graph;
use lanegraph::nodes::{KernelParams, Memcpy1dParams, MemsetParams};
use lanegraph::substrate::{KernelArguments, QueueRef};
use lanegraph::types::{CopyKind, Dim3, NodeId};

use super::substrate::{mock_substrate, EnqueueRecord, MockHub, MockKind};

/// Hub + engine context with pinned (non-env) configuration.
pub fn harness() -> (Arc<MockHub>, EngineContext) {
    let (hub, substrate) = mock_substrate();
    let ctx = EngineContext::new(substrate).with_config(EngineConfig::default());
    (hub, ctx)
}

/// A queue standing in for the caller's stream.
pub fn stream(hub: &Arc<MockHub>) -> QueueRef {
    hub.create_queue().expect("stream queue")
}

pub fn kernel_params(hub: &Arc<MockHub>, name: &str) -> KernelParams {
    let kernel = hub.define_kernel(name, &[8, 4]);
    KernelParams {
        kernel,
        grid_dim: Dim3::new(64, 1, 1),
        block_dim: Dim3::new(256, 1, 1),
        shared_mem_bytes: 0,
        args: KernelArguments::PerParam(vec![
            vec![0u8; 8].into_boxed_slice(),
            vec![0u8; 4].into_boxed_slice(),
        ]),
    }
}

pub fn h2d_params(hub: &Arc<MockHub>, bytes: usize) -> Memcpy1dParams {
    Memcpy1dParams {
        dst: hub.device_alloc(bytes),
        src: hub.host_ptr(bytes),
        count: bytes,
        kind: CopyKind::HostToDevice,
    }
}

pub fn fill_params(hub: &Arc<MockHub>, elems: usize) -> MemsetParams {
    MemsetParams {
        dst: hub.device_alloc(elems * 4),
        value: 0xdead_beef,
        element_size: 4,
        width: elems,
        height: 1,
        pitch: 0,
    }
}

/// Diamond graph: kernel A fans out to memcpy B and memset C, both joining at
/// empty node D. Insertion order A, B, C, D.
pub fn diamond(hub: &Arc<MockHub>, ctx: &EngineContext) -> (Graph, [NodeId; 4]) {
    let mut graph = Graph::new(ctx.clone());
    let a = graph
        .add_kernel_node(kernel_params(hub, "produce"), &[])
        .expect("add kernel");
    let b = graph
        .add_memcpy1d_node(h2d_params(hub, 4096), &[a])
        .expect("add memcpy");
    let c = graph
        .add_memset_node(fill_params(hub, 1024), &[a])
        .expect("add memset");
    let d = graph.add_empty_node(&[b, c]).expect("add join");
    (graph, [a, b, c, d])
}

/// cmd id → kind for one drained trace.
pub fn kinds_by_cmd(records: &[EnqueueRecord]) -> FxHashMap<u64, MockKind> {
    records.iter().map(|r| (r.cmd, r.kind)).collect()
}

/// Kinds of the commands a record waits on.
pub fn wait_kinds(record: &EnqueueRecord, kinds: &FxHashMap<u64, MockKind>) -> Vec<MockKind> {
    record.waits.iter().filter_map(|w| kinds.get(w).copied()).collect()
}
