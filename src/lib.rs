//! # Lanegraph: Execution-Graph Engine for GPU Runtimes
//!
//! Lanegraph is the execution-graph subsystem of a GPU compute runtime: it
//! captures a DAG of heterogeneous operations (kernel dispatches, memory
//! copies and fills, host callbacks, event record/wait, nested sub-graphs),
//! instantiates the DAG into a fixed, replayable plan, and replays that plan
//! with minimal per-launch overhead across a pool of device queues.
//!
//! ## Core Concepts
//!
//! - **Nodes**: one operation each, tracked with a level (longest path from
//!   any root) and dependency/edge lists
//! - **Graph**: the mutable DAG; owns its nodes, validates every handle and
//!   parameter before mutating anything
//! - **Parallel lists ("lanes")**: maximal sequential chains discovered by the
//!   scheduling analysis; distinct lanes replay concurrently on distinct
//!   queues
//! - **ExecutableGraph**: a deep-cloned snapshot plus the precomputed plan —
//!   lane partition, wait lists, level order, and an up-front queue pool
//! - **Substrate**: trait contracts for the queues, commands, events, memory
//!   classification, and kernel resolution the engine drives but never
//!   implements
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lanegraph::context::EngineContext;
//! use lanegraph::graph::Graph;
//! use lanegraph::nodes::{KernelParams, MemsetParams};
//!
//! let ctx = EngineContext::new(my_substrate());
//! let mut graph = Graph::new(ctx);
//!
//! let fill = graph.add_memset_node(fill_params, &[])?;
//! let launch = graph.add_kernel_node(kernel_params, &[fill])?;
//! let done = graph.add_empty_node(&[launch])?;
//!
//! let mut exec = graph.instantiate()?;
//! exec.run(&stream)?;   // replay as often as needed
//! exec.run(&stream)?;
//! # Ok::<(), lanegraph::error::GraphError>(())
//! ```
//!
//! ## Ordering model
//!
//! Within a lane, commands execute in enqueue order on one queue. Across
//! lanes, every graph edge is enforced by inserting the dependency's last
//! command into the dependent's wait list — a happens-before relation honored
//! by the substrate, never by blocking the calling thread. One replay is a
//! single-threaded walk of the plan; concurrent replays of the same
//! [`exec::ExecutableGraph`] require external serialization.
//!
//! ## Module Guide
//!
//! - [`graph`] - DAG construction, cloning, and scheduling analysis
//! - [`nodes`] - node kinds, parameter validation, in-place updates
//! - [`exec`] - instantiated plans: queue pool, replay, parameter updates
//! - [`substrate`] - collaborator contracts (queues, commands, events, memory)
//! - [`registry`] - live-set handle registry for API-boundary validity checks
//! - [`context`] - injected service bundle shared across a runtime
//! - [`error`] - error taxonomy with diagnostic codes
//! - [`config`] / [`telemetry`] - environment tunables and tracing bootstrap

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod graph;
pub mod nodes;
pub mod registry;
pub mod substrate;
pub mod telemetry;
pub mod types;
