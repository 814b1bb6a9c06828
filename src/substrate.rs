//! Contracts for the execution substrate consumed by the graph engine.
//!
//! The engine never executes anything itself: it turns a graph into opaque
//! commands bound to queues and hands them to these collaborators. Everything
//! here is a trait object so the engine can be driven by a real device backend
//! or by the in-process mock used in the test suite.
//!
//! Queue and command lifetimes are reference counted through [`Arc`]:
//! releasing a queue or command is dropping the last clone of its handle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::types::{CopyKind, DevicePtr, Dim3, Extent3, Origin3, PitchedPtr, SymbolRef};
use crate::types::KernelRef;

/// Shared handle to an opaque unit of asynchronous work.
pub type CommandRef = Arc<dyn Command>;

/// Shared handle to a unit of ordered asynchronous execution.
pub type QueueRef = Arc<dyn Queue>;

/// Shared handle to an event usable by record/wait nodes.
pub type EventRef = Arc<dyn Event>;

/// Resolved device function handle.
pub type FunctionRef = Arc<dyn KernelFunction>;

/// Callback installed on a host node's marker command.
pub type HostCallback = Arc<dyn Fn() + Send + Sync>;

/// Errors reported by substrate collaborators.
#[derive(Debug, Error, Diagnostic)]
pub enum SubstrateError {
    /// Queue or command creation failed for lack of device resources.
    #[error("substrate out of resources: {what}")]
    #[diagnostic(code(lanegraph::substrate::out_of_resources))]
    OutOfResources { what: String },

    /// Command submission was rejected by the queue.
    #[error("command submission failed: {reason}")]
    #[diagnostic(code(lanegraph::substrate::submit))]
    SubmitFailed { reason: String },

    /// The kernel reference is unknown to the loaded modules.
    #[error("unknown kernel: {name}")]
    #[diagnostic(code(lanegraph::substrate::unknown_kernel))]
    UnknownKernel { name: String },
}

/// An opaque unit of asynchronous work bound to one queue.
///
/// Commands are created in the `Bound` state and become visible to the device
/// when [`enqueue`](Command::enqueue) is called. Wait-list extension and
/// callback installation must happen before enqueue.
pub trait Command: Send + Sync {
    /// Submit the command to its queue.
    fn enqueue(&self) -> Result<(), SubstrateError>;

    /// Extend the command's wait-list: it may not begin executing before every
    /// listed command has completed.
    fn add_wait_list(&self, waits: &[CommandRef]);

    /// Install a completion callback. Returns `false` when the substrate
    /// cannot honor callbacks on this command.
    fn set_callback(&self, _callback: HostCallback) -> bool {
        false
    }

    /// Downcast seam for backends that need their concrete command type back.
    fn as_any(&self) -> &dyn Any;
}

/// A unit of ordered asynchronous execution.
///
/// Commands enqueued on one queue execute in enqueue order; distinct queues
/// execute concurrently with respect to each other and the host thread.
pub trait Queue: Send + Sync {
    /// Build a kernel dispatch command bound to this queue.
    fn dispatch_command(&self, dispatch: &KernelDispatch) -> Result<CommandRef, SubstrateError>;

    /// Build a memory copy command bound to this queue.
    fn copy_command(&self, request: &CopyRequest) -> Result<CommandRef, SubstrateError>;

    /// Build a memory fill command bound to this queue.
    fn fill_command(&self, request: &FillRequest) -> Result<CommandRef, SubstrateError>;

    /// Build a no-op marker depending on `waits`. Markers are the engine's
    /// structural joins, fan-out barriers, and host-callback fences.
    fn marker(&self, waits: Vec<CommandRef>) -> Result<CommandRef, SubstrateError>;

    /// Block until every command enqueued so far has completed.
    fn finish(&self);

    /// The most recently enqueued command, if any.
    fn last_command(&self) -> Option<CommandRef>;

    /// Downcast seam for backends that need their concrete queue type back.
    fn as_any(&self) -> &dyn Any;
}

/// Allocates queues for an [`ExecutableGraph`](crate::exec::ExecutableGraph)'s
/// pool.
pub trait QueueProvider: Send + Sync {
    fn create_queue(&self) -> Result<QueueRef, SubstrateError>;
}

/// Event collaborator used opaquely by record/wait nodes.
pub trait Event: Send + Sync {
    /// Build the command that records this event on `queue`.
    fn record_command(&self, queue: &QueueRef) -> Result<CommandRef, SubstrateError>;

    /// Build the command that stalls `queue` until this event is recorded.
    fn wait_command(&self, queue: &QueueRef) -> Result<CommandRef, SubstrateError>;

    /// Non-blocking completion poll.
    fn query(&self) -> bool;

    /// Block until the event has completed.
    fn synchronize(&self);
}

/// A registered device allocation, as reported by the memory collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub base: DevicePtr,
    pub size: usize,
}

impl Allocation {
    /// Bytes remaining between `ptr` and the end of the allocation, or `None`
    /// when `ptr` is outside it.
    #[must_use]
    pub fn remaining_from(&self, ptr: DevicePtr) -> Option<usize> {
        let offset = ptr.offset_from(self.base)?;
        let offset = usize::try_from(offset).ok()?;
        (offset <= self.size).then(|| self.size - offset)
    }
}

/// A resolved device symbol: base address plus bound size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolBinding {
    pub address: DevicePtr,
    pub size: usize,
}

/// Address classification and symbol resolution service.
///
/// Addresses with no registered allocation classify as host memory, matching
/// the runtime's pointer-registry behavior.
pub trait MemoryProvider: Send + Sync {
    /// Find the device allocation containing `ptr`, if any.
    fn lookup(&self, ptr: DevicePtr) -> Option<Allocation>;

    /// Resolve a named symbol to its device address and bound size.
    fn resolve_symbol(&self, symbol: &SymbolRef) -> Option<SymbolBinding>;
}

/// Resolves logical kernel references to device function handles.
pub trait KernelProvider: Send + Sync {
    fn resolve(&self, kernel: &KernelRef) -> Result<FunctionRef, SubstrateError>;
}

/// A resolved device function: the signature drives kernel-argument buffer
/// sizing and reconciliation.
pub trait KernelFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Byte size of each formal parameter, in declaration order.
    fn arg_sizes(&self) -> &[usize];
}

/// Bundle of substrate services injected into the engine.
#[derive(Clone)]
pub struct Substrate {
    pub queues: Arc<dyn QueueProvider>,
    pub memory: Arc<dyn MemoryProvider>,
    pub kernels: Arc<dyn KernelProvider>,
}

impl fmt::Debug for Substrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Substrate").finish_non_exhaustive()
    }
}

// ============================================================================
// Command request descriptors
// ============================================================================

/// Deep-copied kernel arguments held by a kernel node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelArguments {
    /// One buffer per formal parameter, sized by the resolved signature.
    PerParam(Vec<Box<[u8]>>),
    /// A single packed argument buffer.
    Packed(Box<[u8]>),
}

impl KernelArguments {
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match self {
            Self::PerParam(bufs) => bufs.len(),
            Self::Packed(_) => 1,
        }
    }
}

/// Fully resolved kernel dispatch handed to [`Queue::dispatch_command`].
#[derive(Clone)]
pub struct KernelDispatch {
    pub function: FunctionRef,
    pub grid_dim: Dim3,
    pub block_dim: Dim3,
    pub shared_mem_bytes: u32,
    pub args: KernelArguments,
}

impl fmt::Debug for KernelDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDispatch")
            .field("function", &self.function.name())
            .field("grid_dim", &self.grid_dim)
            .field("block_dim", &self.block_dim)
            .field("shared_mem_bytes", &self.shared_mem_bytes)
            .finish_non_exhaustive()
    }
}

/// Copy geometry handed to [`Queue::copy_command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyRequest {
    Linear {
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        kind: CopyKind,
    },
    Pitched {
        dst: PitchedPtr,
        dst_origin: Origin3,
        src: PitchedPtr,
        src_origin: Origin3,
        extent: Extent3,
        kind: CopyKind,
    },
}

/// Fill geometry handed to [`Queue::fill_command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillRequest {
    /// Uniform fill of a contiguous range.
    Linear {
        dst: DevicePtr,
        value: u32,
        element_size: u32,
        bytes: usize,
    },
    /// Pitched fill of a 3D region.
    Pitched {
        dst: DevicePtr,
        pitch: usize,
        value: u32,
        element_size: u32,
        extent: Extent3,
    },
}
