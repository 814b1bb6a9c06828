//! Core identity and geometry types for the lanegraph engine.
//!
//! This module defines the fundamental vocabulary shared by every other module:
//! entity identifiers, the closed set of node kinds, and the plain-data
//! primitives (device pointers, launch dimensions, copy geometry) that node
//! parameters are built from.
//!
//! Identifiers are allocated from process-wide monotonic counters, never
//! reused, and are the keys tracked by the [`HandleRegistry`](crate::registry::HandleRegistry).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EXEC_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a node instance.
///
/// Every constructed node — including clones made during instantiation — gets
/// a fresh id. Ids are never reused for the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Unique identifier of a [`Graph`](crate::graph::Graph) instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct GraphId(pub u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Unique identifier of an [`ExecutableGraph`](crate::exec::ExecutableGraph) instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ExecId(pub u64);

impl ExecId {
    pub(crate) fn next() -> Self {
        ExecId(NEXT_EXEC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Operation kind of a graph node.
///
/// The set is closed: scheduling, cloning and parameter-update behavior is
/// dispatched over exactly these variants and nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Device kernel dispatch.
    Kernel,
    /// Pitched (up to 3D) memory copy.
    Memcpy,
    /// Flat byte-count memory copy.
    Memcpy1D,
    /// Copy into a named device symbol.
    MemcpyToSymbol,
    /// Copy out of a named device symbol.
    MemcpyFromSymbol,
    /// Memory fill.
    Memset,
    /// Record an event at this point of the plan.
    EventRecord,
    /// Stall until an event has been recorded.
    EventWait,
    /// Host callback executed between device work.
    Host,
    /// Structural no-op used for joins and forks.
    Empty,
    /// An embedded sub-graph scheduled as a single unit.
    ChildGraph,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kernel => "kernel",
            Self::Memcpy => "memcpy",
            Self::Memcpy1D => "memcpy1d",
            Self::MemcpyToSymbol => "memcpy-to-symbol",
            Self::MemcpyFromSymbol => "memcpy-from-symbol",
            Self::Memset => "memset",
            Self::EventRecord => "event-record",
            Self::EventWait => "event-wait",
            Self::Host => "host",
            Self::Empty => "empty",
            Self::ChildGraph => "child-graph",
        };
        write!(f, "{name}")
    }
}

/// Opaque device-visible address.
///
/// The engine never dereferences these; they are tokens handed to the memory
/// collaborator for classification and bounds checks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    pub const NULL: DevicePtr = DevicePtr(0);

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Byte offset of `self` within an allocation starting at `base`.
    ///
    /// Returns `None` when `self` lies before `base`.
    #[must_use]
    pub fn offset_from(&self, base: DevicePtr) -> Option<u64> {
        self.0.checked_sub(base.0)
    }

    #[must_use]
    pub fn wrapping_add(&self, bytes: u64) -> DevicePtr {
        DevicePtr(self.0.wrapping_add(bytes))
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Three-dimensional launch extent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    pub const ONE: Dim3 = Dim3 { x: 1, y: 1, z: 1 };

    #[must_use]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn volume(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }

    /// True when every component is non-zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.x != 0 && self.y != 0 && self.z != 0
    }
}

impl From<(u32, u32, u32)> for Dim3 {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self { x, y, z }
    }
}

/// Declared direction of a memory copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CopyKind {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

/// Side of a copy as classified by the memory collaborator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MemSpace {
    Host,
    Device,
}

impl CopyKind {
    /// Memory space the source address must classify as.
    #[must_use]
    pub fn src_space(&self) -> MemSpace {
        match self {
            Self::HostToHost | Self::HostToDevice => MemSpace::Host,
            Self::DeviceToHost | Self::DeviceToDevice => MemSpace::Device,
        }
    }

    /// Memory space the destination address must classify as.
    #[must_use]
    pub fn dst_space(&self) -> MemSpace {
        match self {
            Self::HostToHost | Self::DeviceToHost => MemSpace::Host,
            Self::HostToDevice | Self::DeviceToDevice => MemSpace::Device,
        }
    }
}

impl fmt::Display for CopyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HostToHost => "host-to-host",
            Self::HostToDevice => "host-to-device",
            Self::DeviceToHost => "device-to-host",
            Self::DeviceToDevice => "device-to-device",
        };
        write!(f, "{name}")
    }
}

/// Base pointer plus row pitch for pitched copies.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PitchedPtr {
    pub ptr: DevicePtr,
    /// Bytes between the start of consecutive rows.
    pub pitch: usize,
}

/// Element offset into a pitched region.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Origin3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

/// Width/height/depth of a transfer or fill, in bytes × rows × slices.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Extent3 {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Extent3 {
    #[must_use]
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self { width, height, depth }
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.width != 0 && self.height != 0 && self.depth != 0
    }
}

/// Logical reference to a compiled kernel, resolved to a function handle by the
/// kernel collaborator at command-creation time.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct KernelRef(pub String);

impl KernelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for KernelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named device symbol, resolved to an address and bound size by the memory
/// collaborator.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SymbolRef(pub String);

impl SymbolRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
