//! In-process mock substrate: deterministic queues, commands, events, memory
//! classification, and kernel resolution for driving the engine in tests.
//!
//! Every enqueue is recorded on a trace channel as an [`EnqueueRecord`];
//! tests drain the channel and assert on the observed command DAG shape.
//! "Completion" is simulated synchronously: a command's callback runs the
//! moment it is enqueued.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Weak;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use lanegraph::substrate::{
    Allocation, Command, CommandRef, CopyRequest, Event, EventRef, FillRequest, FunctionRef,
    HostCallback, KernelDispatch, KernelFunction, KernelProvider, MemoryProvider, Queue,
    QueueProvider, QueueRef, Substrate, SubstrateError, SymbolBinding,
};
use lanegraph::types::{DevicePtr, KernelRef, SymbolRef};

/// Kind tag recorded for every mock command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockKind {
    Dispatch,
    Copy,
    Fill,
    Marker,
    EventRecord,
    EventWait,
}

/// One observed submission.
#[derive(Clone, Debug)]
pub struct EnqueueRecord {
    pub cmd: u64,
    pub queue: u64,
    pub kind: MockKind,
    pub waits: Vec<u64>,
}

pub struct MockHub {
    next_cmd: AtomicU64,
    next_queue: AtomicU64,
    next_ptr: AtomicU64,
    trace_tx: Sender<EnqueueRecord>,
    trace_rx: Receiver<EnqueueRecord>,
    allocations: Mutex<Vec<Allocation>>,
    symbols: Mutex<FxHashMap<String, SymbolBinding>>,
    kernels: Mutex<FxHashMap<String, FunctionRef>>,
    pub fail_queue_creation: AtomicBool,
    pub fail_fill_creation: AtomicBool,
    pub reject_callbacks: AtomicBool,
}

impl MockHub {
    fn new() -> Arc<Self> {
        let (trace_tx, trace_rx) = flume::unbounded();
        Arc::new(Self {
            next_cmd: AtomicU64::new(1),
            next_queue: AtomicU64::new(1),
            next_ptr: AtomicU64::new(0x1000),
            trace_tx,
            trace_rx,
            allocations: Mutex::new(Vec::new()),
            symbols: Mutex::new(FxHashMap::default()),
            kernels: Mutex::new(FxHashMap::default()),
            fail_queue_creation: AtomicBool::new(false),
            fail_fill_creation: AtomicBool::new(false),
            reject_callbacks: AtomicBool::new(false),
        })
    }

    /// Drain every record observed since the last drain.
    pub fn drain(&self) -> Vec<EnqueueRecord> {
        self.trace_rx.try_iter().collect()
    }

    /// Register a device allocation and return its base address.
    pub fn device_alloc(self: &Arc<Self>, size: usize) -> DevicePtr {
        let base = DevicePtr(self.next_ptr.fetch_add((size as u64 + 0xff) & !0xff, Ordering::Relaxed));
        self.allocations.lock().push(Allocation { base, size });
        base
    }

    /// A fresh address with no registered allocation; classifies as host.
    pub fn host_ptr(self: &Arc<Self>, size: usize) -> DevicePtr {
        DevicePtr(self.next_ptr.fetch_add((size as u64 + 0xff) & !0xff, Ordering::Relaxed))
    }

    /// Register a named device symbol of `size` bytes.
    pub fn define_symbol(self: &Arc<Self>, name: &str, size: usize) -> SymbolRef {
        let address = self.device_alloc(size);
        self.symbols
            .lock()
            .insert(name.to_string(), SymbolBinding { address, size });
        SymbolRef::new(name)
    }

    /// Register a kernel with the given per-argument byte sizes.
    pub fn define_kernel(self: &Arc<Self>, name: &str, arg_sizes: &[usize]) -> KernelRef {
        let function: FunctionRef = Arc::new(MockFunction {
            name: name.to_string(),
            arg_sizes: arg_sizes.to_vec(),
        });
        self.kernels.lock().insert(name.to_string(), function);
        KernelRef::new(name)
    }

    pub fn event(self: &Arc<Self>) -> EventRef {
        Arc::new(MockEvent)
    }

    pub fn create_queue(self: &Arc<Self>) -> Result<QueueRef, SubstrateError> {
        if self.fail_queue_creation.load(Ordering::Relaxed) {
            return Err(SubstrateError::OutOfResources {
                what: "queue".to_string(),
            });
        }
        let id = self.next_queue.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MockQueue {
            id,
            hub: self.clone(),
            last: Arc::new(Mutex::new(None)),
        }))
    }

    pub fn substrate(self: &Arc<Self>) -> Substrate {
        Substrate {
            queues: Arc::new(Providers(self.clone())),
            memory: Arc::new(Providers(self.clone())),
            kernels: Arc::new(Providers(self.clone())),
        }
    }
}

/// Build a hub plus its [`Substrate`] view.
pub fn mock_substrate() -> (Arc<MockHub>, Substrate) {
    let hub = MockHub::new();
    let substrate = hub.substrate();
    (hub, substrate)
}

struct Providers(Arc<MockHub>);

impl QueueProvider for Providers {
    fn create_queue(&self) -> Result<QueueRef, SubstrateError> {
        self.0.create_queue()
    }
}

impl MemoryProvider for Providers {
    fn lookup(&self, ptr: DevicePtr) -> Option<Allocation> {
        self.0
            .allocations
            .lock()
            .iter()
            .find(|a| ptr.0 >= a.base.0 && ptr.0 < a.base.0 + a.size as u64)
            .copied()
    }

    fn resolve_symbol(&self, symbol: &SymbolRef) -> Option<SymbolBinding> {
        self.0.symbols.lock().get(&symbol.0).copied()
    }
}

impl KernelProvider for Providers {
    fn resolve(&self, kernel: &KernelRef) -> Result<FunctionRef, SubstrateError> {
        self.0
            .kernels
            .lock()
            .get(&kernel.0)
            .cloned()
            .ok_or_else(|| SubstrateError::UnknownKernel {
                name: kernel.0.clone(),
            })
    }
}

struct MockFunction {
    name: String,
    arg_sizes: Vec<usize>,
}

impl KernelFunction for MockFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arg_sizes(&self) -> &[usize] {
        &self.arg_sizes
    }
}

pub struct MockQueue {
    pub id: u64,
    hub: Arc<MockHub>,
    last: Arc<Mutex<Option<CommandRef>>>,
}

impl MockQueue {
    fn make_command(&self, kind: MockKind, waits: Vec<CommandRef>) -> CommandRef {
        let id = self.hub.next_cmd.fetch_add(1, Ordering::Relaxed);
        let command: Arc<MockCommand> = Arc::new_cyclic(|weak| MockCommand {
            id,
            kind,
            queue_id: self.id,
            hub: self.hub.clone(),
            last_slot: self.last.clone(),
            waits: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
            weak: weak.clone(),
        });
        let as_ref: CommandRef = command;
        as_ref.add_wait_list(&waits);
        as_ref
    }
}

impl Queue for MockQueue {
    fn dispatch_command(&self, _dispatch: &KernelDispatch) -> Result<CommandRef, SubstrateError> {
        Ok(self.make_command(MockKind::Dispatch, Vec::new()))
    }

    fn copy_command(&self, _request: &CopyRequest) -> Result<CommandRef, SubstrateError> {
        Ok(self.make_command(MockKind::Copy, Vec::new()))
    }

    fn fill_command(&self, _request: &FillRequest) -> Result<CommandRef, SubstrateError> {
        if self.hub.fail_fill_creation.load(Ordering::Relaxed) {
            return Err(SubstrateError::OutOfResources {
                what: "fill command".to_string(),
            });
        }
        Ok(self.make_command(MockKind::Fill, Vec::new()))
    }

    fn marker(&self, waits: Vec<CommandRef>) -> Result<CommandRef, SubstrateError> {
        Ok(self.make_command(MockKind::Marker, waits))
    }

    fn finish(&self) {}

    fn last_command(&self) -> Option<CommandRef> {
        self.last.lock().clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommand {
    pub id: u64,
    pub kind: MockKind,
    pub queue_id: u64,
    hub: Arc<MockHub>,
    last_slot: Arc<Mutex<Option<CommandRef>>>,
    waits: Mutex<Vec<u64>>,
    callback: Mutex<Option<HostCallback>>,
    weak: Weak<MockCommand>,
}

impl Command for MockCommand {
    fn enqueue(&self) -> Result<(), SubstrateError> {
        self.trace();
        if let Some(me) = self.weak.upgrade() {
            *self.last_slot.lock() = Some(me);
        }
        // Synchronous "completion".
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    fn add_wait_list(&self, waits: &[CommandRef]) {
        let mut own = self.waits.lock();
        for wait in waits {
            if let Some(mock) = wait.as_any().downcast_ref::<MockCommand>() {
                own.push(mock.id);
            }
        }
    }

    fn set_callback(&self, callback: HostCallback) -> bool {
        if self.hub.reject_callbacks.load(Ordering::Relaxed) {
            return false;
        }
        *self.callback.lock() = Some(callback);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl MockCommand {
    fn trace(&self) {
        let record = EnqueueRecord {
            cmd: self.id,
            queue: self.queue_id,
            kind: self.kind,
            waits: self.waits.lock().clone(),
        };
        let _ = self.hub.trace_tx.send(record);
    }
}

struct MockEvent;

impl Event for MockEvent {
    fn record_command(&self, queue: &QueueRef) -> Result<CommandRef, SubstrateError> {
        let queue = queue
            .as_any()
            .downcast_ref::<MockQueue>()
            .expect("mock queue");
        Ok(queue.make_command(MockKind::EventRecord, Vec::new()))
    }

    fn wait_command(&self, queue: &QueueRef) -> Result<CommandRef, SubstrateError> {
        let queue = queue
            .as_any()
            .downcast_ref::<MockQueue>()
            .expect("mock queue");
        Ok(queue.make_command(MockKind::EventWait, Vec::new()))
    }

    fn query(&self) -> bool {
        true
    }

    fn synchronize(&self) {}
}
