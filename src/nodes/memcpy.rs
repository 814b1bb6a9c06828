//! Memory copy nodes: pitched 3D, flat 1D, and the symbol variants.
//!
//! Every variant validates addresses, sizes, and offsets against the memory
//! collaborator's classification of each endpoint before a command is created
//! or parameters are replaced. A classification that contradicts the declared
//! [`CopyKind`] is an [`GraphError::InvalidCopyDirection`] error.

use crate::context::EngineContext;
use crate::error::GraphError;
use crate::substrate::{CommandRef, CopyRequest, QueueRef, SymbolBinding};
use crate::types::{CopyKind, DevicePtr, Extent3, MemSpace, Origin3, PitchedPtr, SymbolRef};

fn classify(ctx: &EngineContext, ptr: DevicePtr) -> MemSpace {
    if ctx.substrate.memory.lookup(ptr).is_some() {
        MemSpace::Device
    } else {
        MemSpace::Host
    }
}

fn check_direction(
    ctx: &EngineContext,
    src: DevicePtr,
    dst: DevicePtr,
    kind: CopyKind,
) -> Result<(), GraphError> {
    if classify(ctx, src) != kind.src_space() || classify(ctx, dst) != kind.dst_space() {
        return Err(GraphError::InvalidCopyDirection { kind });
    }
    Ok(())
}

/// Fail when `ptr` lies inside a registered allocation that cannot hold
/// `bytes` more bytes. Unregistered (host) pointers are not bounds-checked.
fn check_bounds(
    ctx: &EngineContext,
    ptr: DevicePtr,
    bytes: usize,
    what: &str,
) -> Result<(), GraphError> {
    if let Some(alloc) = ctx.substrate.memory.lookup(ptr) {
        let remaining = alloc.remaining_from(ptr).unwrap_or(0);
        if bytes > remaining {
            return Err(GraphError::invalid_argument(format!(
                "{what} range of {bytes} bytes exceeds allocation ({remaining} bytes remaining)"
            )));
        }
    }
    Ok(())
}

fn resolve_symbol(ctx: &EngineContext, symbol: &SymbolRef) -> Result<SymbolBinding, GraphError> {
    ctx.substrate
        .memory
        .resolve_symbol(symbol)
        .ok_or_else(|| GraphError::invalid_argument(format!("unknown device symbol {symbol}")))
}

fn check_symbol_range(
    binding: SymbolBinding,
    symbol: &SymbolRef,
    offset: usize,
    count: usize,
) -> Result<(), GraphError> {
    let end = offset
        .checked_add(count)
        .ok_or_else(|| GraphError::invalid_argument("symbol range overflows"))?;
    if end > binding.size {
        return Err(GraphError::invalid_argument(format!(
            "range {offset}+{count} exceeds symbol {symbol} bound of {} bytes",
            binding.size
        )));
    }
    Ok(())
}

// ============================================================================
// Pitched 3D copy
// ============================================================================

/// Parameters of a pitched (up to 3D) copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memcpy3dParams {
    pub src: PitchedPtr,
    pub src_origin: Origin3,
    pub dst: PitchedPtr,
    pub dst_origin: Origin3,
    /// Width in bytes, height in rows, depth in slices.
    pub extent: Extent3,
    pub kind: CopyKind,
}

/// Bytes spanned by a pitched access from `origin` over `extent`, assuming a
/// slice pitch of `pitch * extent.height`.
fn pitched_span(ptr: PitchedPtr, origin: Origin3, extent: Extent3) -> usize {
    let rows = (origin.z + extent.depth - 1) * extent.height + origin.y + extent.height - 1;
    rows * ptr.pitch + origin.x + extent.width
}

#[derive(Clone, Debug)]
pub struct MemcpyNode {
    params: Memcpy3dParams,
}

impl MemcpyNode {
    pub(crate) fn new(params: Memcpy3dParams, ctx: &EngineContext) -> Result<Self, GraphError> {
        Self::validate(&params, ctx)?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &Memcpy3dParams {
        &self.params
    }

    fn validate(params: &Memcpy3dParams, ctx: &EngineContext) -> Result<(), GraphError> {
        if !params.extent.is_positive() {
            return Err(GraphError::invalid_argument("zero-sized copy extent"));
        }
        if params.src.ptr.is_null() || params.dst.ptr.is_null() {
            return Err(GraphError::invalid_argument("null copy endpoint"));
        }
        if params.src.pitch < params.src_origin.x + params.extent.width {
            return Err(GraphError::invalid_argument("source pitch narrower than copied row"));
        }
        if params.dst.pitch < params.dst_origin.x + params.extent.width {
            return Err(GraphError::invalid_argument(
                "destination pitch narrower than copied row",
            ));
        }
        check_direction(ctx, params.src.ptr, params.dst.ptr, params.kind)?;
        check_bounds(
            ctx,
            params.src.ptr,
            pitched_span(params.src, params.src_origin, params.extent),
            "source",
        )?;
        check_bounds(
            ctx,
            params.dst.ptr,
            pitched_span(params.dst, params.dst_origin, params.extent),
            "destination",
        )?;
        Ok(())
    }

    pub(crate) fn create_commands(
        &self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        Self::validate(&self.params, ctx)?;
        let request = CopyRequest::Pitched {
            dst: self.params.dst,
            dst_origin: self.params.dst_origin,
            src: self.params.src,
            src_origin: self.params.src_origin,
            extent: self.params.extent,
            kind: self.params.kind,
        };
        Ok(vec![queue.copy_command(&request)?])
    }

    pub(crate) fn set_params(
        &mut self,
        params: Memcpy3dParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        Self::validate(&params, ctx)?;
        self.params = params;
        Ok(())
    }
}

// ============================================================================
// Flat 1D copy
// ============================================================================

/// Parameters of a flat byte-count copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memcpy1dParams {
    pub dst: DevicePtr,
    pub src: DevicePtr,
    pub count: usize,
    pub kind: CopyKind,
}

#[derive(Clone, Debug)]
pub struct Memcpy1dNode {
    params: Memcpy1dParams,
}

impl Memcpy1dNode {
    pub(crate) fn new(params: Memcpy1dParams, ctx: &EngineContext) -> Result<Self, GraphError> {
        Self::validate(&params, ctx)?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &Memcpy1dParams {
        &self.params
    }

    fn validate(params: &Memcpy1dParams, ctx: &EngineContext) -> Result<(), GraphError> {
        if params.dst.is_null() || params.src.is_null() {
            return Err(GraphError::invalid_argument("null copy endpoint"));
        }
        if params.count == 0 {
            return Err(GraphError::invalid_argument("zero-byte copy"));
        }
        check_direction(ctx, params.src, params.dst, params.kind)?;
        check_bounds(ctx, params.src, params.count, "source")?;
        check_bounds(ctx, params.dst, params.count, "destination")?;
        Ok(())
    }

    pub(crate) fn create_commands(
        &self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        Self::validate(&self.params, ctx)?;
        let request = CopyRequest::Linear {
            dst: self.params.dst,
            src: self.params.src,
            bytes: self.params.count,
            kind: self.params.kind,
        };
        Ok(vec![queue.copy_command(&request)?])
    }

    pub(crate) fn set_params(
        &mut self,
        params: Memcpy1dParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        Self::validate(&params, ctx)?;
        self.params = params;
        Ok(())
    }
}

// ============================================================================
// Symbol variants
// ============================================================================

/// Copy into a named device symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemcpyToSymbolParams {
    pub symbol: SymbolRef,
    pub src: DevicePtr,
    pub count: usize,
    /// Byte offset into the symbol's bound range.
    pub offset: usize,
    pub kind: CopyKind,
}

#[derive(Clone, Debug)]
pub struct MemcpyToSymbolNode {
    params: MemcpyToSymbolParams,
}

impl MemcpyToSymbolNode {
    pub(crate) fn new(
        params: MemcpyToSymbolParams,
        ctx: &EngineContext,
    ) -> Result<Self, GraphError> {
        Self::validate(&params, ctx)?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &MemcpyToSymbolParams {
        &self.params
    }

    fn validate(params: &MemcpyToSymbolParams, ctx: &EngineContext) -> Result<(), GraphError> {
        if params.src.is_null() {
            return Err(GraphError::invalid_argument("null copy source"));
        }
        if params.count == 0 {
            return Err(GraphError::invalid_argument("zero-byte copy"));
        }
        let binding = resolve_symbol(ctx, &params.symbol)?;
        check_symbol_range(binding, &params.symbol, params.offset, params.count)?;
        // The destination is device memory by definition of a symbol.
        if params.kind.dst_space() != MemSpace::Device
            || classify(ctx, params.src) != params.kind.src_space()
        {
            return Err(GraphError::InvalidCopyDirection { kind: params.kind });
        }
        check_bounds(ctx, params.src, params.count, "source")?;
        Ok(())
    }

    pub(crate) fn create_commands(
        &self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        Self::validate(&self.params, ctx)?;
        let binding = resolve_symbol(ctx, &self.params.symbol)?;
        let request = CopyRequest::Linear {
            dst: binding.address.wrapping_add(self.params.offset as u64),
            src: self.params.src,
            bytes: self.params.count,
            kind: self.params.kind,
        };
        Ok(vec![queue.copy_command(&request)?])
    }

    pub(crate) fn set_params(
        &mut self,
        params: MemcpyToSymbolParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        Self::validate(&params, ctx)?;
        self.params = params;
        Ok(())
    }
}

/// Copy out of a named device symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemcpyFromSymbolParams {
    pub dst: DevicePtr,
    pub symbol: SymbolRef,
    pub count: usize,
    /// Byte offset into the symbol's bound range.
    pub offset: usize,
    pub kind: CopyKind,
}

#[derive(Clone, Debug)]
pub struct MemcpyFromSymbolNode {
    params: MemcpyFromSymbolParams,
}

impl MemcpyFromSymbolNode {
    pub(crate) fn new(
        params: MemcpyFromSymbolParams,
        ctx: &EngineContext,
    ) -> Result<Self, GraphError> {
        Self::validate(&params, ctx)?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &MemcpyFromSymbolParams {
        &self.params
    }

    fn validate(params: &MemcpyFromSymbolParams, ctx: &EngineContext) -> Result<(), GraphError> {
        if params.dst.is_null() {
            return Err(GraphError::invalid_argument("null copy destination"));
        }
        if params.count == 0 {
            return Err(GraphError::invalid_argument("zero-byte copy"));
        }
        let binding = resolve_symbol(ctx, &params.symbol)?;
        check_symbol_range(binding, &params.symbol, params.offset, params.count)?;
        // The source is device memory by definition of a symbol.
        if params.kind.src_space() != MemSpace::Device
            || classify(ctx, params.dst) != params.kind.dst_space()
        {
            return Err(GraphError::InvalidCopyDirection { kind: params.kind });
        }
        check_bounds(ctx, params.dst, params.count, "destination")?;
        Ok(())
    }

    pub(crate) fn create_commands(
        &self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        Self::validate(&self.params, ctx)?;
        let binding = resolve_symbol(ctx, &self.params.symbol)?;
        let request = CopyRequest::Linear {
            dst: self.params.dst,
            src: binding.address.wrapping_add(self.params.offset as u64),
            bytes: self.params.count,
            kind: self.params.kind,
        };
        Ok(vec![queue.copy_command(&request)?])
    }

    pub(crate) fn set_params(
        &mut self,
        params: MemcpyFromSymbolParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        Self::validate(&params, ctx)?;
        self.params = params;
        Ok(())
    }
}
