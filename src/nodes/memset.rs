//! Memory fill nodes.

use crate::context::EngineContext;
use crate::error::GraphError;
use crate::substrate::{CommandRef, FillRequest, QueueRef};
use crate::types::{DevicePtr, Extent3};

/// Parameters of a fill. `width`/`height` count elements and rows; a
/// single-row fill takes the linear fast path, everything else goes through
/// the pitched 3D path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemsetParams {
    pub dst: DevicePtr,
    pub value: u32,
    /// Bytes per element; one of 1, 2, or 4.
    pub element_size: u32,
    /// Row width in elements.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Bytes between row starts; ignored when `height == 1`.
    pub pitch: usize,
}

impl MemsetParams {
    fn span_bytes(&self) -> usize {
        let row = self.width * self.element_size as usize;
        if self.height == 1 {
            row
        } else {
            self.pitch * (self.height - 1) + row
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemsetNode {
    params: MemsetParams,
}

impl MemsetNode {
    pub(crate) fn new(params: MemsetParams, ctx: &EngineContext) -> Result<Self, GraphError> {
        Self::validate(&params, ctx)?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &MemsetParams {
        &self.params
    }

    fn validate(params: &MemsetParams, ctx: &EngineContext) -> Result<(), GraphError> {
        if params.dst.is_null() {
            return Err(GraphError::invalid_argument("null fill destination"));
        }
        if !matches!(params.element_size, 1 | 2 | 4) {
            return Err(GraphError::invalid_argument(format!(
                "fill element size must be 1, 2, or 4 bytes, got {}",
                params.element_size
            )));
        }
        if params.width == 0 || params.height == 0 {
            return Err(GraphError::invalid_argument("zero-sized fill extent"));
        }
        if params.height > 1 && params.pitch < params.width * params.element_size as usize {
            return Err(GraphError::invalid_argument("fill pitch narrower than row"));
        }
        if let Some(alloc) = ctx.substrate.memory.lookup(params.dst) {
            let remaining = alloc.remaining_from(params.dst).unwrap_or(0);
            if params.span_bytes() > remaining {
                return Err(GraphError::invalid_argument(format!(
                    "fill of {} bytes exceeds allocation ({remaining} bytes remaining)",
                    params.span_bytes()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn create_commands(
        &self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        Self::validate(&self.params, ctx)?;
        let request = if self.params.height == 1 {
            FillRequest::Linear {
                dst: self.params.dst,
                value: self.params.value,
                element_size: self.params.element_size,
                bytes: self.params.width * self.params.element_size as usize,
            }
        } else {
            FillRequest::Pitched {
                dst: self.params.dst,
                pitch: self.params.pitch,
                value: self.params.value,
                element_size: self.params.element_size,
                extent: Extent3::new(self.params.width, self.params.height, 1),
            }
        };
        Ok(vec![queue.fill_command(&request)?])
    }

    pub(crate) fn set_params(
        &mut self,
        params: MemsetParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        Self::validate(&params, ctx)?;
        self.params = params;
        Ok(())
    }
}
