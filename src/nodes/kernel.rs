//! Kernel dispatch nodes.
//!
//! A kernel node owns a deep copy of its launch parameters so it stays valid
//! independent of caller-owned memory. The function handle is resolved lazily
//! at command-creation time; switching the target function through
//! `set_params` reconciles every argument slot against the new signature.

use tracing::trace;

use crate::context::EngineContext;
use crate::error::GraphError;
use crate::substrate::{
    CommandRef, FunctionRef, KernelArguments, KernelDispatch, QueueRef,
};
use crate::types::{Dim3, KernelRef};

/// Launch parameters held by a kernel node.
#[derive(Clone, Debug)]
pub struct KernelParams {
    pub kernel: KernelRef,
    pub grid_dim: Dim3,
    pub block_dim: Dim3,
    pub shared_mem_bytes: u32,
    pub args: KernelArguments,
}

#[derive(Clone)]
pub struct KernelNode {
    params: KernelParams,
    function: Option<FunctionRef>,
}

impl KernelNode {
    pub(crate) fn new(params: KernelParams) -> Result<Self, GraphError> {
        validate_dims(&params)?;
        if params.kernel.0.is_empty() {
            return Err(GraphError::invalid_argument("empty kernel reference"));
        }
        Ok(Self {
            params,
            function: None,
        })
    }

    #[must_use]
    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    fn resolve(&self, ctx: &EngineContext) -> Result<FunctionRef, GraphError> {
        ctx.substrate
            .kernels
            .resolve(&self.params.kernel)
            .map_err(|_| GraphError::InvalidDeviceFunction {
                kernel: self.params.kernel.0.clone(),
            })
    }

    pub(crate) fn create_commands(
        &mut self,
        queue: &QueueRef,
        ctx: &EngineContext,
    ) -> Result<Vec<CommandRef>, GraphError> {
        validate_dims(&self.params)?;
        let function = match &self.function {
            Some(f) => f.clone(),
            None => {
                let f = self.resolve(ctx)?;
                trace!(kernel = %self.params.kernel, "resolved device function");
                self.function = Some(f.clone());
                f
            }
        };
        validate_args(&function, &self.params.args)?;
        let dispatch = KernelDispatch {
            function,
            grid_dim: self.params.grid_dim,
            block_dim: self.params.block_dim,
            shared_mem_bytes: self.params.shared_mem_bytes,
            args: self.params.args.clone(),
        };
        Ok(vec![queue.dispatch_command(&dispatch)?])
    }

    /// Replace the launch parameters, possibly retargeting the node to a
    /// different function. All checks run before any state changes.
    pub(crate) fn set_params(
        &mut self,
        params: KernelParams,
        ctx: &EngineContext,
    ) -> Result<(), GraphError> {
        validate_dims(&params)?;
        let function = if self.function.is_none() || params.kernel != self.params.kernel {
            ctx.substrate
                .kernels
                .resolve(&params.kernel)
                .map_err(|_| GraphError::InvalidDeviceFunction {
                    kernel: params.kernel.0.clone(),
                })?
        } else {
            self.function
                .clone()
                .expect("function resolved when kernel ref unchanged")
        };
        let args = reconcile_args(&function, params.args)?;
        self.function = Some(function);
        self.params = KernelParams { args, ..params };
        Ok(())
    }
}

fn validate_dims(params: &KernelParams) -> Result<(), GraphError> {
    if !params.grid_dim.is_positive() {
        return Err(GraphError::invalid_argument("kernel grid dimension is zero"));
    }
    if !params.block_dim.is_positive() {
        return Err(GraphError::invalid_argument("kernel block dimension is zero"));
    }
    Ok(())
}

fn validate_args(function: &FunctionRef, args: &KernelArguments) -> Result<(), GraphError> {
    match args {
        KernelArguments::PerParam(bufs) => {
            let sizes = function.arg_sizes();
            if bufs.len() != sizes.len() {
                return Err(GraphError::invalid_argument(format!(
                    "kernel {} expects {} arguments, got {}",
                    function.name(),
                    sizes.len(),
                    bufs.len()
                )));
            }
            for (i, (buf, size)) in bufs.iter().zip(sizes).enumerate() {
                if buf.len() != *size {
                    return Err(GraphError::invalid_argument(format!(
                        "kernel argument {i} is {} bytes, signature says {size}",
                        buf.len()
                    )));
                }
            }
            Ok(())
        }
        KernelArguments::Packed(buf) => {
            if buf.is_empty() {
                return Err(GraphError::invalid_argument("empty packed argument buffer"));
            }
            Ok(())
        }
    }
}

/// Fit incoming argument buffers to the target function's signature: slot
/// count changes and per-slot byte-size changes are each reconciled, so a
/// retargeted node ends up with exactly one correctly sized buffer per formal
/// parameter.
fn reconcile_args(
    function: &FunctionRef,
    incoming: KernelArguments,
) -> Result<KernelArguments, GraphError> {
    match incoming {
        KernelArguments::PerParam(bufs) => {
            let sizes = function.arg_sizes();
            if bufs.len() < sizes.len() {
                return Err(GraphError::invalid_argument(format!(
                    "kernel {} expects {} arguments, got {}",
                    function.name(),
                    sizes.len(),
                    bufs.len()
                )));
            }
            let mut fitted = Vec::with_capacity(sizes.len());
            for (i, size) in sizes.iter().enumerate() {
                let buf = &bufs[i];
                if buf.len() < *size {
                    return Err(GraphError::invalid_argument(format!(
                        "kernel argument {i} is {} bytes, signature needs {size}",
                        buf.len()
                    )));
                }
                fitted.push(buf[..*size].to_vec().into_boxed_slice());
            }
            Ok(KernelArguments::PerParam(fitted))
        }
        KernelArguments::Packed(buf) => {
            if buf.is_empty() {
                return Err(GraphError::invalid_argument("empty packed argument buffer"));
            }
            Ok(KernelArguments::Packed(buf))
        }
    }
}
