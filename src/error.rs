//! Error taxonomy for graph construction, instantiation, and replay.
//!
//! All validation runs before any mutation or resource acquisition: a failed
//! call leaves prior state untouched. Failures during a replay abort the
//! remaining submission but never roll back commands already enqueued; the
//! caller observes that through the returned error.

use miette::Diagnostic;
use thiserror::Error;

use crate::substrate::SubstrateError;
use crate::types::CopyKind;

/// Errors surfaced by the graph engine.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// Null, zero-sized, or out-of-range operation parameters.
    #[error("invalid argument: {what}")]
    #[diagnostic(
        code(lanegraph::invalid_argument),
        help("Check the operation parameters against the node kind's constraints.")
    )]
    InvalidArgument { what: String },

    /// A handle that is stale, foreign to this graph, or of the wrong kind.
    #[error("invalid {kind} handle")]
    #[diagnostic(
        code(lanegraph::invalid_handle),
        help("The handle does not refer to a live entity owned by this graph.")
    )]
    InvalidHandle { kind: &'static str },

    /// Declared copy direction contradicts the host/device classification of
    /// the endpoints.
    #[error("invalid memcpy direction: {kind} does not match endpoint classification")]
    #[diagnostic(code(lanegraph::invalid_memcpy_direction))]
    InvalidCopyDirection { kind: CopyKind },

    /// Kernel reference could not be resolved to a device function.
    #[error("invalid device function: {kernel}")]
    #[diagnostic(code(lanegraph::invalid_device_function))]
    InvalidDeviceFunction { kernel: String },

    /// Host-side allocation failure for parameter buffers, queues, or commands.
    #[error("out of memory while allocating {what}")]
    #[diagnostic(code(lanegraph::out_of_memory))]
    OutOfMemory { what: &'static str },

    /// Operation or flag combination intentionally unimplemented.
    #[error("not supported: {what}")]
    #[diagnostic(code(lanegraph::not_supported))]
    NotSupported { what: String },

    /// Failure reported by the execution substrate and not otherwise
    /// classified.
    #[error(transparent)]
    #[diagnostic(code(lanegraph::substrate))]
    Substrate(#[from] SubstrateError),
}

impl GraphError {
    pub(crate) fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument { what: what.into() }
    }
}
