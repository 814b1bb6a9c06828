//! Host callback nodes.
//!
//! Command creation produces a bare marker. The callback itself is installed
//! at enqueue time through the command's completion-callback mechanism,
//! followed by a blocking barrier so the logical stream stalls until the
//! callback's side effects are visible.

use std::fmt;

use tracing::warn;

use crate::error::GraphError;
use crate::substrate::{CommandRef, HostCallback, QueueRef};

/// Parameters of a host node: the callback to run between device work.
#[derive(Clone)]
pub struct HostParams {
    pub callback: HostCallback,
}

impl HostParams {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            callback: std::sync::Arc::new(callback),
        }
    }
}

impl fmt::Debug for HostParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostParams").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct HostNode {
    params: HostParams,
}

impl HostNode {
    pub(crate) fn new(params: HostParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &HostParams {
        &self.params
    }

    pub(crate) fn create_commands(&self, queue: &QueueRef) -> Result<Vec<CommandRef>, GraphError> {
        Ok(vec![queue.marker(Vec::new())?])
    }

    pub(crate) fn enqueue(
        &self,
        commands: &[CommandRef],
        queue: &QueueRef,
    ) -> Result<(), GraphError> {
        let Some(command) = commands.first() else {
            return Ok(());
        };
        if !command.set_callback(self.params.callback.clone()) {
            warn!("substrate rejected host-node completion callback");
        }
        command.enqueue()?;
        // Stall the stream until the callback has run.
        let barrier = queue.marker(vec![command.clone()])?;
        barrier.enqueue()?;
        Ok(())
    }

    pub(crate) fn set_params(&mut self, params: HostParams) {
        self.params = params;
    }
}
