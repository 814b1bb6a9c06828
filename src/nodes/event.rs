//! Event record and event wait nodes.
//!
//! Command construction is delegated to the event collaborator's own
//! record/wait factories; the nodes themselves carry no parameters beyond the
//! event handle.

use crate::error::GraphError;
use crate::substrate::{CommandRef, EventRef, QueueRef};

#[derive(Clone)]
pub struct EventRecordNode {
    event: EventRef,
}

impl EventRecordNode {
    pub(crate) fn new(event: EventRef) -> Self {
        Self { event }
    }

    #[must_use]
    pub fn event(&self) -> &EventRef {
        &self.event
    }

    pub(crate) fn create_commands(&self, queue: &QueueRef) -> Result<Vec<CommandRef>, GraphError> {
        Ok(vec![self.event.record_command(queue)?])
    }

    pub(crate) fn set_params(&mut self, event: EventRef) {
        self.event = event;
    }
}

#[derive(Clone)]
pub struct EventWaitNode {
    event: EventRef,
}

impl EventWaitNode {
    pub(crate) fn new(event: EventRef) -> Self {
        Self { event }
    }

    #[must_use]
    pub fn event(&self) -> &EventRef {
        &self.event
    }

    pub(crate) fn create_commands(&self, queue: &QueueRef) -> Result<Vec<CommandRef>, GraphError> {
        Ok(vec![self.event.wait_command(queue)?])
    }

    pub(crate) fn set_params(&mut self, event: EventRef) {
        self.event = event;
    }
}
