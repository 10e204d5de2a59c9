//! Dispatcher events and the broadcast bus they travel on.
//!
//! Events are the dispatcher's only outward surface besides the return value
//! of [`super::Dispatcher::handle`]. Faults travel on a channel of their own
//! so that "is anyone handling faults" is a simple receiver count.

use crate::args::{Args, Value};
use crate::commands::Command;
use crate::error::Fault;
use crate::message::InboundMessage;
use crate::metrics;
use crate::security::{BlockReason, PermissionSide};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Something that happened while processing a message.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// Stopped by an `all` or `pre` gate.
    MessageBlocked {
        message: Arc<InboundMessage>,
        reason: BlockReason,
    },
    /// Nothing matched: no prefixed command, regex or condition.
    MessageInvalid { message: Arc<InboundMessage> },
    /// Delivered to the sender's active prompt instead of being dispatched.
    InPrompt { message: Arc<InboundMessage> },
    CommandDisabled {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
    },
    /// Stopped by a built-in restriction or a `post` gate.
    CommandBlocked {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        reason: BlockReason,
    },
    MissingPermissions {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        side: PermissionSide,
        missing: Vec<String>,
    },
    Cooldown {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        remaining: Duration,
    },
    /// Another invocation holds the command's lock key.
    CommandLocked {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
    },
    CommandStarted {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        args: Args,
    },
    CommandFinished {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        args: Args,
        value: Value,
    },
    CommandCancelled {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
    },
    /// A prompt reply was a command of its own and will be dispatched.
    CommandBreakout {
        message: Arc<InboundMessage>,
        command: Arc<Command>,
        breakout_message: Arc<InboundMessage>,
    },
}

impl DispatchEvent {
    /// Stable event name, used for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageBlocked { .. } => "message_blocked",
            Self::MessageInvalid { .. } => "message_invalid",
            Self::InPrompt { .. } => "in_prompt",
            Self::CommandDisabled { .. } => "command_disabled",
            Self::CommandBlocked { .. } => "command_blocked",
            Self::MissingPermissions { .. } => "missing_permissions",
            Self::Cooldown { .. } => "cooldown",
            Self::CommandLocked { .. } => "command_locked",
            Self::CommandStarted { .. } => "command_started",
            Self::CommandFinished { .. } => "command_finished",
            Self::CommandCancelled { .. } => "command_cancelled",
            Self::CommandBreakout { .. } => "command_breakout",
        }
    }

    /// The message the event is about.
    pub fn message(&self) -> &Arc<InboundMessage> {
        match self {
            Self::MessageBlocked { message, .. }
            | Self::MessageInvalid { message }
            | Self::InPrompt { message }
            | Self::CommandDisabled { message, .. }
            | Self::CommandBlocked { message, .. }
            | Self::MissingPermissions { message, .. }
            | Self::Cooldown { message, .. }
            | Self::CommandLocked { message, .. }
            | Self::CommandStarted { message, .. }
            | Self::CommandFinished { message, .. }
            | Self::CommandCancelled { message, .. }
            | Self::CommandBreakout { message, .. } => message,
        }
    }

    /// The command the event is about, for command-level events.
    pub fn command(&self) -> Option<&Arc<Command>> {
        match self {
            Self::MessageBlocked { .. } | Self::MessageInvalid { .. } | Self::InPrompt { .. } => None,
            Self::CommandDisabled { command, .. }
            | Self::CommandBlocked { command, .. }
            | Self::MissingPermissions { command, .. }
            | Self::Cooldown { command, .. }
            | Self::CommandLocked { command, .. }
            | Self::CommandStarted { command, .. }
            | Self::CommandFinished { command, .. }
            | Self::CommandCancelled { command, .. }
            | Self::CommandBreakout { command, .. } => Some(command),
        }
    }
}

/// A fault together with the message being processed when it happened.
#[derive(Debug, Clone)]
pub struct FaultEvent {
    pub message: Arc<InboundMessage>,
    pub fault: Fault,
}

/// Broadcast channels for events and faults.
#[derive(Debug)]
pub struct EventBus {
    events: broadcast::Sender<DispatchEvent>,
    faults: broadcast::Sender<FaultEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        let (faults, _) = broadcast::channel(capacity);
        Self { events, faults }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_faults(&self) -> broadcast::Receiver<FaultEvent> {
        self.faults.subscribe()
    }

    pub fn emit(&self, event: DispatchEvent) {
        metrics::record_event(event.name());
        debug!(
            event = event.name(),
            message = %event.message().id,
            command = event.command().map(|c| c.id.as_str()),
            "Dispatch event"
        );
        // no subscribers is fine for ordinary events
        let _ = self.events.send(event);
    }

    /// Hand `fault` to the fault subscribers.
    ///
    /// Gives the fault back when nobody is subscribed, so the caller can
    /// fail the pipeline run instead.
    pub fn fault(&self, message: &Arc<InboundMessage>, fault: Fault) -> Result<(), Fault> {
        if self.faults.receiver_count() == 0 {
            return Err(fault);
        }
        let event = FaultEvent {
            message: Arc::clone(message),
            fault,
        };
        self.faults.send(event).map(|_| ()).map_err(|e| e.0.fault)
    }
}
