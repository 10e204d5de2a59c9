//! Telemetry utilities for command timing and tracing spans.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped, so a faulting or cancelled
/// execution is still measured.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors for dispatch observability.
pub mod spans {
    use crate::message::InboundMessage;
    use tracing::{Span, debug_span, info_span};

    /// Span covering one inbound message's pipeline run.
    pub fn message(message: &InboundMessage) -> Span {
        debug_span!(
            "dispatch",
            message = %message.id,
            actor = %message.author.id,
            conversation = %message.conversation_id,
        )
    }

    /// Span covering a command's execution.
    pub fn command(command: &str, message: &InboundMessage) -> Span {
        info_span!(
            "command.exec",
            command = %command,
            actor = %message.author.id,
            conversation = %message.conversation_id,
            message = %message.id,
        )
    }
}
