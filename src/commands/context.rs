//! Command execution context.

use super::command::Command;
use super::registry::CommandRegistry;
use crate::error::TransportError;
use crate::message::InboundMessage;
use crate::transport::Transport;
use std::sync::Arc;

/// Everything a handler needs to act on an invocation.
///
/// Passed explicitly to [`super::CommandHandler`] methods; cloning is cheap.
#[derive(Clone)]
pub struct CommandContext {
    /// Message that triggered the invocation.
    pub message: Arc<InboundMessage>,
    pub command: Arc<Command>,
    pub registry: Arc<CommandRegistry>,
    pub transport: Arc<dyn Transport>,
    /// Prefix the invocation used, `None` for regex/condition triggers.
    pub prefix: Option<String>,
    /// Alias the invocation used, `None` for regex/condition triggers.
    pub alias: Option<String>,
}

impl CommandContext {
    /// Send a message back into the triggering conversation.
    pub async fn reply(&self, content: &str) -> Result<(), TransportError> {
        self.transport
            .send_message(&self.message.conversation_id, content)
            .await
    }

    #[inline]
    pub fn actor(&self) -> &str {
        &self.message.author.id
    }

    #[inline]
    pub fn conversation(&self) -> &str {
        &self.message.conversation_id
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("message", &self.message.id)
            .field("command", &self.command.id)
            .field("prefix", &self.prefix)
            .field("alias", &self.alias)
            .finish()
    }
}
