//! Inbound message model.
//!
//! The dispatcher never looks at a transport's wire format. Whatever the chat
//! transport receives is converted into an [`InboundMessage`] before it is
//! handed to [`crate::dispatch::Dispatcher::handle`].

use chrono::{DateTime, Utc};

/// The sender of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    /// Automated accounts (other bots, webhooks).
    pub bot: bool,
}

impl Author {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bot: false,
        }
    }

    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bot: true,
        }
    }
}

/// Kind of conversation a message was sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Shared, guild-like conversation (channel in a server/network).
    Guild,
    /// One-to-one conversation.
    Direct,
}

/// A message event delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport-assigned message id.
    pub id: String,
    pub author: Author,
    /// Channel/thread the message belongs to.
    pub conversation_id: String,
    /// Owning guild for guild-like conversations.
    pub guild_id: Option<String>,
    pub content: String,
    /// Set when this event is an edit of an earlier message.
    pub edited: bool,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a fresh, non-edited message in a guild-less (direct) conversation.
    pub fn new(
        id: impl Into<String>,
        author: Author,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author,
            conversation_id: conversation_id.into(),
            guild_id: None,
            content: content.into(),
            edited: false,
            timestamp: Utc::now(),
        }
    }

    /// Place the message in a guild-like conversation.
    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    /// Mark the message as an edit.
    pub fn edited(mut self) -> Self {
        self.edited = true;
        self
    }

    #[inline]
    pub fn channel_kind(&self) -> ChannelKind {
        if self.guild_id.is_some() {
            ChannelKind::Guild
        } else {
            ChannelKind::Direct
        }
    }

    /// Key identifying the (conversation, actor) pair.
    #[inline]
    pub fn session_key(&self) -> (String, String) {
        (self.conversation_id.clone(), self.author.id.clone())
    }
}
