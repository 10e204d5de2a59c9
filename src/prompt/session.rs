//! Prompt sessions.
//!
//! At most one session exists per (conversation, actor). While it exists,
//! the dispatcher routes that pair's inbound messages into the session
//! instead of dispatching them. Dropping the [`PromptSession`] closes it.

use crate::message::InboundMessage;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// (conversation id, actor id).
pub type SessionKey = (String, String);

type Sessions = DashMap<SessionKey, mpsc::UnboundedSender<Arc<InboundMessage>>>;

/// Set of live prompt sessions.
#[derive(Debug, Clone, Default)]
pub struct PromptSessions {
    sessions: Arc<Sessions>,
}

impl PromptSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `key`; `None` if one is already live.
    pub fn open(&self, key: SessionKey) -> Option<PromptSession> {
        match self.sessions.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::unbounded_channel();
                slot.insert(tx);
                Some(PromptSession {
                    key,
                    rx,
                    sessions: Arc::clone(&self.sessions),
                })
            }
        }
    }

    pub fn is_active(&self, conversation: &str, actor: &str) -> bool {
        self.sessions
            .contains_key(&(conversation.to_string(), actor.to_string()))
    }

    /// Deliver `message` to its sender's session.
    ///
    /// Returns whether a session exists for the pair. Edits are swallowed
    /// rather than delivered.
    pub fn route(&self, message: &Arc<InboundMessage>) -> bool {
        let Some(tx) = self.sessions.get(&message.session_key()) else {
            return false;
        };
        if !message.edited {
            // a receiver dropped mid-route is equivalent to a closed session
            let _ = tx.send(Arc::clone(message));
        }
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A live prompt session; removed from the set on drop.
#[derive(Debug)]
pub struct PromptSession {
    key: SessionKey,
    rx: mpsc::UnboundedReceiver<Arc<InboundMessage>>,
    sessions: Arc<Sessions>,
}

impl PromptSession {
    /// Wait for the next reply; `None` on timeout.
    pub async fn next(&mut self, timeout: Duration) -> Option<Arc<InboundMessage>> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

impl Drop for PromptSession {
    fn drop(&mut self) {
        self.sessions.remove(&self.key);
    }
}
