//! Outbound side of the chat transport.
//!
//! The dispatcher only needs to send text into a conversation and, for
//! commands with `typing` set, toggle a typing indicator. Two implementations
//! ship with the crate:
//! - [`ChannelTransport`] forwards to an mpsc channel (console binary, tests).
//! - [`CapturingTransport`] buffers everything for later inspection.
//!
//! # Slow consumers
//!
//! `ChannelTransport` uses a bounded channel. A send that cannot be queued
//! within [`SEND_TIMEOUT`] fails with [`TransportError::Timeout`] instead of
//! blocking the pipeline forever.

use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Timeout for attempting to queue an outgoing message before giving up.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A message produced by the dispatcher or a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub conversation_id: String,
    pub content: String,
}

/// Capability set the dispatcher needs from the chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message into a conversation.
    async fn send_message(&self, conversation_id: &str, content: &str)
    -> Result<(), TransportError>;

    /// Show a typing indicator. No-op unless the transport supports it.
    async fn start_typing(&self, _conversation_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    /// Clear the typing indicator.
    async fn stop_typing(&self, _conversation_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport that forwards outgoing messages to a bounded mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelTransport {
    /// Create the transport together with the receiving end of its outbox.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        let out = Outbound {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
        };
        match tokio::time::timeout(SEND_TIMEOUT, self.tx.send(out)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_elapsed) => {
                tracing::warn!(
                    conversation = %conversation_id,
                    "outbox full: consumer not reading (timeout after {:?})",
                    SEND_TIMEOUT
                );
                Err(TransportError::Timeout)
            }
        }
    }
}

/// Transport that buffers every outgoing message in memory.
#[derive(Debug, Default)]
pub struct CapturingTransport {
    sent: Mutex<Vec<Outbound>>,
    typing: Mutex<Vec<String>>,
}

impl CapturingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything captured so far.
    pub async fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    /// Contents of every captured message, in send order.
    pub async fn contents(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|o| o.content.clone())
            .collect()
    }

    /// Conversations a typing indicator was started in.
    pub async fn typing_started(&self) -> Vec<String> {
        self.typing.lock().await.clone()
    }
}

#[async_trait]
impl Transport for CapturingTransport {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        self.sent.lock().await.push(Outbound {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn start_typing(&self, conversation_id: &str) -> Result<(), TransportError> {
        self.typing.lock().await.push(conversation_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_transport_forwards() {
        let (transport, mut rx) = ChannelTransport::new(4);
        transport.send_message("room", "hello").await.unwrap();
        let out = rx.recv().await.unwrap();
        assert_eq!(out.conversation_id, "room");
        assert_eq!(out.content, "hello");
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (transport, rx) = ChannelTransport::new(1);
        drop(rx);
        let err = transport.send_message("room", "x").await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_transport_times_out_when_full() {
        let (transport, _rx) = ChannelTransport::new(1);
        transport.send_message("room", "first").await.unwrap();
        let err = transport.send_message("room", "second").await.unwrap_err();
        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn test_capturing_transport_take_drains() {
        let transport = CapturingTransport::new();
        transport.send_message("a", "one").await.unwrap();
        transport.send_message("b", "two").await.unwrap();
        assert_eq!(transport.contents().await, vec!["one", "two"]);
        assert_eq!(transport.take().await.len(), 2);
        assert!(transport.contents().await.is_empty());
    }
}
