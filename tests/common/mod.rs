//! Integration test common infrastructure.
//!
//! Builds dispatchers wired to an in-memory transport and collects the
//! events they emit.

#![allow(dead_code)]

use slirc_dispatch::commands::CommandHandler;
use slirc_dispatch::config::DispatcherConfig;
use slirc_dispatch::dispatch::DispatcherBuilder;
use slirc_dispatch::transport::CapturingTransport;
use slirc_dispatch::{
    Author, Command, DispatchEvent, DispatchResult, Dispatcher, InboundMessage, Outcome, Value,
    handler_fn,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Conversation every harness message is sent in.
pub const ROOM: &str = "room";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A message from `actor` in [`ROOM`].
pub fn message(actor: &str, content: &str) -> InboundMessage {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    InboundMessage::new(format!("m{id}"), Author::new(actor), ROOM, content)
}

/// Handler that does nothing and returns `Null`.
pub fn noop() -> Arc<dyn CommandHandler> {
    handler_fn(|_, _| async { Ok(Value::Null) })
}

/// Handler that returns a fixed string.
pub fn returns(text: &'static str) -> Arc<dyn CommandHandler> {
    handler_fn(move |_, _| async move { Ok(Value::from(text)) })
}

/// Simple command answering to its own id.
pub fn command(id: &str) -> Arc<Command> {
    Command::builder(id, noop()).alias(id).build()
}

/// A dispatcher plus the transport it writes to and an event subscription.
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Arc<CapturingTransport>,
    pub events: broadcast::Receiver<DispatchEvent>,
}

impl Harness {
    pub fn new(commands: Vec<Arc<Command>>) -> Self {
        Self::with(DispatcherConfig::default(), commands, |b| b)
    }

    /// Harness with a custom configuration and builder tweaks.
    pub fn with<F>(config: DispatcherConfig, commands: Vec<Arc<Command>>, tweak: F) -> Self
    where
        F: FnOnce(DispatcherBuilder) -> DispatcherBuilder,
    {
        let transport = Arc::new(CapturingTransport::new());
        let mut builder = Dispatcher::builder(config, transport.clone());
        for command in commands {
            builder = builder.command(command);
        }
        let dispatcher = Arc::new(tweak(builder).build().expect("dispatcher should build"));
        let events = dispatcher.subscribe();
        Self {
            dispatcher,
            transport,
            events,
        }
    }

    /// Handle a message from `actor` to completion.
    pub async fn send(&self, actor: &str, content: &str) -> DispatchResult<Outcome> {
        self.dispatcher.handle(Arc::new(message(actor, content))).await
    }

    /// Handle a message from `actor` on its own task.
    pub fn spawn(&self, actor: &str, content: &str) -> JoinHandle<DispatchResult<Outcome>> {
        self.dispatcher.dispatch(message(actor, content))
    }

    /// Wait until `actor` has an open prompt in [`ROOM`].
    pub async fn wait_for_prompt(&self, actor: &str) {
        let sessions = self.dispatcher.sessions().clone();
        let actor = actor.to_string();
        tokio::time::timeout(Duration::from_secs(5), async move {
            while !sessions.is_active(ROOM, &actor) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("prompt should open");
    }

    /// Every event emitted so far.
    pub fn drain(&mut self) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Names of every event emitted so far.
    pub fn names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(DispatchEvent::name).collect()
    }
}
