//! Interactive argument prompts.
//!
//! When an argument fails to cast and has prompt options, the [`Prompter`]
//! opens a [`PromptSession`] for the (conversation, actor) pair and drives
//! a [`PromptMachine`] over the replies the dispatcher routes into it.
//!
//! The session is registered before the first prompt text is sent, so a
//! fast reply can never race past it.

pub mod machine;
pub mod options;
pub mod session;

pub use machine::{AskKind, CancelKind, Input, PromptMachine, Step};
pub use options::{PromptData, PromptFn, PromptOptions, PromptText, ResolvedPrompt};
pub use session::{PromptSession, PromptSessions, SessionKey};

use crate::args::types::{CastContext, TypeRegistry};
use crate::args::{Args, ArgumentType, Value};
use crate::commands::CommandRegistry;
use crate::error::DispatchResult;
use crate::message::InboundMessage;
use crate::metrics;
use crate::resolver::PrefixResolver;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::debug;

/// How a prompt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    Resolved(Value),
    Cancelled,
    /// The reply was itself a command; it should be dispatched instead.
    Breakout(Arc<InboundMessage>),
}

/// One argument's prompt request.
pub(crate) struct PromptRequest<'a> {
    /// Triggering message of the invocation.
    pub message: &'a Arc<InboundMessage>,
    pub ty: &'a ArgumentType,
    pub options: ResolvedPrompt,
    /// Phrase from the invocation that failed to cast.
    pub phrase: &'a str,
    pub args: &'a Args,
    pub registry: &'a CommandRegistry,
    pub types: &'a TypeRegistry,
    pub resolver: &'a PrefixResolver,
}

/// Drives prompts over the transport.
pub struct Prompter {
    transport: Arc<dyn Transport>,
    sessions: PromptSessions,
    /// Handler-level defaults, the lowest merge level.
    defaults: PromptOptions,
}

impl Prompter {
    pub fn new(transport: Arc<dyn Transport>, sessions: PromptSessions, defaults: PromptOptions) -> Self {
        Self {
            transport,
            sessions,
            defaults,
        }
    }

    pub fn defaults(&self) -> &PromptOptions {
        &self.defaults
    }

    pub fn sessions(&self) -> &PromptSessions {
        &self.sessions
    }

    /// Send `text` to `conversation` unless it is empty.
    pub(crate) async fn say(&self, conversation: &str, text: &str) -> DispatchResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.transport.send_message(conversation, text).await?;
        Ok(())
    }

    pub(crate) async fn collect(&self, req: PromptRequest<'_>) -> DispatchResult<PromptOutcome> {
        let opts = &req.options;
        let Some(mut session) = self.sessions.open(req.message.session_key()) else {
            debug!(
                actor = %req.message.author.id,
                conversation = %req.message.conversation_id,
                "Prompt already active for actor"
            );
            return Ok(PromptOutcome::Cancelled);
        };

        let mut machine =
            PromptMachine::new(opts.retries, opts.infinite, opts.limit, !req.phrase.is_empty());
        let mut latest = Arc::clone(req.message);
        let mut phrase = req.phrase.to_string();
        let mut step = machine.start();

        loop {
            match step {
                Step::Ask(kind) => {
                    let text = match kind {
                        AskKind::Start => opts.start.as_ref(),
                        AskKind::Retry => opts.retry.as_ref(),
                        AskKind::Silent => None,
                    };
                    self.send_stage(text, &req, &machine, &latest, &phrase).await?;

                    let input = match session.next(opts.time).await {
                        None => Input::TimedOut,
                        Some(reply) => {
                            let input = self.classify(&req, &reply).await?;
                            phrase = reply.content.clone();
                            latest = reply;
                            input
                        }
                    };
                    step = machine.advance(input);
                }
                Step::Resolved(value) => {
                    metrics::record_prompt("resolved");
                    return Ok(PromptOutcome::Resolved(value));
                }
                Step::Cancelled(kind) => {
                    let text = match kind {
                        CancelKind::Timeout => opts.timeout.as_ref(),
                        CancelKind::Cancel => opts.cancel.as_ref(),
                        CancelKind::Ended => opts.ended.as_ref(),
                    };
                    self.send_stage(text, &req, &machine, &latest, &phrase).await?;
                    metrics::record_prompt(kind.as_str());
                    debug!(actor = %req.message.author.id, outcome = kind.as_str(), "Prompt cancelled");
                    return Ok(PromptOutcome::Cancelled);
                }
                Step::Breakout => {
                    metrics::record_prompt("breakout");
                    return Ok(PromptOutcome::Breakout(latest));
                }
            }
        }
    }

    async fn classify(&self, req: &PromptRequest<'_>, reply: &InboundMessage) -> DispatchResult<Input> {
        let opts = &req.options;
        if opts.breakout
            && let Some(parsed) = req.resolver.resolve(req.registry, reply).await?
            && parsed.command.is_some()
        {
            return Ok(Input::Breakout);
        }

        let content = reply.content.trim();
        if content.to_lowercase() == opts.cancel_word.to_lowercase() {
            return Ok(Input::Cancel);
        }
        if opts.infinite && content.to_lowercase() == opts.stop_word.to_lowercase() {
            return Ok(Input::Stop);
        }

        let ctx = CastContext {
            message: reply,
            registry: req.registry,
            args: req.args,
        };
        Ok(Input::Cast(req.types.cast(req.ty, content, &ctx).await?))
    }

    async fn send_stage(
        &self,
        text: Option<&PromptText>,
        req: &PromptRequest<'_>,
        machine: &PromptMachine,
        latest: &Arc<InboundMessage>,
        phrase: &str,
    ) -> DispatchResult<()> {
        let Some(text) = text else {
            return Ok(());
        };
        let data = PromptData {
            retries: machine.retry(),
            infinite: req.options.infinite,
            phrase: phrase.to_string(),
            message: Arc::clone(latest),
        };
        let rendered = text.render(req.message, req.args, &data);
        self.say(&req.message.conversation_id, &rendered).await
    }
}

impl std::fmt::Debug for Prompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompter")
            .field("sessions", &self.sessions.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Author;
    use crate::resolver::Prefix;
    use crate::transport::CapturingTransport;
    use std::time::Duration;

    struct Harness {
        transport: Arc<CapturingTransport>,
        prompter: Prompter,
        registry: CommandRegistry,
        types: TypeRegistry,
        resolver: PrefixResolver,
        message: Arc<InboundMessage>,
    }

    impl Harness {
        fn new() -> Self {
            let transport = Arc::new(CapturingTransport::new());
            Self {
                prompter: Prompter::new(transport.clone(), PromptSessions::new(), PromptOptions::new()),
                transport,
                registry: CommandRegistry::new(),
                types: TypeRegistry::new(),
                resolver: PrefixResolver::new(Prefix::single("!"), false, ""),
                message: Arc::new(InboundMessage::new("1", Author::new("alice"), "room", "!add")),
            }
        }

        fn reply(&self, content: &str) {
            let msg = Arc::new(InboundMessage::new("r", Author::new("alice"), "room", content));
            assert!(self.prompter.sessions().route(&msg));
        }

        async fn collect(&self, options: PromptOptions, phrase: &str) -> PromptOutcome {
            let args = Args::new();
            let req = PromptRequest {
                message: &self.message,
                ty: &ArgumentType::Integer,
                options: options.resolve(),
                phrase,
                args: &args,
                registry: &self.registry,
                types: &self.types,
                resolver: &self.resolver,
            };
            self.prompter.collect(req).await.unwrap()
        }
    }

    async fn wait_for_session(h: &Harness) {
        while !h.prompter.sessions().is_active("room", "alice") {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_prompt_resolves_reply() {
        let h = Harness::new();
        let options = PromptOptions::new().start("How many?");
        let (outcome, _) = tokio::join!(h.collect(options, ""), async {
            wait_for_session(&h).await;
            h.reply("12");
        });
        assert_eq!(outcome, PromptOutcome::Resolved(Value::Integer(12)));
        assert_eq!(h.transport.contents().await, vec!["How many?"]);
        assert!(h.prompter.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_word_removes_session() {
        let h = Harness::new();
        let options = PromptOptions::new().cancel("Cancelled.");
        let (outcome, _) = tokio::join!(h.collect(options, ""), async {
            wait_for_session(&h).await;
            h.reply("CANCEL");
        });
        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert_eq!(h.transport.contents().await, vec!["Cancelled."]);
        assert!(!h.prompter.sessions().is_active("room", "alice"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_sends_ended() {
        let h = Harness::new();
        let options = PromptOptions::new()
            .retries(1)
            .start("start")
            .retry("retry")
            .ended("ended");
        let (outcome, _) = tokio::join!(h.collect(options, ""), async {
            wait_for_session(&h).await;
            h.reply("x");
            h.reply("y");
        });
        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert_eq!(h.transport.contents().await, vec!["start", "retry", "ended"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let h = Harness::new();
        let options = PromptOptions::new()
            .time(Duration::from_secs(5))
            .timeout("Too slow.");
        let outcome = h.collect(options, "").await;
        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert_eq!(h.transport.contents().await, vec!["Too slow."]);
    }

    #[tokio::test]
    async fn test_breakout_returns_new_message() {
        let h = Harness::new();
        h.registry
            .register(
                crate::commands::Command::builder(
                    "ping",
                    crate::commands::handler_fn(|_, _| async { Ok(Value::Null) }),
                )
                .alias("ping")
                .build(),
            )
            .unwrap();

        let (outcome, _) = tokio::join!(h.collect(PromptOptions::new(), ""), async {
            wait_for_session(&h).await;
            h.reply("!ping");
        });
        match outcome {
            PromptOutcome::Breakout(msg) => assert_eq!(msg.content, "!ping"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_infinite_collects_until_stop() {
        let h = Harness::new();
        let options = PromptOptions::new().infinite().start("numbers?");
        let (outcome, _) = tokio::join!(h.collect(options, ""), async {
            wait_for_session(&h).await;
            h.reply("1");
            h.reply("2");
            h.reply("stop");
        });
        assert_eq!(
            outcome,
            PromptOutcome::Resolved(Value::List(vec![Value::Integer(1), Value::Integer(2)]))
        );
        // later asks are silent once values are collected
        assert_eq!(h.transport.contents().await, vec!["numbers?"]);
    }

    #[tokio::test]
    async fn test_second_prompt_for_same_pair_is_cancelled() {
        let h = Harness::new();
        let _held = h.prompter.sessions().open(("room".into(), "alice".into())).unwrap();
        let outcome = h.collect(PromptOptions::new().start("x"), "").await;
        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert!(h.transport.contents().await.is_empty());
    }
}
