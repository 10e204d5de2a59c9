//! The dispatch orchestrator.
//!
//! [`Dispatcher::handle`] runs one inbound message through the pipeline:
//!
//! ```text
//! edits filter -> all gates -> prompt routing -> pre gates -> resolve
//!   resolved:   disabled / editable -> post gates -> cooldown -> before hook
//!               -> parse (may prompt, cancel or break out) -> lock -> exec
//!   unresolved: regex and condition triggers, each matched command runs
//!               post gates -> cooldown -> before hook -> lock -> exec,
//!               concurrently and isolated from its siblings
//! ```
//!
//! Deliberate stops are reported as [`DispatchEvent`]s and as the returned
//! [`Outcome`]. Faults go to fault subscribers; with none subscribed the
//! fault is returned from `handle`.

pub mod events;

pub use events::{DispatchEvent, EventBus, FaultEvent};

use crate::args::parser::{self, ParseEnv};
use crate::args::value::all_matches;
use crate::args::{Args, Caster, ParseOutcome, Splitter, TypeRegistry, Value};
use crate::commands::{Command, CommandContext, CommandRegistry, HookOutcome};
use crate::config::{Config, DispatcherConfig};
use crate::error::{BuildError, DispatchError, DispatchResult, Fault, FaultExt, FaultStage};
use crate::message::InboundMessage;
use crate::metrics;
use crate::prompt::{PromptOptions, PromptSessions, Prompter};
use crate::resolver::{Prefix, PrefixResolver};
use crate::security::inhibitor::{check_author, check_restrictions};
use crate::security::permissions::missing_permissions;
use crate::security::{
    BlockReason, CooldownManager, Inhibitor, InhibitorSet, InhibitorStage, PermissionProvider,
    PermissionSide, StaticPermissions,
};
use crate::telemetry::{CommandTimer, spans};
use crate::transport::Transport;
use dashmap::DashSet;
use futures_util::future::join_all;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, warn};

// ============================================================================
// Outcomes
// ============================================================================

/// How one command invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// The handler ran and returned this value.
    Finished(Value),
    Disabled,
    /// Edited message for a command that is not editable.
    Ignored,
    Blocked(BlockReason),
    MissingPermissions {
        side: PermissionSide,
        missing: Vec<String>,
    },
    Cooldown(Duration),
    Locked,
    Cancelled,
    /// A fault was handed to the fault subscribers.
    Faulted(FaultStage),
}

/// A command invocation and its status.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub command: String,
    pub status: Status,
}

/// How a message's pipeline run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Edited message while edits are not handled.
    Ignored,
    /// Stopped by an `all` or `pre` gate.
    Blocked(BlockReason),
    /// Delivered to an active prompt.
    InPrompt,
    /// Nothing matched.
    Invalid,
    /// A prefixed command was resolved.
    Command(CommandOutcome),
    /// Regex or condition triggers matched, in registration order.
    Triggered(Vec<CommandOutcome>),
    /// A fault was handed to the fault subscribers.
    Faulted(FaultStage),
}

enum Flow {
    Done(Outcome),
    Breakout(Arc<InboundMessage>),
}

enum Invoked {
    Status(Status),
    Breakout(Arc<InboundMessage>),
}

/// Where an invocation's arguments come from.
enum Invocation {
    /// Prefixed command: parse the content after the alias.
    Direct {
        prefix: String,
        alias: String,
        content: String,
    },
    /// Regex or condition trigger: arguments are already built.
    Triggered(Args),
}

// ============================================================================
// Locks
// ============================================================================

type LockSet = DashSet<(String, String)>;

/// Held command lock key; released on drop.
struct LockGuard {
    locks: Arc<LockSet>,
    key: (String, String),
}

impl LockGuard {
    fn acquire(locks: &Arc<LockSet>, command: &str, key: String) -> Option<Self> {
        let key = (command.to_string(), key);
        locks.insert(key.clone()).then(|| Self {
            locks: Arc::clone(locks),
            key,
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.remove(&self.key);
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Command dispatcher. Share it as `Arc<Dispatcher>`.
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: Arc<CommandRegistry>,
    resolver: PrefixResolver,
    inhibitors: InhibitorSet,
    cooldowns: CooldownManager,
    permissions: Arc<dyn PermissionProvider>,
    types: TypeRegistry,
    prompter: Prompter,
    transport: Arc<dyn Transport>,
    splitter: Splitter,
    locks: Arc<LockSet>,
    events: EventBus,
}

impl Dispatcher {
    pub fn builder(config: DispatcherConfig, transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(config, transport)
    }

    #[inline]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    #[inline]
    pub fn cooldowns(&self) -> &CooldownManager {
        &self.cooldowns
    }

    #[inline]
    pub fn sessions(&self) -> &PromptSessions {
        self.prompter.sessions()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_faults(&self) -> broadcast::Receiver<FaultEvent> {
        self.events.subscribe_faults()
    }

    /// Handle `message` on its own task.
    ///
    /// Messages must be handled concurrently for prompts to work: a prompt
    /// waits inside one `handle` call for a reply delivered by another.
    pub fn dispatch(self: &Arc<Self>, message: InboundMessage) -> JoinHandle<DispatchResult<Outcome>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.handle(Arc::new(message)).await })
    }

    /// Run `message` through the pipeline.
    ///
    /// A prompt reply that breaks out restarts the pipeline for the reply;
    /// the returned outcome is then the reply's.
    pub async fn handle(&self, message: Arc<InboundMessage>) -> DispatchResult<Outcome> {
        metrics::record_message();
        let mut message = message;
        loop {
            let span = spans::message(&message);
            match self.run(&message).instrument(span).await {
                Ok(Flow::Done(outcome)) => return Ok(outcome),
                Ok(Flow::Breakout(next)) => message = next,
                Err(DispatchError::Fault(fault)) => {
                    let stage = fault.stage;
                    self.route_fault(&message, fault)?;
                    return Ok(Outcome::Faulted(stage));
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run(&self, message: &Arc<InboundMessage>) -> DispatchResult<Flow> {
        if message.edited && !self.config.handle_edits {
            return Ok(Flow::Done(Outcome::Ignored));
        }

        let blocked = match check_author(
            message,
            &self.config.client_id,
            self.config.block_client,
            self.config.block_bots,
        ) {
            Some(reason) => Some(reason),
            None => self.inhibitors.run(InhibitorStage::All, message, None).await?,
        };
        if let Some(reason) = blocked {
            return Ok(Flow::Done(self.block_message(message, reason)));
        }

        if self.prompter.sessions().route(message) {
            self.events.emit(DispatchEvent::InPrompt {
                message: Arc::clone(message),
            });
            return Ok(Flow::Done(Outcome::InPrompt));
        }

        if let Some(reason) = self.inhibitors.run(InhibitorStage::Pre, message, None).await? {
            return Ok(Flow::Done(self.block_message(message, reason)));
        }

        let parsed = self.resolver.resolve(&self.registry, message).await?;
        let Some((parsed, command)) =
            parsed.and_then(|p| p.command.clone().map(|command| (p, command)))
        else {
            return self.fan_out(message).await.map(Flow::Done);
        };

        let invocation = Invocation::Direct {
            prefix: parsed.prefix,
            alias: parsed.alias,
            content: parsed.content,
        };
        Ok(match self.invoke(message, &command, invocation).await? {
            Invoked::Status(status) => Flow::Done(Outcome::Command(CommandOutcome {
                command: command.id.clone(),
                status,
            })),
            Invoked::Breakout(next) => Flow::Breakout(next),
        })
    }

    fn block_message(&self, message: &Arc<InboundMessage>, reason: BlockReason) -> Outcome {
        debug!(message = %message.id, reason = %reason, "Message blocked");
        metrics::record_block(reason.kind());
        self.events.emit(DispatchEvent::MessageBlocked {
            message: Arc::clone(message),
            reason: reason.clone(),
        });
        Outcome::Blocked(reason)
    }

    /// Hand a fault to the subscribers, or give it back if there are none.
    fn route_fault(&self, message: &Arc<InboundMessage>, fault: Fault) -> Result<(), Fault> {
        metrics::record_fault(fault.stage.as_str());
        warn!(
            stage = %fault.stage,
            command = fault.command.as_deref(),
            message = %message.id,
            error = %fault.source,
            "Fault in dispatch pipeline"
        );
        self.events.fault(message, fault)
    }

    // ========================================================================
    // Regex and condition triggers
    // ========================================================================

    async fn fan_out(&self, message: &Arc<InboundMessage>) -> DispatchResult<Outcome> {
        let mut matched: Vec<(Arc<Command>, Args)> = Vec::new();
        let mut conditional: Vec<Arc<Command>> = Vec::new();

        for command in self.registry.commands() {
            if !command.is_enabled() {
                continue;
            }
            if let Some(args) = regex_args(&command, message) {
                matched.push((command, args));
            } else if command.condition.is_some() {
                conditional.push(command);
            }
        }

        let tests = join_all(conditional.iter().map(|command| async move {
            match &command.condition {
                Some(condition) => condition.test(message).await,
                None => Ok(false),
            }
        }))
        .await;

        let mut unobserved: Option<DispatchError> = None;
        let mut outcomes = Vec::new();
        for (command, test) in conditional.into_iter().zip(tests) {
            match test {
                Ok(true) => matched.push((command, Args::new())),
                Ok(false) => {}
                Err(err) => {
                    let fault = Fault::new(FaultStage::Condition, err).in_command(&command.id);
                    match self.route_fault(message, fault) {
                        Ok(()) => outcomes.push(CommandOutcome {
                            command: command.id.clone(),
                            status: Status::Faulted(FaultStage::Condition),
                        }),
                        Err(fault) => {
                            unobserved.get_or_insert(fault.into());
                        }
                    }
                }
            }
        }

        if matched.is_empty() && outcomes.is_empty() {
            if let Some(err) = unobserved {
                return Err(err);
            }
            self.events.emit(DispatchEvent::MessageInvalid {
                message: Arc::clone(message),
            });
            return Ok(Outcome::Invalid);
        }

        let results = join_all(
            matched
                .iter()
                .map(|(command, args)| self.invoke(message, command, Invocation::Triggered(args.clone()))),
        )
        .await;

        for ((command, _), result) in matched.iter().zip(results) {
            let status = match result {
                Ok(Invoked::Status(status)) => status,
                // triggered invocations never parse, so never prompt
                Ok(Invoked::Breakout(_)) => Status::Cancelled,
                Err(DispatchError::Fault(fault)) => {
                    let stage = fault.stage;
                    match self.route_fault(message, fault) {
                        Ok(()) => Status::Faulted(stage),
                        Err(fault) => {
                            unobserved.get_or_insert(fault.into());
                            continue;
                        }
                    }
                }
                Err(err) => {
                    unobserved.get_or_insert(err);
                    continue;
                }
            };
            outcomes.push(CommandOutcome {
                command: command.id.clone(),
                status,
            });
        }

        match unobserved {
            Some(err) => Err(err),
            None => Ok(Outcome::Triggered(outcomes)),
        }
    }

    // ========================================================================
    // Command invocation
    // ========================================================================

    async fn invoke(
        &self,
        message: &Arc<InboundMessage>,
        command: &Arc<Command>,
        invocation: Invocation,
    ) -> DispatchResult<Invoked> {
        self.invoke_inner(message, command, invocation)
            .await
            .map_err(|e| e.in_command(&command.id))
    }

    async fn invoke_inner(
        &self,
        message: &Arc<InboundMessage>,
        command: &Arc<Command>,
        invocation: Invocation,
    ) -> DispatchResult<Invoked> {
        if !command.is_enabled() {
            self.events.emit(DispatchEvent::CommandDisabled {
                message: Arc::clone(message),
                command: Arc::clone(command),
            });
            return Ok(Invoked::Status(Status::Disabled));
        }
        if message.edited && !command.editable {
            return Ok(Invoked::Status(Status::Ignored));
        }

        if let Some(status) = self.post_gates(message, command).await? {
            return Ok(Invoked::Status(status));
        }

        let (prefix, alias) = match &invocation {
            Invocation::Direct { prefix, alias, .. } => (Some(prefix.clone()), Some(alias.clone())),
            Invocation::Triggered(_) => (None, None),
        };
        let ctx = CommandContext {
            message: Arc::clone(message),
            command: Arc::clone(command),
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            prefix,
            alias,
        };

        if command.handler().before(&ctx).await.fault(FaultStage::Hook)? == HookOutcome::Cancel {
            self.cancel(message, command);
            return Ok(Invoked::Status(Status::Cancelled));
        }

        let args = match invocation {
            Invocation::Triggered(args) => args,
            Invocation::Direct { content, .. } => {
                let env = ParseEnv {
                    message,
                    command,
                    registry: &self.registry,
                    types: &self.types,
                    prompter: &self.prompter,
                    resolver: &self.resolver,
                };
                let splitter = command.split.as_ref().unwrap_or(&self.splitter);
                match parser::parse(&env, &content, splitter).await? {
                    ParseOutcome::Parsed(args) => args,
                    ParseOutcome::Cancelled => {
                        self.cancel(message, command);
                        return Ok(Invoked::Status(Status::Cancelled));
                    }
                    ParseOutcome::Breakout(next) => {
                        debug!(command = %command.id, breakout = %next.id, "Prompt broken out");
                        self.events.emit(DispatchEvent::CommandBreakout {
                            message: Arc::clone(message),
                            command: Arc::clone(command),
                            breakout_message: Arc::clone(&next),
                        });
                        return Ok(Invoked::Breakout(next));
                    }
                }
            }
        };

        self.execute(ctx, args).await.map(Invoked::Status)
    }

    fn cancel(&self, message: &Arc<InboundMessage>, command: &Arc<Command>) {
        debug!(command = %command.id, message = %message.id, "Command cancelled");
        self.events.emit(DispatchEvent::CommandCancelled {
            message: Arc::clone(message),
            command: Arc::clone(command),
        });
    }

    /// Built-in restrictions, permissions, custom post gates, then cooldown.
    async fn post_gates(
        &self,
        message: &Arc<InboundMessage>,
        command: &Arc<Command>,
    ) -> DispatchResult<Option<Status>> {
        let actor = message.author.id.as_str();

        let mut blocked = check_restrictions(command, message, self.permissions.is_owner(actor));

        if blocked.is_none() {
            if let Some(requirement) = &command.client_permissions
                && let Some(missing) = missing_permissions(
                    self.permissions.as_ref(),
                    requirement,
                    message,
                    &self.config.client_id,
                )
                .await?
            {
                return Ok(Some(self.missing(message, command, PermissionSide::Client, missing)));
            }

            let bypass = command
                .ignore_permissions
                .as_deref()
                .unwrap_or(&self.config.ignore_permissions);
            if let Some(requirement) = &command.user_permissions
                && !bypass.iter().any(|a| a == actor)
                && let Some(missing) =
                    missing_permissions(self.permissions.as_ref(), requirement, message, actor)
                        .await?
            {
                return Ok(Some(self.missing(message, command, PermissionSide::User, missing)));
            }

            blocked = self
                .inhibitors
                .run(InhibitorStage::Post, message, Some(command))
                .await?;
        }

        if let Some(reason) = blocked {
            debug!(command = %command.id, reason = %reason, "Command blocked");
            metrics::record_block(reason.kind());
            self.events.emit(DispatchEvent::CommandBlocked {
                message: Arc::clone(message),
                command: Arc::clone(command),
                reason: reason.clone(),
            });
            return Ok(Some(Status::Blocked(reason)));
        }

        if let Some(remaining) = self.cooldowns.check(actor, command) {
            metrics::record_cooldown(&command.id);
            self.events.emit(DispatchEvent::Cooldown {
                message: Arc::clone(message),
                command: Arc::clone(command),
                remaining,
            });
            return Ok(Some(Status::Cooldown(remaining)));
        }

        Ok(None)
    }

    fn missing(
        &self,
        message: &Arc<InboundMessage>,
        command: &Arc<Command>,
        side: PermissionSide,
        missing: Vec<String>,
    ) -> Status {
        debug!(command = %command.id, side = side.as_str(), ?missing, "Missing permissions");
        self.events.emit(DispatchEvent::MissingPermissions {
            message: Arc::clone(message),
            command: Arc::clone(command),
            side,
            missing: missing.clone(),
        });
        Status::MissingPermissions { side, missing }
    }

    /// Take the lock, run the handler and report it.
    async fn execute(&self, ctx: CommandContext, args: Args) -> DispatchResult<Status> {
        let command = Arc::clone(&ctx.command);
        let message = Arc::clone(&ctx.message);

        let key = match &command.lock {
            Some(lock) => lock.key(&message, &args).fault(FaultStage::Lock)?,
            None => None,
        };
        let _guard = match key {
            Some(key) => match LockGuard::acquire(&self.locks, &command.id, key) {
                Some(guard) => Some(guard),
                None => {
                    self.events.emit(DispatchEvent::CommandLocked {
                        message: Arc::clone(&message),
                        command: Arc::clone(&command),
                    });
                    return Ok(Status::Locked);
                }
            },
            None => None,
        };

        self.registry.record_use(&command.id);
        if command.typing
            && let Err(e) = self.transport.start_typing(&message.conversation_id).await
        {
            warn!(command = %command.id, error = %e, "Failed to start typing");
        }

        self.events.emit(DispatchEvent::CommandStarted {
            message: Arc::clone(&message),
            command: Arc::clone(&command),
            args: args.clone(),
        });

        let result = {
            let _timer = CommandTimer::new(&command.id);
            command
                .handler()
                .exec(ctx, args.clone())
                .instrument(spans::command(&command.id, &message))
                .await
        };

        if command.typing
            && let Err(e) = self.transport.stop_typing(&message.conversation_id).await
        {
            warn!(command = %command.id, error = %e, "Failed to stop typing");
        }

        match result {
            Ok(value) => {
                self.events.emit(DispatchEvent::CommandFinished {
                    message,
                    command,
                    args,
                    value: value.clone(),
                });
                Ok(Status::Finished(value))
            }
            Err(e) => {
                metrics::record_command_error(&command.id, FaultStage::Handler.as_str());
                Err(Fault::new(FaultStage::Handler, e).in_command(&command.id).into())
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.registry.len())
            .field("resolver", &self.resolver)
            .field("inhibitors", &self.inhibitors.len())
            .field("prompter", &self.prompter)
            .finish_non_exhaustive()
    }
}

/// `match`/`matches` arguments for a command whose regex matches `message`.
fn regex_args(command: &Command, message: &InboundMessage) -> Option<Args> {
    let regex = command.regex.as_ref()?.regex_for(message)?;
    let matches = all_matches(&regex, &message.content);
    let first = matches.first()?.clone();

    let mut args = Args::new();
    args.insert("match", Value::Match(first));
    args.insert("matches", Value::List(matches.into_iter().map(Value::Match).collect()));
    Some(args)
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    transport: Arc<dyn Transport>,
    prompt: PromptOptions,
    prefix: Option<Prefix>,
    permissions: Option<Arc<dyn PermissionProvider>>,
    inhibitors: InhibitorSet,
    types: TypeRegistry,
    commands: Vec<Arc<Command>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            prompt: PromptOptions::default(),
            prefix: None,
            permissions: None,
            inhibitors: InhibitorSet::new(),
            types: TypeRegistry::new(),
            commands: Vec::new(),
        }
    }

    /// Builder seeded with the dispatcher and prompt sections of `config`.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self::new(config.dispatcher.clone(), transport).prompt_defaults(PromptOptions::from(&config.prompt))
    }

    /// Handler-level prompt defaults.
    pub fn prompt_defaults(mut self, options: PromptOptions) -> Self {
        self.prompt = options;
        self
    }

    /// Replace the configured global prefixes, e.g. with a per-guild supplier.
    pub fn prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Permission provider; defaults to [`StaticPermissions`] over the owners.
    pub fn permissions(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = Some(provider);
        self
    }

    pub fn inhibitor(mut self, inhibitor: Arc<dyn Inhibitor>) -> Self {
        self.inhibitors.add(inhibitor);
        self
    }

    /// Register a named argument type resolver.
    pub fn resolver(mut self, name: impl Into<String>, caster: Arc<dyn Caster>) -> Self {
        self.types.register(name, caster);
        self
    }

    pub fn command(mut self, command: Arc<Command>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let config = self.config;

        let registry = match &config.alias_replacement {
            Some(pattern) => CommandRegistry::with_alias_replacement(Regex::new(pattern)?),
            None => CommandRegistry::new(),
        };
        for command in self.commands {
            registry.register(command)?;
        }

        let global = self
            .prefix
            .unwrap_or_else(|| Prefix::Static(config.prefix.clone()));
        let resolver = PrefixResolver::new(global, config.allow_mention, config.client_id.clone());
        let permissions = self
            .permissions
            .unwrap_or_else(|| Arc::new(StaticPermissions::new(config.owners.clone())));
        let cooldowns =
            CooldownManager::new(config.default_cooldown(), config.cooldown_bypass().to_vec());
        let prompter = Prompter::new(Arc::clone(&self.transport), PromptSessions::new(), self.prompt);

        Ok(Dispatcher {
            registry: Arc::new(registry),
            resolver,
            inhibitors: self.inhibitors,
            cooldowns,
            permissions,
            types: self.types,
            prompter,
            transport: self.transport,
            splitter: Splitter::from(config.split),
            locks: Arc::new(DashSet::new()),
            events: EventBus::new(config.event_capacity),
            config,
        })
    }
}
