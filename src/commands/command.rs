//! Command definitions.
//!
//! A [`Command`] is an immutable description of something a user can invoke:
//! its aliases, argument specification, gates, cooldown and the handler that
//! runs it. Commands are built with [`Command::builder`] and shared as
//! `Arc<Command>` once registered.

use super::context::CommandContext;
use crate::args::{Args, Argument, Splitter, Value};
use crate::message::InboundMessage;
use crate::prompt::PromptOptions;
use crate::resolver::Prefix;
use crate::security::permissions::PermissionRequirement;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ============================================================================
// Handler
// ============================================================================

/// Outcome of a command's `before` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Abandon the invocation; emits `CommandCancelled`.
    Cancel,
}

/// The code behind a command.
///
/// Handlers receive their resolved context explicitly rather than reaching
/// for globals: the triggering message, the command itself, the registry and
/// the transport all travel in [`CommandContext`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs after gates and cooldowns pass, before arguments are parsed.
    async fn before(&self, _ctx: &CommandContext) -> anyhow::Result<HookOutcome> {
        Ok(HookOutcome::Continue)
    }

    /// Execute the command. The returned value is reported in `CommandFinished`.
    async fn exec(&self, ctx: CommandContext, args: Args) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`CommandHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext, Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn exec(&self, ctx: CommandContext, args: Args) -> anyhow::Result<Value> {
        (self.0)(ctx, args).await
    }
}

/// Build a handler from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ============================================================================
// Triggers
// ============================================================================

/// Predicate deciding whether a non-prefixed message triggers a command.
#[async_trait]
pub trait Condition: Send + Sync {
    async fn test(&self, message: &InboundMessage) -> anyhow::Result<bool>;
}

struct ConditionFn<F>(F);

#[async_trait]
impl<F> Condition for ConditionFn<F>
where
    F: Fn(&InboundMessage) -> bool + Send + Sync,
{
    async fn test(&self, message: &InboundMessage) -> anyhow::Result<bool> {
        Ok((self.0)(message))
    }
}

/// Dynamic regex trigger: may pick a pattern per message, or none.
pub type RegexFn = dyn Fn(&InboundMessage) -> Option<Regex> + Send + Sync;

/// Regex trigger for non-prefixed messages.
#[derive(Clone)]
pub enum Trigger {
    Static(Regex),
    Dynamic(Arc<RegexFn>),
}

impl Trigger {
    pub(crate) fn regex_for(&self, message: &InboundMessage) -> Option<Regex> {
        match self {
            Self::Static(re) => Some(re.clone()),
            Self::Dynamic(f) => f(message),
        }
    }
}

// ============================================================================
// Restrictions
// ============================================================================

/// Where a command may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelRestriction {
    #[default]
    Any,
    /// Guild-like conversations only.
    Guild,
    /// Direct conversations only.
    Direct,
}

/// Custom lock key function.
pub type LockFn = dyn Fn(&InboundMessage, &Args) -> anyhow::Result<Option<String>> + Send + Sync;

/// Per-command concurrency lock.
///
/// While an invocation holding a key runs, another invocation resolving to
/// the same key is refused with `CommandLocked`.
#[derive(Clone)]
pub enum CommandLock {
    Actor,
    Conversation,
    /// Guild id, falling back to the conversation for direct messages.
    Guild,
    Custom(Arc<LockFn>),
}

impl CommandLock {
    pub(crate) fn key(&self, message: &InboundMessage, args: &Args) -> anyhow::Result<Option<String>> {
        Ok(match self {
            Self::Actor => Some(message.author.id.clone()),
            Self::Conversation => Some(message.conversation_id.clone()),
            Self::Guild => Some(
                message
                    .guild_id
                    .clone()
                    .unwrap_or_else(|| message.conversation_id.clone()),
            ),
            Self::Custom(f) => f(message, args)?,
        })
    }
}

// ============================================================================
// Command
// ============================================================================

/// A registered command.
pub struct Command {
    /// Stable identity, unique across the registry.
    pub id: String,
    /// Names the command answers to, case-insensitive.
    pub aliases: Vec<String>,
    pub args: Vec<Argument>,
    /// Overrides the dispatcher's default splitting strategy.
    pub split: Option<Splitter>,
    /// Command-level prompt defaults for its arguments.
    pub prompt_defaults: PromptOptions,
    pub cooldown: Option<Duration>,
    /// Uses allowed per cooldown window.
    pub ratelimit: u32,
    pub channel: ChannelRestriction,
    pub owner_only: bool,
    pub client_permissions: Option<PermissionRequirement>,
    pub user_permissions: Option<PermissionRequirement>,
    /// Overrides the dispatcher-wide cooldown bypass list.
    pub ignore_cooldown: Option<Vec<String>>,
    /// Overrides the dispatcher-wide permission bypass list.
    pub ignore_permissions: Option<Vec<String>>,
    /// Required prefix(es) instead of the global prefix.
    pub prefix: Option<Prefix>,
    pub regex: Option<Trigger>,
    pub condition: Option<Arc<dyn Condition>>,
    /// Whether edited messages may trigger the command.
    pub editable: bool,
    pub typing: bool,
    pub lock: Option<CommandLock>,
    pub description: String,
    pub usage: String,
    enabled: AtomicBool,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn builder(id: impl Into<String>, handler: Arc<dyn CommandHandler>) -> CommandBuilder {
        CommandBuilder::new(id, handler)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    /// Every flag and option marker declared by this command's arguments.
    pub(crate) fn markers(&self) -> impl Iterator<Item = (&crate::args::MatchKind, &str)> {
        self.args
            .iter()
            .flat_map(|a| a.markers.iter().map(move |m| (&a.kind, m.as_str())))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("args", &self.args.len())
            .field("prefix", &self.prefix)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Command`].
pub struct CommandBuilder {
    command: Command,
}

impl CommandBuilder {
    fn new(id: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            command: Command {
                id: id.into(),
                aliases: Vec::new(),
                args: Vec::new(),
                split: None,
                prompt_defaults: PromptOptions::default(),
                cooldown: None,
                ratelimit: 1,
                channel: ChannelRestriction::Any,
                owner_only: false,
                client_permissions: None,
                user_permissions: None,
                ignore_cooldown: None,
                ignore_permissions: None,
                prefix: None,
                regex: None,
                condition: None,
                editable: true,
                typing: false,
                lock: None,
                description: String::new(),
                usage: String::new(),
                enabled: AtomicBool::new(true),
                handler,
            },
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.command.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.command.args.push(arg);
        self
    }

    pub fn split(mut self, splitter: Splitter) -> Self {
        self.command.split = Some(splitter);
        self
    }

    pub fn prompt_defaults(mut self, options: PromptOptions) -> Self {
        self.command.prompt_defaults = options;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.command.cooldown = Some(cooldown);
        self
    }

    pub fn ratelimit(mut self, uses: u32) -> Self {
        self.command.ratelimit = uses.max(1);
        self
    }

    pub fn channel(mut self, channel: ChannelRestriction) -> Self {
        self.command.channel = channel;
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.command.owner_only = true;
        self
    }

    pub fn client_permissions(mut self, requirement: PermissionRequirement) -> Self {
        self.command.client_permissions = Some(requirement);
        self
    }

    pub fn user_permissions(mut self, requirement: PermissionRequirement) -> Self {
        self.command.user_permissions = Some(requirement);
        self
    }

    pub fn ignore_cooldown<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.ignore_cooldown = Some(actors.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore_permissions<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.ignore_permissions = Some(actors.into_iter().map(Into::into).collect());
        self
    }

    pub fn prefix(mut self, prefix: Prefix) -> Self {
        self.command.prefix = Some(prefix);
        self
    }

    pub fn regex(mut self, regex: Regex) -> Self {
        self.command.regex = Some(Trigger::Static(regex));
        self
    }

    pub fn regex_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&InboundMessage) -> Option<Regex> + Send + Sync + 'static,
    {
        self.command.regex = Some(Trigger::Dynamic(Arc::new(f)));
        self
    }

    pub fn condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.command.condition = Some(condition);
        self
    }

    pub fn condition_fn<F>(self, f: F) -> Self
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        self.condition(Arc::new(ConditionFn(f)))
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.command.editable = editable;
        self
    }

    pub fn typing(mut self) -> Self {
        self.command.typing = true;
        self
    }

    pub fn lock(mut self, lock: CommandLock) -> Self {
        self.command.lock = Some(lock);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.command.description = text.into();
        self
    }

    pub fn usage(mut self, text: impl Into<String>) -> Self {
        self.command.usage = text.into();
        self
    }

    pub fn disabled(self) -> Self {
        self.command.set_enabled(false);
        self
    }

    pub fn build(self) -> Arc<Command> {
        Arc::new(self.command)
    }
}
