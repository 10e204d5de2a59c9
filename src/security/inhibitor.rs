//! Inhibitor gates.
//!
//! Inhibitors are asynchronous predicates that veto processing. They run in
//! three stages:
//! - `All`: every inbound message, before resolution.
//! - `Pre`: every message that passed `All`, independent of the command.
//! - `Post`: only once a command is resolved, after the built-in checks.
//!
//! All inhibitors of one stage run concurrently; results are examined in
//! registration order and the first block or fault wins.

use crate::commands::{ChannelRestriction, Command};
use crate::error::{DispatchError, DispatchResult, Fault, FaultStage};
use crate::message::{ChannelKind, InboundMessage};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Stage an inhibitor runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InhibitorStage {
    All,
    Pre,
    Post,
}

/// Result of one inhibitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Block(String),
}

/// Why a message or command was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Message authored by the dispatcher's own identity.
    Client,
    /// Message authored by an automated actor.
    Bot,
    /// Owner-only command invoked by someone else.
    Owner,
    /// Guild-only command invoked outside a guild.
    Guild,
    /// Direct-only command invoked inside a guild.
    Dm,
    /// Custom inhibitor reason.
    Inhibited(String),
}

impl BlockReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Client => "client",
            Self::Bot => "bot",
            Self::Owner => "owner",
            Self::Guild => "guild",
            Self::Dm => "dm",
            Self::Inhibited(reason) => reason,
        }
    }

    /// Low-cardinality label: custom reasons collapse to `"inhibited"`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Bot => "bot",
            Self::Owner => "owner",
            Self::Guild => "guild",
            Self::Dm => "dm",
            Self::Inhibited(_) => "inhibited",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gate predicate.
#[async_trait]
pub trait Inhibitor: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    fn stage(&self) -> InhibitorStage;

    /// `command` is `None` for the `All` and `Pre` stages.
    async fn check(
        &self,
        message: &InboundMessage,
        command: Option<&Command>,
    ) -> anyhow::Result<Verdict>;
}

type InhibitFn = dyn Fn(&InboundMessage, Option<&Command>) -> Verdict + Send + Sync;

struct FnInhibitor {
    id: String,
    stage: InhibitorStage,
    f: Box<InhibitFn>,
}

#[async_trait]
impl Inhibitor for FnInhibitor {
    fn id(&self) -> &str {
        &self.id
    }

    fn stage(&self) -> InhibitorStage {
        self.stage
    }

    async fn check(
        &self,
        message: &InboundMessage,
        command: Option<&Command>,
    ) -> anyhow::Result<Verdict> {
        Ok((self.f)(message, command))
    }
}

/// Build an inhibitor from a synchronous closure.
pub fn inhibitor_fn<F>(id: impl Into<String>, stage: InhibitorStage, f: F) -> Arc<dyn Inhibitor>
where
    F: Fn(&InboundMessage, Option<&Command>) -> Verdict + Send + Sync + 'static,
{
    Arc::new(FnInhibitor {
        id: id.into(),
        stage,
        f: Box::new(f),
    })
}

/// Registered inhibitors grouped by stage.
#[derive(Default)]
pub struct InhibitorSet {
    all: Vec<Arc<dyn Inhibitor>>,
    pre: Vec<Arc<dyn Inhibitor>>,
    post: Vec<Arc<dyn Inhibitor>>,
}

impl InhibitorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, inhibitor: Arc<dyn Inhibitor>) {
        match inhibitor.stage() {
            InhibitorStage::All => self.all.push(inhibitor),
            InhibitorStage::Pre => self.pre.push(inhibitor),
            InhibitorStage::Post => self.post.push(inhibitor),
        }
    }

    pub fn len(&self) -> usize {
        self.all.len() + self.pre.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every inhibitor of `stage`.
    pub(crate) async fn run(
        &self,
        stage: InhibitorStage,
        message: &InboundMessage,
        command: Option<&Command>,
    ) -> DispatchResult<Option<BlockReason>> {
        let inhibitors = match stage {
            InhibitorStage::All => &self.all,
            InhibitorStage::Pre => &self.pre,
            InhibitorStage::Post => &self.post,
        };
        if inhibitors.is_empty() {
            return Ok(None);
        }

        let verdicts = join_all(inhibitors.iter().map(|i| i.check(message, command))).await;

        for (inhibitor, verdict) in inhibitors.iter().zip(verdicts) {
            match verdict {
                Ok(Verdict::Pass) => {}
                Ok(Verdict::Block(reason)) => {
                    debug!(inhibitor = %inhibitor.id(), reason = %reason, "Inhibited");
                    return Ok(Some(BlockReason::Inhibited(reason)));
                }
                Err(e) => {
                    let mut fault = Fault::new(FaultStage::Inhibitor, e);
                    if let Some(cmd) = command {
                        fault = fault.in_command(&cmd.id);
                    }
                    return Err(DispatchError::Fault(fault));
                }
            }
        }
        Ok(None)
    }
}

/// Built-in `All` stage checks.
pub(crate) fn check_author(
    message: &InboundMessage,
    client_id: &str,
    block_client: bool,
    block_bots: bool,
) -> Option<BlockReason> {
    if block_client && !client_id.is_empty() && message.author.id == client_id {
        return Some(BlockReason::Client);
    }
    if block_bots && message.author.bot {
        return Some(BlockReason::Bot);
    }
    None
}

/// Built-in `Post` stage checks preceding permissions.
pub(crate) fn check_restrictions(
    command: &Command,
    message: &InboundMessage,
    is_owner: bool,
) -> Option<BlockReason> {
    if command.owner_only && !is_owner {
        return Some(BlockReason::Owner);
    }
    match (command.channel, message.channel_kind()) {
        (ChannelRestriction::Guild, ChannelKind::Direct) => Some(BlockReason::Guild),
        (ChannelRestriction::Direct, ChannelKind::Guild) => Some(BlockReason::Dm),
        _ => None,
    }
}
