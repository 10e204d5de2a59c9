//! Unified error handling for slirc-dispatch.
//!
//! Four families live here:
//! - [`RegistryError`]: raised at registration time (alias conflicts and friends).
//! - [`DispatchError`]: returned from the per-message pipeline when a fault is
//!   not observed by anyone, or when the transport fails.
//! - [`TransportError`]: failures reported by a [`crate::transport::Transport`].
//! - [`BuildError`]: a dispatcher could not be assembled from its parts.
//!
//! Deliberate blocks, non-matches and cancellations are *not* errors; they are
//! surfaced as [`crate::dispatch::DispatchEvent`]s.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Registry Errors (registration time)
// ============================================================================

/// Errors raised while registering or deregistering commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("alias '{alias}' of command '{command}' already belongs to command '{existing}'")]
    AliasConflict {
        alias: String,
        command: String,
        existing: String,
    },

    #[error("command '{0}' is already registered")]
    CommandExists(String),

    #[error("no command registered with id '{0}'")]
    UnknownCommand(String),
}

impl RegistryError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AliasConflict { .. } => "alias_conflict",
            Self::CommandExists(_) => "command_exists",
            Self::UnknownCommand(_) => "unknown_command",
        }
    }
}

// ============================================================================
// Build Errors
// ============================================================================

/// Errors raised while assembling a [`crate::dispatch::Dispatcher`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid alias replacement pattern: {0}")]
    AliasReplacement(#[from] regex::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Errors reported by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("send timed out")]
    Timeout,

    #[error("message rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Timeout => "timeout",
            Self::Rejected(_) => "rejected",
        }
    }
}

// ============================================================================
// Faults (user-supplied code failed)
// ============================================================================

/// Pipeline stage at which a user-supplied callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultStage {
    /// Dynamic prefix supplier.
    Prefix,
    /// Inhibitor predicate of any stage.
    Inhibitor,
    /// Permission lookup or permission predicate.
    Permission,
    /// Condition trigger predicate.
    Condition,
    /// `before` hook.
    Hook,
    /// Argument caster or named resolver.
    Cast,
    /// Command handler.
    Handler,
    /// Custom lock key function.
    Lock,
}

impl FaultStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Inhibitor => "inhibitor",
            Self::Permission => "permission",
            Self::Condition => "condition",
            Self::Hook => "hook",
            Self::Cast => "cast",
            Self::Handler => "handler",
            Self::Lock => "lock",
        }
    }
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by user-supplied code somewhere in the pipeline.
///
/// Cheap to clone so it can travel on the fault broadcast channel.
#[derive(Debug, Clone)]
pub struct Fault {
    pub stage: FaultStage,
    /// Command being processed when the fault happened, if one was resolved.
    pub command: Option<String>,
    pub source: Arc<anyhow::Error>,
}

impl Fault {
    pub fn new(stage: FaultStage, source: anyhow::Error) -> Self {
        Self {
            stage,
            command: None,
            source: Arc::new(source),
        }
    }

    /// Attach the command id the fault belongs to.
    pub fn in_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(cmd) => write!(f, "{} fault in command '{}': {}", self.stage, cmd, self.source),
            None => write!(f, "{} fault: {}", self.stage, self.source),
        }
    }
}

impl std::error::Error for Fault {}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Errors returned from [`crate::dispatch::Dispatcher::handle`].
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// A user-supplied callback failed and nobody subscribed to faults.
    #[error(transparent)]
    Fault(#[from] Fault),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Fault(fault) => fault.stage.as_str(),
            Self::Transport(e) => e.error_code(),
        }
    }

    /// Tag a fault with the command it happened in, if it is not tagged yet.
    pub(crate) fn in_command(self, command: &str) -> Self {
        match self {
            Self::Fault(fault) if fault.command.is_none() => {
                Self::Fault(fault.in_command(command))
            }
            other => other,
        }
    }
}

/// Result type used throughout the pipeline.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Wrap a user callback result into a pipeline result tagged with `stage`.
pub(crate) trait FaultExt<T> {
    fn fault(self, stage: FaultStage) -> DispatchResult<T>;
}

impl<T> FaultExt<T> for anyhow::Result<T> {
    #[inline]
    fn fault(self, stage: FaultStage) -> DispatchResult<T> {
        self.map_err(|e| DispatchError::Fault(Fault::new(stage, e)))
    }
}
