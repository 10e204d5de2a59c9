//! Permission and identity lookups used by the built-in post gates.

use crate::error::{DispatchResult, FaultExt, FaultStage};
use crate::message::{ChannelKind, InboundMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Identity and permission source for the dispatcher.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    fn is_owner(&self, actor: &str) -> bool;

    /// Permissions `actor` holds in the conversation of `message`.
    async fn permissions(&self, message: &InboundMessage, actor: &str)
    -> anyhow::Result<Vec<String>>;
}

/// Predicate form of a permission requirement.
#[async_trait]
pub trait PermissionCheck: Send + Sync {
    /// Missing permissions, or `None` when satisfied.
    async fn missing(
        &self,
        message: &InboundMessage,
        actor: &str,
    ) -> anyhow::Result<Option<Vec<String>>>;
}

/// Permissions a command requires of an actor.
#[derive(Clone)]
pub enum PermissionRequirement {
    /// Named permissions; only checked in guild-like conversations.
    Static(Vec<String>),
    /// Arbitrary check; always runs.
    Check(Arc<dyn PermissionCheck>),
}

impl PermissionRequirement {
    pub fn named<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static(permissions.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(list) => f.debug_tuple("Static").field(list).finish(),
            Self::Check(_) => f.write_str("Check(..)"),
        }
    }
}

/// Which identity a permission check was run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionSide {
    /// The dispatcher's own identity.
    Client,
    User,
}

impl PermissionSide {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::User => "user",
        }
    }
}

/// Evaluate `requirement` for `actor`; returns the missing permissions.
pub(crate) async fn missing_permissions(
    provider: &dyn PermissionProvider,
    requirement: &PermissionRequirement,
    message: &InboundMessage,
    actor: &str,
) -> DispatchResult<Option<Vec<String>>> {
    match requirement {
        PermissionRequirement::Static(required) => {
            if message.channel_kind() != ChannelKind::Guild {
                return Ok(None);
            }
            let held = provider
                .permissions(message, actor)
                .await
                .fault(FaultStage::Permission)?;
            let missing: Vec<String> = required
                .iter()
                .filter(|p| !held.contains(p))
                .cloned()
                .collect();
            Ok((!missing.is_empty()).then_some(missing))
        }
        PermissionRequirement::Check(check) => {
            check.missing(message, actor).await.fault(FaultStage::Permission)
        }
    }
}

/// Wildcard conversation for grants that apply everywhere.
pub const ANY_CONVERSATION: &str = "*";

/// In-memory permission provider.
///
/// Grants are keyed by (conversation, actor); a grant made for
/// [`ANY_CONVERSATION`] applies in every conversation.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    owners: Vec<String>,
    grants: DashMap<(String, String), HashSet<String>>,
}

impl StaticPermissions {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
            grants: DashMap::new(),
        }
    }

    pub fn grant<I, S>(&self, conversation: &str, actor: &str, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry((conversation.to_string(), actor.to_string()))
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
    }

    pub fn revoke(&self, conversation: &str, actor: &str, permission: &str) {
        if let Some(mut held) = self
            .grants
            .get_mut(&(conversation.to_string(), actor.to_string()))
        {
            held.remove(permission);
        }
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    fn is_owner(&self, actor: &str) -> bool {
        self.owners.iter().any(|o| o == actor)
    }

    async fn permissions(
        &self,
        message: &InboundMessage,
        actor: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut held: HashSet<String> = HashSet::new();
        for conversation in [message.conversation_id.as_str(), ANY_CONVERSATION] {
            if let Some(grants) = self.grants.get(&(conversation.to_string(), actor.to_string())) {
                held.extend(grants.iter().cloned());
            }
        }
        Ok(held.into_iter().collect())
    }
}
