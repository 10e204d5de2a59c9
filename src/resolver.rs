//! Prefix and alias resolution.
//!
//! Decides which prefix an inbound message starts with and which command the
//! following token names. Global prefixes are tried first; commands that
//! declare their own prefix are only reachable through the registry's prefix
//! index, never through the global prefix.

use crate::commands::{Command, CommandRegistry};
use crate::commands::registry::{PrefixKey, prefix_compare};
use crate::error::{DispatchResult, FaultExt, FaultStage};
use crate::message::InboundMessage;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Supplies prefixes per message (e.g. per-guild prefixes from storage).
#[async_trait]
pub trait PrefixSupplier: Send + Sync {
    async fn prefixes(&self, message: &InboundMessage) -> anyhow::Result<Vec<String>>;
}

struct PrefixFn<F>(F);

#[async_trait]
impl<F> PrefixSupplier for PrefixFn<F>
where
    F: Fn(&InboundMessage) -> Vec<String> + Send + Sync,
{
    async fn prefixes(&self, message: &InboundMessage) -> anyhow::Result<Vec<String>> {
        Ok((self.0)(message))
    }
}

/// A prefix declaration: fixed strings or a per-message supplier.
#[derive(Clone)]
pub enum Prefix {
    Static(Vec<String>),
    Dynamic(Arc<dyn PrefixSupplier>),
}

impl Prefix {
    pub fn single(prefix: impl Into<String>) -> Self {
        Self::Static(vec![prefix.into()])
    }

    pub fn many<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn dynamic(supplier: Arc<dyn PrefixSupplier>) -> Self {
        Self::Dynamic(supplier)
    }

    /// Dynamic prefix from a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&InboundMessage) -> Vec<String> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(PrefixFn(f)))
    }

    async fn resolve(&self, message: &InboundMessage) -> DispatchResult<Vec<String>> {
        match self {
            Self::Static(list) => Ok(list.clone()),
            Self::Dynamic(supplier) => supplier.prefixes(message).await.fault(FaultStage::Prefix),
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(list) => f.debug_tuple("Static").field(list).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Outcome of resolving a message that started with a known prefix.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Resolved command; `None` when the prefix matched but no usable alias followed.
    pub command: Option<Arc<Command>>,
    pub prefix: String,
    /// First token after the prefix, empty if there was none.
    pub alias: String,
    /// Text after the alias, trimmed.
    pub content: String,
    /// Text after the prefix, trimmed.
    pub after_prefix: String,
}

/// Resolves prefixes and aliases against a registry.
pub struct PrefixResolver {
    global: Prefix,
    allow_mention: bool,
    client_id: String,
}

impl PrefixResolver {
    pub fn new(global: Prefix, allow_mention: bool, client_id: impl Into<String>) -> Self {
        Self {
            global,
            allow_mention,
            client_id: client_id.into(),
        }
    }

    /// Resolve `message`.
    ///
    /// `Ok(None)` means no prefix matched at all. A matched prefix without a
    /// usable command yields `Some` with `command == None`.
    pub async fn resolve(
        &self,
        registry: &CommandRegistry,
        message: &InboundMessage,
    ) -> DispatchResult<Option<ParseResult>> {
        let global = self.parse_global(registry, message).await?;
        if global.as_ref().is_some_and(|r| r.command.is_some()) {
            return Ok(global);
        }

        let overridden = parse_overrides(registry, message).await?;
        match (global, overridden) {
            (_, Some(over)) if over.command.is_some() => Ok(Some(over)),
            (None, over) => Ok(over),
            (global, _) => Ok(global),
        }
    }

    async fn parse_global(
        &self,
        registry: &CommandRegistry,
        message: &InboundMessage,
    ) -> DispatchResult<Option<ParseResult>> {
        let mut prefixes = self.global.resolve(message).await?;
        if self.allow_mention && !self.client_id.is_empty() {
            prefixes.insert(0, format!("<@{}>", self.client_id));
            prefixes.insert(1, format!("<@!{}>", self.client_id));
        }
        prefixes.sort_by(|a, b| prefix_compare(Some(a), Some(b)));

        let pairs: Vec<(String, Option<&BTreeSet<String>>)> =
            prefixes.into_iter().map(|p| (p, None)).collect();
        Ok(parse_multiple(registry, message, &pairs))
    }
}

impl fmt::Debug for PrefixResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixResolver")
            .field("global", &self.global)
            .field("allow_mention", &self.allow_mention)
            .finish()
    }
}

/// Try the prefix index, most specific prefix first.
async fn parse_overrides(
    registry: &CommandRegistry,
    message: &InboundMessage,
) -> DispatchResult<Option<ParseResult>> {
    let entries = registry.prefix_entries();
    if entries.is_empty() {
        return Ok(None);
    }

    let mut pairs: Vec<(String, Option<&BTreeSet<String>>)> = Vec::new();
    for entry in &entries {
        match &entry.key {
            PrefixKey::Text(p) => pairs.push((p.clone(), Some(&entry.commands))),
            PrefixKey::Dynamic { supplier, .. } => {
                let resolved = supplier.prefixes(message).await.fault(FaultStage::Prefix)?;
                pairs.extend(resolved.into_iter().map(|p| (p, Some(&entry.commands))));
            }
        }
    }
    pairs.sort_by(|a, b| prefix_compare(Some(&a.0), Some(&b.0)));

    Ok(parse_multiple(registry, message, &pairs))
}

/// First candidate that resolves a command, else the first whose prefix matched.
fn parse_multiple(
    registry: &CommandRegistry,
    message: &InboundMessage,
    pairs: &[(String, Option<&BTreeSet<String>>)],
) -> Option<ParseResult> {
    let parsed: Vec<ParseResult> = pairs
        .iter()
        .filter_map(|(prefix, ids)| parse_with_prefix(registry, message, prefix, *ids))
        .collect();

    let hit = parsed.iter().position(|r| r.command.is_some()).unwrap_or(0);
    parsed.into_iter().nth(hit)
}

fn parse_with_prefix(
    registry: &CommandRegistry,
    message: &InboundMessage,
    prefix: &str,
    associated: Option<&BTreeSet<String>>,
) -> Option<ParseResult> {
    let rest = strip_prefix_ci(&message.content, prefix)?;
    let after_prefix = rest.trim();
    let args_start = rest.trim_start();
    let alias = args_start.split_whitespace().next().unwrap_or("");
    let content = args_start[alias.len()..].trim();

    let mut result = ParseResult {
        command: None,
        prefix: prefix.to_string(),
        alias: alias.to_string(),
        content: content.to_string(),
        after_prefix: after_prefix.to_string(),
    };

    if alias.is_empty() {
        return Some(result);
    }

    let command = registry.find_by_alias(alias);
    result.command = match (command, associated) {
        // commands with an override prefix are unreachable via the global prefix
        (Some(cmd), None) if cmd.prefix.is_none() => Some(cmd),
        (Some(cmd), Some(ids)) if ids.contains(&cmd.id) => Some(cmd),
        _ => None,
    };
    Some(result)
}

/// Case-insensitive `strip_prefix`, returning the remainder of `text`.
pub(crate) fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.char_indices();
    for p in prefix.chars() {
        let (_, c) = chars.next()?;
        if c != p && !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    Some(&text[chars.offset()..])
}
