//! Command registry: command table, alias table and prefix index.
//!
//! The `CommandRegistry` owns every registered command and keeps:
//! - a case-insensitive alias table (alias -> command id), unique registry-wide;
//! - a prefix index of commands that override the global prefix, sorted so the
//!   most specific prefix is tried first;
//! - per-command usage counters (see [`CommandRegistry::command_stats`]).
//!
//! Registration is all-or-nothing: a conflicting alias leaves the registry
//! untouched.

use super::command::Command;
use crate::error::RegistryError;
use crate::resolver::{Prefix, PrefixSupplier};
use parking_lot::RwLock;
use regex::Regex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Key of a prefix index entry.
#[derive(Clone)]
pub(crate) enum PrefixKey {
    Text(String),
    /// Dynamic prefix owned by a single command.
    Dynamic {
        owner: String,
        supplier: Arc<dyn PrefixSupplier>,
    },
}

impl PrefixKey {
    fn same_key(&self, other: &PrefixKey) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Dynamic { owner: a, .. }, Self::Dynamic { owner: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// One prefix index entry: a prefix and the commands that require it.
#[derive(Clone)]
pub(crate) struct PrefixEntry {
    pub key: PrefixKey,
    pub commands: BTreeSet<String>,
}

/// Ordering for prefixes: longer first, ties broken lexically, empty and
/// dynamic prefixes last.
pub(crate) fn prefix_compare(a: Option<&str>, b: Option<&str>) -> CmpOrdering {
    // `None` stands for a dynamic prefix
    match (a, b) {
        (Some(""), Some("")) => CmpOrdering::Equal,
        (Some(""), _) => CmpOrdering::Greater,
        (_, Some("")) => CmpOrdering::Less,
        (None, None) => CmpOrdering::Equal,
        (None, _) => CmpOrdering::Greater,
        (_, None) => CmpOrdering::Less,
        (Some(a), Some(b)) => {
            let (la, lb) = (a.chars().count(), b.chars().count());
            if la == lb { a.cmp(b) } else { lb.cmp(&la) }
        }
    }
}

fn key_text(key: &PrefixKey) -> Option<&str> {
    match key {
        PrefixKey::Text(s) => Some(s),
        PrefixKey::Dynamic { .. } => None,
    }
}

#[derive(Default)]
struct RegistryInner {
    commands: HashMap<String, Arc<Command>>,
    /// Registration order, for deterministic iteration.
    order: Vec<String>,
    aliases: HashMap<String, String>,
    prefixes: Vec<PrefixEntry>,
    usage: HashMap<String, Arc<AtomicU64>>,
}

/// Registry of commands.
pub struct CommandRegistry {
    inner: RwLock<RegistryInner>,
    alias_replacement: Option<Regex>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            alias_replacement: None,
        }
    }

    /// Derive secondary aliases by stripping every match of `pattern`.
    pub fn with_alias_replacement(pattern: Regex) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            alias_replacement: Some(pattern),
        }
    }

    /// Register a command.
    ///
    /// Fails with [`RegistryError::AliasConflict`] if any alias (or derived
    /// alias) already names another command; nothing is inserted in that case.
    pub fn register(&self, command: Arc<Command>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();

        if inner.commands.contains_key(&command.id) {
            return Err(RegistryError::CommandExists(command.id.clone()));
        }

        let mut planned: Vec<String> = Vec::new();
        for alias in &command.aliases {
            let lower = alias.to_lowercase();
            let mut candidates = vec![lower.clone()];
            if let Some(ref re) = self.alias_replacement {
                let replaced = re.replace_all(&lower, "").into_owned();
                if replaced != lower && !replaced.is_empty() {
                    candidates.push(replaced);
                }
            }

            for candidate in candidates {
                if let Some(existing) = inner.aliases.get(&candidate) {
                    return Err(RegistryError::AliasConflict {
                        alias: candidate,
                        command: command.id.clone(),
                        existing: existing.clone(),
                    });
                }
                if !planned.contains(&candidate) {
                    planned.push(candidate);
                }
            }
        }

        for alias in planned {
            inner.aliases.insert(alias, command.id.clone());
        }

        if let Some(ref prefix) = command.prefix {
            add_prefix_entries(&mut inner.prefixes, &command.id, prefix);
        }

        inner
            .usage
            .insert(command.id.clone(), Arc::new(AtomicU64::new(0)));
        inner.order.push(command.id.clone());
        inner.commands.insert(command.id.clone(), command.clone());

        info!(
            command = %command.id,
            aliases = command.aliases.len(),
            prefix_override = command.prefix.is_some(),
            "Command registered"
        );
        Ok(())
    }

    /// Remove a command with every alias and prefix-index entry added for it.
    pub fn deregister(&self, id: &str) -> Result<Arc<Command>, RegistryError> {
        let mut inner = self.inner.write();
        let command = inner
            .commands
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownCommand(id.to_string()))?;

        inner.aliases.retain(|_, owner| owner != id);
        inner.order.retain(|c| c != id);
        inner.usage.remove(id);
        for entry in inner.prefixes.iter_mut() {
            entry.commands.remove(id);
        }
        inner.prefixes.retain(|e| !e.commands.is_empty());

        info!(command = %id, "Command deregistered");
        Ok(command)
    }

    /// Case-insensitive exact alias lookup.
    pub fn find_by_alias(&self, name: &str) -> Option<Arc<Command>> {
        let inner = self.inner.read();
        inner
            .aliases
            .get(&name.to_lowercase())
            .and_then(|id| inner.commands.get(id))
            .cloned()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Command>> {
        self.inner.read().commands.get(id).cloned()
    }

    /// All commands in registration order.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.commands.get(id).cloned())
            .collect()
    }

    /// Every alias (including derived ones) mapped to `id`, sorted.
    pub fn aliases_of(&self, id: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut aliases: Vec<String> = inner
            .aliases
            .iter()
            .filter(|(_, owner)| owner.as_str() == id)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }

    /// Enable or disable a command at runtime.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let command = self
            .get(id)
            .ok_or_else(|| RegistryError::UnknownCommand(id.to_string()))?;
        command.set_enabled(enabled);
        debug!(command = %id, enabled, "Command toggled");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the prefix index in priority order.
    pub(crate) fn prefix_entries(&self) -> Vec<PrefixEntry> {
        self.inner.read().prefixes.clone()
    }

    /// Count one execution of `id`.
    pub(crate) fn record_use(&self, id: &str) {
        if let Some(counter) = self.inner.read().usage.get(id) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Command usage statistics, most used first. Unused commands are omitted.
    pub fn command_stats(&self) -> Vec<(String, u64)> {
        let inner = self.inner.read();
        let mut stats: Vec<_> = inner
            .usage
            .iter()
            .map(|(cmd, count)| (cmd.clone(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn add_prefix_entries(entries: &mut Vec<PrefixEntry>, id: &str, prefix: &Prefix) {
    let keys: Vec<PrefixKey> = match prefix {
        Prefix::Static(list) => list.iter().cloned().map(PrefixKey::Text).collect(),
        Prefix::Dynamic(supplier) => vec![PrefixKey::Dynamic {
            owner: id.to_string(),
            supplier: supplier.clone(),
        }],
    };

    let mut new_key = false;
    for key in keys {
        match entries.iter_mut().find(|e| e.key.same_key(&key)) {
            Some(entry) => {
                entry.commands.insert(id.to_string());
            }
            None => {
                entries.push(PrefixEntry {
                    key,
                    commands: BTreeSet::from([id.to_string()]),
                });
                new_key = true;
            }
        }
    }

    if new_key {
        entries.sort_by(|a, b| prefix_compare(key_text(&a.key), key_text(&b.key)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Value;
    use crate::commands::handler_fn;

    fn command(id: &str, aliases: &[&str]) -> Arc<Command> {
        Command::builder(id, handler_fn(|_, _| async { Ok(Value::Null) }))
            .aliases(aliases.iter().copied())
            .build()
    }

    #[test]
    fn test_find_by_alias_case_insensitive() {
        let registry = CommandRegistry::new();
        registry.register(command("ping", &["ping", "P"])).unwrap();
        assert_eq!(registry.find_by_alias("PING").unwrap().id, "ping");
        assert_eq!(registry.find_by_alias("p").unwrap().id, "ping");
        assert!(registry.find_by_alias("pong").is_none());
    }

    #[test]
    fn test_alias_conflict_leaves_registry_untouched() {
        let registry = CommandRegistry::new();
        registry.register(command("ban", &["ban", "b"])).unwrap();

        let err = registry
            .register(command("block", &["block", "B"]))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::AliasConflict {
                alias: "b".into(),
                command: "block".into(),
                existing: "ban".into(),
            }
        );
        // "block" came before the conflicting alias and must not have leaked in
        assert!(registry.find_by_alias("block").is_none());
        assert!(registry.get("block").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = CommandRegistry::new();
        registry.register(command("ping", &["ping"])).unwrap();
        let err = registry.register(command("ping", &["other"])).unwrap_err();
        assert_eq!(err, RegistryError::CommandExists("ping".into()));
    }

    #[test]
    fn test_alias_replacement_derives_secondary() {
        let registry = CommandRegistry::with_alias_replacement(Regex::new("-").unwrap());
        registry.register(command("roleinfo", &["role-info"])).unwrap();
        assert_eq!(registry.find_by_alias("roleinfo").unwrap().id, "roleinfo");
        assert_eq!(registry.aliases_of("roleinfo"), vec!["role-info", "roleinfo"]);

        let err = registry.register(command("other", &["role_info", "roleinfo"]));
        assert!(matches!(err, Err(RegistryError::AliasConflict { .. })));
    }

    #[test]
    fn test_deregister_round_trip() {
        let registry = CommandRegistry::new();
        let cmd = Command::builder("admin", handler_fn(|_, _| async { Ok(Value::Null) }))
            .aliases(["ban"])
            .prefix(Prefix::single("!!admin "))
            .build();
        registry.register(cmd.clone()).unwrap();
        assert_eq!(registry.prefix_entries().len(), 1);

        registry.deregister("admin").unwrap();
        assert!(registry.find_by_alias("ban").is_none());
        assert!(registry.prefix_entries().is_empty());

        registry.register(cmd).unwrap();
        assert_eq!(registry.find_by_alias("ban").unwrap().id, "admin");
        assert_eq!(registry.prefix_entries().len(), 1);
    }

    #[test]
    fn test_deregister_unknown() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.deregister("nope").unwrap_err(),
            RegistryError::UnknownCommand("nope".into())
        );
    }

    #[test]
    fn test_prefix_index_sorted_longest_first() {
        let registry = CommandRegistry::new();
        for (id, prefix) in [("a", "?"), ("b", "??long"), ("c", "!!"), ("d", "")] {
            let cmd = Command::builder(id, handler_fn(|_, _| async { Ok(Value::Null) }))
                .aliases([id])
                .prefix(Prefix::single(prefix))
                .build();
            registry.register(cmd).unwrap();
        }
        let order: Vec<_> = registry
            .prefix_entries()
            .iter()
            .map(|e| key_text(&e.key).unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["??long", "!!", "?", ""]);
    }

    #[test]
    fn test_shared_prefix_groups_commands() {
        let registry = CommandRegistry::new();
        for id in ["kick", "ban"] {
            let cmd = Command::builder(id, handler_fn(|_, _| async { Ok(Value::Null) }))
                .aliases([id])
                .prefix(Prefix::single("$"))
                .build();
            registry.register(cmd).unwrap();
        }
        let entries = registry.prefix_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].commands.len(), 2);

        registry.deregister("kick").unwrap();
        let entries = registry.prefix_entries();
        assert_eq!(entries[0].commands.iter().collect::<Vec<_>>(), vec!["ban"]);
    }

    #[test]
    fn test_dynamic_override_indexed_after_static() {
        let registry = CommandRegistry::new();
        let tag = Command::builder("tag", handler_fn(|_, _| async { Ok(Value::Null) }))
            .aliases(["tag"])
            .prefix(Prefix::from_fn(|_| vec!["$".to_string()]))
            .build();
        let pay = Command::builder("pay", handler_fn(|_, _| async { Ok(Value::Null) }))
            .aliases(["pay"])
            .prefix(Prefix::single("$"))
            .build();
        registry.register(tag).unwrap();
        registry.register(pay).unwrap();

        let entries = registry.prefix_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(key_text(&entries[0].key), Some("$"));
        assert!(matches!(&entries[1].key, PrefixKey::Dynamic { owner, .. } if owner == "tag"));
    }

    #[test]
    fn test_prefix_compare_orders_dynamic_and_empty_last() {
        assert_eq!(prefix_compare(Some("!!"), Some("!")), CmpOrdering::Less);
        assert_eq!(prefix_compare(Some("a"), Some("b")), CmpOrdering::Less);
        assert_eq!(prefix_compare(None, Some("!")), CmpOrdering::Greater);
        assert_eq!(prefix_compare(Some(""), None), CmpOrdering::Greater);
    }

    #[test]
    fn test_command_stats() {
        let registry = CommandRegistry::new();
        registry.register(command("a", &["a"])).unwrap();
        registry.register(command("b", &["b"])).unwrap();
        registry.record_use("b");
        registry.record_use("b");
        registry.record_use("a");
        assert_eq!(
            registry.command_stats(),
            vec![("b".to_string(), 2), ("a".to_string(), 1)]
        );
    }

    #[test]
    fn test_set_enabled() {
        let registry = CommandRegistry::new();
        registry.register(command("a", &["a"])).unwrap();
        registry.set_enabled("a", false).unwrap();
        assert!(!registry.get("a").unwrap().is_enabled());
        assert!(registry.set_enabled("zzz", true).is_err());
    }
}
