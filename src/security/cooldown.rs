//! Per-actor command cooldowns.
//!
//! Each (actor, command) pair gets a window that opens on first use and
//! lasts for the command's cooldown. Up to `ratelimit` uses are allowed per
//! window. A timer evicts the entry once the window ends; an entry found
//! stale at check time is treated as expired even if its timer has not run.
//!
//! Windows are measured on the tokio clock.

use crate::commands::Command;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

/// Actor identifier.
type ActorId = String;

#[derive(Debug)]
struct CooldownEntry {
    uses: u32,
    window_end: Instant,
    timer: AbortHandle,
}

type Entries = DashMap<ActorId, HashMap<String, CooldownEntry>>;

/// Thread-safe cooldown tracker.
#[derive(Debug)]
pub struct CooldownManager {
    entries: Arc<Entries>,
    default_cooldown: Option<Duration>,
    /// Actors exempt from cooldowns unless a command overrides the list.
    bypass: Vec<String>,
}

impl CooldownManager {
    pub fn new(default_cooldown: Option<Duration>, bypass: Vec<String>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_cooldown,
            bypass,
        }
    }

    /// Count a use of `command` by `actor`.
    ///
    /// Returns the time left in the window if the actor is rate limited.
    pub fn check(&self, actor: &str, command: &Command) -> Option<Duration> {
        let bypass = command.ignore_cooldown.as_deref().unwrap_or(&self.bypass);
        if bypass.iter().any(|a| a == actor) {
            return None;
        }

        let time = command.cooldown.or(self.default_cooldown)?;
        if time.is_zero() {
            return None;
        }

        let now = Instant::now();
        let mut actor_entries = self.entries.entry(actor.to_string()).or_default();

        let stale = actor_entries
            .get(&command.id)
            .is_some_and(|e| e.window_end <= now);
        if stale && let Some(old) = actor_entries.remove(&command.id) {
            old.timer.abort();
        }

        let entry = actor_entries.entry(command.id.clone()).or_insert_with(|| {
            let window_end = now + time;
            CooldownEntry {
                uses: 0,
                window_end,
                timer: self.spawn_eviction(actor, &command.id, window_end),
            }
        });

        if entry.uses >= command.ratelimit {
            let remaining = entry.window_end.saturating_duration_since(now);
            debug!(
                actor = %actor,
                command = %command.id,
                remaining_ms = remaining.as_millis() as u64,
                "Cooldown active"
            );
            return Some(remaining);
        }

        entry.uses += 1;
        None
    }

    /// Time left in the current window for (`actor`, `command_id`).
    pub fn remaining(&self, actor: &str, command_id: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(actor)?
            .get(command_id)
            .map(|e| e.window_end.saturating_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    /// Drop every window held by `actor`.
    pub fn clear_actor(&self, actor: &str) {
        if let Some((_, entries)) = self.entries.remove(actor) {
            for entry in entries.into_values() {
                entry.timer.abort();
            }
        }
    }

    /// Number of actors with at least one open window.
    pub fn tracked_actors(&self) -> usize {
        self.entries.len()
    }

    fn spawn_eviction(&self, actor: &str, command_id: &str, window_end: Instant) -> AbortHandle {
        let entries = Arc::clone(&self.entries);
        let actor = actor.to_string();
        let command_id = command_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep_until(window_end).await;
            evict(&entries, &actor, &command_id, window_end);
        })
        .abort_handle()
    }
}

fn evict(entries: &Entries, actor: &str, command_id: &str, window_end: Instant) {
    if let Some(mut actor_entries) = entries.get_mut(actor) {
        // a newer window may have replaced the one this timer belongs to
        if actor_entries
            .get(command_id)
            .is_some_and(|e| e.window_end == window_end)
        {
            actor_entries.remove(command_id);
        }
    }
    entries.remove_if(actor, |_, m| m.is_empty());
}

impl Drop for CooldownManager {
    fn drop(&mut self) {
        for actor in self.entries.iter() {
            for entry in actor.values() {
                entry.timer.abort();
            }
        }
    }
}
