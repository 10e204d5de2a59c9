//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
///
/// Every section is optional; an empty file yields a working dispatcher
/// with the `!` prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Prefix resolution, built-in gates and cooldown defaults.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Handler-level prompt defaults.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Log output (used by the console binary).
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Content splitting strategy selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Whitespace-delimited words.
    Plain,
    /// Like plain, but `"double quoted spans"` are one token.
    #[default]
    Quoted,
    /// Like quoted, but a quote only opens a span at the start of a token.
    Sticky,
    /// The whole remainder is a single token.
    None,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// The bot's own actor id. Used for self-message blocking, mention
    /// prefixes and client permission checks. Empty disables those.
    #[serde(default)]
    pub client_id: String,
    /// Global prefixes (default: `["!"]`).
    #[serde(default = "default_prefix")]
    pub prefix: Vec<String>,
    /// Accept `<@client_id>` and `<@!client_id>` as prefixes.
    #[serde(default = "default_true")]
    pub allow_mention: bool,
    /// Block messages authored by the bot itself.
    #[serde(default = "default_true")]
    pub block_client: bool,
    /// Block messages authored by automated accounts.
    #[serde(default = "default_true")]
    pub block_bots: bool,
    /// Process edit events at all.
    #[serde(default)]
    pub handle_edits: bool,
    /// Owner actor ids (owner-only commands, default cooldown bypass).
    #[serde(default)]
    pub owners: Vec<String>,
    /// Actors that bypass cooldowns. Unset means the owners.
    #[serde(default)]
    pub ignore_cooldown: Option<Vec<String>>,
    /// Actors that bypass user permission checks.
    #[serde(default)]
    pub ignore_permissions: Vec<String>,
    /// Cooldown applied to commands that do not declare one (0 = none).
    #[serde(default)]
    pub default_cooldown_ms: u64,
    /// Regex whose matches are stripped from aliases to derive secondary
    /// aliases (e.g. `"-"` makes `"role-info"` also answer to `"roleinfo"`).
    #[serde(default)]
    pub alias_replacement: Option<String>,
    /// Default content splitting strategy.
    #[serde(default)]
    pub split: SplitStrategy,
    /// Capacity of the event broadcast channels.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            prefix: default_prefix(),
            allow_mention: true,
            block_client: true,
            block_bots: true,
            handle_edits: false,
            owners: Vec::new(),
            ignore_cooldown: None,
            ignore_permissions: Vec::new(),
            default_cooldown_ms: 0,
            alias_replacement: None,
            split: SplitStrategy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DispatcherConfig {
    /// Default cooldown as a duration, `None` when disabled.
    pub fn default_cooldown(&self) -> Option<Duration> {
        (self.default_cooldown_ms > 0).then(|| Duration::from_millis(self.default_cooldown_ms))
    }

    /// Actors that bypass cooldowns when a command does not say otherwise.
    pub fn cooldown_bypass(&self) -> &[String] {
        self.ignore_cooldown.as_deref().unwrap_or(&self.owners)
    }
}

/// Handler-level prompt defaults.
///
/// Command-level and argument-level prompt options override these.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// Retries allowed after the first invalid reply.
    #[serde(default = "default_prompt_retries")]
    pub retries: u32,
    /// Milliseconds to wait for each reply.
    #[serde(default = "default_prompt_time_ms")]
    pub time_ms: u64,
    #[serde(default = "default_cancel_word")]
    pub cancel_word: String,
    #[serde(default = "default_stop_word")]
    pub stop_word: String,
    /// Missing (empty) input falls back to the default instead of prompting.
    #[serde(default)]
    pub optional: bool,
    /// Collect values until the stop word or `limit`.
    #[serde(default)]
    pub infinite: bool,
    /// Maximum number of values collected in infinite mode.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Abandon the prompt when the reply is itself a command.
    #[serde(default = "default_true")]
    pub breakout: bool,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub retry: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub ended: Option<String>,
    #[serde(default)]
    pub cancel: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            retries: default_prompt_retries(),
            time_ms: default_prompt_time_ms(),
            cancel_word: default_cancel_word(),
            stop_word: default_stop_word(),
            optional: false,
            infinite: false,
            limit: None,
            breakout: true,
            start: None,
            retry: None,
            timeout: None,
            ended: None,
            cancel: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}
