//! Prompt options and stage texts.
//!
//! Options are partial at every level and merged handler < command <
//! argument, later levels winning field by field. [`PromptOptions::resolve`]
//! fills whatever is still unset with the built-in defaults.

use crate::args::Args;
use crate::config::PromptConfig;
use crate::message::InboundMessage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_TIME: Duration = Duration::from_secs(30);
pub const DEFAULT_CANCEL_WORD: &str = "cancel";
pub const DEFAULT_STOP_WORD: &str = "stop";

/// State handed to prompt text functions.
#[derive(Debug, Clone)]
pub struct PromptData {
    /// Current retry count, starting at 1.
    pub retries: u32,
    pub infinite: bool,
    /// Phrase that failed to cast (or the last reply).
    pub phrase: String,
    /// Most recent message of the exchange.
    pub message: Arc<InboundMessage>,
}

/// Text function: triggering message, prior arguments, prompt state.
pub type PromptFn = dyn Fn(&InboundMessage, &Args, &PromptData) -> String + Send + Sync;

/// Text sent at a prompt stage.
#[derive(Clone)]
pub enum PromptText {
    Static(String),
    /// Joined with newlines.
    Lines(Vec<String>),
    Fn(Arc<PromptFn>),
}

impl PromptText {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&InboundMessage, &Args, &PromptData) -> String + Send + Sync + 'static,
    {
        Self::Fn(Arc::new(f))
    }

    pub fn render(&self, message: &InboundMessage, args: &Args, data: &PromptData) -> String {
        match self {
            Self::Static(s) => s.clone(),
            Self::Lines(lines) => lines.join("\n"),
            Self::Fn(f) => f(message, args, data),
        }
    }
}

impl fmt::Debug for PromptText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(s) => f.debug_tuple("Static").field(s).finish(),
            Self::Lines(l) => f.debug_tuple("Lines").field(l).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl From<&str> for PromptText {
    fn from(s: &str) -> Self {
        Self::Static(s.to_string())
    }
}

impl From<String> for PromptText {
    fn from(s: String) -> Self {
        Self::Static(s)
    }
}

impl From<Vec<String>> for PromptText {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

/// Partial prompt options.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Retries allowed after the first failed reply.
    pub retries: Option<u32>,
    pub time: Option<Duration>,
    pub cancel_word: Option<String>,
    pub stop_word: Option<String>,
    /// An empty phrase takes the default instead of prompting.
    pub optional: Option<bool>,
    /// Collect values until the stop word or `limit`.
    pub infinite: Option<bool>,
    pub limit: Option<usize>,
    /// Abandon the prompt when a reply is itself a command.
    pub breakout: Option<bool>,
    pub start: Option<PromptText>,
    pub retry: Option<PromptText>,
    pub timeout: Option<PromptText>,
    pub ended: Option<PromptText>,
    pub cancel: Option<PromptText>,
}

macro_rules! merge_fields {
    ($base:expr, $over:expr, $($field:ident),+) => {
        PromptOptions {
            $($field: $over.$field.clone().or_else(|| $base.$field.clone()),)+
        }
    };
}

impl PromptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    pub fn cancel_word(mut self, word: impl Into<String>) -> Self {
        self.cancel_word = Some(word.into());
        self
    }

    pub fn stop_word(mut self, word: impl Into<String>) -> Self {
        self.stop_word = Some(word.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = Some(true);
        self
    }

    pub fn infinite(mut self) -> Self {
        self.infinite = Some(true);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn breakout(mut self, breakout: bool) -> Self {
        self.breakout = Some(breakout);
        self
    }

    pub fn start(mut self, text: impl Into<PromptText>) -> Self {
        self.start = Some(text.into());
        self
    }

    pub fn retry(mut self, text: impl Into<PromptText>) -> Self {
        self.retry = Some(text.into());
        self
    }

    pub fn timeout(mut self, text: impl Into<PromptText>) -> Self {
        self.timeout = Some(text.into());
        self
    }

    pub fn ended(mut self, text: impl Into<PromptText>) -> Self {
        self.ended = Some(text.into());
        self
    }

    pub fn cancel(mut self, text: impl Into<PromptText>) -> Self {
        self.cancel = Some(text.into());
        self
    }

    /// Layer `over` on top of `self`.
    pub fn merge(&self, over: &PromptOptions) -> PromptOptions {
        merge_fields!(
            self, over, retries, time, cancel_word, stop_word, optional, infinite, limit,
            breakout, start, retry, timeout, ended, cancel
        )
    }

    /// Fill unset fields with defaults.
    pub fn resolve(&self) -> ResolvedPrompt {
        ResolvedPrompt {
            retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            time: self.time.unwrap_or(DEFAULT_TIME),
            cancel_word: self
                .cancel_word
                .clone()
                .unwrap_or_else(|| DEFAULT_CANCEL_WORD.to_string()),
            stop_word: self
                .stop_word
                .clone()
                .unwrap_or_else(|| DEFAULT_STOP_WORD.to_string()),
            optional: self.optional.unwrap_or(false),
            infinite: self.infinite.unwrap_or(false),
            limit: self.limit.unwrap_or(usize::MAX),
            breakout: self.breakout.unwrap_or(true),
            start: self.start.clone(),
            retry: self.retry.clone(),
            timeout: self.timeout.clone(),
            ended: self.ended.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl From<&PromptConfig> for PromptOptions {
    fn from(config: &PromptConfig) -> Self {
        Self {
            retries: Some(config.retries),
            time: Some(Duration::from_millis(config.time_ms)),
            cancel_word: Some(config.cancel_word.clone()),
            stop_word: Some(config.stop_word.clone()),
            optional: Some(config.optional),
            infinite: Some(config.infinite),
            limit: config.limit,
            breakout: Some(config.breakout),
            start: config.start.clone().map(PromptText::Static),
            retry: config.retry.clone().map(PromptText::Static),
            timeout: config.timeout.clone().map(PromptText::Static),
            ended: config.ended.clone().map(PromptText::Static),
            cancel: config.cancel.clone().map(PromptText::Static),
        }
    }
}

/// Fully resolved prompt options.
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub retries: u32,
    pub time: Duration,
    pub cancel_word: String,
    pub stop_word: String,
    pub optional: bool,
    pub infinite: bool,
    pub limit: usize,
    pub breakout: bool,
    pub start: Option<PromptText>,
    pub retry: Option<PromptText>,
    pub timeout: Option<PromptText>,
    pub ended: Option<PromptText>,
    pub cancel: Option<PromptText>,
}
