//! Argument declarations, splitting, casting and parsing.

pub mod parser;
pub mod split;
pub mod types;
pub mod value;

pub use parser::ParseOutcome;
pub use split::{Splitter, Token};
pub use types::{ArgumentType, CastContext, Caster, TypeRegistry, caster_fn};
pub use value::{Args, Captures, RegexMatch, Value};

use crate::message::InboundMessage;
use crate::prompt::PromptOptions;
use std::fmt;
use std::sync::Arc;

/// How an argument takes its phrase from the split content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The token at the argument's position among non-marker tokens.
    Word,
    /// Non-marker tokens from the position on, original spacing kept.
    Rest,
    /// Like `Rest`, each token cast on its own into a list.
    Separate,
    /// Whether a marker token is present.
    Flag,
    /// Value following (or attached to) a marker.
    Option,
    /// Non-marker tokens from the position on, single-spaced.
    Text,
    /// All tokens, markers included, from the index on.
    Content,
    /// Always the empty phrase.
    None,
}

/// Default computed from the message and earlier arguments.
pub type DefaultFn = dyn Fn(&InboundMessage, &Args) -> Value + Send + Sync;

/// Fallback for an argument that failed to cast.
#[derive(Clone, Default)]
pub enum ArgDefault {
    #[default]
    Unset,
    Value(Value),
    Fn(Arc<DefaultFn>),
}

impl ArgDefault {
    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub fn resolve(&self, message: &InboundMessage, args: &Args) -> Value {
        match self {
            Self::Unset => Value::Null,
            Self::Value(v) => v.clone(),
            Self::Fn(f) => f(message, args),
        }
    }
}

impl fmt::Debug for ArgDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

/// One declared argument of a command.
#[derive(Debug, Clone)]
pub struct Argument {
    pub id: String,
    pub kind: MatchKind,
    pub ty: ArgumentType,
    /// Marker tokens for `Flag` and `Option` arguments.
    pub markers: Vec<String>,
    /// Explicit position; otherwise the next ordinal.
    pub index: Option<usize>,
    /// Maximum tokens taken by `Rest`, `Separate`, `Text` and `Content`.
    pub limit: Option<usize>,
    pub default: ArgDefault,
    pub prompt: Option<PromptOptions>,
    /// Sent on cast failure instead of prompting or defaulting; cancels the command.
    pub otherwise: Option<String>,
}

impl Argument {
    fn with_kind(id: impl Into<String>, kind: MatchKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ty: ArgumentType::String,
            markers: Vec::new(),
            index: None,
            limit: None,
            default: ArgDefault::Unset,
            prompt: None,
            otherwise: None,
        }
    }

    pub fn word(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::Word)
    }

    pub fn rest(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::Rest)
    }

    pub fn separate(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::Separate)
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::Text)
    }

    pub fn content(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::Content)
    }

    pub fn none(id: impl Into<String>) -> Self {
        Self::with_kind(id, MatchKind::None)
    }

    pub fn flag<I, S>(id: impl Into<String>, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut arg = Self::with_kind(id, MatchKind::Flag);
        arg.markers = markers.into_iter().map(Into::into).collect();
        arg
    }

    pub fn option<I, S>(id: impl Into<String>, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut arg = Self::with_kind(id, MatchKind::Option);
        arg.markers = markers.into_iter().map(Into::into).collect();
        arg
    }

    pub fn ty(mut self, ty: ArgumentType) -> Self {
        self.ty = ty;
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = ArgDefault::Value(value.into());
        self
    }

    pub fn default_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&InboundMessage, &Args) -> Value + Send + Sync + 'static,
    {
        self.default = ArgDefault::Fn(Arc::new(f));
        self
    }

    pub fn prompt(mut self, options: PromptOptions) -> Self {
        self.prompt = Some(options);
        self
    }

    pub fn otherwise(mut self, text: impl Into<String>) -> Self {
        self.otherwise = Some(text.into());
        self
    }
}
