//! Argument types and casting.
//!
//! A cast turns a phrase into a [`Value`] or reports "not satisfied" with
//! `None`. Built-in primitive types never accept an empty phrase; custom
//! casters and named resolvers are called regardless and decide for
//! themselves. Failures inside user code surface as cast faults.

use super::value::{Args, Captures, RegexMatch, Value, all_matches};
use crate::commands::CommandRegistry;
use crate::error::{DispatchError, DispatchResult, Fault, FaultExt, FaultStage};
use crate::message::InboundMessage;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// What a caster can see besides the phrase.
pub struct CastContext<'a> {
    /// Message whose text is being cast (a prompt reply, when prompting).
    pub message: &'a InboundMessage,
    pub registry: &'a CommandRegistry,
    /// Arguments resolved so far.
    pub args: &'a Args,
}

/// Custom cast or named resolver.
#[async_trait]
pub trait Caster: Send + Sync {
    async fn cast(&self, phrase: &str, ctx: &CastContext<'_>) -> anyhow::Result<Option<Value>>;
}

type CastFn = dyn Fn(&str, &CastContext<'_>) -> anyhow::Result<Option<Value>> + Send + Sync;

struct FnCaster(Box<CastFn>);

#[async_trait]
impl Caster for FnCaster {
    async fn cast(&self, phrase: &str, ctx: &CastContext<'_>) -> anyhow::Result<Option<Value>> {
        (self.0)(phrase, ctx)
    }
}

/// Build a caster from a synchronous closure.
pub fn caster_fn<F>(f: F) -> Arc<dyn Caster>
where
    F: Fn(&str, &CastContext<'_>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnCaster(Box::new(f)))
}

/// How an argument's phrase is cast.
#[derive(Clone, Default)]
pub enum ArgumentType {
    #[default]
    String,
    Lowercase,
    Uppercase,
    /// Unicode code points.
    CharCodes,
    /// Any finite-or-infinite float; NaN fails.
    Number,
    /// Strict `i64`.
    Integer,
    /// Number if it parses, else the string.
    Dynamic,
    /// Integer if it parses, else the string.
    DynamicInt,
    Url,
    Date,
    /// Hex color, `#`/`0x` optional, up to `0xFFFFFF`.
    Color,
    /// Case-insensitive whitelist; each group's first entry is canonical.
    Choice(Vec<Vec<String>>),
    Regex(Regex),
    /// Named resolver registered on the [`TypeRegistry`].
    Resolver(String),
    Custom(Arc<dyn Caster>),
    /// First member that casts wins.
    Union(Vec<ArgumentType>),
    /// Numeric value, or length, within `[min, max)`.
    Range {
        inner: Box<ArgumentType>,
        min: f64,
        max: f64,
    },
}

impl ArgumentType {
    /// Whitelist of single-entry groups.
    pub fn choice<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choice(entries.into_iter().map(|e| vec![e.into()]).collect())
    }

    pub fn choice_groups(groups: Vec<Vec<String>>) -> Self {
        Self::Choice(groups)
    }

    pub fn resolver(name: impl Into<String>) -> Self {
        Self::Resolver(name.into())
    }

    pub fn range(inner: ArgumentType, min: f64, max: f64) -> Self {
        Self::Range {
            inner: Box::new(inner),
            min,
            max,
        }
    }
}

impl fmt::Debug for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Lowercase => f.write_str("Lowercase"),
            Self::Uppercase => f.write_str("Uppercase"),
            Self::CharCodes => f.write_str("CharCodes"),
            Self::Number => f.write_str("Number"),
            Self::Integer => f.write_str("Integer"),
            Self::Dynamic => f.write_str("Dynamic"),
            Self::DynamicInt => f.write_str("DynamicInt"),
            Self::Url => f.write_str("Url"),
            Self::Date => f.write_str("Date"),
            Self::Color => f.write_str("Color"),
            Self::Choice(groups) => f.debug_tuple("Choice").field(groups).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Resolver(name) => f.debug_tuple("Resolver").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Union(members) => f.debug_tuple("Union").field(members).finish(),
            Self::Range { inner, min, max } => f
                .debug_struct("Range")
                .field("inner", inner)
                .field("min", min)
                .field("max", max)
                .finish(),
        }
    }
}

// ============================================================================
// Type registry
// ============================================================================

/// Named resolvers plus the casting entry point.
pub struct TypeRegistry {
    resolvers: HashMap<String, Arc<dyn Caster>>,
}

impl TypeRegistry {
    /// Registry with the built-in resolvers: `mention`, `command`, `command_alias`.
    pub fn new() -> Self {
        let mut registry = Self {
            resolvers: HashMap::new(),
        };
        registry.register("mention", caster_fn(|phrase, _| Ok(mention_id(phrase).map(Value::Str))));
        registry.register(
            "command",
            caster_fn(|phrase, ctx| {
                Ok(ctx
                    .registry
                    .get(phrase)
                    .map(|cmd| Value::Object(cmd)))
            }),
        );
        registry.register(
            "command_alias",
            caster_fn(|phrase, ctx| {
                Ok(ctx
                    .registry
                    .find_by_alias(phrase)
                    .map(|cmd| Value::Object(cmd)))
            }),
        );
        registry
    }

    /// Register (or replace) a named resolver.
    pub fn register(&mut self, name: impl Into<String>, caster: Arc<dyn Caster>) {
        self.resolvers.insert(name.into(), caster);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Cast `phrase` through `ty`.
    pub fn cast<'a, 'c: 'a>(
        &'a self,
        ty: &'a ArgumentType,
        phrase: &'a str,
        ctx: &'a CastContext<'c>,
    ) -> BoxFuture<'a, DispatchResult<Option<Value>>> {
        async move {
            match ty {
                ArgumentType::Resolver(name) => {
                    let resolver = self.resolvers.get(name).ok_or_else(|| {
                        DispatchError::Fault(Fault::new(
                            FaultStage::Cast,
                            anyhow::anyhow!("unknown type resolver '{name}'"),
                        ))
                    })?;
                    resolver.cast(phrase, ctx).await.fault(FaultStage::Cast)
                }
                ArgumentType::Custom(caster) => caster.cast(phrase, ctx).await.fault(FaultStage::Cast),
                ArgumentType::Union(members) => {
                    for member in members {
                        if let Some(value) = self.cast(member, phrase, ctx).await? {
                            return Ok(Some(value));
                        }
                    }
                    Ok(None)
                }
                ArgumentType::Range { inner, min, max } => {
                    let value = self.cast(inner, phrase, ctx).await?;
                    Ok(value.filter(|v| in_range(v, *min, *max)))
                }
                primitive => Ok(cast_primitive(primitive, phrase)),
            }
        }
        .boxed()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.resolvers.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("resolvers", &names).finish()
    }
}

// ============================================================================
// Built-in casts
// ============================================================================

/// Id from `<@id>`, `<@!id>` or a bare numeric id.
fn mention_id(phrase: &str) -> Option<String> {
    let id = phrase
        .strip_prefix("<@")
        .and_then(|p| p.strip_suffix('>'))
        .map(|p| p.strip_prefix('!').unwrap_or(p))
        .unwrap_or(phrase);
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}

fn cast_primitive(ty: &ArgumentType, phrase: &str) -> Option<Value> {
    if phrase.is_empty() {
        return None;
    }

    match ty {
        ArgumentType::String => Some(Value::Str(phrase.to_string())),
        ArgumentType::Lowercase => Some(Value::Str(phrase.to_lowercase())),
        ArgumentType::Uppercase => Some(Value::Str(phrase.to_uppercase())),
        ArgumentType::CharCodes => Some(Value::Chars(phrase.chars().map(u32::from).collect())),
        ArgumentType::Number => parse_number(phrase).map(Value::Number),
        ArgumentType::Integer => phrase.parse::<i64>().ok().map(Value::Integer),
        ArgumentType::Dynamic => Some(
            parse_number(phrase)
                .map(Value::Number)
                .unwrap_or_else(|| Value::Str(phrase.to_string())),
        ),
        ArgumentType::DynamicInt => Some(
            phrase
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Str(phrase.to_string())),
        ),
        ArgumentType::Url => {
            let stripped = phrase
                .strip_prefix('<')
                .and_then(|p| p.strip_suffix('>'))
                .unwrap_or(phrase);
            Url::parse(stripped).ok().map(Value::Url)
        }
        ArgumentType::Date => parse_date(phrase).map(Value::Date),
        ArgumentType::Color => parse_color(phrase).map(Value::Color),
        ArgumentType::Choice(groups) => {
            let lower = phrase.to_lowercase();
            groups
                .iter()
                .find(|group| group.iter().any(|entry| entry.to_lowercase() == lower))
                .and_then(|group| group.first())
                .map(|canonical| Value::Str(canonical.clone()))
        }
        ArgumentType::Regex(re) => {
            let caps = re.captures(phrase)?;
            let matched = RegexMatch::from_captures(&caps)?;
            Some(Value::Captures(Captures {
                matched,
                matches: all_matches(re, phrase),
            }))
        }
        // handled by TypeRegistry::cast
        ArgumentType::Resolver(_)
        | ArgumentType::Custom(_)
        | ArgumentType::Union(_)
        | ArgumentType::Range { .. } => None,
    }
}

fn parse_number(phrase: &str) -> Option<f64> {
    phrase.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn parse_date(phrase: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(phrase) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(phrase, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(phrase, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    // epoch milliseconds
    if phrase.chars().all(|c| c.is_ascii_digit()) {
        return phrase
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    None
}

fn parse_color(phrase: &str) -> Option<u32> {
    let hex = phrase
        .strip_prefix('#')
        .or_else(|| phrase.strip_prefix("0x"))
        .unwrap_or(phrase);
    if hex.is_empty() || hex.len() > 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn in_range(value: &Value, min: f64, max: f64) -> bool {
    let n = match value {
        Value::Number(n) => *n,
        Value::Integer(i) => *i as f64,
        Value::Str(s) => s.chars().count() as f64,
        Value::List(items) => items.len() as f64,
        Value::Chars(c) => c.len() as f64,
        _ => return false,
    };
    n >= min && n < max
}
