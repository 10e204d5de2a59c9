//! Typed argument values and the argument bag handed to handlers.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// One regex match with its capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    /// Full matched text.
    pub text: String,
    /// Capture groups 1..n; `None` for groups that did not participate.
    pub groups: Vec<Option<String>>,
    pub start: usize,
    pub end: usize,
}

impl RegexMatch {
    pub(crate) fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        let whole = caps.get(0)?;
        Some(Self {
            text: whole.as_str().to_string(),
            groups: caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
            start: whole.start(),
            end: whole.end(),
        })
    }

    /// Capture group by 1-based index.
    pub fn group(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(|g| g.as_deref())
    }
}

/// Every match of a regex against a phrase.
pub(crate) fn all_matches(regex: &regex::Regex, text: &str) -> Vec<RegexMatch> {
    regex
        .captures_iter(text)
        .filter_map(|c| RegexMatch::from_captures(&c))
        .collect()
}

/// Result of casting through a regex type: the first match plus all matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    pub matched: RegexMatch,
    pub matches: Vec<RegexMatch>,
}

/// A resolved argument value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent or failed.
    #[default]
    Null,
    Bool(bool),
    Str(String),
    Number(f64),
    Integer(i64),
    Chars(Vec<u32>),
    Url(Url),
    Date(DateTime<Utc>),
    Color(u32),
    Match(RegexMatch),
    Captures(Captures),
    List(Vec<Value>),
    /// Domain object produced by a named resolver or custom caster.
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary domain object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast an [`Value::Object`] to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Object(obj) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Self::Chars(c) => f.debug_tuple("Chars").field(c).finish(),
            Self::Url(u) => f.debug_tuple("Url").field(&u.as_str()).finish(),
            Self::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Self::Color(c) => write!(f, "Color(#{c:06x})"),
            Self::Match(m) => f.debug_tuple("Match").field(m).finish(),
            Self::Captures(c) => f.debug_tuple("Captures").field(c).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Chars(a), Self::Chars(b)) => a == b,
            (Self::Url(a), Self::Url(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Color(a), Self::Color(b)) => a == b,
            (Self::Match(a), Self::Match(b)) => a == b,
            (Self::Captures(a), Self::Captures(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// The argument bag: argument id -> resolved value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: HashMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: Value) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// String value of an argument.
    pub fn str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    /// Flag value; absent flags read as `false`.
    pub fn flag(&self, id: &str) -> bool {
        self.get(id).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn int(&self, id: &str) -> Option<i64> {
        self.get(id).and_then(Value::as_i64)
    }

    pub fn number(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(Value::as_f64)
    }

    pub fn list(&self, id: &str) -> Option<&[Value]> {
        self.get(id).and_then(Value::as_list)
    }

    pub fn object<T: Any + Send + Sync>(&self, id: &str) -> Option<Arc<T>> {
        self.get(id).and_then(Value::downcast::<T>)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
