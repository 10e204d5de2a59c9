//! Content splitting.
//!
//! Turns the text after the alias into [`Token`]s. Each token keeps its raw
//! form and the whitespace that followed it so `rest`/`content` matches can
//! rebuild the original text.

use crate::config::SplitStrategy;
use std::fmt;
use std::sync::Arc;

/// Custom splitting function.
pub type SplitFn = dyn Fn(&str) -> Vec<String> + Send + Sync;

/// One token of split content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text with surrounding quotes removed.
    pub value: String,
    /// Token text as typed, including quotes.
    pub raw: String,
    /// Whitespace that followed the token.
    pub trailing: String,
}

impl Token {
    fn bare(value: impl Into<String>, trailing: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            raw: value.clone(),
            value,
            trailing: trailing.into(),
        }
    }
}

/// Splitting strategy for a command's content.
#[derive(Clone)]
pub enum Splitter {
    Plain,
    Quoted,
    Sticky,
    /// Whole remainder as a single token.
    None,
    /// Split on a literal separator; pieces are trimmed, empties dropped.
    Separator(String),
    Custom(Arc<SplitFn>),
}

impl Splitter {
    /// Wrap a custom splitting function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn split(&self, content: &str) -> Vec<Token> {
        match self {
            Self::Plain => tokenize(content, QuoteMode::Off),
            Self::Quoted => tokenize(content, QuoteMode::Anywhere),
            Self::Sticky => tokenize(content, QuoteMode::TokenStart),
            Self::None => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![Token::bare(trimmed, "")]
                }
            }
            Self::Separator(sep) => {
                let pieces: Vec<&str> = content
                    .split(sep.as_str())
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect();
                let last = pieces.len().saturating_sub(1);
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(i, p)| Token::bare(p, if i == last { "" } else { sep.as_str() }))
                    .collect()
            }
            Self::Custom(f) => {
                let pieces = f(content);
                let last = pieces.len().saturating_sub(1);
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(i, p)| Token::bare(p, if i == last { "" } else { " " }))
                    .collect()
            }
        }
    }
}

impl From<SplitStrategy> for Splitter {
    fn from(strategy: SplitStrategy) -> Self {
        match strategy {
            SplitStrategy::Plain => Self::Plain,
            SplitStrategy::Quoted => Self::Quoted,
            SplitStrategy::Sticky => Self::Sticky,
            SplitStrategy::None => Self::None,
        }
    }
}

impl fmt::Debug for Splitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Quoted => f.write_str("Quoted"),
            Self::Sticky => f.write_str("Sticky"),
            Self::None => f.write_str("None"),
            Self::Separator(s) => f.debug_tuple("Separator").field(s).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteMode {
    Off,
    /// Any quote character starts a quoted span, even mid-word.
    Anywhere,
    /// A quote starts a span only at the start of a token.
    TokenStart,
}

fn closing_quote(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\u{201C}' => Some('\u{201D}'),
        _ => None,
    }
}

fn tokenize(content: &str, mode: QuoteMode) -> Vec<Token> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    // leading whitespace is not part of any token
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }

    while i < chars.len() {
        let (value, raw);
        let quote = if mode == QuoteMode::Off {
            None
        } else {
            closing_quote(chars[i])
        };

        if let Some(close) = quote {
            let start = i;
            i += 1;
            let inner_start = i;
            while i < chars.len() && chars[i] != close {
                i += 1;
            }
            value = chars[inner_start..i].iter().collect::<String>();
            if i < chars.len() {
                i += 1; // closing quote
            }
            raw = chars[start..i].iter().collect::<String>();
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                if mode == QuoteMode::Anywhere && closing_quote(chars[i]).is_some() {
                    break;
                }
                i += 1;
            }
            value = chars[start..i].iter().collect::<String>();
            raw = value.clone();
        }

        let ws_start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let trailing: String = chars[ws_start..i].iter().collect();

        // an empty quoted span ("") still counts as a token
        if !raw.is_empty() {
            tokens.push(Token {
                value,
                raw,
                trailing,
            });
        }
    }

    tokens
}

/// Join tokens back into text, keeping original whitespace.
pub(crate) fn join_raw<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    let mut out = String::new();
    for t in tokens {
        out.push_str(&t.raw);
        out.push_str(&t.trailing);
    }
    out.trim_end().to_string()
}

/// Join token values with single spaces.
pub(crate) fn join_values<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    tokens
        .into_iter()
        .map(|t| t.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
