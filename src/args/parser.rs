//! Argument parsing.
//!
//! Arguments are processed in declaration order because defaults, prompts
//! and casters may read the values resolved before them. Each argument's
//! phrase is extracted according to its [`MatchKind`], cast through its
//! type, and on failure handled by `otherwise`, a prompt, or the default,
//! in that order.

use super::split::{Splitter, Token, join_raw, join_values};
use super::types::{CastContext, TypeRegistry};
use super::value::{Args, Value};
use super::{Argument, MatchKind};
use crate::commands::{Command, CommandRegistry};
use crate::error::DispatchResult;
use crate::message::InboundMessage;
use crate::prompt::{PromptOutcome, PromptRequest, Prompter, ResolvedPrompt};
use crate::resolver::{PrefixResolver, strip_prefix_ci};
use std::sync::Arc;

/// Result of parsing a command's arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Args),
    /// An argument was cancelled; the invocation is abandoned.
    Cancelled,
    /// A prompt reply was itself a command invocation.
    Breakout(Arc<InboundMessage>),
}

/// Everything parsing needs besides the content.
pub(crate) struct ParseEnv<'a> {
    pub message: &'a Arc<InboundMessage>,
    pub command: &'a Command,
    pub registry: &'a CommandRegistry,
    pub types: &'a TypeRegistry,
    pub prompter: &'a Prompter,
    pub resolver: &'a PrefixResolver,
}

enum Phrase {
    One(String),
    Many(Vec<String>),
    Flag(bool),
}

enum Resolution {
    Value(Value),
    Cancel,
    Breakout(Arc<InboundMessage>),
}

/// Parse `content` into the command's argument bag.
pub(crate) async fn parse(
    env: &ParseEnv<'_>,
    content: &str,
    splitter: &Splitter,
) -> DispatchResult<ParseOutcome> {
    let tokens = splitter.split(content);
    let positional = positional_tokens(&tokens, env.command);

    let mut args = Args::new();
    let mut ordinal = 0usize;

    for arg in &env.command.args {
        let resolution = match extract(arg, content, &tokens, &positional, &mut ordinal) {
            Phrase::Flag(value) => Resolution::Value(Value::Bool(value)),
            Phrase::One(phrase) => process(env, arg, &phrase, &args).await?,
            Phrase::Many(phrases) if phrases.is_empty() => process(env, arg, "", &args).await?,
            Phrase::Many(phrases) => {
                let mut values = Vec::with_capacity(phrases.len());
                for phrase in &phrases {
                    match process(env, arg, phrase, &args).await? {
                        Resolution::Value(v) => values.push(v),
                        other => return Ok(other.into_outcome()),
                    }
                }
                Resolution::Value(Value::List(values))
            }
        };

        match resolution {
            Resolution::Value(value) => args.insert(&arg.id, value),
            other => return Ok(other.into_outcome()),
        }
    }

    Ok(ParseOutcome::Parsed(args))
}

impl Resolution {
    fn into_outcome(self) -> ParseOutcome {
        match self {
            Self::Breakout(message) => ParseOutcome::Breakout(message),
            Self::Cancel | Self::Value(_) => ParseOutcome::Cancelled,
        }
    }
}

/// Tokens that are not flag or option markers (nor bare option values).
fn positional_tokens<'t>(tokens: &'t [Token], command: &Command) -> Vec<&'t Token> {
    let mut flags = Vec::new();
    let mut options = Vec::new();
    for (kind, marker) in command.markers() {
        match kind {
            MatchKind::Flag => flags.push(marker.to_lowercase()),
            MatchKind::Option => options.push(marker),
            _ => {}
        }
    }
    if flags.is_empty() && options.is_empty() {
        return tokens.iter().collect();
    }

    let mut positional = Vec::with_capacity(tokens.len());
    let mut skip_next = false;
    for token in tokens {
        if std::mem::take(&mut skip_next) {
            continue;
        }
        if flags.contains(&token.value.to_lowercase()) {
            continue;
        }
        if let Some(rest) = options.iter().find_map(|m| strip_prefix_ci(&token.value, m)) {
            // a bare marker takes the following token as its value
            skip_next = rest.is_empty();
            continue;
        }
        positional.push(token);
    }
    positional
}

fn window<T>(items: &[T], start: usize, limit: usize) -> &[T] {
    let start = start.min(items.len());
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}

fn extract(
    arg: &Argument,
    content: &str,
    tokens: &[Token],
    positional: &[&Token],
    ordinal: &mut usize,
) -> Phrase {
    let mut next_index = || match arg.index {
        Some(index) => index,
        None => {
            *ordinal += 1;
            *ordinal - 1
        }
    };
    let limit = arg.limit.unwrap_or(usize::MAX);

    match arg.kind {
        MatchKind::Word => {
            let index = next_index();
            Phrase::One(positional.get(index).map(|t| t.value.clone()).unwrap_or_default())
        }
        MatchKind::Rest => {
            let index = next_index();
            Phrase::One(join_raw(window(positional, index, limit).iter().copied()))
        }
        MatchKind::Text => {
            let index = next_index();
            Phrase::One(join_values(window(positional, index, limit).iter().copied()))
        }
        MatchKind::Separate => {
            let index = next_index();
            Phrase::Many(
                window(positional, index, limit)
                    .iter()
                    .map(|t| t.value.clone())
                    .collect(),
            )
        }
        MatchKind::Flag => {
            let present = tokens.iter().any(|t| {
                let value = t.value.to_lowercase();
                arg.markers.iter().any(|m| m.to_lowercase() == value)
            });
            Phrase::Flag(if arg.default.is_set() { !present } else { present })
        }
        MatchKind::Option => Phrase::One(option_value(tokens, &arg.markers)),
        MatchKind::Content => {
            let index = arg.index.unwrap_or(0);
            Phrase::One(original_text(content, tokens, index, arg.limit))
        }
        MatchKind::None => Phrase::One(String::new()),
    }
}

/// Slice of the original text covering tokens `index..index + limit`.
fn original_text(content: &str, tokens: &[Token], index: usize, limit: Option<usize>) -> String {
    if index == 0 && limit.is_none() {
        return content.to_string();
    }
    let Some(spans) = token_spans(content, tokens) else {
        // a custom splitter may rewrite tokens beyond recognition
        return join_raw(window(tokens, index, limit.unwrap_or(usize::MAX)));
    };
    let Some(&(start, _)) = spans.get(index) else {
        return String::new();
    };
    let end = match limit {
        Some(0) => start,
        Some(limit) => spans[index.saturating_add(limit).min(spans.len()) - 1].1,
        None => content.len(),
    };
    content[start..end].to_string()
}

/// Byte ranges of each token's raw text, located in order.
fn token_spans(content: &str, tokens: &[Token]) -> Option<Vec<(usize, usize)>> {
    let mut pos = 0;
    let mut spans = Vec::with_capacity(tokens.len());
    for token in tokens {
        let start = pos + content[pos..].find(token.raw.as_str())?;
        pos = start + token.raw.len();
        spans.push((start, pos));
    }
    Some(spans)
}

/// Value of the last occurrence of any marker.
fn option_value(tokens: &[Token], markers: &[String]) -> String {
    for (i, token) in tokens.iter().enumerate().rev() {
        if let Some(rest) = markers.iter().find_map(|m| strip_prefix_ci(&token.value, m)) {
            if !rest.is_empty() {
                return rest.to_string();
            }
            return tokens.get(i + 1).map(|t| t.value.clone()).unwrap_or_default();
        }
    }
    String::new()
}

fn prompt_options(env: &ParseEnv<'_>, arg: &Argument) -> Option<ResolvedPrompt> {
    arg.prompt.as_ref().map(|own| {
        env.prompter
            .defaults()
            .merge(&env.command.prompt_defaults)
            .merge(own)
            .resolve()
    })
}

async fn process(
    env: &ParseEnv<'_>,
    arg: &Argument,
    phrase: &str,
    args: &Args,
) -> DispatchResult<Resolution> {
    let prompt = prompt_options(env, arg);
    if phrase.is_empty() && prompt.as_ref().is_some_and(|p| p.optional) {
        return Ok(Resolution::Value(arg.default.resolve(env.message, args)));
    }

    let ctx = CastContext {
        message: env.message,
        registry: env.registry,
        args,
    };
    if let Some(value) = env.types.cast(&arg.ty, phrase, &ctx).await? {
        return Ok(Resolution::Value(value));
    }

    if let Some(ref text) = arg.otherwise {
        env.prompter.say(&env.message.conversation_id, text).await?;
        return Ok(Resolution::Cancel);
    }

    if let Some(options) = prompt {
        let request = PromptRequest {
            message: env.message,
            ty: &arg.ty,
            options,
            phrase,
            args,
            registry: env.registry,
            types: env.types,
            resolver: env.resolver,
        };
        return Ok(match env.prompter.collect(request).await? {
            PromptOutcome::Resolved(value) => Resolution::Value(value),
            PromptOutcome::Cancelled => Resolution::Cancel,
            PromptOutcome::Breakout(message) => Resolution::Breakout(message),
        });
    }

    Ok(Resolution::Value(arg.default.resolve(env.message, args)))
}
