//! slirc-dispatch console
//!
//! Feeds stdin lines through a dispatcher as messages from a console actor
//! and prints whatever the commands send back.

use rand::Rng;
use slirc_dispatch::args::ArgumentType;
use slirc_dispatch::config::validate;
use slirc_dispatch::dispatch::FaultEvent;
use slirc_dispatch::message::{Author, InboundMessage};
use slirc_dispatch::transport::ChannelTransport;
use slirc_dispatch::{
    Argument, Args, Command, CommandContext, Config, DispatchEvent, Dispatcher, PromptOptions,
    Value, handler_fn, metrics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Actor and conversation every console line is attributed to.
const CONSOLE: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).map_err(|e| {
            eprintln!("Failed to load config {path}: {e}");
            e
        })?,
        None => Config::default(),
    };

    // RUST_LOG overrides the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        return Err(anyhow::anyhow!(
            "Configuration has {} error(s). See messages above.",
            errors.len()
        ));
    }

    metrics::init();

    let (transport, mut outbox) = ChannelTransport::new(64);
    let dispatcher = Dispatcher::builder(config.dispatcher.clone(), Arc::new(transport))
        .prompt_defaults(PromptOptions::from(&config.prompt))
        .command(ping())
        .command(echo())
        .command(roll())
        .command(remind())
        .command(help())
        .build()?;
    let dispatcher = Arc::new(dispatcher);

    info!(
        commands = dispatcher.registry().len(),
        prefix = ?config.dispatcher.prefix,
        "slirc-dispatch console ready"
    );

    tokio::spawn(async move {
        while let Some(out) = outbox.recv().await {
            println!("[{}] {}", out.conversation_id, out.content);
        }
    });

    spawn_event_logger(&dispatcher);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message = InboundMessage::new(
            uuid::Uuid::new_v4().to_string(),
            Author::new(CONSOLE),
            CONSOLE,
            line,
        );
        let handle = dispatcher.dispatch(message);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(outcome)) => debug!(?outcome, "Message handled"),
                Ok(Err(e)) => error!(error = %e, code = e.error_code(), "Dispatch failed"),
                Err(e) => error!(error = %e, "Dispatch task panicked"),
            }
        });
    }

    info!("stdin closed, shutting down");
    Ok(())
}

/// Log events and faults; subscribing to faults keeps them from failing dispatch.
fn spawn_event_logger(dispatcher: &Arc<Dispatcher>) {
    let mut events = dispatcher.subscribe();
    let mut faults = dispatcher.subscribe_faults();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match faults.recv().await {
                Ok(FaultEvent { message, fault }) => {
                    error!(message = %message.id, fault = %fault, "Command fault");
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "Fault logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &DispatchEvent) {
    match event {
        DispatchEvent::Cooldown { command, remaining, .. } => {
            info!(command = %command.id, remaining_ms = remaining.as_millis() as u64, "Cooldown");
        }
        DispatchEvent::CommandBlocked { command, reason, .. } => {
            info!(command = %command.id, reason = %reason, "Command blocked");
        }
        DispatchEvent::MissingPermissions { command, side, missing, .. } => {
            info!(command = %command.id, side = side.as_str(), ?missing, "Missing permissions");
        }
        DispatchEvent::CommandFinished { command, value, .. } => {
            debug!(command = %command.id, ?value, "Command finished");
        }
        other => debug!(event = other.name(), "Dispatch event"),
    }
}

// ============================================================================
// Demonstration commands
// ============================================================================

fn ping() -> Arc<Command> {
    Command::builder(
        "ping",
        handler_fn(|ctx: CommandContext, _| async move {
            ctx.reply("pong").await?;
            Ok(Value::Null)
        }),
    )
    .alias("ping")
    .description("Check that the dispatcher is alive.")
    .cooldown(Duration::from_secs(3))
    .ratelimit(2)
    .build()
}

fn echo() -> Arc<Command> {
    Command::builder(
        "echo",
        handler_fn(|ctx: CommandContext, args: Args| async move {
            let text = args.str("text").unwrap_or_default();
            let text = if args.flag("upper") {
                text.to_uppercase()
            } else {
                text.to_string()
            };
            ctx.reply(&text).await?;
            Ok(Value::Str(text))
        }),
    )
    .aliases(["echo", "say"])
    .arg(Argument::flag("upper", ["--upper", "-u"]))
    .arg(Argument::rest("text"))
    .description("Repeat the text back.")
    .usage("echo [--upper] <text>")
    .build()
}

fn roll() -> Arc<Command> {
    Command::builder(
        "roll",
        handler_fn(|ctx: CommandContext, args: Args| async move {
            let sides = args.int("sides").unwrap_or(6).max(1);
            let rolled = rand::thread_rng().gen_range(1..=sides);
            ctx.reply(&format!("rolled {rolled} (d{sides})")).await?;
            Ok(Value::Integer(rolled))
        }),
    )
    .aliases(["roll", "dice"])
    .arg(
        Argument::word("sides")
            .ty(ArgumentType::range(ArgumentType::Integer, 2.0, 1001.0))
            .default(6i64),
    )
    .description("Roll a die.")
    .usage("roll [sides]")
    .build()
}

fn remind() -> Arc<Command> {
    Command::builder(
        "remind",
        handler_fn(|ctx: CommandContext, args: Args| async move {
            let minutes = args.int("minutes").unwrap_or(1).max(0) as u64;
            let text = args.str("text").unwrap_or_default().to_string();
            ctx.reply(&format!("ok, reminding you in {minutes} minute(s)")).await?;

            let transport = Arc::clone(&ctx.transport);
            let conversation = ctx.conversation().to_string();
            let actor = ctx.actor().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
                let text = format!("{actor}: reminder: {text}");
                if let Err(e) = transport.send_message(&conversation, &text).await {
                    warn!(error = %e, "Failed to deliver reminder");
                }
            });
            Ok(Value::Null)
        }),
    )
    .aliases(["remind", "remindme"])
    .arg(
        Argument::word("minutes")
            .ty(ArgumentType::range(ArgumentType::Integer, 0.0, 1441.0))
            .prompt(
                PromptOptions::new()
                    .start("In how many minutes?")
                    .retry("That is not a number of minutes between 0 and 1440."),
            ),
    )
    .arg(
        Argument::rest("text")
            .prompt(PromptOptions::new().start("What should I remind you of?")),
    )
    .lock(slirc_dispatch::commands::CommandLock::Actor)
    .description("Set a reminder, asking for anything left out.")
    .usage("remind <minutes> <text>")
    .build()
}

fn help() -> Arc<Command> {
    Command::builder(
        "help",
        handler_fn(|ctx: CommandContext, _| async move {
            let mut lines = Vec::new();
            for command in ctx.registry.commands() {
                let aliases = ctx.registry.aliases_of(&command.id).join(", ");
                let usage = if command.usage.is_empty() {
                    command.id.clone()
                } else {
                    command.usage.clone()
                };
                lines.push(format!("{usage} ({aliases}): {}", command.description));
            }
            ctx.reply(&lines.join("\n")).await?;
            Ok(Value::Integer(lines.len() as i64))
        }),
    )
    .aliases(["help", "commands"])
    .description("List commands.")
    .build()
}
