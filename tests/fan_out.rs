//! Integration tests for regex and condition triggers on unprefixed messages.

mod common;

use common::{Harness, message, noop, returns};
use regex::Regex;
use slirc_dispatch::{
    Args, Command, CommandOutcome, DispatchError, FaultStage, Outcome, Status, Value, handler_fn,
};
use std::sync::Arc;

/// Handler failing with `reason`.
fn fails(reason: &'static str) -> Arc<dyn slirc_dispatch::CommandHandler> {
    handler_fn(move |_, _| async move { Err(anyhow::anyhow!(reason)) })
}

fn outcome(id: &str, status: Status) -> CommandOutcome {
    CommandOutcome {
        command: id.to_string(),
        status,
    }
}

#[tokio::test]
async fn test_regex_trigger_supplies_matches() {
    let issue = Command::builder(
        "issue",
        handler_fn(|_, args: Args| async move {
            let numbers: Vec<String> = args
                .list("matches")
                .unwrap_or_default()
                .iter()
                .filter_map(|v| match v {
                    Value::Match(m) => m.group(1).map(str::to_string),
                    _ => None,
                })
                .collect();
            Ok(Value::from(numbers.join(",")))
        }),
    )
    .regex(Regex::new(r"#(\d+)").unwrap())
    .build();
    let h = Harness::new(vec![issue]);

    assert_eq!(
        h.send("alice", "see #12 and #40").await.unwrap(),
        Outcome::Triggered(vec![outcome("issue", Status::Finished(Value::from("12,40")))])
    );
}

#[tokio::test]
async fn test_first_match_exposed_as_match() {
    let greet = Command::builder(
        "greet",
        handler_fn(|_, args: Args| async move {
            match args.get("match") {
                Some(Value::Match(m)) => Ok(Value::from(m.text.clone())),
                _ => Ok(Value::Null),
            }
        }),
    )
    .regex(Regex::new(r"(?i)\bhello\b").unwrap())
    .build();
    let h = Harness::new(vec![greet]);

    assert_eq!(
        h.send("alice", "well HELLO there, hello").await.unwrap(),
        Outcome::Triggered(vec![outcome("greet", Status::Finished(Value::from("HELLO")))])
    );
}

#[tokio::test]
async fn test_regex_and_condition_fan_out() {
    let by_regex = Command::builder("by-regex", returns("regex"))
        .regex(Regex::new("rust").unwrap())
        .build();
    let by_condition = Command::builder("by-condition", returns("condition"))
        .condition_fn(|m| m.content.contains("rust"))
        .build();
    let untouched = Command::builder("untouched", returns("never"))
        .condition_fn(|m| m.content.contains("go"))
        .build();
    let h = Harness::new(vec![by_condition, untouched, by_regex]);

    assert_eq!(
        h.send("alice", "rust is nice").await.unwrap(),
        Outcome::Triggered(vec![
            outcome("by-regex", Status::Finished(Value::from("regex"))),
            outcome("by-condition", Status::Finished(Value::from("condition"))),
        ])
    );
}

#[tokio::test]
async fn test_regex_takes_precedence_over_condition() {
    let both = Command::builder(
        "both",
        handler_fn(|_, args: Args| async move { Ok(Value::from(args.contains("match"))) }),
    )
    .regex(Regex::new("ab+").unwrap())
    .condition_fn(|_| true)
    .build();
    let h = Harness::new(vec![both]);

    assert_eq!(
        h.send("alice", "abbb").await.unwrap(),
        Outcome::Triggered(vec![outcome("both", Status::Finished(Value::from(true)))])
    );
    // no regex match: the condition still triggers, without match arguments
    assert_eq!(
        h.send("alice", "xyz").await.unwrap(),
        Outcome::Triggered(vec![outcome("both", Status::Finished(Value::from(false)))])
    );
}

#[tokio::test]
async fn test_no_trigger_is_invalid() {
    let mut h = Harness::new(vec![
        Command::builder("quiet", noop()).condition_fn(|_| false).build(),
        Command::builder("disabled", noop()).condition_fn(|_| true).disabled().build(),
    ]);

    assert_eq!(h.send("alice", "just chatting").await.unwrap(), Outcome::Invalid);
    // disabled commands are skipped without an event of their own
    assert_eq!(h.names(), vec!["message_invalid"]);
}

#[tokio::test]
async fn test_handler_fault_isolated_when_observed() {
    let mut h = Harness::new(vec![
        Command::builder("broken", fails("boom")).condition_fn(|_| true).build(),
        Command::builder("fine", returns("ok")).condition_fn(|_| true).build(),
    ]);
    let mut faults = h.dispatcher.subscribe_faults();

    assert_eq!(
        h.send("alice", "anything").await.unwrap(),
        Outcome::Triggered(vec![
            outcome("broken", Status::Faulted(FaultStage::Handler)),
            outcome("fine", Status::Finished(Value::from("ok"))),
        ])
    );

    let fault = faults.recv().await.unwrap().fault;
    assert_eq!(fault.stage, FaultStage::Handler);
    assert_eq!(fault.command.as_deref(), Some("broken"));

    let names = h.names();
    assert!(names.contains(&"command_finished"));
    assert_eq!(names.iter().filter(|n| **n == "command_started").count(), 2);
}

#[tokio::test]
async fn test_unobserved_fault_surfaces_after_siblings_finish() {
    let mut h = Harness::new(vec![
        Command::builder("broken", fails("boom")).condition_fn(|_| true).build(),
        Command::builder("fine", returns("ok")).condition_fn(|_| true).build(),
    ]);

    match h.send("alice", "anything").await {
        Err(DispatchError::Fault(fault)) => {
            assert_eq!(fault.stage, FaultStage::Handler);
            assert_eq!(fault.command.as_deref(), Some("broken"));
        }
        other => panic!("unexpected {other:?}"),
    }
    // the healthy sibling still ran to completion
    assert!(h.names().contains(&"command_finished"));
}

#[tokio::test]
async fn test_condition_fault() {
    struct Flaky;

    #[async_trait::async_trait]
    impl slirc_dispatch::commands::Condition for Flaky {
        async fn test(&self, _: &slirc_dispatch::InboundMessage) -> anyhow::Result<bool> {
            anyhow::bail!("lookup failed")
        }
    }

    let h = Harness::new(vec![
        Command::builder("flaky", noop()).condition(Arc::new(Flaky)).build(),
        Command::builder("fine", returns("ok")).condition_fn(|_| true).build(),
    ]);
    let mut faults = h.dispatcher.subscribe_faults();

    assert_eq!(
        h.send("alice", "anything").await.unwrap(),
        Outcome::Triggered(vec![
            outcome("flaky", Status::Faulted(FaultStage::Condition)),
            outcome("fine", Status::Finished(Value::from("ok"))),
        ])
    );
    assert_eq!(faults.recv().await.unwrap().fault.stage, FaultStage::Condition);
}

#[tokio::test]
async fn test_prefixed_message_skips_triggers() {
    let h = Harness::new(vec![
        Command::builder("ping", returns("pong")).alias("ping").build(),
        Command::builder("catch-all", returns("caught")).condition_fn(|_| true).build(),
    ]);

    assert_eq!(
        h.dispatcher.handle(Arc::new(message("alice", "!ping"))).await.unwrap(),
        Outcome::Command(outcome("ping", Status::Finished(Value::from("pong"))))
    );
}
