//! Integration tests for command registration and prefix/alias resolution.

mod common;

use common::{Harness, command, noop, returns};
use slirc_dispatch::config::DispatcherConfig;
use slirc_dispatch::{
    Command, CommandOutcome, CommandRegistry, Outcome, Prefix, RegistryError, Status, Value,
};

fn finished(id: &str, value: Value) -> Outcome {
    Outcome::Command(CommandOutcome {
        command: id.to_string(),
        status: Status::Finished(value),
    })
}

#[test]
fn test_alias_conflict_leaves_registry_untouched() {
    let registry = CommandRegistry::new();
    registry
        .register(Command::builder("ban", noop()).aliases(["ban", "b"]).build())
        .unwrap();

    let err = registry
        .register(Command::builder("block", noop()).aliases(["block", "B"]).build())
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::AliasConflict { ref command, ref existing, .. }
            if command == "block" && existing == "ban"
    ));
    assert!(registry.get("block").is_none());
    assert!(registry.find_by_alias("block").is_none());
    assert_eq!(registry.find_by_alias("b").unwrap().id, "ban");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_override_prefix_beats_global_prefix() {
    let admin = Command::builder("admin", returns("banned"))
        .alias("ban")
        .prefix(Prefix::single("!!admin "))
        .build();
    let h = Harness::new(vec![admin]);

    assert_eq!(
        h.send("alice", "!!admin ban 5").await.unwrap(),
        finished("admin", Value::from("banned"))
    );
    // the global prefix may not reach a command that declares its own
    assert_eq!(h.send("alice", "!ban 5").await.unwrap(), Outcome::Invalid);
}

#[tokio::test]
async fn test_aliases_and_prefixes_are_case_insensitive() {
    let h = Harness::with(
        DispatcherConfig {
            prefix: vec!["bot ".into()],
            ..DispatcherConfig::default()
        },
        vec![Command::builder("ping", returns("pong")).alias("ping").build()],
        |b| b,
    );

    assert_eq!(
        h.send("alice", "BOT PiNg").await.unwrap(),
        finished("ping", Value::from("pong"))
    );
}

#[tokio::test]
async fn test_longer_global_prefix_wins() {
    let h = Harness::with(
        DispatcherConfig {
            prefix: vec!["!".into(), "!!".into()],
            ..DispatcherConfig::default()
        },
        vec![Command::builder("ping", returns("pong")).alias("ping").build()],
        |b| b,
    );

    assert_eq!(
        h.send("alice", "!!ping").await.unwrap(),
        finished("ping", Value::from("pong"))
    );
}

#[tokio::test]
async fn test_mention_prefix() {
    let h = Harness::with(
        DispatcherConfig {
            client_id: "42".into(),
            ..DispatcherConfig::default()
        },
        vec![Command::builder("ping", returns("pong")).alias("ping").build()],
        |b| b,
    );

    for content in ["<@42> ping", "<@!42>ping"] {
        assert_eq!(
            h.send("alice", content).await.unwrap(),
            finished("ping", Value::from("pong")),
            "{content}"
        );
    }
}

#[tokio::test]
async fn test_dynamic_global_prefix() {
    let h = Harness::with(
        DispatcherConfig::default(),
        vec![Command::builder("ping", returns("pong")).alias("ping").build()],
        |b| {
            b.prefix(Prefix::from_fn(|m| {
                if m.author.id == "alice" {
                    vec!["?".to_string()]
                } else {
                    vec!["!".to_string()]
                }
            }))
        },
    );

    assert_eq!(
        h.send("alice", "?ping").await.unwrap(),
        finished("ping", Value::from("pong"))
    );
    assert_eq!(h.send("alice", "!ping").await.unwrap(), Outcome::Invalid);
    assert_eq!(
        h.send("bob", "!ping").await.unwrap(),
        finished("ping", Value::from("pong"))
    );
}

#[tokio::test]
async fn test_dynamic_command_prefix_override() {
    let h = Harness::new(vec![
        Command::builder("tag", returns("t"))
            .alias("tag")
            .prefix(Prefix::from_fn(|_| vec!["$".to_string()]))
            .build(),
        Command::builder("pay", returns("p"))
            .alias("pay")
            .prefix(Prefix::single("$$"))
            .build(),
    ]);

    assert_eq!(h.send("alice", "$tag x").await.unwrap(), finished("tag", Value::from("t")));
    assert_eq!(h.send("alice", "!tag x").await.unwrap(), Outcome::Invalid);
    // "$" from the supplier also matches, but the static "$$" is tried first
    assert_eq!(h.send("alice", "$$pay 5").await.unwrap(), finished("pay", Value::from("p")));
    assert_eq!(h.send("alice", "$pay 5").await.unwrap(), Outcome::Invalid);
    assert_eq!(h.send("alice", "$$tag x").await.unwrap(), Outcome::Invalid);
}

#[tokio::test]
async fn test_deregister_then_register_round_trips() {
    let build = || {
        Command::builder("admin", returns("ok"))
            .aliases(["kick", "k"])
            .prefix(Prefix::single("$"))
            .build()
    };
    let h = Harness::new(vec![build()]);
    let registry = h.dispatcher.registry();
    let before = registry.aliases_of("admin");

    registry.deregister("admin").unwrap();
    assert!(registry.find_by_alias("kick").is_none());
    assert_eq!(h.send("alice", "$kick").await.unwrap(), Outcome::Invalid);

    registry.register(build()).unwrap();
    assert_eq!(registry.aliases_of("admin"), before);
    assert_eq!(registry.find_by_alias("K").unwrap().id, "admin");
    assert_eq!(
        h.send("alice", "$k").await.unwrap(),
        finished("admin", Value::from("ok"))
    );
}

#[tokio::test]
async fn test_alias_replacement_derives_secondary_alias() {
    let h = Harness::with(
        DispatcherConfig {
            alias_replacement: Some("-".into()),
            ..DispatcherConfig::default()
        },
        vec![command("role-info")],
        |b| b,
    );

    for content in ["!role-info", "!roleinfo"] {
        assert_eq!(
            h.send("alice", content).await.unwrap(),
            finished("role-info", Value::Null),
            "{content}"
        );
    }
}

#[tokio::test]
async fn test_prefix_without_alias_is_invalid() {
    let mut h = Harness::new(vec![command("ping")]);
    assert_eq!(h.send("alice", "!").await.unwrap(), Outcome::Invalid);
    assert_eq!(h.send("alice", "!unknown").await.unwrap(), Outcome::Invalid);
    assert_eq!(h.names(), vec!["message_invalid", "message_invalid"]);
}
