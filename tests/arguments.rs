//! Integration tests for content splitting and argument parsing.

mod common;

use common::{Harness, noop};
use slirc_dispatch::args::Splitter;
use slirc_dispatch::{
    Argument, ArgumentType, Args, Command, CommandOutcome, DispatchEvent, Outcome, Status, Value,
};

/// Arguments of the first `CommandStarted` event.
fn started_args(h: &mut Harness) -> Args {
    h.drain()
        .into_iter()
        .find_map(|e| match e {
            DispatchEvent::CommandStarted { args, .. } => Some(args),
            _ => None,
        })
        .expect("command should have started")
}

#[tokio::test]
async fn test_quoted_words() {
    let say = Command::builder("say", noop())
        .alias("say")
        .arg(Argument::word("msg"))
        .arg(Argument::word("volume"))
        .build();
    let mut h = Harness::new(vec![say]);

    h.send("alice", r#"!say "hello world" loud"#).await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(args.str("msg"), Some("hello world"));
    assert_eq!(args.str("volume"), Some("loud"));
}

#[tokio::test]
async fn test_flag_anywhere_case_insensitive() {
    let log = Command::builder("log", noop())
        .alias("log")
        .arg(Argument::word("target"))
        .arg(Argument::flag("verbose", ["--verbose"]))
        .build();
    let mut h = Harness::new(vec![log]);

    for (content, expected) in [
        ("!log --verbose disk", true),
        ("!log disk --VERBOSE", true),
        ("!log disk", false),
        ("!log disk --verbosely", false),
    ] {
        h.send("alice", content).await.unwrap();
        let args = started_args(&mut h);
        assert_eq!(args.flag("verbose"), expected, "{content}");
        // the marker never shifts positional words
        assert_eq!(args.str("target"), Some("disk"), "{content}");
    }
}

#[tokio::test]
async fn test_option_last_value_wins() {
    let find = Command::builder("find", noop())
        .alias("find")
        .arg(Argument::rest("query"))
        .arg(Argument::option("limit", ["--limit=", "--limit"]).ty(ArgumentType::Integer).default(10i64))
        .build();
    let mut h = Harness::new(vec![find]);

    h.send("alice", "!find cats --limit 3 dogs --limit=5").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(args.int("limit"), Some(5));
    assert_eq!(args.str("query"), Some("cats dogs"));

    h.send("alice", "!find cats").await.unwrap();
    assert_eq!(started_args(&mut h).int("limit"), Some(10));
}

#[tokio::test]
async fn test_rest_text_and_content() {
    let raw = Command::builder("raw", noop())
        .alias("raw")
        .arg(Argument::word("first"))
        .arg(Argument::rest("rest"))
        .arg(Argument::text("text").index(1))
        .arg(Argument::content("content"))
        .build();
    let mut h = Harness::new(vec![raw]);

    h.send("alice", "!raw a  b   \"c d\"").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(args.str("first"), Some("a"));
    assert_eq!(args.str("rest"), Some("b   \"c d\""));
    assert_eq!(args.str("text"), Some("b c d"));
    assert_eq!(args.str("content"), Some("a  b   \"c d\""));
}

#[tokio::test]
async fn test_separate_casts_each_token_with_limit() {
    let sum = Command::builder("sum", noop())
        .alias("sum")
        .arg(Argument::separate("numbers").ty(ArgumentType::Integer).limit(3))
        .build();
    let mut h = Harness::new(vec![sum]);

    h.send("alice", "!sum 1 2 3 4").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(
        args.list("numbers").unwrap(),
        &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
}

#[tokio::test]
async fn test_failed_cast_falls_back_to_default() {
    let roll = Command::builder("roll", noop())
        .alias("roll")
        .arg(
            Argument::word("sides")
                .ty(ArgumentType::range(ArgumentType::Integer, 2.0, 101.0))
                .default_fn(|_, _| Value::Integer(6)),
        )
        .arg(Argument::word("color").ty(ArgumentType::choice(["red", "blue"])))
        .build();
    let mut h = Harness::new(vec![roll]);

    h.send("alice", "!roll 500 BLUE").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(args.int("sides"), Some(6));
    assert_eq!(args.str("color"), Some("blue"));

    h.send("alice", "!roll 20 green").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(args.int("sides"), Some(20));
    assert_eq!(args.get("color"), Some(&Value::Null));
}

#[tokio::test]
async fn test_otherwise_cancels_with_text() {
    let num = Command::builder("num", noop())
        .alias("num")
        .arg(Argument::word("n").ty(ArgumentType::Integer).otherwise("Need a number."))
        .build();
    let mut h = Harness::new(vec![num]);

    let outcome = h.send("alice", "!num x").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Command(CommandOutcome {
            command: "num".into(),
            status: Status::Cancelled,
        })
    );
    assert_eq!(h.transport.contents().await, vec!["Need a number.".to_string()]);
    assert_eq!(h.names(), vec!["command_cancelled"]);
}

#[tokio::test]
async fn test_command_splitter_override() {
    let tags = Command::builder("tags", noop())
        .alias("tags")
        .split(Splitter::Separator(",".into()))
        .arg(Argument::separate("tags"))
        .build();
    let mut h = Harness::new(vec![tags]);

    h.send("alice", "!tags rust, tokio ,async").await.unwrap();
    let args = started_args(&mut h);
    assert_eq!(
        args.list("tags").unwrap(),
        &[Value::from("rust"), Value::from("tokio"), Value::from("async")]
    );
}

#[tokio::test]
async fn test_content_survives_separator_splitter() {
    let pipe = Command::builder("c", noop())
        .alias("c")
        .split(Splitter::Separator("|".into()))
        .arg(Argument::content("all"))
        .build();
    let mut h = Harness::new(vec![pipe]);

    h.send("alice", "!c a  b | c").await.unwrap();
    assert_eq!(started_args(&mut h).str("all"), Some("a  b | c"));
}

#[tokio::test]
async fn test_mention_resolver() {
    let whois = Command::builder("whois", noop())
        .alias("whois")
        .arg(Argument::word("user").ty(ArgumentType::resolver("mention")))
        .build();
    let mut h = Harness::new(vec![whois]);

    h.send("alice", "!whois <@!1234>").await.unwrap();
    assert_eq!(started_args(&mut h).str("user"), Some("1234"));
}
