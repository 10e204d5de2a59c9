//! Integration tests for building a dispatcher from a TOML file.

mod common;

use common::{ROOM, returns};
use slirc_dispatch::config::{SplitStrategy, ValidationError, validate};
use slirc_dispatch::dispatch::DispatcherBuilder;
use slirc_dispatch::transport::CapturingTransport;
use slirc_dispatch::{
    Argument, Author, BuildError, Command, CommandOutcome, Config, InboundMessage, Outcome,
    Status, Value,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_dispatcher_from_config_file() {
    let file = write_config(
        r#"
[dispatcher]
prefix = ["?", "bot "]
client_id = "42"
owners = ["root"]
alias_replacement = "-"
split = "plain"

[prompt]
retries = 2
time_ms = 5000
cancel_word = "abort"

[logging]
filter = "debug"
json = true
"#,
    );

    let config = Config::load(file.path()).unwrap();
    validate(&config).unwrap();
    assert_eq!(config.dispatcher.split, SplitStrategy::Plain);
    assert_eq!(config.prompt.cancel_word, "abort");
    assert!(config.logging.json);

    let echo = Command::builder("role-info", returns("info"))
        .alias("role-info")
        .arg(Argument::word("role"))
        .build();
    let transport = Arc::new(CapturingTransport::new());
    let dispatcher = DispatcherBuilder::from_config(&config, transport)
        .command(echo)
        .build()
        .unwrap();

    let send = |content: &str| {
        Arc::new(InboundMessage::new("1", Author::new("alice"), ROOM, content))
    };
    let finished = Outcome::Command(CommandOutcome {
        command: "role-info".into(),
        status: Status::Finished(Value::from("info")),
    });

    assert_eq!(dispatcher.handle(send("?roleinfo admin")).await.unwrap(), finished);
    assert_eq!(dispatcher.handle(send("BOT role-info admin")).await.unwrap(), finished);
    assert_eq!(dispatcher.handle(send("<@42> roleinfo")).await.unwrap(), finished);
    assert_eq!(dispatcher.handle(send("!roleinfo")).await.unwrap(), Outcome::Invalid);
}

#[test]
fn test_validation_reports_every_error() {
    let file = write_config(
        r#"
[dispatcher]
prefix = [""]
alias_replacement = "("
event_capacity = 0

[prompt]
time_ms = 0
stop_word = " "
"#,
    );

    let config = Config::load(file.path()).unwrap();
    let errors = validate(&config).unwrap_err();
    assert_eq!(errors.len(), 5);
    assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidAliasReplacement(_))));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyPromptWord("stop_word"))));
}

#[test]
fn test_invalid_alias_replacement_fails_build() {
    let config: Config = toml::from_str(
        r#"
[dispatcher]
alias_replacement = "["
"#,
    )
    .unwrap();

    let result = DispatcherBuilder::from_config(&config, Arc::new(CapturingTransport::new())).build();
    assert!(matches!(result, Err(BuildError::AliasReplacement(_))));
}
