//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("dispatcher.prefix must not contain empty strings")]
    EmptyPrefix,
    #[error("dispatcher.alias_replacement is not a valid regex: {0}")]
    InvalidAliasReplacement(String),
    #[error("dispatcher.event_capacity must be greater than zero")]
    ZeroEventCapacity,
    #[error("prompt.time_ms must be greater than zero")]
    ZeroPromptTime,
    #[error("prompt.{0} must not be empty")]
    EmptyPromptWord(&'static str),
    #[error("prompt.limit must be greater than zero when set")]
    ZeroPromptLimit,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let dispatcher = &config.dispatcher;

    if dispatcher.prefix.iter().any(|p| p.is_empty()) {
        errors.push(ValidationError::EmptyPrefix);
    }

    if let Some(ref pattern) = dispatcher.alias_replacement
        && let Err(e) = regex::Regex::new(pattern)
    {
        errors.push(ValidationError::InvalidAliasReplacement(e.to_string()));
    }

    if dispatcher.event_capacity == 0 {
        errors.push(ValidationError::ZeroEventCapacity);
    }

    let prompt = &config.prompt;
    if prompt.time_ms == 0 {
        errors.push(ValidationError::ZeroPromptTime);
    }
    if prompt.cancel_word.trim().is_empty() {
        errors.push(ValidationError::EmptyPromptWord("cancel_word"));
    }
    if prompt.stop_word.trim().is_empty() {
        errors.push(ValidationError::EmptyPromptWord("stop_word"));
    }
    if prompt.limit == Some(0) {
        errors.push(ValidationError::ZeroPromptLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        let config: Config = toml::from_str("").unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_prefix_fails() {
        let toml = r#"
[dispatcher]
prefix = ["!", ""]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyPrefix)));
    }

    #[test]
    fn test_bad_alias_replacement_fails() {
        let toml = r#"
[dispatcher]
alias_replacement = "(["
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidAliasReplacement(_)))
        );
    }

    #[test]
    fn test_collects_every_error() {
        let toml = r#"
[dispatcher]
event_capacity = 0

[prompt]
time_ms = 0
cancel_word = " "
limit = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
