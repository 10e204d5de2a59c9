//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Dispatcher Defaults
// =============================================================================

pub fn default_prefix() -> Vec<String> {
    vec!["!".to_string()]
}

pub fn default_event_capacity() -> usize {
    256
}

// =============================================================================
// Prompt Defaults
// =============================================================================

pub fn default_prompt_retries() -> u32 {
    1
}

pub fn default_prompt_time_ms() -> u64 {
    30_000
}

pub fn default_cancel_word() -> String {
    "cancel".to_string()
}

pub fn default_stop_word() -> String {
    "stop".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
