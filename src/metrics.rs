//! Prometheus metrics collection for slirc-dispatch.
//!
//! Metrics live in a process-wide registry so several dispatchers in one
//! process share them. Recording before [`init`] is a no-op.
//!
//! ## Dispatch Metrics
//!
//! - `dispatch_messages_total` - Inbound messages handled
//! - `dispatch_events_total{event}` - Dispatcher events emitted by name
//! - `dispatch_command_total{command}` - Commands executed
//! - `dispatch_command_duration_seconds{command}` - Command latency histogram
//! - `dispatch_command_errors_total{command,error}` - Failed executions
//! - `dispatch_blocks_total{reason}` - Messages and commands stopped by a gate
//! - `dispatch_cooldown_hits_total{command}` - Invocations refused by cooldown
//! - `dispatch_faults_total{stage}` - Faults raised by user-supplied code
//! - `dispatch_prompt_outcomes_total{outcome}` - How prompts ended

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Inbound messages handed to a dispatcher.
pub static MESSAGES_HANDLED: OnceLock<IntCounter> = OnceLock::new();

/// Dispatcher events by name.
pub static EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Commands executed by id.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by id and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Gate blocks by reason kind.
pub static BLOCKS: OnceLock<IntCounterVec> = OnceLock::new();

/// Cooldown refusals by command id.
pub static COOLDOWN_HITS: OnceLock<IntCounterVec> = OnceLock::new();

/// Faults by pipeline stage.
pub static FAULTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Prompt terminal states.
pub static PROMPT_OUTCOMES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Command execution latency by id.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(MESSAGES_HANDLED, IntCounter::new("dispatch_messages_total", "Inbound messages handled"));
    register!(EVENTS, IntCounterVec::new(Opts::new("dispatch_events_total", "Dispatcher events by name"), &["event"]));
    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("dispatch_command_total", "Commands executed"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("dispatch_command_duration_seconds", "Command latency by id")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("dispatch_command_errors_total", "Command errors by id and code"), &["command", "error"]));
    register!(BLOCKS, IntCounterVec::new(Opts::new("dispatch_blocks_total", "Gate blocks by reason"), &["reason"]));
    register!(COOLDOWN_HITS, IntCounterVec::new(Opts::new("dispatch_cooldown_hits_total", "Invocations refused by cooldown"), &["command"]));
    register!(FAULTS, IntCounterVec::new(Opts::new("dispatch_faults_total", "Faults raised by user code"), &["stage"]));
    register!(PROMPT_OUTCOMES, IntCounterVec::new(Opts::new("dispatch_prompt_outcomes_total", "Prompt terminal states"), &["outcome"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(c) = metric.get() {
        c.with_label_values(labels).inc();
    }
}

#[inline]
pub fn record_message() {
    if let Some(c) = MESSAGES_HANDLED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_event(event: &str) {
    inc(&EVENTS, &[event]);
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    inc(&COMMAND_COUNTER, &[command]);
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

#[inline]
pub fn record_command_error(command: &str, error: &str) {
    inc(&COMMAND_ERRORS, &[command, error]);
}

/// Record a gate block. Custom inhibitor reasons share one label.
#[inline]
pub fn record_block(reason: &str) {
    inc(&BLOCKS, &[reason]);
}

#[inline]
pub fn record_cooldown(command: &str) {
    inc(&COOLDOWN_HITS, &[command]);
}

#[inline]
pub fn record_fault(stage: &str) {
    inc(&FAULTS, &[stage]);
}

#[inline]
pub fn record_prompt(outcome: &str) {
    inc(&PROMPT_OUTCOMES, &[outcome]);
}
