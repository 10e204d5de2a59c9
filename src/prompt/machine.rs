//! Prompt state machine.
//!
//! Pure transitions over classified replies; the driver in
//! [`super::Prompter`] does the I/O.

use crate::args::Value;

/// Which text accompanies the next wait for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskKind {
    Start,
    Retry,
    /// Infinite mode with values already collected: wait without a message.
    Silent,
}

/// How a prompt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    Timeout,
    Cancel,
    /// Retries exhausted.
    Ended,
}

impl CancelKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancel => "cancel",
            Self::Ended => "ended",
        }
    }
}

/// A classified reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    TimedOut,
    /// The reply is itself a command invocation.
    Breakout,
    Cancel,
    /// Only produced in infinite mode.
    Stop,
    /// Result of casting the reply; `None` when the cast failed.
    Cast(Option<Value>),
}

/// What the driver does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Ask(AskKind),
    Resolved(Value),
    Cancelled(CancelKind),
    Breakout,
}

#[derive(Debug)]
pub struct PromptMachine {
    retries: u32,
    infinite: bool,
    limit: usize,
    retry: u32,
    values: Vec<Value>,
}

impl PromptMachine {
    /// `had_input`: the invocation supplied a phrase that failed to cast, so
    /// the first ask is already a retry.
    pub fn new(retries: u32, infinite: bool, limit: usize, had_input: bool) -> Self {
        Self {
            retries,
            infinite,
            limit: limit.max(1),
            retry: 1 + u32::from(had_input),
            values: Vec::new(),
        }
    }

    pub fn start(&self) -> Step {
        self.ask()
    }

    #[inline]
    pub fn retry(&self) -> u32 {
        self.retry
    }

    pub fn collected(&self) -> &[Value] {
        &self.values
    }

    pub fn advance(&mut self, input: Input) -> Step {
        match input {
            Input::TimedOut => Step::Cancelled(CancelKind::Timeout),
            Input::Breakout => Step::Breakout,
            Input::Cancel => Step::Cancelled(CancelKind::Cancel),
            Input::Stop if self.values.is_empty() => self.ask(),
            Input::Stop => Step::Resolved(Value::List(std::mem::take(&mut self.values))),
            Input::Cast(None) => {
                if self.retry <= self.retries {
                    self.retry += 1;
                    self.ask()
                } else {
                    Step::Cancelled(CancelKind::Ended)
                }
            }
            Input::Cast(Some(value)) if self.infinite => {
                self.values.push(value);
                if self.values.len() < self.limit {
                    self.retry = 1;
                    self.ask()
                } else {
                    Step::Resolved(Value::List(std::mem::take(&mut self.values)))
                }
            }
            Input::Cast(Some(value)) => Step::Resolved(value),
        }
    }

    fn ask(&self) -> Step {
        if self.retry == 1 && self.infinite && !self.values.is_empty() {
            Step::Ask(AskKind::Silent)
        } else if self.retry == 1 {
            Step::Ask(AskKind::Start)
        } else {
            Step::Ask(AskKind::Retry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_resolves_first_valid() {
        let mut machine = PromptMachine::new(1, false, usize::MAX, false);
        assert_eq!(machine.start(), Step::Ask(AskKind::Start));
        assert_eq!(
            machine.advance(Input::Cast(Some(Value::Integer(5)))),
            Step::Resolved(Value::Integer(5))
        );
    }

    #[test]
    fn test_retries_exhausted_ends() {
        let mut machine = PromptMachine::new(1, false, usize::MAX, false);
        assert_eq!(machine.advance(Input::Cast(None)), Step::Ask(AskKind::Retry));
        assert_eq!(machine.advance(Input::Cast(None)), Step::Cancelled(CancelKind::Ended));
    }

    #[test]
    fn test_failed_invocation_input_counts_as_first_try() {
        let mut machine = PromptMachine::new(1, false, usize::MAX, true);
        assert_eq!(machine.start(), Step::Ask(AskKind::Retry));
        assert_eq!(machine.advance(Input::Cast(None)), Step::Cancelled(CancelKind::Ended));
    }

    #[test]
    fn test_zero_retries() {
        let mut machine = PromptMachine::new(0, false, usize::MAX, false);
        assert_eq!(machine.advance(Input::Cast(None)), Step::Cancelled(CancelKind::Ended));
    }

    #[test]
    fn test_terminal_inputs() {
        let mut machine = PromptMachine::new(3, false, usize::MAX, false);
        assert_eq!(machine.advance(Input::Cancel), Step::Cancelled(CancelKind::Cancel));
        assert_eq!(machine.advance(Input::TimedOut), Step::Cancelled(CancelKind::Timeout));
        assert_eq!(machine.advance(Input::Breakout), Step::Breakout);
    }

    #[test]
    fn test_infinite_collects_until_stop() {
        let mut machine = PromptMachine::new(1, true, usize::MAX, false);
        // stop with nothing collected re-prompts without using a retry
        assert_eq!(machine.advance(Input::Stop), Step::Ask(AskKind::Start));
        assert_eq!(machine.retry(), 1);

        assert_eq!(
            machine.advance(Input::Cast(Some(Value::from("a")))),
            Step::Ask(AskKind::Silent)
        );
        assert_eq!(machine.advance(Input::Cast(None)), Step::Ask(AskKind::Retry));
        assert_eq!(
            machine.advance(Input::Cast(Some(Value::from("b")))),
            Step::Ask(AskKind::Silent)
        );
        assert_eq!(machine.collected().len(), 2);
        assert_eq!(
            machine.advance(Input::Stop),
            Step::Resolved(Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn test_infinite_stops_at_limit() {
        let mut machine = PromptMachine::new(1, true, 2, false);
        machine.advance(Input::Cast(Some(Value::Integer(1))));
        assert_eq!(
            machine.advance(Input::Cast(Some(Value::Integer(2)))),
            Step::Resolved(Value::List(vec![Value::Integer(1), Value::Integer(2)]))
        );
    }
}
