//! slirc-dispatch - Straylight command dispatcher
//!
//! Turns inbound chat messages into validated, type-cast, permission-checked
//! invocations of registered command handlers.
//!
//! - [`resolver`]: prefix and alias resolution
//! - [`security`]: staged inhibitors, permissions and cooldowns
//! - [`args`]: content splitting, argument casting and parsing
//! - [`prompt`]: interactive collection of missing arguments
//! - [`dispatch`]: the per-message pipeline and its events

pub mod args;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod metrics;
pub mod prompt;
pub mod resolver;
pub mod security;
pub mod telemetry;
pub mod transport;

pub use args::{Argument, ArgumentType, Args, MatchKind, Splitter, Value};
pub use commands::{Command, CommandContext, CommandHandler, CommandRegistry, handler_fn};
pub use config::Config;
pub use dispatch::{CommandOutcome, DispatchEvent, Dispatcher, DispatcherBuilder, Outcome, Status};
pub use error::{BuildError, DispatchError, DispatchResult, Fault, FaultStage, RegistryError};
pub use message::{Author, InboundMessage};
pub use prompt::PromptOptions;
pub use resolver::Prefix;
pub use transport::Transport;
