//! Commands: definitions, execution context and the registry.

pub mod command;
pub mod context;
pub mod registry;

pub use command::{
    ChannelRestriction, Command, CommandBuilder, CommandHandler, CommandLock, Condition,
    FnHandler, HookOutcome, Trigger, handler_fn,
};
pub use context::CommandContext;
pub use registry::CommandRegistry;
