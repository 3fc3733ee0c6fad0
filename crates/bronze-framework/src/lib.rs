//! # Bronze Framework
//!
//! Event fan-out and command routing on top of the OneBot engine.
//!
//! This layer provides:
//! - [`Dispatcher`]: delivers each event to every handler registered for its
//!   type or one of its supertypes, with a bounded number of dispatches in
//!   flight
//! - [`EventContext`] / [`MessageContext`]: what handlers and commands get,
//!   the latter carrying its own [`Replyer`]
//! - [`CommandRouter`]: trigger-prefix commands with a built-in help command

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;

#[cfg(test)]
mod testing;

pub use command::{
    CommandDescriptor, CommandExecutor, CommandRouter, CommandScope, DEFAULT_ERROR_REPLY,
    FnCommand, HelpCommand, RouteOutcome, command_fn, shell_split,
};
pub use context::{EventContext, MessageContext, QuickReplyOptions, ReplyTarget, Replyer};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{ContextError, ContextResult};
pub use handler::{BoxedHandler, EventHandler, HandlerOutcome};
