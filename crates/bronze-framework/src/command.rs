//! Trigger-word command routing.
//!
//! A command is a [`CommandDescriptor`] plus a [`CommandExecutor`]. For each
//! incoming message the [`CommandRouter`] trims the concatenated text
//! segments and looks for the first registered command with a trigger that
//! prefixes it, ignoring case:
//!
//! - commands are tried in registration order and the first match wins
//! - group-only commands are skipped for private messages
//! - an executor error is logged and answered with a generic apology; no
//!   further command is tried for that message
//!
//! # Example
//!
//! ```rust,ignore
//! let router = Arc::new(CommandRouter::new());
//! router.register_command(
//!     CommandDescriptor::new("echo", "Repeats what you say").triggers(["echo", "复读"]),
//!     command_fn(|ctx: MessageContext| async move {
//!         ctx.quick_reply(ctx.args(), QuickReplyOptions::default()).await?;
//!         Ok(())
//!     }),
//! );
//! router.register_help(["帮助", "help", "?"]);
//! router.attach(&dispatcher);
//! ```

pub mod split;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use bronze_onebot::EventType;

use crate::context::{EventContext, MessageContext, QuickReplyOptions, strip_prefix_ignore_case};
use crate::dispatcher::Dispatcher;

pub use split::shell_split;

/// Sent when a command executor fails.
pub const DEFAULT_ERROR_REPLY: &str = "好像哪里出错了，请稍后再试……";

/// Annotation appended to group-only commands in the help text.
pub const GROUP_ONLY_NOTE: &str = " (群组专用)";

// ============================================================================
// Descriptors
// ============================================================================

/// Where a command may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandScope {
    #[default]
    Any,
    Group,
}

/// Static description of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    /// Prefixes that route a message here. When empty, `name` is used.
    pub triggers: Vec<String>,
    pub scope: CommandScope,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            triggers: Vec::new(),
            scope: CommandScope::Any,
        }
    }

    pub fn trigger(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    pub fn triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers.extend(triggers.into_iter().map(Into::into));
        self
    }

    /// Restricts the command to group messages.
    pub fn group_only(mut self) -> Self {
        self.scope = CommandScope::Group;
        self
    }

    pub fn is_group_only(&self) -> bool {
        self.scope == CommandScope::Group
    }

    fn effective_triggers(&self) -> impl Iterator<Item = &str> {
        let fallback = self.triggers.is_empty().then_some(self.name.as_str());
        self.triggers.iter().map(String::as_str).chain(fallback)
    }

    /// The first trigger that prefixes `text`, ignoring case.
    pub fn match_trigger(&self, text: &str) -> Option<&str> {
        self.effective_triggers()
            .filter(|t| !t.is_empty())
            .find(|t| strip_prefix_ignore_case(text, t).is_some())
    }
}

// ============================================================================
// Executors
// ============================================================================

/// Runs a matched command.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    async fn execute(&self, ctx: &MessageContext) -> anyhow::Result<()>;
}

/// An executor backed by a closure. See [`command_fn`].
pub struct FnCommand<F>(F);

/// Wraps `Fn(MessageContext) -> impl Future<Output = anyhow::Result<()>>`.
pub fn command_fn<F, Fut>(f: F) -> FnCommand<F>
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnCommand(f)
}

#[async_trait]
impl<F, Fut> CommandExecutor for FnCommand<F>
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn execute(&self, ctx: &MessageContext) -> anyhow::Result<()> {
        (self.0)(ctx.clone()).await
    }
}

/// Lists every registered command.
pub struct HelpCommand {
    registry: Registry,
    header: String,
}

#[async_trait]
impl CommandExecutor for HelpCommand {
    async fn execute(&self, ctx: &MessageContext) -> anyhow::Result<()> {
        let text = render_help(&self.header, &self.registry.read());
        ctx.quick_reply(text, QuickReplyOptions::default()).await?;
        Ok(())
    }
}

// ============================================================================
// Router
// ============================================================================

struct Command {
    descriptor: CommandDescriptor,
    executor: Arc<dyn CommandExecutor>,
}

type Registry = Arc<RwLock<Vec<Arc<Command>>>>;

/// Result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The named command ran to completion.
    Handled { command: String },
    /// The named command matched and its executor failed.
    Failed { command: String, error: String },
    /// No trigger matched.
    NoMatch,
}

/// Routes messages to commands by trigger prefix.
pub struct CommandRouter {
    registry: Registry,
    error_reply: String,
    help_header: String,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Vec::new())),
            error_reply: DEFAULT_ERROR_REPLY.to_string(),
            help_header: "可用命令：".to_string(),
        }
    }

    /// Replaces the apology sent when an executor fails.
    pub fn with_error_reply(mut self, reply: impl Into<String>) -> Self {
        self.error_reply = reply.into();
        self
    }

    /// Replaces the first line of the help text.
    pub fn with_help_header(mut self, header: impl Into<String>) -> Self {
        self.help_header = header.into();
        self
    }

    pub fn error_reply(&self) -> &str {
        &self.error_reply
    }

    pub fn register_command(&self, descriptor: CommandDescriptor, executor: impl CommandExecutor) {
        debug!(command = %descriptor.name, triggers = ?descriptor.triggers, "Registered command");
        self.registry.write().push(Arc::new(Command {
            descriptor,
            executor: Arc::new(executor),
        }));
    }

    /// Registers a help command answering to `triggers`.
    pub fn register_help<I, S>(&self, triggers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let descriptor = CommandDescriptor::new("帮助", "显示可用命令列表").triggers(triggers);
        let executor = HelpCommand {
            registry: self.registry.clone(),
            header: self.help_header.clone(),
        };
        self.register_command(descriptor, executor);
    }

    /// Descriptors in registration order.
    pub fn commands(&self) -> Vec<CommandDescriptor> {
        self.registry
            .read()
            .iter()
            .map(|c| c.descriptor.clone())
            .collect()
    }

    pub fn help_text(&self) -> String {
        render_help(&self.help_header, &self.registry.read())
    }

    /// Finds the command for `ctx` and runs it.
    pub async fn route(&self, ctx: &MessageContext) -> RouteOutcome {
        let text = ctx.plain_text();
        let text = text.trim();
        if text.is_empty() {
            return RouteOutcome::NoMatch;
        }

        let commands = self.registry.read().clone();
        for command in commands {
            let descriptor = &command.descriptor;
            if descriptor.is_group_only() && !ctx.is_group() {
                continue;
            }
            let Some(trigger) = descriptor.match_trigger(text) else {
                continue;
            };

            debug!(command = %descriptor.name, trigger = %trigger, user_id = ctx.user_id(), "Command matched");
            let ctx = ctx.with_trigger(trigger);
            return match command.executor.execute(&ctx).await {
                Ok(()) => RouteOutcome::Handled {
                    command: descriptor.name.clone(),
                },
                Err(e) => {
                    error!(command = %descriptor.name, error = %format!("{e:#}"), "Command failed");
                    if let Err(send_err) = ctx
                        .quick_reply(self.error_reply.clone(), QuickReplyOptions::default())
                        .await
                    {
                        warn!(error = %send_err, "Failed to send error reply");
                    }
                    RouteOutcome::Failed {
                        command: descriptor.name.clone(),
                        error: e.to_string(),
                    }
                }
            };
        }

        RouteOutcome::NoMatch
    }

    /// Routes one dispatched event. Non-message events are ignored.
    pub async fn handle_event(&self, ctx: EventContext) -> RouteOutcome {
        match ctx.message_context() {
            Ok(message) => self.route(&message).await,
            Err(_) => RouteOutcome::NoMatch,
        }
    }

    /// Registers this router on `dispatcher` for every message event.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let router = self.clone();
        dispatcher.register_named("command-router", EventType::Message, move |ctx: EventContext| {
            let router = router.clone();
            async move {
                router.handle_event(ctx).await;
            }
        });
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("commands", &self.commands())
            .finish()
    }
}

fn render_help(header: &str, commands: &[Arc<Command>]) -> String {
    let mut text = format!("{header}\n");
    for command in commands {
        let d = &command.descriptor;
        let note = if d.is_group_only() { GROUP_ONLY_NOTE } else { "" };
        let triggers: Vec<&str> = d.effective_triggers().collect();
        text.push_str(&format!(
            "\n{}{}: {}\n  触发词: {}",
            d.name,
            note,
            d.description,
            triggers.join(", ")
        ));
    }
    text
}
