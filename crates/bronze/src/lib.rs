//! # Bronze
//!
//! A bot client engine for OneBot v11 implementations that speak JSON over
//! a WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ frames ┌──────────────┐ events ┌────────────┐     ┌────────────────┐
//! │  Transport  │───────▶│ OneBot codec │───────▶│ Dispatcher │────▶│ Command router │
//! │ (WebSocket) │◀───────│ + correlator │        └────────────┘     └────────────────┘
//! └─────────────┘ calls  └──────────────┘               │ handlers
//!                                ▲                      ▼
//!                                └──────────── OneBotBot (typed API calls)
//! ```
//!
//! - **Transport**: one client connection with reconnection and backoff
//! - **OneBot**: the `echo`-tagged call/result protocol and typed push events
//! - **Framework**: event fan-out by type hierarchy, message contexts with
//!   quick replies, trigger-prefix commands
//! - **Runtime**: layered configuration, logging and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bronze::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BronzeRuntime::builder().build()?;
//!
//!     runtime
//!         .command(
//!             CommandDescriptor::new("echo", "复读").trigger("echo"),
//!             command_fn(|ctx: MessageContext| async move {
//!                 ctx.quick_reply(ctx.args(), QuickReplyOptions::default()).await?;
//!                 anyhow::Ok(())
//!             }),
//!         )
//!         .help_command(["帮助", "help"]);
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): `bronze.toml` configuration files
//! - `yaml-config`: `bronze.yaml` configuration files
//! - `json-log`: JSON log output

pub use bronze_core as core;
pub use bronze_framework as framework;
pub use bronze_onebot as onebot;
pub use bronze_runtime as runtime;
pub use bronze_transport as transport;

/// Commonly used types for writing a bot.
///
/// ```rust,ignore
/// use bronze::prelude::*;
/// ```
pub mod prelude {
    pub use bronze_runtime::{BronzeConfig, BronzeRuntime, RuntimeBuilder, RuntimeError};

    pub use bronze_framework::{
        CommandDescriptor, CommandExecutor, CommandScope, EventContext, MessageContext,
        QuickReplyOptions, ReplyTarget, Replyer, command_fn,
    };

    pub use bronze_onebot::{
        Event, EventKind, EventType, Message, MessageDetail, MessageEvent, OneBotBot,
        QuickOperation, Segment,
    };

    pub use bronze_core::{ApiError, BoxedProfileStore, MemoryProfileStore, Profile, ProfileStore};

    pub use bronze_runtime::prelude::*;
}
