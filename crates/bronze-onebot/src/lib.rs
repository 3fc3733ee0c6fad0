//! # Bronze OneBot
//!
//! The OneBot v11 protocol engine of the bronze client.
//!
//! ## Overview
//!
//! This crate turns a duplex text socket into:
//!
//! - an RPC-like call interface ([`Correlator`], [`OneBotBot`]) that tags
//!   each action with an `echo` token and waits for the matching result
//! - a stream of typed push events ([`Event`]) decoded from the frames that
//!   are not call results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use bronze_core::WsClientConfig;
//! use bronze_onebot::{CallPolicy, CodecConfig, EventKind, MessageEvent, OneBotConnection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WsClientConfig::new("ws://127.0.0.1:3001/ws");
//!     let connection = OneBotConnection::websocket(&config, CodecConfig::default(), CallPolicy::default());
//!
//!     connection
//!         .start(Arc::new(|event, bot| {
//!             if let EventKind::Message(msg @ MessageEvent::Private(_)) = event.kind {
//!                 tokio::spawn(async move { bot.reply_to(&msg, "pong").await });
//!             }
//!         }))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     connection.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Event Hierarchy
//!
//! ```text
//! Event { time, self_id, kind }
//! ├── Message { Private, Group, Other }
//! ├── Notice { GroupUpload, GroupAdmin, ..., Notify { Poke, LuckyKing, Honor, Other }, Other }
//! ├── Request { Friend, Group, Other }
//! ├── Meta { Lifecycle, Heartbeat, Other }
//! └── Other
//! ```

pub mod adapter;
pub mod bot;
pub mod codec;
pub mod correlator;
pub mod model;

pub use adapter::{EventSink, InboundRouter, OneBotConnection};
pub use bot::OneBotBot;
pub use codec::{Codec, CodecConfig, InboundFrame, classify, encode_call};
pub use correlator::{CallPolicy, CallResult, Correlator, DEFAULT_FIRE_AND_FORGET};
pub use model::{
    AtTarget, CallStatus, Event, EventKind, EventType, GroupMemberInfo, GroupMessage, LoginInfo,
    Message, MessageCommon, MessageDetail, MessageEvent, MessageReceipt, MetaEvent, NoticeEvent,
    NotifyEvent, PrivateMessage, QuickOperation, RawCallResult, RequestEvent, Segment, Sender,
    SendMsgParams, Status, StrangerInfo,
};
