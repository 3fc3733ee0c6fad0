//! # Bronze Transport
//!
//! The socket layer of the bronze OneBot client.
//!
//! ```text
//! ┌──────────────────────┐
//! │  bronze-onebot       │  (codec, correlator)
//! ├──────────────────────┤
//! │  bronze-transport    │  <- This crate: ClientTransport + connectors
//! ├──────────────────────┤
//! │  Network (TCP/TLS)   │
//! └──────────────────────┘
//! ```
//!
//! [`ClientTransport`] is generic over a [`Connector`](bronze_core::Connector):
//! [`WsConnector`] speaks WebSocket through tokio-tungstenite, and
//! [`MemoryConnector`] wires links through in-process channels for tests.
//!
//! ## Features
//!
//! - `ws-client` (default): the tokio-tungstenite connector
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bronze_core::WsClientConfig;
//! use bronze_transport::ClientTransport;
//!
//! let config = WsClientConfig::new("ws://127.0.0.1:3001/ws").with_token("secret");
//! let transport = ClientTransport::websocket(&config);
//! let handle = transport.handle();
//! transport.start(handler).await?;
//! handle.send(r#"{"action":"get_status","params":{},"echo":1}"#.into()).await?;
//! ```

pub mod client;
pub mod memory;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use client::{ClientTransport, TransportHandle};
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};

#[cfg(feature = "ws-client")]
pub use websocket::WsConnector;
