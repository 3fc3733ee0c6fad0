//! Transport abstraction layer.
//!
//! Defines the link and handler seams between the socket client in
//! `bronze-transport` and the protocol engine that sits on top of it.

pub mod config;
pub mod connection;

pub use config::{ReconnectPolicy, WsClientConfig};
pub use connection::{
    ConnectionHandler, ConnectionState, Connector, FrameSender, FrameSink, FrameStream, Link,
};
