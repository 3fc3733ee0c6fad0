//! # Bronze Core
//!
//! Shared building blocks for the bronze OneBot client.
//!
//! This crate carries no protocol knowledge. It defines:
//!
//! - **Errors**: [`TransportError`], [`DecodeError`], [`ApiError`]
//! - **Transport seams**: the [`Connector`] / [`Link`] pair that the socket
//!   client drives, the [`ConnectionHandler`] callbacks it reports to, and the
//!   [`FrameSender`] used by the call correlator
//! - **Persistence seam**: [`ProfileStore`] with an in-memory implementation
//!
//! ```text
//! ┌───────────┐ frames ┌─────────────────┐ results ┌────────────┐
//! │ Transport │───────▶│ Envelope codec  │────────▶│ Correlator │
//! │ (client)  │        └─────────────────┘         └────────────┘
//! └───────────┘                 │ events
//!                               ▼
//!                        ┌────────────┐     ┌────────────────┐
//!                        │ Dispatcher │────▶│ Command router │
//!                        └────────────┘     └────────────────┘
//! ```

pub mod error;
pub mod store;
pub mod transport;

pub use error::{
    ApiError, ApiResult, DecodeError, DecodeResult, TransportError, TransportResult,
};
pub use store::{BoxedProfileStore, MemoryProfileStore, Profile, ProfileStore};
pub use transport::{
    ConnectionHandler, ConnectionState, Connector, FrameSender, FrameSink, FrameStream, Link,
    ReconnectPolicy, WsClientConfig,
};
