//! Connection handling and lifecycle types.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use crate::error::{TransportError, TransportResult};

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the single client connection.
///
/// ```text
/// Disconnected → Connecting → Connected → Closing → Disconnected
///                                 │
///                                 └─(link error)→ Reconnecting → Connected
///                                                      ├─(retries exhausted)→ Disconnected
///                                                      └─(disconnect)→ Closing → Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link and no attempt in progress.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Link is up; frames can be sent.
    Connected,
    /// A caller requested shutdown and the link is being torn down.
    Closing,
    /// The link dropped unexpectedly and the backoff loop is running.
    Reconnecting,
}

impl ConnectionState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Links
// =============================================================================

/// Write half of an established link. Accepts whole text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Read half of an established link.
///
/// Yields one item per complete logical text frame; `None` means the peer
/// closed the link.
pub type FrameStream = Pin<Box<dyn Stream<Item = TransportResult<String>> + Send>>;

/// An established duplex link, split into its two halves.
pub struct Link {
    /// Outbound half.
    pub sink: FrameSink,
    /// Inbound half.
    pub stream: FrameStream,
}

impl Link {
    /// Creates a link from its halves.
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens new links to the remote endpoint.
///
/// The client loop calls this once at startup and again for every reconnect
/// attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Human-readable endpoint, used in logs and errors.
    fn endpoint(&self) -> &str;

    /// Establishes a new link.
    async fn connect(&self) -> TransportResult<Link>;
}

// =============================================================================
// Handlers
// =============================================================================

/// Receives inbound frames and lifecycle notifications from the client loop.
///
/// Callbacks run on the receive loop itself, so implementations must not
/// block; anything slow has to be spawned.
pub trait ConnectionHandler: Send + Sync {
    /// Called once per complete inbound text frame, in receive order.
    fn on_frame(&self, frame: String);

    /// Called on every state transition.
    fn on_state(&self, _state: ConnectionState) {}

    /// Called when an established link goes away, whether it will be retried
    /// or not. Anything waiting on the old link should be failed here.
    fn on_link_down(&self, _reason: &str) {}

    /// Called exactly once when reconnection gives up.
    fn on_lost(&self, error: &TransportError);
}

/// Anything that can push a whole text frame onto the wire.
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Queues `frame` for the single writer and waits until it is written.
    async fn send_frame(&self, frame: String) -> TransportResult<()>;
}
