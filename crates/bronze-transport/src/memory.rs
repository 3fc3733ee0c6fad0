//! In-process connector for exercising the client loop without a network.
//!
//! [`MemoryConnector::new`] returns the connector together with a
//! [`MemoryServer`]; every successful connect hands the server a
//! [`MemoryPeer`] representing the remote end of that link. Dropping the peer
//! drops the link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{SinkExt, StreamExt};

use bronze_core::{Connector, Link, TransportError, TransportResult};

#[derive(Debug, Default)]
struct Shared {
    attempts: AtomicU32,
    failures: AtomicU32,
}

/// A [`Connector`] whose links are pairs of in-memory channels.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
    accepted: UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Creates a connector and the server that receives its links.
    pub fn new() -> (Self, MemoryServer) {
        let (accepted, incoming) = unbounded();
        let connector = Self {
            shared: Arc::new(Shared::default()),
            accepted,
        };
        (connector, MemoryServer { incoming })
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_next(&self, n: u32) {
        self.shared.failures.store(n, Ordering::SeqCst);
    }

    /// Total number of connection attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.shared
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn endpoint(&self) -> &str {
        "memory://"
    }

    async fn connect(&self) -> TransportResult<Link> {
        let attempt = self.shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.take_failure() {
            return Err(TransportError::ConnectionFailed {
                url: self.endpoint().to_string(),
                reason: format!("refused (attempt {attempt})"),
            });
        }

        let (to_peer, from_client) = unbounded::<String>();
        let (to_client, from_peer) = unbounded::<TransportResult<String>>();

        self.accepted
            .unbounded_send(MemoryPeer {
                inbound: from_client,
                outbound: to_client,
            })
            .map_err(|_| TransportError::ConnectionFailed {
                url: self.endpoint().to_string(),
                reason: "server gone".to_string(),
            })?;

        let sink = to_peer.sink_map_err(|e| TransportError::SendFailed(e.to_string()));
        Ok(Link::new(Box::pin(sink), Box::pin(from_peer)))
    }
}

/// Receives the remote end of every link the connector opens.
pub struct MemoryServer {
    incoming: UnboundedReceiver<MemoryPeer>,
}

impl MemoryServer {
    /// Waits for the next successful connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.next().await
    }
}

/// The remote end of one in-memory link.
pub struct MemoryPeer {
    inbound: UnboundedReceiver<String>,
    outbound: UnboundedSender<TransportResult<String>>,
}

impl MemoryPeer {
    /// Waits for the next frame the client wrote.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.next().await
    }

    /// Delivers a frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.outbound.unbounded_send(Ok(frame.into()));
    }

    /// Makes the client observe a socket error on this link.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self
            .outbound
            .unbounded_send(Err(TransportError::Io(reason.into())));
    }

    /// Returns a detached sender that pushes frames to the client.
    pub fn pusher(&self) -> UnboundedSender<TransportResult<String>> {
        self.outbound.clone()
    }

    /// Sends every frame the client writes through `respond` and pushes back
    /// whatever it returns, until the link closes.
    pub async fn serve<F>(mut self, mut respond: F)
    where
        F: FnMut(String) -> Option<String>,
    {
        while let Some(frame) = self.inbound.next().await {
            if let Some(reply) = respond(frame) {
                self.push(reply);
            }
        }
    }
}

impl Drop for MemoryPeer {
    fn drop(&mut self) {
        self.outbound.close_channel();
    }
}
