//! Client connection loop with single-writer discipline and reconnection.
//!
//! [`ClientTransport`] owns the link produced by a [`Connector`]. Once started,
//! one task drives the link: it is the only place frames are written (callers
//! enqueue through [`TransportHandle::send`]) and the only place frames are
//! read, so inbound frames reach the [`ConnectionHandler`] strictly in receive
//! order.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use async_trait::async_trait;
use bronze_core::{
    ConnectionHandler, ConnectionState, Connector, FrameSender, Link, ReconnectPolicy,
    TransportError, TransportResult,
};

/// A frame waiting for the writer, plus the channel its outcome is reported on.
struct Outbound {
    frame: String,
    ack: oneshot::Sender<TransportResult<()>>,
}

// =============================================================================
// Transport Handle
// =============================================================================

/// Cheap, cloneable handle used to send frames and observe the connection.
#[derive(Clone)]
pub struct TransportHandle {
    outbound_tx: mpsc::Sender<Outbound>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl TransportHandle {
    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns a receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Sends one text frame.
    ///
    /// Fails immediately with [`TransportError::NotConnected`] unless the link
    /// is up. Otherwise the frame is queued for the writer task and this
    /// resolves once the write completed or failed.
    pub async fn send(&self, frame: String) -> TransportResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }

        let (ack, ack_rx) = oneshot::channel();
        self.outbound_tx
            .send(Outbound { frame, ack })
            .await
            .map_err(|_| TransportError::NotConnected)?;

        ack_rx.await.map_err(|_| TransportError::NotConnected)?
    }

    /// Requests shutdown and waits until the loop reports `Disconnected`.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        let mut state_rx = self.state_rx.clone();
        // The sender is dropped when the loop exits, which also ends the wait.
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
    }

    /// Waits until the connection has fully stopped, for whatever reason.
    pub async fn closed(&self) {
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
    }
}

#[async_trait]
impl FrameSender for TransportHandle {
    async fn send_frame(&self, frame: String) -> TransportResult<()> {
        self.send(frame).await
    }
}

// =============================================================================
// Client Transport
// =============================================================================

/// A not-yet-started client connection.
///
/// Create it, hand out [`handle`](Self::handle)s to whoever needs to send,
/// then call [`start`](Self::start) with the inbound handler.
pub struct ClientTransport {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: mpsc::Receiver<Outbound>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ClientTransport {
    /// Creates a transport around `connector`.
    pub fn new(connector: impl Connector, policy: ReconnectPolicy, send_queue: usize) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(send_queue.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            connector: Arc::new(connector),
            policy,
            outbound_tx,
            outbound_rx,
            state_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a WebSocket transport from client configuration.
    #[cfg(feature = "ws-client")]
    pub fn websocket(config: &bronze_core::WsClientConfig) -> Self {
        Self::new(
            crate::websocket::WsConnector::from_config(config),
            config.reconnect.clone(),
            config.send_queue,
        )
    }

    /// Returns a handle for sending frames and observing state.
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            outbound_tx: self.outbound_tx.clone(),
            state_rx: self.state_tx.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Performs the initial connection and spawns the connection loop.
    ///
    /// A failed initial connection is returned to the caller rather than
    /// retried; the backoff policy only applies once a link has existed.
    pub async fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> TransportResult<JoinHandle<()>> {
        let endpoint = self.connector.endpoint().to_string();
        let mut client = ClientLoop {
            connector: self.connector,
            policy: self.policy,
            handler,
            state_tx: self.state_tx,
            outbound_rx: self.outbound_rx,
            cancel: self.cancel,
        };

        client.set_state(ConnectionState::Connecting);
        info!(endpoint = %endpoint, "Connecting");

        match client.connector.connect().await {
            Ok(link) => {
                info!(endpoint = %endpoint, "Connected");
                client.set_state(ConnectionState::Connected);
                Ok(tokio::spawn(client.run(link)))
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Initial connection failed");
                client.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }
}

// =============================================================================
// Connection Loop
// =============================================================================

/// How a link stopped being driven.
enum LinkEnd {
    /// Shutdown was requested (or every handle was dropped).
    Shutdown,
    /// The link failed or the peer went away.
    Dropped(String),
}

/// Outcome of the backoff loop.
enum Reconnect {
    Linked(Link),
    Shutdown,
    Lost(TransportError),
}

struct ClientLoop {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    handler: Arc<dyn ConnectionHandler>,
    state_tx: watch::Sender<ConnectionState>,
    outbound_rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
}

impl ClientLoop {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
            self.handler.on_state(state);
        }
    }

    async fn run(mut self, link: Link) {
        let mut current = link;

        loop {
            let reason = match self.drive(&mut current).await {
                LinkEnd::Shutdown => {
                    self.set_state(ConnectionState::Closing);
                    info!(endpoint = %self.connector.endpoint(), "Client shutting down");
                    let _ = current.sink.close().await;
                    self.handler.on_link_down("connection stopped");
                    break;
                }
                LinkEnd::Dropped(reason) => reason,
            };

            warn!(endpoint = %self.connector.endpoint(), reason = %reason, "Link dropped");
            self.handler.on_link_down(&reason);

            match self.reconnect(reason).await {
                Reconnect::Linked(link) => current = link,
                Reconnect::Shutdown => {
                    self.set_state(ConnectionState::Closing);
                    info!(endpoint = %self.connector.endpoint(), "Client shutting down while reconnecting");
                    break;
                }
                Reconnect::Lost(err) => {
                    error!(endpoint = %self.connector.endpoint(), error = %err, "Giving up on connection");
                    self.handler.on_lost(&err);
                    break;
                }
            }
        }

        self.reject_queued();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Pumps one link until it ends.
    async fn drive(&mut self, link: &mut Link) -> LinkEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return LinkEnd::Shutdown,

                outbound = self.outbound_rx.recv() => {
                    let Some(Outbound { frame, ack }) = outbound else {
                        return LinkEnd::Shutdown;
                    };
                    trace!(len = frame.len(), "Writing frame");
                    match link.sink.send(frame).await {
                        Ok(()) => {
                            let _ = ack.send(Ok(()));
                        }
                        Err(e) => {
                            let reason = e.to_string();
                            let _ = ack.send(Err(e));
                            return LinkEnd::Dropped(reason);
                        }
                    }
                }

                inbound = link.stream.next() => match inbound {
                    Some(Ok(frame)) => {
                        trace!(len = frame.len(), "Received frame");
                        self.handler.on_frame(frame);
                    }
                    Some(Err(e)) => return LinkEnd::Dropped(e.to_string()),
                    None => return LinkEnd::Dropped("stream ended".to_string()),
                },
            }
        }
    }

    /// Runs the backoff schedule until a new link is up, shutdown is
    /// requested, or the retry budget is spent.
    async fn reconnect(&mut self, mut last_error: String) -> Reconnect {
        let max_retries = if self.policy.enabled {
            self.policy.max_retries
        } else {
            0
        };

        if max_retries > 0 {
            self.set_state(ConnectionState::Reconnecting);
        }

        for attempt in 1..=max_retries {
            let delay = self.policy.delay_for(attempt);
            warn!(attempt, max_retries, delay = ?delay, "Reconnecting");

            if !self.idle(delay).await {
                return Reconnect::Shutdown;
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Reconnect::Shutdown,
                result = self.connector.connect() => result,
            };

            match result {
                Ok(link) => {
                    info!(attempt, endpoint = %self.connector.endpoint(), "Reconnected");
                    self.set_state(ConnectionState::Connected);
                    return Reconnect::Linked(link);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Reconnect::Lost(TransportError::Lost {
            attempts: max_retries,
            reason: last_error,
        })
    }

    /// Sleeps for `delay` while refusing queued sends. Returns false if
    /// shutdown was requested in the meantime.
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                Some(Outbound { ack, .. }) = self.outbound_rx.recv() => {
                    let _ = ack.send(Err(TransportError::NotConnected));
                }
            }
        }
    }

    fn reject_queued(&mut self) {
        self.outbound_rx.close();
        while let Ok(Outbound { ack, .. }) = self.outbound_rx.try_recv() {
            let _ = ack.send(Err(TransportError::NotConnected));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::memory::MemoryConnector;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<String>>,
        states: Mutex<Vec<ConnectionState>>,
        link_downs: AtomicUsize,
        lost: AtomicUsize,
    }

    impl ConnectionHandler for Recorder {
        fn on_frame(&self, frame: String) {
            self.frames.lock().push(frame);
        }

        fn on_state(&self, state: ConnectionState) {
            self.states.lock().push(state);
        }

        fn on_link_down(&self, _reason: &str) {
            self.link_downs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_lost(&self, _error: &TransportError) {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    async fn wait_state(handle: &TransportHandle, state: ConnectionState) {
        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
            .await
            .expect("state not reached")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_send_before_start_fails_fast() {
        let (connector, _server) = MemoryConnector::new();
        let transport = ClientTransport::new(connector, fast_policy(1), 8);
        let handle = transport.handle();

        let err = handle.send("{}".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut server) = MemoryConnector::new();
        let transport = ClientTransport::new(connector, fast_policy(1), 8);
        let handle = transport.handle();
        let recorder = Arc::new(Recorder::default());

        transport.start(recorder.clone()).await.unwrap();
        let mut peer = server.accept().await.unwrap();

        handle.send("ping".into()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("ping"));

        peer.push("first");
        peer.push("second");
        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.frames.lock().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*recorder.frames.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_reconnects_after_failures_below_cap() {
        let (connector, mut server) = MemoryConnector::new();
        let transport = ClientTransport::new(connector.clone(), fast_policy(5), 8);
        let handle = transport.handle();
        let recorder = Arc::new(Recorder::default());

        transport.start(recorder.clone()).await.unwrap();
        let peer = server.accept().await.unwrap();

        // Three attempts fail, the fourth succeeds.
        connector.fail_next(3);
        drop(peer);

        let _second = server.accept().await.unwrap();
        wait_state(&handle, ConnectionState::Connected).await;

        assert_eq!(connector.attempts(), 5);
        assert_eq!(recorder.lost.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.link_downs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lost_surfaced_once_after_cap() {
        let (connector, mut server) = MemoryConnector::new();
        let transport = ClientTransport::new(connector.clone(), fast_policy(3), 8);
        let handle = transport.handle();
        let recorder = Arc::new(Recorder::default());

        let task = transport.start(recorder.clone()).await.unwrap();
        let peer = server.accept().await.unwrap();

        connector.fail_next(100);
        drop(peer);

        task.await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(recorder.lost.load(Ordering::SeqCst), 1);
        // initial connect + three retries
        assert_eq!(connector.attempts(), 4);

        let err = handle.send("late".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_disconnect_reaches_disconnected_without_lost() {
        let (connector, mut server) = MemoryConnector::new();
        let transport = ClientTransport::new(connector, fast_policy(3), 8);
        let handle = transport.handle();
        let recorder = Arc::new(Recorder::default());

        transport.start(recorder.clone()).await.unwrap();
        let _peer = server.accept().await.unwrap();

        handle.disconnect().await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(recorder.lost.load(Ordering::SeqCst), 0);
        assert_eq!(
            *recorder.states.lock(),
            [
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Closing,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnect_while_reconnecting_passes_through_closing() {
        let (connector, mut server) = MemoryConnector::new();
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            ..fast_policy(3)
        };
        let transport = ClientTransport::new(connector.clone(), policy, 8);
        let handle = transport.handle();
        let recorder = Arc::new(Recorder::default());

        let task = transport.start(recorder.clone()).await.unwrap();
        let peer = server.accept().await.unwrap();

        connector.fail_next(100);
        drop(peer);
        wait_state(&handle, ConnectionState::Reconnecting).await;

        handle.disconnect().await;
        task.await.unwrap();

        assert_eq!(recorder.lost.load(Ordering::SeqCst), 0);
        assert_eq!(
            recorder.states.lock()[2..],
            [
                ConnectionState::Reconnecting,
                ConnectionState::Closing,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_initial_failure_is_returned() {
        let (connector, _server) = MemoryConnector::new();
        connector.fail_next(1);
        let transport = ClientTransport::new(connector, fast_policy(3), 8);
        let handle = transport.handle();

        let result = transport.start(Arc::new(Recorder::default())).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }
}
