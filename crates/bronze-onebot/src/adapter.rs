//! Wiring between the socket transport and the OneBot protocol engine.
//!
//! ```text
//!             on_frame                ┌─ CallResult ──▶ Correlator::resolve
//! transport ───────────▶ InboundRouter ─ Event ───────▶ EventSink
//!                                     └─ Unrecognized ─▶ warn + drop
//! ```
//!
//! [`OneBotConnection`] assembles the pieces in dependency order: the
//! transport is created first, its handle backs the correlator, and only
//! then is the transport started with the router as its handler.
//!
//! # Usage
//!
//! ```rust,ignore
//! let connection = OneBotConnection::websocket(&ws_config, CodecConfig::default(), CallPolicy::default());
//! connection
//!     .start(Arc::new(|event, bot| {
//!         tracing::info!(event = %event.event_type(), "Got event");
//!     }))
//!     .await?;
//!
//! connection.bot().send_private_msg(10001000, "hello").await?;
//! connection.stop().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use bronze_core::{ConnectionHandler, ConnectionState, TransportError, TransportResult};
use bronze_transport::{ClientTransport, TransportHandle};

use crate::bot::OneBotBot;
use crate::codec::{Codec, CodecConfig, InboundFrame};
use crate::correlator::{CallPolicy, Correlator};
use crate::model::{Event, EventKind, EventType, MetaEvent};

/// Receives every decoded event together with the bot it arrived on.
///
/// Called on the receive loop, so it must hand work off rather than block.
pub type EventSink = Arc<dyn Fn(Event, Arc<OneBotBot>) + Send + Sync>;

// =============================================================================
// InboundRouter
// =============================================================================

/// Classifies inbound frames and routes them to the correlator or the sink.
pub struct InboundRouter {
    codec: Codec,
    bot: Arc<OneBotBot>,
    sink: EventSink,
    lost_tx: watch::Sender<Option<TransportError>>,
}

impl InboundRouter {
    fn log_event(&self, event: &Event) {
        let ty = event.event_type();
        match &event.kind {
            EventKind::Meta(MetaEvent::Heartbeat(hb)) => {
                trace!(self_id = event.self_id, good = hb.status.good, "Received heartbeat");
                if hb.status.online == Some(false) {
                    warn!(self_id = event.self_id, "Heartbeat reports the account offline");
                }
            }
            EventKind::Meta(MetaEvent::Lifecycle(lc)) => {
                info!(self_id = event.self_id, sub_type = %lc.sub_type, "Lifecycle event");
            }
            _ => debug!(self_id = event.self_id, event = %ty, "Received event"),
        }
    }
}

impl ConnectionHandler for InboundRouter {
    fn on_frame(&self, frame: String) {
        match self.codec.classify(&frame) {
            InboundFrame::CallResult(result) => {
                self.bot.correlator().resolve(result);
            }
            InboundFrame::Event(event) => {
                self.bot.observe_self_id(event.self_id);
                self.log_event(&event);
                (self.sink)(*event, self.bot.clone());
            }
            InboundFrame::Unrecognized(reason) => {
                warn!(error = %reason, len = frame.len(), "Dropping unrecognized frame");
                trace!(frame = %frame, "Unrecognized frame body");
            }
        }
    }

    fn on_state(&self, state: ConnectionState) {
        debug!(state = %state, "Connection state changed");
    }

    fn on_link_down(&self, reason: &str) {
        let failed = self.bot.correlator().fail_all();
        warn!(reason = %reason, failed_calls = failed, "Link dropped");
    }

    fn on_lost(&self, error: &TransportError) {
        let failed = self.bot.correlator().fail_all();
        error!(error = %error, failed_calls = failed, "Connection lost for good");
        self.lost_tx.send_replace(Some(error.clone()));
    }
}

// =============================================================================
// OneBotConnection
// =============================================================================

/// One client connection to a OneBot implementation.
pub struct OneBotConnection {
    transport: Mutex<Option<ClientTransport>>,
    handle: TransportHandle,
    codec: Codec,
    bot: Arc<OneBotBot>,
    lost_tx: watch::Sender<Option<TransportError>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OneBotConnection {
    /// Wraps a not-yet-started transport.
    pub fn new(transport: ClientTransport, codec: CodecConfig, policy: CallPolicy) -> Self {
        let handle = transport.handle();
        let codec = Codec::new(codec);
        let correlator = Arc::new(Correlator::new(
            Arc::new(handle.clone()),
            codec.clone(),
            policy,
        ));
        let (lost_tx, _) = watch::channel(None);

        Self {
            transport: Mutex::new(Some(transport)),
            handle,
            codec,
            bot: Arc::new(OneBotBot::new(correlator)),
            lost_tx,
            task: Mutex::new(None),
        }
    }

    /// A WebSocket connection built from client configuration.
    pub fn websocket(
        config: &bronze_core::WsClientConfig,
        codec: CodecConfig,
        policy: CallPolicy,
    ) -> Self {
        Self::new(ClientTransport::websocket(config), codec, policy)
    }

    pub fn bot(&self) -> Arc<OneBotBot> {
        self.bot.clone()
    }

    pub fn handle(&self) -> &TransportHandle {
        &self.handle
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Connects and starts routing inbound frames to `sink`.
    ///
    /// A connection can be started once.
    pub async fn start(&self, sink: EventSink) -> TransportResult<()> {
        let transport = self.transport.lock().take().ok_or_else(|| {
            TransportError::InvalidConfig("connection was already started".into())
        })?;

        let router = Arc::new(InboundRouter {
            codec: self.codec.clone(),
            bot: self.bot.clone(),
            sink,
            lost_tx: self.lost_tx.clone(),
        });

        let task = transport.start(router).await?;
        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Resolves once reconnection has given up.
    pub async fn lost(&self) -> TransportError {
        let mut rx = self.lost_tx.subscribe();
        if let Ok(lost) = rx.wait_for(Option::is_some).await
            && let Some(error) = lost.clone()
        {
            return error;
        }
        TransportError::ConnectionClosed {
            reason: "connection dropped".into(),
        }
    }

    /// Closes the socket and fails every pending call.
    pub async fn stop(&self) {
        self.handle.disconnect().await;
        let failed = self.bot.correlator().fail_all();
        if failed > 0 {
            debug!(failed_calls = failed, "Failed pending calls on stop");
        }

        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Connection task ended abnormally");
        }
        info!("Connection stopped");
    }
}
