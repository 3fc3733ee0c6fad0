//! Event dispatcher.
//!
//! Handlers are registered against an [`EventType`]. A handler receives
//! every event whose type is that type or one of its descendants, so a
//! handler registered for [`EventType::Message`] sees both private and group
//! messages while one registered for [`EventType::GroupMessage`] only sees
//! the latter.
//!
//! # Concurrency
//!
//! [`Dispatcher::dispatch`] spawns one task per event and returns at once,
//! so the connection's receive loop never waits on handlers. The number of
//! dispatches in flight is bounded by a semaphore; when it is exhausted new
//! dispatches queue on it instead of being dropped.
//!
//! Within one dispatch the matching handlers run in registration order.
//! A handler that fails or panics is logged and the next one still runs.
//!
//! ```rust,ignore
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.register(EventType::GroupIncrease, |ctx: EventContext| async move {
//!     tracing::info!(event = %ctx.event_type(), "Welcome");
//! });
//!
//! connection.start(dispatcher.sink()).await?;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, error, span, warn};

use bronze_onebot::{Event, EventSink, EventType, OneBotBot};

use crate::context::EventContext;
use crate::handler::{BoxedHandler, EventHandler};

struct Registration {
    name: String,
    event_type: EventType,
    handler: BoxedHandler,
}

/// What happened to one dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers whose type matched.
    pub matched: usize,
    /// Handlers that returned an error.
    pub failed: usize,
    /// Handlers that panicked.
    pub panicked: usize,
}

/// Fans events out to registered handlers.
pub struct Dispatcher {
    handlers: RwLock<Vec<Arc<Registration>>>,
    gate: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// A dispatcher bounded by [`default_concurrency`](Self::default_concurrency).
    pub fn new() -> Self {
        Self::with_concurrency(Self::default_concurrency())
    }

    /// A dispatcher allowing at most `max_concurrency` dispatches at once.
    /// Zero is treated as one.
    pub fn with_concurrency(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            handlers: RwLock::new(Vec::new()),
            gate: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Twice the available parallelism.
    pub fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            * 2
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Registers `handler` for `event_type` and its descendants.
    pub fn register(&self, event_type: EventType, handler: impl EventHandler) {
        let name = format!("{event_type}#{}", self.handler_count());
        self.register_named(name, event_type, handler);
    }

    /// Like [`register`](Self::register), with a name used in logs.
    pub fn register_named(
        &self,
        name: impl Into<String>,
        event_type: EventType,
        handler: impl EventHandler,
    ) {
        let name = name.into();
        debug!(handler = %name, event = %event_type, "Registered handler");
        self.handlers.write().push(Arc::new(Registration {
            name,
            event_type,
            handler: Arc::new(handler),
        }));
    }

    fn matching(&self, ty: EventType) -> Vec<Arc<Registration>> {
        self.handlers
            .read()
            .iter()
            .filter(|r| r.event_type.is_supertype_of(ty))
            .cloned()
            .collect()
    }

    /// Spawns a task that runs every matching handler.
    pub fn dispatch(&self, ctx: EventContext) -> JoinHandle<DispatchReport> {
        let ty = ctx.event_type();
        let handlers = self.matching(ty);
        let gate = self.gate.clone();
        let span = span!(Level::DEBUG, "dispatch", event = %ty);

        tokio::spawn(
            async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("Dispatch gate closed, dropping event");
                        return DispatchReport::default();
                    }
                };
                run_handlers(handlers, ctx).await
            }
            .instrument(span),
        )
    }

    /// An [`EventSink`] that dispatches every event it receives.
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let dispatcher = self.clone();
        Arc::new(move |event: Event, bot: Arc<OneBotBot>| {
            dispatcher.dispatch(EventContext::new(event, bot));
        })
    }
}

async fn run_handlers(handlers: Vec<Arc<Registration>>, ctx: EventContext) -> DispatchReport {
    let mut report = DispatchReport {
        matched: handlers.len(),
        ..Default::default()
    };
    if handlers.is_empty() {
        debug!("No handler matched");
        return report;
    }

    for registration in handlers {
        // `handle` itself runs inside the unwind guard, so a handler that
        // panics before returning its future is caught too.
        let run = async { registration.handler.handle(ctx.clone()).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                report.failed += 1;
                warn!(handler = %registration.name, error = %reason, "Handler failed");
            }
            Err(panic) => {
                report.panicked += 1;
                error!(
                    handler = %registration.name,
                    panic = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
            }
        }
    }

    report
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.handler_count())
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::context::tests::{group_event, private_event};
    use crate::testing::test_bot;

    fn counter_handler(counter: &Arc<AtomicUsize>) -> impl EventHandler + use<> {
        let counter = counter.clone();
        move |_ctx: EventContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_supertype_dispatch() {
        let dispatcher = Dispatcher::new();
        let any_message = Arc::new(AtomicUsize::new(0));
        let group_only = Arc::new(AtomicUsize::new(0));
        dispatcher.register(EventType::Message, counter_handler(&any_message));
        dispatcher.register(EventType::GroupMessage, counter_handler(&group_only));

        let bot = test_bot();
        let private = dispatcher
            .dispatch(EventContext::new(private_event("hi"), bot.clone()))
            .await
            .unwrap();
        let group = dispatcher
            .dispatch(EventContext::new(group_event("hi"), bot))
            .await
            .unwrap();

        assert_eq!(private.matched, 1);
        assert_eq!(group.matched, 2);
        assert_eq!(any_message.load(Ordering::SeqCst), 2);
        assert_eq!(group_only.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let dispatcher = Dispatcher::new();
        let after = Arc::new(AtomicUsize::new(0));

        dispatcher.register(EventType::Any, |_ctx: EventContext| async move {
            Err::<(), _>(anyhow::anyhow!("handler error"))
        });
        dispatcher.register(EventType::Any, |_ctx: EventContext| async move {
            if true {
                panic!("handler panic");
            }
        });
        dispatcher.register(EventType::Any, counter_handler(&after));

        let report = dispatcher
            .dispatch(EventContext::new(private_event("hi"), test_bot()))
            .await
            .unwrap();

        assert_eq!(
            report,
            DispatchReport {
                matched: 3,
                failed: 1,
                panicked: 1
            }
        );
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_before_future_is_isolated() {
        let dispatcher = Dispatcher::new();
        let after = Arc::new(AtomicUsize::new(0));

        dispatcher.register_named(
            "eager",
            EventType::Message,
            |_ctx: EventContext| -> std::future::Ready<()> { panic!("bad event") },
        );
        dispatcher.register(EventType::Message, counter_handler(&after));

        let report = assert_ok!(
            dispatcher
                .dispatch(EventContext::new(group_event("hi"), test_bot()))
                .await
        );

        assert_eq!(report.matched, 2);
        assert_eq!(report.panicked, 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gate_bounds_in_flight_dispatches() {
        let dispatcher = Arc::new(Dispatcher::with_concurrency(1));
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::unbounded_channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(release_rx));

        dispatcher.register(EventType::Message, move |_ctx: EventContext| {
            let started_tx = started_tx.clone();
            let release_rx = release_rx.clone();
            async move {
                let _ = started_tx.send(());
                release_rx.lock().await.recv().await;
            }
        });

        let bot = test_bot();
        let first = dispatcher.dispatch(EventContext::new(private_event("1"), bot.clone()));
        let second = dispatcher.dispatch(EventContext::new(private_event("2"), bot));

        assert_ok!(tokio::time::timeout(Duration::from_secs(1), started.recv()).await);
        // The second dispatch waits for the permit instead of starting.
        assert_err!(tokio::time::timeout(Duration::from_millis(100), started.recv()).await);

        release_tx.send(()).unwrap();
        assert_ok!(tokio::time::timeout(Duration::from_secs(1), started.recv()).await);
        release_tx.send(()).unwrap();

        assert_eq!(first.await.unwrap().matched, 1);
        assert_eq!(second.await.unwrap().matched, 1);
    }

    #[tokio::test]
    async fn test_sink_dispatches() {
        let dispatcher = Arc::new(Dispatcher::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.register(EventType::Any, move |ctx: EventContext| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ctx.event_type());
            }
        });

        let sink = dispatcher.sink();
        sink((*private_event("hi")).clone(), test_bot());
        assert_eq!(rx.recv().await, Some(EventType::PrivateMessage));
    }

    #[test]
    fn test_zero_concurrency_is_one() {
        assert_eq!(Dispatcher::with_concurrency(0).max_concurrency(), 1);
        assert!(Dispatcher::default_concurrency() >= 2);
    }
}
