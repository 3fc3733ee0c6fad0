//! Request/response correlation over the push-only socket.
//!
//! Each call is tagged with a fresh `echo` token. The pending entry is
//! registered *before* the frame is written, so a result that arrives
//! immediately still finds its waiter. The receive loop hands every call
//! result to [`Correlator::resolve`], which completes the matching entry.
//!
//! Timeouts are asymmetric: fire-and-forget actions (the send family by
//! default) resolve to a synthesized success with default data when no
//! result arrives, every other action fails with [`ApiError::Timeout`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use bronze_core::{ApiError, ApiResult, FrameSender, TransportError};

use crate::codec::Codec;
use crate::model::{CallStatus, RawCallResult};

/// Actions that are treated as fire-and-forget unless configured otherwise.
pub const DEFAULT_FIRE_AND_FORGET: [&str; 3] = ["send_msg", "send_private_msg", "send_group_msg"];

// =============================================================================
// CallPolicy
// =============================================================================

/// Per-action timeout policy.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub blocking_timeout: Duration,
    pub fire_and_forget_timeout: Duration,
    pub fire_and_forget: HashSet<String>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            blocking_timeout: Duration::from_secs(10),
            fire_and_forget_timeout: Duration::from_secs(3),
            fire_and_forget: DEFAULT_FIRE_AND_FORGET
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CallPolicy {
    pub fn is_fire_and_forget(&self, action: &str) -> bool {
        self.fire_and_forget.contains(action)
    }

    pub fn timeout_for(&self, action: &str) -> Duration {
        if self.is_fire_and_forget(action) {
            self.fire_and_forget_timeout
        } else {
            self.blocking_timeout
        }
    }
}

// =============================================================================
// CallResult
// =============================================================================

/// The decoded result of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<T> {
    pub status: CallStatus,
    pub retcode: i64,
    pub data: T,
    pub message: Option<String>,
    /// True when no result arrived and this one was synthesized on timeout.
    pub synthesized: bool,
}

impl<T: Default> CallResult<T> {
    /// A successful result carrying default data.
    pub fn synthesized() -> Self {
        Self {
            status: CallStatus::Ok,
            retcode: 0,
            data: T::default(),
            message: None,
            synthesized: true,
        }
    }
}

impl<T> CallResult<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

// =============================================================================
// Correlator
// =============================================================================

struct PendingCall {
    action: String,
    deadline: Instant,
    tx: oneshot::Sender<ApiResult<RawCallResult>>,
}

/// Tracks in-flight calls and matches results to them.
pub struct Correlator {
    sender: Arc<dyn FrameSender>,
    codec: Codec,
    policy: CallPolicy,
    next_echo: AtomicI64,
    pending: Mutex<HashMap<i64, PendingCall>>,
}

impl Correlator {
    pub fn new(sender: Arc<dyn FrameSender>, codec: Codec, policy: CallPolicy) -> Self {
        Self {
            sender,
            codec,
            policy,
            next_echo: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Number of calls awaiting a result.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Calls `action` and decodes `data` into `T`.
    ///
    /// `null` data and `status: async` results yield `T::default()`.
    pub async fn call<T>(&self, action: &str, params: impl Serialize) -> ApiResult<CallResult<T>>
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.call_raw(action, params).await? {
            Some(raw) => raw,
            None => return Ok(CallResult::synthesized()),
        };

        let data = match (&raw.status, &raw.data) {
            (CallStatus::Async, _) | (_, Value::Null) => T::default(),
            (_, data) => T::deserialize(data)?,
        };

        Ok(CallResult {
            status: raw.status,
            retcode: raw.retcode,
            data,
            message: raw.message,
            synthesized: false,
        })
    }

    /// Calls `action` and returns the raw result, or `None` when a
    /// fire-and-forget call timed out.
    pub async fn call_raw(
        &self,
        action: &str,
        params: impl Serialize,
    ) -> ApiResult<Option<RawCallResult>> {
        let echo = self.next_echo.fetch_add(1, Ordering::Relaxed);
        let frame = self
            .codec
            .encode_call(action, serde_json::to_value(params)?, echo)?;

        let deadline = Instant::now() + self.policy.timeout_for(action);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            echo,
            PendingCall {
                action: action.to_string(),
                deadline,
                tx,
            },
        );

        debug!(action = %action, echo = %echo, "Calling OneBot API");

        // The deadline covers the write as well as the wait for the result.
        let exchange = async {
            self.sender.send_frame(frame).await.map_err(|e| match e {
                TransportError::NotConnected => ApiError::NotConnected,
                other => ApiError::Transport(other),
            })?;
            // A dropped sender means the entry went away without an answer.
            rx.await.unwrap_or(Err(ApiError::NotConnected))
        };

        let raw = match timeout_at(deadline, exchange).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.pending.lock().remove(&echo);
                return Err(e);
            }
            Err(_) => {
                self.pending.lock().remove(&echo);
                if self.policy.is_fire_and_forget(action) {
                    debug!(action = %action, echo = %echo, "No result for fire-and-forget call, assuming success");
                    return Ok(None);
                }
                warn!(action = %action, echo = %echo, "API call timed out");
                return Err(ApiError::Timeout {
                    action: action.to_string(),
                });
            }
        };

        trace!(action = %action, echo = %echo, retcode = raw.retcode, "API result received");

        if raw.is_failure() {
            return Err(ApiError::Failed {
                retcode: raw.retcode,
                message: raw.reason(),
            });
        }
        Ok(Some(raw))
    }

    /// Completes the pending call matching `result.echo`.
    ///
    /// Returns `false` (after logging) when no call is waiting for it,
    /// typically because it already timed out.
    pub fn resolve(&self, result: RawCallResult) -> bool {
        let Some(echo) = result.token() else {
            warn!(echo = %result.echo, "Call result with a foreign echo, dropping");
            return false;
        };

        let Some(call) = self.pending.lock().remove(&echo) else {
            warn!(echo = %echo, "Call result for unknown echo (timed out?)");
            return false;
        };

        trace!(action = %call.action, echo = %echo, "Resolving call");
        // The waiter may have given up between removal and send.
        let _ = call.tx.send(Ok(result));
        true
    }

    /// Wakes every pending call with [`ApiError::NotConnected`].
    ///
    /// Returns how many calls were failed.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<(i64, PendingCall)> = self.pending.lock().drain().collect();
        let now = Instant::now();
        for (echo, call) in &drained {
            debug!(
                action = %call.action,
                echo = %echo,
                remaining = ?call.deadline.saturating_duration_since(now),
                "Failing pending call"
            );
        }
        let count = drained.len();
        for (_, call) in drained {
            let _ = call.tx.send(Err(ApiError::NotConnected));
        }
        count
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::model::{LoginInfo, MessageReceipt};
    use bronze_core::TransportResult;

    /// Frame sender that forwards every written frame to a channel.
    pub(crate) struct ChannelSender {
        pub tx: mpsc::UnboundedSender<String>,
        pub connected: bool,
    }

    #[async_trait]
    impl FrameSender for ChannelSender {
        async fn send_frame(&self, frame: String) -> TransportResult<()> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            self.tx
                .send(frame)
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }
    }

    pub(crate) fn correlator() -> (Arc<Correlator>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Arc::new(ChannelSender {
            tx,
            connected: true,
        });
        let correlator = Arc::new(Correlator::new(
            sender,
            Codec::default(),
            CallPolicy::default(),
        ));
        (correlator, rx)
    }

    fn echo_of(frame: &str) -> i64 {
        let value: Value = serde_json::from_str(frame).unwrap();
        value["echo"].as_i64().unwrap()
    }

    fn ok_result(echo: i64, data: Value) -> RawCallResult {
        serde_json::from_value(json!({"status": "ok", "retcode": 0, "data": data, "echo": echo}))
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_resolves_exactly_once() {
        let (correlator, mut frames) = correlator();

        let responder = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                let frame = frames.recv().await.unwrap();
                let echo = echo_of(&frame);
                let result = ok_result(echo, json!({"user_id": 10000, "nickname": "bot"}));
                assert!(correlator.resolve(result.clone()));
                // A duplicate result finds nothing to resolve.
                assert!(!correlator.resolve(result));
            })
        };

        let result: CallResult<LoginInfo> = correlator.call("get_login_info", json!({})).await.unwrap();
        responder.await.unwrap();

        assert!(!result.synthesized);
        assert_eq!(result.data.user_id, 10000);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (correlator, mut frames) = correlator();

        let a = correlator.clone();
        let b = correlator.clone();
        let call_a = tokio::spawn(async move { a.call::<Value>("get_status", ()).await });
        let call_b = tokio::spawn(async move { b.call::<Value>("get_status", ()).await });

        let first = echo_of(&frames.recv().await.unwrap());
        let second = echo_of(&frames.recv().await.unwrap());
        assert_ne!(first, second);

        correlator.resolve(ok_result(first, json!({"good": true})));
        correlator.resolve(ok_result(second, json!({"good": false})));
        assert!(call_a.await.unwrap().is_ok());
        assert!(call_b.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_echo_is_not_fatal() {
        let (correlator, _frames) = correlator();
        assert!(!correlator.resolve(ok_result(999, Value::Null)));
        let foreign: RawCallResult =
            serde_json::from_value(json!({"status": "ok", "retcode": 0, "echo": "abc"})).unwrap();
        assert!(!correlator.resolve(foreign));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_and_forget_timeout_is_synthesized() {
        let (correlator, _frames) = correlator();
        let result: CallResult<MessageReceipt> = correlator
            .call("send_group_msg", json!({"group_id": 1, "message": "hi"}))
            .await
            .unwrap();
        assert!(result.synthesized);
        assert_eq!(result.status, CallStatus::Ok);
        assert_eq!(result.data.message_id, -1);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_timeout_is_an_error() {
        let (correlator, _frames) = correlator();
        let err = correlator
            .call::<LoginInfo>("get_login_info", ())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout { ref action } if action == "get_login_info"));
        assert_eq!(correlator.pending_count(), 0);
    }

    /// Accepts frames but never finishes writing them.
    struct StalledSender;

    #[async_trait]
    impl FrameSender for StalledSender {
        async fn send_frame(&self, _frame: String) -> TransportResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_is_bounded_by_the_deadline() {
        let correlator = Correlator::new(
            Arc::new(StalledSender),
            Codec::default(),
            CallPolicy::default(),
        );

        let started = Instant::now();
        let receipt = correlator
            .call::<MessageReceipt>("send_msg", json!({"user_id": 1, "message": "hi"}))
            .await
            .unwrap();
        assert!(receipt.synthesized);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(10));

        let err = correlator
            .call::<LoginInfo>("get_login_info", ())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout { ref action } if action == "get_login_info"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_retcode() {
        let (correlator, mut frames) = correlator();
        let c = correlator.clone();
        tokio::spawn(async move {
            let echo = echo_of(&frames.recv().await.unwrap());
            let result = serde_json::from_value(json!({
                "status": "failed", "retcode": 100, "data": null, "message": "bad params", "echo": echo
            }))
            .unwrap();
            c.resolve(result);
        });

        let err = correlator.call::<Value>("delete_msg", json!({"message_id": 1})).await.unwrap_err();
        assert!(matches!(err, ApiError::Failed { retcode: 100, ref message } if message == "bad params"));
    }

    #[tokio::test]
    async fn test_async_status_yields_default() {
        let (correlator, mut frames) = correlator();
        let c = correlator.clone();
        tokio::spawn(async move {
            let echo = echo_of(&frames.recv().await.unwrap());
            let result = serde_json::from_value(json!({"status": "async", "retcode": 0, "echo": echo})).unwrap();
            c.resolve(result);
        });

        let result = correlator.call::<LoginInfo>("get_login_info", ()).await.unwrap();
        assert_eq!(result.status, CallStatus::Async);
        assert_eq!(result.data, LoginInfo::default());
    }

    #[tokio::test]
    async fn test_fail_all_wakes_pending() {
        let (correlator, mut frames) = correlator();
        let c = correlator.clone();
        let call = tokio::spawn(async move { c.call::<Value>("get_status", ()).await });

        frames.recv().await.unwrap();
        assert_eq!(correlator.fail_all(), 1);
        assert!(matches!(call.await.unwrap(), Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let correlator = Correlator::new(
            Arc::new(ChannelSender {
                tx,
                connected: false,
            }),
            Codec::default(),
            CallPolicy::default(),
        );
        let err = correlator.call::<Value>("get_status", ()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConnected));
        assert_eq!(correlator.pending_count(), 0);
    }
}
