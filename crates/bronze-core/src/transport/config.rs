//! Configuration types for transport clients.

use std::time::Duration;

// =============================================================================
// Reconnect Policy
// =============================================================================

/// Exponential backoff policy applied after an established link drops.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Whether to reconnect at all. When false a dropped link is immediately lost.
    pub enabled: bool,
    /// Number of consecutive failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Delay to wait before reconnect attempt number `attempt` (1-based).
    ///
    /// With the defaults this yields 1s, 2s, 4s, 8s, 16s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

// =============================================================================
// WebSocket Client Config
// =============================================================================

/// Configuration for the WebSocket client connection.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// WebSocket server URL.
    pub url: String,
    /// Optional access token sent as `Authorization: Bearer <token>`.
    pub access_token: Option<String>,
    /// Reconnection behaviour.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the outbound write queue.
    pub send_queue: usize,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: None,
            reconnect: ReconnectPolicy::default(),
            send_queue: 64,
        }
    }
}

impl WsClientConfig {
    /// Creates a new WebSocket client config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.access_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.reconnect.max_retries = max;
        self
    }

    /// Replaces the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
