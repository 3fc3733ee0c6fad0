//! Test fixtures shared by the framework's unit tests.

use std::sync::Arc;

use async_trait::async_trait;

use bronze_core::{FrameSender, TransportError, TransportResult};
use bronze_onebot::{CallPolicy, Codec, Correlator, OneBotBot};

/// A sender for a socket that is never up.
struct OfflineSender;

#[async_trait]
impl FrameSender for OfflineSender {
    async fn send_frame(&self, _frame: String) -> TransportResult<()> {
        Err(TransportError::NotConnected)
    }
}

/// A bot whose calls all fail with `NotConnected`.
pub(crate) fn test_bot() -> Arc<OneBotBot> {
    let correlator = Correlator::new(Arc::new(OfflineSender), Codec::default(), CallPolicy::default());
    Arc::new(OneBotBot::new(Arc::new(correlator)))
}
