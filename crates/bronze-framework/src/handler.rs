//! Event handlers.
//!
//! Any `Fn(EventContext) -> impl Future` closure is an [`EventHandler`] as
//! long as the future resolves to something that implements
//! [`HandlerOutcome`], which covers `()` and `Result<(), E>` for any
//! displayable error.
//!
//! ```rust,ignore
//! dispatcher.register(EventType::Poke, |ctx: EventContext| async move {
//!     let bot = ctx.bot();
//!     bot.send_private_msg(10001000, "poked").await?;
//!     Ok::<_, anyhow::Error>(())
//! });
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::EventContext;

// ============================================================================
// HandlerOutcome
// ============================================================================

/// Return values a handler may produce.
pub trait HandlerOutcome: Send {
    /// Converts into `Err(reason)` when the handler failed.
    fn into_outcome(self) -> Result<(), String>;
}

impl HandlerOutcome for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: Display + Send> HandlerOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

// ============================================================================
// EventHandler
// ============================================================================

/// Something that reacts to a dispatched event.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, ctx: EventContext) -> BoxFuture<'static, Result<(), String>>;
}

impl<F, Fut, R> EventHandler for F
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutcome,
{
    fn handle(&self, ctx: EventContext) -> BoxFuture<'static, Result<(), String>> {
        let fut = self(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// A type-erased, shareable handler.
pub type BoxedHandler = Arc<dyn EventHandler>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes() {
        assert_eq!(().into_outcome(), Ok(()));
        assert_eq!(Ok::<(), String>(()).into_outcome(), Ok(()));

        let failed: anyhow::Result<()> = Err(anyhow::anyhow!("boom"));
        assert_eq!(failed.into_outcome(), Err("boom".to_string()));
    }
}
