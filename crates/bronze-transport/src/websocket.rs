//! WebSocket connector built on tokio-tungstenite.
//!
//! tungstenite reassembles fragmented messages before yielding them, so every
//! item produced by the link's stream is one complete logical frame. Ping
//! frames are answered by tungstenite itself on the next read.

use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, trace};

use async_trait::async_trait;
use bronze_core::{Connector, Link, TransportError, TransportResult, WsClientConfig};

/// Opens WebSocket links to a OneBot implementation.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    access_token: Option<String>,
}

impl WsConnector {
    /// Creates a connector for `url` with an optional bearer token.
    pub fn new(url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }

    /// Creates a connector from client configuration.
    pub fn from_config(config: &WsClientConfig) -> Self {
        Self::new(config.url.clone(), config.access_token.clone())
    }

    /// Builds the upgrade request, attaching the bearer header when a token
    /// is configured.
    fn request(&self) -> TransportResult<tungstenite::handshake::client::Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidConfig(format!("{}: {e}", self.url)))?;

        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidConfig(format!("access token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> TransportResult<Link> {
        let request = self.request()?;
        let (ws_stream, response) =
            connect_async(request)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: self.url.clone(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;
        debug!(url = %self.url, status = %response.status(), "WebSocket handshake complete");

        let (ws_tx, ws_rx) = ws_stream.split();

        let sink = ws_tx
            .with(|frame: String| future::ready(Ok::<_, tungstenite::Error>(Message::Text(frame.into()))))
            .sink_map_err(|e| TransportError::SendFailed(e.to_string()));

        let stream = ws_rx.filter_map(|item| future::ready(map_message(item)));

        Ok(Link::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Maps one tungstenite read result onto the link's frame stream.
fn map_message(item: Result<Message, tungstenite::Error>) -> Option<TransportResult<String>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => {
            trace!(len = data.len(), "Received binary frame, decoding as UTF-8");
            Some(Ok(String::from_utf8_lossy(&data).into_owned()))
        }
        Ok(Message::Close(frame)) => {
            let reason = frame
                .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                .unwrap_or_else(|| "closed by peer".to_string());
            Some(Err(TransportError::ConnectionClosed { reason }))
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::Io(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_bearer_token() {
        let connector = WsConnector::new("ws://127.0.0.1:3001/ws", Some("secret".into()));
        let request = connector.request().unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn test_request_without_token() {
        let connector = WsConnector::new("ws://127.0.0.1:3001/ws", Some(String::new()));
        let request = connector.request().unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let connector = WsConnector::new("not a url", None);
        assert!(matches!(
            connector.request(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_map_message_kinds() {
        assert_eq!(
            map_message(Ok(Message::Text("hi".into()))).unwrap().unwrap(),
            "hi"
        );
        assert!(map_message(Ok(Message::Ping(Vec::new().into()))).is_none());
        assert!(matches!(
            map_message(Ok(Message::Close(None))),
            Some(Err(TransportError::ConnectionClosed { .. }))
        ));
    }
}
