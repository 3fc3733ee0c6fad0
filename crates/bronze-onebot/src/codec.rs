//! Envelope codec: outbound action calls and inbound frame classification.
//!
//! Every inbound text frame is exactly one of:
//!
//! | Frame has      | Classified as                  |
//! |----------------|--------------------------------|
//! | `echo`         | [`InboundFrame::CallResult`]   |
//! | `post_type`    | [`InboundFrame::Event`]        |
//! | neither / junk | [`InboundFrame::Unrecognized`] |
//!
//! `echo` wins when both are present. Call result `data` stays a raw JSON
//! value until the correlator decodes it into the caller's expected shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use bronze_core::{ApiResult, DecodeError};

use crate::model::{ActionCall, Event, RawCallResult};

/// Codec settings, passed to the connection at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Drop top-level `null` entries from call params.
    pub omit_null_params: bool,
    /// Log every raw frame at TRACE level.
    pub trace_frames: bool,
}

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    CallResult(RawCallResult),
    Event(Box<Event>),
    /// Dropped after logging; carries the reason.
    Unrecognized(DecodeError),
}

/// Encodes and classifies frames according to a [`CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serializes `{"action", "params", "echo"}`.
    pub fn encode_call(&self, action: &str, params: Value, echo: i64) -> ApiResult<String> {
        let params = match params {
            Value::Object(mut map) if self.config.omit_null_params => {
                map.retain(|_, v| !v.is_null());
                Value::Object(map)
            }
            // Actions without parameters still send an object.
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let frame = serde_json::to_string(&ActionCall {
            action: action.to_string(),
            params,
            echo,
        })?;

        if self.config.trace_frames {
            trace!(frame = %frame, "Outbound frame");
        }
        Ok(frame)
    }

    /// Classifies one inbound text frame. Never panics and never fails:
    /// anything undecodable becomes [`InboundFrame::Unrecognized`].
    pub fn classify(&self, text: &str) -> InboundFrame {
        if self.config.trace_frames {
            trace!(frame = %text, "Inbound frame");
        }

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return InboundFrame::Unrecognized(DecodeError::Malformed(e.to_string())),
        };

        if value.get("echo").is_some() {
            return match RawCallResult::deserialize(&value) {
                Ok(result) => InboundFrame::CallResult(result),
                Err(e) => InboundFrame::Unrecognized(DecodeError::InvalidPayload {
                    kind: "call result",
                    reason: e.to_string(),
                }),
            };
        }

        if value.get("post_type").is_some() {
            return match Event::from_value(&value) {
                Ok(event) => InboundFrame::Event(Box::new(event)),
                Err(e) => InboundFrame::Unrecognized(e),
            };
        }

        InboundFrame::Unrecognized(DecodeError::Unclassified)
    }
}

/// Classifies with the default configuration.
pub fn classify(text: &str) -> InboundFrame {
    Codec::default().classify(text)
}

/// Encodes with the default configuration.
pub fn encode_call(action: &str, params: Value, echo: i64) -> ApiResult<String> {
    Codec::default().encode_call(action, params, echo)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{CallStatus, EventType};

    #[test]
    fn test_encode_call_envelope() {
        let frame = encode_call("send_msg", json!({"user_id": 1, "message": "hi"}), 3).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            value,
            json!({"action": "send_msg", "params": {"user_id": 1, "message": "hi"}, "echo": 3})
        );
    }

    #[test]
    fn test_encode_call_null_params() {
        let frame = encode_call("get_login_info", Value::Null, 1).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["params"], json!({}));
    }

    #[test]
    fn test_omit_null_params() {
        let codec = Codec::new(CodecConfig {
            omit_null_params: true,
            ..Default::default()
        });
        let frame = codec
            .encode_call("send_msg", json!({"group_id": null, "user_id": 1}), 2)
            .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["params"], json!({"user_id": 1}));

        let frame = encode_call("send_msg", json!({"group_id": null}), 2).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["params"], json!({"group_id": null}));
    }

    #[test]
    fn test_classify_call_result() {
        let frame = classify(r#"{"status":"ok","retcode":0,"data":{"message_id":9},"echo":4}"#);
        let InboundFrame::CallResult(result) = frame else {
            panic!("expected call result, got {frame:?}");
        };
        assert_eq!(result.status, CallStatus::Ok);
        assert_eq!(result.token(), Some(4));
        assert_eq!(result.data, json!({"message_id": 9}));
    }

    #[test]
    fn test_classify_event() {
        let frame = classify(
            r#"{"time":1,"self_id":2,"post_type":"meta_event","meta_event_type":"lifecycle","sub_type":"connect"}"#,
        );
        let InboundFrame::Event(event) = frame else {
            panic!("expected event, got {frame:?}");
        };
        assert_eq!(event.event_type(), EventType::Lifecycle);
    }

    #[test]
    fn test_classification_is_exclusive() {
        // echo takes precedence over post_type.
        let both = classify(r#"{"status":"ok","retcode":0,"echo":1,"post_type":"message"}"#);
        assert!(matches!(both, InboundFrame::CallResult(_)));

        assert!(matches!(
            classify(r#"{"hello":"world"}"#),
            InboundFrame::Unrecognized(DecodeError::Unclassified)
        ));
        assert!(matches!(
            classify("not json"),
            InboundFrame::Unrecognized(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            classify(r#"{"echo":1}"#),
            InboundFrame::Unrecognized(DecodeError::InvalidPayload { kind: "call result", .. })
        ));
        assert!(matches!(
            classify(r#"{"post_type":"message","message_type":"group","time":1,"self_id":2}"#),
            InboundFrame::Unrecognized(DecodeError::InvalidPayload { .. })
        ));
    }
}
