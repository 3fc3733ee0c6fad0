//! Meta events, produced by the OneBot implementation itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bronze_core::DecodeResult;

use super::{EventType, RawFields, decode_payload, discriminator, raw_fields, write_payload};
use crate::model::types::Status;

#[derive(Debug, Clone, PartialEq)]
pub enum MetaEvent {
    Lifecycle(Lifecycle),
    Heartbeat(Heartbeat),
    /// Unknown `meta_event_type`; holds every field of the frame.
    Other(RawFields),
}

impl MetaEvent {
    pub(super) fn decode(value: &Value) -> DecodeResult<Self> {
        Ok(match discriminator(value, "meta_event_type") {
            Some("lifecycle") => MetaEvent::Lifecycle(decode_payload(value, "meta_event.lifecycle")?),
            Some("heartbeat") => MetaEvent::Heartbeat(decode_payload(value, "meta_event.heartbeat")?),
            _ => MetaEvent::Other(raw_fields(value)),
        })
    }

    pub(super) fn encode(&self, out: &mut Map<String, Value>) {
        match self {
            MetaEvent::Lifecycle(ev) => {
                out.insert("meta_event_type".into(), "lifecycle".into());
                write_payload(ev, out);
            }
            MetaEvent::Heartbeat(ev) => {
                out.insert("meta_event_type".into(), "heartbeat".into());
                write_payload(ev, out);
            }
            MetaEvent::Other(raw) => out.extend(raw.clone()),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            MetaEvent::Lifecycle(_) => EventType::Lifecycle,
            MetaEvent::Heartbeat(_) => EventType::Heartbeat,
            MetaEvent::Other(_) => EventType::Meta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// `enable`, `disable` or `connect`.
    pub sub_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: Status,
    /// Milliseconds until the next heartbeat.
    pub interval: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::assert_round_trip;
    use super::*;

    #[test]
    fn test_meta_events_round_trip() {
        let lifecycle = json!({
            "time": 1, "self_id": 2, "post_type": "meta_event",
            "meta_event_type": "lifecycle", "sub_type": "connect"
        });
        assert_round_trip(&lifecycle, EventType::Lifecycle);

        let heartbeat = json!({
            "time": 1, "self_id": 2, "post_type": "meta_event", "meta_event_type": "heartbeat",
            "interval": 15000, "status": {"online": true, "good": false}
        });
        assert_round_trip(&heartbeat, EventType::Heartbeat);
    }
}
