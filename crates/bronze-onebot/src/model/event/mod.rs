//! OneBot v11 push events.
//!
//! ```text
//! Event { time, self_id, kind }
//! └── EventKind (post_type)
//!     ├── Message(MessageEvent)   message_type: private | group
//!     ├── Notice(NoticeEvent)     notice_type: group_upload | ... | notify(sub_type)
//!     ├── Request(RequestEvent)   request_type: friend | group
//!     ├── Meta(MetaEvent)         meta_event_type: lifecycle | heartbeat
//!     └── Other(raw)              anything else
//! ```
//!
//! # Decoding
//!
//! Decoding walks the discriminators top-down with an explicit match at
//! each level. Every level has an `Other` variant that keeps the whole frame
//! object, so an unknown `post_type` or sub-type never fails to decode. A
//! known discriminator whose payload does not fit its shape is a
//! [`DecodeError::InvalidPayload`].
//!
//! Serializing an [`Event`] writes the discriminators back, so a decoded
//! event re-encodes into an equivalent frame.

pub mod event_type;
pub mod message;
pub mod meta;
pub mod notice;
pub mod request;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use bronze_core::{DecodeError, DecodeResult};

pub use event_type::EventType;
pub use message::*;
pub use meta::*;
pub use notice::*;
pub use request::*;

/// Undecoded fields of a frame whose discriminator is unknown.
pub type RawFields = Map<String, Value>;

// ============================================================================
// Event
// ============================================================================

/// One push event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Unix timestamp (seconds).
    pub time: i64,
    /// Account the event was delivered to.
    pub self_id: i64,
    pub kind: EventKind,
}

/// The `post_type` level of the taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Message(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
    Meta(MetaEvent),
    /// Unknown `post_type`; holds every field of the frame.
    Other(RawFields),
}

#[derive(Deserialize)]
struct Header {
    time: i64,
    self_id: i64,
}

impl Event {
    /// Decodes an event from a parsed frame.
    pub fn from_value(value: &Value) -> DecodeResult<Event> {
        let Some(post_type) = discriminator(value, "post_type") else {
            return Err(DecodeError::Unclassified);
        };
        let Header { time, self_id } = decode_payload(value, "event")?;

        let kind = match post_type {
            "message" => EventKind::Message(MessageEvent::decode(value)?),
            "notice" => EventKind::Notice(NoticeEvent::decode(value)?),
            "request" => EventKind::Request(RequestEvent::decode(value)?),
            "meta_event" => EventKind::Meta(MetaEvent::decode(value)?),
            _ => EventKind::Other(raw_fields(value)),
        };

        Ok(Event {
            time,
            self_id,
            kind,
        })
    }

    /// Encodes back into the flat frame object.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        let post_type = match &self.kind {
            EventKind::Message(ev) => {
                ev.encode(&mut out);
                Some("message")
            }
            EventKind::Notice(ev) => {
                ev.encode(&mut out);
                Some("notice")
            }
            EventKind::Request(ev) => {
                ev.encode(&mut out);
                Some("request")
            }
            EventKind::Meta(ev) => {
                ev.encode(&mut out);
                Some("meta_event")
            }
            EventKind::Other(raw) => {
                out.extend(raw.clone());
                None
            }
        };
        // Raw fallbacks already carry their own post_type.
        if let Some(post_type) = post_type {
            out.entry("post_type").or_insert_with(|| post_type.into());
        }
        out.insert("time".into(), self.time.into());
        out.insert("self_id".into(), self.self_id.into());
        Value::Object(out)
    }

    /// The most specific type in the [`EventType`] hierarchy.
    pub fn event_type(&self) -> EventType {
        match &self.kind {
            EventKind::Message(ev) => ev.event_type(),
            EventKind::Notice(ev) => ev.event_type(),
            EventKind::Request(ev) => ev.event_type(),
            EventKind::Meta(ev) => ev.event_type(),
            EventKind::Other(_) => EventType::Any,
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.kind {
            EventKind::Message(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn as_notice(&self) -> Option<&NoticeEvent> {
        match &self.kind {
            EventKind::Notice(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestEvent> {
        match &self.kind {
            EventKind::Request(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&MetaEvent> {
        match &self.kind {
            EventKind::Meta(ev) => Some(ev),
            _ => None,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Event::from_value(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Decoding helpers
// ============================================================================

/// Reads a string discriminator field.
pub(crate) fn discriminator<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    value: &Value,
    kind: &'static str,
) -> DecodeResult<T> {
    T::deserialize(value).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

pub(crate) fn raw_fields(value: &Value) -> RawFields {
    value.as_object().cloned().unwrap_or_default()
}

/// Merges the serialized fields of `payload` into `out`.
pub(crate) fn write_payload<T: Serialize>(payload: &T, out: &mut Map<String, Value>) {
    if let Ok(Value::Object(fields)) = serde_json::to_value(payload) {
        out.extend(fields);
    }
}

/// Decodes `wire`, checks its type, and checks that encoding gives `wire`
/// back and decodes to the same event.
#[cfg(test)]
pub(crate) fn assert_round_trip(wire: &Value, expected: EventType) {
    let event = Event::from_value(wire)
        .unwrap_or_else(|e| panic!("{expected}: failed to decode {wire}: {e}"));
    assert_eq!(event.event_type(), expected, "{wire}");

    let encoded = event.to_value();
    assert_eq!(&encoded, wire, "{expected}: encoding differs");
    assert_eq!(Event::from_value(&encoded).unwrap(), event, "{expected}");
}
