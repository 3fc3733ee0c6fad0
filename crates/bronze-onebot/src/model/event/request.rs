//! Request events. Both kinds carry a `flag` that must be echoed back when
//! approving or rejecting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bronze_core::DecodeResult;

use super::{EventType, RawFields, decode_payload, discriminator, raw_fields, write_payload};

#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Friend(FriendRequest),
    Group(GroupRequest),
    /// Unknown `request_type`; holds every field of the frame.
    Other(RawFields),
}

impl RequestEvent {
    pub(super) fn decode(value: &Value) -> DecodeResult<Self> {
        Ok(match discriminator(value, "request_type") {
            Some("friend") => RequestEvent::Friend(decode_payload(value, "request.friend")?),
            Some("group") => RequestEvent::Group(decode_payload(value, "request.group")?),
            _ => RequestEvent::Other(raw_fields(value)),
        })
    }

    pub(super) fn encode(&self, out: &mut Map<String, Value>) {
        match self {
            RequestEvent::Friend(ev) => {
                out.insert("request_type".into(), "friend".into());
                write_payload(ev, out);
            }
            RequestEvent::Group(ev) => {
                out.insert("request_type".into(), "group".into());
                write_payload(ev, out);
            }
            RequestEvent::Other(raw) => out.extend(raw.clone()),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            RequestEvent::Friend(_) => EventType::FriendRequest,
            RequestEvent::Group(_) => EventType::GroupRequest,
            RequestEvent::Other(_) => EventType::Request,
        }
    }

    /// The approval token, when the request type is known.
    pub fn flag(&self) -> Option<&str> {
        match self {
            RequestEvent::Friend(ev) => Some(&ev.flag),
            RequestEvent::Group(ev) => Some(&ev.flag),
            RequestEvent::Other(raw) => raw.get("flag").and_then(Value::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub user_id: i64,
    #[serde(default)]
    pub comment: String,
    pub flag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequest {
    /// `add` or `invite`.
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub comment: String,
    pub flag: String,
}
