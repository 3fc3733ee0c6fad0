//! Message events.
//!
//! ```text
//! MessageEvent (message_type)
//! ├── Private(PrivateMessage { common, temp_source })
//! ├── Group(GroupMessage     { common, group_id, anonymous })
//! └── Other(raw fields)
//! ```
//!
//! Both concrete variants embed [`MessageCommon`] via `#[serde(flatten)]` and
//! `Deref` to it, so `group_msg.user_id` reads the common field directly.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bronze_core::DecodeResult;

use super::{EventType, RawFields, decode_payload, discriminator, write_payload};
use crate::model::message::Message;
use crate::model::types::{Anonymous, Sender};

/// Fields shared by private and group messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCommon {
    /// `friend`, `group`, `normal`, `anonymous`, `notice`, ...
    #[serde(default)]
    pub sub_type: String,
    pub message_id: i64,
    pub user_id: i64,
    pub message: Message,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub font: i32,
    #[serde(default)]
    pub sender: Sender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    #[serde(flatten)]
    pub common: MessageCommon,
    /// Source group of a temporary session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_source: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    #[serde(flatten)]
    pub common: MessageCommon,
    pub group_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<Anonymous>,
}

macro_rules! deref_common {
    ($($ty:ty),*) => {$(
        impl Deref for $ty {
            type Target = MessageCommon;

            fn deref(&self) -> &MessageCommon {
                &self.common
            }
        }

        impl DerefMut for $ty {
            fn deref_mut(&mut self) -> &mut MessageCommon {
                &mut self.common
            }
        }
    )*};
}

deref_common!(PrivateMessage, GroupMessage);

/// A message event, keyed by `message_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Private(PrivateMessage),
    Group(GroupMessage),
    /// Unknown `message_type`; holds every field of the frame.
    Other(RawFields),
}

impl MessageEvent {
    pub(super) fn decode(value: &Value) -> DecodeResult<Self> {
        Ok(match discriminator(value, "message_type") {
            Some("private") => MessageEvent::Private(decode_payload(value, "message.private")?),
            Some("group") => MessageEvent::Group(decode_payload(value, "message.group")?),
            _ => MessageEvent::Other(super::raw_fields(value)),
        })
    }

    pub(super) fn encode(&self, out: &mut Map<String, Value>) {
        match self {
            MessageEvent::Private(ev) => {
                out.insert("message_type".into(), "private".into());
                write_payload(ev, out);
            }
            MessageEvent::Group(ev) => {
                out.insert("message_type".into(), "group".into());
                write_payload(ev, out);
            }
            MessageEvent::Other(raw) => out.extend(raw.clone()),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            MessageEvent::Private(_) => EventType::PrivateMessage,
            MessageEvent::Group(_) => EventType::GroupMessage,
            MessageEvent::Other(_) => EventType::Message,
        }
    }

    /// Common fields, unless the message type is unknown.
    pub fn common(&self) -> Option<&MessageCommon> {
        match self {
            MessageEvent::Private(ev) => Some(&ev.common),
            MessageEvent::Group(ev) => Some(&ev.common),
            MessageEvent::Other(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            MessageEvent::Group(ev) => Some(ev.group_id),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, MessageEvent::Group(_))
    }

    pub fn is_private(&self) -> bool {
        matches!(self, MessageEvent::Private(_))
    }

    pub fn message(&self) -> Option<&Message> {
        self.common().map(|c| &c.message)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.common().map(|c| c.user_id)
    }

    pub fn message_id(&self) -> Option<i64> {
        self.common().map(|c| c.message_id)
    }

    /// Concatenated text of the message; empty for unknown message types.
    pub fn plain_text(&self) -> String {
        self.message().map(Message::plain_text).unwrap_or_default()
    }
}
