//! Notice events, keyed by `notice_type` and, for `notify`, by `sub_type`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bronze_core::DecodeResult;

use super::{EventType, RawFields, decode_payload, discriminator, raw_fields, write_payload};

#[derive(Debug, Clone, PartialEq)]
pub enum NoticeEvent {
    GroupUpload(GroupUpload),
    GroupAdmin(GroupAdmin),
    GroupDecrease(GroupDecrease),
    GroupIncrease(GroupIncrease),
    GroupBan(GroupBan),
    FriendAdd(FriendAdd),
    GroupRecall(GroupRecall),
    FriendRecall(FriendRecall),
    GroupCard(GroupCard),
    OfflineFile(OfflineFileNotice),
    ClientStatus(ClientStatus),
    Essence(Essence),
    Notify(NotifyEvent),
    /// Unknown `notice_type`; holds every field of the frame.
    Other(RawFields),
}

/// `notice_type = notify`, keyed by `sub_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    Poke(Poke),
    LuckyKing(LuckyKing),
    Honor(Honor),
    Other(RawFields),
}

macro_rules! notice_table {
    ($($tag:literal => $variant:ident($ty:ty), $event_type:ident;)*) => {
        impl NoticeEvent {
            pub(super) fn decode(value: &Value) -> DecodeResult<Self> {
                Ok(match discriminator(value, "notice_type") {
                    $(Some($tag) => NoticeEvent::$variant(decode_payload(value, concat!("notice.", $tag))?),)*
                    Some("notify") => NoticeEvent::Notify(NotifyEvent::decode(value)?),
                    _ => NoticeEvent::Other(raw_fields(value)),
                })
            }

            pub(super) fn encode(&self, out: &mut Map<String, Value>) {
                match self {
                    $(NoticeEvent::$variant(ev) => {
                        out.insert("notice_type".into(), $tag.into());
                        write_payload(ev, out);
                    })*
                    NoticeEvent::Notify(ev) => {
                        out.insert("notice_type".into(), "notify".into());
                        ev.encode(out);
                    }
                    NoticeEvent::Other(raw) => out.extend(raw.clone()),
                }
            }

            pub fn event_type(&self) -> EventType {
                match self {
                    $(NoticeEvent::$variant(_) => EventType::$event_type,)*
                    NoticeEvent::Notify(ev) => ev.event_type(),
                    NoticeEvent::Other(_) => EventType::Notice,
                }
            }
        }
    };
}

notice_table! {
    "group_upload" => GroupUpload(GroupUpload), GroupUpload;
    "group_admin" => GroupAdmin(GroupAdmin), GroupAdmin;
    "group_decrease" => GroupDecrease(GroupDecrease), GroupDecrease;
    "group_increase" => GroupIncrease(GroupIncrease), GroupIncrease;
    "group_ban" => GroupBan(GroupBan), GroupBan;
    "friend_add" => FriendAdd(FriendAdd), FriendAdd;
    "group_recall" => GroupRecall(GroupRecall), GroupRecall;
    "friend_recall" => FriendRecall(FriendRecall), FriendRecall;
    "group_card" => GroupCard(GroupCard), GroupCard;
    "offline_file" => OfflineFile(OfflineFileNotice), OfflineFile;
    "client_status" => ClientStatus(ClientStatus), ClientStatus;
    "essence" => Essence(Essence), Essence;
}

impl NotifyEvent {
    fn decode(value: &Value) -> DecodeResult<Self> {
        Ok(match discriminator(value, "sub_type") {
            Some("poke") => NotifyEvent::Poke(decode_payload(value, "notice.notify.poke")?),
            Some("lucky_king") => {
                NotifyEvent::LuckyKing(decode_payload(value, "notice.notify.lucky_king")?)
            }
            Some("honor") => NotifyEvent::Honor(decode_payload(value, "notice.notify.honor")?),
            _ => NotifyEvent::Other(raw_fields(value)),
        })
    }

    fn encode(&self, out: &mut Map<String, Value>) {
        let sub_type = match self {
            NotifyEvent::Poke(ev) => {
                write_payload(ev, out);
                "poke"
            }
            NotifyEvent::LuckyKing(ev) => {
                write_payload(ev, out);
                "lucky_king"
            }
            NotifyEvent::Honor(ev) => {
                write_payload(ev, out);
                "honor"
            }
            NotifyEvent::Other(raw) => {
                out.extend(raw.clone());
                return;
            }
        };
        out.insert("sub_type".into(), sub_type.into());
    }

    pub fn event_type(&self) -> EventType {
        match self {
            NotifyEvent::Poke(_) => EventType::Poke,
            NotifyEvent::LuckyKing(_) => EventType::LuckyKing,
            NotifyEvent::Honor(_) => EventType::Honor,
            NotifyEvent::Other(_) => EventType::Notify,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: i64,
    #[serde(default)]
    pub busid: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupUpload {
    pub group_id: i64,
    pub user_id: i64,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAdmin {
    /// `set` or `unset`.
    pub sub_type: String,
    pub group_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecrease {
    /// `leave`, `kick` or `kick_me`.
    pub sub_type: String,
    pub group_id: i64,
    #[serde(default)]
    pub operator_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIncrease {
    /// `approve` or `invite`.
    pub sub_type: String,
    pub group_id: i64,
    #[serde(default)]
    pub operator_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBan {
    /// `ban` or `lift_ban`.
    pub sub_type: String,
    pub group_id: i64,
    #[serde(default)]
    pub operator_id: i64,
    /// Zero for everyone-muted notices.
    pub user_id: i64,
    /// Seconds.
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendAdd {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecall {
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub operator_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRecall {
    pub user_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCard {
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub card_new: String,
    #[serde(default)]
    pub card_old: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineFile {
    pub name: String,
    pub size: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineFileNotice {
    pub user_id: i64,
    pub file: OfflineFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStatus {
    pub online: bool,
    /// Device description, shape varies by implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Essence {
    /// `add` or `delete`.
    pub sub_type: String,
    pub group_id: i64,
    pub sender_id: i64,
    pub operator_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poke {
    /// Absent for private pokes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub user_id: i64,
    pub target_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyKing {
    pub group_id: i64,
    /// Who sent the red packet.
    pub user_id: i64,
    pub target_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Honor {
    pub group_id: i64,
    pub user_id: i64,
    /// `talkative`, `performer` or `emotion`.
    pub honor_type: String,
}
