//! Common OneBot v11 types shared by several events and API results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message sender information.
///
/// Every field is optional: implementations fill in different subsets, and
/// group-only fields (`card`, `role`, ...) are absent for private messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// "male", "female" or "unknown".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    /// Group card (group nickname).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Some implementations send this as a number.
    #[serde(
        default,
        with = "super::lenient::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<String>,
    /// "owner", "admin" or "member".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Sender {
    /// The name to address this sender by: group card first, then nickname.
    pub fn display_name(&self) -> Option<&str> {
        self.card
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.nickname.as_deref())
    }
}

/// Anonymous identity attached to an anonymous group message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anonymous {
    pub id: i64,
    pub name: String,
    /// Token required to mute this anonymous user.
    pub flag: String,
}

/// Status object carried by heartbeat events and returned by `get_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Whether the account is online. `None` when the implementation cannot tell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    /// Whether the implementation considers itself healthy.
    #[serde(default)]
    pub good: bool,
    /// Implementation-specific extras (`stat`, `app_enabled`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
