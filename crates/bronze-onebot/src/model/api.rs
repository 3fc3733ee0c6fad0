//! Action envelopes, call results and the payloads of the typed API calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;
use super::message::Message;
use super::types::Sender;

// ============================================================================
// Envelopes
// ============================================================================

/// The outbound action envelope: `{"action", "params", "echo"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub action: String,
    pub params: Value,
    pub echo: i64,
}

/// `status` of a call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ok,
    /// Accepted and executed asynchronously; `data` is empty.
    Async,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A call result frame before `data` is decoded into the caller's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCallResult {
    pub status: CallStatus,
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, alias = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wording: Option<String>,
    /// Echoed correlation token, as the implementation sent it back.
    pub echo: Value,
}

impl RawCallResult {
    /// The correlation token, if `echo` holds one of ours.
    pub fn token(&self) -> Option<i64> {
        lenient::string::parse(self.echo.clone()).ok()
    }

    pub fn is_failure(&self) -> bool {
        self.retcode != 0 || self.status == CallStatus::Failed
    }

    /// Best human-readable failure reason.
    pub fn reason(&self) -> String {
        self.wording
            .as_deref()
            .filter(|w| !w.is_empty())
            .or(self.message.as_deref().filter(|m| !m.is_empty()))
            .unwrap_or("no message")
            .to_string()
    }
}

// ============================================================================
// Params
// ============================================================================

/// `send_msg`: target chosen by `message_type` or by which id is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMsgParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub message: Message,
    #[serde(default)]
    pub auto_escape: bool,
}

impl SendMsgParams {
    pub fn private(user_id: i64, message: Message) -> Self {
        Self {
            message_type: Some("private".into()),
            user_id: Some(user_id),
            group_id: None,
            message,
            auto_escape: false,
        }
    }

    pub fn group(group_id: i64, message: Message) -> Self {
        Self {
            message_type: Some("group".into()),
            user_id: None,
            group_id: Some(group_id),
            message,
            auto_escape: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendPrivateMsgParams {
    pub user_id: i64,
    pub message: Message,
    #[serde(default)]
    pub auto_escape: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendGroupMsgParams {
    pub group_id: i64,
    pub message: Message,
    #[serde(default)]
    pub auto_escape: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMsgParams {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetFriendAddRequestParams {
    pub flag: String,
    pub approve: bool,
    /// Remark for the new friend.
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupAddRequestParams {
    pub flag: String,
    /// `add` or `invite`, matching the request's `sub_type`.
    pub sub_type: String,
    pub approve: bool,
    /// Rejection reason.
    #[serde(default)]
    pub reason: String,
}

/// `.handle_quick_operation`: respond to an event the way an HTTP POST
/// reply would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickOperationParams {
    /// The event being answered, as received.
    pub context: Value,
    /// e.g. `{"reply": "...", "at_sender": true}`.
    pub operation: Value,
}

/// The typed body of a quick operation. Unset fields are left out so the
/// implementation applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Message>,
    /// Group only: mention the sender in front of `reply`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_sender: Option<bool>,
    /// Group only: recall the message being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    /// Group only: remove the sender from the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kick: Option<bool>,
    /// Group only: mute the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<bool>,
    /// Mute length in seconds, used with `ban`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_duration: Option<i64>,
}

impl QuickOperation {
    pub fn reply(message: impl Into<Message>) -> Self {
        Self {
            reply: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetMsgParams {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetGroupMemberInfoParams {
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub no_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetStrangerInfoParams {
    pub user_id: i64,
    #[serde(default)]
    pub no_cache: bool,
}

// ============================================================================
// Results
// ============================================================================

/// Result of the send actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: i64,
}

impl Default for MessageReceipt {
    /// The receipt of a send whose result never arrived.
    fn default() -> Self {
        Self { message_id: -1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    pub nickname: String,
}

/// Result of `get_msg`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    #[serde(default)]
    pub time: i64,
    /// "private" or "group".
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub real_id: i64,
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub message: Message,
}

/// Result of `get_group_member_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    #[serde(default)]
    pub group_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: i32,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub join_time: i64,
    #[serde(default)]
    pub last_sent_time: i64,
    #[serde(default, with = "lenient::string")]
    pub level: String,
    /// "owner", "admin" or "member".
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub unfriendly: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_expire_time: i64,
    #[serde(default)]
    pub card_changeable: bool,
}

impl GroupMemberInfo {
    /// Group card if set, nickname otherwise.
    pub fn display_name(&self) -> &str {
        if self.card.is_empty() {
            &self.nickname
        } else {
            &self.card
        }
    }
}

/// Result of `get_stranger_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrangerInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub age: i32,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_call_result_shapes() {
        let result: RawCallResult = serde_json::from_value(json!({
            "status": "failed", "retcode": 1404, "data": null, "msg": "bad", "wording": "不存在", "echo": "7"
        }))
        .unwrap();
        assert_eq!(result.token(), Some(7));
        assert!(result.is_failure());
        assert_eq!(result.reason(), "不存在");

        let result: RawCallResult = serde_json::from_value(json!({
            "status": "async", "retcode": 1, "echo": 8
        }))
        .unwrap();
        assert_eq!(result.status, CallStatus::Async);
        assert_eq!(result.data, Value::Null);
        assert_eq!(result.token(), Some(8));

        let result: RawCallResult =
            serde_json::from_value(json!({"status": "weird", "retcode": 0, "echo": {"k": 1}}))
                .unwrap();
        assert_eq!(result.status, CallStatus::Unknown);
        assert_eq!(result.token(), None);
    }

    #[test]
    fn test_default_receipt() {
        assert_eq!(MessageReceipt::default().message_id, -1);
    }

    #[test]
    fn test_send_msg_params() {
        let params = SendMsgParams::group(5, Message::from_text("hi"));
        assert_eq!(
            serde_json::to_value(params).unwrap(),
            json!({
                "message_type": "group",
                "group_id": 5,
                "message": [{"type": "text", "data": {"text": "hi"}}],
                "auto_escape": false
            })
        );
    }

    #[test]
    fn test_quick_operation_leaves_unset_fields_out() {
        let operation = QuickOperation {
            at_sender: Some(true),
            ban: Some(true),
            ban_duration: Some(600),
            ..QuickOperation::reply("安静点")
        };
        assert_eq!(
            serde_json::to_value(operation).unwrap(),
            json!({
                "reply": [{"type": "text", "data": {"text": "安静点"}}],
                "at_sender": true,
                "ban": true,
                "ban_duration": 600
            })
        );
        assert_eq!(
            serde_json::to_value(QuickOperation::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_group_member_info_shape() {
        let info: GroupMemberInfo = serde_json::from_value(json!({
            "group_id": 123456, "user_id": 20000, "nickname": "alice", "card": "",
            "sex": "female", "age": 18, "area": "", "join_time": 1600000000,
            "last_sent_time": 1700000000, "level": 5, "role": "admin",
            "unfriendly": false, "title": "", "title_expire_time": 0, "card_changeable": true
        }))
        .unwrap();
        assert_eq!(info.level, "5");
        assert_eq!(info.role, "admin");
        assert_eq!(info.display_name(), "alice");

        let info = GroupMemberInfo {
            card: "群主大人".into(),
            ..info
        };
        assert_eq!(info.display_name(), "群主大人");
    }

    #[test]
    fn test_message_detail_accepts_string_message() {
        let detail: MessageDetail = serde_json::from_value(json!({
            "time": 1700000000, "message_type": "group", "message_id": 54, "real_id": 54,
            "sender": {"user_id": 20001, "nickname": "bob"},
            "message": "[CQ:reply,id=53]你好"
        }))
        .unwrap();
        assert_eq!(detail.sender.user_id, Some(20001));
        assert_eq!(detail.message.reply_to(), Some(53));
        assert_eq!(detail.message.plain_text(), "你好");
    }
}
