//! Typed OneBot v11 API calls.
//!
//! [`OneBotBot`] is a thin layer over the [`Correlator`]: each method picks
//! an action name, builds its params and decodes the result data. Anything
//! not covered here goes through [`OneBotBot::call`] or
//! [`OneBotBot::call_raw`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let receipt = bot.send_group_msg(123456, Message::from_text("hi")).await?;
//! if receipt.synthesized {
//!     // No result arrived in time; the message was most likely delivered.
//! }
//!
//! let info = bot.get_login_info().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use bronze_core::ApiResult;

use crate::correlator::{CallResult, Correlator};
use crate::model::{
    DeleteMsgParams, Event, GetGroupMemberInfoParams, GetMsgParams, GetStrangerInfoParams,
    GroupMemberInfo, LoginInfo, Message, MessageDetail, MessageEvent, MessageReceipt,
    QuickOperation, QuickOperationParams, SendGroupMsgParams, SendMsgParams, SendPrivateMsgParams,
    SetFriendAddRequestParams, SetGroupAddRequestParams, Status, StrangerInfo,
};

/// API surface of one connected account.
pub struct OneBotBot {
    correlator: Arc<Correlator>,
    /// Learned from inbound events; zero until the first one arrives.
    self_id: AtomicI64,
}

impl OneBotBot {
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self {
            correlator,
            self_id: AtomicI64::new(0),
        }
    }

    /// The account id, or `None` before any event has been seen.
    pub fn self_id(&self) -> Option<i64> {
        match self.self_id.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    pub(crate) fn observe_self_id(&self, id: i64) {
        if id != 0 {
            self.self_id.store(id, Ordering::Relaxed);
        }
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Calls any action and decodes its data into `T`.
    pub async fn call<T>(&self, action: &str, params: impl Serialize) -> ApiResult<CallResult<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.correlator.call(action, params).await
    }

    /// Calls any action and returns its raw data. A timed-out
    /// fire-and-forget action yields `null`.
    pub async fn call_raw(&self, action: &str, params: Value) -> ApiResult<Value> {
        Ok(self
            .correlator
            .call_raw(action, params)
            .await?
            .map(|raw| raw.data)
            .unwrap_or(Value::Null))
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    pub async fn send_msg(&self, params: SendMsgParams) -> ApiResult<CallResult<MessageReceipt>> {
        self.call("send_msg", params).await
    }

    pub async fn send_private_msg(
        &self,
        user_id: i64,
        message: impl Into<Message>,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        let params = SendPrivateMsgParams {
            user_id,
            message: message.into(),
            auto_escape: false,
        };
        self.call("send_private_msg", params).await
    }

    pub async fn send_group_msg(
        &self,
        group_id: i64,
        message: impl Into<Message>,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        let params = SendGroupMsgParams {
            group_id,
            message: message.into(),
            auto_escape: false,
        };
        self.call("send_group_msg", params).await
    }

    /// Sends `message` back to where `event` came from: the group for group
    /// messages, the sender otherwise.
    pub async fn reply_to(
        &self,
        event: &MessageEvent,
        message: impl Into<Message>,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        let message = message.into();
        let params = match (event.group_id(), event.user_id()) {
            (Some(group_id), _) => SendMsgParams::group(group_id, message),
            (None, Some(user_id)) => SendMsgParams::private(user_id, message),
            (None, None) => SendMsgParams {
                message_type: None,
                user_id: None,
                group_id: None,
                message,
                auto_escape: false,
            },
        };
        self.send_msg(params).await
    }

    /// Recalls a message.
    pub async fn delete_msg(&self, message_id: i64) -> ApiResult<()> {
        self.call::<Value>("delete_msg", DeleteMsgParams { message_id })
            .await
            .map(drop)
    }

    pub async fn get_msg(&self, message_id: i64) -> ApiResult<MessageDetail> {
        Ok(self
            .call::<MessageDetail>("get_msg", GetMsgParams { message_id })
            .await?
            .data)
    }

    // -------------------------------------------------------------------------
    // Account
    // -------------------------------------------------------------------------

    pub async fn get_login_info(&self) -> ApiResult<LoginInfo> {
        let info = self.call::<LoginInfo>("get_login_info", ()).await?.data;
        self.observe_self_id(info.user_id);
        Ok(info)
    }

    pub async fn get_status(&self) -> ApiResult<Status> {
        Ok(self.call::<Status>("get_status", ()).await?.data)
    }

    pub async fn get_stranger_info(&self, user_id: i64, no_cache: bool) -> ApiResult<StrangerInfo> {
        let params = GetStrangerInfoParams { user_id, no_cache };
        Ok(self.call::<StrangerInfo>("get_stranger_info", params).await?.data)
    }

    pub async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
        no_cache: bool,
    ) -> ApiResult<GroupMemberInfo> {
        let params = GetGroupMemberInfoParams {
            group_id,
            user_id,
            no_cache,
        };
        Ok(self
            .call::<GroupMemberInfo>("get_group_member_info", params)
            .await?
            .data)
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    pub async fn set_friend_add_request(
        &self,
        flag: impl Into<String>,
        approve: bool,
        remark: impl Into<String>,
    ) -> ApiResult<()> {
        let params = SetFriendAddRequestParams {
            flag: flag.into(),
            approve,
            remark: remark.into(),
        };
        self.call::<Value>("set_friend_add_request", params)
            .await
            .map(drop)
    }

    pub async fn set_group_add_request(
        &self,
        flag: impl Into<String>,
        sub_type: impl Into<String>,
        approve: bool,
        reason: impl Into<String>,
    ) -> ApiResult<()> {
        let params = SetGroupAddRequestParams {
            flag: flag.into(),
            sub_type: sub_type.into(),
            approve,
            reason: reason.into(),
        };
        self.call::<Value>("set_group_add_request", params)
            .await
            .map(drop)
    }

    /// Answers `event` with a quick operation such as
    /// `{"reply": "...", "at_sender": false}`.
    pub async fn handle_quick_operation(&self, event: &Event, operation: Value) -> ApiResult<()> {
        let params = QuickOperationParams {
            context: event.to_value(),
            operation,
        };
        self.call::<Value>(".handle_quick_operation", params)
            .await
            .map(drop)
    }

    /// Typed form of [`handle_quick_operation`](Self::handle_quick_operation).
    pub async fn quick_operation(&self, event: &Event, operation: QuickOperation) -> ApiResult<()> {
        let operation = serde_json::to_value(operation)?;
        self.handle_quick_operation(event, operation).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::correlator::tests::correlator;

    #[tokio::test]
    async fn test_send_group_msg_frame() {
        let (correlator, mut frames) = correlator();
        let bot = Arc::new(OneBotBot::new(correlator.clone()));

        let b = bot.clone();
        let call = tokio::spawn(async move { b.send_group_msg(123, "hello").await });

        let frame: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
        assert_eq!(frame["action"], "send_group_msg");
        assert_eq!(
            frame["params"],
            json!({
                "group_id": 123,
                "message": [{"type": "text", "data": {"text": "hello"}}],
                "auto_escape": false
            })
        );

        let echo = frame["echo"].as_i64().unwrap();
        correlator.resolve(
            serde_json::from_value(json!({
                "status": "ok", "retcode": 0, "data": {"message_id": 77}, "echo": echo
            }))
            .unwrap(),
        );
        let receipt = call.await.unwrap().unwrap();
        assert_eq!(receipt.data.message_id, 77);
        assert!(!receipt.synthesized);
    }

    #[tokio::test]
    async fn test_get_login_info_learns_self_id() {
        let (correlator, mut frames) = correlator();
        let bot = Arc::new(OneBotBot::new(correlator.clone()));
        assert_eq!(bot.self_id(), None);

        let b = bot.clone();
        let call = tokio::spawn(async move { b.get_login_info().await });

        let frame: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
        assert_eq!(frame["params"], json!({}));
        correlator.resolve(
            serde_json::from_value(json!({
                "status": "ok", "retcode": 0,
                "data": {"user_id": 10000, "nickname": "bronze"},
                "echo": frame["echo"]
            }))
            .unwrap(),
        );

        assert_eq!(call.await.unwrap().unwrap().nickname, "bronze");
        assert_eq!(bot.self_id(), Some(10000));
    }

    /// Answers the next frame with `data` and returns that frame.
    async fn answer(
        correlator: &Correlator,
        frames: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
        data: Value,
    ) -> Value {
        let frame: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
        correlator.resolve(
            serde_json::from_value(json!({
                "status": "ok", "retcode": 0, "data": data, "echo": frame["echo"]
            }))
            .unwrap(),
        );
        frame
    }

    #[tokio::test]
    async fn test_get_msg() {
        let (correlator, mut frames) = correlator();
        let bot = Arc::new(OneBotBot::new(correlator.clone()));

        let b = bot.clone();
        let call = tokio::spawn(async move { b.get_msg(54).await });
        let frame = answer(
            &correlator,
            &mut frames,
            json!({
                "time": 1700000000, "message_type": "group", "message_id": 54, "real_id": 54,
                "sender": {"user_id": 20001, "nickname": "bob"},
                "message": [
                    {"type": "reply", "data": {"id": "53"}},
                    {"type": "text", "data": {"text": "在吗"}}
                ]
            }),
        )
        .await;

        assert_eq!(frame["action"], "get_msg");
        assert_eq!(frame["params"], json!({"message_id": 54}));
        let detail = call.await.unwrap().unwrap();
        assert_eq!(detail.sender.nickname.as_deref(), Some("bob"));
        assert_eq!(detail.message.reply_to(), Some(53));
    }

    #[tokio::test]
    async fn test_member_and_stranger_info() {
        let (correlator, mut frames) = correlator();
        let bot = Arc::new(OneBotBot::new(correlator.clone()));

        let b = bot.clone();
        let call = tokio::spawn(async move { b.get_group_member_info(123456, 20000, true).await });
        let frame = answer(
            &correlator,
            &mut frames,
            json!({"group_id": 123456, "user_id": 20000, "nickname": "alice", "card": "小A", "role": "owner"}),
        )
        .await;
        assert_eq!(frame["action"], "get_group_member_info");
        assert_eq!(
            frame["params"],
            json!({"group_id": 123456, "user_id": 20000, "no_cache": true})
        );
        let member = call.await.unwrap().unwrap();
        assert_eq!(member.display_name(), "小A");
        assert_eq!(member.role, "owner");

        let b = bot.clone();
        let call = tokio::spawn(async move { b.get_stranger_info(20001, false).await });
        let frame = answer(
            &correlator,
            &mut frames,
            json!({"user_id": 20001, "nickname": "bob", "sex": "male", "age": 20}),
        )
        .await;
        assert_eq!(frame["action"], "get_stranger_info");
        assert_eq!(frame["params"], json!({"user_id": 20001, "no_cache": false}));
        let stranger = call.await.unwrap().unwrap();
        assert_eq!((stranger.nickname.as_str(), stranger.age), ("bob", 20));
    }

    #[tokio::test]
    async fn test_typed_quick_operation_frame() {
        let (correlator, mut frames) = correlator();
        let bot = Arc::new(OneBotBot::new(correlator.clone()));
        let wire = json!({
            "time": 1700000000, "self_id": 10000, "post_type": "message",
            "message_type": "group", "sub_type": "normal", "message_id": 55,
            "group_id": 123456, "user_id": 20000,
            "message": "spam", "raw_message": "spam", "font": 0,
            "sender": {"user_id": 20000}
        });
        let event = Event::from_value(&wire).unwrap();

        let b = bot.clone();
        let call = tokio::spawn(async move {
            let operation = QuickOperation {
                delete: Some(true),
                kick: Some(false),
                ban: Some(true),
                ban_duration: Some(60),
                ..QuickOperation::default()
            };
            b.quick_operation(&event, operation).await
        });
        let frame = answer(&correlator, &mut frames, Value::Null).await;

        assert_eq!(frame["action"], ".handle_quick_operation");
        assert_eq!(frame["params"]["context"]["message_id"], 55);
        assert_eq!(
            frame["params"]["operation"],
            json!({"delete": true, "kick": false, "ban": true, "ban_duration": 60})
        );
        call.await.unwrap().unwrap();
    }
}
