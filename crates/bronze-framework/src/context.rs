//! Handler contexts.
//!
//! - [`EventContext`] is what every dispatched handler receives: the event
//!   and the bot it arrived on.
//! - [`MessageContext`] is the message-only view used by commands. It is
//!   built together with its [`Replyer`] so that replying never needs a
//!   reference back to the connection.
//!
//! # Quick replies
//!
//! [`MessageContext::quick_reply`] answers where the message came from and
//! lays the outbound message out as
//!
//! ```text
//! [reply(message_id)]? [at(sender)]? content...
//! ```
//!
//! In a group the sender is mentioned unless the options say otherwise.
//!
//! # Reply chains
//!
//! [`MessageContext::track_replies`] fetches the current message and then
//! every message it quotes, newest first, until a message quotes nothing or
//! can no longer be fetched.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use bronze_core::{ApiError, ApiResult};
use bronze_onebot::{
    CallResult, Event, EventType, Message, MessageCommon, MessageDetail, MessageEvent,
    MessageReceipt, OneBotBot, QuickOperation, Segment, SendMsgParams, Sender,
};

use crate::command::split::shell_split;
use crate::error::{ContextError, ContextResult};

// =============================================================================
// EventContext
// =============================================================================

/// One dispatched event plus the bot it belongs to.
#[derive(Clone)]
pub struct EventContext {
    event: Arc<Event>,
    bot: Arc<OneBotBot>,
}

impl EventContext {
    pub fn new(event: impl Into<Arc<Event>>, bot: Arc<OneBotBot>) -> Self {
        Self {
            event: event.into(),
            bot,
        }
    }

    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn bot(&self) -> &Arc<OneBotBot> {
        &self.bot
    }

    /// The message view of this event, replying through the bot.
    pub fn message_context(&self) -> ContextResult<MessageContext> {
        MessageContext::new(self.event.clone(), self.bot.clone())
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event.event_type())
            .field("self_id", &self.event.self_id)
            .finish()
    }
}

// =============================================================================
// Replyer
// =============================================================================

/// Where a reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget {
    Private(i64),
    Group(i64),
}

/// The narrow capability a message context needs to answer.
#[async_trait]
pub trait Replyer: Send + Sync {
    /// Sends `message` to `target`.
    async fn send(
        &self,
        target: ReplyTarget,
        message: Message,
    ) -> ApiResult<CallResult<MessageReceipt>>;

    /// Answers `event` with a quick operation.
    async fn quick_operation(&self, event: &Event, operation: QuickOperation) -> ApiResult<()>;

    /// Fetches a stored message by id.
    async fn get_msg(&self, message_id: i64) -> ApiResult<MessageDetail>;
}

#[async_trait]
impl Replyer for OneBotBot {
    async fn send(
        &self,
        target: ReplyTarget,
        message: Message,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        let params = match target {
            ReplyTarget::Private(user_id) => SendMsgParams::private(user_id, message),
            ReplyTarget::Group(group_id) => SendMsgParams::group(group_id, message),
        };
        self.send_msg(params).await
    }

    async fn quick_operation(&self, event: &Event, operation: QuickOperation) -> ApiResult<()> {
        OneBotBot::quick_operation(self, event, operation).await
    }

    async fn get_msg(&self, message_id: i64) -> ApiResult<MessageDetail> {
        OneBotBot::get_msg(self, message_id).await
    }
}

// =============================================================================
// MessageContext
// =============================================================================

/// Layout options for [`MessageContext::quick_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickReplyOptions {
    /// Quote the incoming message.
    pub quote: bool,
    /// Mention the sender. `None` means "only in groups".
    pub mention: Option<bool>,
    /// Start the content on a new line after the mention.
    pub break_after_mention: bool,
}

impl Default for QuickReplyOptions {
    fn default() -> Self {
        Self {
            quote: false,
            mention: None,
            break_after_mention: true,
        }
    }
}

impl QuickReplyOptions {
    pub fn quoted() -> Self {
        Self {
            quote: true,
            ..Self::default()
        }
    }

    pub fn without_mention() -> Self {
        Self {
            mention: Some(false),
            ..Self::default()
        }
    }
}

/// A private or group message together with the means to answer it.
#[derive(Clone)]
pub struct MessageContext {
    event: Arc<Event>,
    common: Arc<MessageCommon>,
    group_id: Option<i64>,
    replyer: Arc<dyn Replyer>,
    trigger: Option<String>,
}

impl MessageContext {
    /// Binds `event` to `replyer`. Fails unless the event is a private or
    /// group message.
    pub fn new(event: Arc<Event>, replyer: Arc<dyn Replyer>) -> ContextResult<Self> {
        let message = event
            .as_message()
            .ok_or(ContextError::NotAMessage(event.event_type()))?;
        let common = message
            .common()
            .cloned()
            .ok_or(ContextError::NotAMessage(event.event_type()))?;
        let group_id = message.group_id();

        Ok(Self {
            event,
            common: Arc::new(common),
            group_id,
            replyer,
            trigger: None,
        })
    }

    /// A copy of this context that records which trigger matched.
    pub(crate) fn with_trigger(&self, trigger: &str) -> Self {
        Self {
            trigger: Some(trigger.to_string()),
            ..self.clone()
        }
    }

    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    /// The decoded message event.
    pub fn message_event(&self) -> Option<&MessageEvent> {
        self.event.as_message()
    }

    pub fn common(&self) -> &MessageCommon {
        &self.common
    }

    pub fn message(&self) -> &Message {
        &self.common.message
    }

    /// Concatenated text segments.
    pub fn plain_text(&self) -> String {
        self.common.message.plain_text()
    }

    pub fn user_id(&self) -> i64 {
        self.common.user_id
    }

    pub fn message_id(&self) -> i64 {
        self.common.message_id
    }

    pub fn group_id(&self) -> Option<i64> {
        self.group_id
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    pub fn self_id(&self) -> i64 {
        self.event.self_id
    }

    pub fn sender(&self) -> &Sender {
        &self.common.sender
    }

    pub fn mentioned_users(&self) -> Vec<i64> {
        self.common.message.mentioned_users()
    }

    /// Whether the bot account itself is mentioned.
    pub fn is_to_me(&self) -> bool {
        self.common.message.mentions(self.event.self_id)
    }

    /// The trigger that routed this message to a command, if any.
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    /// Text following the matched trigger, trimmed. Without a trigger this
    /// is the whole trimmed text.
    pub fn args(&self) -> String {
        let text = self.plain_text();
        let text = text.trim();
        let rest = match self.trigger.as_deref() {
            Some(trigger) => strip_prefix_ignore_case(text, trigger).unwrap_or(text),
            None => text,
        };
        rest.trim().to_string()
    }

    /// [`args`](Self::args) split like a shell command line.
    pub fn argv(&self) -> Vec<String> {
        shell_split(&self.args())
    }

    /// Where a reply to this message goes.
    pub fn target(&self) -> ReplyTarget {
        match self.group_id {
            Some(group_id) => ReplyTarget::Group(group_id),
            None => ReplyTarget::Private(self.common.user_id),
        }
    }

    /// Sends `content` back as is.
    pub async fn reply(
        &self,
        content: impl Into<Message>,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        self.replyer.send(self.target(), content.into()).await
    }

    /// Sends `content` laid out by [`build_quick_reply`](Self::build_quick_reply).
    pub async fn quick_reply(
        &self,
        content: impl Into<Message>,
        options: QuickReplyOptions,
    ) -> ApiResult<CallResult<MessageReceipt>> {
        let message = self.build_quick_reply(content, options);
        self.replyer.send(self.target(), message).await
    }

    /// Builds `[reply(message_id)]? [at(sender)]? content...`.
    pub fn build_quick_reply(
        &self,
        content: impl Into<Message>,
        options: QuickReplyOptions,
    ) -> Message {
        let mention = options.mention.unwrap_or(self.is_group());

        let mut message = Message::new();
        if options.quote {
            message.push(Segment::reply(self.common.message_id));
        }
        if mention {
            message.push(Segment::at(self.common.user_id));
            if options.break_after_mention {
                message.push(Segment::text("\n"));
            }
        }
        message.extend(content.into());
        message
    }

    /// Answers through `.handle_quick_operation`.
    ///
    /// In a group, a reply sent with `at_sender` starts on a new line after
    /// the mention. Private messages only support `reply`; the group-only
    /// fields are dropped.
    pub async fn quick_operation(&self, operation: QuickOperation) -> ApiResult<()> {
        let operation = self.shape_quick_operation(operation);
        self.replyer.quick_operation(&self.event, operation).await
    }

    fn shape_quick_operation(&self, mut operation: QuickOperation) -> QuickOperation {
        if !self.is_group() {
            return QuickOperation {
                reply: operation.reply,
                ..QuickOperation::default()
            };
        }
        if operation.at_sender == Some(true) {
            if let Some(reply) = operation.reply.take() {
                let mut message = Message::from_text("\n");
                message.extend(reply);
                operation.reply = Some(message);
            }
        }
        operation
    }

    /// This message followed by every message it quotes, newest first.
    ///
    /// The walk ends at a message that quotes nothing, at one whose sender
    /// is unknown, or at one the implementation reports as gone. Transport
    /// errors and timeouts are returned.
    pub async fn track_replies(&self) -> ApiResult<Vec<MessageDetail>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(self.common.message_id).filter(|id| *id != 0);

        while let Some(message_id) = next {
            if !seen.insert(message_id) {
                debug!(message_id, "Reply chain loops back");
                break;
            }
            let detail = match self.replyer.get_msg(message_id).await {
                Ok(detail) => detail,
                Err(ApiError::Failed { retcode, message }) => {
                    debug!(message_id, retcode, %message, "Reply chain ends at a missing message");
                    break;
                }
                Err(e) => return Err(e),
            };
            if detail.sender.user_id.is_none() {
                break;
            }
            next = detail.message.reply_to().filter(|id| *id != 0);
            chain.push(detail);
        }
        Ok(chain)
    }
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageContext")
            .field("message_id", &self.common.message_id)
            .field("user_id", &self.common.user_id)
            .field("group_id", &self.group_id)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Strips `prefix` from `text`, comparing characters case-insensitively.
pub(crate) fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.chars();
    for expected in prefix.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    Some(chars.as_str())
}
