//! Data model of the OneBot v11 protocol: push events, message content and
//! action payloads.

pub mod api;
pub mod event;
pub mod lenient;
pub mod message;
pub mod segment;
pub mod types;

pub use api::{
    ActionCall, CallStatus, DeleteMsgParams, GetGroupMemberInfoParams, GetMsgParams,
    GetStrangerInfoParams, GroupMemberInfo, LoginInfo, MessageDetail, MessageReceipt,
    QuickOperation, QuickOperationParams, RawCallResult, SendGroupMsgParams, SendMsgParams,
    SendPrivateMsgParams, SetFriendAddRequestParams, SetGroupAddRequestParams, StrangerInfo,
};
pub use event::*;
pub use message::Message;
pub use segment::{AtTarget, MediaData, RawSegment, Segment, escape_text, parse_cq, unescape};
pub use types::{Anonymous, Sender, Status};
