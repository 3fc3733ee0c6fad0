//! The closed hierarchy of event types used for handler registration.
//!
//! ```text
//! Any
//! ├── Message ── PrivateMessage, GroupMessage
//! ├── Notice ─── GroupUpload, GroupAdmin, GroupDecrease, GroupIncrease,
//! │              GroupBan, FriendAdd, GroupRecall, FriendRecall, GroupCard,
//! │              OfflineFile, ClientStatus, Essence,
//! │              Notify ── Poke, LuckyKing, Honor
//! ├── Request ── FriendRequest, GroupRequest
//! └── Meta ───── Lifecycle, Heartbeat
//! ```
//!
//! An event whose sub-discriminator is unknown has its parent's type, so a
//! handler registered for `Notice` still sees an unknown notice.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Any,

    Message,
    PrivateMessage,
    GroupMessage,

    Notice,
    GroupUpload,
    GroupAdmin,
    GroupDecrease,
    GroupIncrease,
    GroupBan,
    FriendAdd,
    GroupRecall,
    FriendRecall,
    GroupCard,
    OfflineFile,
    ClientStatus,
    Essence,
    Notify,
    Poke,
    LuckyKing,
    Honor,

    Request,
    FriendRequest,
    GroupRequest,

    Meta,
    Lifecycle,
    Heartbeat,
}

impl EventType {
    /// The direct parent, `None` for [`EventType::Any`].
    pub fn parent(self) -> Option<EventType> {
        use EventType::*;
        Some(match self {
            Any => return None,
            Message | Notice | Request | Meta => Any,
            PrivateMessage | GroupMessage => Message,
            GroupUpload | GroupAdmin | GroupDecrease | GroupIncrease | GroupBan | FriendAdd
            | GroupRecall | FriendRecall | GroupCard | OfflineFile | ClientStatus | Essence
            | Notify => Notice,
            Poke | LuckyKing | Honor => Notify,
            FriendRequest | GroupRequest => Request,
            Lifecycle | Heartbeat => Meta,
        })
    }

    /// Iterates from `self` up to [`EventType::Any`], inclusive.
    pub fn ancestors(self) -> impl Iterator<Item = EventType> {
        std::iter::successors(Some(self), |ty| ty.parent())
    }

    /// Whether a handler registered for `self` should see events of type `other`.
    ///
    /// Every type is a supertype of itself.
    pub fn is_supertype_of(self, other: EventType) -> bool {
        other.ancestors().any(|ty| ty == self)
    }

    /// Dotted name, e.g. `notice.notify.poke`.
    pub fn name(self) -> &'static str {
        use EventType::*;
        match self {
            Any => "any",
            Message => "message",
            PrivateMessage => "message.private",
            GroupMessage => "message.group",
            Notice => "notice",
            GroupUpload => "notice.group_upload",
            GroupAdmin => "notice.group_admin",
            GroupDecrease => "notice.group_decrease",
            GroupIncrease => "notice.group_increase",
            GroupBan => "notice.group_ban",
            FriendAdd => "notice.friend_add",
            GroupRecall => "notice.group_recall",
            FriendRecall => "notice.friend_recall",
            GroupCard => "notice.group_card",
            OfflineFile => "notice.offline_file",
            ClientStatus => "notice.client_status",
            Essence => "notice.essence",
            Notify => "notice.notify",
            Poke => "notice.notify.poke",
            LuckyKing => "notice.notify.lucky_king",
            Honor => "notice.notify.honor",
            Request => "request",
            FriendRequest => "request.friend",
            GroupRequest => "request.group",
            Meta => "meta_event",
            Lifecycle => "meta_event.lifecycle",
            Heartbeat => "meta_event.heartbeat",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supertype_chain() {
        assert!(EventType::Any.is_supertype_of(EventType::Poke));
        assert!(EventType::Notice.is_supertype_of(EventType::Poke));
        assert!(EventType::Notify.is_supertype_of(EventType::Poke));
        assert!(EventType::Poke.is_supertype_of(EventType::Poke));
        assert!(!EventType::Poke.is_supertype_of(EventType::Notify));
        assert!(!EventType::Message.is_supertype_of(EventType::Poke));
        assert!(!EventType::PrivateMessage.is_supertype_of(EventType::GroupMessage));
    }

    #[test]
    fn test_ancestors() {
        let chain: Vec<_> = EventType::Honor.ancestors().collect();
        assert_eq!(
            chain,
            vec![
                EventType::Honor,
                EventType::Notify,
                EventType::Notice,
                EventType::Any
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(EventType::GroupMessage.to_string(), "message.group");
    }
}
