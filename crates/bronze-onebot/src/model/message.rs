//! OneBot v11 message content.
//!
//! A [`Message`] is an ordered, mutable list of [`Segment`]s. It always
//! serializes in array form and accepts both the array form and the legacy
//! CQ-code string form on input.
//!
//! # Example
//!
//! ```rust,ignore
//! use bronze_onebot::Message;
//!
//! let msg = Message::new()
//!     .text("Hello, ")
//!     .at(10001000)
//!     .text("! Check this out: ")
//!     .image("http://example.com/image.jpg");
//!
//! println!("{}", msg.plain_text());
//! println!("{}", msg.to_cq_string());
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::segment::{AtTarget, Segment, parse_cq};

// ============================================================================
// Message
// ============================================================================

/// A OneBot v11 message composed of segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    segments: Vec<Segment>,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.segments.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(cq) => Ok(Message::from_cq_string(&cq)),
            Value::Array(items) => items
                .into_iter()
                .map(Segment::deserialize)
                .collect::<Result<Vec<_>, _>>()
                .map(Message::from_segments)
                .map_err(serde::de::Error::custom),
            // A single segment object is tolerated.
            value @ Value::Object(_) => Segment::deserialize(value)
                .map(|seg| Message::from_segments(vec![seg]))
                .map_err(serde::de::Error::custom),
            Value::Null => Ok(Message::new()),
            other => Err(serde::de::Error::custom(format!(
                "expected segment array or CQ string, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Constructors and Builders
// ============================================================================

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// A message holding a single text segment.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::text(text)],
        }
    }

    /// Parses the CQ-code string form.
    pub fn from_cq_string(cq: &str) -> Self {
        Self {
            segments: parse_cq(cq),
        }
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.segment(Segment::text(text))
    }

    pub fn face(self, id: i32) -> Self {
        self.segment(Segment::face(id))
    }

    pub fn image(self, file: impl Into<String>) -> Self {
        self.segment(Segment::image(file))
    }

    pub fn record(self, file: impl Into<String>) -> Self {
        self.segment(Segment::record(file))
    }

    pub fn at(self, user_id: i64) -> Self {
        self.segment(Segment::at(user_id))
    }

    pub fn at_all(self) -> Self {
        self.segment(Segment::at_all())
    }

    pub fn reply(self, message_id: i64) -> Self {
        self.segment(Segment::reply(message_id))
    }

    /// Appends an arbitrary segment.
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }
}

// ============================================================================
// Access and Mutation
// ============================================================================

impl Message {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn insert(&mut self, index: usize, segment: Segment) {
        self.segments.insert(index, segment);
    }

    /// Appends every segment of `other`.
    pub fn extend(&mut self, other: Message) {
        self.segments.extend(other.segments);
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// Concatenation of all text segments, in order.
    pub fn plain_text(&self) -> String {
        self.segments.iter().filter_map(Segment::as_text).collect()
    }

    /// Users mentioned by `at` segments. `@all` is not included.
    pub fn mentioned_users(&self) -> Vec<i64> {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::At(at) => match at.qq {
                    AtTarget::User(id) => Some(id),
                    AtTarget::All => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Whether the message mentions `user_id` directly.
    pub fn mentions(&self, user_id: i64) -> bool {
        self.mentioned_users().contains(&user_id)
    }

    /// The id of the quoted message, if any.
    pub fn reply_to(&self) -> Option<i64> {
        self.segments.iter().find_map(|seg| match seg {
            Segment::Reply(r) => Some(r.id),
            _ => None,
        })
    }

    /// Renders the CQ-code string form.
    pub fn to_cq_string(&self) -> String {
        self.segments.iter().map(Segment::to_cq).collect()
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::from_text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::from_text(text)
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        Message::from_segments(vec![segment])
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Message::from_segments(segments)
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Message::from_segments(iter.into_iter().collect())
    }
}

impl IntoIterator for Message {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let msg = Message::new().reply(7).at(10001000).text(" 签到 ").face(1);
        assert_eq!(msg.len(), 4);
        assert_eq!(msg.plain_text(), " 签到 ");
        assert_eq!(msg.mentioned_users(), vec![10001000]);
        assert!(msg.mentions(10001000));
        assert_eq!(msg.reply_to(), Some(7));
    }

    #[test]
    fn test_serializes_as_array() {
        let msg = Message::from_text("hi").at_all();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!([
                {"type": "text", "data": {"text": "hi"}},
                {"type": "at", "data": {"qq": "all"}}
            ])
        );
    }

    #[test]
    fn test_deserializes_cq_string() {
        let msg: Message = serde_json::from_value(json!("[CQ:at,qq=123] 今日")).unwrap();
        assert_eq!(msg, Message::new().at(123).text(" 今日"));
    }

    #[test]
    fn test_unknown_segments_survive() {
        let wire = json!([
            {"type": "text", "data": {"text": "a"}},
            {"type": "mface", "data": {"emoji_id": "x"}}
        ]);
        let msg: Message = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(msg.plain_text(), "a");
        assert_eq!(serde_json::to_value(&msg).unwrap(), wire);
    }

    #[test]
    fn test_cq_string_round_trip() {
        let msg = Message::new().text("[x]").at(5).text(",y");
        let cq = msg.to_cq_string();
        assert_eq!(cq, "&#91;x&#93;[CQ:at,qq=5],y");
        assert_eq!(Message::from_cq_string(&cq), msg);
    }

    #[test]
    fn test_insert_prepends() {
        let mut msg = Message::from_text("body");
        msg.insert(0, Segment::at(9));
        assert_eq!(msg.segments()[0], Segment::at(9));
    }
}
