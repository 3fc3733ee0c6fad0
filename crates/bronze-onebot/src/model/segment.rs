//! OneBot v11 message segments.
//!
//! On the wire a segment is `{"type": "<kind>", "data": {...}}`. Decoding
//! reads `type` first and then decodes `data` with the payload type for that
//! kind. Kinds this crate does not model, and known kinds whose payload does
//! not fit, become [`Segment::Unknown`] carrying the raw `data` object, so
//! they survive a decode/encode round trip untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use bronze_onebot::Segment;
//!
//! let segments = vec![Segment::reply(42), Segment::at(10001000), Segment::text(" hi")];
//! ```

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use super::lenient;
use super::message::Message;

// ============================================================================
// Segment
// ============================================================================

/// One typed unit of message content.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain text.
    Text(TextData),
    /// Built-in QQ face.
    Face(FaceData),
    /// Image.
    Image(MediaData),
    /// Voice record.
    Record(MediaData),
    /// Short video.
    Video(MediaData),
    /// Mention of a user or of everyone.
    At(AtData),
    /// Rock-paper-scissors magic emoji.
    Rps,
    /// Dice magic emoji.
    Dice,
    /// Window shake.
    Shake,
    /// Poke.
    Poke(PokeData),
    /// Send anonymously (group only).
    Anonymous(AnonymousData),
    /// Link share card.
    Share(ShareData),
    /// Friend or group recommendation card.
    Contact(ContactData),
    /// Location card.
    Location(LocationData),
    /// Music share card.
    Music(MusicData),
    /// Quote of an earlier message.
    Reply(ReplyData),
    /// Reference to a merged-forward bundle (receive only).
    Forward(ForwardData),
    /// One node of a merged-forward bundle (send only).
    Node(NodeData),
    /// Rich XML card.
    Xml(CardData),
    /// Rich JSON card.
    Json(CardData),
    /// Anything else, kept verbatim.
    Unknown(RawSegment),
}

/// The undecoded `{type, data}` form of a segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Segment {
    /// The wire `type` of this segment.
    pub fn kind(&self) -> &str {
        match self {
            Segment::Text(_) => "text",
            Segment::Face(_) => "face",
            Segment::Image(_) => "image",
            Segment::Record(_) => "record",
            Segment::Video(_) => "video",
            Segment::At(_) => "at",
            Segment::Rps => "rps",
            Segment::Dice => "dice",
            Segment::Shake => "shake",
            Segment::Poke(_) => "poke",
            Segment::Anonymous(_) => "anonymous",
            Segment::Share(_) => "share",
            Segment::Contact(_) => "contact",
            Segment::Location(_) => "location",
            Segment::Music(_) => "music",
            Segment::Reply(_) => "reply",
            Segment::Forward(_) => "forward",
            Segment::Node(_) => "node",
            Segment::Xml(_) => "xml",
            Segment::Json(_) => "json",
            Segment::Unknown(raw) => &raw.kind,
        }
    }

    /// Decodes a raw segment. Never fails: anything that does not decode
    /// into a known payload is kept as [`Segment::Unknown`].
    pub fn from_raw(raw: RawSegment) -> Segment {
        let data = Value::Object(raw.data);
        let decoded = match raw.kind.as_str() {
            "text" => payload(&data).map(Segment::Text),
            "face" => payload(&data).map(Segment::Face),
            "image" => payload(&data).map(Segment::Image),
            "record" => payload(&data).map(Segment::Record),
            "video" => payload(&data).map(Segment::Video),
            "at" => payload(&data).map(Segment::At),
            "rps" => Ok(Segment::Rps),
            "dice" => Ok(Segment::Dice),
            "shake" => Ok(Segment::Shake),
            "poke" => payload(&data).map(Segment::Poke),
            "anonymous" => payload(&data).map(Segment::Anonymous),
            "share" => payload(&data).map(Segment::Share),
            "contact" => payload(&data).map(Segment::Contact),
            "location" => payload(&data).map(Segment::Location),
            "music" => payload(&data).map(Segment::Music),
            "reply" => payload(&data).map(Segment::Reply),
            "forward" => payload(&data).map(Segment::Forward),
            "node" => payload(&data).map(Segment::Node),
            "xml" => payload(&data).map(Segment::Xml),
            "json" => payload(&data).map(Segment::Json),
            _ => return Segment::Unknown(raw_from(raw.kind, data)),
        };

        decoded.unwrap_or_else(|e| {
            debug!(kind = %raw.kind, error = %e, "Segment payload did not decode, keeping raw");
            Segment::Unknown(raw_from(raw.kind, data))
        })
    }

    /// Converts back to the undecoded `{type, data}` form.
    pub fn to_raw(&self) -> RawSegment {
        let data = match self {
            Segment::Text(d) => object(d),
            Segment::Face(d) => object(d),
            Segment::Image(d) | Segment::Record(d) | Segment::Video(d) => object(d),
            Segment::At(d) => object(d),
            Segment::Rps | Segment::Dice | Segment::Shake => Map::new(),
            Segment::Poke(d) => object(d),
            Segment::Anonymous(d) => object(d),
            Segment::Share(d) => object(d),
            Segment::Contact(d) => object(d),
            Segment::Location(d) => object(d),
            Segment::Music(d) => object(d),
            Segment::Reply(d) => object(d),
            Segment::Forward(d) => object(d),
            Segment::Node(d) => object(d),
            Segment::Xml(d) | Segment::Json(d) => object(d),
            Segment::Unknown(raw) => return raw.clone(),
        };
        RawSegment {
            kind: self.kind().to_string(),
            data,
        }
    }

    /// Returns the text if this is a text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(d) => Some(&d.text),
            _ => None,
        }
    }

    /// Returns true for text segments.
    pub fn is_text(&self) -> bool {
        matches!(self, Segment::Text(_))
    }
}

fn payload<T: DeserializeOwned>(data: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

fn raw_from(kind: String, data: Value) -> RawSegment {
    let data = match data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    RawSegment { kind, data }
}

fn object<T: Serialize>(payload: &T) -> Map<String, Value> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.kind())?;
        match self {
            Segment::Text(d) => map.serialize_entry("data", d)?,
            Segment::Face(d) => map.serialize_entry("data", d)?,
            Segment::Image(d) | Segment::Record(d) | Segment::Video(d) => {
                map.serialize_entry("data", d)?
            }
            Segment::At(d) => map.serialize_entry("data", d)?,
            Segment::Rps | Segment::Dice | Segment::Shake => {
                map.serialize_entry("data", &Map::new())?
            }
            Segment::Poke(d) => map.serialize_entry("data", d)?,
            Segment::Anonymous(d) => map.serialize_entry("data", d)?,
            Segment::Share(d) => map.serialize_entry("data", d)?,
            Segment::Contact(d) => map.serialize_entry("data", d)?,
            Segment::Location(d) => map.serialize_entry("data", d)?,
            Segment::Music(d) => map.serialize_entry("data", d)?,
            Segment::Reply(d) => map.serialize_entry("data", d)?,
            Segment::Forward(d) => map.serialize_entry("data", d)?,
            Segment::Node(d) => map.serialize_entry("data", d)?,
            Segment::Xml(d) | Segment::Json(d) => map.serialize_entry("data", d)?,
            Segment::Unknown(raw) => map.serialize_entry("data", &raw.data)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawSegment::deserialize(deserializer).map(Segment::from_raw)
    }
}

// ============================================================================
// Builders
// ============================================================================

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    pub fn face(id: i32) -> Self {
        Segment::Face(FaceData { id })
    }

    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(MediaData::new(file))
    }

    pub fn record(file: impl Into<String>) -> Self {
        Segment::Record(MediaData::new(file))
    }

    pub fn video(file: impl Into<String>) -> Self {
        Segment::Video(MediaData::new(file))
    }

    /// Mentions one user.
    pub fn at(user_id: i64) -> Self {
        Segment::At(AtData {
            qq: AtTarget::User(user_id),
        })
    }

    /// Mentions everyone in the group.
    pub fn at_all() -> Self {
        Segment::At(AtData { qq: AtTarget::All })
    }

    /// Quotes the message with the given id.
    pub fn reply(message_id: i64) -> Self {
        Segment::Reply(ReplyData { id: message_id })
    }

    pub fn poke(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Segment::Poke(PokeData {
            kind: kind.into(),
            id: id.into(),
            name: None,
        })
    }

    pub fn share(url: impl Into<String>, title: impl Into<String>) -> Self {
        Segment::Share(ShareData {
            url: url.into(),
            title: title.into(),
            content: None,
            image: None,
        })
    }

    pub fn location(lat: f64, lon: f64) -> Self {
        Segment::Location(LocationData {
            lat,
            lon,
            title: None,
            content: None,
        })
    }

    /// Music card from a known platform (`qq`, `163`, `xm`).
    pub fn music(platform: impl Into<String>, id: impl Into<String>) -> Self {
        Segment::Music(MusicData {
            kind: platform.into(),
            id: Some(id.into()),
            ..Default::default()
        })
    }

    /// Forward node that re-posts an existing message.
    pub fn node(message_id: impl Into<String>) -> Self {
        Segment::Node(NodeData {
            id: Some(message_id.into()),
            ..Default::default()
        })
    }

    /// Forward node with custom sender and content.
    pub fn node_custom(user_id: i64, nickname: impl Into<String>, content: Message) -> Self {
        Segment::Node(NodeData {
            id: None,
            user_id: Some(user_id),
            nickname: Some(nickname.into()),
            content: Some(content),
        })
    }
}

// ============================================================================
// Payload Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    #[serde(with = "lenient::string")]
    pub id: i32,
}

/// Shared payload of image, record and video segments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaData {
    /// File name, path, URL or `base64://` payload.
    pub file: String,
    /// Download URL (receive only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `flash` for flash images.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Voice changer flag for records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Implementation-specific fields (`summary`, `file_size`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaData {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }
}

/// Who a mention points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtTarget {
    All,
    User(i64),
}

impl Serialize for AtTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AtTarget::All => serializer.serialize_str("all"),
            AtTarget::User(id) => serializer.collect_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for AtTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.as_str() == Some("all") {
            return Ok(AtTarget::All);
        }
        lenient::string::parse(value)
            .map(AtTarget::User)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    pub qq: AtTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeData {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnonymousData {
    /// Send normally if anonymity is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareData {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactData {
    /// `qq` or `group`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "lenient::string")]
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    #[serde(with = "lenient::string")]
    pub lat: f64,
    #[serde(with = "lenient::string")]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MusicData {
    /// `qq`, `163`, `xm` or `custom`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyData {
    #[serde(with = "lenient::string")]
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardData {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Id of an existing message to re-post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        with = "lenient::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Message>,
}

/// Payload of XML and JSON cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    pub data: String,
}

// ============================================================================
// CQ Code
// ============================================================================

impl Segment {
    /// Renders this segment in CQ-code string form.
    ///
    /// Text is escaped; everything else becomes `[CQ:kind,key=value,...]`.
    pub fn to_cq(&self) -> String {
        if let Segment::Text(d) = self {
            return escape_text(&d.text);
        }

        let raw = self.to_raw();
        let mut code = format!("[CQ:{}", raw.kind);
        for (key, value) in &raw.data {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            code.push(',');
            code.push_str(key);
            code.push('=');
            code.push_str(&escape_value(&value));
        }
        code.push(']');
        code
    }
}

/// Parses a CQ-code string into segments.
///
/// ```text
/// Hello [CQ:face,id=178] World [CQ:at,qq=10001000]
/// ```
pub fn parse_cq(input: &str) -> Vec<Segment> {
    const OPEN: &str = "[CQ:";

    let mut segments = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        match rest.find(OPEN) {
            Some(0) => {
                // Values are escaped, so the first `]` closes the code.
                let Some(end) = rest.find(']') else {
                    push_text(&mut segments, rest);
                    break;
                };
                segments.push(parse_code(&rest[OPEN.len()..end]));
                rest = &rest[end + 1..];
            }
            Some(start) => {
                push_text(&mut segments, &rest[..start]);
                rest = &rest[start..];
            }
            None => {
                push_text(&mut segments, rest);
                break;
            }
        }
    }

    segments
}

fn parse_code(body: &str) -> Segment {
    let mut parts = body.split(',');
    let kind = parts.next().unwrap_or_default().to_string();
    let data = parts
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.to_string(), Value::String(unescape(v))))
        .collect();
    Segment::from_raw(RawSegment { kind, data })
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        segments.push(Segment::text(unescape(text)));
    }
}

/// Escapes `&`, `[` and `]` in CQ text.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

/// Escapes CQ parameter values; like [`escape_text`] plus `,`.
pub fn escape_value(value: &str) -> String {
    escape_text(value).replace(',', "&#44;")
}

/// Reverses [`escape_value`] (and therefore [`escape_text`]).
pub fn unescape(text: &str) -> String {
    text.replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&#44;", ",")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_segment_serialize() {
        let json = serde_json::to_value(Segment::text("Hello")).unwrap();
        assert_eq!(json, json!({"type": "text", "data": {"text": "Hello"}}));

        let json = serde_json::to_value(Segment::at(10001000)).unwrap();
        assert_eq!(json, json!({"type": "at", "data": {"qq": "10001000"}}));

        let json = serde_json::to_value(Segment::reply(42)).unwrap();
        assert_eq!(json, json!({"type": "reply", "data": {"id": "42"}}));

        let json = serde_json::to_value(Segment::Dice).unwrap();
        assert_eq!(json, json!({"type": "dice", "data": {}}));
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let seg: Segment = serde_json::from_value(json!({"type": "at", "data": {"qq": 123}})).unwrap();
        assert_eq!(seg, Segment::at(123));

        let seg: Segment = serde_json::from_value(json!({"type": "at", "data": {"qq": "all"}})).unwrap();
        assert_eq!(seg, Segment::at_all());

        let seg: Segment =
            serde_json::from_value(json!({"type": "reply", "data": {"id": "-7"}})).unwrap();
        assert_eq!(seg, Segment::reply(-7));
    }

    #[test]
    fn test_unknown_kind_round_trips() {
        let raw = json!({"type": "markdown", "data": {"content": "**hi**", "v": 2}});
        let seg: Segment = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(&seg, Segment::Unknown(r) if r.kind == "markdown"));
        assert_eq!(seg.kind(), "markdown");
        assert_eq!(serde_json::to_value(&seg).unwrap(), raw);
    }

    #[test]
    fn test_malformed_known_kind_is_kept_raw() {
        let raw = json!({"type": "at", "data": {"qq": "nobody"}});
        let seg: Segment = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(seg, Segment::Unknown(_)));
        assert_eq!(serde_json::to_value(&seg).unwrap(), raw);
    }

    #[test]
    fn test_null_data_is_accepted() {
        let seg: Segment = serde_json::from_value(json!({"type": "shake", "data": null})).unwrap();
        assert_eq!(seg, Segment::Shake);
    }

    #[test]
    fn test_media_keeps_extra_fields() {
        let raw = json!({
            "type": "image",
            "data": {"file": "a.jpg", "url": "http://x/a.jpg", "summary": "[图片]"}
        });
        let seg: Segment = serde_json::from_value(raw.clone()).unwrap();
        match &seg {
            Segment::Image(media) => {
                assert_eq!(media.file, "a.jpg");
                assert_eq!(media.extra.get("summary"), Some(&json!("[图片]")));
            }
            other => panic!("unexpected segment {other:?}"),
        }
        assert_eq!(serde_json::to_value(&seg).unwrap(), raw);
    }

    #[test]
    fn test_cq_rendering() {
        assert_eq!(Segment::text("a [b]").to_cq(), "a &#91;b&#93;");
        assert_eq!(Segment::face(178).to_cq(), "[CQ:face,id=178]");
        assert_eq!(Segment::at(10001000).to_cq(), "[CQ:at,qq=10001000]");
        assert_eq!(Segment::at_all().to_cq(), "[CQ:at,qq=all]");
        assert_eq!(Segment::Rps.to_cq(), "[CQ:rps]");
    }

    #[test]
    fn test_parse_cq() {
        let segments = parse_cq("[CQ:reply,id=5][CQ:at,qq=10001000] 你好&#91;1&#93;[CQ:image,file=1.jpg]");
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment::reply(5));
        assert_eq!(segments[1], Segment::at(10001000));
        assert_eq!(segments[2], Segment::text(" 你好[1]"));
        assert_eq!(segments[3], Segment::image("1.jpg"));
    }

    #[test]
    fn test_parse_cq_unterminated_is_text() {
        let segments = parse_cq("hi [CQ:face,id=1");
        assert_eq!(
            segments,
            vec![Segment::text("hi "), Segment::text("[CQ:face,id=1")]
        );
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("a,b&c"), "a&#44;b&amp;c");
        assert_eq!(unescape("a&#44;b&amp;c"), "a,b&c");
    }
}
