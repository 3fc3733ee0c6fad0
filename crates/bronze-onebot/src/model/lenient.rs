//! Serde helpers for fields that implementations send either as strings or
//! as numbers.
//!
//! OneBot v11 specifies segment data values as strings, but most
//! implementations emit ids as JSON numbers. These helpers accept both and
//! always write the string form.

/// `#[serde(with = "lenient::string")]` for `T: FromStr + Display`.
pub mod string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        parse(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }

    pub(crate) fn parse<T>(value: Value) -> Result<T, String>
    where
        T: FromStr,
        T::Err: Display,
    {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => return Err(format!("expected string or number, got {other}")),
        };
        text.trim().parse().map_err(|e: T::Err| e.to_string())
    }
}

/// Optional variant of [`string`].
pub mod option_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            value => super::string::parse(value)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}
