//! Lenient field decoders for factory configurations.
//!
//! Definition arguments always arrive as strings, while configurations loaded
//! from a table may carry native TOML numbers and booleans. These decoders
//! accept either.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Repr<T> {
    Text(String),
    Native(T),
}

/// Decode `T` from its string form or its native form.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match Repr::<T>::deserialize(deserializer)? {
        Repr::Text(text) => text.trim().parse().map_err(de::Error::custom),
        Repr::Native(value) => Ok(value),
    }
}

/// Like [`lenient`], with `null` and the empty string decoding to `None`.
pub fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match Option::<Repr<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Repr::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
        Some(Repr::Native(value)) => Ok(Some(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, serde::Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "lenient")]
        count: u32,
        #[serde(default, deserialize_with = "lenient_option")]
        flag: Option<bool>,
    }

    #[test]
    fn accepts_strings_and_natives() {
        let p: Probe = serde_json::from_value(json!({"count": "7", "flag": "true"})).unwrap();
        assert_eq!(p.count, 7);
        assert_eq!(p.flag, Some(true));

        let p: Probe = serde_json::from_value(json!({"count": 7, "flag": null})).unwrap();
        assert_eq!(p.count, 7);
        assert_eq!(p.flag, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_value::<Probe>(json!({"count": "seven"})).is_err());
    }
}
