//! Lenient deserialization helpers for page documents.
//!
//! A malformed entry drops out of its list (or turns an optional object into `None`) instead of
//! failing the whole document, and `null` scalars read as their defaults.
use serde::{Deserialize, Deserializer};

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(value) => {
                log::warn!(target: "pb_experience",
                           value:serde;
                           "skipping malformed entry in page document");
                None
            }
        }
    }
}

/// Deserialize a list, skipping entries that fail to parse. `null` or a non-list value reads
/// as an empty list.
pub(crate) fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Option<Option<Vec<TryParse<T>>>> =
        TryParse::<Option<Vec<TryParse<T>>>>::deserialize(deserializer)?.into();
    Ok(items
        .flatten()
        .unwrap_or_default()
        .into_iter()
        .filter_map(Option::from)
        .collect())
}

/// Deserialize an optional object, reading a malformed one as `None`.
pub(crate) fn none_if_invalid<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<TryParse<T>>::deserialize(deserializer)?.and_then(Option::from))
}

/// Deserialize a value, reading `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
