use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Fresh primary key for a stored row.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode the `tokens_json` column, ignoring anything that is not a list of
/// strings.
pub fn parse_tokens(tokens_json: Option<&str>) -> Vec<String> {
    let Some(raw) = tokens_json else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed stored tokens");
            Vec::new()
        }
    }
}

pub fn encode_tokens(tokens: &[String]) -> String {
    serde_json::Value::from(tokens.to_vec()).to_string()
}

/// Accepts `true`/`false` as well as the `0`/`1` integers older backups use.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "expected 0 or 1, got {other}"
        ))),
    }
}

/// Like [`flag`] for optional patch fields.
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    flag(deserializer).map(Some)
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
