//! Decoding of auth API payloads.
//!
//! Field shapes drift between endpoints: the same value can arrive as a
//! string, a number, or wrapped in an object, under camelCase or snake_case
//! names, and sometimes inside a `{ "data": ... }` envelope. Everything is
//! normalized here so the session only ever sees [`LinkCode`] and
//! [`AccountLink`].
//!
//! Alternate field names are tried in a fixed priority order. The first
//! non-null key wins and the rest are ignored, so a row carrying both its
//! own `id` and an `externalId` still decodes.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{LinkError, Result};

use super::{AccountLink, LinkCode, LinkStatusReport};

const WRAPPED_KEYS: &[&str] = &["value", "code", "name", "id"];
const CODE_KEYS: &[&str] = &["linkCode", "link_code", "code"];
const EXPIRES_KEYS: &[&str] = &["expiresIn", "expires_in"];
const LIST_KEYS: &[&str] = &["links", "accounts"];
const PLATFORM_KEYS: &[&str] = &["platform", "type", "provider"];
const EXTERNAL_ID_KEYS: &[&str] = &["externalId", "external_id", "uuid", "id"];
const USERNAME_KEYS: &[&str] = &["platformUsername", "platform_username", "username"];

/// A scalar the API may send as text, a number, or a wrapping object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Wrapped(WrappedValue),
}

/// `{ "value": ... }` style wrapper around a [`LooseValue`].
///
/// The inner value is taken from `value`, `code`, `name` or `id`, in that
/// order.
#[derive(Debug, Clone)]
pub struct WrappedValue {
    value: Box<LooseValue>,
}

impl<'de> Deserialize<'de> for WrappedValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut object = Map::<String, Value>::deserialize(deserializer)?;
        let inner = take_first(&mut object, WRAPPED_KEYS)
            .ok_or_else(|| de::Error::custom("object has no value, code, name or id"))?;
        let value = LooseValue::deserialize(inner).map_err(de::Error::custom)?;
        Ok(Self {
            value: Box::new(value),
        })
    }
}

impl LooseValue {
    /// Flatten to a trimmed string. Empty values become `None`.
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            LooseValue::Text(s) => s.trim().to_string(),
            LooseValue::Unsigned(n) => n.to_string(),
            LooseValue::Signed(n) => n.to_string(),
            LooseValue::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{f:.0}"),
            LooseValue::Float(f) => f.to_string(),
            LooseValue::Wrapped(w) => return w.value.into_text(),
        };
        if text.is_empty() { None } else { Some(text) }
    }

    /// Interpret as a whole number of seconds.
    pub fn into_seconds(self) -> Option<u64> {
        match self {
            LooseValue::Unsigned(n) => Some(n),
            LooseValue::Signed(n) => u64::try_from(n).ok(),
            LooseValue::Float(f) if f.is_finite() && f >= 0.0 => Some(f as u64),
            LooseValue::Float(_) => None,
            LooseValue::Text(s) => s.trim().parse().ok(),
            LooseValue::Wrapped(w) => w.value.into_seconds(),
        }
    }
}

/// Remove and return the first non-null value among `keys`.
fn take_first(object: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| object.remove(*key))
        .find(|value| !value.is_null())
}

/// Like [`take_first`], decoded as a [`LooseValue`].
fn take_loose(object: &mut Map<String, Value>, keys: &[&str]) -> Option<LooseValue> {
    let value = take_first(object, keys)?;
    match LooseValue::deserialize(value) {
        Ok(loose) => Some(loose),
        Err(e) => {
            tracing::debug!("ignoring {} field: {e}", keys.join("/"));
            None
        }
    }
}

fn has_any(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| object.get(*key).is_some_and(|value| !value.is_null()))
}

/// Decode the body of a code-generation response.
pub fn decode_link_code(body: Value) -> Result<LinkCode> {
    let Value::Object(mut object) = body else {
        return Err(LinkError::Decode(
            "link code response is not an object".to_string(),
        ));
    };
    if !has_any(&object, CODE_KEYS)
        && let Some(Value::Object(data)) = object.remove("data")
    {
        object = data;
    }

    let code_value = take_first(&mut object, CODE_KEYS)
        .ok_or_else(|| LinkError::Decode("link code response has no code".to_string()))?;
    let code = LooseValue::deserialize(code_value)
        .map_err(|e| LinkError::Decode(format!("link code response: {e}")))?
        .into_text()
        .ok_or_else(|| LinkError::Decode("link code response has an empty code".to_string()))?;
    let expires_in = take_loose(&mut object, EXPIRES_KEYS)
        .and_then(LooseValue::into_seconds)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(LinkCode { code, expires_in })
}

/// Decode the body of a link-status response.
///
/// Entries without a usable platform tag are skipped rather than failing
/// the whole report.
pub fn decode_link_status(body: Value) -> Result<LinkStatusReport> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match take_first(&mut object, LIST_KEYS) {
            Some(list) => list_entries(list)?,
            None => match object.remove("data") {
                Some(Value::Array(entries)) => entries,
                Some(Value::Object(mut data)) => match take_first(&mut data, LIST_KEYS) {
                    Some(list) => list_entries(list)?,
                    None => Vec::new(),
                },
                _ => Vec::new(),
            },
        },
        other => {
            return Err(LinkError::Decode(format!(
                "link status response is not a list or object: {other}"
            )));
        }
    };

    let links = entries.into_iter().filter_map(decode_link).collect();
    Ok(LinkStatusReport { links })
}

fn list_entries(list: Value) -> Result<Vec<Value>> {
    match list {
        Value::Array(entries) => Ok(entries),
        other => Err(LinkError::Decode(format!(
            "link status response has a non-list links field: {other}"
        ))),
    }
}

fn decode_link(entry: Value) -> Option<AccountLink> {
    let Value::Object(mut object) = entry else {
        tracing::debug!("skipping link entry that is not an object");
        return None;
    };
    let Some(platform) = take_loose(&mut object, PLATFORM_KEYS).and_then(LooseValue::into_text)
    else {
        tracing::debug!("skipping link entry without a platform tag");
        return None;
    };
    Some(AccountLink {
        platform,
        external_id: take_loose(&mut object, EXTERNAL_ID_KEYS)
            .and_then(LooseValue::into_text)
            .unwrap_or_default(),
        platform_username: take_loose(&mut object, USERNAME_KEYS).and_then(LooseValue::into_text),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_code_camel_case() {
        let code = decode_link_code(json!({ "linkCode": "ABCD1234" })).unwrap();
        assert_eq!(code.code, "ABCD1234");
        assert_eq!(code.expires_in, None);
    }

    #[test]
    fn test_code_snake_case_with_expiry() {
        let code = decode_link_code(json!({ "link_code": "ABCD1234", "expires_in": 300 })).unwrap();
        assert_eq!(code.code, "ABCD1234");
        assert_eq!(code.expires_in, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_code_numeric_value() {
        let code = decode_link_code(json!({ "code": 48213907 })).unwrap();
        assert_eq!(code.code, "48213907");
    }

    #[test]
    fn test_code_wrapped_in_object_and_data() {
        let code = decode_link_code(json!({
            "data": { "linkCode": { "value": "ABCD1234" }, "expiresIn": "120" }
        }))
        .unwrap();
        assert_eq!(code.code, "ABCD1234");
        assert_eq!(code.expires_in, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_code_empty_is_error() {
        assert!(decode_link_code(json!({ "linkCode": "   " })).is_err());
        assert!(decode_link_code(json!({ "message": "ok" })).is_err());
        assert!(decode_link_code(json!("ABCD1234")).is_err());
    }

    #[test]
    fn test_links_camel_case() {
        let report = decode_link_status(json!({
            "links": [
                { "platform": "steam", "externalId": "76561198000000000" },
                { "platform": "mc", "externalId": "069a79f4", "platformUsername": "Notch" }
            ]
        }))
        .unwrap();
        assert_eq!(report.links.len(), 2);
        let mc = report.find(&Platform::Minecraft).unwrap();
        assert_eq!(mc.external_id, "069a79f4");
        assert_eq!(mc.platform_username.as_deref(), Some("Notch"));
    }

    #[test]
    fn test_links_snake_case_accounts_alias() {
        let report = decode_link_status(json!({
            "accounts": [
                { "type": "Minecraft", "external_id": 12345, "platform_username": "alex" }
            ]
        }))
        .unwrap();
        assert_eq!(report.links[0].platform, "Minecraft");
        assert_eq!(report.links[0].external_id, "12345");
    }

    #[test]
    fn test_links_bare_array_and_data_envelope() {
        let bare = decode_link_status(json!([{ "platform": "discord", "id": "42" }])).unwrap();
        assert_eq!(bare.links.len(), 1);

        let wrapped = decode_link_status(json!({
            "data": { "links": [{ "provider": { "name": "MC" }, "uuid": "abc" }] }
        }))
        .unwrap();
        assert_eq!(wrapped.links[0].platform, "MC");
        assert!(wrapped.is_linked(&Platform::Minecraft));

        let wrapped_list = decode_link_status(json!({ "data": [{ "platform": "steam" }] })).unwrap();
        assert!(wrapped_list.is_linked(&Platform::Steam));
    }

    #[test]
    fn test_links_skip_entries_without_platform() {
        let report = decode_link_status(json!({
            "links": [
                { "externalId": "orphan" },
                { "platform": "", "externalId": "blank" },
                "not an object",
                { "platform": "mc", "externalId": "kept" }
            ]
        }))
        .unwrap();
        assert_eq!(report.links.len(), 1);
        assert_eq!(report.links[0].external_id, "kept");
    }

    #[test]
    fn test_links_null_or_missing_is_empty() {
        assert!(decode_link_status(json!({ "links": null })).unwrap().links.is_empty());
        assert!(decode_link_status(json!({})).unwrap().links.is_empty());
    }

    #[test]
    fn test_links_scalar_body_is_error() {
        assert!(decode_link_status(json!("nope")).is_err());
        assert!(decode_link_status(json!(42)).is_err());
    }

    #[test]
    fn test_links_row_id_does_not_shadow_external_id() {
        let report = decode_link_status(json!({
            "links": [{ "id": 17, "platform": "mc", "externalId": "069a79f4" }]
        }))
        .unwrap();
        assert!(report.is_linked(&Platform::Minecraft));
        assert_eq!(report.links[0].external_id, "069a79f4");

        let report = decode_link_status(json!([{ "id": 17, "platform": "steam" }])).unwrap();
        assert_eq!(report.links[0].external_id, "17");
    }

    #[test]
    fn test_links_prefer_platform_username_over_username() {
        let report = decode_link_status(json!({
            "links": [{
                "platform": "minecraft",
                "externalId": "069a79f4",
                "username": "account-holder",
                "platformUsername": "Notch"
            }]
        }))
        .unwrap();
        assert_eq!(report.links[0].platform_username.as_deref(), Some("Notch"));
    }

    #[test]
    fn test_links_null_preferred_key_falls_through() {
        let report = decode_link_status(json!({
            "links": [{ "platform": null, "type": "discord", "externalId": null, "id": 99 }]
        }))
        .unwrap();
        assert!(report.is_linked(&Platform::Discord));
        assert_eq!(report.links[0].external_id, "99");
    }

    #[test]
    fn test_provider_object_with_id_and_name() {
        let report = decode_link_status(json!({
            "links": [{ "provider": { "id": 3, "name": "minecraft" }, "uuid": "abc" }]
        }))
        .unwrap();
        assert_eq!(report.links[0].platform, "minecraft");
        assert!(report.is_linked(&Platform::Minecraft));
    }

    #[test]
    fn test_code_prefers_link_code_over_code() {
        let code = decode_link_code(json!({
            "linkCode": "ABCD1234",
            "code": "LINK_CODE_CREATED",
            "expiresIn": 300
        }))
        .unwrap();
        assert_eq!(code.code, "ABCD1234");
        assert_eq!(code.expires_in, Some(Duration::from_secs(300)));

        let code = decode_link_code(json!({ "linkCode": { "id": 5, "code": "QWERTY12" } })).unwrap();
        assert_eq!(code.code, "QWERTY12");
    }

    #[test]
    fn test_loose_value_float_formatting() {
        let value: LooseValue = serde_json::from_value(json!(1234.0)).unwrap();
        assert_eq!(value.into_text().as_deref(), Some("1234"));
    }
}
