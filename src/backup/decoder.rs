//! JSON entity decoder
//!
//! Each framed record holds one JSON document:
//!
//! ```json
//! {
//!   "key": {"kind": "Foo", "id": 1},
//!   "properties": [
//!     {"name": "name", "type": "string", "value": "a"},
//!     {"name": "owner", "type": "key", "value": {"kind": "User", "name": "bob"}},
//!     {"name": "body", "type": "text", "value": "aGVsbG8="}
//!   ]
//! }
//! ```
//!
//! `text` values are base64 so they can carry bytes that are not valid UTF-8.
//! A JSON `null` value decodes to a null property whatever its type.

use super::types::{DecodedEntity, EntityKey, LocalId, PropertyValue, KEY_SEPARATOR};
use super::EntityDecoder;
use crate::error::{DecodeError, DecodeResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct WireEntity {
    key: WireKey,
    #[serde(default)]
    properties: Vec<WireProperty>,
}

#[derive(Debug, Deserialize)]
struct WireKey {
    kind: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireProperty {
    name: String,
    #[serde(rename = "type")]
    value_type: String,
    #[serde(default)]
    value: Value,
}

impl TryFrom<WireKey> for EntityKey {
    type Error = DecodeError;

    fn try_from(wire: WireKey) -> DecodeResult<Self> {
        if wire.kind.is_empty() || wire.kind.contains(KEY_SEPARATOR) {
            return Err(DecodeError::InvalidEntity(format!(
                "invalid kind '{}'",
                wire.kind
            )));
        }
        let id = match (wire.id, wire.name) {
            (Some(id), None) => LocalId::Id(id),
            (None, Some(name)) if !name.is_empty() && !name.contains(KEY_SEPARATOR) => {
                LocalId::Name(name)
            }
            _ => {
                return Err(DecodeError::InvalidEntity(format!(
                    "key of kind '{}' needs exactly one of id or name",
                    wire.kind
                )))
            }
        };
        Ok(EntityKey {
            kind: wire.kind,
            id,
        })
    }
}

/// Decodes records holding one JSON entity document each
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityDecoder;

impl EntityDecoder for JsonEntityDecoder {
    fn decode(&self, record: &[u8]) -> DecodeResult<DecodedEntity> {
        let wire: WireEntity = serde_json::from_slice(record)
            .map_err(|e| DecodeError::InvalidEntity(e.to_string()))?;

        let mut entity = DecodedEntity::new(EntityKey::try_from(wire.key)?);
        for property in wire.properties {
            let value = decode_value(&property.name, &property.value_type, property.value)?;
            entity.properties.push((property.name, value));
        }
        Ok(entity)
    }
}

fn decode_value(name: &str, value_type: &str, value: Value) -> DecodeResult<PropertyValue> {
    if value.is_null() {
        return Ok(PropertyValue::Null);
    }

    let invalid = || {
        DecodeError::InvalidEntity(format!(
            "property '{}' is not a valid {} value",
            name, value_type
        ))
    };

    match value_type {
        "null" => Ok(PropertyValue::Null),
        "boolean" => value.as_bool().map(PropertyValue::Boolean).ok_or_else(invalid),
        "integer" => value.as_i64().map(PropertyValue::Integer).ok_or_else(invalid),
        "float" => value.as_f64().map(PropertyValue::Float).ok_or_else(invalid),
        "string" => value
            .as_str()
            .map(|s| PropertyValue::String(s.to_owned()))
            .ok_or_else(invalid),
        "text" => {
            let encoded = value.as_str().ok_or_else(invalid)?;
            STANDARD
                .decode(encoded)
                .map(PropertyValue::Text)
                .map_err(|_| invalid())
        }
        "datetime" => value
            .as_str()
            .and_then(|s| s.parse::<NaiveDateTime>().ok())
            .map(PropertyValue::DateTime)
            .ok_or_else(invalid),
        "key" => {
            let wire: WireKey = serde_json::from_value(value).map_err(|_| invalid())?;
            Ok(PropertyValue::Key(EntityKey::try_from(wire)?))
        }
        other => Err(DecodeError::InvalidEntity(format!(
            "property '{}' has unknown type '{}'",
            name, other
        ))),
    }
}
