//! Decoded entity model
//!
//! These types are what an [`EntityDecoder`](super::EntityDecoder) produces
//! for one framed record: an identifier plus an ordered list of typed
//! property values.

use chrono::NaiveDateTime;
use std::fmt;

/// Separator between kind and local id in the canonical form; never part of
/// a kind or a name
pub const KEY_SEPARATOR: char = '@';

/// Local part of an entity identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalId {
    /// Numeric id allocated by the datastore
    Id(i64),
    /// Application-assigned key name
    Name(String),
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalId::Id(id) => write!(f, "{}", id),
            LocalId::Name(name) => f.write_str(name),
        }
    }
}

/// Entity identifier: kind plus local id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: String,
    pub id: LocalId,
}

impl EntityKey {
    /// Key with a numeric id
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: LocalId::Id(id),
        }
    }

    /// Key with a string name
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: LocalId::Name(name.into()),
        }
    }
}

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Short string; may carry a flattened identifier
    String(String),
    /// Text or blob bytes, expected to be UTF-8 but not guaranteed
    Text(Vec<u8>),
    DateTime(NaiveDateTime),
    /// Reference to another entity
    Key(EntityKey),
}

/// One deserialized record
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntity {
    pub key: EntityKey,
    /// Properties in record order
    pub properties: Vec<(String, PropertyValue)>,
}

impl DecodedEntity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            properties: Vec::new(),
        }
    }

    /// Append a property (builder style)
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push((name.into(), value));
        self
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Property names in record order
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_lookup() {
        let entity = DecodedEntity::new(EntityKey::with_id("Foo", 1))
            .with_property("name", PropertyValue::String("a".into()))
            .with_property("age", PropertyValue::Integer(30));

        assert_eq!(entity.get("age"), Some(&PropertyValue::Integer(30)));
        assert_eq!(entity.get("missing"), None);
        assert_eq!(entity.property_names().collect::<Vec<_>>(), vec!["name", "age"]);
    }

    #[test]
    fn test_local_id_display() {
        assert_eq!(LocalId::Id(-4).to_string(), "-4");
        assert_eq!(LocalId::Name("bob".into()).to_string(), "bob");
    }
}
