//! CSV cell encoding

use crate::backup::{DecodedEntity, PropertyValue};
use crate::error::KeyError;
use crate::export::key_codec::{encode_identifier, KeyCodec};
use crate::export::schema::Schema;
use std::borrow::Cow;
use std::collections::HashMap;

/// One output row: encoded identifier followed by one cell per schema column
pub type CsvRow = Vec<String>;

/// A cell that could not be encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellError {
    pub property: String,
    pub source: KeyError,
}

/// Encodes property values into CSV cells
#[derive(Debug, Clone)]
pub struct ValueEncoder {
    codec: KeyCodec,
}

impl ValueEncoder {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    /// Canonical cell text for one value
    ///
    /// Plain strings additionally go through identifier recovery; an
    /// unrecognized identifier layout is returned as an error, never
    /// written as-is.
    pub fn encode_for_csv(&self, value: &PropertyValue) -> Result<String, KeyError> {
        match value {
            PropertyValue::Null => Ok(String::new()),
            PropertyValue::String(s) => self
                .codec
                .recover_opaque_identifier_string(s)
                .map(Cow::into_owned),
            other => Ok(self.codec.canonicalize_value(other)),
        }
    }

    /// Build the row for one entity against a fixed schema
    ///
    /// Properties the entity lacks become empty cells. Properties missing
    /// from the schema are ignored.
    pub fn encode_row(
        &self,
        entity: &DecodedEntity,
        schema: &Schema,
    ) -> Result<CsvRow, CellError> {
        let mut values: HashMap<&str, &PropertyValue> =
            HashMap::with_capacity(entity.properties.len());
        for (name, value) in &entity.properties {
            values.entry(name.as_str()).or_insert(value);
        }

        let mut row = Vec::with_capacity(schema.len() + 1);
        row.push(encode_identifier(&entity.key));

        for column in schema.columns() {
            let cell = match values.get(column.as_str()) {
                Some(value) => self.encode_for_csv(value).map_err(|source| CellError {
                    property: column.clone(),
                    source,
                })?,
                None => String::new(),
            };
            row.push(cell);
        }

        Ok(row)
    }
}
