//! Column schema inference
//!
//! Records of one table do not all carry the same properties. The schema is
//! the union of every property name seen, in first-seen order, computed by a
//! full scan before any row is written.

use crate::backup::DecodedEntity;
use std::collections::HashSet;

/// Name of the identifier column that precedes the schema columns
pub const ID_COLUMN: &str = "id";

/// Ordered, duplicate-free property names of a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    seen: HashSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entity's unseen property names; returns how many were added
    pub fn observe(&mut self, entity: &DecodedEntity) -> usize {
        let mut added = 0;
        for name in entity.property_names() {
            if !self.seen.contains(name) {
                self.seen.insert(name.to_string());
                self.columns.push(name.to_string());
                added += 1;
            }
        }
        added
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    /// Header row: `id` followed by the columns
    pub fn header(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ID_COLUMN).chain(self.columns.iter().map(String::as_str))
    }
}

/// Scan every record once and return the final schema
///
/// Stops at the first error from the record source.
pub fn infer_schema<I, E>(records: I) -> Result<Schema, E>
where
    I: IntoIterator<Item = Result<DecodedEntity, E>>,
{
    let mut schema = Schema::new();
    for record in records {
        schema.observe(&record?);
    }
    Ok(schema)
}
