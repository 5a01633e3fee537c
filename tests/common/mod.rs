//! Shared fixtures: backup trees built from JSON entity documents

#![allow(dead_code)]

use datastore_csv::backup::RecordWriter;
use std::path::{Path, PathBuf};

/// Write `docs` as framed records to `<root>/<table>/<shard>/output-<n>`
pub fn write_shard(root: &Path, table: &str, shard: u32, file: u32, docs: &[String]) -> PathBuf {
    let dir = root.join(table).join(shard.to_string());
    std::fs::create_dir_all(&dir).unwrap();

    let path = dir.join(format!("output-{}", file));
    let mut writer = RecordWriter::create(&path).unwrap();
    for doc in docs {
        writer.write_record(doc.as_bytes()).unwrap();
    }
    writer.into_inner().unwrap();
    path
}

/// Metadata file that discovery must skip
pub fn write_metadata(root: &Path, table: &str, shard: u32) {
    let dir = root.join(table).join(shard.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.export_info", table)), b"not a record").unwrap();
}

/// Entity document with an integer id
pub fn entity(kind: &str, id: i64, properties: &[(&str, &str, &str)]) -> String {
    let properties: Vec<String> = properties
        .iter()
        .map(|(name, ty, value)| {
            format!(r#"{{"name": "{}", "type": "{}", "value": {}}}"#, name, ty, value)
        })
        .collect();
    format!(
        r#"{{"key": {{"kind": "{}", "id": {}}}, "properties": [{}]}}"#,
        kind,
        id,
        properties.join(", ")
    )
}

pub fn read_csv(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
