//! Table discovery
//!
//! A backup is a directory tree in which every table's record files live
//! under a purely numeric shard directory named after the table:
//!
//! ```text
//! backup/
//!   Foo/
//!     1234/
//!       output-0
//!       output-1
//!   Bar/
//!     1234/
//!       output-0
//!   backup.overall_export_metadata_info
//! ```
//!
//! Files whose name ends in `info` are metadata and never records. Shard
//! directories of the same table are merged into one unit.

use crate::error::DiscoveryError;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// Suffix of metadata files that carry no records
const METADATA_SUFFIX: &str = "info";

/// All record files of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUnit {
    /// Table name, also the output file stem
    pub name: String,

    /// Record files, sorted
    pub files: Vec<PathBuf>,
}

/// Walk `root` and group every record file by table
///
/// Tables come back sorted by name. A directory holding record files whose
/// path yields no table name aborts discovery. Only segments from the root's
/// own name downwards are considered.
pub fn discover_tables(root: &Path) -> Result<Vec<TableUnit>, DiscoveryError> {
    // Table names resolve below the root's parent
    let base = root.parent().unwrap_or(root);

    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|e| DiscoveryError::ReadDir {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(METADATA_SUFFIX) {
            trace!(path = %entry.path().display(), "Skipping metadata file");
            continue;
        }

        let dir = entry.path().parent().unwrap_or(root).to_path_buf();
        by_dir.entry(dir).or_default().push(entry.into_path());
    }

    let mut tables: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (dir, files) in by_dir {
        let relative = dir.strip_prefix(base).unwrap_or(dir.as_path());
        let table = table_name_from_path(relative)
            .ok_or_else(|| DiscoveryError::NoTableName { path: dir.clone() })?;
        debug!(table = %table, dir = %dir.display(), files = files.len(), "Found record files");
        tables.entry(table).or_default().extend(files);
    }

    Ok(tables
        .into_iter()
        .map(|(name, mut files)| {
            files.sort();
            TableUnit { name, files }
        })
        .collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    let hidden = entry.file_name().to_string_lossy().starts_with('.');
    if hidden {
        trace!(path = %entry.path().display(), "Skipping hidden entry");
    }
    hidden
}

/// Table name of a shard directory: the segment directly before a purely
/// numeric segment, taking the innermost such pair
pub fn table_name_from_path(path: &Path) -> Option<String> {
    let segments: Vec<&str> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect();

    segments
        .windows(2)
        .rev()
        .find(|pair| is_table_segment(pair[0]) && is_shard_segment(pair[1]))
        .map(|pair| pair[0].to_string())
}

fn is_table_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_shard_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_table_name_from_path() {
        assert_eq!(
            table_name_from_path(Path::new("/backup/Foo/1234")),
            Some("Foo".to_string())
        );
        assert_eq!(
            table_name_from_path(Path::new("backup/User_Profile/7")),
            Some("User_Profile".to_string())
        );
        // Innermost pair wins
        assert_eq!(
            table_name_from_path(Path::new("/data/2024/exports/Bar/99")),
            Some("Bar".to_string())
        );
    }

    #[test]
    fn test_table_name_missing() {
        assert_eq!(table_name_from_path(Path::new("/backup/misc")), None);
        assert_eq!(table_name_from_path(Path::new("/backup/Foo/12a")), None);
        assert_eq!(table_name_from_path(Path::new("/backup/foo-bar/12")), None);
        assert_eq!(table_name_from_path(Path::new("/123")), None);
    }

    #[test]
    fn test_discover_groups_and_skips_metadata() {
        let root = tempdir().unwrap();
        touch(&root.path().join("Foo/100/output-1"));
        touch(&root.path().join("Foo/100/output-0"));
        touch(&root.path().join("Bar/100/output-0"));
        touch(&root.path().join("Bar/100/Bar.export_info"));
        touch(&root.path().join("backup.overall_export_metadata_info"));
        touch(&root.path().join("Foo/100/.DS_Store"));

        let tables = discover_tables(root.path()).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bar", "Foo"]);

        assert_eq!(tables[0].files, vec![root.path().join("Bar/100/output-0")]);
        assert_eq!(
            tables[1].files,
            vec![
                root.path().join("Foo/100/output-0"),
                root.path().join("Foo/100/output-1"),
            ]
        );
    }

    #[test]
    fn test_discover_merges_shards() {
        let root = tempdir().unwrap();
        touch(&root.path().join("Foo/1/output-0"));
        touch(&root.path().join("Foo/2/output-0"));

        let tables = discover_tables(root.path()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].files.len(), 2);
    }

    #[test]
    fn test_discover_unnamed_directory_fails() {
        let root = tempdir().unwrap();
        touch(&root.path().join("misc/output-0"));

        match discover_tables(root.path()) {
            Err(DiscoveryError::NoTableName { path }) => {
                assert_eq!(path, root.path().join("misc"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_discover_root_is_table_directory() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("Foo");
        touch(&root.join("42/output-0"));

        let tables = discover_tables(&root).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Foo");
    }

    #[test]
    fn test_discover_skips_hidden_directories() {
        let root = tempdir().unwrap();
        touch(&root.path().join("Foo/1/output-0"));
        touch(&root.path().join(".cache/Bar/1/output-0"));
        touch(&root.path().join("Foo/.partial/output-0"));

        let tables = discover_tables(root.path()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Foo");
        assert_eq!(tables[0].files, vec![root.path().join("Foo/1/output-0")]);
    }

    #[test]
    fn test_discover_empty_root() {
        let root = tempdir().unwrap();
        assert!(discover_tables(root.path()).unwrap().is_empty());
    }

    #[test]
    fn test_discover_missing_root() {
        let root = tempdir().unwrap();
        let err = discover_tables(&root.path().join("absent")).unwrap_err();
        assert!(matches!(err, DiscoveryError::ReadDir { .. }));
    }
}
