// src/bag/info.rs

//! `bag-info.txt`: ordered `Key: value` metadata
//!
//! Lines starting with whitespace continue the previous value. Keys may
//! repeat and keep their original order when written back.

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const BAG_INFO: &str = "bag-info.txt";

/// Reference to the bag this bag is a new version of (`urn:uuid:<bag parent>`)
pub const IS_VERSION_OF: &str = "Is-Version-Of";
/// Creation timestamp of this version
pub const CREATED: &str = "Created";
/// `<octet count>.<file count>` of the payload directory
pub const PAYLOAD_OXUM: &str = "Payload-Oxum";
/// Prefix of the persistent identifier keys (`Base-DOI`, `Base-URN`)
pub const BASE_PREFIX: &str = "Base-";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagInfo {
    entries: Vec<(String, String)>,
}

impl BagInfo {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with([' ', '\t']) {
                let (_, value) = entries.last_mut().ok_or_else(|| {
                    Error::ParseError(format!(
                        "{} line {}: continuation line without a key",
                        BAG_INFO,
                        number + 1
                    ))
                })?;
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                Error::ParseError(format!("{} line {}: expected 'Key: value'", BAG_INFO, number + 1))
            })?;
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(Self { entries })
    }

    /// Read `bag-info.txt` from a bag directory; a missing file is empty metadata
    pub fn read(bag_dir: &Path) -> Result<Self> {
        let path = bag_dir.join(BAG_INFO);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(&path).map_err(|e| Error::io("Failed to read", &path, e))?;
        Self::parse(&content)
    }

    pub fn write(&self, bag_dir: &Path) -> Result<()> {
        let path = bag_dir.join(BAG_INFO);
        fs::write(&path, self.render()).map_err(|e| Error::io("Failed to write", &path, e))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{}: {}", key, value);
        }
        out
    }

    /// First value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when `key` is present with a non-blank value
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Remove every entry for `key`
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Replace all values of `key` with a single one, keeping the position of
    /// the first existing entry
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = false;
                self.entries.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.add(key, value),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_continuation() {
        let info = BagInfo::parse(
            "Bagging-Date: 2024-01-01\nExternal-Description: first line\n  second line\nCreated: 2024-01-01T10:00:00+01:00\n",
        )
        .unwrap();

        assert_eq!(info.get("External-Description"), Some("first line second line"));
        assert_eq!(info.get(CREATED), Some("2024-01-01T10:00:00+01:00"));
        assert_eq!(info.get("Missing"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(BagInfo::parse("  orphan\n"), Err(Error::ParseError(_))));
        assert!(matches!(BagInfo::parse("no separator\n"), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_remove_and_add_keep_order() {
        let mut info = BagInfo::parse("A: 1\nIs-Version-Of: urn:uuid:old\nB: 2\n").unwrap();
        info.remove(IS_VERSION_OF);
        info.add(IS_VERSION_OF, "urn:uuid:new");
        assert_eq!(info.render(), "A: 1\nB: 2\nIs-Version-Of: urn:uuid:new\n");
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut info = BagInfo::parse("X: 1\nY: a\nX: 2\n").unwrap();
        info.set("X", "3");
        assert_eq!(info.render(), "X: 3\nY: a\n");
        info.set("Z", "new");
        assert_eq!(info.get("Z"), Some("new"));
    }

    #[test]
    fn test_has_value() {
        let info = BagInfo::parse("Base-DOI: 10.17026/x\nBase-URN:\n").unwrap();
        assert!(info.has_value("Base-DOI"));
        assert!(!info.has_value("Base-URN"));
        assert!(!info.has_value("Base-Other"));
    }
}
