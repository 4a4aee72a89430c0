// src/versioning.rs

//! Derivation of a second bag version
//!
//! A dataset that receives AV substitutions keeps its exported bag as
//! version 1. The substitutions go into a copy, which records its lineage in
//! `bag-info.txt`:
//!
//! ```text
//! Is-Version-Of: urn:uuid:<bag parent name of version 1>
//! Created: 2024-03-01T14:02:11.123+01:00
//! Base-DOI: 10.17026/dans-xyz
//! Base-URN: urn:nbn:nl:ui:13-abc
//! ```
//!
//! The `Base-*` identifiers are taken from `dataset.xml` only when the bag
//! does not carry them yet.

use crate::bag::info::{BAG_INFO, BASE_PREFIX, CREATED, IS_VERSION_OF};
use crate::bag::{Bag, BagInfo};
use crate::error::{Error, Result};
use crate::exports::{DatasetGroup, bag_dir};
use crate::fsutil;
use crate::hash::HashAlgorithm;
use crate::metadata::DatasetXml;
use crate::metadata::dataset::{DATASET_XML, STABLE_ID_TYPES};
use chrono::{DateTime, Local, SecondsFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bag parent of version 2 of a dataset, created from version 1 if needed
///
/// The new bag parent is placed next to version 1 under a fresh UUID name.
/// An existing version 2 is returned as is.
pub fn ensure_version2(group: &DatasetGroup, algorithms: &[HashAlgorithm]) -> Result<PathBuf> {
    if let Some(existing) = group.version2() {
        debug!(
            "Dataset {} already has version 2 at {}",
            group.dataset_id(),
            existing.display()
        );
        return Ok(existing.to_path_buf());
    }

    let version1 = group.version1();
    let export_root = version1.parent().ok_or_else(|| {
        Error::StructuralError(format!("{} has no parent directory", version1.display()))
    })?;
    let version2 = export_root.join(Uuid::new_v4().to_string());

    info!(
        "Creating version 2 of dataset {} at {}",
        group.dataset_id(),
        version2.display()
    );
    if let Err(e) = fsutil::copy_dir_all(version1, &version2) {
        if let Err(cleanup) = fs::remove_dir_all(&version2) {
            warn!("Failed to remove partial copy {}: {}", version2.display(), cleanup);
        }
        return Err(e);
    }

    let predecessor = bag_parent_name(version1)?;
    let bag = bag_dir(&version2)?;
    let mut bag = Bag::open(&bag, algorithms)?;
    let dataset = DatasetXml::from_file(&bag.resolve(DATASET_XML))?;
    update_lineage(bag.info_mut(), predecessor, Local::now(), &dataset)?;

    bag.save_info()?;
    bag.upsert_tag_entries(&[BAG_INFO])?;
    bag.sync_manifest_of_manifests()?;
    bag.commit()?;

    Ok(version2)
}

fn bag_parent_name(bag_parent: &Path) -> Result<&str> {
    bag_parent
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::StructuralError(format!(
                "Bag parent {} has no usable name",
                bag_parent.display()
            ))
        })
}

/// Point `info` at its predecessor and fill in missing `Base-*` identifiers
pub fn update_lineage(
    info: &mut BagInfo,
    predecessor: &str,
    created: DateTime<Local>,
    dataset: &DatasetXml,
) -> Result<()> {
    info.remove(IS_VERSION_OF);
    info.add(IS_VERSION_OF, format!("urn:uuid:{}", predecessor));
    info.remove(CREATED);
    info.add(CREATED, created.to_rfc3339_opts(SecondsFormat::Millis, false));

    let missing: Vec<String> = STABLE_ID_TYPES
        .iter()
        .map(|id_type| format!("{}{}", BASE_PREFIX, id_type))
        .filter(|key| !info.has_value(key))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let identifiers = dataset.stable_identifiers()?;
    for key in missing {
        let value = identifiers
            .iter()
            .find(|(id_type, _)| format!("{}{}", BASE_PREFIX, id_type) == key)
            .map(|(_, value)| value.as_str());
        match value {
            Some(value) => info.set(&key, value),
            None => warn!("No value for {} found in {}", key, DATASET_XML),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::ExportGrouper;
    use crate::hash::hash_file;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const DATASET: &str = r#"<ddm:DDM xmlns:ddm="http://easy.dans.knaw.nl/schemas/md/ddm/" xmlns:dct="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <ddm:dcmiMetadata>
    <dct:identifier xsi:type="id-type:EASY2">easy-dataset:1</dct:identifier>
    <dct:identifier xsi:type="id-type:DOI">10.17026/dans-abc</dct:identifier>
    <dct:identifier xsi:type="id-type:URN">urn:nbn:nl:ui:13-xyz</dct:identifier>
  </ddm:dcmiMetadata>
</ddm:DDM>"#;

    fn created() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 14, 2, 11).unwrap()
    }

    #[test]
    fn test_update_lineage_fills_identifiers() {
        let dataset = DatasetXml::parse(DATASET).unwrap();
        let mut info =
            BagInfo::parse("Is-Version-Of: urn:uuid:older\nCreated: 2020-01-01T00:00:00+01:00\n").unwrap();

        update_lineage(&mut info, "parent-1", created(), &dataset).unwrap();

        assert_eq!(info.get(IS_VERSION_OF), Some("urn:uuid:parent-1"));
        assert_eq!(
            info.get(CREATED),
            Some(created().to_rfc3339_opts(SecondsFormat::Millis, false).as_str())
        );
        assert_eq!(info.get("Base-DOI"), Some("10.17026/dans-abc"));
        assert_eq!(info.get("Base-URN"), Some("urn:nbn:nl:ui:13-xyz"));
        assert_eq!(info.entries().filter(|(k, _)| *k == IS_VERSION_OF).count(), 1);
    }

    #[test]
    fn test_update_lineage_keeps_recorded_identifiers() {
        let dataset = DatasetXml::parse(DATASET).unwrap();
        let mut info = BagInfo::parse("Base-DOI: 10.17026/original\nBase-URN: urn:original\n").unwrap();

        update_lineage(&mut info, "parent-1", created(), &dataset).unwrap();

        assert_eq!(info.get("Base-DOI"), Some("10.17026/original"));
        assert_eq!(info.get("Base-URN"), Some("urn:original"));
    }

    #[test]
    fn test_update_lineage_conflicting_identifiers() {
        let dataset = DatasetXml::parse(&DATASET.replace(
            "</ddm:dcmiMetadata>",
            r#"<dct:identifier xsi:type="id-type:DOI">10.17026/other</dct:identifier></ddm:dcmiMetadata>"#,
        ))
        .unwrap();
        let mut info = BagInfo::default();

        assert!(matches!(
            update_lineage(&mut info, "p", created(), &dataset),
            Err(Error::MetadataError(_))
        ));
    }

    fn write_version1(root: &Path) -> PathBuf {
        let parent = root.join("v1-parent");
        let bag = parent.join("bag");
        fs::create_dir_all(bag.join("data")).unwrap();
        fs::create_dir_all(bag.join("metadata")).unwrap();
        fs::write(bag.join("data/a.txt"), "payload").unwrap();
        fs::write(bag.join(DATASET_XML), DATASET).unwrap();
        fs::write(bag.join(BAG_INFO), "Created: 2020-01-01T00:00:00+01:00\n").unwrap();

        let algorithm = HashAlgorithm::Sha256;
        let data = hash_file(algorithm, &bag.join("data/a.txt")).unwrap();
        fs::write(bag.join("manifest-sha256.txt"), format!("{}  data/a.txt\n", data)).unwrap();
        let mut tags = String::new();
        for name in ["manifest-sha256.txt", BAG_INFO, DATASET_XML] {
            tags.push_str(&format!("{}  {}\n", hash_file(algorithm, &bag.join(name)).unwrap(), name));
        }
        fs::write(bag.join("tagmanifest-sha256.txt"), tags).unwrap();
        parent
    }

    #[test]
    fn test_ensure_version2_copies_and_records_lineage() {
        let temp = TempDir::new().unwrap();
        let v1 = write_version1(temp.path());
        let exports = ExportGrouper::scan(temp.path()).unwrap();
        let group = exports.group("easy-dataset:1").unwrap();

        let v2 = ensure_version2(group, &HashAlgorithm::ALL).unwrap();

        assert_ne!(v2, v1);
        assert_eq!(v2.parent(), v1.parent());
        let info = BagInfo::read(&v2.join("bag")).unwrap();
        assert_eq!(info.get(IS_VERSION_OF), Some("urn:uuid:v1-parent"));
        assert_eq!(info.get("Base-DOI"), Some("10.17026/dans-abc"));

        // version 1 is untouched
        let v1_info = BagInfo::read(&v1.join("bag")).unwrap();
        assert_eq!(v1_info.get(IS_VERSION_OF), None);

        // the new bag-info.txt is covered by the tag manifest
        let bag = Bag::open(&v2.join("bag"), &HashAlgorithm::ALL).unwrap();
        let tag = &bag.tag_manifests()[0];
        let actual = hash_file(tag.algorithm(), &v2.join("bag").join(BAG_INFO)).unwrap();
        assert_eq!(tag.get(BAG_INFO), Some(actual.value.as_str()));
    }

    #[test]
    fn test_ensure_version2_returns_existing() {
        let temp = TempDir::new().unwrap();
        write_version1(temp.path());
        let exports = ExportGrouper::scan(temp.path()).unwrap();
        let group = exports.group("easy-dataset:1").unwrap();
        let v2 = ensure_version2(group, &HashAlgorithm::ALL).unwrap();

        let exports = ExportGrouper::scan(temp.path()).unwrap();
        let group = exports.group("easy-dataset:1").unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(ensure_version2(group, &HashAlgorithm::ALL).unwrap(), v2);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
    }
}
