// tests/common/mod.rs

//! Shared fixtures for integration tests: export roots with complete bags,
//! a media directory with assets and subtitles, and consistency checks.

#![allow(dead_code)]

use avexports::hash::{hash_bytes, verify_file};
use avexports::{Bag, FilesXml, HashAlgorithm, Manifest, ManifestKind, SourceMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const DOI: &str = "10.17026/dans-test";
pub const URN: &str = "urn:nbn:nl:ui:13-test";

/// Manifest algorithms of fixture bags
pub const ALGORITHMS: [HashAlgorithm; 2] = [HashAlgorithm::Md5, HashAlgorithm::Sha256];

/// One record in `files.xml` and its payload file
pub struct FileSpec {
    pub id: &'static str,
    pub path: &'static str,
    pub content: &'static [u8],
}

impl FileSpec {
    pub fn placeholder(id: &'static str, path: &'static str) -> Self {
        Self { id, path, content: b"" }
    }

    pub fn with_content(id: &'static str, path: &'static str, content: &'static [u8]) -> Self {
        Self { id, path, content }
    }
}

pub fn dataset_xml(dataset_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ddm:DDM xmlns:ddm="http://easy.dans.knaw.nl/schemas/md/ddm/" xmlns:dct="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <ddm:profile/>
  <ddm:dcmiMetadata>
    <dct:identifier xsi:type="id-type:EASY2">{}</dct:identifier>
    <dct:identifier xsi:type="id-type:DOI">{}</dct:identifier>
    <dct:identifier xsi:type="id-type:URN">{}</dct:identifier>
  </ddm:dcmiMetadata>
</ddm:DDM>
"#,
        dataset_id, DOI, URN
    )
}

pub fn files_xml(files: &[FileSpec]) -> String {
    let mut records = String::new();
    for file in files {
        records.push_str(&format!(
            "  <file filepath=\"{}\">\n    <dct:identifier>{}</dct:identifier>\n    <accessibleToRights>ANONYMOUS</accessibleToRights>\n  </file>\n",
            file.path, file.id
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<files xmlns=\"http://easy.dans.knaw.nl/schemas/bag/metadata/files/\" xmlns:dct=\"http://purl.org/dc/terms/\">\n{}</files>\n",
        records
    )
}

/// Write `<export_root>/<parent>/bag` with payload, metadata and manifests
/// carrying real checksums. `extra_info` is appended to `bag-info.txt`.
pub fn write_bag_parent(
    export_root: &Path,
    parent: &str,
    dataset_id: &str,
    files: &[FileSpec],
    extra_info: &str,
) -> PathBuf {
    let bag = export_root.join(parent).join("bag");
    fs::create_dir_all(bag.join("data")).unwrap();
    fs::create_dir_all(bag.join("metadata")).unwrap();

    let mut octets = 0;
    for file in files {
        let path = bag.join(file.path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, file.content).unwrap();
        octets += file.content.len();
    }
    fs::write(bag.join("metadata/dataset.xml"), dataset_xml(dataset_id)).unwrap();
    fs::write(bag.join("metadata/files.xml"), files_xml(files)).unwrap();
    fs::write(
        bag.join("bagit.txt"),
        "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n",
    )
    .unwrap();
    fs::write(
        bag.join("bag-info.txt"),
        format!(
            "Bagging-Date: 2020-06-01\nPayload-Oxum: {}.{}\n{}",
            octets,
            files.len(),
            extra_info
        ),
    )
    .unwrap();

    let mut tag_files = vec![
        "bagit.txt".to_string(),
        "bag-info.txt".to_string(),
        "metadata/dataset.xml".to_string(),
        "metadata/files.xml".to_string(),
    ];
    for algorithm in ALGORITHMS {
        let mut manifest = Manifest::new(ManifestKind::Payload, algorithm);
        for file in files {
            manifest.insert(file.path, hash_bytes(algorithm, file.content).value);
        }
        manifest.write(&bag).unwrap();
        tag_files.push(manifest.file_name());
    }
    for algorithm in ALGORITHMS {
        let mut manifest = Manifest::new(ManifestKind::Tag, algorithm);
        for name in &tag_files {
            manifest.insert(name.as_str(), checksum_of(&bag.join(name), algorithm));
        }
        manifest.write(&bag).unwrap();
    }

    export_root.join(parent)
}

/// Put an asset under `<media>/<user>/video/rawvideo/2/<name>`
pub fn write_asset(media_dir: &Path, user: &str, name: &str, content: &[u8]) -> PathBuf {
    let dir = media_dir.join(user).join("video/rawvideo/2");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
    dir.join(name)
}

/// Put a subtitle file where the resolver looks for subtitles of `user`'s assets
pub fn write_subtitle(media_dir: &Path, user: &str, name: &str, content: &[u8]) -> PathBuf {
    let dir = media_dir.join(user).join("video");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
    dir.join(name)
}

/// Source map from `(file id, dataset id, path relative to media_dir)` rows
pub fn source_map(media_dir: &Path, rows: &[(&str, &str, &str)]) -> SourceMap {
    let mut csv = String::from("easy_file_id,easy_dataset_id,path_in_springfield_dir\n");
    for (file_id, dataset_id, path) in rows {
        csv.push_str(&format!("{},{},{}\n", file_id, dataset_id, path));
    }
    SourceMap::from_reader(csv.as_bytes(), media_dir).unwrap()
}

pub fn checksum_of(path: &Path, algorithm: HashAlgorithm) -> String {
    hash_bytes(algorithm, &fs::read(path).unwrap()).value
}

/// Names of the directories directly under `dir`, sorted
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// `(file id, path)` of every record in the bag's `files.xml`
pub fn records(bag: &Path) -> Vec<(String, String)> {
    let files = FilesXml::from_file(&bag.join("metadata/files.xml")).unwrap();
    files
        .file_ids()
        .into_iter()
        .map(|id| {
            let path = files.path_for(&id).unwrap();
            (id, path)
        })
        .collect()
}

/// Check every property a converted bag must have:
/// - each record points at an existing non-empty file listed in every
///   payload manifest
/// - every manifest checksum matches the file on disk
/// - Payload-Oxum, when present, matches the payload
pub fn assert_bag_consistent(bag: &Path) {
    let opened = Bag::open(bag, &HashAlgorithm::ALL).unwrap();

    for (id, path) in records(bag) {
        let file = bag.join(&path);
        let size = fs::metadata(&file)
            .unwrap_or_else(|e| panic!("{} ({}): {}", path, id, e))
            .len();
        assert!(size > 0, "{} ({}) is empty", path, id);
        for manifest in opened.payload_manifests() {
            assert!(manifest.contains(&path), "{} missing from {}", path, manifest.file_name());
        }
    }

    for manifest in opened.payload_manifests().iter().chain(opened.tag_manifests()) {
        for (path, recorded) in manifest.entries() {
            let file = bag.join(path);
            assert!(file.exists(), "{} lists missing file {}", manifest.file_name(), path);
            if let Err(e) = verify_file(&file, recorded, manifest.algorithm()) {
                panic!("stale checksum for {} in {}: {}", path, manifest.file_name(), e);
            }
        }
    }

    if let Some(oxum) = opened.info().get("Payload-Oxum") {
        let mut octets = 0;
        let mut count = 0;
        for entry in walk_files(&bag.join("data")) {
            octets += fs::metadata(&entry).unwrap().len();
            count += 1;
        }
        assert_eq!(oxum, format!("{}.{}", octets, count));
    }
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !dir.exists() {
        return files;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(walk_files(&path));
        } else {
            files.push(path);
        }
    }
    files
}
