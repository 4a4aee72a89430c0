// src/metadata/files.rs

//! Editable view of `metadata/files.xml`
//!
//! ```xml
//! <files xmlns="http://easy.dans.knaw.nl/schemas/bag/metadata/files/"
//!        xmlns:dct="http://purl.org/dc/terms/">
//!   <file filepath="data/original/interview.wav">
//!     <dct:identifier>easy-file:1234</dct:identifier>
//!     <accessibleToRights>ANONYMOUS</accessibleToRights>
//!   </file>
//! </files>
//! ```
//!
//! Paths are compared as exact strings. Callers are expected to pass the
//! bag-relative form used in the document (`data/...`).

use super::ns;
use crate::error::{Error, Result};
use crate::xml::{Attribute, Element, Node, XmlDocument};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Location of the document inside a bag
pub const FILES_XML: &str = "metadata/files.xml";

const FILE: &str = "file";
const FILEPATH: &str = "filepath";
const ACCESSIBLE_TO_RIGHTS: &str = "accessibleToRights";

pub struct FilesXml {
    document: XmlDocument,
    path: Option<PathBuf>,
}

fn is_record(element: &Element) -> bool {
    element.local_name() == FILE
}

fn has_id(element: &Element, id: &str) -> bool {
    element
        .children_named(ns::DCTERMS, "identifier")
        .any(|e| e.text().trim() == id)
}

fn not_found(id: &str) -> Error {
    Error::NotFoundError(format!("No file with id {} found in files.xml", id))
}

impl FilesXml {
    /// Load the document; [`FilesXml::save`] writes back to the same path
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            document: XmlDocument::from_file(path)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse from a string, optionally bound to a path for saving
    pub fn parse(xml: &str, path: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            document: XmlDocument::parse(xml)?,
            path,
        })
    }

    fn records(&self) -> impl Iterator<Item = &Element> {
        self.document.root.elements().filter(|e| is_record(e))
    }

    fn record(&self, id: &str) -> Result<&Element> {
        self.records()
            .find(|e| has_id(e, id))
            .ok_or_else(|| not_found(id))
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut Element> {
        self.document
            .root
            .elements_mut()
            .find(|e| is_record(e) && has_id(e, id))
            .ok_or_else(|| not_found(id))
    }

    /// All file ids in document order
    pub fn file_ids(&self) -> Vec<String> {
        self.records()
            .flat_map(|e| e.children_named(ns::DCTERMS, "identifier"))
            .map(|e| e.text().trim().to_string())
            .collect()
    }

    pub fn path_for(&self, id: &str) -> Result<String> {
        self.record(id)?
            .attribute(FILEPATH)
            .map(str::to_string)
            .ok_or_else(|| Error::MissingField(format!("No filepath attribute for file with id {}", id)))
    }

    pub fn set_path_for(&mut self, id: &str, path: &str) -> Result<()> {
        self.record_mut(id)?.set_attribute(FILEPATH, path);
        Ok(())
    }

    pub fn accessibility_for(&self, id: &str) -> Result<String> {
        self.record(id)?
            .elements()
            .find(|e| e.local_name() == ACCESSIBLE_TO_RIGHTS)
            .map(|e| e.text().trim().to_string())
            .ok_or_else(|| {
                Error::MissingField(format!(
                    "No accessibleToRights element found for file with id {}",
                    id
                ))
            })
    }

    /// Append a record for `path` and return the identifier assigned to it
    pub fn add(&mut self, path: &str, accessibility: &str) -> String {
        let id = format!("urn:uuid:{}", Uuid::new_v4());
        let root = &mut self.document.root;

        let file_name = match root.declared_prefix(ns::FILES) {
            Some("") | None => FILE.to_string(),
            Some(prefix) => format!("{}:{}", prefix, FILE),
        };
        let file_ns = root.namespace.clone();
        let rights_name = match file_name.split_once(':') {
            Some((prefix, _)) => format!("{}:{}", prefix, ACCESSIBLE_TO_RIGHTS),
            None => ACCESSIBLE_TO_RIGHTS.to_string(),
        };

        let mut identifier = match root.declared_prefix(ns::DCTERMS) {
            Some(prefix) if !prefix.is_empty() => {
                Element::new(format!("{}:identifier", prefix), Some(ns::DCTERMS))
            }
            _ => {
                let mut e = Element::new("dct:identifier", Some(ns::DCTERMS));
                e.attributes.push(Attribute {
                    name: "xmlns:dct".to_string(),
                    namespace: None,
                    value: ns::DCTERMS.to_string(),
                });
                e
            }
        };
        identifier.set_text(id.clone());

        let mut rights = Element::new(rights_name, file_ns.as_deref());
        rights.set_text(accessibility);

        let mut record = Element::new(file_name, file_ns.as_deref());
        record.set_attribute(FILEPATH, path);
        record.push_element(identifier);
        record.push_element(rights);

        root.push_element(record);
        root.children.push(Node::Text("\n".to_string()));
        id
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        let children = &mut self.document.root.children;
        let index = children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if is_record(e) && has_id(e, id)))
            .ok_or_else(|| not_found(id))?;
        children.remove(index);
        // Drop the indentation that followed the record
        if matches!(children.get(index), Some(Node::Text(t)) if t.trim().is_empty()) {
            children.remove(index);
        }
        Ok(())
    }

    /// Remove the record with this path; returns false if there is none
    pub fn remove_by_path(&mut self, path: &str) -> bool {
        let id = self
            .records()
            .find(|e| e.attribute(FILEPATH) == Some(path))
            .and_then(|e| e.children_named(ns::DCTERMS, "identifier").next())
            .map(|e| e.text().trim().to_string());

        match id {
            Some(id) => self.remove(&id).is_ok(),
            None => {
                let children = &mut self.document.root.children;
                let before = children.len();
                children.retain(|node| {
                    !matches!(node, Node::Element(e) if is_record(e) && e.attribute(FILEPATH) == Some(path))
                });
                children.len() != before
            }
        }
    }

    /// Write the current state back to the document this index was loaded from
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| {
            Error::StateError("files.xml was not loaded from a file, nowhere to save".to_string())
        })?;
        self.document.write_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NAMESPACES: &str =
        r#"xmlns="http://easy.dans.knaw.nl/schemas/bag/metadata/files/" xmlns:dct="http://purl.org/dc/terms/""#;

    fn files_xml(records: &str) -> String {
        format!("<files {}>{}</files>", NAMESPACES, records)
    }

    fn two_files() -> FilesXml {
        FilesXml::parse(
            &files_xml(
                r#"
 <file filepath="data/file1.wav">
  <dct:identifier>easy-file:1</dct:identifier>
  <accessibleToRights>ANONYMOUS</accessibleToRights>
 </file>
 <file filepath="data/file2.txt">
  <dct:identifier>easy-file:2</dct:identifier>
 </file>
"#,
            ),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_file_ids_in_document_order() {
        assert_eq!(two_files().file_ids(), vec!["easy-file:1", "easy-file:2"]);
    }

    #[test]
    fn test_file_ids_empty() {
        let files = FilesXml::parse(&files_xml(""), None).unwrap();
        assert!(files.file_ids().is_empty());
    }

    #[test]
    fn test_path_for() {
        let files = two_files();
        assert_eq!(files.path_for("easy-file:2").unwrap(), "data/file2.txt");
        assert!(matches!(files.path_for("easy-file:3"), Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_set_path_for() {
        let mut files = two_files();
        files.set_path_for("easy-file:1", "data/file1.mp4").unwrap();
        assert_eq!(files.path_for("easy-file:1").unwrap(), "data/file1.mp4");
        assert!(matches!(
            files.set_path_for("easy-file:9", "data/x"),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_accessibility_for() {
        let files = two_files();
        assert_eq!(files.accessibility_for("easy-file:1").unwrap(), "ANONYMOUS");

        let err = files.accessibility_for("easy-file:2").unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
        assert_eq!(
            err.to_string(),
            "Missing field: No accessibleToRights element found for file with id easy-file:2"
        );

        assert!(matches!(
            files.accessibility_for("easy-file:3"),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut files = two_files();
        files.remove("easy-file:1").unwrap();
        assert_eq!(files.file_ids(), vec!["easy-file:2"]);

        let err = files.remove("easy-file:1").unwrap_err();
        assert_eq!(err.to_string(), "Not found: No file with id easy-file:1 found in files.xml");
    }

    #[test]
    fn test_remove_by_path() {
        let mut files = two_files();
        assert!(files.remove_by_path("data/file2.txt"));
        assert!(!files.remove_by_path("data/file2.txt"));
        assert!(!files.remove_by_path("data/other"));
        assert_eq!(files.file_ids(), vec!["easy-file:1"]);
    }

    #[test]
    fn test_add_then_save() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files.xml");
        std::fs::write(&path, files_xml("")).unwrap();

        let mut files = FilesXml::from_file(&path).unwrap();
        let id = files.add("data/file1.en.vtt", "RESTRICTED_REQUEST");
        assert!(id.starts_with("urn:uuid:"));
        files.save().unwrap();

        let reloaded = FilesXml::from_file(&path).unwrap();
        assert_eq!(reloaded.file_ids(), vec![id.clone()]);
        assert_eq!(reloaded.path_for(&id).unwrap(), "data/file1.en.vtt");
        assert_eq!(reloaded.accessibility_for(&id).unwrap(), "RESTRICTED_REQUEST");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(r#"<file filepath="data/file1.en.vtt">"#));
    }

    #[test]
    fn test_save_keeps_other_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files.xml");
        std::fs::write(
            &path,
            files_xml(
                r#"<file filepath="data/a.wav"><dct:identifier>easy-file:1</dct:identifier><dct:title>Interview</dct:title></file>"#,
            ),
        )
        .unwrap();

        let mut files = FilesXml::from_file(&path).unwrap();
        files.set_path_for("easy-file:1", "data/a.mp3").unwrap();
        files.save().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(r#"filepath="data/a.mp3""#));
        assert!(written.contains("<dct:title>Interview</dct:title>"));
    }

    #[test]
    fn test_save_without_path_fails() {
        assert!(matches!(two_files().save(), Err(Error::StateError(_))));
    }
}
