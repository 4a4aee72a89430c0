// src/metadata/dataset.rs

//! Lookups in `metadata/dataset.xml`
//!
//! Identifiers live in `/ddm:DDM/ddm:dcmiMetadata/dct:identifier` and are
//! told apart by their `xsi:type` attribute (`id-type:EASY2`, `id-type:DOI`,
//! `id-type:URN`, ...).

use super::ns;
use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};
use std::path::Path;

/// Location of the document inside a bag
pub const DATASET_XML: &str = "metadata/dataset.xml";

/// Identifier type carrying the EASY dataset id
pub const DATASET_ID_TYPE: &str = "EASY2";

/// Identifier types copied into version lineage metadata
pub const STABLE_ID_TYPES: [&str; 2] = ["DOI", "URN"];

pub struct DatasetXml {
    document: XmlDocument,
}

impl DatasetXml {
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            document: XmlDocument::from_file(path)?,
        })
    }

    pub fn parse(xml: &str) -> Result<Self> {
        Ok(Self {
            document: XmlDocument::parse(xml)?,
        })
    }

    fn identifiers(&self) -> impl Iterator<Item = &Element> {
        let root = &self.document.root;
        let is_ddm = root.is(ns::DDM, "DDM");
        root.children_named(ns::DDM, "dcmiMetadata")
            .filter(move |_| is_ddm)
            .flat_map(|dcmi| dcmi.children_named(ns::DCTERMS, "identifier"))
    }

    /// Values of all `dct:identifier` elements typed `id-type:<id_type>`
    pub fn identifiers_of_type(&self, id_type: &str) -> Vec<String> {
        let wanted = format!("id-type:{}", id_type);
        self.identifiers()
            .filter(|e| e.attribute_ns(ns::XSI, "type") == Some(wanted.as_str()))
            .map(|e| e.text().trim().to_string())
            .collect()
    }

    /// The EASY dataset id; exactly one must be present
    pub fn dataset_id(&self) -> Result<String> {
        let ids = self.identifiers_of_type(DATASET_ID_TYPE);
        match ids.as_slice() {
            [] => Err(Error::MissingField("No dataset id found in dataset.xml".to_string())),
            [id] if id.is_empty() => {
                Err(Error::MetadataError("Empty dataset id in dataset.xml".to_string()))
            }
            [id] => Ok(id.clone()),
            _ => Err(Error::MetadataError(format!(
                "Multiple dataset ids found in dataset.xml: {}",
                ids.join(", ")
            ))),
        }
    }

    /// Persistent identifiers as `(type, value)` pairs, in [`STABLE_ID_TYPES`]
    /// order. Types that are absent are skipped; a type that occurs with
    /// conflicting or empty values is an error.
    pub fn stable_identifiers(&self) -> Result<Vec<(String, String)>> {
        let mut found = Vec::new();
        for id_type in STABLE_ID_TYPES {
            let mut values = self.identifiers_of_type(id_type);
            values.sort();
            values.dedup();
            match values.as_slice() {
                [] => {}
                [value] if value.is_empty() => {
                    return Err(Error::MetadataError(format!(
                        "Empty {} identifier in dataset.xml",
                        id_type
                    )));
                }
                [value] => found.push((id_type.to_string(), value.clone())),
                _ => {
                    return Err(Error::MetadataError(format!(
                        "Conflicting {} identifiers in dataset.xml: {}",
                        id_type,
                        values.join(", ")
                    )));
                }
            }
        }
        Ok(found)
    }
}
