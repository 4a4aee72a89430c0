// src/xml.rs

//! Minimal namespace-aware XML element tree
//!
//! The metadata documents inside a bag are small, so they are read completely
//! into memory, edited as a tree and written back as a whole. Element and
//! attribute names keep the prefix they were written with, and each element
//! also records the namespace URI the prefix resolved to, so lookups can
//! match on `(namespace, local name)` regardless of the prefixes a producer
//! chose.
//!
//! Text, CDATA and comments are preserved. Processing instructions and the
//! doctype are dropped; the XML declaration is always rewritten as UTF-8.

use crate::error::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub root: Element,
}

/// Child node of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Qualified name as written (e.g. `xsi:type`)
    pub name: String,
    /// Resolved namespace URI; unprefixed attributes have none
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written (e.g. `dct:identifier`)
    pub name: String,
    /// Resolved namespace URI
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

fn parse_error(e: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("invalid XML: {}", e))
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// In-scope namespace declarations, innermost last
type Scopes = Vec<Vec<(String, String)>>;

fn resolve_prefix(prefix: &str, scopes: &Scopes) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE.to_string());
    }
    scopes
        .iter()
        .rev()
        .flat_map(|decls| decls.iter())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

/// Build an element from a start tag, returning the namespace declarations it
/// introduces. The caller pushes those onto the scope stack for its children.
fn start_element(start: &BytesStart<'_>, scopes: &mut Scopes) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut raw = Vec::new();
    let mut decls = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(parse_error)?.into_owned();
        if key == "xmlns" {
            decls.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push((prefix.to_string(), value.clone()));
        }
        raw.push((key, value));
    }
    scopes.push(decls);

    let (prefix, _) = split_qname(&name);
    let namespace = resolve_prefix(prefix.unwrap_or(""), scopes);

    let attributes = raw
        .into_iter()
        .map(|(key, value)| {
            let namespace = match split_qname(&key) {
                (Some("xmlns"), _) | (None, _) => None,
                (Some(prefix), _) => resolve_prefix(prefix, scopes),
            };
            Attribute {
                name: key,
                namespace,
                value,
            }
        })
        .collect();

    Ok(Element {
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_some() {
                return Err(parse_error("more than one root element"));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

impl XmlDocument {
    /// Parse a document from a string
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Scopes = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = start_element(&e, &mut scopes)?;
                    stack.push(element);
                }
                Ok(Event::Empty(e)) => {
                    let element = start_element(&e, &mut scopes)?;
                    scopes.pop();
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    scopes.pop();
                    let element = stack
                        .pop()
                        .ok_or_else(|| parse_error("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape().map_err(parse_error)?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::CData(text));
                    }
                }
                Ok(Event::Comment(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        parent.children.push(Node::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::ParseError(format!(
                        "invalid XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(parse_error("unexpected end of document"));
        }
        let root = root.ok_or_else(|| parse_error("document has no root element"))?;
        Ok(Self { root })
    }

    /// Read and parse a document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| Error::io("Failed to read", path, e))?;
        Self::parse(&content).map_err(|e| match e {
            Error::ParseError(msg) => Error::ParseError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Serialize the whole document
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&self.root, &mut out);
        out.push('\n');
        out
    }

    /// Serialize the document to `path`, replacing any existing file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_xml_string()).map_err(|e| Error::io("Failed to write", path, e))
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attributes {
        let _ = write!(out, " {}=\"{}\"", attr.name, escape(attr.value.as_str()));
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, out),
            Node::Text(text) => out.push_str(&escape(text.as_str())),
            Node::CData(text) => {
                let _ = write!(out, "<![CDATA[{}]]>", text);
            }
            Node::Comment(text) => {
                let _ = write!(out, "<!--{}-->", text);
            }
        }
    }
    let _ = write!(out, "</{}>", element.name);
}

impl Element {
    /// Create an element; `name` may carry a prefix that must be declared on
    /// an ancestor once the element is attached
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Local part of the element name
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// True when the element has the given namespace and local name
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local_name
    }

    /// Look up an attribute by its qualified name as written
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Look up an attribute by namespace and local name
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && split_qname(&a.name).1 == local_name)
            .map(|a| a.value.as_str())
    }

    /// Set an unprefixed attribute, replacing an existing value
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                namespace: None,
                value,
            }),
        }
    }

    /// Prefix bound to `namespace` by a declaration on this element
    /// (empty string for the default namespace)
    pub fn declared_prefix(&self, namespace: &str) -> Option<&str> {
        self.attributes.iter().find_map(|a| {
            if a.value != namespace {
                return None;
            }
            if a.name == "xmlns" {
                Some("")
            } else {
                a.name.strip_prefix("xmlns:")
            }
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements with the given namespace and local name
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(namespace, local_name))
    }

    pub fn first_child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(namespace, local_name))
    }

    /// Concatenated text content of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    pub fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Element(e) => collect_text(e, out),
            Node::Comment(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DCT: &str = "http://purl.org/dc/terms/";

    #[test]
    fn test_resolves_namespaces_by_uri() {
        let doc = XmlDocument::parse(
            r#"<root xmlns="urn:default" xmlns:terms="http://purl.org/dc/terms/">
                 <terms:identifier>id-1</terms:identifier>
                 <plain/>
               </root>"#,
        )
        .unwrap();

        assert!(doc.root.is("urn:default", "root"));
        let id = doc.root.first_child(DCT, "identifier").unwrap();
        assert_eq!(id.name, "terms:identifier");
        assert_eq!(id.text(), "id-1");
        assert!(doc.root.first_child("urn:default", "plain").is_some());
    }

    #[test]
    fn test_namespaced_attributes() {
        let doc = XmlDocument::parse(
            r#"<a xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
                 <b xsi:type="id-type:DOI" plain="x"/>
               </a>"#,
        )
        .unwrap();

        let b = doc.root.elements().next().unwrap();
        assert_eq!(
            b.attribute_ns("http://www.w3.org/2001/XMLSchema-instance", "type"),
            Some("id-type:DOI")
        );
        assert_eq!(b.attribute("plain"), Some("x"));
        assert_eq!(b.attribute_ns("http://www.w3.org/2001/XMLSchema-instance", "plain"), None);
    }

    #[test]
    fn test_round_trip_keeps_comments_and_escapes() {
        let xml = r#"<files><!-- keep --><file filepath="a &amp; b.txt">x &lt; y</file></files>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let out = doc.to_xml_string();

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("<!-- keep -->"));
        assert!(out.contains("filepath=\"a &amp; b.txt\""));
        assert!(out.contains("x &lt; y"));

        let reparsed = XmlDocument::parse(&out).unwrap();
        assert_eq!(reparsed.root, doc.root);
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(matches!(XmlDocument::parse("<a><b></a>"), Err(Error::ParseError(_))));
        assert!(matches!(XmlDocument::parse(""), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_declared_prefix() {
        let doc = XmlDocument::parse(r#"<r xmlns="urn:f" xmlns:dct="http://purl.org/dc/terms/"/>"#)
            .unwrap();
        assert_eq!(doc.root.declared_prefix(DCT), Some("dct"));
        assert_eq!(doc.root.declared_prefix("urn:f"), Some(""));
        assert_eq!(doc.root.declared_prefix("urn:other"), None);
    }
}
