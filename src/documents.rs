//! XML document handling
//!
//! Two readers over quick-xml: [`Document`] builds a small element tree for
//! the grammar compiler, [`RootScan`] reads only as far as the root start tag
//! for the namespace index builder.

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes, in document order
    pub attributes: IndexMap<QName, String>,
    /// Child elements
    pub children: Vec<Element>,
    /// In-scope namespace bindings (inherited from ancestors)
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an unqualified attribute value by name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.namespace.is_none() && qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    ensure_single_root(&doc, &element_stack, &reader)?;
                    let parent = element_stack.last().map(|p| &p.namespaces);
                    let element = parse_element(&e, parent)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    ensure_single_root(&doc, &element_stack, &reader)?;
                    let parent = element_stack.last().map(|p| &p.namespaces);
                    let element = parse_element(&e, parent)?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    // Schema processing reads no character data; it is only
                    // checked for escapes and placement
                    let text = e
                        .unescape()
                        .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                    if element_stack.is_empty() && !text.trim().is_empty() {
                        return Err(Error::Xml(format!(
                            "Text outside of the root element at position {}",
                            reader.buffer_position()
                        )));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Comments, processing instructions, doctype, CDATA
            }
            buf.clear();
        }

        if let Some(open) = element_stack.last() {
            return Err(Error::Xml(format!(
                "Unexpected end of document inside element '{}'",
                open.qname
            )));
        }
        if doc.root.is_none() {
            return Err(Error::Xml("Document has no root element".to_string()));
        }

        Ok(doc)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}

fn ensure_single_root(doc: &Document, stack: &[Element], reader: &Reader<&[u8]>) -> Result<()> {
    if stack.is_empty() && doc.root.is_some() {
        return Err(Error::Xml(format!(
            "Second root element at position {}",
            reader.buffer_position()
        )));
    }
    Ok(())
}

/// Parse element from BytesStart event, resolving names against the
/// parent's in-scope bindings.
fn parse_element(start: &BytesStart, parent: Option<&NamespaceContext>) -> Result<Element> {
    let (raw_attributes, own) = read_attributes(start)?;
    let namespaces = match parent {
        Some(scope) => scope.inherit(&own),
        None => own,
    };

    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
        .to_string();
    let qname = namespaces
        .resolve(&name)
        .map_err(|e| Error::Xml(format!("Element '{}': {}", name, e)))?;

    let mut element = Element::new(qname);
    for (attr_name, attr_value) in raw_attributes {
        // Unprefixed attributes are in no namespace
        let attr_qname = match attr_name.split_once(':') {
            Some(_) => namespaces
                .resolve(&attr_name)
                .map_err(|e| Error::Xml(format!("Attribute '{}': {}", attr_name, e)))?,
            None => QName::local(attr_name),
        };
        element.attributes.insert(attr_qname, attr_value);
    }
    element.namespaces = namespaces;

    Ok(element)
}

/// Split a start tag's attributes into regular attributes and the
/// namespace declarations it carries.
fn read_attributes(start: &BytesStart) -> Result<(Vec<(String, String)>, NamespaceContext)> {
    let mut attributes = Vec::new();
    let mut declared = NamespaceContext::new();

    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

        let attr_name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
            .to_string();

        let attr_value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
            .to_string();

        if attr_name == "xmlns" {
            declared.set_default_namespace(attr_value);
        } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
            declared.add_prefix(prefix, attr_value);
        } else {
            attributes.push((attr_name, attr_value));
        }
    }

    Ok((attributes, declared))
}

/// Root start tag of a document, read without building a tree
#[derive(Debug, Clone)]
pub struct RootScan {
    /// Resolved name of the root element
    pub qname: QName,
    /// Root attributes (excluding namespace declarations) by raw name
    pub attributes: IndexMap<String, String>,
    /// Namespace declarations on the root element
    pub namespaces: NamespaceContext,
}

impl RootScan {
    /// Read up to and including the root start tag
    pub fn scan(xml: &[u8]) -> Result<Self> {
        Self::scan_reader(xml)
    }

    /// Read from a buffered source up to and including the root start tag;
    /// nothing past the root start tag is consumed
    pub fn scan_reader<R: BufRead>(input: R) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => return Self::from_start(&e),
                Ok(Event::Text(e)) if !e.iter().all(u8::is_ascii_whitespace) => {
                    return Err(Error::Xml(format!(
                        "Text before the root element at position {}",
                        reader.buffer_position()
                    )));
                }
                Ok(Event::Eof) => {
                    return Err(Error::Xml("Document has no root element".to_string()));
                }
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Read the root start tag, then check the whole document is well-formed
    pub fn scan_well_formed(xml: &[u8]) -> Result<Self> {
        let root = Self::scan(xml)?;
        Document::parse(xml)?;
        Ok(root)
    }

    fn from_start(start: &BytesStart) -> Result<Self> {
        let (raw_attributes, namespaces) = read_attributes(start)?;
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();
        let qname = namespaces
            .resolve(&name)
            .map_err(|e| Error::Xml(format!("Element '{}': {}", name, e)))?;

        Ok(Self {
            qname,
            attributes: raw_attributes.into_iter().collect(),
            namespaces,
        })
    }

    /// Value of an attribute on the root element
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Declared `targetNamespace`, `""` when absent
    pub fn target_namespace(&self) -> &str {
        self.attribute("targetNamespace").unwrap_or("")
    }
}
