//! Minimal XML document tree used by library element files
//!
//! Elements keep their children in document order and their attributes in
//! key order, so a tree written by [`DomDocument::to_xml`] is reproducible
//! byte for byte. Typed access goes through [`FromDomText`] / [`ToDomText`].

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{LibraryError, Result};

/// Conversion from element text or attribute values
pub trait FromDomText: Sized {
    fn from_dom_text(text: &str) -> Option<Self>;
}

/// Conversion into element text or attribute values
pub trait ToDomText {
    fn to_dom_text(&self) -> String;
}

impl FromDomText for Uuid {
    fn from_dom_text(text: &str) -> Option<Self> {
        // Only the canonical hyphenated form is accepted
        let text = text.trim();
        if text.len() != 36 {
            return None;
        }
        Uuid::try_parse(text).ok()
    }
}

impl ToDomText for Uuid {
    fn to_dom_text(&self) -> String {
        self.hyphenated().to_string()
    }
}

impl FromDomText for semver::Version {
    fn from_dom_text(text: &str) -> Option<Self> {
        semver::Version::parse(text.trim()).ok()
    }
}

impl ToDomText for semver::Version {
    fn to_dom_text(&self) -> String {
        self.to_string()
    }
}

impl FromDomText for String {
    fn from_dom_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

impl ToDomText for String {
    fn to_dom_text(&self) -> String {
        self.clone()
    }
}

impl ToDomText for str {
    fn to_dom_text(&self) -> String {
        self.to_string()
    }
}

impl FromDomText for bool {
    fn from_dom_text(text: &str) -> Option<Self> {
        match text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

impl ToDomText for bool {
    fn to_dom_text(&self) -> String {
        self.to_string()
    }
}

impl FromDomText for DateTime<Utc> {
    fn from_dom_text(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl ToDomText for DateTime<Utc> {
    fn to_dom_text(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// A single element with attributes, optional text, and child elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomElement {
    name: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<DomElement>,
}

impl DomElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an empty child element and return it for further filling
    pub fn append_child(&mut self, name: impl Into<String>) -> &mut DomElement {
        self.children.push(DomElement::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append a child element holding only text
    pub fn append_text_child<T: ToDomText + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> &mut DomElement {
        let child = self.append_child(name);
        child.set_text(value);
        child
    }

    pub fn set_attribute<T: ToDomText + ?Sized>(&mut self, name: impl Into<String>, value: &T) {
        self.attributes.insert(name.into(), value.to_dom_text());
    }

    pub fn set_text<T: ToDomText + ?Sized>(&mut self, value: &T) {
        self.text = Some(value.to_dom_text());
    }
}

/// A parsed or freshly built document, remembering the file it belongs to
#[derive(Debug, Clone)]
pub struct DomDocument {
    root: DomElement,
    path: PathBuf,
}

impl DomDocument {
    /// Create a document with an empty root element
    pub fn new(root_name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            root: DomElement::new(root_name),
            path: path.into(),
        }
    }

    /// Parse a document from XML text; `path` is only used for error reporting
    pub fn parse(xml: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        // Text is kept verbatim; indentation is dropped when an element closes
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<DomElement> = Vec::new();
        let mut root: Option<DomElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(element_from_start(&e, &path)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e, &path)?;
                    attach(&mut stack, &mut root, element, &path)?;
                }
                Ok(Event::End(_)) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| xml_error(&path, "unexpected closing tag"))?;
                    drop_indentation(&mut element);
                    attach(&mut stack, &mut root, element, &path)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| xml_error(&path, e))?;
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .get_or_insert_with(String::new)
                            .push_str(&text);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(current) = stack.last_mut() {
                        let data = c.into_inner();
                        current
                            .text
                            .get_or_insert_with(String::new)
                            .push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions
                Ok(_) => {}
                Err(e) => {
                    return Err(xml_error(
                        &path,
                        format!("{} at position {}", e, reader.buffer_position()),
                    ))
                }
            }
        }

        if !stack.is_empty() {
            return Err(xml_error(&path, "unexpected end of document"));
        }
        let root = root.ok_or_else(|| xml_error(&path, "document has no root element"))?;
        Ok(Self { root, path })
    }

    /// Read and parse a document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the root element
    pub fn root(&self) -> DomNode<'_> {
        DomNode {
            element: &self.root,
            path: &self.path,
        }
    }

    pub fn root_mut(&mut self) -> &mut DomElement {
        &mut self.root
    }

    /// Serialize to XML text with a declaration and one-space indentation
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| xml_error(&self.path, e))?;
        write_element(&mut writer, &self.root, &self.path)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| xml_error(&self.path, e))
    }
}

/// Borrowed element together with the document path used in errors
#[derive(Debug, Clone, Copy)]
pub struct DomNode<'a> {
    element: &'a DomElement,
    path: &'a Path,
}

impl<'a> DomNode<'a> {
    pub fn name(&self) -> &'a str {
        &self.element.name
    }

    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// Text content, `None` when the element is empty
    pub fn text(&self) -> Option<&'a str> {
        self.element.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.element.attributes.get(name).map(String::as_str)
    }

    pub fn first_child(&self, name: &str) -> Option<DomNode<'a>> {
        let (parent, path) = (self.element, self.path);
        parent
            .children
            .iter()
            .find(|c| c.name == name)
            .map(|element| DomNode { element, path })
    }

    /// The only child with the given tag; absent is a missing field and a
    /// second copy is a malformed value
    pub fn required_child(&self, name: &str) -> Result<DomNode<'a>> {
        let (parent, path) = (self.element, self.path);
        let mut matches = parent.children.iter().filter(|c| c.name == name);
        let element = matches
            .next()
            .ok_or_else(|| self.missing(name.to_string()))?;
        if let Some(extra) = matches.next() {
            return Err(LibraryError::MalformedValue {
                field: name.to_string(),
                value: extra.text.clone().unwrap_or_default(),
                path: path.to_path_buf(),
            });
        }
        Ok(DomNode { element, path })
    }

    /// All children with the given tag, in document order
    pub fn children(&self, name: &'a str) -> impl Iterator<Item = DomNode<'a>> + 'a {
        let (parent, path) = (self.element, self.path);
        parent
            .children
            .iter()
            .filter(move |c| c.name == name)
            .map(move |element| DomNode { element, path })
    }

    /// Parse the text content; empty or absent text is a missing field
    pub fn text_as<T: FromDomText>(&self) -> Result<T> {
        let field = self.element.name.clone();
        let text = self.text().ok_or_else(|| self.missing(field.clone()))?;
        self.parse_value(field, text)
    }

    /// Parse a required attribute
    pub fn attribute_as<T: FromDomText>(&self, name: &str) -> Result<T> {
        let field = format!("{}.{}", self.element.name, name);
        let value = self
            .attribute(name)
            .ok_or_else(|| self.missing(field.clone()))?;
        self.parse_value(field, value)
    }

    fn parse_value<T: FromDomText>(&self, field: String, value: &str) -> Result<T> {
        T::from_dom_text(value).ok_or_else(|| LibraryError::MalformedValue {
            field,
            value: value.to_string(),
            path: self.path.to_path_buf(),
        })
    }

    fn missing(&self, field: String) -> LibraryError {
        LibraryError::MissingField {
            field,
            path: self.path.to_path_buf(),
        }
    }
}

fn xml_error(path: &Path, message: impl Display) -> LibraryError {
    LibraryError::Xml {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn element_from_start(start: &BytesStart<'_>, path: &Path) -> Result<DomElement> {
    let mut element = DomElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(path, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| xml_error(path, e))?;
        element.attributes.insert(key, value.into_owned());
    }
    Ok(element)
}

/// Whitespace around child elements is layout, not content
fn drop_indentation(element: &mut DomElement) {
    let layout_only = !element.children.is_empty()
        && element
            .text
            .as_deref()
            .is_some_and(|t| t.trim().is_empty());
    if layout_only {
        element.text = None;
    }
}

fn attach(
    stack: &mut [DomElement],
    root: &mut Option<DomElement>,
    element: DomElement,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(xml_error(path, "multiple root elements"));
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &DomElement, path: &Path) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map(|_| ())
            .map_err(|e| xml_error(path, e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| xml_error(path, e))?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| xml_error(path, e))?;
    }
    for child in &element.children {
        write_element(writer, child, path)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map(|_| ())
        .map_err(|e| xml_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "test/device.xml";

    #[test]
    fn test_parse_children_in_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<device>
 <entry key="b">second</entry>
 <other/>
 <entry key="a">first &amp; only</entry>
</device>"#;

        let doc = DomDocument::parse(xml, PATH).unwrap();
        let root = doc.root();
        assert_eq!(root.name(), "device");

        let entries: Vec<_> = root.children("entry").collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attribute("key"), Some("b"));
        assert_eq!(entries[1].text(), Some("first & only"));
        assert!(root.first_child("other").unwrap().text().is_none());
        assert!(root.first_child("missing").is_none());
    }

    #[test]
    fn test_typed_getters() {
        let xml = r#"<root>
 <id>0c3e9f3c-77a5-4e1e-9a5f-1b0cf0dc2b3a</id>
 <flag>true</flag>
 <bad>not-a-uuid</bad>
 <empty></empty>
</root>"#;
        let doc = DomDocument::parse(xml, PATH).unwrap();
        let root = doc.root();

        let id: Uuid = root.required_child("id").unwrap().text_as().unwrap();
        assert_eq!(id.to_string(), "0c3e9f3c-77a5-4e1e-9a5f-1b0cf0dc2b3a");
        assert!(root.required_child("flag").unwrap().text_as::<bool>().unwrap());

        let err = root
            .required_child("bad")
            .unwrap()
            .text_as::<Uuid>()
            .unwrap_err();
        assert!(matches!(err, LibraryError::MalformedValue { ref field, .. } if field == "bad"));

        let err = root
            .required_child("empty")
            .unwrap()
            .text_as::<Uuid>()
            .unwrap_err();
        assert!(matches!(err, LibraryError::MissingField { .. }));

        let err = root.required_child("nope").unwrap_err();
        assert!(matches!(err, LibraryError::MissingField { ref field, .. } if field == "nope"));
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let xml = "<root>\n <name>  NE555 </name>\n <id>\n  0c3e9f3c-77a5-4e1e-9a5f-1b0cf0dc2b3a\n </id>\n <blank> </blank>\n</root>\n";
        let doc = DomDocument::parse(xml, PATH).unwrap();
        let root = doc.root();

        assert!(root.text().is_none());
        assert_eq!(root.required_child("name").unwrap().text(), Some("  NE555 "));
        assert_eq!(
            root.required_child("name").unwrap().text_as::<String>().unwrap(),
            "  NE555 "
        );
        assert_eq!(root.required_child("blank").unwrap().text(), Some(" "));

        let id: Uuid = root.required_child("id").unwrap().text_as().unwrap();
        assert_eq!(id.to_string(), "0c3e9f3c-77a5-4e1e-9a5f-1b0cf0dc2b3a");
    }

    #[test]
    fn test_required_child_rejects_second_copy() {
        let doc = DomDocument::parse("<root><a>1</a><b/><a>2</a></root>", PATH).unwrap();
        let root = doc.root();

        let err = root.required_child("a").unwrap_err();
        assert!(matches!(
            err,
            LibraryError::MalformedValue { ref field, ref value, .. } if field == "a" && value == "2"
        ));
        assert_eq!(root.first_child("a").unwrap().text(), Some("1"));
        assert_eq!(root.children("a").count(), 2);
        assert!(root.required_child("b").is_ok());
    }

    #[test]
    fn test_uuid_requires_hyphenated_form() {
        assert!(Uuid::from_dom_text("0c3e9f3c77a54e1e9a5f1b0cf0dc2b3a").is_none());
        assert!(Uuid::from_dom_text("0c3e9f3c-77a5-4e1e-9a5f-1b0cf0dc2b3a").is_some());
    }

    #[test]
    fn test_attribute_errors_name_element_and_attribute() {
        let doc = DomDocument::parse(r#"<root><m pad="xyz">1</m><n/></root>"#, PATH).unwrap();
        let root = doc.root();

        let err = root
            .required_child("m")
            .unwrap()
            .attribute_as::<Uuid>("pad")
            .unwrap_err();
        assert!(matches!(err, LibraryError::MalformedValue { ref field, .. } if field == "m.pad"));

        let err = root
            .required_child("n")
            .unwrap()
            .attribute_as::<Uuid>("pad")
            .unwrap_err();
        assert!(matches!(err, LibraryError::MissingField { ref field, .. } if field == "n.pad"));
    }

    #[test]
    fn test_write_format() {
        let mut doc = DomDocument::new("device", PATH);
        let root = doc.root_mut();
        root.append_text_child("author", "A & B");
        let child = root.append_child("map");
        child.set_attribute("pad", "p1");
        child.set_text("s1");
        root.append_child("empty");

        let xml = doc.to_xml().unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <device>\n \
             <author>A &amp; B</author>\n \
             <map pad=\"p1\">s1</map>\n \
             <empty/>\n\
             </device>\n"
        );

        let reparsed = DomDocument::parse(&xml, PATH).unwrap();
        assert_eq!(reparsed.root().first_child("author").unwrap().text(), Some("A & B"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            DomDocument::parse("<a><b></a>", PATH),
            Err(LibraryError::Xml { .. })
        ));
        assert!(matches!(
            DomDocument::parse("<a>", PATH),
            Err(LibraryError::Xml { .. })
        ));
        assert!(matches!(
            DomDocument::parse("", PATH),
            Err(LibraryError::Xml { .. })
        ));
    }

    #[test]
    fn test_datetime_text_is_second_precision_utc() {
        let dt = DateTime::<Utc>::from_dom_text("2013-01-01T12:30:00+02:00").unwrap();
        assert_eq!(dt.to_dom_text(), "2013-01-01T10:30:00Z");
    }
}
