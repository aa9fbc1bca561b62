//! Attributes and file plumbing shared by every library element kind
//!
//! A library element lives in its own directory:
//!
//! ```text
//! <uuid>/
//!   .partlib-dev      file format version marker
//!   device.xml        the element document
//! ```
//!
//! Concrete element types embed a [`LibraryElementCore`] and call its
//! `open` / `serialize` / `validate` / `finish_loading` explicitly around
//! their own fields.

use chrono::{DateTime, SubsecRound, Utc};
use semver::Version;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dom::{DomDocument, DomElement, DomNode};
use crate::error::{LibraryError, Result};
use crate::localized::{LocalizedStrings, DEFAULT_LOCALE};
use crate::validation::Violation;

/// Version written into the directory marker file
pub const FILE_FORMAT_VERSION: &str = "0.1";

/// Naming of one element kind on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementKind {
    /// Short tag, used for the marker file (e.g. `dev`)
    pub short_name: &'static str,
    /// Long tag, used for the root element and file name (e.g. `device`)
    pub long_name: &'static str,
}

impl ElementKind {
    pub const DEVICE: ElementKind = ElementKind {
        short_name: "dev",
        long_name: "device",
    };

    pub fn file_name(&self) -> String {
        format!("{}.xml", self.long_name)
    }

    pub fn marker_name(&self) -> String {
        format!(".partlib-{}", self.short_name)
    }
}

/// Identity, metadata, and persistence state common to all elements
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryElementCore {
    kind: ElementKind,
    uuid: Uuid,
    version: Version,
    author: String,
    created: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    deprecated: bool,
    names: LocalizedStrings,
    descriptions: LocalizedStrings,
    keywords: LocalizedStrings,
    categories: BTreeSet<Uuid>,
    directory: Option<PathBuf>,
    read_only: bool,
}

impl LibraryElementCore {
    /// Create the core of a new element with default-locale strings
    pub fn new(
        kind: ElementKind,
        uuid: Uuid,
        version: Version,
        author: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        keywords: impl Into<String>,
    ) -> Self {
        // Files store whole seconds only
        let now = Utc::now().trunc_subsecs(0);
        Self {
            kind,
            uuid,
            version,
            author: author.into(),
            created: now,
            last_modified: now,
            deprecated: false,
            names: LocalizedStrings::with_default(name),
            descriptions: LocalizedStrings::with_default(description),
            keywords: LocalizedStrings::with_default(keywords),
            categories: BTreeSet::new(),
            directory: None,
            read_only: false,
        }
    }

    /// Load the element file from `directory`
    ///
    /// Returns the core together with the parsed document so the concrete
    /// element can read its own fields; hand the document back through
    /// [`LibraryElementCore::finish_loading`] when done.
    pub fn open(
        directory: &Path,
        kind: ElementKind,
        read_only: bool,
    ) -> Result<(Self, DomDocument)> {
        let marker = directory.join(kind.marker_name());
        if !marker.is_file() {
            warn!(path = %marker.display(), "Library element marker file missing");
        }

        let path = directory.join(kind.file_name());
        debug!(path = %path.display(), read_only, "Loading library element");
        let document = DomDocument::from_file(&path)?;

        let mut core = Self::from_document(&document, kind)?;
        core.directory = Some(directory.to_path_buf());
        core.read_only = read_only;
        Ok((core, document))
    }

    /// Read the shared attributes from a parsed document
    pub fn from_document(document: &DomDocument, kind: ElementKind) -> Result<Self> {
        let root = document.root();
        if root.name() != kind.long_name {
            return Err(LibraryError::WrongRootElement {
                expected: kind.long_name.to_string(),
                found: root.name().to_string(),
                path: document.path().to_path_buf(),
            });
        }

        let created: DateTime<Utc> = root.required_child("created")?.text_as()?;
        let last_modified = match root.first_child("last_modified") {
            Some(node) => node.text_as()?,
            None => created,
        };
        let deprecated = match root.first_child("deprecated") {
            Some(node) => node.text_as()?,
            None => false,
        };

        let mut categories = BTreeSet::new();
        for node in root.children("category") {
            categories.insert(node.text_as::<Uuid>()?);
        }

        Ok(Self {
            kind,
            uuid: root.required_child("uuid")?.text_as()?,
            version: root.required_child("version")?.text_as()?,
            author: optional_text(&root.required_child("author")?),
            created,
            last_modified,
            deprecated,
            names: LocalizedStrings::load(&root, "name")?,
            descriptions: LocalizedStrings::load(&root, "description")?,
            keywords: LocalizedStrings::load(&root, "keywords")?,
            categories,
            directory: None,
            read_only: false,
        })
    }

    /// Release the document used while loading
    pub fn finish_loading(&self, document: DomDocument) {
        debug!(
            kind = self.kind.long_name,
            uuid = %self.uuid,
            path = %document.path().display(),
            "Library element loaded"
        );
        drop(document);
    }

    /// Append the shared attributes to `root`
    pub fn serialize(&self, root: &mut DomElement) {
        root.append_text_child("uuid", &self.uuid);
        root.append_text_child("version", &self.version);
        root.append_text_child("author", &self.author);
        root.append_text_child("created", &self.created);
        root.append_text_child("last_modified", &self.last_modified);
        root.append_text_child("deprecated", &self.deprecated);
        self.names.serialize(root, "name");
        self.descriptions.serialize(root, "description");
        self.keywords.serialize(root, "keywords");
        for category in &self.categories {
            root.append_text_child("category", category);
        }
    }

    /// Check the shared attributes, reporting every broken one
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.uuid.is_nil() {
            violations.push(Violation::new("uuid", "is the nil UUID"));
        }
        match self.names.default_value() {
            Some(name) if !name.trim().is_empty() => {}
            _ => violations.push(Violation::new(
                "name",
                format!("no {} name given", DEFAULT_LOCALE),
            )),
        }
        if self.categories.iter().any(Uuid::is_nil) {
            violations.push(Violation::new("category", "contains the nil UUID"));
        }
        violations
    }

    /// Document path the element is (or would be) stored at
    pub fn file_path(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.join(self.kind.file_name()),
            None => PathBuf::from(self.kind.file_name()),
        }
    }

    /// Write an already serialized document into `directory`
    ///
    /// The document goes through a temporary file that is renamed over the
    /// old one; the format marker is only written once the document is in
    /// place.
    pub(crate) fn write_files(&mut self, directory: &Path, xml: &str) -> Result<()> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(self.kind.file_name());
        let staging = directory.join(format!("{}.tmp", self.kind.file_name()));
        std::fs::write(&staging, xml)?;
        if let Err(e) = std::fs::rename(&staging, &path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        std::fs::write(
            directory.join(self.kind.marker_name()),
            format!("{}\n", FILE_FORMAT_VERSION),
        )?;
        debug!(path = %path.display(), uuid = %self.uuid, "Library element saved");

        self.directory = Some(directory.to_path_buf());
        self.read_only = false;
        Ok(())
    }

    /// Set `last_modified` to now, returning the previous value
    pub(crate) fn touch(&mut self) -> DateTime<Utc> {
        std::mem::replace(&mut self.last_modified, Utc::now().trunc_subsecs(0))
    }

    pub(crate) fn set_last_modified(&mut self, last_modified: DateTime<Utc>) {
        self.last_modified = last_modified;
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn set_deprecated(&mut self, deprecated: bool) {
        self.deprecated = deprecated;
    }

    pub fn names(&self) -> &LocalizedStrings {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut LocalizedStrings {
        &mut self.names
    }

    pub fn descriptions(&self) -> &LocalizedStrings {
        &self.descriptions
    }

    pub fn descriptions_mut(&mut self) -> &mut LocalizedStrings {
        &mut self.descriptions
    }

    pub fn keywords(&self) -> &LocalizedStrings {
        &self.keywords
    }

    pub fn keywords_mut(&mut self) -> &mut LocalizedStrings {
        &mut self.keywords
    }

    pub fn categories(&self) -> &BTreeSet<Uuid> {
        &self.categories
    }

    pub fn add_category(&mut self, category: Uuid) -> bool {
        self.categories.insert(category)
    }

    pub fn remove_category(&mut self, category: &Uuid) -> bool {
        self.categories.remove(category)
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

fn optional_text(node: &DomNode<'_>) -> String {
    node.text().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LibraryElementCore {
        LibraryElementCore::new(
            ElementKind::DEVICE,
            Uuid::parse_str("3f2b1a6c-5d7e-4f80-9a1b-2c3d4e5f6a7b").unwrap(),
            Version::new(0, 1, 0),
            "Jane Doe",
            "LM358 SOIC-8",
            "Dual op amp",
            "opamp,lm358",
        )
    }

    #[test]
    fn test_serialize_then_read_back() {
        let mut core = sample();
        core.add_category(Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap());
        core.names_mut().insert("de_DE", "LM358 SO-8");

        let mut doc = DomDocument::new("device", "device.xml");
        core.serialize(doc.root_mut());
        let xml = doc.to_xml().unwrap();

        let reparsed = DomDocument::parse(&xml, "device.xml").unwrap();
        let loaded = LibraryElementCore::from_document(&reparsed, ElementKind::DEVICE).unwrap();
        assert_eq!(loaded, core);
    }

    #[test]
    fn test_wrong_root_element() {
        let doc = DomDocument::new("symbol", "symbol.xml");
        let err = LibraryElementCore::from_document(&doc, ElementKind::DEVICE).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::WrongRootElement { ref expected, ref found, .. }
                if expected == "device" && found == "symbol"
        ));
    }

    #[test]
    fn test_optional_attributes_default() {
        let xml = r#"<device>
 <uuid>3f2b1a6c-5d7e-4f80-9a1b-2c3d4e5f6a7b</uuid>
 <version>1.2.3</version>
 <author/>
 <created>2014-05-06T07:08:09Z</created>
 <name locale="en_US">X</name>
</device>"#;
        let doc = DomDocument::parse(xml, "device.xml").unwrap();
        let core = LibraryElementCore::from_document(&doc, ElementKind::DEVICE).unwrap();
        assert_eq!(core.author(), "");
        assert_eq!(core.last_modified(), core.created());
        assert!(!core.is_deprecated());
        assert!(core.descriptions().is_empty());
        assert_eq!(core.version(), &Version::new(1, 2, 3));
    }

    #[test]
    fn test_validate_reports_each_problem() {
        assert!(sample().validate().is_empty());

        let mut core = LibraryElementCore::new(
            ElementKind::DEVICE,
            Uuid::nil(),
            Version::new(0, 1, 0),
            "",
            "  ",
            "",
            "",
        );
        core.add_category(Uuid::nil());

        let fields: Vec<String> = core.validate().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["uuid", "name", "category"]);
    }

    #[test]
    fn test_file_naming() {
        assert_eq!(ElementKind::DEVICE.file_name(), "device.xml");
        assert_eq!(ElementKind::DEVICE.marker_name(), ".partlib-dev");
        assert_eq!(sample().file_path(), PathBuf::from("device.xml"));
    }
}
