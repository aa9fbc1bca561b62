//! Device library element: a component bound to a package
//!
//! A device tells which package pad realizes which component signal. It is
//! stored as `device.xml` inside its element directory:
//!
//! ```xml
//! <device>
//!  <uuid>..</uuid>
//!  ...shared element attributes...
//!  <component>COMPONENT-UUID</component>
//!  <package>PACKAGE-UUID</package>
//!  <pad_signal_map pad="PAD-UUID">SIGNAL-UUID</pad_signal_map>
//! </device>
//! ```
//!
//! Whether the referenced component, package, pads, and signals exist is
//! not checked here; that needs the surrounding library.

use semver::Version;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::dom::DomDocument;
use crate::element::{ElementKind, LibraryElementCore};
use crate::error::{LibraryError, Result};
use crate::pad_map::PadSignalMap;
use crate::validation::Violation;

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    core: LibraryElementCore,
    component: Option<Uuid>,
    package: Option<Uuid>,
    pad_signal_map: PadSignalMap,
}

impl Device {
    pub const KIND: ElementKind = ElementKind::DEVICE;

    /// Create a new device with no component, no package, and no mappings
    pub fn new(
        uuid: Uuid,
        version: Version,
        author: impl Into<String>,
        name_en_us: impl Into<String>,
        description_en_us: impl Into<String>,
        keywords_en_us: impl Into<String>,
    ) -> Self {
        Self {
            core: LibraryElementCore::new(
                Self::KIND,
                uuid,
                version,
                author,
                name_en_us,
                description_en_us,
                keywords_en_us,
            ),
            component: None,
            package: None,
            pad_signal_map: PadSignalMap::new(),
        }
    }

    /// Load a device from its element directory
    pub fn open(directory: &Path, read_only: bool) -> Result<Self> {
        let (core, document) = LibraryElementCore::open(directory, Self::KIND, read_only)?;
        let device = Self::from_parts(core, &document)?;
        device.core.finish_loading(document);
        Ok(device)
    }

    /// Load a device from XML text; `path` is only used in error messages
    pub fn from_xml(xml: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let document = DomDocument::parse(xml, path)?;
        let core = LibraryElementCore::from_document(&document, Self::KIND)?;
        let device = Self::from_parts(core, &document)?;
        device.core.finish_loading(document);
        Ok(device)
    }

    fn from_parts(core: LibraryElementCore, document: &DomDocument) -> Result<Self> {
        let root = document.root();
        let component = root.required_child("component")?.text_as()?;
        let package = root.required_child("package")?.text_as()?;

        let mut pad_signal_map = PadSignalMap::new();
        for node in root.children("pad_signal_map") {
            let pad: Uuid = node.attribute_as("pad")?;
            let signal: Uuid = node.text_as()?;
            pad_signal_map
                .try_insert(pad, signal)
                .map_err(|pad| LibraryError::DuplicatePad {
                    pad,
                    path: document.path().to_path_buf(),
                })?;
        }

        Ok(Self {
            core,
            component: Some(component),
            package: Some(package),
            pad_signal_map,
        })
    }

    /// Build the element document
    ///
    /// Fails when the component or package is not set, since the file
    /// format has no way to express a missing reference.
    pub fn serialize(&self) -> Result<DomDocument> {
        let (component, package) = match (self.component, self.package) {
            (Some(component), Some(package)) => (component, package),
            _ => return Err(LibraryError::Invalid(self.reference_violations())),
        };

        let mut document = DomDocument::new(Self::KIND.long_name, self.core.file_path());
        let root = document.root_mut();
        self.core.serialize(root);
        root.append_text_child("component", &component);
        root.append_text_child("package", &package);
        for (pad, signal) in self.pad_signal_map.iter() {
            let child = root.append_text_child("pad_signal_map", &signal);
            child.set_attribute("pad", &pad);
        }
        Ok(document)
    }

    pub fn to_xml(&self) -> Result<String> {
        self.serialize()?.to_xml()
    }

    /// Save back into the directory the device was opened from or last saved to
    pub fn save(&mut self) -> Result<()> {
        let directory = self
            .core
            .directory()
            .map(Path::to_path_buf)
            .ok_or(LibraryError::NoDirectory)?;
        if self.core.is_read_only() {
            return Err(LibraryError::ReadOnly(directory));
        }
        self.save_to(&directory)
    }

    /// Save into `directory`, which becomes the device's directory
    ///
    /// On failure the device keeps its previous `last_modified`.
    pub fn save_to(&mut self, directory: &Path) -> Result<()> {
        let in_place = self
            .core
            .directory()
            .is_some_and(|current| same_directory(current, directory));
        if self.core.is_read_only() && in_place {
            return Err(LibraryError::ReadOnly(directory.to_path_buf()));
        }
        let violations = self.validate();
        if !violations.is_empty() {
            return Err(LibraryError::Invalid(violations));
        }

        let previous = self.core.touch();
        let result = self
            .to_xml()
            .and_then(|xml| self.core.write_files(directory, &xml));
        if result.is_err() {
            self.core.set_last_modified(previous);
        }
        result
    }

    /// List every broken invariant; empty means the device is valid
    ///
    /// Problems with the shared element attributes are reported alone,
    /// without looking at the device fields.
    pub fn validate(&self) -> Vec<Violation> {
        let base = self.core.validate();
        if !base.is_empty() {
            return base;
        }

        let mut violations = self.reference_violations();
        if self.pad_signal_map.contains_pad(&Uuid::nil()) {
            violations.push(Violation::new("pad_signal_map", "contains the nil pad UUID"));
        }
        violations
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    fn reference_violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (field, value) in [("component", self.component), ("package", self.package)] {
            match value {
                None => violations.push(Violation::new(field, "not set")),
                Some(uuid) if uuid.is_nil() => {
                    violations.push(Violation::new(field, "is the nil UUID"))
                }
                Some(_) => {}
            }
        }
        violations
    }

    /// Map `pad` to `signal`
    ///
    /// # Panics
    ///
    /// Panics if `pad` is already mapped.
    pub fn add_pad_signal_mapping(&mut self, pad: Uuid, signal: Uuid) {
        let inserted = self.pad_signal_map.try_insert(pad, signal);
        assert!(inserted.is_ok(), "pad {} is already mapped", pad);
    }

    /// Remove the mapping of `pad`
    ///
    /// # Panics
    ///
    /// Panics if `pad` is not mapped.
    pub fn remove_pad_signal_mapping(&mut self, pad: Uuid) {
        let removed = self.pad_signal_map.remove(&pad);
        assert!(removed.is_some(), "pad {} is not mapped", pad);
    }

    pub fn pad_signal_map(&self) -> &PadSignalMap {
        &self.pad_signal_map
    }

    pub fn component(&self) -> Option<Uuid> {
        self.component
    }

    pub fn set_component(&mut self, component: Uuid) {
        self.component = Some(component);
    }

    pub fn package(&self) -> Option<Uuid> {
        self.package
    }

    pub fn set_package(&mut self, package: Uuid) {
        self.package = Some(package);
    }

    pub fn core(&self) -> &LibraryElementCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut LibraryElementCore {
        &mut self.core
    }
}

/// Whether two paths name the same directory, resolving `..` and links
/// when both exist
fn same_directory(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
