//! partlib Core - Library element types and the device pad-signal map
//!
//! This crate provides the building blocks of a parts library:
//! - A small XML document tree with typed field access
//! - The identity and metadata shared by every library element
//! - The device element, binding a component to a package through a
//!   pad to signal map, with load / serialize / validate

pub mod device;
pub mod dom;
pub mod element;
pub mod error;
pub mod localized;
pub mod pad_map;
pub mod validation;

pub use device::Device;
pub use dom::{DomDocument, DomElement, DomNode, FromDomText, ToDomText};
pub use element::{ElementKind, LibraryElementCore, FILE_FORMAT_VERSION};
pub use error::{LibraryError, Result};
pub use localized::{LocalizedStrings, DEFAULT_LOCALE};
pub use pad_map::PadSignalMap;
pub use validation::Violation;

pub use semver::Version;
pub use uuid::Uuid;
