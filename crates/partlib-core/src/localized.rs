//! Locale-keyed strings for element names, descriptions, and keywords

use std::collections::BTreeMap;

use crate::dom::{DomElement, DomNode};
use crate::error::{LibraryError, Result};

/// Locale every element must provide a name for
pub const DEFAULT_LOCALE: &str = "en_US";

/// A set of translations, one per locale
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedStrings {
    values: BTreeMap<String, String>,
}

impl LocalizedStrings {
    /// Create a set holding only the default-locale value
    pub fn with_default(value: impl Into<String>) -> Self {
        let mut strings = Self::default();
        strings.insert(DEFAULT_LOCALE, value);
        strings
    }

    pub fn insert(&mut self, locale: impl Into<String>, value: impl Into<String>) {
        self.values.insert(locale.into(), value.into());
    }

    pub fn get(&self, locale: &str) -> Option<&str> {
        self.values.get(locale).map(String::as_str)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.get(DEFAULT_LOCALE)
    }

    /// First value found in `locales` order, falling back to the default locale
    pub fn value_for(&self, locales: &[&str]) -> Option<&str> {
        locales
            .iter()
            .find_map(|locale| self.get(locale))
            .or_else(|| self.default_value())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collect all `<tag locale="..">` children of `node`
    pub(crate) fn load(node: &DomNode<'_>, tag: &'static str) -> Result<Self> {
        let mut strings = Self::default();
        for child in node.children(tag) {
            let locale: String = child.attribute_as("locale")?;
            if strings.values.contains_key(&locale) {
                return Err(LibraryError::MalformedValue {
                    field: format!("{}.locale", tag),
                    value: locale,
                    path: child.path().to_path_buf(),
                });
            }
            let value = child.text().unwrap_or_default().to_string();
            strings.values.insert(locale, value);
        }
        Ok(strings)
    }

    /// Append one `<tag locale="..">` child per locale, in locale order
    pub(crate) fn serialize(&self, root: &mut DomElement, tag: &str) {
        for (locale, value) in &self.values {
            let child = root.append_text_child(tag, value);
            child.set_attribute("locale", locale);
        }
    }
}
