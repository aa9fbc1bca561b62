//! Errors raised while loading, serializing, or saving library elements

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{summarize, Violation};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Missing required field \"{field}\" in {}", .path.display())]
    MissingField { field: String, path: PathBuf },
    #[error("Malformed value \"{value}\" for \"{field}\" in {}", .path.display())]
    MalformedValue {
        field: String,
        value: String,
        path: PathBuf,
    },
    #[error("The pad \"{pad}\" exists multiple times in {}", .path.display())]
    DuplicatePad { pad: Uuid, path: PathBuf },
    #[error("Expected root element <{expected}>, found <{found}> in {}", .path.display())]
    WrongRootElement {
        expected: String,
        found: String,
        path: PathBuf,
    },
    #[error("XML error in {}: {message}", .path.display())]
    Xml { path: PathBuf, message: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Element at {} was opened read-only", .0.display())]
    ReadOnly(PathBuf),
    #[error("Element has no directory to save to")]
    NoDirectory,
    #[error("Invalid element: {}", summarize(.0))]
    Invalid(Vec<Violation>),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
