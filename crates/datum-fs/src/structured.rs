//! Format-agnostic loading and saving of structured files
//!
//! The format is detected from the file extension: `.json` is JSON and
//! everything else (`.yaml`, `.yml`, no extension) is YAML, which is the
//! native format of datum's config and lock files.

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result, io};

/// Serialization format of a structured file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("json") => Format::Json,
            _ => Format::Yaml,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Yaml => "YAML",
            Format::Json => "JSON",
        }
    }
}

/// Parse `content` as the format implied by `path`.
///
/// `path` is only used for format detection and error messages.
pub fn parse<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    let format = Format::from_path(path);
    let parsed = match format {
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| Error::Parse {
        path: path.to_path_buf(),
        format: format.name().into(),
        message,
    })
}

/// Load a structured file.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = io::read_text(path)?;
    parse(path, &content)
}

/// Serialize `value` in the format implied by `path`.
pub fn to_string<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    let format = Format::from_path(path);
    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    };
    rendered.map_err(|message| Error::Serialize {
        path: path.to_path_buf(),
        format: format.name().into(),
        message,
    })
}

/// Save a structured file atomically.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = to_string(path, value)?;
    io::write_atomic(path, content.as_bytes())
}
