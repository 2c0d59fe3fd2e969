//! Store URI parsing

use std::fmt;
use std::path::PathBuf;

use crate::error::{OffError, Result};

/// Parsed backing store location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// `file:<path>` or a bare path
    File(PathBuf),

    /// `memory:` or `memory:<name>`
    Memory(String),
}

impl StoreUri {
    pub fn parse(uri: &str) -> Result<Self> {
        // Single-letter "schemes" are Windows drive letters, not schemes.
        if let Some((scheme, rest)) = uri.split_once(':') {
            if scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphabetic()) {
                return match scheme {
                    "file" => Self::file(rest, uri),
                    "memory" => Ok(StoreUri::Memory(rest.to_string())),
                    other => Err(OffError::InvalidUri(format!(
                        "unsupported scheme {:?} in {:?}",
                        other, uri
                    ))),
                };
            }
        }
        Self::file(uri, uri)
    }

    fn file(path: &str, uri: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(OffError::InvalidUri(format!("empty path in {:?}", uri)));
        }
        Ok(StoreUri::File(PathBuf::from(path)))
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::File(path) => write!(f, "file:{}", path.display()),
            StoreUri::Memory(name) => write!(f, "memory:{}", name),
        }
    }
}
