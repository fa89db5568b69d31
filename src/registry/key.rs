//! Stream key normalization
//!
//! Encoders often append a query string to the publishing name
//! (`demo?user=abc`); only the part before `?` identifies the stream.

use crate::error::{Error, Result};

/// Normalized stream key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey(String);

impl StreamKey {
    /// Normalize a publishing name into a stream key
    ///
    /// Rejects names that are empty once the query suffix is removed.
    pub fn from_publishing_name(name: &str) -> Result<Self> {
        let key = match name.find('?') {
            Some(idx) => &name[..idx],
            None => name,
        }
        .trim();

        if key.is_empty() {
            return Err(Error::ProtocolRejection(format!(
                "empty stream key in publishing name {:?}",
                name
            )));
        }

        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form of the key, used for output directories
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
