//! Shard descriptors: the (filehash, decryptkey) pair that identifies an
//! uploaded shard, with its URI and JSON encodings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Separator between the filehash and the key in a shard URI
pub const URI_KEY_SEPARATOR: &str = "?key=";

const INCOMPLETE: &str = "missing filehash or decryptkey";

/// Information about an uploaded shard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardDescriptor {
    filehash: Option<String>,
    decryptkey: Option<String>,
    /// Local file name, not part of the server identity
    pub filename: Option<String>,
    /// Local file path, not part of the server identity
    pub filepath: Option<PathBuf>,
}

/// JSON body as sent by web-core; `key` is serialized first
#[derive(Serialize, Deserialize)]
struct DescriptorJson {
    key: String,
    filehash: String,
}

impl ShardDescriptor {
    /// Create a descriptor that may be missing either half of its identity
    pub fn new(filehash: Option<String>, decryptkey: Option<String>) -> Self {
        Self {
            filehash: filehash.filter(|s| !s.is_empty()),
            decryptkey: decryptkey.filter(|s| !s.is_empty()),
            filename: None,
            filepath: None,
        }
    }

    /// Create a complete descriptor from a filehash and decryptkey
    pub fn from_parts(filehash: impl Into<String>, decryptkey: impl Into<String>) -> Result<Self> {
        let (filehash, decryptkey) = (filehash.into(), decryptkey.into());
        if filehash.is_empty() || decryptkey.is_empty() {
            return Err(Error::DescriptorFormat(format!(
                "empty filehash or decryptkey in '{}{}{}'",
                filehash, URI_KEY_SEPARATOR, decryptkey
            )));
        }
        Ok(Self::new(Some(filehash), Some(decryptkey)))
    }

    /// Parse a URI of the form `<filehash>?key=<decryptkey>`
    pub fn from_uri(uri: &str) -> Result<Self> {
        let parts: Vec<&str> = uri.split(URI_KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [filehash, decryptkey] => Self::from_parts(*filehash, *decryptkey),
            _ => Err(Error::DescriptorFormat(format!(
                "{} not format of <hash>?key=<key>",
                uri
            ))),
        }
    }

    /// Parse a JSON object carrying `filehash` and `key` strings
    pub fn from_json(payload: &str) -> Result<Self> {
        let data: DescriptorJson = serde_json::from_str(payload)
            .map_err(|e| Error::DescriptorFormat(format!("invalid descriptor JSON: {}", e)))?;
        Self::from_parts(data.filehash, data.key)
    }

    pub fn filehash(&self) -> Option<&str> {
        self.filehash.as_deref()
    }

    pub fn decryptkey(&self) -> Option<&str> {
        self.decryptkey.as_deref()
    }

    /// Whether both the filehash and decryptkey are set
    pub fn has_hashes(&self) -> bool {
        self.filehash.is_some() && self.decryptkey.is_some()
    }

    /// The `(filehash, decryptkey)` pair
    pub fn get_hashes(&self) -> Result<(&str, &str)> {
        match (self.filehash.as_deref(), self.decryptkey.as_deref()) {
            (Some(filehash), Some(decryptkey)) => Ok((filehash, decryptkey)),
            _ => Err(Error::Descriptor(INCOMPLETE.to_string())),
        }
    }

    /// URI form: `<filehash>?key=<decryptkey>`
    pub fn uri(&self) -> Result<String> {
        let (filehash, decryptkey) = self.get_hashes()?;
        Ok(format!("{}{}{}", filehash, URI_KEY_SEPARATOR, decryptkey))
    }

    /// JSON form: `{"key":"<decryptkey>","filehash":"<filehash>"}`
    pub fn get_json(&self) -> Result<String> {
        let (filehash, key) = self.get_hashes()?;
        let body = DescriptorJson {
            key: key.to_string(),
            filehash: filehash.to_string(),
        };
        serde_json::to_string(&body)
            .map_err(|e| Error::DescriptorFormat(e.to_string()))
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = Some(filename.into());
    }

    pub fn set_filepath(&mut self, filepath: impl AsRef<Path>) {
        self.filepath = Some(filepath.as_ref().to_path_buf());
    }
}
