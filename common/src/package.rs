use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// An application package ready to be pushed to devices.
///
/// The bytes are shared so every deployment task in a batch uploads the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    /// Application name as the device knows it (the `package=` value for control calls).
    pub name: String,
    pub version: String,
    pub file_name: String,
    pub bytes: Arc<Vec<u8>>,
    pub size: u64,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
}

impl PackageArtifact {
    pub fn from_bytes(
        name: impl Into<String>,
        version: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        Self {
            name: name.into(),
            version: version.into(),
            file_name: file_name.into(),
            size: bytes.len() as u64,
            bytes: Arc::new(bytes),
            sha256,
        }
    }

    /// Reads a package from disk. The name defaults to the file stem and the version to
    /// `unknown`.
    pub fn from_file(
        path: &Path,
        name: Option<String>,
        version: Option<String>,
    ) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.eap".to_string());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        Ok(Self::from_bytes(
            name.unwrap_or(stem),
            version.unwrap_or_else(|| "unknown".to_string()),
            file_name,
            bytes,
        ))
    }
}
