//! Cache keys for source sheets.
//!
//! A [`Fingerprint`] is BLAKE3 over the file's bytes, truncated to 128 bits
//! and hex encoded (32 chars). Renaming or moving a sheet keeps its cache
//! entry; editing the image produces a new one.

use crate::error::{Error, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const HEX_LEN: usize = 32;

    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(hex::encode(&hash.as_bytes()[..Self::HEX_LEN / 2]))
    }

    /// Fingerprint of a file's content.
    pub fn for_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("file {}", path.display())),
            _ => Error::Storage(format!("cannot read {}: {err}", path.display())),
        })?;
        Ok(Self::from_bytes(&data))
    }

    /// Fingerprint of any serializable value, used to reference score
    /// versions in the correction log.
    pub fn of_json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::from_bytes(&serde_json::to_vec(value)?))
    }

    /// Validate a user-supplied hex string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != Self::HEX_LEN {
            return Err(Error::invalid(format!(
                "fingerprint must be {} hex chars, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid("fingerprint contains non-hex characters"));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight chars, for tables and log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Absolute form of `path` for display next to a cache entry. Falls back to
/// the path as given when the working directory is unavailable.
#[must_use]
pub fn source_label(path: &Path) -> PathBuf {
    path.absolutize()
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_bytes_same_fingerprint() {
        let a = Fingerprint::from_bytes(b"sheet");
        let b = Fingerprint::from_bytes(b"sheet");
        let c = Fingerprint::from_bytes(b"sheet2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), Fingerprint::HEX_LEN);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_file_fingerprint_follows_content_not_name() -> Result<()> {
        let dir = TempDir::new().map_err(|e| Error::Storage(e.to_string()))?;
        let first = dir.path().join("page1.png");
        let second = dir.path().join("renamed.png");
        std::fs::write(&first, b"pixels").map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::write(&second, b"pixels").map_err(|e| Error::Storage(e.to_string()))?;

        assert_eq!(Fingerprint::for_file(&first)?, Fingerprint::for_file(&second)?);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Fingerprint::for_file(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_validates() {
        let fp = Fingerprint::from_bytes(b"x");
        assert_eq!(Fingerprint::parse(&fp.as_str().to_uppercase()).unwrap(), fp);
        assert!(Fingerprint::parse("abc").is_err());
        assert!(Fingerprint::parse(&"z".repeat(32)).is_err());
    }

    #[test]
    fn test_source_label_is_absolute() {
        assert!(source_label(Path::new("sheets/page1.png")).is_absolute());
    }
}
