//! Content hashing for backup integrity
//!
//! Provides [`ContentHash`], a strongly-typed 32-byte hash used to prove
//! that a backup still holds the bytes it was created from.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// A 32-byte content hash (Blake3)
///
/// Recorded at snapshot time and re-checked before a backup is trusted
/// for restore. Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self::new(*hash.as_bytes())
    }

    /// Compute hash of a file's current contents
    ///
    /// # Errors
    /// Returns error if the file cannot be read
    pub async fn of_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::compute(&bytes))
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("expected 32-byte hash"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let a = ContentHash::compute(b"let x: any = 1;");
        let b = ContentHash::compute(b"let x: any = 1;");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_different_hash() {
        let a = ContentHash::compute(b"alpha");
        let b = ContentHash::compute(b"beta");
        assert_ne!(a, b);
    }

    #[test]
    fn short_form_is_sixteen_chars() {
        let hash = ContentHash::compute(b"content");
        assert_eq!(hash.short().len(), 16);
    }

    #[tokio::test]
    async fn of_file_matches_compute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        tokio::fs::write(&path, b"export const x = 1;").await.unwrap();

        let from_file = ContentHash::of_file(&path).await.unwrap();
        assert_eq!(from_file, ContentHash::compute(b"export const x = 1;"));
    }
}
