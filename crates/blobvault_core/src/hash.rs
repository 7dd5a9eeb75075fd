//! Content identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a blob's full byte stream, as 64 lowercase hex characters.
///
/// # Examples
///
/// ```
/// use blobvault_core::ContentHash;
///
/// let hash = ContentHash::compute(b"Hello, World!");
/// assert_eq!(
///     hash.as_str(),
///     "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
/// );
/// assert_eq!(ContentHash::parse(hash.as_str()), Some(hash));
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Accept an already-computed digest, rejecting anything that is not
    /// 64 hex characters. Uppercase input is normalised.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Wrap a digest read back from a trusted store without validation.
    pub fn from_trusted(value: String) -> Self {
        Self(value)
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the hex digest.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental hasher that also counts the bytes it has seen.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    digest: Sha256,
    bytes: u64,
}

impl ContentHasher {
    /// Start an empty digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes consumed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes
    }

    /// Finish the digest.
    pub fn finalize(self) -> ContentHash {
        ContentHash(format!("{:x}", self.digest.finalize()))
    }
}
