//! Signature record types.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Digest algorithm a signature hash was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    Md5,
    Sha1,
    Sha256,
    /// Hash of an unrecognized length; stored and matched like any other
    Unknown,
}

impl HashKind {
    /// Infer the hash kind from the length of a hex digest.
    pub fn from_hex_len(len: usize) -> Self {
        match len {
            32 => HashKind::Md5,
            40 => HashKind::Sha1,
            64 => HashKind::Sha256,
            _ => HashKind::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
            HashKind::Unknown => "unknown",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "md5" => Some(HashKind::Md5),
            "sha1" | "sha-1" => Some(HashKind::Sha1),
            "sha256" | "sha-256" => Some(HashKind::Sha256),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File size a signature applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredSize {
    /// Exact size in bytes
    Known(i64),
    /// Wildcard `*`: matches files of any size
    Unknown,
}

impl DeclaredSize {
    /// The declared byte count, if the size is known.
    pub fn known(&self) -> Option<i64> {
        match self {
            DeclaredSize::Known(size) => Some(*size),
            DeclaredSize::Unknown => None,
        }
    }

    /// Check whether a file of `size` bytes has exactly this declared size.
    pub fn matches(&self, size: u64) -> bool {
        match self {
            DeclaredSize::Known(declared) => i64::try_from(size).is_ok_and(|s| s == *declared),
            DeclaredSize::Unknown => false,
        }
    }
}

impl std::fmt::Display for DeclaredSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclaredSize::Known(size) => write!(f, "{}", size),
            DeclaredSize::Unknown => write!(f, "*"),
        }
    }
}

/// Normalize a hex digest for storage and comparison.
///
/// Only allocates when the digest has upper-case characters.
pub fn normalize_hash(hash: &str) -> Cow<'_, str> {
    let hash = hash.trim();
    if hash.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(hash.to_ascii_lowercase())
    } else {
        Cow::Borrowed(hash)
    }
}

/// One parsed signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Lower-case hex digest, the primary key
    pub hash: String,
    /// Digest algorithm
    pub hash_kind: HashKind,
    /// Size of the file the digest was taken from
    pub declared_size: DeclaredSize,
    /// Malware family or name (may be empty)
    pub label: String,
    /// Free-text annotation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Signature {
    /// Create a signature, inferring the hash kind from the digest length.
    pub fn new(
        hash: impl AsRef<str>,
        declared_size: DeclaredSize,
        label: impl Into<String>,
    ) -> Self {
        let hash = normalize_hash(hash.as_ref()).into_owned();
        Self {
            hash_kind: HashKind::from_hex_len(hash.len()),
            hash,
            declared_size,
            label: label.into(),
            comment: String::new(),
        }
    }

    /// Override the inferred hash kind.
    pub fn with_kind(mut self, hash_kind: HashKind) -> Self {
        self.hash_kind = hash_kind;
        self
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}
