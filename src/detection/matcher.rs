//! Hash matching engine for signature-based detection.

use crate::core::error::{Error, Result};
use crate::core::types::Detection;
use crate::detection::database::SignatureDatabase;
use crate::detection::signature::{HashKind, Signature};
use crate::utils::hash::{FileHashes, HashCalculator};
use std::path::Path;
use std::sync::Arc;

/// Hash-based malware matcher.
pub struct HashMatcher {
    db: Arc<SignatureDatabase>,
    skip_size_check: bool,
}

impl HashMatcher {
    /// Create a matcher over a loaded database.
    pub fn new(db: Arc<SignatureDatabase>) -> Result<Self> {
        if !db.is_ready() {
            return Err(Error::DatabaseNotReady {
                state: db.state().to_string(),
            });
        }
        Ok(Self {
            db,
            skip_size_check: false,
        })
    }

    /// Hash every file regardless of its size.
    pub fn with_skip_size_check(mut self, skip: bool) -> Self {
        self.skip_size_check = skip;
        self
    }

    pub fn database(&self) -> &SignatureDatabase {
        &self.db
    }

    /// Check whether a file of `size` bytes needs hashing at all.
    pub fn passes_size_gate(&self, size: u64) -> Result<bool> {
        if self.skip_size_check {
            return Ok(true);
        }
        self.db.has_size(size)
    }

    /// Match a file against the signature database.
    pub fn match_file(&self, path: &Path) -> Result<FileVerdict> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::file_read(path, e))?;
        let size = metadata.len();

        if !self.passes_size_gate(size)? {
            log::trace!("{}: no signature of {} bytes, not hashing", path.display(), size);
            return Ok(FileVerdict {
                size,
                bytes_read: 0,
                matched: None,
            });
        }

        let hashes = HashCalculator::hash_file(path)?;
        Ok(FileVerdict {
            size,
            bytes_read: hashes.bytes_read,
            matched: self.match_hashes(&hashes)?,
        })
    }

    /// Match precomputed digests. MD5 is tried before SHA-256.
    ///
    /// A digest with a record behind it wins over an earlier unconfirmed
    /// pre-filter hit, which is only reported when no digest has a record.
    pub fn match_hashes(&self, hashes: &FileHashes) -> Result<Option<MatchResult>> {
        let mut unconfirmed = None;
        for (kind, digest) in hashes.digests() {
            match self.match_digest(kind, digest)? {
                Some(found) if found.signature.is_some() => return Ok(Some(found)),
                Some(found) => {
                    unconfirmed.get_or_insert(found);
                }
                None => {}
            }
        }
        Ok(unconfirmed)
    }

    /// Match a single digest.
    pub fn match_digest(&self, kind: HashKind, digest: &str) -> Result<Option<MatchResult>> {
        if !self.db.has_hash(digest)? {
            return Ok(None);
        }
        // A trusted pre-filter hit may have no exact record behind it.
        let signature = self.db.get_by_hash(digest)?.cloned();
        Ok(Some(MatchResult {
            hash: digest.to_string(),
            hash_kind: kind,
            signature,
        }))
    }
}

/// Result of a hash match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// The file digest that matched
    pub hash: String,
    /// Algorithm of `hash`
    pub hash_kind: HashKind,
    /// The matching record; `None` for an unconfirmed pre-filter hit
    pub signature: Option<Signature>,
}

impl MatchResult {
    /// Convert to a Detection.
    pub fn to_detection(&self, path: &Path, size: u64) -> Detection {
        match &self.signature {
            Some(sig) => {
                Detection::new(path.to_path_buf(), &sig.label, &self.hash, self.hash_kind, size)
                    .with_comment(&sig.comment)
            }
            None => Detection::new(path.to_path_buf(), "", &self.hash, self.hash_kind, size)
                .with_comment("pre-filter match"),
        }
    }
}

/// Outcome of matching one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileVerdict {
    /// File size from metadata
    pub size: u64,
    /// Bytes read for hashing; zero when the size gate rejected the file
    pub bytes_read: u64,
    pub matched: Option<MatchResult>,
}

impl FileVerdict {
    pub fn is_infected(&self) -> bool {
        self.matched.is_some()
    }
}
