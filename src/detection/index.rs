//! In-memory signature index.
//!
//! [`IndexBuilder`] accumulates records while signature files are parsed and
//! applies the unknown-size policy. [`IndexBuilder::build`] freezes the result
//! into a [`SignatureIndex`], which is never mutated afterwards and can be read
//! from any number of threads without locking.

use crate::core::config::UnknownSizeAction;
use crate::detection::signature::{normalize_hash, DeclaredSize, HashKind, Signature};
use serde::Serialize;
use std::collections::HashMap;

/// Query contract shared by signature stores.
pub trait SignatureLookup: Send + Sync {
    /// Check whether a signature with this digest exists.
    fn has_hash(&self, hash: &str) -> bool;

    /// Check whether a file of this size could match any signature.
    fn has_size(&self, size: u64) -> bool;

    /// Get the signature for a digest.
    fn get_by_hash(&self, hash: &str) -> Option<&Signature>;
}

/// Outcome of adding one record to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// New hash
    Indexed,
    /// Hash was already present; the new record replaced the old one
    Replaced,
    /// Wildcard-size record dropped under [`UnknownSizeAction::Skip`]
    Skipped,
}

/// Counters describing a loaded index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of distinct indexed hashes
    pub count: usize,
    pub md5: usize,
    pub sha1: usize,
    pub sha256: usize,
    /// Hashes of unrecognized length
    pub other: usize,
    /// Signature lines parsed, including skipped and duplicate ones
    pub records_parsed: usize,
    /// Records that overwrote an earlier record with the same hash
    pub duplicates: usize,
    /// Wildcard-size records dropped by the skip policy
    pub skipped_unknown_size: usize,
    /// Signature files read
    pub files_loaded: usize,
    /// Whether every size check passes
    pub size_checks_disabled: bool,
}

/// Accumulates records during a load.
#[derive(Debug)]
pub struct IndexBuilder {
    unknown_size: UnknownSizeAction,
    records: HashMap<String, Signature>,
    /// Known sizes of every accepted record, including replaced duplicates
    sizes: Vec<i64>,
    size_checks_disabled: bool,
    records_parsed: usize,
    duplicates: usize,
    skipped_unknown_size: usize,
    files_loaded: usize,
}

impl IndexBuilder {
    /// Create a builder applying `unknown_size` to wildcard-size records.
    pub fn new(unknown_size: UnknownSizeAction) -> Self {
        Self {
            unknown_size,
            records: HashMap::new(),
            sizes: Vec::new(),
            size_checks_disabled: false,
            records_parsed: 0,
            duplicates: 0,
            skipped_unknown_size: 0,
            files_loaded: 0,
        }
    }

    /// The unknown-size policy in effect.
    pub fn unknown_size_action(&self) -> UnknownSizeAction {
        self.unknown_size
    }

    /// Add a parsed record. Later records win over earlier ones with the same hash.
    pub fn add(&mut self, sig: Signature) -> Ingest {
        self.records_parsed += 1;

        if sig.declared_size == DeclaredSize::Unknown {
            match self.unknown_size {
                UnknownSizeAction::Skip => {
                    self.skipped_unknown_size += 1;
                    return Ingest::Skipped;
                }
                UnknownSizeAction::DisableSizeChecks => self.size_checks_disabled = true,
            }
        }

        if let Some(size) = sig.declared_size.known() {
            self.sizes.push(size);
        }

        match self.records.insert(sig.hash.clone(), sig) {
            Some(_) => {
                self.duplicates += 1;
                Ingest::Replaced
            }
            None => Ingest::Indexed,
        }
    }

    /// Count a signature file as read.
    pub fn file_loaded(&mut self) {
        self.files_loaded += 1;
    }

    /// Number of distinct hashes accepted so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the accumulated records into a queryable index.
    pub fn build(self) -> SignatureIndex {
        let mut sorted_hashes: Vec<String> = self.records.keys().cloned().collect();
        sorted_hashes.sort_unstable();

        let mut sorted_sizes = self.sizes;
        sorted_sizes.sort_unstable();
        sorted_sizes.dedup();

        let mut stats = IndexStats {
            count: sorted_hashes.len(),
            records_parsed: self.records_parsed,
            duplicates: self.duplicates,
            skipped_unknown_size: self.skipped_unknown_size,
            files_loaded: self.files_loaded,
            size_checks_disabled: self.size_checks_disabled,
            ..IndexStats::default()
        };
        for sig in self.records.values() {
            match sig.hash_kind {
                HashKind::Md5 => stats.md5 += 1,
                HashKind::Sha1 => stats.sha1 += 1,
                HashKind::Sha256 => stats.sha256 += 1,
                HashKind::Unknown => stats.other += 1,
            }
        }

        SignatureIndex {
            sorted_hashes,
            sorted_sizes,
            hash_to_record: self.records,
            size_checks_disabled: self.size_checks_disabled,
            stats,
        }
    }
}

/// Immutable signature index.
#[derive(Debug, Clone)]
pub struct SignatureIndex {
    sorted_hashes: Vec<String>,
    sorted_sizes: Vec<i64>,
    hash_to_record: HashMap<String, Signature>,
    size_checks_disabled: bool,
    stats: IndexStats,
}

impl SignatureIndex {
    /// Build an index directly from records.
    pub fn from_signatures<I>(signatures: I, unknown_size: UnknownSizeAction) -> Self
    where
        I: IntoIterator<Item = Signature>,
    {
        let mut builder = IndexBuilder::new(unknown_size);
        for sig in signatures {
            builder.add(sig);
        }
        builder.build()
    }

    /// Binary search for a hash in the sorted hash list.
    pub fn contains_hash(&self, hash: &str) -> bool {
        let hash = normalize_hash(hash);
        self.sorted_hashes
            .binary_search_by(|probe| probe.as_str().cmp(hash.as_ref()))
            .is_ok()
    }

    /// Binary search for a declared size, ignoring the size-check switch.
    pub fn contains_size(&self, size: u64) -> bool {
        i64::try_from(size).is_ok_and(|size| self.sorted_sizes.binary_search(&size).is_ok())
    }

    /// First signature, in hash order, declaring exactly `size` bytes.
    ///
    /// Linear scan over all records; meant for diagnostics, not the scan path.
    pub fn get_by_size(&self, size: u64) -> Option<&Signature> {
        self.sorted_hashes
            .iter()
            .filter_map(|hash| self.hash_to_record.get(hash))
            .find(|sig| sig.declared_size.matches(size))
    }

    /// Whether a wildcard-size signature turned off size filtering.
    pub fn size_checks_disabled(&self) -> bool {
        self.size_checks_disabled
    }

    /// All hashes in ascending order.
    pub fn sorted_hashes(&self) -> &[String] {
        &self.sorted_hashes
    }

    /// All known declared sizes in ascending order.
    pub fn sorted_sizes(&self) -> &[i64] {
        &self.sorted_sizes
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.sorted_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_hashes.is_empty()
    }
}

impl SignatureLookup for SignatureIndex {
    fn has_hash(&self, hash: &str) -> bool {
        self.contains_hash(hash)
    }

    fn has_size(&self, size: u64) -> bool {
        self.size_checks_disabled || self.contains_size(size)
    }

    fn get_by_hash(&self, hash: &str) -> Option<&Signature> {
        self.hash_to_record.get(normalize_hash(hash).as_ref())
    }
}
