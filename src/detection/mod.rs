//! Signature loading, indexing and matching.
//!
//! - [`loader`] reads signature files into an [`IndexBuilder`]
//! - [`index`] answers exact hash and size queries
//! - [`prefilter`] rejects unknown hashes before the index is searched
//! - [`database`] ties them together behind a load-once facade
//! - [`matcher`] turns a file into a match result

pub mod database;
pub mod index;
pub mod loader;
pub mod matcher;
pub mod prefilter;
pub mod signature;

pub use database::{DatabaseState, DatabaseStats, SignatureDatabase};
pub use index::{IndexBuilder, IndexStats, SignatureIndex, SignatureLookup};
pub use loader::{CancellationToken, LoadEvent, LoadObserver, SignatureFormat, SignatureLoader};
pub use matcher::{FileVerdict, HashMatcher, MatchResult};
pub use prefilter::BloomFilter;
pub use signature::{DeclaredSize, HashKind, Signature};
