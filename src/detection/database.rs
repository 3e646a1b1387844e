//! Signature database facade.
//!
//! A [`SignatureDatabase`] owns the loaded index and the optional Bloom
//! pre-filter and moves through a fixed lifecycle:
//!
//! ```text
//! Unconfigured --load--> Loading --ok--> Ready
//!                                 \--err-> Failed
//! ```
//!
//! Queries are only answered in `Ready`. Once ready the database is
//! read-only, so it can be shared behind an `Arc` by any number of scan
//! workers without locking.

use crate::core::config::{DatabaseConfig, PrefilterHits};
use crate::core::error::{Error, Result};
use crate::detection::index::{IndexBuilder, IndexStats, SignatureIndex, SignatureLookup};
use crate::detection::loader::{
    CancellationToken, LoadEvent, LoadObserver, LogObserver, SignatureLoader,
};
use crate::detection::prefilter::BloomFilter;
use crate::detection::signature::{normalize_hash, Signature};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Lifecycle state of a [`SignatureDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseState {
    /// Configured but not loaded yet
    Unconfigured,
    /// A load is in progress
    Loading,
    /// Loaded and answering queries
    Ready,
    /// The load failed; the instance must be discarded
    Failed,
}

impl DatabaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseState::Unconfigured => "unconfigured",
            DatabaseState::Loading => "loading",
            DatabaseState::Ready => "ready",
            DatabaseState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-filter sizing, reported with the database stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrefilterInfo {
    pub bits: usize,
    pub hash_functions: u32,
    pub memory_bytes: usize,
}

/// Statistics for a loaded database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
    #[serde(flatten)]
    pub index: IndexStats,
    /// Absent when the pre-filter is disabled
    pub prefilter: Option<PrefilterInfo>,
}

impl DatabaseStats {
    /// Number of distinct signature hashes.
    pub fn count(&self) -> usize {
        self.index.count
    }
}

/// Loaded signature set with hash and size queries.
pub struct SignatureDatabase {
    config: DatabaseConfig,
    state: DatabaseState,
    index: Option<SignatureIndex>,
    prefilter: Option<BloomFilter>,
    observer: Arc<dyn LoadObserver>,
    cancel: CancellationToken,
}

impl SignatureDatabase {
    /// Create an unloaded database. Fails if the configuration is invalid.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: DatabaseState::Unconfigured,
            index: None,
            prefilter: None,
            observer: Arc::new(LogObserver),
            cancel: CancellationToken::new(),
        })
    }

    /// Create and load a database in one step.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let mut db = Self::new(config)?;
        db.load()?;
        Ok(db)
    }

    /// Open the signature directory at `path` with default settings.
    pub fn open_dir(path: &Path) -> Result<Self> {
        Self::open(DatabaseConfig::new(path))
    }

    /// Replace the load event observer.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach a cancellation token checked during [`load`](Self::load).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn state(&self) -> DatabaseState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DatabaseState::Ready
    }

    /// Load every signature file below the configured directory.
    ///
    /// Succeeds at most once per instance. On failure the database moves to
    /// [`DatabaseState::Failed`] and every later query is rejected.
    pub fn load(&mut self) -> Result<()> {
        if self.state != DatabaseState::Unconfigured {
            return Err(Error::DatabaseAlreadyLoaded);
        }

        self.state = DatabaseState::Loading;
        match self.build() {
            Ok((index, prefilter)) => {
                let stats = index.stats().clone();
                self.index = Some(index);
                self.prefilter = prefilter;
                self.state = DatabaseState::Ready;
                self.observer.on_event(&LoadEvent::LoadComplete { stats });
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load signature database: {}", e);
                self.state = DatabaseState::Failed;
                Err(e)
            }
        }
    }

    fn build(&self) -> Result<(SignatureIndex, Option<BloomFilter>)> {
        let root = self.config.signature_dir();
        log::info!("Loading signatures from {}", root.display());

        let loader = SignatureLoader::new(root)
            .with_observer(Arc::clone(&self.observer))
            .with_cancellation(self.cancel.clone());

        let mut builder = IndexBuilder::new(self.config.unknown_size);
        loader.load_into(&mut builder)?;
        let index = builder.build();

        let prefilter = if self.config.use_prefilter {
            let filter = BloomFilter::from_hashes(
                index.sorted_hashes().iter().map(String::as_str),
                self.config.prefilter_fp_rate,
            );
            self.observer.on_event(&LoadEvent::PrefilterBuilt {
                hashes: filter.len(),
                bits: filter.num_bits(),
            });
            Some(filter)
        } else {
            None
        };

        Ok((index, prefilter))
    }

    fn ready_index(&self) -> Result<&SignatureIndex> {
        match (self.state, &self.index) {
            (DatabaseState::Ready, Some(index)) => Ok(index),
            (state, _) => Err(Error::DatabaseNotReady {
                state: state.to_string(),
            }),
        }
    }

    /// Check whether a signature with this digest exists.
    ///
    /// A pre-filter miss is final. A pre-filter hit is confirmed against the
    /// exact index unless the database is configured to trust the filter.
    pub fn has_hash(&self, hash: &str) -> Result<bool> {
        let index = self.ready_index()?;
        if let Some(filter) = &self.prefilter {
            if !filter.test(&normalize_hash(hash)) {
                return Ok(false);
            }
            if self.config.prefilter_hits == PrefilterHits::Trust {
                return Ok(true);
            }
        }
        Ok(index.contains_hash(hash))
    }

    /// Check whether a file of `size` bytes could match any signature.
    pub fn has_size(&self, size: u64) -> Result<bool> {
        Ok(SignatureLookup::has_size(self.ready_index()?, size))
    }

    /// Get the signature for a digest.
    pub fn get_by_hash(&self, hash: &str) -> Result<Option<&Signature>> {
        Ok(self.ready_index()?.get_by_hash(hash))
    }

    /// Get any signature declaring exactly `size` bytes.
    pub fn get_by_size(&self, size: u64) -> Result<Option<&Signature>> {
        Ok(self.ready_index()?.get_by_size(size))
    }

    /// Whether a wildcard-size signature turned size filtering off.
    pub fn size_checks_disabled(&self) -> Result<bool> {
        Ok(self.ready_index()?.size_checks_disabled())
    }

    /// Statistics for the loaded signature set.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let index = self.ready_index()?;
        Ok(DatabaseStats {
            index: index.stats().clone(),
            prefilter: self.prefilter.as_ref().map(|filter| PrefilterInfo {
                bits: filter.num_bits(),
                hash_functions: filter.num_hashes(),
                memory_bytes: filter.memory_bytes(),
            }),
        })
    }
}

impl std::fmt::Debug for SignatureDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureDatabase")
            .field("path", &self.config.signature_dir())
            .field("state", &self.state)
            .field("signatures", &self.index.as_ref().map(SignatureIndex::len))
            .field("prefilter", &self.prefilter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::UnknownSizeAction;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn signature_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn config(dir: &TempDir) -> DatabaseConfig {
        DatabaseConfig::new(dir.path())
    }

    fn random_md5(rng: &mut StdRng) -> String {
        let bytes: [u8; 16] = rng.gen();
        hex::encode(bytes)
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_database_is_shareable() {
        assert_send_sync::<SignatureDatabase>();
    }

    #[test]
    fn test_empty_file_signature() {
        let dir = signature_dir(&[(
            "sigs.hdb",
            "d41d8cd98f00b204e9800998ecf8427e:0:Empty.Test\n",
        )]);
        let db = SignatureDatabase::open_dir(dir.path()).unwrap();

        assert_eq!(db.state(), DatabaseState::Ready);
        assert!(!db.has_hash("ffffffffffffffffffffffffffffffff").unwrap());
        assert!(db.has_hash(EMPTY_MD5).unwrap());
        assert!(db.has_hash("D41D8CD98F00B204E9800998ECF8427E").unwrap());
        assert!(db.has_size(0).unwrap());
        assert!(!db.has_size(1).unwrap());
        assert_eq!(db.get_by_hash(EMPTY_MD5).unwrap().unwrap().label, "Empty.Test");
        assert_eq!(db.get_by_size(0).unwrap().unwrap().hash, EMPTY_MD5);
        assert!(db.get_by_size(1).unwrap().is_none());
        assert_eq!(db.stats().unwrap().count(), 1);
    }

    #[test]
    fn test_duplicate_across_files_keeps_both_sizes() {
        let dir = signature_dir(&[
            ("a.hdb", &format!("{}:5:Old\n", EMPTY_MD5)),
            ("b.hdb", &format!("{}:99:New\n", EMPTY_MD5)),
        ]);
        let db = SignatureDatabase::open_dir(dir.path()).unwrap();

        assert!(db.has_size(5).unwrap());
        assert!(db.has_size(99).unwrap());
        assert!(db.has_hash(EMPTY_MD5).unwrap());
        assert_eq!(db.get_by_hash(EMPTY_MD5).unwrap().unwrap().label, "New");
        assert!(db.get_by_size(5).unwrap().is_none());
        assert_eq!(db.stats().unwrap().count(), 1);
    }

    #[test]
    fn test_unknown_size_disables_size_checks() {
        let dir = signature_dir(&[(
            "sigs.hdb",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:*:Wildcard.Test\n\
             bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb:10:Sized\n",
        )]);

        let mut cfg = config(&dir);
        cfg.unknown_size = UnknownSizeAction::DisableSizeChecks;
        let db = SignatureDatabase::open(cfg).unwrap();
        assert!(db.size_checks_disabled().unwrap());
        assert!(db.has_size(123_456).unwrap());
        assert!(db.has_hash(&"a".repeat(32)).unwrap());

        let db = SignatureDatabase::open(config(&dir)).unwrap();
        assert!(!db.size_checks_disabled().unwrap());
        assert!(!db.has_size(123_456).unwrap());
        assert!(db.has_size(10).unwrap());
        assert!(!db.has_hash(&"a".repeat(32)).unwrap());
        assert_eq!(db.stats().unwrap().index.skipped_unknown_size, 1);
    }

    #[test]
    fn test_malformed_file_fails_load() {
        let dir = signature_dir(&[("bad.hdb", "onlyonefield\n")]);
        let mut db = SignatureDatabase::new(config(&dir)).unwrap();

        let err = db.load().unwrap_err();
        assert!(matches!(err, Error::MalformedSignature { line: 1, .. }));
        assert_eq!(db.state(), DatabaseState::Failed);

        assert!(matches!(
            db.has_hash(EMPTY_MD5),
            Err(Error::DatabaseNotReady { .. })
        ));
        assert!(db.has_size(0).is_err());
        assert!(db.stats().is_err());
    }

    #[test]
    fn test_queries_before_load_are_rejected() {
        let dir = signature_dir(&[]);
        let db = SignatureDatabase::new(config(&dir)).unwrap();
        assert_eq!(db.state(), DatabaseState::Unconfigured);
        match db.has_hash(EMPTY_MD5) {
            Err(Error::DatabaseNotReady { state }) => assert_eq!(state, "unconfigured"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_directory_loads_empty_database() {
        let dir = signature_dir(&[("readme.txt", "not a signature file")]);
        let db = SignatureDatabase::open(config(&dir)).unwrap();
        assert!(db.is_ready());
        assert!(!db.has_hash(EMPTY_MD5).unwrap());
        assert!(!db.has_size(0).unwrap());
        assert_eq!(db.stats().unwrap().count(), 0);
    }

    #[test]
    fn test_second_load_is_rejected() {
        let dir = signature_dir(&[("main.hdb", "d41d8cd98f00b204e9800998ecf8427e:0:Empty.Test\n")]);
        let mut db = SignatureDatabase::new(config(&dir)).unwrap();
        db.load().unwrap();
        assert!(matches!(db.load(), Err(Error::DatabaseAlreadyLoaded)));
        assert!(db.is_ready());
    }

    #[test]
    fn test_invalid_fp_rate_rejected_at_construction() {
        let dir = signature_dir(&[]);
        for rate in [0.0, 1.0, -0.5, f64::NAN] {
            let mut cfg = config(&dir);
            cfg.prefilter_fp_rate = rate;
            assert!(matches!(
                SignatureDatabase::new(cfg),
                Err(Error::ConfigInvalid { .. })
            ));
        }
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = signature_dir(&[]);
        let mut db = SignatureDatabase::new(DatabaseConfig::new(dir.path().join("nope"))).unwrap();
        assert!(db.load().is_err());
        assert_eq!(db.state(), DatabaseState::Failed);
    }

    #[test]
    fn test_prefilter_agrees_with_exact_index() {
        let mut rng = StdRng::seed_from_u64(7);
        let members: Vec<String> = (0..2_000).map(|_| random_md5(&mut rng)).collect();
        let content: String = members
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}:{}:Sample.{}\n", h, i, i))
            .collect();
        let dir = signature_dir(&[("bulk.hdb", &content)]);

        let with_filter = SignatureDatabase::open(config(&dir)).unwrap();
        let mut cfg = config(&dir);
        cfg.use_prefilter = false;
        let without_filter = SignatureDatabase::open(cfg).unwrap();

        assert!(with_filter.stats().unwrap().prefilter.is_some());
        assert!(without_filter.stats().unwrap().prefilter.is_none());

        for hash in &members {
            assert!(with_filter.has_hash(hash).unwrap());
            assert!(without_filter.has_hash(hash).unwrap());
        }
        for _ in 0..10_000 {
            let probe = random_md5(&mut rng);
            assert_eq!(
                with_filter.has_hash(&probe).unwrap(),
                without_filter.has_hash(&probe).unwrap()
            );
        }
    }

    #[test]
    fn test_trusted_prefilter_false_positive_rate() {
        let mut rng = StdRng::seed_from_u64(99);
        let members: Vec<String> = (0..5_000).map(|_| random_md5(&mut rng)).collect();
        let content: String = members.iter().map(|h| format!("{}:1:X\n", h)).collect();
        let dir = signature_dir(&[("bulk.hdb", &content)]);

        let mut cfg = config(&dir);
        cfg.prefilter_hits = PrefilterHits::Trust;
        cfg.prefilter_fp_rate = 0.01;
        let db = SignatureDatabase::open(cfg).unwrap();

        for hash in &members {
            assert!(db.has_hash(hash).unwrap());
        }

        let samples = 20_000;
        let false_positives = (0..samples)
            .map(|_| random_md5(&mut rng))
            .filter(|h| db.has_hash(h).unwrap())
            .count();
        let observed = false_positives as f64 / samples as f64;
        assert!(observed < 0.03, "observed false positive rate {}", observed);
    }

    #[test]
    fn test_load_events_reported() {
        let dir = signature_dir(&[("main.hdb", "d41d8cd98f00b204e9800998ecf8427e:0:Empty.Test\n")]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let observer = move |event: &LoadEvent| sink.lock().unwrap().push(event.clone());

        let mut db = SignatureDatabase::new(config(&dir))
            .unwrap()
            .with_observer(Arc::new(observer));
        db.load().unwrap();

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::PrefilterBuilt { hashes: 1, .. })));
        match events.last() {
            Some(LoadEvent::LoadComplete { stats }) => assert_eq!(stats.count, 1),
            other => panic!("unexpected last event: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_load_fails() {
        let dir = signature_dir(&[("main.hdb", "d41d8cd98f00b204e9800998ecf8427e:0:Empty.Test\n")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut db = SignatureDatabase::new(config(&dir))
            .unwrap()
            .with_cancellation(cancel);
        let err = db.load().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(db.state(), DatabaseState::Failed);
    }
}
