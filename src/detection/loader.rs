//! Signature file discovery and parsing.
//!
//! Supported formats, one record per non-empty line, no header, no quoting:
//!
//! | Extensions                     | Layout                                  |
//! |--------------------------------|-----------------------------------------|
//! | `.hdb` `.hsb` `.hdu` `.hsu`    | `hash:size:label[:...]`, size may be `*` |
//! | `.csv`                         | `hash,kind,size,label[,comment]`        |
//!
//! Any structural problem aborts the load: a half-read signature set would
//! report infected files as clean.

use crate::core::config::UnknownSizeAction;
use crate::core::error::{Error, Result};
use crate::detection::index::{IndexBuilder, IndexStats, Ingest};
use crate::detection::signature::{DeclaredSize, HashKind, Signature};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Lines parsed between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Signature file family, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// ClamAV-style hash database (`hash:size:label`)
    HashDatabase,
    /// Comma-separated export (`hash,kind,size,label,comment`)
    Tabular,
}

impl SignatureFormat {
    /// Detect the format from a path's extension (case insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "hdb" | "hsb" | "hdu" | "hsu" => Some(SignatureFormat::HashDatabase),
            "csv" => Some(SignatureFormat::Tabular),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureFormat::HashDatabase => "hash-database",
            SignatureFormat::Tabular => "tabular",
        }
    }

    /// Parse one non-blank line. The error is a human-readable reason.
    pub fn parse_line(&self, line: &str) -> std::result::Result<Signature, String> {
        match self {
            SignatureFormat::HashDatabase => parse_hash_database_line(line),
            SignatureFormat::Tabular => parse_tabular_line(line),
        }
    }
}

impl std::fmt::Display for SignatureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_hash_database_line(line: &str) -> std::result::Result<Signature, String> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 3 {
        return Err(format!(
            "expected at least 3 ':'-separated fields, found {}",
            fields.len()
        ));
    }

    let hash = required_hash(fields[0])?;
    let size = match fields[1].trim() {
        "*" => DeclaredSize::Unknown,
        raw => DeclaredSize::Known(parse_size(raw)?),
    };

    Ok(Signature::new(hash, size, fields[2]))
}

fn parse_tabular_line(line: &str) -> std::result::Result<Signature, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 4 {
        return Err(format!(
            "expected at least 4 ','-separated fields, found {}",
            fields.len()
        ));
    }

    let hash = required_hash(fields[0])?;
    let size = parse_size(fields[2].trim())?;
    let sig = Signature::new(hash, DeclaredSize::Known(size), fields[3]);
    let kind = HashKind::parse(fields[1]).unwrap_or(sig.hash_kind);

    Ok(sig
        .with_kind(kind)
        .with_comment(fields.get(4).copied().unwrap_or_default()))
}

fn required_hash(field: &str) -> std::result::Result<&str, String> {
    let hash = field.trim();
    if hash.is_empty() {
        Err("empty hash field".to_string())
    } else {
        Ok(hash)
    }
}

fn parse_size(raw: &str) -> std::result::Result<i64, String> {
    raw.parse::<i64>()
        .map_err(|_| format!("invalid file size '{}'", raw))
}

/// Something that happened while loading signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// A signature file is about to be parsed
    FileOpened {
        path: PathBuf,
        format: SignatureFormat,
    },
    /// A wildcard-size record was found
    UnknownSize {
        path: PathBuf,
        line: usize,
        action: UnknownSizeAction,
    },
    /// A signature file was parsed completely
    FileParsed {
        path: PathBuf,
        records: usize,
        skipped: usize,
    },
    /// The pre-filter was built over all loaded hashes
    PrefilterBuilt { hashes: usize, bits: usize },
    /// The database is ready
    LoadComplete { stats: IndexStats },
}

/// Receives [`LoadEvent`]s. Implemented for any `Fn(&LoadEvent)`.
pub trait LoadObserver: Send + Sync {
    fn on_event(&self, event: &LoadEvent);
}

impl<F> LoadObserver for F
where
    F: Fn(&LoadEvent) + Send + Sync,
{
    fn on_event(&self, event: &LoadEvent) {
        self(event)
    }
}

/// Observer that forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LoadObserver for LogObserver {
    fn on_event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::FileOpened { path, format } => {
                log::debug!("Loading {} ({})", path.display(), format);
            }
            LoadEvent::UnknownSize { path, line, action } => match action {
                UnknownSizeAction::Skip => log::debug!(
                    "{}:{} has a signature with unknown size, skipping signature",
                    path.display(),
                    line
                ),
                UnknownSizeAction::DisableSizeChecks => log::debug!(
                    "{}:{} has a signature with unknown size, disabling size checks",
                    path.display(),
                    line
                ),
            },
            LoadEvent::FileParsed {
                path,
                records,
                skipped,
            } => {
                log::debug!(
                    "Parsed {} signature(s) from {} ({} skipped)",
                    records,
                    path.display(),
                    skipped
                );
            }
            LoadEvent::PrefilterBuilt { hashes, bits } => {
                log::debug!("Pre-filter built over {} hashes ({} bits)", hashes, bits);
            }
            LoadEvent::LoadComplete { stats } => {
                log::info!(
                    "Loaded {} signatures from {} file(s)",
                    stats.count,
                    stats.files_loaded
                );
                if stats.size_checks_disabled {
                    log::warn!("Signatures with unknown size present, size checks disabled");
                }
            }
        }
    }
}

/// Cooperative cancellation flag shared between a load and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::LoadCancelled)
        } else {
            Ok(())
        }
    }
}

/// Walks a signature directory and feeds every record into an [`IndexBuilder`].
pub struct SignatureLoader {
    root: PathBuf,
    observer: Arc<dyn LoadObserver>,
    cancel: CancellationToken,
}

impl SignatureLoader {
    /// Create a loader for the signature directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            observer: Arc::new(LogObserver),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root is an existing directory.
    pub fn validate_root(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(Error::config_invalid(
                "database.path",
                format!("{} does not exist", self.root.display()),
            ));
        }
        if !self.root.is_dir() {
            return Err(Error::config_invalid(
                "database.path",
                format!("{} is not a directory", self.root.display()),
            ));
        }
        Ok(())
    }

    /// Load every recognized signature file below the root.
    ///
    /// Files are visited in file-name order within each directory, so when the
    /// same hash appears twice the winner does not depend on the platform.
    pub fn load_into(&self, builder: &mut IndexBuilder) -> Result<()> {
        self.validate_root()?;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            self.cancel.check()?;

            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                let source = e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "file system loop detected")
                });
                Error::DirectoryAccess { path, source }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(format) = SignatureFormat::from_path(entry.path()) {
                self.load_file(entry.path(), format, builder)?;
            }
        }

        Ok(())
    }

    /// Parse a single signature file.
    pub fn load_file(
        &self,
        path: &Path,
        format: SignatureFormat,
        builder: &mut IndexBuilder,
    ) -> Result<()> {
        self.observer.on_event(&LoadEvent::FileOpened {
            path: path.to_path_buf(),
            format,
        });

        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        let reader = BufReader::new(file);

        let mut records = 0usize;
        let mut skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;

            if line_no % CANCEL_CHECK_INTERVAL == 0 {
                self.cancel.check()?;
            }

            let line = line.map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => Error::malformed(path, line_no, "invalid UTF-8"),
                _ => Error::file_read(path, e),
            })?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.trim().is_empty() {
                continue;
            }

            let sig = format
                .parse_line(line)
                .map_err(|reason| Error::malformed(path, line_no, reason))?;

            if sig.declared_size == DeclaredSize::Unknown {
                self.observer.on_event(&LoadEvent::UnknownSize {
                    path: path.to_path_buf(),
                    line: line_no,
                    action: builder.unknown_size_action(),
                });
            }

            match builder.add(sig) {
                Ingest::Indexed | Ingest::Replaced => records += 1,
                Ingest::Skipped => skipped += 1,
            }
        }

        builder.file_loaded();
        self.observer.on_event(&LoadEvent::FileParsed {
            path: path.to_path_buf(),
            records,
            skipped,
        });

        Ok(())
    }
}
