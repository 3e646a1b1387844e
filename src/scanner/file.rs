//! File system scanner implementation.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{Detection, ScanStatus, ScanSummary};
use crate::detection::database::SignatureDatabase;
use crate::detection::matcher::{FileVerdict, HashMatcher};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Upper bound on parallel workers regardless of configuration.
const MAX_WORKERS: usize = 16;

/// Scan result from a worker task.
#[derive(Debug)]
enum ScanResult {
    /// A file matched a signature
    Detection { detection: Detection, bytes_read: u64 },
    /// A file was examined and is clean
    FileScanned { size: u64, bytes_read: u64 },
    /// The file could not be examined
    Error(String),
}

/// File system scanner.
pub struct FileScanner {
    config: Arc<Config>,
    matcher: Arc<HashMatcher>,
    cancelled: Arc<AtomicBool>,
}

impl FileScanner {
    /// Create a scanner over a loaded signature database.
    pub fn new(config: Arc<Config>, db: Arc<SignatureDatabase>) -> Result<Self> {
        let matcher = HashMatcher::new(db)?.with_skip_size_check(config.scan.skip_size_check);
        Ok(Self {
            config,
            matcher: Arc::new(matcher),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Cancel the current scan.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the scan has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check if a path falls under one of the excluded paths.
    pub fn should_exclude(&self, path: &Path) -> bool {
        self.config
            .scan
            .exclude_paths
            .iter()
            .any(|excluded| path.starts_with(excluded))
    }

    /// Path as it should appear in results.
    pub fn report_path(&self, path: &Path) -> PathBuf {
        if !self.config.scan.full_path || path.is_absolute() {
            return path.to_path_buf();
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Scan files and directories.
    ///
    /// Directories are only entered when `scan.recursive` is set; otherwise
    /// they are logged and skipped. Per-file failures are counted in the
    /// summary and do not stop the scan.
    pub async fn scan_paths(&self, paths: Vec<PathBuf>) -> Result<ScanSummary> {
        log::info!("Starting scan of {} path(s)", paths.len());

        let mut summary = ScanSummary::new();
        summary.status = ScanStatus::Running;

        let file_queue = Arc::new(Mutex::new(VecDeque::new()));

        for path in &paths {
            if self.is_cancelled() {
                break;
            }

            match std::fs::metadata(path) {
                Err(e) => {
                    log::error!("Cannot access {}: {}", path.display(), e);
                    summary.errors += 1;
                }
                Ok(metadata) if metadata.is_dir() => {
                    if self.config.scan.recursive {
                        self.collect_files(path, &file_queue, &mut summary)?;
                    } else {
                        log::info!("{} is a directory, ignoring", path.display());
                    }
                }
                Ok(_) if self.should_exclude(path) => {
                    log::debug!("Excluded: {}", path.display());
                }
                Ok(_) => {
                    file_queue
                        .lock()
                        .map_err(|_| Error::lock_poisoned("file queue (add file)"))?
                        .push_back(self.report_path(path));
                }
            }
        }

        let total_files = file_queue
            .lock()
            .map_err(|_| Error::lock_poisoned("file queue (count)"))?
            .len();
        log::debug!("Found {} files to scan", total_files);

        let (tx, mut rx) = mpsc::channel::<ScanResult>(1000);

        let num_workers = self.config.scan.scan_threads.clamp(1, MAX_WORKERS);
        let mut handles = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let queue = Arc::clone(&file_queue);
            let matcher = Arc::clone(&self.matcher);
            let cancelled = Arc::clone(&self.cancelled);
            let tx = tx.clone();

            let handle = tokio::spawn(async move {
                loop {
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }

                    let path = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => {
                            log::error!("File queue lock poisoned in worker");
                            break;
                        }
                    };
                    let Some(path) = path else {
                        break;
                    };

                    let result = Self::scan_file_blocking(Arc::clone(&matcher), path).await;
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
            });

            handles.push(handle);
        }

        // Channel closes once every worker has dropped its sender.
        drop(tx);

        while let Some(result) = rx.recv().await {
            match result {
                ScanResult::Detection {
                    detection,
                    bytes_read,
                } => {
                    log::warn!(
                        "Virus found in {}: {}",
                        detection.path.display(),
                        detection.display_name()
                    );
                    summary.files_scanned += 1;
                    summary.bytes_scanned += detection.size;
                    summary.bytes_read += bytes_read;
                    summary.threats_found += 1;
                    summary.detections.push(detection);
                }
                ScanResult::FileScanned { size, bytes_read } => {
                    summary.files_scanned += 1;
                    summary.bytes_scanned += size;
                    summary.bytes_read += bytes_read;
                }
                ScanResult::Error(msg) => {
                    log::error!("{}", msg);
                    summary.errors += 1;
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Scan worker failed: {}", e);
                summary.errors += 1;
            }
        }

        summary.detections.sort_by(|a, b| a.path.cmp(&b.path));

        if self.is_cancelled() {
            summary.cancel();
        } else {
            summary.complete();
        }

        log::info!(
            "Scan completed: {} files scanned, {} threats found, {} errors",
            summary.files_scanned,
            summary.threats_found,
            summary.errors
        );

        Ok(summary)
    }

    /// Collect files below a directory into the queue.
    fn collect_files(
        &self,
        root: &Path,
        queue: &Arc<Mutex<VecDeque<PathBuf>>>,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let walker = WalkDir::new(root)
            .follow_links(self.config.scan.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.should_exclude(e.path()));

        for entry in walker {
            if self.is_cancelled() {
                break;
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::error!("Error walking path: {}", e);
                    summary.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                summary.directories_scanned += 1;
            } else if file_type.is_file() {
                queue
                    .lock()
                    .map_err(|_| Error::lock_poisoned("file queue (collect)"))?
                    .push_back(self.report_path(entry.path()));
            }
        }

        Ok(())
    }

    /// Match one file on the blocking pool and package the outcome.
    async fn scan_file_blocking(matcher: Arc<HashMatcher>, path: PathBuf) -> ScanResult {
        let task_path = path.clone();
        let outcome = tokio::task::spawn_blocking(move || matcher.match_file(&task_path)).await;

        match outcome {
            Ok(Ok(verdict)) => Self::classify(&path, verdict),
            Ok(Err(e)) => ScanResult::Error(format!("Error scanning {}: {}", path.display(), e)),
            Err(e) => ScanResult::Error(format!("Scan task for {} failed: {}", path.display(), e)),
        }
    }

    fn classify(path: &Path, verdict: FileVerdict) -> ScanResult {
        match verdict.matched {
            Some(found) => ScanResult::Detection {
                detection: found.to_detection(path, verdict.size),
                bytes_read: verdict.bytes_read,
            },
            None => {
                log::debug!("No viruses found in {}", path.display());
                ScanResult::FileScanned {
                    size: verdict.size,
                    bytes_read: verdict.bytes_read,
                }
            }
        }
    }

    /// Scan a single file.
    pub async fn scan_file(&self, path: &Path) -> Result<Option<Detection>> {
        let matcher = Arc::clone(&self.matcher);
        let path = self.report_path(path);
        let task_path = path.clone();
        let verdict = tokio::task::spawn_blocking(move || matcher.match_file(&task_path))
            .await
            .map_err(|e| Error::scan_error(&path, e.to_string()))??;

        Ok(verdict
            .matched
            .map(|found| found.to_detection(&path, verdict.size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DatabaseConfig;
    use std::fs;
    use tempfile::TempDir;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    struct Fixture {
        _dir: TempDir,
        targets: PathBuf,
        db: Arc<SignatureDatabase>,
    }

    /// Signature for "hello" plus a target tree:
    /// `top.txt` (clean), `hello.txt` (infected), `sub/nested_hello.txt` (infected),
    /// `sub/big.bin` (clean, size gated out).
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let sigs = dir.path().join("sigs");
        fs::create_dir(&sigs).unwrap();
        fs::write(sigs.join("main.hdb"), format!("{}:5:Hello.Test\n", HELLO_MD5)).unwrap();

        let targets = dir.path().join("targets");
        fs::create_dir_all(targets.join("sub")).unwrap();
        fs::write(targets.join("top.txt"), b"world").unwrap();
        fs::write(targets.join("hello.txt"), b"hello").unwrap();
        fs::write(targets.join("sub").join("nested_hello.txt"), b"hello").unwrap();
        fs::write(targets.join("sub").join("big.bin"), vec![7u8; 1000]).unwrap();

        let db = SignatureDatabase::open(DatabaseConfig::new(&sigs)).unwrap();
        Fixture {
            _dir: dir,
            targets,
            db: Arc::new(db),
        }
    }

    fn scanner(fx: &Fixture, configure: impl FnOnce(&mut Config)) -> FileScanner {
        let mut config = Config::default();
        config.scan.scan_threads = 2;
        configure(&mut config);
        FileScanner::new(Arc::new(config), Arc::clone(&fx.db)).unwrap()
    }

    #[tokio::test]
    async fn test_recursive_scan() {
        let fx = fixture();
        let scanner = scanner(&fx, |c| c.scan.recursive = true);

        let summary = scanner.scan_paths(vec![fx.targets.clone()]).await.unwrap();
        assert_eq!(summary.status, ScanStatus::Completed);
        assert_eq!(summary.files_scanned, 4);
        assert_eq!(summary.directories_scanned, 2);
        assert_eq!(summary.threats_found, 2);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.bytes_scanned, 5 + 5 + 5 + 1000);
        // The 1000-byte file never passes the size gate.
        assert_eq!(summary.bytes_read, 15);

        let names: Vec<_> = summary
            .detections
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["hello.txt", "nested_hello.txt"]);
        assert!(summary.detections.iter().all(|d| d.threat_name == "Hello.Test"));
    }

    #[tokio::test]
    async fn test_directory_ignored_without_recursion() {
        let fx = fixture();
        let scanner = scanner(&fx, |_| {});

        let summary = scanner
            .scan_paths(vec![fx.targets.clone(), fx.targets.join("hello.txt")])
            .await
            .unwrap();
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.directories_scanned, 0);
        assert_eq!(summary.threats_found, 1);
    }

    #[tokio::test]
    async fn test_skip_size_check_reads_everything() {
        let fx = fixture();
        let scanner = scanner(&fx, |c| {
            c.scan.recursive = true;
            c.scan.skip_size_check = true;
        });

        let summary = scanner.scan_paths(vec![fx.targets.clone()]).await.unwrap();
        assert_eq!(summary.bytes_read, summary.bytes_scanned);
        assert_eq!(summary.threats_found, 2);
    }

    #[tokio::test]
    async fn test_excluded_paths_are_skipped() {
        let fx = fixture();
        let excluded = fx.targets.join("sub").to_string_lossy().into_owned();
        let scanner = scanner(&fx, |c| {
            c.scan.recursive = true;
            c.scan.exclude_paths = vec![excluded];
        });

        let summary = scanner.scan_paths(vec![fx.targets.clone()]).await.unwrap();
        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.threats_found, 1);
    }

    #[tokio::test]
    async fn test_excluded_file_named_directly_is_skipped() {
        let fx = fixture();
        let excluded = fx.targets.join("sub").to_string_lossy().into_owned();
        let scanner = scanner(&fx, |c| c.scan.exclude_paths = vec![excluded]);

        let summary = scanner
            .scan_paths(vec![
                fx.targets.join("sub").join("nested_hello.txt"),
                fx.targets.join("hello.txt"),
            ])
            .await
            .unwrap();
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.threats_found, 1);
        assert!(summary.detections[0].path.ends_with("hello.txt"));
        assert!(!summary.detections[0].path.ends_with("nested_hello.txt"));
    }

    #[tokio::test]
    async fn test_missing_path_counts_error() {
        let fx = fixture();
        let scanner = scanner(&fx, |_| {});

        let summary = scanner
            .scan_paths(vec![fx.targets.join("missing.txt")])
            .await
            .unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.files_scanned, 0);
        assert_eq!(summary.status, ScanStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_scan() {
        let fx = fixture();
        let scanner = scanner(&fx, |c| c.scan.recursive = true);
        scanner.cancel();

        let summary = scanner.scan_paths(vec![fx.targets.clone()]).await.unwrap();
        assert_eq!(summary.status, ScanStatus::Cancelled);
        assert_eq!(summary.files_scanned, 0);
    }

    #[tokio::test]
    async fn test_scan_single_file() {
        let fx = fixture();
        let scanner = scanner(&fx, |_| {});

        let hit = scanner.scan_file(&fx.targets.join("hello.txt")).await.unwrap();
        assert_eq!(hit.unwrap().threat_name, "Hello.Test");

        let miss = scanner.scan_file(&fx.targets.join("top.txt")).await.unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_report_path() {
        let fx = fixture();
        let relative = Path::new("some/file.txt");

        let plain = scanner(&fx, |_| {});
        assert_eq!(plain.report_path(relative), relative);

        let full = scanner(&fx, |c| c.scan.full_path = true);
        let reported = full.report_path(relative);
        assert!(reported.is_absolute());
        assert!(reported.ends_with("some/file.txt"));
    }

    #[test]
    fn test_unloaded_database_rejected() {
        let dir = TempDir::new().unwrap();
        let db = SignatureDatabase::new(DatabaseConfig::new(dir.path())).unwrap();
        let result = FileScanner::new(Arc::new(Config::default()), Arc::new(db));
        assert!(matches!(result, Err(Error::DatabaseNotReady { .. })));
    }
}
