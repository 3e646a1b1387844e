//! Configuration management for hashguard.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default false positive rate for the signature pre-filter.
pub const DEFAULT_PREFILTER_FP_RATE: f64 = 0.01;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signature database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Scan-related settings
    #[serde(default)]
    pub scan: ScanConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                }
            }
        }

        let config = Self::default();

        if let Err(e) = config.save(&config_path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hashguard")
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;

        if self.scan.scan_threads == 0 {
            return Err(Error::config_invalid(
                "scan.scan_threads",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// What to do with a signature whose size is the wildcard `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSizeAction {
    /// Drop the signature entirely
    #[default]
    Skip,
    /// Keep the signature and make every size check pass
    DisableSizeChecks,
}

impl UnknownSizeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownSizeAction::Skip => "skip",
            UnknownSizeAction::DisableSizeChecks => "disable_size_checks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" | "ignore" => Some(UnknownSizeAction::Skip),
            "disable" | "disable_size_checks" | "disable-size-checks" => {
                Some(UnknownSizeAction::DisableSizeChecks)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for UnknownSizeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How positive answers from the pre-filter are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefilterHits {
    /// Verify every pre-filter hit against the exact index
    #[default]
    Confirm,
    /// Report pre-filter hits directly (faster, leaks false positives)
    Trust,
}

/// Signature database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory containing signature files
    pub path: Option<PathBuf>,
    /// Build a Bloom filter over all hashes at load time
    pub use_prefilter: bool,
    /// Target false positive rate for the pre-filter, in (0, 1)
    pub prefilter_fp_rate: f64,
    /// Policy for signatures with a wildcard size
    pub unknown_size: UnknownSizeAction,
    /// Policy for pre-filter positives
    pub prefilter_hits: PrefilterHits,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            use_prefilter: true,
            prefilter_fp_rate: DEFAULT_PREFILTER_FP_RATE,
            unknown_size: UnknownSizeAction::default(),
            prefilter_hits: PrefilterHits::default(),
        }
    }
}

impl DatabaseConfig {
    /// Create a database config for a signature directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Get the effective signature directory.
    pub fn signature_dir(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("signatures"))
    }

    /// Validate settings that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        let rate = self.prefilter_fp_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(Error::config_invalid(
                "database.prefilter_fp_rate",
                format!("Must be between 0 and 1 (exclusive), got {}", rate),
            ));
        }
        Ok(())
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Descend into directories given as scan targets
    pub recursive: bool,
    /// Hash every file instead of gating on known sizes first
    pub skip_size_check: bool,
    /// Report absolute paths
    pub full_path: bool,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Paths to exclude from scanning
    pub exclude_paths: Vec<String>,
    /// Number of parallel scan workers
    pub scan_threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            skip_size_check: false,
            full_path: false,
            follow_symlinks: false,
            exclude_paths: vec![
                #[cfg(windows)]
                "C:\\$Recycle.Bin".to_string(),
                #[cfg(not(windows))]
                "/proc".to_string(),
                #[cfg(not(windows))]
                "/sys".to_string(),
            ],
            scan_threads: num_cpus(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Output format
    pub format: LogFormat,
    /// Omit timestamps from log lines
    pub disable_timestamp: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Text,
            disable_timestamp: false,
        }
    }
}

/// Get the number of CPUs, with a reasonable default.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
