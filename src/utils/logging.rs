//! Logging setup for hashguard.

use crate::core::config::{Config, LogFormat};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: LevelFilter,
    /// Output format
    pub format: LogFormat,
    /// Show timestamps
    pub timestamps: bool,
    /// Show module path
    pub module_path: bool,
    /// Colored level names (text format only)
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            format: LogFormat::Text,
            timestamps: true,
            module_path: false,
            color: true,
        }
    }
}

impl LogConfig {
    /// Create a log config from application config.
    pub fn from_config(config: &Config) -> Self {
        let level = parse_level(&config.logging.log_level).unwrap_or(LevelFilter::Info);
        Self {
            level,
            format: config.logging.format,
            timestamps: !config.logging.disable_timestamp,
            module_path: level >= LevelFilter::Debug,
            color: config.logging.format == LogFormat::Text,
        }
    }

    /// Apply a `-v` count from the command line.
    ///
    /// Levels step from the configured one: each `v` moves one level toward
    /// trace. Counts past trace are clamped.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        const LEVELS: [LevelFilter; 6] = [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
            LevelFilter::Trace,
        ];
        let current = LEVELS.iter().position(|l| *l == self.level).unwrap_or(3);
        let target = (current + verbose as usize).min(LEVELS.len() - 1);
        self.level = LEVELS[target];
        self.module_path = self.level >= LevelFilter::Debug;
        self
    }

    /// Create a verbose log config for CLI.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            module_path: true,
            ..Self::default()
        }
    }

    /// Create a quiet log config (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            timestamps: false,
            ..Self::default()
        }
    }
}

/// Parse a level name as used in the config file.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Initialize the logging system. Logs go to stderr so report output on
/// stdout stays machine-readable.
pub fn init_logging(config: LogConfig) {
    let mut builder = Builder::new();
    builder.filter_level(config.level).target(Target::Stderr);

    let level = config.level;
    match config.format {
        LogFormat::Text => {
            builder.format(move |buf, record| {
                let mut output = String::new();

                if config.timestamps {
                    output.push_str(&format!("{} ", Local::now().format("%Y-%m-%d %H:%M:%S")));
                }

                let level_str = match (record.level(), config.color) {
                    (log::Level::Error, true) => "\x1b[31mERROR\x1b[0m",
                    (log::Level::Warn, true) => "\x1b[33mWARN\x1b[0m ",
                    (log::Level::Info, true) => "\x1b[32mINFO\x1b[0m ",
                    (log::Level::Debug, true) => "\x1b[34mDEBUG\x1b[0m",
                    (log::Level::Trace, true) => "\x1b[35mTRACE\x1b[0m",
                    (log::Level::Error, false) => "ERROR",
                    (log::Level::Warn, false) => "WARN ",
                    (log::Level::Info, false) => "INFO ",
                    (log::Level::Debug, false) => "DEBUG",
                    (log::Level::Trace, false) => "TRACE",
                };
                output.push_str(&format!("[{}] ", level_str));

                if config.module_path {
                    if let Some(path) = record.module_path() {
                        output.push_str(&format!("{}: ", path));
                    }
                }

                output.push_str(&record.args().to_string());
                writeln!(buf, "{}", output)
            });
        }
        LogFormat::Json => {
            builder.format(move |buf, record| {
                let mut entry = serde_json::Map::new();
                if config.timestamps {
                    entry.insert("time".into(), Local::now().to_rfc3339().into());
                }
                entry.insert("level".into(), record.level().as_str().into());
                if let Some(path) = record.module_path() {
                    entry.insert("target".into(), path.into());
                }
                entry.insert("msg".into(), record.args().to_string().into());
                writeln!(buf, "{}", serde_json::Value::Object(entry))
            });
        }
    }

    // A second init (tests, embedding) keeps the existing logger.
    if builder.try_init().is_ok() {
        log::debug!("Logging initialized with level: {:?}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, LevelFilter::Info);
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.timestamps);
    }

    #[test]
    fn test_log_config_verbose() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, LevelFilter::Debug);
        assert!(config.module_path);
    }

    #[test]
    fn test_log_config_quiet() {
        let config = LogConfig::quiet();
        assert_eq!(config.level, LevelFilter::Error);
        assert!(!config.timestamps);
    }

    #[test]
    fn test_verbosity_steps_and_clamps() {
        let config = LogConfig::default().with_verbosity(1);
        assert_eq!(config.level, LevelFilter::Debug);
        assert!(config.module_path);

        let config = LogConfig::default().with_verbosity(9);
        assert_eq!(config.level, LevelFilter::Trace);

        let config = LogConfig::quiet().with_verbosity(0);
        assert_eq!(config.level, LevelFilter::Error);
    }

    #[test]
    fn test_from_config() {
        let mut app = Config::default();
        app.logging.log_level = "WARNING".to_string();
        app.logging.format = LogFormat::Json;
        app.logging.disable_timestamp = true;

        let config = LogConfig::from_config(&app);
        assert_eq!(config.level, LevelFilter::Warn);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.timestamps);
        assert!(!config.color);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("Debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
    }
}
