//! Command-line interface definition.

use crate::core::config::{DatabaseConfig, PrefilterHits, UnknownSizeAction};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// hashguard: hash-signature malware scanner
#[derive(Parser, Debug)]
#[command(name = "hashguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// What to do with signatures whose size is `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UnknownSizeArg {
    /// Drop the signature
    Skip,
    /// Keep the signature and let every file size pass the size check
    Disable,
}

impl From<UnknownSizeArg> for UnknownSizeAction {
    fn from(arg: UnknownSizeArg) -> Self {
        match arg {
            UnknownSizeArg::Skip => UnknownSizeAction::Skip,
            UnknownSizeArg::Disable => UnknownSizeAction::DisableSizeChecks,
        }
    }
}

/// Options shared by every command that loads the signature database.
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// Signature directory (overrides the configured one)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Do not build the Bloom pre-filter
    #[arg(long)]
    pub no_prefilter: bool,

    /// Target false positive rate of the pre-filter
    #[arg(long, value_name = "RATE")]
    pub prefilter_fpr: Option<f64>,

    /// Policy for signatures with unknown size
    #[arg(long)]
    pub unknown_size: Option<UnknownSizeArg>,

    /// Report pre-filter hits without confirming them in the index
    #[arg(long)]
    pub trust_prefilter: bool,
}

impl DatabaseArgs {
    /// Overlay command-line options on the configured database settings.
    pub fn apply(&self, config: &mut DatabaseConfig) {
        if let Some(path) = &self.database {
            config.path = Some(path.clone());
        }
        if self.no_prefilter {
            config.use_prefilter = false;
        }
        if let Some(rate) = self.prefilter_fpr {
            config.prefilter_fp_rate = rate;
        }
        if let Some(action) = self.unknown_size {
            config.unknown_size = action.into();
        }
        if self.trust_prefilter {
            config.prefilter_hits = PrefilterHits::Trust;
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan files and directories for known malware
    Scan {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        db: DatabaseArgs,

        /// Scan directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Hash every file instead of checking known sizes first
        #[arg(long)]
        skip_size: bool,

        /// Do not print the scan summary
        #[arg(long)]
        no_summary: bool,

        /// Report absolute paths
        #[arg(long)]
        full_path: bool,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load the signature database and show statistics
    Info {
        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Look up a signature by hash or by declared size
    Lookup {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Hex digest to look up
        #[arg(long, conflicts_with = "size", required_unless_present = "size")]
        hash: Option<String>,

        /// File size in bytes to look up
        #[arg(long)]
        size: Option<u64>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
