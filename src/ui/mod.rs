//! User interface components: command-line parsing and result rendering.

pub mod cli;
pub mod output;

pub use cli::Cli;
pub use output::{format_bytes, ScanReport};
