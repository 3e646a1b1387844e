//! hashguard: hash-signature malware detection.
//!
//! Loads ClamAV-style hash databases (`.hdb`, `.hsb`, `.hdu`, `.hsu`) and CSV
//! exports into an immutable in-memory index, optionally fronted by a Bloom
//! pre-filter, and answers "is this digest known" and "could a file of this
//! size be known" for a scan driver.

pub mod core;
pub mod detection;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::detection::SignatureDatabase;
