//! File system scanning.

pub mod file;

pub use file::FileScanner;
