//! Core type definitions used throughout hashguard.

use crate::detection::signature::HashKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Status of a scan operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Scan is pending
    Pending,
    /// Scan is in progress
    Running,
    /// Scan completed successfully
    Completed,
    /// Scan was cancelled
    Cancelled,
    /// Scan failed with error
    Failed,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "Pending"),
            ScanStatus::Running => write!(f, "Running"),
            ScanStatus::Completed => write!(f, "Completed"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
            ScanStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// A file whose digest matched a known signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Path to the detected file
    pub path: PathBuf,
    /// Malware name from the signature (may be empty)
    pub threat_name: String,
    /// Digest that matched
    pub hash: String,
    /// Algorithm of the matching digest
    pub hash_kind: HashKind,
    /// File size in bytes
    pub size: u64,
    /// Signature comment, if any
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub comment: String,
}

impl Detection {
    /// Create a new detection.
    pub fn new(
        path: PathBuf,
        threat_name: impl Into<String>,
        hash: impl Into<String>,
        hash_kind: HashKind,
        size: u64,
    ) -> Self {
        Self {
            path,
            threat_name: threat_name.into(),
            hash: hash.into(),
            hash_kind,
            size,
            comment: String::new(),
        }
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Name to show to users, falling back when the signature had no label.
    pub fn display_name(&self) -> &str {
        if self.threat_name.is_empty() {
            "Unnamed signature"
        } else {
            &self.threat_name
        }
    }
}

/// Summary of a completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Unique scan identifier
    pub scan_id: String,
    /// When the scan started
    pub start_time: DateTime<Utc>,
    /// When the scan ended
    pub end_time: Option<DateTime<Utc>>,
    /// Final status
    pub status: ScanStatus,
    /// Total files scanned
    pub files_scanned: u64,
    /// Total directories scanned
    pub directories_scanned: u64,
    /// Total size of all scanned files
    pub bytes_scanned: u64,
    /// Bytes actually read for hashing (files that passed the size gate)
    pub bytes_read: u64,
    /// Number of threats found
    pub threats_found: u32,
    /// Number of errors during scan
    pub errors: u32,
    /// All detections
    pub detections: Vec<Detection>,
}

impl ScanSummary {
    /// Create a new scan summary.
    pub fn new() -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: ScanStatus::Pending,
            files_scanned: 0,
            directories_scanned: 0,
            bytes_scanned: 0,
            bytes_read: 0,
            threats_found: 0,
            errors: 0,
            detections: Vec::new(),
        }
    }

    /// Get scan duration in seconds.
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds())
    }

    /// Mark the scan as completed.
    pub fn complete(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = ScanStatus::Completed;
    }

    /// Mark the scan as cancelled.
    pub fn cancel(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = ScanStatus::Cancelled;
    }
}

impl Default for ScanSummary {
    fn default() -> Self {
        Self::new()
    }
}
