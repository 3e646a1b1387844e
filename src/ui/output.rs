//! Text and JSON rendering of scan results and database information.

use crate::core::error::Result;
use crate::core::types::ScanSummary;
use crate::detection::database::DatabaseStats;
use crate::detection::signature::Signature;
use serde::Serialize;
use std::fmt::Write;

/// Scan summary together with the size of the signature set used.
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    #[serde(flatten)]
    pub summary: &'a ScanSummary,
    pub known_signatures: usize,
}

impl<'a> ScanReport<'a> {
    pub fn new(summary: &'a ScanSummary, known_signatures: usize) -> Self {
        Self {
            summary,
            known_signatures,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One line per infected file.
    pub fn detections_text(&self) -> String {
        let mut out = String::new();
        for detection in &self.summary.detections {
            let _ = writeln!(
                out,
                "{}: {} FOUND",
                detection.path.display(),
                detection.display_name()
            );
        }
        out
    }

    pub fn summary_text(&self) -> String {
        let s = self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "----------- SCAN SUMMARY -----------");
        let _ = writeln!(out, "Known signatures: {}", self.known_signatures);
        let _ = writeln!(out, "Scanned files:    {}", s.files_scanned);
        let _ = writeln!(out, "Scanned folders:  {}", s.directories_scanned);
        let _ = writeln!(out, "Infected files:   {}", s.threats_found);
        let _ = writeln!(out, "Errors:           {}", s.errors);
        let _ = writeln!(out, "Data scanned:     {}", format_bytes(s.bytes_scanned));
        let _ = writeln!(out, "Data read:        {}", format_bytes(s.bytes_read));
        if let Some(duration) = s.duration_secs() {
            let _ = writeln!(out, "Time:             {} s", duration);
        }
        let _ = writeln!(out, "Status:           {}", s.status);
        out
    }
}

/// Database statistics as text.
pub fn stats_text(stats: &DatabaseStats) -> String {
    let idx = &stats.index;
    let mut out = String::new();
    let _ = writeln!(out, "Known signatures: {}", idx.count);
    let _ = writeln!(out, "  MD5:            {}", idx.md5);
    let _ = writeln!(out, "  SHA-1:          {}", idx.sha1);
    let _ = writeln!(out, "  SHA-256:        {}", idx.sha256);
    if idx.other > 0 {
        let _ = writeln!(out, "  Other:          {}", idx.other);
    }
    let _ = writeln!(out, "Files loaded:     {}", idx.files_loaded);
    let _ = writeln!(out, "Records parsed:   {}", idx.records_parsed);
    let _ = writeln!(out, "Duplicates:       {}", idx.duplicates);
    let _ = writeln!(out, "Unknown size:     {} skipped", idx.skipped_unknown_size);
    let _ = writeln!(
        out,
        "Size checks:      {}",
        if idx.size_checks_disabled { "disabled" } else { "enabled" }
    );
    match &stats.prefilter {
        Some(p) => {
            let _ = writeln!(
                out,
                "Pre-filter:       {} bits, {} hash functions, {}",
                p.bits,
                p.hash_functions,
                format_bytes(p.memory_bytes as u64)
            );
        }
        None => {
            let _ = writeln!(out, "Pre-filter:       off");
        }
    }
    out
}

/// A single signature record as text.
pub fn signature_text(sig: &Signature) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Hash:    {} ({})", sig.hash, sig.hash_kind);
    let _ = writeln!(out, "Size:    {}", sig.declared_size);
    let _ = writeln!(out, "Label:   {}", sig.label);
    if !sig.comment.is_empty() {
        let _ = writeln!(out, "Comment: {}", sig.comment);
    }
    out
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Detection;
    use crate::detection::index::IndexStats;
    use crate::detection::signature::{DeclaredSize, HashKind};
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_scan_report() {
        let mut summary = ScanSummary::new();
        summary.files_scanned = 3;
        summary.threats_found = 1;
        summary.bytes_scanned = 2048;
        summary.detections.push(Detection::new(
            PathBuf::from("bad.bin"),
            "Eicar.Test",
            "44d88612fea8a8f36de82e1278abb02f",
            HashKind::Md5,
            68,
        ));
        summary.complete();

        let report = ScanReport::new(&summary, 42);
        assert_eq!(report.detections_text(), "bad.bin: Eicar.Test FOUND\n");

        let text = report.summary_text();
        assert!(text.contains("Known signatures: 42"));
        assert!(text.contains("Scanned files:    3"));
        assert!(text.contains("Data scanned:     2.00 KB"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["known_signatures"], 42);
        assert_eq!(json["files_scanned"], 3);
        assert_eq!(json["detections"][0]["hash_kind"], "md5");
    }

    #[test]
    fn test_stats_text() {
        let stats = DatabaseStats {
            index: IndexStats {
                count: 2,
                md5: 1,
                sha256: 1,
                size_checks_disabled: true,
                ..IndexStats::default()
            },
            prefilter: None,
        };
        let text = stats_text(&stats);
        assert!(text.contains("Known signatures: 2"));
        assert!(text.contains("Size checks:      disabled"));
        assert!(text.contains("Pre-filter:       off"));
        assert!(!text.contains("Other"));
    }

    #[test]
    fn test_signature_text() {
        let sig = Signature::new("AB", DeclaredSize::Unknown, "Tiny").with_comment("note");
        let text = signature_text(&sig);
        assert!(text.contains("Hash:    ab (unknown)"));
        assert!(text.contains("Size:    *"));
        assert!(text.contains("Comment: note"));
    }
}
