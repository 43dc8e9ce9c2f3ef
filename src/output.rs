//! CLI output formatting.
//!
//! # Output Format
//!
//! One block per input, in input order, then a summary line:
//!
//! ```text
//! 001 beach.png → beach-compressed.jpeg
//!     1600x1200 jpeg, 184.20 KB
//!     Target: 200 KB, met after 4 attempts (quality 0.62)
//! 002 notes.txt: skipped (not an image)
//! 003 broken.png: failed: Decode failed: ...
//!
//! Exported 1, skipped 1, failed 1
//! ```
//!
//! With `--json` each input is printed as one JSON object per line instead,
//! using the same fields as the text form.
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>` or
//! `String`) for testability and a `print_*` wrapper that writes to stdout.
//! Format functions are pure: no I/O, no side effects.

use crate::batch::{BatchItem, Outcome};
use crate::tools::CompressReport;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn compress_line(report: &CompressReport) -> Option<String> {
    let target = report.target_kb?;
    Some(if report.target_met {
        format!(
            "Target: {} KB, met after {} attempts (quality {:.2})",
            target, report.attempts, report.final_quality
        )
    } else {
        format!(
            "Target: {} KB, not reached after {} attempts; exported smallest result",
            target, report.attempts
        )
    })
}

/// Format one input's outcome as display lines.
pub fn format_item(index: usize, item: &BatchItem) -> Vec<String> {
    let name = display_name(&item.source);
    let idx = format_index(index);
    match &item.outcome {
        Outcome::Exported { report } => {
            let receipt = &report.receipt;
            let mut lines = vec![
                format!("{idx} {name} → {}", receipt.filename),
                format!(
                    "    {}x{} {}, {:.2} KB",
                    receipt.width,
                    receipt.height,
                    receipt.format,
                    receipt.bytes as f64 / 1024.0
                ),
            ];
            if let Some(line) = report.compress.as_ref().and_then(compress_line) {
                lines.push(format!("    {line}"));
            }
            lines
        }
        Outcome::Skipped => vec![format!("{idx} {name}: skipped (not an image)")],
        Outcome::Failed { error } => vec![format!("{idx} {name}: failed: {error}")],
    }
}

/// Format the closing summary line.
pub fn format_summary(items: &[BatchItem]) -> String {
    let (mut exported, mut skipped, mut failed) = (0, 0, 0);
    for item in items {
        match item.outcome {
            Outcome::Exported { .. } => exported += 1,
            Outcome::Skipped => skipped += 1,
            Outcome::Failed { .. } => failed += 1,
        }
    }
    format!("Exported {exported}, skipped {skipped}, failed {failed}")
}

/// One compact JSON object for an input.
pub fn format_json(item: &BatchItem) -> Result<String, serde_json::Error> {
    serde_json::to_string(item)
}

pub fn print_items(items: &[BatchItem]) {
    for (i, item) in items.iter().enumerate() {
        for line in format_item(i + 1, item) {
            println!("{}", line);
        }
    }
    println!();
    println!("{}", format_summary(items));
}

pub fn print_json(items: &[BatchItem]) -> Result<(), serde_json::Error> {
    for item in items {
        println!("{}", format_json(item)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportReceipt;
    use crate::imaging::OutputFormat;
    use crate::session::ExportReport;
    use crate::tools::Tool;
    use std::path::PathBuf;

    fn exported(compress: Option<CompressReport>) -> BatchItem {
        BatchItem {
            source: PathBuf::from("in/beach.png"),
            outcome: Outcome::Exported {
                report: ExportReport {
                    tool: Tool::Compress,
                    receipt: ExportReceipt {
                        filename: "beach-compressed.jpeg".into(),
                        path: Some(PathBuf::from("out/beach-compressed.jpeg")),
                        format: OutputFormat::Jpeg,
                        width: 1600,
                        height: 1200,
                        bytes: 2048,
                    },
                    compress,
                },
            },
        }
    }

    #[test]
    fn exported_item_lines() {
        let lines = format_item(1, &exported(None));
        assert_eq!(
            lines,
            vec![
                "001 beach.png → beach-compressed.jpeg".to_string(),
                "    1600x1200 jpeg, 2.00 KB".to_string(),
            ]
        );
    }

    #[test]
    fn compress_target_met_line() {
        let lines = format_item(
            2,
            &exported(Some(CompressReport {
                target_kb: Some(200),
                attempts: 4,
                final_quality: 0.62,
                target_met: true,
            })),
        );
        assert_eq!(
            lines[2],
            "    Target: 200 KB, met after 4 attempts (quality 0.62)"
        );
    }

    #[test]
    fn compress_shortfall_line() {
        let lines = format_item(
            1,
            &exported(Some(CompressReport {
                target_kb: Some(1),
                attempts: 30,
                final_quality: 0.2,
                target_met: false,
            })),
        );
        assert!(lines[2].contains("not reached after 30 attempts"));
    }

    #[test]
    fn unconstrained_compress_has_no_target_line() {
        let lines = format_item(
            1,
            &exported(Some(CompressReport {
                target_kb: None,
                attempts: 0,
                final_quality: 0.9,
                target_met: true,
            })),
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn skipped_and_failed_lines() {
        let skipped = BatchItem {
            source: PathBuf::from("notes.txt"),
            outcome: Outcome::Skipped,
        };
        let failed = BatchItem {
            source: PathBuf::from("broken.png"),
            outcome: Outcome::Failed {
                error: "Decode failed: bad".into(),
            },
        };
        assert_eq!(
            format_item(2, &skipped),
            vec!["002 notes.txt: skipped (not an image)"]
        );
        assert_eq!(
            format_item(3, &failed),
            vec!["003 broken.png: failed: Decode failed: bad"]
        );
        assert_eq!(
            format_summary(&[exported(None), skipped, failed]),
            "Exported 1, skipped 1, failed 1"
        );
    }

    #[test]
    fn json_flattens_receipt() {
        let json: serde_json::Value =
            serde_json::from_str(&format_json(&exported(None)).unwrap()).unwrap();
        assert_eq!(json["status"], "exported");
        assert_eq!(json["tool"], "compress");
        assert_eq!(json["filename"], "beach-compressed.jpeg");
        assert_eq!(json["format"], "jpeg");
        assert_eq!(json["bytes"], 2048);
        assert!(json.get("compress").is_none());
    }
}
