//! CLI output formatting.
//!
//! Logs go to stderr through `tracing`; the lines here are the program's
//! actual report and go to stdout.
//!
//! # Output Format
//!
//! ## Single file
//!
//! ```text
//! photo.png → small.jpg (jpeg)
//!     Dimensions: 4000x3000 → 1180x885
//!     Size: 197.6 KiB of 200.0 KiB target (1.2% under)
//!     Attempts: 9
//! ```
//!
//! ## Batch
//!
//! ```text
//! Processing 3 images
//!     001 a.jpg → a.jpg: encoded 1180x885, 196.1 KiB
//!     002 trip/b.png → trip/b.png: cached, 88.0 KiB
//!     003 trip/c.png → trip/c.png: copied, 91.3 KiB
//! Cache: 1 cached, 1 copied, 1 encoded (3 total)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::process::{FileReport, FileStatus, ProcessEvent, ProcessResult};
use crate::search::SearchOutcome;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count: bytes below 1 KiB, then KiB and MiB with one
/// decimal.
pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn dimensions(d: (u32, u32)) -> String {
    format!("{}x{}", d.0, d.1)
}

/// Lines describing a search outcome, without a header.
fn outcome_lines(outcome: &SearchOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if outcome.resized {
        lines.push(format!(
            "    Dimensions: {} → {}",
            dimensions(outcome.original),
            dimensions(outcome.dimensions)
        ));
    } else {
        lines.push(format!(
            "    Dimensions: {} (original fits)",
            dimensions(outcome.original)
        ));
    }

    if outcome.within_budget {
        lines.push(format!(
            "    Size: {} of {} target ({:.1}% under)",
            human_size(outcome.size),
            human_size(outcome.target),
            outcome.accuracy() * 100.0
        ));
    } else {
        lines.push(format!(
            "    Size: {} exceeds {} target, smallest width written",
            human_size(outcome.size),
            human_size(outcome.target)
        ));
    }
    if outcome.resized && outcome.within_budget && !outcome.converged {
        lines.push("    Best fit below target, no width landed within 5%".to_string());
    }
    lines.push(format!("    Attempts: {}", outcome.attempts));
    lines
}

/// Format the report of a single-file run.
pub fn format_file_report(report: &FileReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} → {} ({})",
        file_name(&report.source),
        file_name(&report.output),
        report.format
    )];
    lines.extend(outcome_lines(&report.outcome));
    lines
}

pub fn print_file_report(report: &FileReport) {
    for line in format_file_report(report) {
        println!("{}", line);
    }
}

/// Format one batch progress event.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => {
            let noun = if *total == 1 { "image" } else { "images" };
            vec![format!("Processing {} {}", total, noun)]
        }
        ProcessEvent::FileProcessed {
            index,
            source,
            output,
            status,
        } => {
            let size = human_size(status.size());
            let detail = match status {
                FileStatus::Cached { .. } => format!("cached, {size}"),
                FileStatus::Copied { .. } => format!("copied, {size}"),
                FileStatus::Encoded(outcome) => {
                    let mut s = format!("encoded {}, {size}", dimensions(outcome.dimensions));
                    if !outcome.within_budget {
                        s.push_str(" (over budget)");
                    }
                    s
                }
            };
            vec![format!(
                "    {} {} → {}: {}",
                format_index(*index),
                source,
                output,
                detail
            )]
        }
    }
}

/// Format the closing summary of a batch run.
pub fn format_batch_summary(result: &ProcessResult) -> Vec<String> {
    let mut lines = vec![format!("Cache: {}", result.cache_stats)];
    let over: Vec<&str> = result
        .files
        .iter()
        .filter(|(_, status)| matches!(status, FileStatus::Encoded(o) if !o.within_budget))
        .map(|(source, _)| source.as_str())
        .collect();
    if !over.is_empty() {
        lines.push(format!("Over budget: {}", over.join(", ")));
    }
    lines
}

pub fn print_batch_summary(result: &ProcessResult) {
    for line in format_batch_summary(result) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::imaging::OutputFormat;
    use std::path::PathBuf;

    fn outcome() -> SearchOutcome {
        SearchOutcome {
            original: (4000, 3000),
            dimensions: (1180, 885),
            size: 199_000,
            original_size: 2_000_000,
            target: 204_800,
            attempts: 9,
            resized: true,
            within_budget: true,
            converged: true,
        }
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1024), "1.0 KiB");
        assert_eq!(human_size(204_800), "200.0 KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn file_report_resized() {
        let report = FileReport {
            source: PathBuf::from("/in/photo.png"),
            output: PathBuf::from("/out/small.jpg"),
            format: OutputFormat::Jpeg,
            format_inherited: false,
            outcome: outcome(),
        };
        let lines = format_file_report(&report);
        assert_eq!(lines[0], "photo.png → small.jpg (jpeg)");
        assert_eq!(lines[1], "    Dimensions: 4000x3000 → 1180x885");
        assert_eq!(lines[2], "    Size: 194.3 KiB of 200.0 KiB target (2.8% under)");
        assert_eq!(lines[3], "    Attempts: 9");
    }

    #[test]
    fn file_report_original_fits() {
        let mut o = outcome();
        o.resized = false;
        o.dimensions = o.original;
        let report = FileReport {
            source: PathBuf::from("a.gif"),
            output: PathBuf::from("b.gif"),
            format: OutputFormat::Gif,
            format_inherited: true,
            outcome: o,
        };
        let lines = format_file_report(&report);
        assert_eq!(lines[1], "    Dimensions: 4000x3000 (original fits)");
    }

    #[test]
    fn file_report_over_budget_and_not_converged() {
        let mut o = outcome();
        o.within_budget = false;
        o.converged = false;
        o.size = 300_000;
        let report = FileReport {
            source: PathBuf::from("a.jpg"),
            output: PathBuf::from("b.jpg"),
            format: OutputFormat::Jpeg,
            format_inherited: true,
            outcome: o.clone(),
        };
        let lines = format_file_report(&report);
        assert!(lines[2].contains("exceeds"));

        o.within_budget = true;
        o.size = 150_000;
        let lines = format_file_report(&FileReport { outcome: o, ..report });
        assert!(lines.iter().any(|l| l.contains("Best fit")));
    }

    #[test]
    fn process_events() {
        assert_eq!(
            format_process_event(&ProcessEvent::Started { total: 1 }),
            vec!["Processing 1 image"]
        );
        assert_eq!(
            format_process_event(&ProcessEvent::Started { total: 3 }),
            vec!["Processing 3 images"]
        );

        let event = ProcessEvent::FileProcessed {
            index: 2,
            source: "trip/b.png".into(),
            output: "trip/b.jpg".into(),
            status: FileStatus::Cached { size: 2048 },
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    002 trip/b.png → trip/b.jpg: cached, 2.0 KiB"]
        );

        let event = ProcessEvent::FileProcessed {
            index: 1,
            source: "a.jpg".into(),
            output: "a.jpg".into(),
            status: FileStatus::Encoded(outcome()),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    001 a.jpg → a.jpg: encoded 1180x885, 194.3 KiB"]
        );
    }

    #[test]
    fn batch_summary_lists_over_budget_files() {
        let mut over = outcome();
        over.within_budget = false;
        let result = ProcessResult {
            files: vec![
                ("a.jpg".into(), FileStatus::Encoded(outcome())),
                ("b.jpg".into(), FileStatus::Encoded(over)),
                ("c.jpg".into(), FileStatus::Copied { size: 1 }),
            ],
            cache_stats: CacheStats {
                hits: 0,
                copies: 1,
                misses: 2,
            },
        };
        let lines = format_batch_summary(&result);
        assert_eq!(lines[0], "Cache: 0 cached, 1 copied, 2 encoded (3 total)");
        assert_eq!(lines[1], "Over budget: b.jpg");
    }
}
