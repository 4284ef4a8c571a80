//! Per-file pipeline: decode → assemble lines → classify → sink.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::criterion::{Classified, Record, RecordFilter};
use crate::decode::{ChunkDecoder, ReadOptions};
use crate::discover::DumpFile;
use crate::lines::LineAssembler;
use crate::memory::{bytes_to_gb, MemoryGovernor};
use crate::progress::fmt_num;
use crate::sink::{self, OutputFormat, SinkOptions};

/// One file plus its output destination. Built once before dispatch.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub file: DumpFile,
    pub output_path: PathBuf,
    pub format: OutputFormat,
}

/// Terminal state of one file attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Output written, or confirmed zero matches.
    Completed,
    /// The stream could not be decoded; accumulated matches were discarded.
    DecodeFailed,
    /// Matches existed but the sink write failed; nothing was flushed.
    WriteFailed,
}

/// Produced exactly once per attempted file.
#[derive(Debug)]
pub struct ProcessingResult {
    pub file_id: String,
    pub lines_scanned: usize,
    pub records_matched: usize,
    pub error_lines: usize,
    pub outcome: FileOutcome,
    pub elapsed: Duration,
}

impl ProcessingResult {
    /// Whether this file may be checkpointed as done.
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, FileOutcome::Completed)
    }
}

/// Knobs shared by every file in a run.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub read: ReadOptions,
    pub sink: SinkOptions,
    /// Emit a progress observation every this many lines.
    pub progress_log_interval: usize,
}

/// Run the full pipeline for one dump file.
///
/// Matched records are held in memory for the whole file and written in one
/// shot at EOF; a decode or write failure discards them all, so partial
/// outputs never exist. Always returns a result — per-file errors are
/// reported through [`FileOutcome`], never propagated.
pub fn process_file(
    item: &WorkItem,
    filter: &RecordFilter,
    opts: &ProcessorOptions,
    sampler: &mut MemoryGovernor,
    pb: &ProgressBar,
) -> ProcessingResult {
    let start = Instant::now();
    let file_name = item.file.file_name();
    let mut lines_scanned = 0usize;
    let mut error_lines = 0usize;
    let mut matched: Vec<Record> = Vec::new();

    let fail = |outcome, lines_scanned, error_lines, elapsed| ProcessingResult {
        file_id: item.file.id.clone(),
        lines_scanned,
        records_matched: 0,
        error_lines,
        outcome,
        elapsed,
    };

    let (decoder, counter) = match ChunkDecoder::open_zst(&item.file.path, &opts.read) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Error processing {}: {e}", item.file.id);
            return fail(FileOutcome::DecodeFailed, 0, 0, start.elapsed());
        }
    };

    for line in LineAssembler::new(decoder) {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Error processing {}: {e}", item.file.id);
                return fail(
                    FileOutcome::DecodeFailed,
                    lines_scanned,
                    error_lines,
                    start.elapsed(),
                );
            }
        };
        match filter.classify(&line) {
            Classified::Matched(record) => matched.push(record),
            Classified::NotMatched => {}
            Classified::Error => error_lines += 1,
        }
        lines_scanned += 1;

        if opts.progress_log_interval > 0 && lines_scanned.is_multiple_of(opts.progress_log_interval)
        {
            let cpu = sampler.cpu_percent();
            let rss = sampler.current_usage();
            pb.set_position(counter.load(Ordering::Relaxed));
            pb.set_message(format!(
                "{} matched, {:.2} GB",
                fmt_num(matched.len()),
                bytes_to_gb(rss)
            ));
            if pb.is_hidden() {
                log::info!(
                    "{file_name}: {} lines, {} matched, CPU: {cpu:.0}%, RAM: {:.2} GB",
                    fmt_num(lines_scanned),
                    fmt_num(matched.len()),
                    bytes_to_gb(rss)
                );
            }
        }
    }

    let records_matched = matched.len();
    if matched.is_empty() {
        log::info!(
            "Completed {file_name}: {} lines, 0 matched, {} errors (no output file created)",
            fmt_num(lines_scanned),
            fmt_num(error_lines)
        );
        return ProcessingResult {
            file_id: item.file.id.clone(),
            lines_scanned,
            records_matched: 0,
            error_lines,
            outcome: FileOutcome::Completed,
            elapsed: start.elapsed(),
        };
    }

    pb.set_message("writing...");
    match sink::write_records(&matched, item.format, &item.output_path, &opts.sink) {
        Ok(()) => {
            log::info!(
                "Completed {file_name}: {} lines, {} matched, {} errors -> {}",
                fmt_num(lines_scanned),
                fmt_num(records_matched),
                fmt_num(error_lines),
                item.output_path.display()
            );
            ProcessingResult {
                file_id: item.file.id.clone(),
                lines_scanned,
                records_matched,
                error_lines,
                outcome: FileOutcome::Completed,
                elapsed: start.elapsed(),
            }
        }
        Err(e) => {
            log::error!(
                "Failed to write output file {}: {e}",
                item.output_path.display()
            );
            fail(
                FileOutcome::WriteFailed,
                lines_scanned,
                error_lines,
                start.elapsed(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::MatchMode;
    use crate::memory::MemoryBudget;
    use tempfile::TempDir;

    fn write_zst(dir: &std::path::Path, name: &str, content: &[u8]) -> DumpFile {
        let path = dir.join(name);
        std::fs::write(&path, zstd::encode_all(content, 3).unwrap()).unwrap();
        DumpFile::new(path)
    }

    fn options() -> ProcessorOptions {
        ProcessorOptions {
            read: ReadOptions::default(),
            sink: SinkOptions::default(),
            progress_log_interval: 100_000,
        }
    }

    fn run(item: &WorkItem, filter: &RecordFilter) -> ProcessingResult {
        let mut sampler = MemoryGovernor::new(MemoryBudget::new(1024.0, 0.9));
        process_file(
            item,
            filter,
            &options(),
            &mut sampler,
            &ProgressBar::hidden(),
        )
    }

    fn subreddit_filter(value: &str) -> RecordFilter {
        RecordFilter::new("subreddit", &[value.to_string()], MatchMode::Exact).unwrap()
    }

    #[test]
    fn matched_not_matched_and_error_counted() {
        let dir = TempDir::new().unwrap();
        let file = write_zst(
            dir.path(),
            "RC_mixed.zst",
            b"{\"subreddit\":\"Ukraine\"}\n{\"subreddit\":\"other\"}\nnot json\n",
        );
        let item = WorkItem {
            file,
            output_path: dir.path().join("RC_mixed.csv"),
            format: OutputFormat::Csv,
        };
        let result = run(&item, &subreddit_filter("ukraine"));

        assert_eq!(result.lines_scanned, 3);
        assert_eq!(result.records_matched, 1);
        assert_eq!(result.error_lines, 1);
        assert_eq!(result.outcome, FileOutcome::Completed);
        assert!(item.output_path.exists());
    }

    #[test]
    fn zero_matches_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let file = write_zst(dir.path(), "RC_none.zst", b"{\"subreddit\":\"other\"}\n");
        let item = WorkItem {
            file,
            output_path: dir.path().join("RC_none.csv"),
            format: OutputFormat::Csv,
        };
        let result = run(&item, &subreddit_filter("ukraine"));

        assert_eq!(result.outcome, FileOutcome::Completed);
        assert_eq!(result.records_matched, 0);
        assert!(!item.output_path.exists());
    }

    #[test]
    fn decode_failure_discards_matches() {
        let dir = TempDir::new().unwrap();
        // Valid matching line, then bytes that never become UTF-8.
        let mut content = b"{\"subreddit\":\"ukraine\"}\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        let file = write_zst(dir.path(), "RC_bad.zst", &content);
        let item = WorkItem {
            file,
            output_path: dir.path().join("RC_bad.csv"),
            format: OutputFormat::Csv,
        };

        let mut sampler = MemoryGovernor::new(MemoryBudget::new(1024.0, 0.9));
        let mut opts = options();
        opts.read.chunk_size_bytes = 8;
        opts.read.max_window_size_bytes = 64;
        let result = process_file(
            &item,
            &subreddit_filter("ukraine"),
            &opts,
            &mut sampler,
            &ProgressBar::hidden(),
        );

        assert_eq!(result.outcome, FileOutcome::DecodeFailed);
        assert_eq!(result.records_matched, 0);
        assert!(result.lines_scanned >= 1);
        assert!(!item.output_path.exists());
    }

    #[test]
    fn write_failure_reports_zero_matches() {
        let dir = TempDir::new().unwrap();
        let file = write_zst(dir.path(), "RC_w.zst", b"{\"subreddit\":\"ukraine\"}\n");
        let item = WorkItem {
            file,
            // Missing parent directory makes the sink fail.
            output_path: dir.path().join("nope").join("RC_w.csv"),
            format: OutputFormat::Csv,
        };
        let result = run(&item, &subreddit_filter("ukraine"));

        assert_eq!(result.outcome, FileOutcome::WriteFailed);
        assert_eq!(result.records_matched, 0);
        assert_eq!(result.lines_scanned, 1);
        assert!(!result.is_complete());
    }

    #[test]
    fn missing_file_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        let item = WorkItem {
            file: DumpFile::new(dir.path().join("RC_gone.zst")),
            output_path: dir.path().join("RC_gone.csv"),
            format: OutputFormat::Csv,
        };
        let result = run(&item, &subreddit_filter("ukraine"));
        assert_eq!(result.outcome, FileOutcome::DecodeFailed);
        assert_eq!(result.lines_scanned, 0);
    }

    #[test]
    fn unterminated_final_record_not_scanned() {
        let dir = TempDir::new().unwrap();
        let file = write_zst(
            dir.path(),
            "RC_tail.zst",
            b"{\"subreddit\":\"ukraine\"}\n{\"subreddit\":\"ukraine\"}",
        );
        let item = WorkItem {
            file,
            output_path: dir.path().join("RC_tail.csv"),
            format: OutputFormat::Csv,
        };
        let result = run(&item, &subreddit_filter("ukraine"));
        // The record with no trailing newline is dropped by design.
        assert_eq!(result.lines_scanned, 1);
        assert_eq!(result.records_matched, 1);
    }
}
