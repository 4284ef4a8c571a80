//! Final run summary: aggregate totals plus a scan of what was written.

use std::path::Path;
use std::time::Duration;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use zsift_core::memory::bytes_to_gb;
use zsift_core::progress::fmt_num;
use zsift_core::{CsvCompression, OutputFormat, RunTotals};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_attempted: usize,
    pub files_completed: usize,
    pub files_failed: usize,
    pub lines_scanned: usize,
    pub records_matched: usize,
    pub error_lines: usize,
    pub elapsed: Duration,
    pub output_files: usize,
    pub output_bytes: u64,
    pub peak_resident: u64,
}

impl RunSummary {
    pub fn new(totals: RunTotals, output_dir: &Path, format: OutputFormat, csv: CsvCompression) -> Self {
        let (output_files, output_bytes) = scan_outputs(output_dir, format, csv);
        Self {
            files_attempted: totals.files_attempted,
            files_completed: totals.files_completed,
            files_failed: totals.files_failed,
            lines_scanned: totals.lines_scanned,
            records_matched: totals.records_matched,
            error_lines: totals.error_lines,
            elapsed: totals.elapsed,
            output_files,
            output_bytes,
            peak_resident: totals.peak_resident,
        }
    }

    fn lines_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.lines_scanned as f64 / secs
        } else {
            0.0
        }
    }

    /// Summary as log lines (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Processing complete: {}/{} files ({} failed)",
            self.files_completed,
            self.files_attempted,
            self.files_failed
        );
        log::info!("Total lines scanned: {}", fmt_num(self.lines_scanned));
        log::info!("Total records matched: {}", fmt_num(self.records_matched));
        log::info!("Total errors: {}", fmt_num(self.error_lines));
        log::info!(
            "Elapsed: {:.1}s ({:.0} lines/second)",
            self.elapsed.as_secs_f64(),
            self.lines_per_sec()
        );
        log::info!(
            "Output: {} files, {:.2} MB",
            self.output_files,
            self.output_bytes as f64 / (1024.0 * 1024.0)
        );
        log::info!("Peak RAM usage: {:.2} GB", bytes_to_gb(self.peak_resident));
    }

    /// Summary table on stdout (TTY mode).
    pub fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Run Summary")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);
        table.add_row(vec![
            Cell::new("Files"),
            Cell::new(format!(
                "{}/{} ({} failed)",
                self.files_completed, self.files_attempted, self.files_failed
            )),
        ]);
        table.add_row(vec![
            Cell::new("Lines scanned"),
            Cell::new(fmt_num(self.lines_scanned)),
        ]);
        table.add_row(vec![
            Cell::new("Records matched"),
            Cell::new(fmt_num(self.records_matched)),
        ]);
        table.add_row(vec![
            Cell::new("Error lines"),
            Cell::new(fmt_num(self.error_lines)),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!(
                "{:.1}s ({:.0} lines/s)",
                self.elapsed.as_secs_f64(),
                self.lines_per_sec()
            )),
        ]);
        table.add_row(vec![
            Cell::new("Output"),
            Cell::new(format!(
                "{} files, {:.2} MB",
                self.output_files,
                self.output_bytes as f64 / (1024.0 * 1024.0)
            )),
        ]);
        table.add_row(vec![
            Cell::new("Peak RAM"),
            Cell::new(format!("{:.2} GB", bytes_to_gb(self.peak_resident))),
        ]);
        println!("{table}");
    }
}

/// Count and size output files of the run's format in the output directory.
fn scan_outputs(dir: &Path, format: OutputFormat, csv: CsvCompression) -> (usize, u64) {
    let suffix = match (format, csv) {
        (OutputFormat::Parquet, _) => ".parquet",
        (OutputFormat::Csv, CsvCompression::Gzip) => ".csv.gz",
        (OutputFormat::Csv, CsvCompression::None) => ".csv",
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return (0, 0),
    };
    let mut count = 0usize;
    let mut bytes = 0u64;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(suffix) {
            count += 1;
            bytes += entry.metadata().map_or(0, |m| m.len());
        }
    }
    (count, bytes)
}
