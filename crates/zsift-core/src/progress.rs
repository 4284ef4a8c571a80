//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per in-flight file, sized by compressed bytes.
//! Non-TTY mode: bars are hidden and periodic log lines carry the progress.

use std::io::IsTerminal;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-file bar: compressed bytes consumed out of the file's size on disk.
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{prefix:<24.dim} {bar:30.green/dim} {binary_bytes:>7}/{binary_total_bytes:7} {wide_msg:.dim}",
        )
        .expect("invalid template")
        .progress_chars("--")
}

/// Shown until the file's size is known.
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<24.dim} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Switch a pending bar to a byte bar once the total is known.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Central progress context managing the per-file bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Bar for one dump file. Hidden (no-op) outside a TTY.
    pub fn file_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        // Long dump names are truncated to keep bars aligned.
        let display = if name.len() > 24 { &name[..24] } else { name };
        pb.set_prefix(display.to_string());
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// The underlying `MultiProgress`, for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<ProgressContext>;

/// Format a count with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(7), "7");
        assert_eq!(fmt_num(999), "999");
    }

    #[test]
    fn fmt_num_groups_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(7_654_321), "7,654,321");
    }

    #[test]
    fn hidden_bar_outside_tty() {
        // Test runners are not TTYs, so bars must be hidden no-ops.
        let ctx = ProgressContext::new();
        assert!(!ctx.is_tty());
        let pb = ctx.file_bar("RC_2020-01.zst");
        assert!(pb.is_hidden());
    }
}
