//! Logging setup: console output (indicatif-aware in TTY mode) plus an
//! optional size-rotated plain-text log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use indicatif::MultiProgress;
use log::LevelFilter;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Log file destination with size-based rotation.
#[derive(Debug, Clone)]
pub struct LogFileOptions {
    pub dir: PathBuf,
    pub file_name: String,
    pub max_bytes: u64,
    pub backup_count: usize,
}

/// Appending log file that rotates (`name` → `name.1` → … → `name.N`) when
/// the size limit is reached.
struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    state: Mutex<(File, u64)>,
}

impl RotatingFile {
    fn open(opts: &LogFileOptions) -> std::io::Result<Self> {
        std::fs::create_dir_all(&opts.dir)?;
        let path = opts.dir.join(&opts.file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes: opts.max_bytes,
            backup_count: opts.backup_count,
            state: Mutex::new((file, size)),
        })
    }

    fn write_line(&self, line: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let len = line.len() as u64 + 1;
        if self.max_bytes > 0 && state.1 + len > self.max_bytes {
            if let Ok(file) = self.rotate() {
                *state = (file, 0);
            }
        }
        if writeln!(state.0, "{line}").is_ok() {
            state.1 += len;
        }
    }

    /// Shift backups up by one and reopen a fresh file.
    fn rotate(&self) -> std::io::Result<File> {
        let backup = |n: usize| PathBuf::from(format!("{}.{n}", self.path.display()));
        if self.backup_count > 0 {
            let _ = std::fs::remove_file(backup(self.backup_count));
            for n in (1..self.backup_count).rev() {
                let _ = std::fs::rename(backup(n), backup(n + 1));
            }
            let _ = std::fs::rename(&self.path, backup(1));
        } else {
            let _ = std::fs::remove_file(&self.path);
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

/// Logger combining a console (optionally routed through indicatif so lines
/// print above active bars) with an optional rotating file. The file gets
/// every record the filter allows; the console can additionally be capped at
/// warnings so progress bars stay readable.
struct TeeLogger {
    inner: env_logger::Logger,
    console_level: LevelFilter,
    multi: Option<MultiProgress>,
    file: Option<RotatingFile>,
}

impl log::Log for TeeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        if let Some(file) = &self.file {
            let (_, label, _) = level_style(record.level(), false);
            let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            file.write_line(&format!("[{ts} {label}] {}", record.args()));
        }
        if record.level() > self.console_level {
            return;
        }
        match &self.multi {
            Some(multi) => {
                let (pre, label, post) = level_style(record.level(), true);
                let line = format!("[{pre}{label}{post}] {}", record.args());
                multi.suspend(|| eprintln!("{line}"));
            }
            None => {
                let (_, label, _) = level_style(record.level(), false);
                let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                eprintln!("[{ts} {label}] {}", record.args());
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging.
///
/// `quiet_console` caps console output at warnings without affecting the log
/// file. `RUST_LOG` overrides the base filter as usual.
pub fn init_logging(
    quiet_console: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
    file: Option<&LogFileOptions>,
) {
    let default_level = if debug { "debug" } else { "info" };
    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .build();
    let max_level = inner.filter();

    let file = file.and_then(|opts| match RotatingFile::open(opts) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("warning: cannot open log file in {}: {e}", opts.dir.display());
            None
        }
    });

    let logger = TeeLogger {
        inner,
        console_level: if quiet_console {
            LevelFilter::Warn
        } else {
            max_level
        },
        multi: multi.cloned(),
        file,
    };

    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}
