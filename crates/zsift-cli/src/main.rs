//! zsift — filter zstd NDJSON dumps into CSV or Parquet.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use zsift_core::shutdown_flag;

mod cli;
mod config;
mod runner;
mod stats;

use cli::Cli;
use config::{Config, RunConfig};

fn main() -> ExitCode {
    let args = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(zsift_core::ProgressContext::new());

    // Console:
    //   TTY:     quiet (warn) unless --verbose — progress bars show activity
    //   non-TTY: info unless --quiet          — logs are the only progress
    // The rotating log file always receives the full filtered stream.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet_console = args.quiet || (is_tty && !args.verbose);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(1);
        }
    };
    zsift_core::init_logging(
        quiet_console,
        args.verbose,
        multi,
        Some(&config.log_file_options()),
    );

    let run_config = match RunConfig::resolve(&args, &config) {
        Ok(run_config) => run_config,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    setup_signal_handler();

    match runner::run(&run_config, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn load_config(args: &Cli) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
}

fn setup_signal_handler() {
    // First signal: set the graceful shutdown flag so workers stop claiming
    // new files. Second signal: force exit.
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    unsafe {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
            .expect("Failed to register signal handler");
        }
    }
}
