//! CLI argument definitions (clap derive).
//!
//! Most options default to `None` here and resolve against the config file
//! in [`crate::config::RunConfig`], so the config can supply defaults.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "zsift",
    about = "Filter zstd NDJSON dumps into CSV or Parquet",
    version
)]
pub struct Cli {
    /// Input folder to recursively scan for dump files
    pub input: PathBuf,

    /// Output directory
    #[arg(long = "output_dir")]
    pub output_dir: Option<PathBuf>,

    /// Output format: csv or parquet
    #[arg(long)]
    pub format: Option<String>,

    /// Field to filter on
    #[arg(long)]
    pub field: Option<String>,

    /// Value(s) to match, comma separated
    #[arg(long)]
    pub value: Option<String>,

    /// File with newline separated values to match
    #[arg(long = "value_list", conflicts_with = "value")]
    pub value_list: Option<PathBuf>,

    /// Substring match instead of exact match
    #[arg(long, conflicts_with = "regex")]
    pub partial: bool,

    /// Treat values as regex patterns
    #[arg(long)]
    pub regex: bool,

    /// Regex pattern file names must match
    #[arg(long = "file_filter")]
    pub file_filter: Option<String>,

    /// Number of parallel workers
    #[arg(long)]
    pub processes: Option<usize>,

    /// Maximum RAM in GB (soft limit, warnings only)
    #[arg(long = "max_ram")]
    pub max_ram: Option<f64>,

    /// Checkpoint file name inside the output directory
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Disable checkpoint/resume
    #[arg(long = "no_checkpoint")]
    pub no_checkpoint: bool,

    /// Config file path (default: ./zsift.toml or ~/.config/zsift/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Suppress info logs (only warnings and errors)
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging (includes parse errors)
    #[arg(short, long)]
    pub verbose: bool,
}
