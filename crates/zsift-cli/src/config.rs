//! Configuration loading from TOML files, and resolution of CLI arguments
//! against it into one immutable run configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use zsift_core::{
    CriterionError, CsvCompression, LogFileOptions, MatchMode, OutputFormat, ParquetCompression,
    ReadOptions, RecordFilter, SinkOptions,
};

use crate::cli::Cli;

/// File-backed configuration for zsift.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub file_reading: FileReadingConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub normalization: NormalizationConfig,
    pub file_filtering: FileFilteringConfig,
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileReadingConfig {
    pub chunk_size_bytes: usize,
    pub max_window_size_bytes: u64,
    pub zst_max_window_size_bytes: u64,
}

impl Default for FileReadingConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 1 << 27,
            max_window_size_bytes: 1 << 30,
            zst_max_window_size_bytes: 1 << 31,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub progress_log_interval: usize,
    pub ram_safety_margin: f64,
    pub default_processes: usize,
    pub default_max_ram_gb: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            progress_log_interval: 100_000,
            ram_safety_margin: 0.9,
            default_processes: cpus,
            default_max_ram_gb: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_output_dir: PathBuf,
    pub default_format: String,
    pub csv_compression: String,
    pub parquet_compression: String,
    pub checkpoint_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_output_dir: PathBuf::from("output"),
            default_format: "csv".to_string(),
            csv_compression: "none".to_string(),
            parquet_compression: "snappy".to_string(),
            checkpoint_file: "checkpoint.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Fields forced to string columns before serialization.
    pub problematic_fields: Vec<String>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            problematic_fields: [
                "edited",
                "distinguished",
                "author_flair_text",
                "author_flair_css_class",
                "media",
                "media_embed",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileFilteringConfig {
    pub file_extension: String,
    pub default_file_filter: String,
}

impl Default for FileFilteringConfig {
    fn default() -> Self {
        Self {
            file_extension: ".zst".to_string(),
            default_file_filter: "^RC_|^RS_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub field: String,
    pub value: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            field: "subreddit".to_string(),
            value: "ukraine".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub log_file_name: String,
    pub log_max_bytes: u64,
    pub log_backup_count: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file_name: "zsift.log".to_string(),
            log_max_bytes: 16 * 1024 * 1024,
            log_backup_count: 5,
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Search order:
    /// 1. ./zsift.toml (current directory)
    /// 2. ~/.config/zsift/config.toml
    ///
    /// If no config file is found, returns the defaults.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("zsift.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }
        if let Some(dirs) = directories::ProjectDirs::from("", "", "zsift") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }
        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn log_file_options(&self) -> LogFileOptions {
        LogFileOptions {
            dir: self.logging.log_dir.clone(),
            file_name: self.logging.log_file_name.clone(),
            max_bytes: self.logging.log_max_bytes,
            backup_count: self.logging.log_backup_count,
        }
    }
}

/// Everything one run needs, resolved from CLI arguments and config.
#[derive(Debug)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub field: String,
    pub values: Vec<String>,
    pub mode: MatchMode,
    pub file_filter: Regex,
    pub file_extension: String,
    pub processes: usize,
    pub max_ram_gb: f64,
    pub ram_safety_margin: f64,
    /// `None` when checkpointing is disabled.
    pub checkpoint_path: Option<PathBuf>,
    pub read: ReadOptions,
    pub sink: SinkOptions,
    pub progress_log_interval: usize,
}

impl RunConfig {
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let format_name = cli
            .format
            .clone()
            .unwrap_or_else(|| config.output.default_format.clone());
        let format = OutputFormat::from_name(&format_name)
            .with_context(|| format!("Unknown output format: {format_name}"))?;

        let csv_compression = CsvCompression::from_name(&config.output.csv_compression)
            .with_context(|| {
                format!("Unknown csv_compression: {}", config.output.csv_compression)
            })?;
        let parquet_compression =
            ParquetCompression::from_name(&config.output.parquet_compression).with_context(
                || {
                    format!(
                        "Unknown parquet_compression: {}",
                        config.output.parquet_compression
                    )
                },
            )?;

        let pattern = cli
            .file_filter
            .clone()
            .unwrap_or_else(|| config.file_filtering.default_file_filter.clone());
        let file_filter = Regex::new(&pattern)
            .with_context(|| format!("Invalid file filter pattern '{pattern}'"))?;

        let mode = if cli.regex {
            MatchMode::Regex
        } else if cli.partial {
            MatchMode::Partial
        } else {
            MatchMode::Exact
        };

        let values = load_filter_values(cli, config)?;

        let output_dir = cli
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.default_output_dir.clone());
        let checkpoint_path = if cli.no_checkpoint {
            None
        } else {
            let name = cli
                .checkpoint
                .clone()
                .unwrap_or_else(|| config.output.checkpoint_file.clone());
            Some(output_dir.join(name))
        };

        Ok(Self {
            input: cli.input.clone(),
            output_dir,
            format,
            field: cli.field.clone().unwrap_or_else(|| config.defaults.field.clone()),
            values,
            mode,
            file_filter,
            file_extension: config.file_filtering.file_extension.clone(),
            processes: cli
                .processes
                .unwrap_or(config.processing.default_processes)
                .max(1),
            max_ram_gb: cli.max_ram.unwrap_or(config.processing.default_max_ram_gb),
            ram_safety_margin: config.processing.ram_safety_margin,
            checkpoint_path,
            read: ReadOptions {
                chunk_size_bytes: config.file_reading.chunk_size_bytes,
                max_window_size_bytes: config.file_reading.max_window_size_bytes,
                zst_max_window_size_bytes: config.file_reading.zst_max_window_size_bytes,
            },
            sink: SinkOptions {
                csv_compression,
                parquet_compression,
                problematic_fields: config.normalization.problematic_fields.clone(),
            },
            progress_log_interval: config.processing.progress_log_interval,
        })
    }

    /// Compile the record filter. Invalid regex values abort the run here,
    /// before any file is touched.
    pub fn build_filter(&self) -> Result<RecordFilter, CriterionError> {
        RecordFilter::new(&self.field, &self.values, self.mode)
    }
}

/// Values from `--value_list` (one per line) or `--value` (comma separated),
/// trimmed, empties skipped, duplicates removed keeping first occurrence.
fn load_filter_values(cli: &Cli, config: &Config) -> Result<Vec<String>> {
    let raw: Vec<String> = if let Some(path) = &cli.value_list {
        log::info!("Reading values from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read value list: {}", path.display()))?;
        content.lines().map(str::to_string).collect()
    } else {
        cli.value
            .clone()
            .unwrap_or_else(|| config.defaults.value.clone())
            .split(',')
            .map(str::to_string)
            .collect()
    };

    let mut seen = std::collections::HashSet::new();
    let values: Vec<String> = raw
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect();
    Ok(values)
}
