//! Tabular output sinks — one CSV or Parquet file per dump file.
//!
//! Writes go to a `.tmp` sibling renamed into place on success, so an
//! interrupted run never leaves a half-written output behind.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use arrow::csv;
use flate2::write::GzEncoder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::criterion::Record;
use crate::schema::records_to_batches;

/// Rows per Arrow batch handed to the writers.
pub const BATCH_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvCompression {
    None,
    Gzip,
}

impl CsvCompression {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "gzip" => Some(Self::Gzip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParquetCompression {
    Uncompressed,
    Snappy,
    Gzip,
    Zstd,
}

impl ParquetCompression {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "uncompressed" => Some(Self::Uncompressed),
            "snappy" => Some(Self::Snappy),
            "gzip" => Some(Self::Gzip),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }

    fn to_parquet(self) -> Compression {
        match self {
            Self::Uncompressed => Compression::UNCOMPRESSED,
            Self::Snappy => Compression::SNAPPY,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// Writer configuration shared across all files in a run.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub csv_compression: CsvCompression,
    pub parquet_compression: ParquetCompression,
    /// Fields forced to string columns to avoid mixed-type failures.
    pub problematic_fields: Vec<String>,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            csv_compression: CsvCompression::None,
            parquet_compression: ParquetCompression::Snappy,
            problematic_fields: Vec::new(),
        }
    }
}

/// Output file name for a dump file: the dump extension is replaced by the
/// format extension, honoring gzip CSV.
pub fn output_name(
    input_name: &str,
    dump_extension: &str,
    format: OutputFormat,
    csv_compression: CsvCompression,
) -> String {
    let stem = input_name.strip_suffix(dump_extension).unwrap_or(input_name);
    match (format, csv_compression) {
        (OutputFormat::Parquet, _) => format!("{stem}.parquet"),
        (OutputFormat::Csv, CsvCompression::Gzip) => format!("{stem}.csv.gz"),
        (OutputFormat::Csv, CsvCompression::None) => format!("{stem}.csv"),
    }
}

/// Serialize one file's matched records. All-or-nothing: on any failure the
/// tmp file is removed and no output exists at `path`.
pub fn write_records(
    records: &[Record],
    format: OutputFormat,
    path: &Path,
    opts: &SinkOptions,
) -> io::Result<()> {
    let (schema, batches) = records_to_batches(records, &opts.problematic_fields, BATCH_SIZE)
        .map_err(io::Error::other)?;

    let tmp = tmp_path(path);
    if tmp.exists() {
        fs::remove_file(&tmp)?;
    }
    let written = match format {
        OutputFormat::Parquet => {
            write_parquet(&tmp, &schema, &batches, opts.parquet_compression)
        }
        OutputFormat::Csv => write_csv(&tmp, &batches, opts.csv_compression),
    };
    match written {
        Ok(()) => fs::rename(&tmp, path),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn write_parquet(
    path: &Path,
    schema: &std::sync::Arc<arrow::datatypes::Schema>,
    batches: &[arrow::array::RecordBatch],
    compression: ParquetCompression,
) -> io::Result<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(compression.to_parquet())
        .build();
    let mut writer =
        ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(io::Error::other)?;
    for batch in batches {
        writer.write(batch).map_err(io::Error::other)?;
    }
    writer.close().map_err(io::Error::other)?;
    Ok(())
}

fn write_csv(
    path: &Path,
    batches: &[arrow::array::RecordBatch],
    compression: CsvCompression,
) -> io::Result<()> {
    let file = File::create(path)?;
    match compression {
        CsvCompression::Gzip => {
            let encoder = GzEncoder::new(file, flate2::Compression::default());
            let mut writer = csv::WriterBuilder::new().with_header(true).build(encoder);
            for batch in batches {
                writer.write(batch).map_err(io::Error::other)?;
            }
            writer.into_inner().finish()?;
        }
        CsvCompression::None => {
            let mut writer = csv::WriterBuilder::new().with_header(true).build(file);
            for batch in batches {
                writer.write(batch).map_err(io::Error::other)?;
            }
        }
    }
    Ok(())
}

/// Remove stale `.tmp` files left behind by an interrupted run.
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn records(lines: &[&str]) -> Vec<Record> {
        lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[test]
    fn output_name_per_format() {
        assert_eq!(
            output_name("RC_2020-01.zst", ".zst", OutputFormat::Csv, CsvCompression::None),
            "RC_2020-01.csv"
        );
        assert_eq!(
            output_name("RC_2020-01.zst", ".zst", OutputFormat::Csv, CsvCompression::Gzip),
            "RC_2020-01.csv.gz"
        );
        assert_eq!(
            output_name("RC_2020-01.zst", ".zst", OutputFormat::Parquet, CsvCompression::None),
            "RC_2020-01.parquet"
        );
    }

    #[test]
    fn csv_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = records(&[
            r#"{"subreddit":"ukraine","score":5}"#,
            r#"{"subreddit":"kyiv","score":7}"#,
        ]);
        write_records(&records, OutputFormat::Csv, &path, &SinkOptions::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "subreddit,score");
        assert_eq!(lines[1], "ukraine,5");
        assert_eq!(lines[2], "kyiv,7");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn gzip_csv_decompresses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv.gz");
        let opts = SinkOptions {
            csv_compression: CsvCompression::Gzip,
            ..SinkOptions::default()
        };
        write_records(
            &records(&[r#"{"subreddit":"ukraine"}"#]),
            OutputFormat::Csv,
            &path,
            &opts,
        )
        .unwrap();

        let mut decoder = flate2::read::GzDecoder::new(File::open(&path).unwrap());
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert_eq!(content, "subreddit\nukraine\n");
    }

    #[test]
    fn parquet_roundtrips() {
        use arrow::array::{Int64Array, StringArray};
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.parquet");
        write_records(
            &records(&[
                r#"{"subreddit":"ukraine","score":1}"#,
                r#"{"subreddit":"kyiv","score":2}"#,
            ]),
            OutputFormat::Parquet,
            &path,
            &SinkOptions::default(),
        )
        .unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        let subreddits = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(subreddits.value(0), "ukraine");
        let scores = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(scores.values(), &[1, 2]);
    }

    #[test]
    fn failed_write_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        // Target directory does not exist, so the tmp create fails.
        let path = dir.path().join("missing").join("out.csv");
        let err = write_records(
            &records(&[r#"{"a":1}"#]),
            OutputFormat::Csv,
            &path,
            &SinkOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.csv.tmp"), b"stale").unwrap();
        std::fs::write(dir.path().join("b.csv"), b"keep").unwrap();

        cleanup_tmp_files(dir.path()).unwrap();
        assert!(!dir.path().join("a.csv.tmp").exists());
        assert!(dir.path().join("b.csv").exists());
    }

    #[test]
    fn format_from_name() {
        assert_eq!(OutputFormat::from_name("csv"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_name("parquet"), Some(OutputFormat::Parquet));
        assert_eq!(OutputFormat::from_name("xlsx"), None);
    }

    #[test]
    fn compression_from_name() {
        assert_eq!(CsvCompression::from_name("gzip"), Some(CsvCompression::Gzip));
        assert_eq!(CsvCompression::from_name("none"), Some(CsvCompression::None));
        assert_eq!(CsvCompression::from_name("bz2"), None);
        assert_eq!(
            ParquetCompression::from_name("snappy"),
            Some(ParquetCompression::Snappy)
        );
        assert_eq!(
            ParquetCompression::from_name("zstd"),
            Some(ParquetCompression::Zstd)
        );
        assert_eq!(ParquetCompression::from_name("lzma"), None);
    }
}
