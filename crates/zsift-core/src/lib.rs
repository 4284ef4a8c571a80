//! zsift core — streaming extraction of matching records from zstd NDJSON dumps
//!
//! The engine decompresses dump files chunk by chunk, reassembles logical
//! lines, filters each record by a single field, and hands matches to a
//! CSV/Parquet sink — checkpointed and bounded-parallel across a file set.

pub mod checkpoint;
pub mod criterion;
pub mod decode;
pub mod discover;
pub mod lines;
pub mod logging;
pub mod memory;
pub mod pool;
pub mod processor;
pub mod progress;
pub mod schema;
pub mod shutdown;
pub mod sink;
pub mod work_queue;

// Re-exports for convenience
pub use checkpoint::CheckpointStore;
pub use criterion::{Classified, CriterionError, MatchMode, Record, RecordFilter};
pub use decode::{ByteCounter, ChunkDecoder, DecodeError, ReadOptions};
pub use discover::{collect_input_files, DumpFile};
pub use lines::LineAssembler;
pub use logging::{init_logging, LogFileOptions};
pub use memory::{MemoryBudget, MemoryGovernor, MemoryStats};
pub use pool::RunTotals;
pub use processor::{FileOutcome, ProcessingResult, ProcessorOptions, WorkItem};
pub use progress::{ProgressContext, SharedProgress};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{
    cleanup_tmp_files, output_name, CsvCompression, OutputFormat, ParquetCompression, SinkOptions,
};
