//! Bounded-parallel execution of work items.
//!
//! Workers claim files from an atomic queue and own them end-to-end; the
//! only cross-worker traffic is the completion channel. The single consumer
//! on the calling thread serializes checkpoint writes and aggregate updates,
//! so neither needs locking.

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::checkpoint::CheckpointStore;
use crate::criterion::RecordFilter;
use crate::memory::{bytes_to_gb, MemoryBudget, MemoryGovernor};
use crate::processor::{self, ProcessingResult, ProcessorOptions, WorkItem};
use crate::progress::{fmt_num, upgrade_to_bar, SharedProgress};
use crate::shutdown::shutdown_flag;
use crate::work_queue::WorkQueue;

/// Aggregate totals across one run.
#[derive(Debug, Default)]
pub struct RunTotals {
    pub files_attempted: usize,
    pub files_completed: usize,
    pub files_failed: usize,
    pub lines_scanned: usize,
    pub records_matched: usize,
    pub error_lines: usize,
    pub peak_resident: u64,
    pub elapsed: Duration,
}

/// Completion channel depth. Consumption is cheap, so a shallow queue only
/// ever fills when the consumer is mid-checkpoint-write.
const RESULT_QUEUE_DEPTH: usize = 64;

/// Process every item with bounded parallelism, consuming completions as
/// they arrive. Spawns one worker task per pool thread; an interrupt stops
/// workers from claiming new files while in-flight files drain.
pub fn run(
    pool: &rayon::ThreadPool,
    items: Vec<WorkItem>,
    filter: &RecordFilter,
    opts: &ProcessorOptions,
    mut checkpoint: Option<&mut CheckpointStore>,
    budget: MemoryBudget,
    progress: &SharedProgress,
) -> RunTotals {
    let start = Instant::now();
    let total_files = items.len();
    let queue = WorkQueue::new(items);
    let queue = &queue;
    let (tx, rx) = mpsc::sync_channel::<ProcessingResult>(RESULT_QUEUE_DEPTH);

    let mut totals = RunTotals::default();
    let mut governor = MemoryGovernor::new(budget);

    pool.in_place_scope(|scope| {
        for _ in 0..pool.current_num_threads() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let mut sampler = MemoryGovernor::new(budget);
                while let Some(item) = queue.next() {
                    if shutdown_flag().load(Ordering::Relaxed) {
                        break;
                    }
                    let pb = progress.file_bar(item.file.file_name());
                    if let Ok(meta) = std::fs::metadata(&item.file.path) {
                        upgrade_to_bar(&pb, meta.len());
                    }
                    let result = processor::process_file(item, filter, opts, &mut sampler, &pb);
                    pb.finish_and_clear();
                    if tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        // Sole consumer: aggregates and checkpoint mutation happen only here.
        for result in rx {
            totals.files_attempted += 1;
            totals.lines_scanned += result.lines_scanned;
            totals.records_matched += result.records_matched;
            totals.error_lines += result.error_lines;
            if result.is_complete() {
                totals.files_completed += 1;
                if let Some(store) = checkpoint.as_deref_mut() {
                    store.mark_processed(&result.file_id);
                }
            } else {
                totals.files_failed += 1;
            }

            let stats = governor.stats();
            totals.peak_resident = totals.peak_resident.max(stats.resident);
            let pct = if total_files > 0 {
                totals.files_attempted as f64 / total_files as f64 * 100.0
            } else {
                100.0
            };
            log::info!(
                "Progress: {}/{} ({pct:.1}%) | Total matched: {} | RAM: {:.2} GB",
                totals.files_attempted,
                total_files,
                fmt_num(totals.records_matched),
                bytes_to_gb(stats.resident)
            );
            if !budget.contains(stats.resident) {
                log::warn!(
                    "Approaching memory limit! Current: {:.2} GB / Max: {:.2} GB",
                    bytes_to_gb(stats.resident),
                    bytes_to_gb(budget.max_bytes())
                );
            }
        }
    });

    totals.elapsed = start.elapsed();
    totals
}
