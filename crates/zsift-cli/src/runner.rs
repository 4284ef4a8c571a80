//! Run orchestration: enumerate files, compute pending work, drive the pool,
//! report the summary.

use std::process::ExitCode;

use anyhow::Context;
use zsift_core::{
    cleanup_tmp_files, collect_input_files, is_shutdown_requested, CheckpointStore, MemoryBudget,
    ProcessorOptions, SharedProgress, WorkItem,
};

use crate::config::RunConfig;
use crate::stats::RunSummary;

pub fn run(config: &RunConfig, progress: &SharedProgress) -> anyhow::Result<ExitCode> {
    log::info!(
        "zsift starting: input={}, output={}, format={}, processes={}, max_ram={:.1} GB",
        config.input.display(),
        config.output_dir.display(),
        config.format,
        config.processes,
        config.max_ram_gb
    );

    // Criterion errors (empty values, bad regex) abort before any file work.
    let filter = config.build_filter()?;
    match config.mode {
        zsift_core::MatchMode::Regex => log::info!(
            "Compiled {} regex pattern(s) for field '{}'",
            filter.value_count(),
            filter.field()
        ),
        mode => log::info!(
            "Loaded {} value(s) for {} matching on field '{}'",
            filter.value_count(),
            mode.label(),
            filter.field()
        ),
    }

    std::fs::create_dir_all(&config.output_dir).context("Cannot create output directory")?;
    cleanup_tmp_files(&config.output_dir).context("Failed to clean stale tmp files")?;

    log::info!(
        "Scanning {} for files matching pattern: {}",
        config.input.display(),
        config.file_filter.as_str()
    );
    let all_files =
        collect_input_files(&config.input, &config.file_filter, &config.file_extension)
            .context("Cannot enumerate input files")?;
    log::info!("Found {} total files", all_files.len());
    if all_files.is_empty() {
        log::error!("No matching input files found!");
        return Ok(ExitCode::from(1));
    }

    let total_found = all_files.len();
    let mut checkpoint = config.checkpoint_path.as_deref().map(CheckpointStore::load);
    let pending = match &checkpoint {
        Some(store) => {
            let pending = store.pending(all_files);
            let skipped = total_found - pending.len();
            if skipped > 0 {
                log::info!("Skipping {skipped} already processed files");
            }
            pending
        }
        None => all_files,
    };
    if pending.is_empty() {
        log::info!("All files already processed!");
        return Ok(ExitCode::SUCCESS);
    }
    log::info!("Processing {} pending files", pending.len());

    let items: Vec<WorkItem> = pending
        .into_iter()
        .map(|file| {
            let name = zsift_core::output_name(
                file.file_name(),
                &config.file_extension,
                config.format,
                config.sink.csv_compression,
            );
            WorkItem {
                file,
                output_path: config.output_dir.join(name),
                format: config.format,
            }
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.processes)
        .build()
        .context("Failed to create thread pool")?;

    let opts = ProcessorOptions {
        read: config.read,
        sink: config.sink.clone(),
        progress_log_interval: config.progress_log_interval,
    };
    let budget = MemoryBudget::new(config.max_ram_gb, config.ram_safety_margin);
    let totals = zsift_core::pool::run(
        &pool,
        items,
        &filter,
        &opts,
        checkpoint.as_mut(),
        budget,
        progress,
    );

    let summary = RunSummary::new(
        totals,
        &config.output_dir,
        config.format,
        config.sink.csv_compression,
    );
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }

    if is_shutdown_requested() {
        log::warn!("Processing interrupted by user");
        return Ok(ExitCode::from(130));
    }
    if summary.files_failed > 0 {
        log::warn!("{} files failed and were not checkpointed", summary.files_failed);
    }
    Ok(ExitCode::SUCCESS)
}
