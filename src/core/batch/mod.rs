//! # Batch Module
//!
//! Drives the conversion worker over a list of files.
//!
//! ## Memory model
//! Decoding is the memory-heavy step, so files are never decoded in
//! parallel. The list is split into chunks sized from an estimate of the
//! memory available to the batch (each file is assumed to need four times
//! its encoded size once decoded). Chunks run one after another with a short
//! pause in between so freed buffers can be reclaimed.
//!
//! ## Stopping early
//! - the caller cancels: no new file is started, finished results are kept
//! - more than 80% of at least ten results failed
//! - the error policy reports memory pressure

mod cancel;
mod memory;

pub use cancel::CancellationToken;
pub use memory::{estimate_available_memory, optimal_chunk_size};

use crate::core::convert::{ConversionOptions, ConversionResult, ConversionWorker};
use crate::core::recovery::{BatchDecision, ErrorPolicy, StopReason};
use crate::core::source::SourceFile;
use crate::error::ErrorClass;
use crate::events::{
    null_sender, BatchProgress, BatchSummary, ConversionEvent, Event, EventSender, ProgressSink,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MB: u64 = 1024 * 1024;

/// Batch scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Device memory override; detected when None
    pub device_memory_bytes: Option<u64>,
    /// Share of device memory the batch may use
    pub memory_fraction: f64,
    /// Budget used when device memory is unknown
    pub memory_floor_bytes: u64,
    /// Smallest chunk
    pub min_chunk_size: usize,
    /// Largest chunk
    pub max_chunk_size: usize,
    /// Pause between chunks
    pub chunk_pause: Duration,
    /// Failure rate above which the batch aborts
    pub abort_failure_rate: f64,
    /// Results needed before the failure rate is considered
    pub abort_min_results: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            device_memory_bytes: None,
            memory_fraction: 0.15,
            memory_floor_bytes: 200 * MB,
            min_chunk_size: 1,
            max_chunk_size: 50,
            chunk_pause: Duration::from_millis(10),
            abort_failure_rate: 0.8,
            abort_min_results: 10,
        }
    }
}

/// Results plus a summary of the run
#[derive(Debug)]
pub struct BatchOutcome {
    /// One result per attempted file, in submission order
    pub results: Vec<ConversionResult>,
    pub summary: BatchSummary,
}

/// Move visible files to the front, keeping relative order otherwise.
///
/// This is the only reordering the batch converter allows.
pub fn prioritize(files: &[SourceFile], visible_ids: &[String]) -> Vec<SourceFile> {
    let visible: HashSet<&str> = visible_ids.iter().map(String::as_str).collect();
    let (mut front, back): (Vec<_>, Vec<_>) = files
        .iter()
        .cloned()
        .partition(|file| visible.contains(file.id.as_str()));
    front.extend(back);
    front
}

/// Sequential, memory-aware batch conversion
pub struct BatchConverter {
    worker: ConversionWorker,
    policy: ErrorPolicy,
    config: BatchConfig,
}

impl BatchConverter {
    pub fn new(worker: ConversionWorker, policy: ErrorPolicy, config: BatchConfig) -> Self {
        Self {
            worker,
            policy,
            config,
        }
    }

    /// Chunk size for this list of files
    pub fn chunk_size_for(&self, files: &[SourceFile]) -> usize {
        let available = estimate_available_memory(&self.config);
        optimal_chunk_size(files, available, &self.config)
    }

    /// Convert a batch, reporting progress through a callback
    pub fn convert_batch(
        &self,
        files: &[SourceFile],
        options: &ConversionOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        self.run(files, options, progress, &null_sender(), cancel)
    }

    /// Convert a batch, reporting everything through the event channel
    pub fn convert_batch_with_events(
        &self,
        files: &[SourceFile],
        options: &ConversionOptions,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        self.run(files, options, events, events, cancel)
    }

    fn run(
        &self,
        files: &[SourceFile],
        options: &ConversionOptions,
        progress: &dyn ProgressSink,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let start = Instant::now();
        let total = files.len();
        let chunk_size = self.chunk_size_for(files);

        info!(total_files = total, chunk_size, format = %options.output_format, "batch started");
        events.send(Event::Conversion(ConversionEvent::Started {
            total_files: total,
            chunk_size,
        }));

        let mut results: Vec<ConversionResult> = Vec::with_capacity(total);
        let mut failed = 0;
        let mut memory_error_seen = false;
        let mut cancelled = false;
        let mut stop_recommended = false;
        let mut stop_reason: Option<String> = None;

        'chunks: for (chunk_index, chunk) in files.chunks(chunk_size.max(1)).enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if chunk_index > 0 && !self.config.chunk_pause.is_zero() {
                thread::sleep(self.config.chunk_pause);
            }
            debug!(chunk_index, files = chunk.len(), "processing chunk");

            for file in chunk {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'chunks;
                }

                progress.on_progress(&self.progress(total, results.len(), &file.name, 0.0, start));

                let result = self.worker.convert(file, options);
                if !result.success {
                    failed += 1;
                    memory_error_seen |= result.error_class == Some(ErrorClass::Memory);
                }
                if let Some(used) = result.fallback_format_used {
                    events.send(Event::Conversion(ConversionEvent::FallbackUsed {
                        requested: options.output_format.to_string(),
                        used: used.to_string(),
                    }));
                }
                events.send(Event::Conversion(ConversionEvent::FileCompleted {
                    file_id: result.file_id.clone(),
                    success: result.success,
                    error_class: result.error_class,
                }));
                results.push(result);

                progress.on_progress(&self.progress(total, results.len(), &file.name, 100.0, start));

                let completed = results.len();
                if self.exceeds_abort_rate(completed, failed) {
                    stop_reason = Some(format!(
                        "{} of {} files failed, above the {:.0}% limit",
                        failed,
                        completed,
                        self.config.abort_failure_rate * 100.0
                    ));
                    break 'chunks;
                }
                match self.policy.batch_decision(completed, failed, memory_error_seen) {
                    BatchDecision::Stop(StopReason::MemoryPressure) => {
                        stop_reason = Some(StopReason::MemoryPressure.to_string());
                        break 'chunks;
                    }
                    BatchDecision::Stop(reason) => {
                        if !stop_recommended {
                            warn!(%reason, "error policy recommends stopping the batch");
                            events.send(Event::Conversion(ConversionEvent::StopRecommended {
                                reason: reason.to_string(),
                            }));
                        }
                        stop_recommended = true;
                    }
                    BatchDecision::Continue => {}
                }
            }
        }

        if let Some(reason) = &stop_reason {
            warn!(reason = %reason, completed = results.len(), "batch aborted");
            stop_recommended = true;
            events.send(Event::Conversion(ConversionEvent::Aborted {
                reason: reason.clone(),
            }));
        }
        if cancelled {
            info!(completed = results.len(), "batch cancelled");
            events.send(Event::Conversion(ConversionEvent::Cancelled {
                completed_files: results.len(),
            }));
        }

        let summary = BatchSummary {
            total_files: total,
            succeeded: results.len() - failed,
            failed,
            cancelled,
            stop_reason,
            stop_recommended,
            total_original_bytes: results.iter().map(|r| r.original_size).sum(),
            total_output_bytes: results.iter().map(|r| r.output_size).sum(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = summary.elapsed_ms,
            "batch finished"
        );
        events.send(Event::Conversion(ConversionEvent::Completed(summary.clone())));

        BatchOutcome { results, summary }
    }

    fn exceeds_abort_rate(&self, completed: usize, failed: usize) -> bool {
        completed >= self.config.abort_min_results
            && completed > 0
            && failed as f64 / completed as f64 > self.config.abort_failure_rate
    }

    fn progress(
        &self,
        total: usize,
        completed: usize,
        current_file: &str,
        current_file_pct: f64,
        start: Instant,
    ) -> BatchProgress {
        let overall = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let estimated_remaining_ms = if completed == 0 {
            0
        } else {
            let per_file = start.elapsed().as_millis() as u64 / completed as u64;
            per_file * (total - completed) as u64
        };

        BatchProgress {
            total_files: total,
            completed_files: completed,
            current_file: current_file.to_string(),
            overall_progress_pct: overall,
            current_file_progress_pct: current_file_pct,
            estimated_remaining_ms,
        }
    }
}
