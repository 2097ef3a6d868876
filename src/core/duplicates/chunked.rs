//! Chunked detection on a bounded worker pool.
//!
//! Each chunk is an independent job: it owns a copy of its file list, runs
//! the sequential detector, and sends its result back over a channel. Chunk
//! `i` always covers files `[i * chunk_size, (i + 1) * chunk_size)`;
//! results are merged in chunk order regardless of completion order.

use super::detector::DuplicateDetector;
use super::settings::DuplicateSettings;
use super::{report, DuplicateDetectionResult};
use crate::core::batch::CancellationToken;
use crate::core::source::SourceFile;
use crate::error::{DetectError, SettingsError};
use crate::events::{null_sender, DuplicateEvent, Event, EventSender};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Chunking and offload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkedConfig {
    /// Files per chunk
    pub chunk_size: usize,
    /// Chunks detected at once
    pub max_concurrency: usize,
    /// Above this many files the plain detector delegates here
    pub offload_threshold: usize,
    /// Longest wait for the next chunk to report
    pub chunk_timeout: Duration,
}

impl Default for ChunkedConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            offload_threshold: 100,
            chunk_timeout: Duration::from_secs(300),
        }
    }
}

impl ChunkedConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(SettingsError::InvalidChunking(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SettingsError::InvalidChunking(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if self.chunk_timeout.is_zero() {
            return Err(SettingsError::InvalidChunking(
                "chunk timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits large file sets into chunks and detects each one in parallel.
///
/// Duplicates split across two chunks are not found.
pub struct ChunkedDuplicateDetector {
    detector: DuplicateDetector,
    config: ChunkedConfig,
}

impl ChunkedDuplicateDetector {
    pub fn new(detector: DuplicateDetector, config: ChunkedConfig) -> Self {
        Self { detector, config }
    }

    pub fn detect(
        &self,
        files: &[SourceFile],
        settings: &DuplicateSettings,
    ) -> Result<DuplicateDetectionResult, DetectError> {
        self.detect_with_events(files, settings, &null_sender(), &CancellationToken::new())
    }

    pub fn detect_with_events(
        &self,
        files: &[SourceFile],
        settings: &DuplicateSettings,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<DuplicateDetectionResult, DetectError> {
        settings.validate()?;
        self.config.validate()?;
        let start = Instant::now();

        events.send(Event::Duplicate(DuplicateEvent::Started {
            total_files: files.len(),
            strategy: settings.compare_by.to_string(),
        }));

        if !settings.enabled {
            let result = DuplicateDetectionResult::all_unique(files, settings);
            report(&result, events, self.detector.cache());
            return Ok(result);
        }

        let chunks: Vec<Vec<SourceFile>> = files
            .chunks(self.config.chunk_size)
            .map(<[SourceFile]>::to_vec)
            .collect();
        let total_chunks = chunks.len();
        info!(
            files = files.len(),
            chunks = total_chunks,
            chunk_size = self.config.chunk_size,
            max_concurrency = self.config.max_concurrency,
            "chunked duplicate detection started"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_concurrency)
            .thread_name(|i| format!("dupe-chunk-{}", i))
            .build()
            .map_err(|e| DetectError::WorkerFailed(e.to_string()))?;

        let (sender, receiver) = unbounded();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let sender = sender.clone();
            let detector = self.detector.clone();
            let settings = settings.clone();
            let cancel = cancel.clone();

            pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    detector.detect_chunk(&chunk, &settings, &cancel)
                }))
                .unwrap_or_else(|_| Err(DetectError::WorkerFailed(format!("chunk {} panicked", index))));
                let _ = sender.send((index, outcome));
            });
        }
        drop(sender);

        let mut slots: Vec<Option<DuplicateDetectionResult>> = (0..total_chunks).map(|_| None).collect();
        let mut first_error = None;
        for received in 0..total_chunks {
            let (index, outcome) = match receiver.recv_timeout(self.config.chunk_timeout) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    let pending = total_chunks - received;
                    warn!(pending, "chunk workers did not report in time");
                    return Err(DetectError::ChunkTimeout {
                        pending,
                        timeout_ms: self.config.chunk_timeout.as_millis() as u64,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match outcome {
                Ok(result) => {
                    events.send(Event::Duplicate(DuplicateEvent::ChunkCompleted {
                        chunk_index: index,
                        total_chunks,
                        groups_found: result.duplicate_groups.len(),
                    }));
                    slots[index] = Some(result);
                }
                Err(e) => {
                    warn!(chunk_index = index, error = %e, "chunk failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        let mut groups = Vec::new();
        let mut unique = Vec::new();
        let mut errors = Vec::new();
        let mut stop_reason = None;
        let mut stop_recommended = false;
        for slot in slots {
            let chunk = slot.ok_or_else(|| {
                DetectError::WorkerFailed("a chunk finished without reporting".to_string())
            })?;
            groups.extend(chunk.duplicate_groups);
            unique.extend(chunk.unique_files);
            errors.extend(chunk.errors);
            stop_recommended |= chunk.stop_recommended;
            if stop_reason.is_none() {
                stop_reason = chunk.stop_reason;
            }
        }

        let mut result = DuplicateDetectionResult::assemble(
            groups,
            unique,
            errors,
            settings,
            start.elapsed().as_millis() as u64,
            total_chunks,
        );
        result.stop_reason = stop_reason;
        result.stop_recommended = stop_recommended;
        report(&result, events, self.detector.cache());
        Ok(result)
    }
}
