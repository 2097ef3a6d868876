//! Event type definitions for progress reporting.

use crate::error::ErrorClass;
use serde::{Deserialize, Serialize};

/// All events emitted by the preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Batch conversion events
    Conversion(ConversionEvent),
    /// Duplicate detection events
    Duplicate(DuplicateEvent),
}

/// Events during a batch conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversionEvent {
    /// Batch has started
    Started { total_files: usize, chunk_size: usize },
    /// Progress update, emitted before and after each file
    Progress(BatchProgress),
    /// A file finished (successfully or not)
    FileCompleted {
        file_id: String,
        success: bool,
        error_class: Option<ErrorClass>,
    },
    /// The requested format was swapped for a supported one
    FallbackUsed { requested: String, used: String },
    /// The error policy recommended stopping but the batch continues
    StopRecommended { reason: String },
    /// Batch stopped early
    Aborted { reason: String },
    /// Batch was cancelled by the caller
    Cancelled { completed_files: usize },
    /// Batch completed
    Completed(BatchSummary),
}

/// Progress information during a batch conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Number of files in the batch
    pub total_files: usize,
    /// Number of files finished so far
    pub completed_files: usize,
    /// Name of the file being processed
    pub current_file: String,
    /// Overall progress (0-100)
    pub overall_progress_pct: f64,
    /// Progress of the current file (0 before, 100 after)
    pub current_file_progress_pct: f64,
    /// Remaining time extrapolated from the average so far
    pub estimated_remaining_ms: u64,
}

/// Summary of a finished batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Files submitted
    pub total_files: usize,
    /// Files converted successfully
    pub succeeded: usize,
    /// Files that failed
    pub failed: usize,
    /// Whether the caller cancelled the batch
    pub cancelled: bool,
    /// Why the batch stopped early, if it did
    pub stop_reason: Option<String>,
    /// Whether the error policy recommended stopping at any point
    pub stop_recommended: bool,
    /// Sum of source sizes for processed files
    pub total_original_bytes: u64,
    /// Sum of output sizes for successful files
    pub total_output_bytes: u64,
    /// Duration in milliseconds
    pub elapsed_ms: u64,
}

/// Events during duplicate detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DuplicateEvent {
    /// Detection has started
    Started { total_files: usize, strategy: String },
    /// One chunk of a chunked run finished
    ChunkCompleted {
        chunk_index: usize,
        total_chunks: usize,
        groups_found: usize,
    },
    /// A duplicate group was found
    GroupFound { group_id: String, file_count: usize },
    /// An identifier could not be computed; the file is treated as unique
    FileSkipped { file_id: String, message: String },
    /// Detection completed
    Completed {
        total_groups: usize,
        duplicate_count: usize,
        processing_time_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Conversion(ConversionEvent::Progress(BatchProgress {
            total_files: 10,
            completed_files: 4,
            current_file: "beach.jpg".to_string(),
            overall_progress_pct: 40.0,
            current_file_progress_pct: 0.0,
            estimated_remaining_ms: 1200,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Conversion(ConversionEvent::Progress(p)) => {
                assert_eq!(p.completed_files, 4);
                assert_eq!(p.current_file, "beach.jpg");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn batch_summary_is_serializable() {
        let summary = BatchSummary {
            total_files: 100,
            succeeded: 97,
            failed: 3,
            total_original_bytes: 500_000_000,
            ..Default::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("500000000"));
    }
}
