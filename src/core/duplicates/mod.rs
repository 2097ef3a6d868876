//! # Duplicates Module
//!
//! Finds files that are equivalent under a selectable strategy.
//!
//! ## Strategies
//! | Strategy | Identifier | Match |
//! |----------|------------|-------|
//! | `size` | byte size | equal |
//! | `name` | normalized name | edit-distance similarity >= threshold |
//! | `hash` | SHA-256 of the bytes | equal |
//! | `content` | perceptual hash | bit similarity >= threshold |
//!
//! ## Grouping
//! Pairs whose sizes differ by more than 10% are skipped before any
//! identifier comparison. Files are then grouped by single linkage in
//! submission order: each unassigned file seeds a group and absorbs every
//! later unassigned file that matches any member so far.
//!
//! Jobs above the offload threshold, and every `content` job, run through
//! [`ChunkedDuplicateDetector`]. Chunks are detected independently, so a
//! file and its duplicate that land in different chunks are both reported
//! unique.

mod cache;
mod chunked;
mod detector;
mod group;
mod identifier;
mod settings;

pub use cache::{CacheStats, HashCache, DEFAULT_CACHE_CAPACITY};
pub use chunked::{ChunkedConfig, ChunkedDuplicateDetector};
pub use detector::DuplicateDetector;
pub use group::DuplicateGroup;
pub use identifier::{
    calculate_string_similarity, compute_identifier, content_similarity, fast_duplicate_check,
    identifiers_match, normalize_name, ContentHasher, Identifier, PerceptualHasher,
};
pub use settings::{CompareBy, DuplicateSettings, KeepPolicy};

use crate::core::source::SourceFile;
use crate::error::{Classify, DetectError, ErrorClass};
use crate::events::{DuplicateEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A file whose identifier could not be computed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file_id: String,
    pub file_name: String,
    pub message: String,
    pub class: ErrorClass,
}

impl FileError {
    pub(crate) fn new(file: &SourceFile, error: &DetectError) -> Self {
        Self {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            message: error.to_string(),
            class: error.class(),
        }
    }
}

/// Outcome of one detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateDetectionResult {
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Files that could be removed: group sizes minus one representative each
    pub duplicate_count: usize,
    /// Files not present in any group
    pub unique_files: Vec<SourceFile>,
    pub processing_time_ms: u64,
    /// Chunks the run was split into (1 for a direct run, 0 when disabled)
    pub chunks_processed: usize,
    /// Ids marked for removal when auto-remove is on
    pub files_to_remove: Vec<String>,
    /// Files skipped because their identifier failed; also listed as unique
    pub errors: Vec<FileError>,
    pub potential_savings_bytes: u64,
    /// Set when identifier computation stopped early; the files not reached
    /// are reported unique
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// The error policy recommended stopping at some point during the scan
    #[serde(default)]
    pub stop_recommended: bool,
}

impl DuplicateDetectionResult {
    pub(crate) fn assemble(
        duplicate_groups: Vec<DuplicateGroup>,
        unique_files: Vec<SourceFile>,
        errors: Vec<FileError>,
        settings: &DuplicateSettings,
        processing_time_ms: u64,
        chunks_processed: usize,
    ) -> Self {
        let duplicate_count = duplicate_groups.iter().map(|g| g.size() - 1).sum();
        let potential_savings_bytes = duplicate_groups.iter().map(|g| g.potential_savings()).sum();
        let files_to_remove = if settings.auto_remove && settings.keep_policy != KeepPolicy::Manual {
            duplicate_groups
                .iter()
                .flat_map(|g| g.duplicates().map(|f| f.id.clone()))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            duplicate_groups,
            duplicate_count,
            unique_files,
            processing_time_ms,
            chunks_processed,
            files_to_remove,
            errors,
            potential_savings_bytes,
            stop_reason: None,
            stop_recommended: false,
        }
    }

    /// Every file unique, nothing compared
    pub(crate) fn all_unique(files: &[SourceFile], settings: &DuplicateSettings) -> Self {
        Self::assemble(Vec::new(), files.to_vec(), Vec::new(), settings, 0, 0)
    }
}

/// Emit the per-group and completion events for a finished run
pub(crate) fn report(result: &DuplicateDetectionResult, events: &EventSender, cache: &HashCache) {
    for group in &result.duplicate_groups {
        events.send(Event::Duplicate(DuplicateEvent::GroupFound {
            group_id: group.id.to_string(),
            file_count: group.size(),
        }));
    }
    for error in &result.errors {
        events.send(Event::Duplicate(DuplicateEvent::FileSkipped {
            file_id: error.file_id.clone(),
            message: error.message.clone(),
        }));
    }

    info!(
        groups = result.duplicate_groups.len(),
        duplicates = result.duplicate_count,
        skipped = result.errors.len(),
        cache_hit_rate = cache.hit_rate(),
        elapsed_ms = result.processing_time_ms,
        "duplicate detection finished"
    );
    events.send(Event::Duplicate(DuplicateEvent::Completed {
        total_groups: result.duplicate_groups.len(),
        duplicate_count: result.duplicate_count,
        processing_time_ms: result.processing_time_ms,
    }));
}
