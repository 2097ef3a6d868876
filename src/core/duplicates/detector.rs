//! Sequential single-linkage detection.

use super::cache::HashCache;
use super::chunked::{ChunkedConfig, ChunkedDuplicateDetector};
use super::group::DuplicateGroup;
use super::identifier::{
    compute_identifier, fast_duplicate_check, identifiers_match, ContentHasher, Identifier,
    PerceptualHasher,
};
use super::settings::DuplicateSettings;
use super::{report, DuplicateDetectionResult, FileError};
use crate::core::batch::CancellationToken;
use crate::core::recovery::{BatchDecision, ErrorPolicy, StopReason};
use crate::core::source::SourceFile;
use crate::error::{Classify, DetectError, ErrorClass};
use crate::events::{null_sender, DuplicateEvent, Event, EventSender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Groups equivalent files, delegating large or `content` jobs to the
/// chunked detector.
#[derive(Clone)]
pub struct DuplicateDetector {
    cache: Arc<HashCache>,
    content: Arc<dyn ContentHasher>,
    chunked: ChunkedConfig,
    policy: ErrorPolicy,
}

impl DuplicateDetector {
    pub fn new(cache: Arc<HashCache>) -> Self {
        Self {
            cache,
            content: Arc::new(PerceptualHasher::default()),
            chunked: ChunkedConfig::default(),
            policy: ErrorPolicy::new(),
        }
    }

    /// Swap the perceptual hasher used by the `content` strategy
    pub fn with_content_hasher(mut self, content: Arc<dyn ContentHasher>) -> Self {
        self.content = content;
        self
    }

    pub fn with_chunked_config(mut self, chunked: ChunkedConfig) -> Self {
        self.chunked = chunked;
        self
    }

    /// Retry and stop rules applied while computing identifiers
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(&self) -> &Arc<HashCache> {
        &self.cache
    }

    /// Whether a job runs on the chunked worker pool
    pub fn should_offload(&self, file_count: usize, settings: &DuplicateSettings) -> bool {
        file_count > self.chunked.offload_threshold || settings.compare_by == super::CompareBy::Content
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

        if settings.enabled && self.should_offload(files.len(), settings) {
            debug!(files = files.len(), strategy = %settings.compare_by, "offloading to chunked detector");
            return ChunkedDuplicateDetector::new(self.clone(), self.chunked.clone())
                .detect_with_events(files, settings, events, cancel);
        }

        events.send(Event::Duplicate(DuplicateEvent::Started {
            total_files: files.len(),
            strategy: settings.compare_by.to_string(),
        }));

        let result = if settings.enabled {
            info!(files = files.len(), strategy = %settings.compare_by, "detecting duplicates");
            self.detect_chunk(files, settings, cancel)?
        } else {
            DuplicateDetectionResult::all_unique(files, settings)
        };

        report(&result, events, &self.cache);
        Ok(result)
    }

    /// Detect within one list of files, no delegation and no events
    pub(crate) fn detect_chunk(
        &self,
        files: &[SourceFile],
        settings: &DuplicateSettings,
        cancel: &CancellationToken,
    ) -> Result<DuplicateDetectionResult, DetectError> {
        let start = Instant::now();

        let mut identifiers: Vec<Option<Identifier>> = Vec::with_capacity(files.len());
        let mut errors = Vec::new();
        let mut memory_error_seen = false;
        let mut stop_recommended = false;
        let mut stop_reason = None;
        for (index, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DetectError::Cancelled);
            }
            if stop_reason.is_some() {
                identifiers.push(None);
                continue;
            }
            match self.identifier_for(file, settings) {
                Ok(identifier) => identifiers.push(Some(identifier)),
                Err(DetectError::Cancelled) => return Err(DetectError::Cancelled),
                Err(e) => {
                    debug!(file = %file.name, error = %e, "identifier failed, treating file as unique");
                    memory_error_seen |= e.class() == ErrorClass::Memory;
                    errors.push(FileError::new(file, &e));
                    identifiers.push(None);
                }
            }

            if let BatchDecision::Stop(reason) =
                self.policy.batch_decision(index + 1, errors.len(), memory_error_seen)
            {
                if !stop_recommended {
                    warn!(reason = %reason, completed = index + 1, "error policy recommends stopping the scan");
                }
                stop_recommended = true;
                if reason == StopReason::MemoryPressure {
                    stop_reason = Some(reason.to_string());
                }
            }
        }

        let mut processed = vec![false; files.len()];
        let mut groups = Vec::new();
        let mut unique = Vec::new();

        for seed in 0..files.len() {
            if processed[seed] {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(DetectError::Cancelled);
            }
            processed[seed] = true;

            let Some(seed_identifier) = &identifiers[seed] else {
                unique.push(files[seed].clone());
                continue;
            };

            let mut members = vec![seed];
            for candidate in (seed + 1)..files.len() {
                if processed[candidate] {
                    continue;
                }
                let Some(candidate_identifier) = &identifiers[candidate] else {
                    continue;
                };
                let linked = members.iter().any(|&member| {
                    fast_duplicate_check(&files[member], &files[candidate])
                        && identifiers[member].as_ref().is_some_and(|id| {
                            identifiers_match(id, candidate_identifier, settings.threshold)
                        })
                });
                if linked {
                    processed[candidate] = true;
                    members.push(candidate);
                }
            }

            let group_files: Vec<SourceFile> = members.iter().map(|&m| files[m].clone()).collect();
            match DuplicateGroup::new(group_files, seed_identifier.clone(), settings.keep_policy) {
                Some(group) => groups.push(group),
                None => unique.push(files[seed].clone()),
            }
        }

        let mut result = DuplicateDetectionResult::assemble(
            groups,
            unique,
            errors,
            settings,
            start.elapsed().as_millis() as u64,
            1,
        );
        result.stop_reason = stop_reason;
        result.stop_recommended = stop_recommended;
        Ok(result)
    }

    fn identifier_for(
        &self,
        file: &SourceFile,
        settings: &DuplicateSettings,
    ) -> Result<Identifier, DetectError> {
        let strategy = settings.compare_by;
        self.cache.get_or_compute(file, strategy, || {
            self.policy.retry("identifier", || {
                compute_identifier(file, strategy, self.content.as_ref())
            })
        })
    }
}
