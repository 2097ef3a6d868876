//! Pipeline entry point and builder.

use crate::core::batch::{BatchConfig, BatchConverter, BatchOutcome, CancellationToken};
use crate::core::capability::{CapabilityProbe, FormatSupportMatrix};
use crate::core::convert::{
    Codec, ConversionConfig, ConversionOptions, ConversionResult, ConversionWorker,
};
use crate::core::duplicates::{
    CacheStats, ChunkedConfig, ContentHasher, DuplicateDetectionResult, DuplicateDetector,
    DuplicateSettings, HashCache,
};
use crate::core::recovery::ErrorPolicy;
use crate::core::source::SourceFile;
use crate::error::Result;
use crate::events::{null_sender, BatchProgress, EventSender, ProgressSink};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    probe: Option<Arc<CapabilityProbe>>,
    cache: Option<Arc<HashCache>>,
    content_hasher: Option<Arc<dyn ContentHasher>>,
    codec: Option<Arc<dyn Codec>>,
    policy: ErrorPolicy,
    conversion: ConversionConfig,
    batch: BatchConfig,
    chunked: ChunkedConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            probe: None,
            cache: None,
            content_hasher: None,
            codec: None,
            policy: ErrorPolicy::new(),
            conversion: ConversionConfig::default(),
            batch: BatchConfig::default(),
            chunked: ChunkedConfig::default(),
        }
    }

    /// Share a capability probe (and its cached matrix)
    pub fn probe(mut self, probe: Arc<CapabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share an identifier cache
    pub fn cache(mut self, cache: Arc<HashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the perceptual hasher behind the `content` strategy
    pub fn content_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.content_hasher = Some(hasher);
        self
    }

    /// Replace the decoder/encoder used by conversion
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Policy shared by conversion and duplicate detection
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn conversion_config(mut self, config: ConversionConfig) -> Self {
        self.conversion = config;
        self
    }

    pub fn batch_config(mut self, config: BatchConfig) -> Self {
        self.batch = config;
        self
    }

    pub fn chunked_config(mut self, config: ChunkedConfig) -> Self {
        self.chunked = config;
        self
    }

    pub fn build(self) -> Pipeline {
        let probe = self.probe.unwrap_or_default();
        let cache = self.cache.unwrap_or_default();

        let mut worker = ConversionWorker::new(Arc::clone(&probe), self.policy.clone(), self.conversion);
        if let Some(codec) = self.codec {
            worker = worker.with_codec(codec);
        }
        let converter = BatchConverter::new(worker.clone(), self.policy.clone(), self.batch);

        let mut detector = DuplicateDetector::new(Arc::clone(&cache))
            .with_chunked_config(self.chunked)
            .with_error_policy(self.policy);
        if let Some(hasher) = self.content_hasher {
            detector = detector.with_content_hasher(hasher);
        }

        Pipeline {
            probe,
            cache,
            worker,
            converter,
            detector,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the shared state (format matrix, identifier cache) and exposes the
/// conversion and duplicate APIs.
pub struct Pipeline {
    probe: Arc<CapabilityProbe>,
    cache: Arc<HashCache>,
    worker: ConversionWorker,
    converter: BatchConverter,
    detector: DuplicateDetector,
    cancel: Mutex<CancellationToken>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Probe every output format. Cached formats are not probed again.
    pub fn detect_format_support(&self) -> FormatSupportMatrix {
        self.probe.detect_all()
    }

    pub fn convert(&self, file: &SourceFile, options: &ConversionOptions) -> ConversionResult {
        self.worker.convert(file, options)
    }

    /// Convert a batch, optionally reporting progress
    pub fn convert_batch(
        &self,
        files: &[SourceFile],
        options: &ConversionOptions,
        on_progress: Option<&dyn ProgressSink>,
    ) -> BatchOutcome {
        let cancel = self.cancellation_token();
        let ignore = |_: &BatchProgress| {};
        let progress = on_progress.unwrap_or(&ignore);
        self.converter.convert_batch(files, options, progress, &cancel)
    }

    /// Convert a batch, reporting through the event channel
    pub fn convert_batch_with_events(
        &self,
        files: &[SourceFile],
        options: &ConversionOptions,
        events: &EventSender,
    ) -> BatchOutcome {
        let cancel = self.cancellation_token();
        self.converter.convert_batch_with_events(files, options, events, &cancel)
    }

    /// Cancel the in-flight batch or scan.
    ///
    /// Work already running finishes; later calls get a fresh token.
    pub fn abort(&self) {
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        info!("abort requested");
    }

    /// Token the next (or current) run will observe
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn detect_duplicates(
        &self,
        files: &[SourceFile],
        settings: &DuplicateSettings,
    ) -> Result<DuplicateDetectionResult> {
        self.detect_duplicates_with_events(files, settings, &null_sender())
    }

    pub fn detect_duplicates_with_events(
        &self,
        files: &[SourceFile],
        settings: &DuplicateSettings,
        events: &EventSender,
    ) -> Result<DuplicateDetectionResult> {
        settings.validate()?;
        let cancel = self.cancellation_token();
        Ok(self.detector.detect_with_events(files, settings, events, &cancel)?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        &self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::OutputFormat;
    use crate::core::convert::codec::tests::png_bytes;
    use crate::core::duplicates::CompareBy;
    use crate::error::{PipelineError, SettingsError};
    use std::cell::Cell;

    fn pipeline() -> Pipeline {
        Pipeline::builder()
            .batch_config(BatchConfig {
                chunk_pause: std::time::Duration::ZERO,
                ..BatchConfig::default()
            })
            .build()
    }

    #[test]
    fn format_support_is_idempotent() {
        let pipeline = pipeline();
        let first = pipeline.detect_format_support();
        let second = pipeline.detect_format_support();

        assert_eq!(first, second);
        assert!(first.supports(OutputFormat::Png));
    }

    #[test]
    fn convert_batch_reports_progress() {
        let pipeline = pipeline();
        let files = vec![SourceFile::from_bytes("a.png", png_bytes(8, 8))];
        let calls = Cell::new(0);
        let sink = |_: &BatchProgress| calls.set(calls.get() + 1);

        let outcome = pipeline.convert_batch(&files, &ConversionOptions::new(OutputFormat::Jpeg), Some(&sink));

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].success);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn abort_cancels_current_token_and_installs_fresh_one() {
        let pipeline = pipeline();
        let token = pipeline.cancellation_token();

        pipeline.abort();

        assert!(token.is_cancelled());
        assert!(!pipeline.cancellation_token().is_cancelled());
    }

    #[test]
    fn invalid_settings_surface_as_settings_error() {
        let result = pipeline().detect_duplicates(&[], &DuplicateSettings::new(CompareBy::Name).threshold(-1.0));

        assert!(matches!(
            result,
            Err(PipelineError::Settings(SettingsError::InvalidThreshold { .. }))
        ));
    }

    #[test]
    fn shared_cache_is_visible_through_stats() {
        let cache = Arc::new(HashCache::new());
        let pipeline = Pipeline::builder().cache(Arc::clone(&cache)).build();
        let files = vec![
            SourceFile::from_bytes("a", vec![1u8; 16]),
            SourceFile::from_bytes("b", vec![1u8; 16]),
        ];

        pipeline.detect_duplicates(&files, &DuplicateSettings::new(CompareBy::Hash)).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(pipeline.cache_stats().misses, 2);
        pipeline.clear_cache();
        assert!(cache.is_empty());
    }
}
