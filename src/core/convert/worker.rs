//! Single-file conversion under the recovery policy.

use super::{
    codec, resize, Codec, ConversionOptions, ConversionResult, ConversionState, EncodedOutput,
    FailureInfo, ImageCodec, ResultContext,
};
use crate::core::capability::{CapabilityProbe, OutputFormat};
use crate::core::recovery::{ErrorPolicy, RecoveryAction};
use crate::core::source::{SourceFile, SourceFormat};
use crate::error::{Classify, ConversionError, ErrorClass};
use image::{DynamicImage, Limits};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const MIB: u64 = 1024 * 1024;

/// Resource limits for a single conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Upper bound on a decode
    pub decode_timeout: Duration,
    /// Largest decoded buffer attempted on the standard path
    pub memory_budget_bytes: u64,
    /// Long-edge cap applied by the low-memory fallback
    pub fallback_max_dimension: u32,
    /// Allocation ceiling handed to the decoder on the low-memory fallback
    pub fallback_alloc_limit: u64,
    /// Lowest quality tried when shrinking to fit `max_file_size`
    pub min_quality: u8,
    /// Quality decrement per re-encode
    pub quality_step: u8,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            decode_timeout: Duration::from_secs(10),
            memory_budget_bytes: 512 * MIB,
            fallback_max_dimension: 2048,
            fallback_alloc_limit: 1024 * MIB,
            min_quality: 10,
            quality_step: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeMode {
    Standard,
    LowMemory,
}

/// Tracks one attempt through the conversion state machine
struct AttemptState<'a> {
    name: &'a str,
    format: OutputFormat,
    state: ConversionState,
}

impl<'a> AttemptState<'a> {
    fn new(name: &'a str, format: OutputFormat) -> Self {
        Self {
            name,
            format,
            state: ConversionState::Pending,
        }
    }

    fn advance(&mut self, next: ConversionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(file = self.name, format = %self.format, from = ?self.state, to = ?next, "conversion state");
        self.state = next;
    }
}

/// Converts one file at a time
#[derive(Clone)]
pub struct ConversionWorker {
    probe: Arc<CapabilityProbe>,
    codec: Arc<dyn Codec>,
    policy: ErrorPolicy,
    config: ConversionConfig,
}

impl ConversionWorker {
    pub fn new(probe: Arc<CapabilityProbe>, policy: ErrorPolicy, config: ConversionConfig) -> Self {
        Self {
            probe,
            codec: Arc::new(ImageCodec),
            policy,
            config,
        }
    }

    /// Replace the decoder/encoder pair
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert a file. Failures are reported in the result, never returned.
    pub fn convert(&self, file: &SourceFile, options: &ConversionOptions) -> ConversionResult {
        let start = Instant::now();
        let requested = options.output_format;
        let mut warnings = Vec::new();

        let context = |original_format, original_size, warnings, start: Instant| ResultContext {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            original_format,
            requested_format: requested,
            original_size,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
        };

        if let Err(e) = options.validate() {
            let ctx = context(
                SourceFormat::from_mime(&file.mime_type),
                file.byte_size,
                warnings,
                start,
            );
            return ConversionResult::failed(
                ctx,
                FailureInfo {
                    message: format!("The conversion settings are invalid ({})", e),
                    class: ErrorClass::Generic,
                    suggestion: Some("Check the quality and resize settings.".to_string()),
                },
            );
        }

        let bytes = match self.policy.retry("read source", || file.read()) {
            Ok(bytes) => bytes,
            Err(e) => {
                let ctx = context(
                    SourceFormat::from_mime(&file.mime_type),
                    file.byte_size,
                    warnings,
                    start,
                );
                return self.failure(ctx, ConversionError::from(e));
            }
        };

        let original_format = SourceFormat::detect(&bytes, &file.name);
        let original_size = bytes.len() as u64;

        let resolution = self.probe.resolve(requested);
        if resolution.substituted() {
            info!(file = %file.name, requested = %requested, used = %resolution.used, "output format substituted");
            warnings.push(format!(
                "{} is not supported here; encoded as {} instead",
                requested, resolution.used
            ));
        }
        if options.quality.is_some() && !resolution.used.honors_quality() {
            warnings.push(format!(
                "{} output is lossless; quality setting ignored",
                resolution.used
            ));
        }
        if options.preserve_metadata {
            warnings.push("metadata is not carried over by the encoder".to_string());
        }

        let outcome =
            self.convert_with_recovery(&file.name, &bytes, options, resolution.used, &mut warnings);
        drop(bytes);

        let ctx = context(original_format, original_size, warnings, start);
        match outcome {
            Ok(output) => {
                debug!(file = %file.name, format = %output.format, bytes = output.bytes.len(), "converted");
                ConversionResult::succeeded(ctx, output)
            }
            Err(e) => self.failure(ctx, e),
        }
    }

    fn convert_with_recovery(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        options: &ConversionOptions,
        format: OutputFormat,
        warnings: &mut Vec<String>,
    ) -> Result<EncodedOutput, ConversionError> {
        let primary =
            match self.attempt(name, bytes, options, format, DecodeMode::Standard, warnings) {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

        match self.policy.action_for(primary.class()) {
            RecoveryAction::LowMemoryFallback => {
                warn!(file = name, error = %primary, "memory error, trying low-memory fallback");
                match self.attempt(name, bytes, options, format, DecodeMode::LowMemory, warnings) {
                    Ok(output) => {
                        warnings.push(format!(
                            "processed at reduced size ({}x{}) due to memory limits",
                            output.width, output.height
                        ));
                        Ok(output)
                    }
                    Err(fallback) => Err(ConversionError::Combined {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    }),
                }
            }
            RecoveryAction::SubstituteFormat => {
                let substitute = format.fallback();
                if substitute == format {
                    return Err(primary);
                }
                info!(file = name, from = %format, to = %substitute, "encoder unavailable, substituting format");
                warnings.push(format!(
                    "{} encoding failed; encoded as {} instead",
                    format, substitute
                ));
                self.attempt(name, bytes, options, substitute, DecodeMode::Standard, warnings)
            }
            RecoveryAction::Retry { .. } | RecoveryAction::Fail => Err(primary),
        }
    }

    fn attempt(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        options: &ConversionOptions,
        format: OutputFormat,
        mode: DecodeMode,
        warnings: &mut Vec<String>,
    ) -> Result<EncodedOutput, ConversionError> {
        let mut state = AttemptState::new(name, format);

        state.advance(ConversionState::Decoding);
        let image = match self.decode(name, bytes, mode) {
            Ok(image) => image,
            Err(e) => {
                state.advance(ConversionState::Error);
                return Err(e);
            }
        };

        state.advance(ConversionState::Encoding);
        match self.encode(name, image, options, format, mode, warnings) {
            Ok(output) => {
                state.advance(ConversionState::Ready);
                Ok(output)
            }
            Err(e) => {
                state.advance(ConversionState::Error);
                Err(e)
            }
        }
    }

    fn decode(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        mode: DecodeMode,
    ) -> Result<DynamicImage, ConversionError> {
        let timeout = self.config.decode_timeout;

        match mode {
            DecodeMode::Standard => {
                let (width, height) = self
                    .codec
                    .read_dimensions(bytes)
                    .map_err(|e| codec::decode_error(name, e))?;
                self.check_budget(name, "decoded", width, height)?;
                codec::decode_with_timeout(Arc::clone(&self.codec), name, Arc::clone(bytes), None, timeout)
            }
            DecodeMode::LowMemory => {
                let mut limits = Limits::default();
                limits.max_alloc = Some(self.config.fallback_alloc_limit);

                let image = codec::decode_with_timeout(
                    Arc::clone(&self.codec),
                    name,
                    Arc::clone(bytes),
                    Some(limits),
                    timeout,
                )?;
                let (width, height) = resize::fit_within(
                    image.width(),
                    image.height(),
                    self.config.fallback_max_dimension,
                );
                resize::resize_exact(image, width, height).map_err(|detail| ConversionError::Memory {
                    name: name.to_string(),
                    detail,
                })
            }
        }
    }

    fn encode(
        &self,
        name: &str,
        image: DynamicImage,
        options: &ConversionOptions,
        format: OutputFormat,
        mode: DecodeMode,
        warnings: &mut Vec<String>,
    ) -> Result<EncodedOutput, ConversionError> {
        let image = match &options.resize {
            Some(request) => {
                let (mut width, mut height) =
                    resize::target_dimensions(image.width(), image.height(), request);
                match mode {
                    DecodeMode::Standard => self.check_budget(name, "resized", width, height)?,
                    DecodeMode::LowMemory => {
                        (width, height) =
                            resize::fit_within(width, height, self.config.fallback_max_dimension);
                    }
                }
                resize::resize_exact(image, width, height).map_err(|reason| {
                    ConversionError::Encode {
                        name: name.to_string(),
                        format: format.to_string(),
                        reason,
                    }
                })?
            }
            None => image,
        };

        if format == OutputFormat::Jpeg && image.color().has_alpha() {
            warnings.push("alpha channel dropped for jpeg output".to_string());
        }

        let (width, height) = (image.width(), image.height());
        let initial_quality = options.quality_for(format);
        let mut quality = initial_quality;
        let mut bytes = self
            .codec
            .encode(&image, format, quality)
            .map_err(|e| codec::encode_error(name, format, e))?;

        if let Some(max) = options.max_file_size {
            while bytes.len() as u64 > max
                && format.honors_quality()
                && quality > self.config.min_quality
            {
                quality = quality
                    .saturating_sub(self.config.quality_step)
                    .max(self.config.min_quality);
                debug!(file = name, quality, size = bytes.len(), max, "re-encoding to fit size limit");
                bytes = self
                    .codec
                    .encode(&image, format, quality)
                    .map_err(|e| codec::encode_error(name, format, e))?;
            }

            if bytes.len() as u64 > max {
                warnings.push(format!(
                    "output is {} bytes, above the {} byte limit",
                    bytes.len(),
                    max
                ));
            } else if quality != initial_quality {
                warnings.push(format!("quality lowered to {} to fit the size limit", quality));
            }
        }
        drop(image);

        Ok(EncodedOutput {
            bytes,
            format,
            width,
            height,
        })
    }

    /// Reject a `width x height` RGBA buffer larger than the memory budget
    fn check_budget(
        &self,
        name: &str,
        stage: &str,
        width: u32,
        height: u32,
    ) -> Result<(), ConversionError> {
        let needed = width as u64 * height as u64 * 4;
        if needed <= self.config.memory_budget_bytes {
            return Ok(());
        }
        Err(ConversionError::Memory {
            name: name.to_string(),
            detail: format!(
                "{}x{} needs {} MB {}, budget is {} MB",
                width,
                height,
                needed / MIB,
                stage,
                self.config.memory_budget_bytes / MIB
            ),
        })
    }

    fn failure(&self, ctx: ResultContext, error: ConversionError) -> ConversionResult {
        let message = self.policy.user_message(&error);
        warn!(file = %ctx.file_name, class = %error.class(), error = %error, "conversion failed");

        ConversionResult::failed(
            ctx,
            FailureInfo {
                message: format!("{} ({})", message.message, error),
                class: message.class,
                suggestion: message.suggestion,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::FormatProbe;
    use crate::core::convert::codec::tests::{jpeg_bytes, png_bytes};
    use crate::core::convert::ResizeOptions;
    use crate::core::recovery::RetryConfig;
    use crate::core::source::SourceLoader;
    use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
    use image::{ImageError, ImageFormat, ImageResult};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct OnlyProbe(Vec<OutputFormat>);

    impl FormatProbe for OnlyProbe {
        fn probe(&self, format: OutputFormat) -> Result<bool, ConversionError> {
            Ok(self.0.contains(&format))
        }
    }

    fn worker_with(supported: Vec<OutputFormat>, config: ConversionConfig) -> ConversionWorker {
        ConversionWorker::new(
            Arc::new(CapabilityProbe::with_probe(Box::new(OnlyProbe(supported)))),
            ErrorPolicy::new(),
            config,
        )
    }

    fn fast_retry() -> ErrorPolicy {
        ErrorPolicy::new().with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        })
    }

    /// Real codec whose WebP encoder is missing at runtime
    struct WebpEncoderMissing;

    impl Codec for WebpEncoderMissing {
        fn read_dimensions(&self, bytes: &[u8]) -> ImageResult<(u32, u32)> {
            ImageCodec.read_dimensions(bytes)
        }

        fn decode(&self, bytes: &[u8], limits: Option<Limits>) -> ImageResult<DynamicImage> {
            ImageCodec.decode(bytes, limits)
        }

        fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> ImageResult<Vec<u8>> {
            if format == OutputFormat::Webp {
                let hint = ImageFormatHint::Exact(ImageFormat::WebP);
                return Err(ImageError::Unsupported(UnsupportedError::from_format_and_kind(
                    hint.clone(),
                    UnsupportedErrorKind::Format(hint),
                )));
            }
            ImageCodec.encode(image, format, quality)
        }
    }

    /// Real codec with a decoder that hangs
    struct StalledDecoder {
        decodes: Arc<AtomicUsize>,
    }

    impl Codec for StalledDecoder {
        fn read_dimensions(&self, bytes: &[u8]) -> ImageResult<(u32, u32)> {
            ImageCodec.read_dimensions(bytes)
        }

        fn decode(&self, bytes: &[u8], limits: Option<Limits>) -> ImageResult<DynamicImage> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(500));
            ImageCodec.decode(bytes, limits)
        }

        fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> ImageResult<Vec<u8>> {
            ImageCodec.encode(image, format, quality)
        }
    }

    /// Loader that drops the connection a fixed number of times
    #[derive(Debug)]
    struct FlakyLoader {
        failures: usize,
        calls: AtomicUsize,
        bytes: Vec<u8>,
    }

    impl SourceLoader for FlakyLoader {
        fn load(&self) -> io::Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            Ok(self.bytes.clone())
        }
    }

    fn flaky(failures: usize) -> Arc<FlakyLoader> {
        Arc::new(FlakyLoader {
            failures,
            calls: AtomicUsize::new(0),
            bytes: png_bytes(16, 16),
        })
    }

    fn worker() -> ConversionWorker {
        worker_with(
            vec![OutputFormat::Jpeg, OutputFormat::Png],
            ConversionConfig::default(),
        )
    }

    #[test]
    fn png_to_jpeg_succeeds() {
        let file = SourceFile::from_bytes("gradient.png", png_bytes(64, 48));

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Jpeg));

        assert!(result.success);
        assert!(result.output_binary().is_some());
        assert_eq!(result.original_format, SourceFormat::Png);
        assert_eq!(result.output_format, OutputFormat::Jpeg);
        assert_eq!(result.dimensions, Some((64, 48)));
        assert_eq!(result.state, ConversionState::Ready);
        assert_eq!(result.output_size, result.output_binary().unwrap().len() as u64);
    }

    #[test]
    fn empty_source_fails_without_dividing_by_zero() {
        let file = SourceFile::from_bytes("empty.png", Vec::new());

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(!result.success);
        assert!(result.output_binary().is_none());
        assert_eq!(result.original_size, 0);
        assert_eq!(result.compression_ratio, 0.0);
        assert_eq!(result.size_savings_percent, 0.0);
        assert_eq!(result.error_class, Some(ErrorClass::Corruption));
        assert_eq!(result.state, ConversionState::Error);
    }

    #[test]
    fn garbage_is_corruption_with_suggestion() {
        let file = SourceFile::from_bytes("broken.jpg", b"definitely not a jpeg".to_vec());

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Jpeg));

        assert!(!result.success);
        assert_eq!(result.error_class, Some(ErrorClass::Corruption));
        assert!(result.recovery_suggestion.unwrap().contains("corrupted"));
        assert!(result.error.unwrap().contains("broken.jpg"));
    }

    #[test]
    fn resize_keeps_aspect() {
        let file = SourceFile::from_bytes("wide.png", png_bytes(200, 100));
        let options = ConversionOptions::new(OutputFormat::Png).resize(ResizeOptions::fit(50, 50));

        let result = worker().convert(&file, &options);

        assert!(result.success);
        assert_eq!(result.dimensions, Some((50, 25)));
    }

    #[test]
    fn unsupported_format_falls_back_along_chain() {
        let file = SourceFile::from_bytes("photo.png", png_bytes(32, 32));

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Avif));

        assert!(result.success);
        assert_eq!(result.output_format, OutputFormat::Jpeg);
        assert_eq!(result.fallback_format_used, Some(OutputFormat::Jpeg));
        assert!(result.warnings.iter().any(|w| w.contains("avif")));
    }

    #[test]
    fn memory_budget_triggers_low_memory_fallback() {
        let config = ConversionConfig {
            memory_budget_bytes: 1024,
            fallback_max_dimension: 32,
            ..ConversionConfig::default()
        };
        let file = SourceFile::from_bytes("large.png", png_bytes(128, 64));

        let result = worker_with(vec![OutputFormat::Png], config)
            .convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(result.success);
        assert_eq!(result.dimensions, Some((32, 16)));
        assert!(result.warnings.iter().any(|w| w.contains("reduced size")));
    }

    #[test]
    fn failed_fallback_reports_combined_memory_error() {
        let config = ConversionConfig {
            memory_budget_bytes: 1024,
            fallback_alloc_limit: 1024,
            ..ConversionConfig::default()
        };
        let file = SourceFile::from_bytes("huge.png", png_bytes(128, 128));

        let result = worker_with(vec![OutputFormat::Png], config)
            .convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(!result.success);
        assert_eq!(result.error_class, Some(ErrorClass::Memory));
        let message = result.error.unwrap();
        assert!(message.contains("budget"));
        assert!(message.contains("low-memory fallback also failed"));
        assert!(result.recovery_suggestion.unwrap().contains("fewer files"));
    }

    #[test]
    fn max_file_size_lowers_quality() {
        let file = SourceFile::from_bytes("detailed.jpg", jpeg_bytes(256, 256));
        let options = ConversionOptions::new(OutputFormat::Jpeg)
            .quality(95)
            .max_file_size(1);

        let result = worker().convert(&file, &options);

        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("above the 1 byte limit")));
    }

    #[test]
    fn savings_sign_matches_sizes() {
        let file = SourceFile::from_bytes("small.jpg", jpeg_bytes(64, 64));

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(result.success);
        assert_eq!(
            result.size_savings,
            result.original_size as i64 - result.output_size as i64
        );
    }

    #[test]
    fn invalid_options_fail_the_file() {
        let file = SourceFile::from_bytes("a.png", png_bytes(8, 8));
        let options = ConversionOptions::new(OutputFormat::Jpeg).quality(0);

        let result = worker().convert(&file, &options);

        assert!(!result.success);
        assert!(result.output_binary().is_none());
    }

    #[test]
    fn missing_file_is_reported_not_panicked() {
        let file = SourceFile {
            data: crate::core::source::BinaryHandle::Path("/definitely/missing.png".into()),
            ..SourceFile::from_bytes("missing.png", Vec::new())
        };

        let result = worker().convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(!result.success);
        assert_eq!(result.error_class, Some(ErrorClass::Generic));
    }

    #[test]
    fn oversized_resize_target_uses_low_memory_fallback() {
        let config = ConversionConfig {
            memory_budget_bytes: 1024,
            fallback_max_dimension: 64,
            ..ConversionConfig::default()
        };
        let file = SourceFile::from_bytes("tiny.png", png_bytes(8, 8));
        let options = ConversionOptions::new(OutputFormat::Png).resize(ResizeOptions {
            width: Some(3000),
            height: Some(3000),
            keep_aspect: false,
        });

        let result = worker_with(vec![OutputFormat::Png], config).convert(&file, &options);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.dimensions, Some((64, 64)));
        assert!(result.warnings.iter().any(|w| w.contains("reduced size")));
    }

    #[test]
    fn missing_encoder_substitutes_next_format() {
        let file = SourceFile::from_bytes("photo.png", png_bytes(16, 16));
        let worker = worker_with(
            vec![OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp],
            ConversionConfig::default(),
        )
        .with_codec(Arc::new(WebpEncoderMissing));

        let result = worker.convert(&file, &ConversionOptions::new(OutputFormat::Webp));

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output_format, OutputFormat::Jpeg);
        assert_eq!(result.fallback_format_used, Some(OutputFormat::Jpeg));
        assert!(result.warnings.iter().any(|w| w.contains("webp encoding failed")));
    }

    #[test]
    fn stalled_decode_fails_with_timeout_class() {
        let decodes = Arc::new(AtomicUsize::new(0));
        let config = ConversionConfig {
            decode_timeout: Duration::from_millis(20),
            ..ConversionConfig::default()
        };
        let worker = worker_with(vec![OutputFormat::Png], config).with_codec(Arc::new(StalledDecoder {
            decodes: Arc::clone(&decodes),
        }));
        let file = SourceFile::from_bytes("slow.png", png_bytes(8, 8));

        let result = worker.convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(!result.success);
        assert_eq!(result.error_class, Some(ErrorClass::Timeout));
        assert!(result.error.unwrap().contains("timed out"));
        // timeouts are terminal: no retry, no fallback
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_connections_are_retried() {
        let loader = flaky(2);
        let file = SourceFile::from_loader("remote.png", 0, loader.clone());
        let worker = ConversionWorker::new(Arc::new(CapabilityProbe::new()), fast_retry(), ConversionConfig::default());

        let result = worker.convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(result.success, "{:?}", result.error);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retries_stop_after_three_attempts() {
        let loader = flaky(5);
        let file = SourceFile::from_loader("remote.png", 0, loader.clone());
        let worker = ConversionWorker::new(Arc::new(CapabilityProbe::new()), fast_retry(), ConversionConfig::default());

        let result = worker.convert(&file, &ConversionOptions::new(OutputFormat::Png));

        assert!(!result.success);
        assert_eq!(result.error_class, Some(ErrorClass::Network));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }
}
