//! # Convert Module
//!
//! Converts one source file: decode, optional resize, re-encode.
//!
//! ## State machine
//! Every attempt moves `Pending -> Decoding -> Encoding -> Ready`, or ends in
//! `Error` from `Decoding` or `Encoding`. `Error` is terminal and the result
//! carries the classified cause.
//!
//! ## Output invariants
//! - `output_binary` is present if and only if `success` is true
//! - an empty source yields a compression ratio of 0, never a division by zero
//! - an output larger than its source is a success with negative savings

pub mod codec;
pub mod resize;
mod worker;

pub use codec::{Codec, ImageCodec};
pub use worker::{ConversionConfig, ConversionWorker};

use crate::core::capability::OutputFormat;
use crate::core::source::SourceFormat;
use crate::error::{ErrorClass, SettingsError};
use serde::{Deserialize, Serialize};

/// Requested output size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeOptions {
    /// Target width (None or 0 = unconstrained)
    pub width: Option<u32>,
    /// Target height (None or 0 = unconstrained)
    pub height: Option<u32>,
    /// Preserve the source aspect ratio
    pub keep_aspect: bool,
}

impl ResizeOptions {
    /// Bound both dimensions, keeping aspect
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            keep_aspect: true,
        }
    }
}

/// How to convert a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Target format
    pub output_format: OutputFormat,
    /// Encoder quality 1-100; per-format default when None
    pub quality: Option<u8>,
    /// Optional resize
    pub resize: Option<ResizeOptions>,
    /// Upper bound on output size in bytes
    pub max_file_size: Option<u64>,
    /// Keep EXIF/ICC metadata where the codec allows
    pub preserve_metadata: bool,
}

impl ConversionOptions {
    /// Options for a format with default quality and no resize
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            quality: None,
            resize: None,
            max_file_size: None,
            preserve_metadata: false,
        }
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn resize(mut self, resize: ResizeOptions) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(quality) = self.quality {
            if !(1..=100).contains(&quality) {
                return Err(SettingsError::InvalidQuality { value: quality });
            }
        }
        if let Some(resize) = &self.resize {
            let width = resize.width.unwrap_or(0);
            let height = resize.height.unwrap_or(0);
            if width == 0 && height == 0 {
                return Err(SettingsError::InvalidResize);
            }
        }
        Ok(())
    }

    /// Quality to use when encoding as `format`
    pub fn quality_for(&self, format: OutputFormat) -> u8 {
        self.quality.unwrap_or_else(|| format.default_quality())
    }
}

/// Lifecycle of a single conversion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionState {
    Pending,
    Decoding,
    Encoding,
    Ready,
    Error,
}

impl ConversionState {
    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: ConversionState) -> bool {
        matches!(
            (self, next),
            (ConversionState::Pending, ConversionState::Decoding)
                | (ConversionState::Decoding, ConversionState::Encoding)
                | (ConversionState::Decoding, ConversionState::Error)
                | (ConversionState::Encoding, ConversionState::Ready)
                | (ConversionState::Encoding, ConversionState::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionState::Ready | ConversionState::Error)
    }
}

/// Outcome of converting one file. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Source file id
    pub file_id: String,
    /// Source file name
    pub file_name: String,
    /// Whether an output was produced
    pub success: bool,
    /// Detected source format
    pub original_format: SourceFormat,
    /// Format actually encoded (or attempted)
    pub output_format: OutputFormat,
    #[serde(skip)]
    output_binary: Option<Vec<u8>>,
    /// Source size in bytes
    pub original_size: u64,
    /// Output size in bytes (0 on failure)
    pub output_size: u64,
    /// Output size divided by source size (0 when the source is empty)
    pub compression_ratio: f64,
    /// Bytes saved (negative when the output grew)
    pub size_savings: i64,
    /// Bytes saved as a percentage of the source
    pub size_savings_percent: f64,
    /// Output dimensions
    pub dimensions: Option<(u32, u32)>,
    /// Wall time spent on this file
    pub processing_time_ms: u64,
    /// Non-fatal notes
    pub warnings: Vec<String>,
    /// User-facing error message
    pub error: Option<String>,
    /// Classified failure cause
    pub error_class: Option<ErrorClass>,
    /// What the user can try next
    pub recovery_suggestion: Option<String>,
    /// Set when a substitute format was encoded
    pub fallback_format_used: Option<OutputFormat>,
    /// Terminal state of the last attempt
    pub state: ConversionState,
}

/// Everything a successful attempt produced
#[derive(Debug)]
pub(crate) struct EncodedOutput {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Everything describing a failure
#[derive(Debug)]
pub(crate) struct FailureInfo {
    pub message: String,
    pub class: ErrorClass,
    pub suggestion: Option<String>,
}

/// Fields shared by success and failure results
#[derive(Debug)]
pub(crate) struct ResultContext {
    pub file_id: String,
    pub file_name: String,
    pub original_format: SourceFormat,
    pub requested_format: OutputFormat,
    pub original_size: u64,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

impl ConversionResult {
    pub(crate) fn succeeded(ctx: ResultContext, output: EncodedOutput) -> Self {
        let output_size = output.bytes.len() as u64;
        let (compression_ratio, size_savings, size_savings_percent) =
            size_metrics(ctx.original_size, output_size);
        let fallback_format_used =
            (output.format != ctx.requested_format).then_some(output.format);

        Self {
            file_id: ctx.file_id,
            file_name: ctx.file_name,
            success: true,
            original_format: ctx.original_format,
            output_format: output.format,
            output_binary: Some(output.bytes),
            original_size: ctx.original_size,
            output_size,
            compression_ratio,
            size_savings,
            size_savings_percent,
            dimensions: Some((output.width, output.height)),
            processing_time_ms: ctx.processing_time_ms,
            warnings: ctx.warnings,
            error: None,
            error_class: None,
            recovery_suggestion: None,
            fallback_format_used,
            state: ConversionState::Ready,
        }
    }

    pub(crate) fn failed(ctx: ResultContext, failure: FailureInfo) -> Self {
        Self {
            file_id: ctx.file_id,
            file_name: ctx.file_name,
            success: false,
            original_format: ctx.original_format,
            output_format: ctx.requested_format,
            output_binary: None,
            original_size: ctx.original_size,
            output_size: 0,
            compression_ratio: 0.0,
            size_savings: 0,
            size_savings_percent: 0.0,
            dimensions: None,
            processing_time_ms: ctx.processing_time_ms,
            warnings: ctx.warnings,
            error: Some(failure.message),
            error_class: Some(failure.class),
            recovery_suggestion: failure.suggestion,
            fallback_format_used: None,
            state: ConversionState::Error,
        }
    }

    /// Encoded output, present only on success
    pub fn output_binary(&self) -> Option<&[u8]> {
        self.output_binary.as_deref()
    }

    /// Take ownership of the encoded output
    pub fn into_output_binary(self) -> Option<Vec<u8>> {
        self.output_binary
    }
}

/// `(ratio, savings, savings_percent)` with an empty source mapping to zeros
pub fn size_metrics(original_size: u64, output_size: u64) -> (f64, i64, f64) {
    if original_size == 0 {
        return (0.0, 0, 0.0);
    }
    let ratio = output_size as f64 / original_size as f64;
    let savings = original_size as i64 - output_size as i64;
    let percent = savings as f64 / original_size as f64 * 100.0;
    (ratio, savings, percent)
}
