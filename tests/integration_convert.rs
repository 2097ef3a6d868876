//! Integration tests for conversion through the pipeline.
//!
//! These tests verify end-to-end behavior including:
//! - On-disk sources read lazily
//! - Format fallback
//! - Batch cancellation and failure handling

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use image_prep::core::batch::BatchConfig;
use image_prep::core::capability::{CapabilityProbe, FormatProbe, OutputFormat};
use image_prep::core::convert::{ConversionOptions, ResizeOptions};
use image_prep::core::pipeline::Pipeline;
use image_prep::core::source::{SourceFile, SourceFormat};
use image_prep::error::{ConversionError, ErrorClass};
use image_prep::events::{BatchProgress, ConversionEvent, Event, EventChannel};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn pipeline() -> Pipeline {
    Pipeline::builder()
        .batch_config(BatchConfig {
            chunk_pause: Duration::ZERO,
            ..BatchConfig::default()
        })
        .build()
}

/// Supports only JPEG and PNG
struct NoModernCodecs;

impl FormatProbe for NoModernCodecs {
    fn probe(&self, format: OutputFormat) -> Result<bool, ConversionError> {
        Ok(matches!(format, OutputFormat::Jpeg | OutputFormat::Png))
    }
}

#[test]
fn converts_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, encoded(64, 48, ImageFormat::Png)).unwrap();

    let source = SourceFile::from_path(&path).unwrap();
    let result = pipeline().convert(&source, &ConversionOptions::new(OutputFormat::Jpeg).quality(80));

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.original_format, SourceFormat::Png);
    assert_eq!(result.output_format, OutputFormat::Jpeg);
    assert_eq!(result.dimensions, Some((64, 48)));
    assert!(result.output_binary().is_some());
    assert_eq!(result.output_size, result.output_binary().unwrap().len() as u64);
}

#[test]
fn resize_respects_tighter_bound() {
    let source = SourceFile::from_bytes("wide.png", encoded(200, 100, ImageFormat::Png));
    let options = ConversionOptions::new(OutputFormat::Png).resize(ResizeOptions::fit(50, 50));

    let result = pipeline().convert(&source, &options);

    assert_eq!(result.dimensions, Some((50, 25)));
}

#[test]
fn unsupported_format_falls_back_and_reports_substitution() {
    let pipeline = Pipeline::builder()
        .probe(Arc::new(CapabilityProbe::with_probe(Box::new(NoModernCodecs))))
        .build();
    let source = SourceFile::from_bytes("a.png", encoded(16, 16, ImageFormat::Png));

    let result = pipeline.convert(&source, &ConversionOptions::new(OutputFormat::Avif));

    assert!(result.success);
    assert_eq!(result.output_format, OutputFormat::Jpeg);
    assert_eq!(result.fallback_format_used, Some(OutputFormat::Jpeg));
}

#[test]
fn success_and_output_binary_agree() {
    let files = vec![
        SourceFile::from_bytes("ok.png", encoded(8, 8, ImageFormat::Png)),
        SourceFile::from_bytes("broken.jpg", b"\xFF\xD8not really a jpeg".to_vec()),
        SourceFile::from_bytes("empty.png", Vec::new()),
    ];

    let outcome = pipeline().convert_batch(&files, &ConversionOptions::new(OutputFormat::Png), None);

    assert_eq!(outcome.results.len(), 3);
    for result in &outcome.results {
        assert_eq!(result.success, result.output_binary().is_some());
        if !result.success {
            assert!(result.error.is_some());
        }
    }
    let broken = &outcome.results[1];
    assert_eq!(broken.error_class, Some(ErrorClass::Corruption));
    assert!(broken.recovery_suggestion.is_some());

    let empty = &outcome.results[2];
    assert_eq!(empty.compression_ratio, 0.0);
    assert_eq!(empty.size_savings_percent, 0.0);
}

#[test]
fn abort_stops_batch_after_current_file() {
    let pipeline = Arc::new(pipeline());
    let files: Vec<_> = (0..10)
        .map(|i| SourceFile::from_bytes(format!("{}.png", i), encoded(8, 8, ImageFormat::Png)).with_id(i.to_string()))
        .collect();

    let abort_handle = Arc::clone(&pipeline);
    let progress = move |p: &BatchProgress| {
        if p.completed_files == 3 && p.current_file_progress_pct == 100.0 {
            abort_handle.abort();
        }
    };

    let outcome = pipeline.convert_batch(&files, &ConversionOptions::new(OutputFormat::Png), Some(&progress));

    let ids: Vec<_> = outcome.results.iter().map(|r| r.file_id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert!(outcome.summary.cancelled);

    // the next batch gets a fresh token
    let next = pipeline.convert_batch(&files[..1], &ConversionOptions::new(OutputFormat::Png), None);
    assert_eq!(next.results.len(), 1);
}

#[test]
fn seven_of_ten_failures_recommend_stopping() {
    let mut files: Vec<_> = (0..7)
        .map(|i| SourceFile::from_bytes(format!("bad{}.jpg", i), b"garbage".to_vec()))
        .collect();
    files.extend((0..3).map(|i| SourceFile::from_bytes(format!("good{}.png", i), encoded(8, 8, ImageFormat::Png))));

    let outcome = pipeline().convert_batch(&files, &ConversionOptions::new(OutputFormat::Png), None);

    assert_eq!(outcome.results.len(), 10);
    assert_eq!(outcome.summary.failed, 7);
    assert!(outcome.summary.stop_recommended);
}

#[test]
fn batch_events_bracket_the_run() {
    let (sender, receiver) = EventChannel::new();
    let files = vec![
        SourceFile::from_bytes("a.png", encoded(8, 8, ImageFormat::Png)),
        SourceFile::from_bytes("b.png", encoded(8, 8, ImageFormat::Png)),
    ];

    pipeline().convert_batch_with_events(&files, &ConversionOptions::new(OutputFormat::Jpeg), &sender);
    drop(sender);

    let events: Vec<_> = receiver.iter().collect();
    assert!(matches!(
        events.first(),
        Some(Event::Conversion(ConversionEvent::Started { total_files: 2, .. }))
    ));
    let completed_files = events
        .iter()
        .filter(|e| matches!(e, Event::Conversion(ConversionEvent::FileCompleted { success: true, .. })))
        .count();
    assert_eq!(completed_files, 2);
    match events.last() {
        Some(Event::Conversion(ConversionEvent::Completed(summary))) => {
            assert_eq!(summary.succeeded, 2);
            assert!(summary.total_output_bytes > 0);
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[test]
fn results_serialize_without_binary() {
    let source = SourceFile::from_bytes("a.png", encoded(8, 8, ImageFormat::Png));
    let result = pipeline().convert(&source, &ConversionOptions::new(OutputFormat::Png));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert!(json.get("output_binary").is_none());
}
