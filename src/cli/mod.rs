//! # CLI Module
//!
//! Command-line interface for the preprocessing pipeline.
//!
//! ## Usage
//! ```bash
//! # Convert a folder to WebP, bounded to 1920px wide
//! image-prep convert ~/Photos --format webp --width 1920 --out ./converted
//!
//! # Find byte-identical duplicates
//! image-prep dupes ~/Photos --compare-by hash
//!
//! # Visually similar images, as JSON
//! image-prep dupes ~/Photos --compare-by content --threshold 0.9 --output json
//!
//! # Which output formats can be encoded here
//! image-prep formats
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_prep::core::batch::BatchOutcome;
use image_prep::core::capability::OutputFormat;
use image_prep::core::convert::{ConversionOptions, ResizeOptions};
use image_prep::core::duplicates::{CompareBy, DuplicateDetectionResult, DuplicateSettings, KeepPolicy};
use image_prep::core::pipeline::Pipeline;
use image_prep::core::source::{SourceFile, SourceFormat};
use image_prep::error::{PipelineError, Result};
use image_prep::events::{ConversionEvent, DuplicateEvent, Event, EventChannel};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::warn;
use walkdir::WalkDir;

/// Image Prep - convert and deduplicate images in bulk
#[derive(Parser, Debug)]
#[command(name = "image-prep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert images to another format
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target format
        #[arg(short, long)]
        format: Format,

        /// Encoder quality (1-100, format default when omitted)
        #[arg(short, long)]
        quality: Option<u8>,

        /// Maximum output width
        #[arg(long)]
        width: Option<u32>,

        /// Maximum output height
        #[arg(long)]
        height: Option<u32>,

        /// Stretch to the exact width and height
        #[arg(long)]
        no_keep_aspect: bool,

        /// Lower quality until the output fits this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Find duplicate images
    Dupes {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Comparison strategy
        #[arg(short, long, default_value = "hash")]
        compare_by: Strategy,

        /// Similarity threshold for name and content (0-1)
        #[arg(short, long, default_value = "0.9")]
        threshold: f64,

        /// Which file of each group to keep
        #[arg(short, long, default_value = "first")]
        keep: Keep,

        /// Output style
        #[arg(short, long, default_value = "pretty")]
        output: OutputStyle,
    },

    /// Show which output formats can be encoded
    Formats,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
            Format::Webp => OutputFormat::Webp,
            Format::Avif => OutputFormat::Avif,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// SHA-256 of the file bytes
    Hash,
    /// Similar file names
    Name,
    /// Identical byte size
    Size,
    /// Visually similar (perceptual hash)
    Content,
}

impl From<Strategy> for CompareBy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Hash => CompareBy::Hash,
            Strategy::Name => CompareBy::Name,
            Strategy::Size => CompareBy::Size,
            Strategy::Content => CompareBy::Content,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keep {
    First,
    Largest,
    Smallest,
    Newest,
    Manual,
}

impl From<Keep> for KeepPolicy {
    fn from(keep: Keep) -> Self {
        match keep {
            Keep::First => KeepPolicy::First,
            Keep::Largest => KeepPolicy::Largest,
            Keep::Smallest => KeepPolicy::Smallest,
            Keep::Newest => KeepPolicy::Newest,
            Keep::Manual => KeepPolicy::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputStyle {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            paths,
            format,
            quality,
            width,
            height,
            no_keep_aspect,
            max_file_size,
            out,
        } => {
            let mut options = ConversionOptions::new(format.into());
            options.quality = quality;
            options.max_file_size = max_file_size;
            if width.is_some() || height.is_some() {
                options.resize = Some(ResizeOptions {
                    width,
                    height,
                    keep_aspect: !no_keep_aspect,
                });
            }
            options.validate()?;
            run_convert(&paths, &options, &out)
        }
        Commands::Dupes {
            paths,
            compare_by,
            threshold,
            keep,
            output,
        } => {
            let settings = DuplicateSettings::new(compare_by.into())
                .threshold(threshold)
                .keep_policy(keep.into());
            run_dupes(&paths, &settings, output)
        }
        Commands::Formats => run_formats(),
    }
}

fn run_convert(paths: &[PathBuf], options: &ConversionOptions, out: &Path) -> Result<()> {
    let term = Term::stderr();
    let files = collect_sources(paths)?;

    term.write_line(&format!(
        "{} {} images to {}",
        style("Converting").bold().cyan(),
        style(files.len()).cyan(),
        style(options.output_format).yellow()
    ))
    .ok();

    fs::create_dir_all(out).map_err(|source| PipelineError::Output {
        path: out.to_path_buf(),
        source,
    })?;

    let pipeline = Pipeline::builder().build();
    let (sender, receiver) = EventChannel::new();

    let bar = progress_bar(files.len() as u64);
    let bar_clone = bar.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Conversion(ConversionEvent::Progress(p)) => {
                    bar_clone.set_position(p.completed_files as u64);
                    bar_clone.set_message(p.current_file);
                }
                Event::Conversion(ConversionEvent::FallbackUsed { requested, used }) => {
                    bar_clone.println(format!(
                        "  {} {} unavailable, using {}",
                        style("!").yellow(),
                        requested,
                        used
                    ));
                }
                Event::Conversion(ConversionEvent::Aborted { reason }) => {
                    bar_clone.println(format!("  {} {}", style("Stopped:").red().bold(), reason));
                }
                Event::Conversion(ConversionEvent::Completed(_)) => bar_clone.finish_and_clear(),
                _ => {}
            }
        }
    });

    let outcome = pipeline.convert_batch_with_events(&files, options, &sender);
    drop(sender);
    event_thread.join().ok();

    write_outputs(&outcome, out)?;
    print_convert_summary(&term, &outcome);
    Ok(())
}

fn write_outputs(outcome: &BatchOutcome, out: &Path) -> Result<()> {
    for result in &outcome.results {
        let Some(bytes) = result.output_binary() else {
            continue;
        };
        let stem = Path::new(&result.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.file_id.clone());
        let path = out.join(format!("{}.{}", stem, result.output_format.extension()));
        fs::write(&path, bytes).map_err(|source| PipelineError::Output { path, source })?;
    }
    Ok(())
}

fn print_convert_summary(term: &Term, outcome: &BatchOutcome) {
    let summary = &outcome.summary;

    term.write_line("").ok();
    term.write_line(&format!(
        "{} {} converted, {} failed in {:.1}s",
        style("✓").green().bold(),
        style(summary.succeeded).cyan(),
        style(summary.failed).red(),
        summary.elapsed_ms as f64 / 1000.0
    ))
    .ok();

    let saved = summary.total_original_bytes as i64 - summary.total_output_bytes as i64;
    let label = if saved >= 0 { "saved" } else { "added" };
    term.write_line(&format!(
        "  {} {}",
        style(format_bytes(saved.unsigned_abs())).yellow(),
        label
    ))
    .ok();

    if summary.cancelled {
        term.write_line(&format!("  {}", style("Cancelled before completion").dim())).ok();
    }

    for result in outcome.results.iter().filter(|r| !r.success) {
        term.write_line(&format!(
            "  {} {}: {}",
            style("✗").red(),
            result.file_name,
            result.error.as_deref().unwrap_or("unknown error")
        ))
        .ok();
        if let Some(suggestion) = &result.recovery_suggestion {
            term.write_line(&format!("    {}", style(suggestion).dim())).ok();
        }
    }

    for result in outcome.results.iter().filter(|r| !r.warnings.is_empty()) {
        for warning in &result.warnings {
            term.write_line(&format!("  {} {}: {}", style("!").yellow(), result.file_name, warning))
                .ok();
        }
    }
}

fn run_dupes(paths: &[PathBuf], settings: &DuplicateSettings, output: OutputStyle) -> Result<()> {
    let term = Term::stderr();
    let files = collect_sources(paths)?;
    let pipeline = Pipeline::builder().build();

    let (sender, receiver) = EventChannel::new();
    let bar = matches!(output, OutputStyle::Pretty).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_message(format!("Comparing {} files by {}", files.len(), settings.compare_by));
        bar
    });
    let bar_clone = bar.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(bar) = &bar_clone else { continue };
            match event {
                Event::Duplicate(DuplicateEvent::ChunkCompleted {
                    chunk_index,
                    total_chunks,
                    ..
                }) => bar.set_message(format!("chunk {}/{}", chunk_index + 1, total_chunks)),
                Event::Duplicate(DuplicateEvent::Completed { .. }) => bar.finish_and_clear(),
                _ => bar.tick(),
            }
        }
    });

    let result = pipeline.detect_duplicates_with_events(&files, settings, &sender);
    drop(sender);
    event_thread.join().ok();
    let result = result?;

    match output {
        OutputStyle::Pretty => print_pretty_dupes(&term, &result),
        OutputStyle::Json => print_json_dupes(&result),
    }
    Ok(())
}

fn print_pretty_dupes(term: &Term, result: &DuplicateDetectionResult) {
    term.write_line(&format!(
        "{} {} groups, {} duplicates, {} unique in {:.1}s",
        style("✓").green().bold(),
        style(result.duplicate_groups.len()).cyan(),
        style(result.duplicate_count).cyan(),
        result.unique_files.len(),
        result.processing_time_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} potential space savings",
        style(format_bytes(result.potential_savings_bytes)).yellow()
    ))
    .ok();
    term.write_line("").ok();

    for (i, group) in result.duplicate_groups.iter().enumerate() {
        term.write_line(&format!(
            "  {} ({} files, {})",
            style(format!("Group {}:", i + 1)).bold(),
            group.size(),
            format_bytes(group.potential_savings())
        ))
        .ok();

        let keep = &group.representative().id;
        for file in group.files() {
            let marker = if &file.id == keep {
                style("★").green().to_string()
            } else {
                style("○").dim().to_string()
            };
            term.write_line(&format!("    {} {}", marker, file.id)).ok();
        }
        term.write_line("").ok();
    }

    for error in &result.errors {
        term.write_line(&format!("  {} {}: {}", style("!").yellow(), error.file_name, error.message))
            .ok();
    }

    term.write_line(&format!(
        "{}",
        style("No files were deleted. Review carefully before taking action.").dim()
    ))
    .ok();
}

fn print_json_dupes(result: &DuplicateDetectionResult) {
    let output = serde_json::json!({
        "duplicate_groups": result.duplicate_groups.iter().map(|g| {
            serde_json::json!({
                "id": g.id.to_string(),
                "identifier": g.identifier.to_string(),
                "files": g.files().iter().map(|f| &f.id).collect::<Vec<_>>(),
                "representative": g.representative().id,
                "size": g.size(),
            })
        }).collect::<Vec<_>>(),
        "duplicate_count": result.duplicate_count,
        "unique_files": result.unique_files.iter().map(|f| &f.id).collect::<Vec<_>>(),
        "files_to_remove": result.files_to_remove,
        "errors": result.errors,
        "potential_savings_bytes": result.potential_savings_bytes,
        "processing_time_ms": result.processing_time_ms,
        "chunks_processed": result.chunks_processed,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(error = %e, "could not serialize results"),
    }
}

fn run_formats() -> Result<()> {
    let term = Term::stdout();
    let matrix = Pipeline::builder().build().detect_format_support();

    term.write_line(&format!("{}", style("Output formats").bold().underlined())).ok();
    for (format, supported) in matrix.iter() {
        term.write_line(&format!("  {:<6} {}", format, format_status(format, supported)))
            .ok();
    }
    Ok(())
}

fn format_status(format: OutputFormat, supported: bool) -> String {
    let status = if supported {
        style("supported".to_string()).green()
    } else {
        style(format!("unavailable, falls back to {}", format.fallback())).red()
    };
    status.to_string()
}

/// Expand files and directories into image sources, sorted by path
fn collect_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut found = Vec::new();
    for root in paths {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_image(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }
    found.sort();
    found.dedup();

    found
        .iter()
        .map(|path| SourceFile::from_path(path).map_err(PipelineError::from))
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SourceFormat::from_extension(ext) != SourceFormat::Unknown)
        .unwrap_or(false)
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    bar.set_style(style);
    bar
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_status_names_the_fallback() {
        assert!(format_status(OutputFormat::Png, true).contains("supported"));
        assert!(format_status(OutputFormat::Avif, false).contains("falls back to webp"));
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
