//! # Core Module
//!
//! The UI-agnostic preprocessing engine.
//!
//! ## Modules
//! - `source` - Input files and format detection
//! - `capability` - Which output formats this runtime can encode
//! - `convert` - Single-file decode, resize and encode
//! - `batch` - Memory-aware batch conversion with cancellation
//! - `duplicates` - Duplicate detection and the identifier cache
//! - `recovery` - Error classification, retry and user messages
//! - `pipeline` - The entry point tying everything together

pub mod batch;
pub mod capability;
pub mod convert;
pub mod duplicates;
pub mod pipeline;
pub mod recovery;
pub mod source;

// Re-export commonly used types
pub use batch::{BatchOutcome, CancellationToken};
pub use capability::{CapabilityProbe, FormatSupportMatrix, OutputFormat};
pub use convert::{ConversionOptions, ConversionResult, ResizeOptions};
pub use duplicates::{CompareBy, DuplicateDetectionResult, DuplicateGroup, DuplicateSettings, KeepPolicy};
pub use pipeline::Pipeline;
pub use source::{SourceFile, SourceFormat};
