//! # Image Prep
//!
//! Batch image preprocessing: format conversion with runtime capability
//! fallback, memory-aware batching, and duplicate detection.
//!
//! ## Core Philosophy
//! - **Bounded memory** - never decode more than one image at a time per batch
//! - **Degrade, don't fail** - substitute formats and shrink images before giving up
//! - **Explain failures** - every error carries a message and a suggestion
//!
//! ## Architecture
//! - `core` - The conversion and duplicate engine
//! - `events` - Event-driven progress reporting
//! - `error` - Classified error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{PipelineError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// controls verbosity.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
