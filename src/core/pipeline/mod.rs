//! # Pipeline Module
//!
//! The in-process API surface.
//!
//! ## Operations
//! - **detect_format_support** - probe (once) which output formats encode
//! - **convert** - convert a single file
//! - **convert_batch** - memory-aware sequential batch conversion
//! - **abort** - cancel the in-flight batch or scan
//! - **detect_duplicates** - group equivalent files
//!
//! The pipeline owns the format support matrix and the identifier cache.
//! Both can be injected through the builder so tests start fresh.

mod executor;

pub use executor::{Pipeline, PipelineBuilder};
