//! # image-prep CLI
//!
//! Command-line front-end for the preprocessing pipeline.
//!
//! ## Usage
//! ```bash
//! image-prep convert ~/Photos --format webp --width 1920 --out ./converted
//! image-prep dupes ~/Photos --compare-by hash --output json
//! image-prep formats
//! ```

mod cli;

use image_prep::Result;

fn main() -> Result<()> {
    image_prep::init_tracing();
    cli::run()
}
