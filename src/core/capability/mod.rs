//! # Capability Module
//!
//! Detects which output formats this runtime can actually encode and picks a
//! substitute when the preferred one is missing.
//!
//! ## Fallback chain
//! | Requested | Substitute |
//! |-----------|------------|
//! | avif      | webp       |
//! | webp      | jpeg       |
//! | jpeg      | jpeg       |
//! | png       | png        |
//!
//! ## Probing
//! A probe encodes a tiny image in the target format. Results are cached per
//! format; concurrent callers asking about the same format share a single
//! in-flight probe. A probe that errors or panics means "unsupported".

mod format;

pub use format::OutputFormat;

use crate::core::convert::codec;
use crate::error::ConversionError;
use image::{DynamicImage, ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Snapshot of which output formats can be encoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSupportMatrix {
    formats: BTreeMap<OutputFormat, bool>,
}

impl FormatSupportMatrix {
    /// Whether a format was probed and found supported
    pub fn supports(&self, format: OutputFormat) -> bool {
        self.formats.get(&format).copied().unwrap_or(false)
    }

    /// Iterate over `(format, supported)` pairs in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (OutputFormat, bool)> + '_ {
        self.formats.iter().map(|(f, s)| (*f, *s))
    }

    /// Formats that can be encoded
    pub fn supported_formats(&self) -> Vec<OutputFormat> {
        self.iter().filter(|(_, s)| *s).map(|(f, _)| f).collect()
    }
}

/// Performs the actual capability test for one format
pub trait FormatProbe: Send + Sync {
    fn probe(&self, format: OutputFormat) -> Result<bool, ConversionError>;
}

/// Probes by encoding a 2x2 image with the real codec
#[derive(Debug, Default)]
pub struct EncodeProbe;

impl FormatProbe for EncodeProbe {
    fn probe(&self, format: OutputFormat) -> Result<bool, ConversionError> {
        let pixels = ImageBuffer::from_fn(2, 2, |x, y| Rgba([x as u8 * 255, y as u8 * 255, 128, 255]));
        let image = DynamicImage::ImageRgba8(pixels);
        let encoded = codec::encode(&image, format, format.default_quality()).map_err(|e| {
            ConversionError::Encode {
                name: "capability probe".to_string(),
                format: format.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(!encoded.is_empty())
    }
}

/// Outcome of resolving a requested format against the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatResolution {
    /// What the caller asked for
    pub requested: OutputFormat,
    /// What will actually be encoded
    pub used: OutputFormat,
}

impl FormatResolution {
    /// Whether a substitute was chosen
    pub fn substituted(&self) -> bool {
        self.requested != self.used
    }
}

type ProbeSlot = Arc<OnceLock<bool>>;

/// Cached, de-duplicated capability detection
pub struct CapabilityProbe {
    probe: Box<dyn FormatProbe>,
    slots: Mutex<HashMap<OutputFormat, ProbeSlot>>,
}

impl CapabilityProbe {
    /// Create a probe backed by the real codec
    pub fn new() -> Self {
        Self::with_probe(Box::new(EncodeProbe))
    }

    /// Create a probe with a custom capability test
    pub fn with_probe(probe: Box<dyn FormatProbe>) -> Self {
        Self {
            probe,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cached answer, or a conservative default for untested formats.
    ///
    /// Never runs a probe. JPEG and PNG are assumed available until proven
    /// otherwise; everything else is assumed missing.
    pub fn is_supported(&self, format: OutputFormat) -> bool {
        let cached = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format)
            .and_then(|slot| slot.get().copied());

        cached.unwrap_or_else(|| format.assumed_supported())
    }

    /// Run (or reuse) the capability test for a format
    pub fn detect_support(&self, format: OutputFormat) -> bool {
        let slot = self.slot(format);
        *slot.get_or_init(|| self.run_probe(format))
    }

    /// Discard the cached answer for a format and probe again
    pub fn reprobe(&self, format: OutputFormat) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(format, Arc::new(OnceLock::new()));
        self.detect_support(format)
    }

    /// Probe every output format
    pub fn detect_all(&self) -> FormatSupportMatrix {
        let formats = OutputFormat::ALL
            .iter()
            .map(|&format| (format, self.detect_support(format)))
            .collect();
        FormatSupportMatrix { formats }
    }

    /// Static substitution table
    pub fn fallback_chain(format: OutputFormat) -> OutputFormat {
        format.fallback()
    }

    /// Walk the fallback chain until a supported format is found.
    ///
    /// The chain terminates at a format that falls back to itself; that
    /// format is used even if its own probe failed, so encoding surfaces the
    /// real error.
    pub fn resolve(&self, requested: OutputFormat) -> FormatResolution {
        let mut current = requested;
        loop {
            if self.detect_support(current) {
                break;
            }
            let next = current.fallback();
            if next == current {
                warn!(format = %current, "terminal fallback format failed its probe");
                break;
            }
            debug!(from = %current, to = %next, "format unsupported, trying fallback");
            current = next;
        }

        FormatResolution {
            requested,
            used: current,
        }
    }

    fn slot(&self, format: OutputFormat) -> ProbeSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(format).or_default())
    }

    fn run_probe(&self, format: OutputFormat) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.probe.probe(format))) {
            Ok(Ok(supported)) => {
                debug!(format = %format, supported, "format probe finished");
                supported
            }
            Ok(Err(e)) => {
                warn!(format = %format, error = %e, "format probe failed, treating as unsupported");
                false
            }
            Err(_) => {
                warn!(format = %format, "format probe panicked, treating as unsupported");
                false
            }
        }
    }
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}
