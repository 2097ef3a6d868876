//! Output format definitions.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Formats the pipeline can encode to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    /// Every output format, in probe order
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Avif,
    ];

    /// Next format to try when this one cannot be encoded
    pub fn fallback(self) -> OutputFormat {
        match self {
            OutputFormat::Avif => OutputFormat::Webp,
            OutputFormat::Webp => OutputFormat::Jpeg,
            OutputFormat::Jpeg => OutputFormat::Jpeg,
            OutputFormat::Png => OutputFormat::Png,
        }
    }

    /// Quality used when the caller does not specify one
    pub fn default_quality(self) -> u8 {
        match self {
            OutputFormat::Jpeg => 85,
            OutputFormat::Webp => 80,
            OutputFormat::Avif => 75,
            OutputFormat::Png => 100,
        }
    }

    /// Whether the encoder actually uses the quality setting.
    ///
    /// PNG is lossless and the available WebP encoder only writes lossless.
    pub fn honors_quality(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Avif)
    }

    /// Assumption used before a format has been probed
    pub(crate) fn assumed_supported(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Png)
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
            OutputFormat::Webp => write!(f, "webp"),
            OutputFormat::Avif => write!(f, "avif"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            _ => Err(SettingsError::UnknownValue {
                field: "output format",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quality_per_format() {
        assert_eq!(OutputFormat::Jpeg.default_quality(), 85);
        assert_eq!(OutputFormat::Webp.default_quality(), 80);
        assert_eq!(OutputFormat::Avif.default_quality(), 75);
        assert_eq!(OutputFormat::Png.default_quality(), 100);
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("heic".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn fallback_chain_terminates() {
        for format in OutputFormat::ALL {
            let mut current = format;
            for _ in 0..OutputFormat::ALL.len() {
                current = current.fallback();
            }
            assert_eq!(current.fallback(), current);
        }
    }
}
