//! Per-strategy identifiers and how they compare.

use super::settings::CompareBy;
use crate::core::convert::codec::{self, ImageCodec};
use crate::core::source::SourceFile;
use crate::error::{ConversionError, DetectError};
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Value used to test two files for equivalence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Identifier {
    Size(u64),
    /// Normalized name
    Name(String),
    /// Hex SHA-256 of the bytes
    Hash(String),
    /// Perceptual hash bits
    Content(Vec<u8>),
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Size(size) => write!(f, "{} bytes", size),
            Identifier::Name(name) => f.write_str(name),
            Identifier::Hash(hash) => f.write_str(hash),
            Identifier::Content(bits) => {
                for byte in bits {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Computes a perceptual hash for the `content` strategy.
///
/// Implementations must be tolerant of re-encoding: the same picture saved
/// twice should hash to nearly the same bits.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>, DetectError>;
}

/// Gradient hash via `image_hasher`
pub struct PerceptualHasher {
    hash_size: u32,
    decode_timeout: Duration,
}

impl PerceptualHasher {
    pub fn new(hash_size: u32, decode_timeout: Duration) -> Self {
        Self {
            hash_size,
            decode_timeout,
        }
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(8, Duration::from_secs(10))
    }
}

impl ContentHasher for PerceptualHasher {
    fn hash(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>, DetectError> {
        let decoder = Arc::new(ImageCodec);
        let image = codec::decode_with_timeout(decoder, name, bytes.into(), None, self.decode_timeout)
            .map_err(|e| match e {
                ConversionError::Timeout { timeout_ms, .. } => DetectError::Timeout {
                    name: name.to_string(),
                    timeout_ms,
                },
                other => DetectError::Undecodable {
                    name: name.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let hasher = HasherConfig::new()
            .hash_size(self.hash_size, self.hash_size)
            .hash_alg(HashAlg::DoubleGradient)
            .to_hasher();
        Ok(hasher.hash_image(&image).as_bytes().to_vec())
    }
}

/// Compute the identifier of `file` for `strategy`
pub fn compute_identifier(
    file: &SourceFile,
    strategy: CompareBy,
    content: &dyn ContentHasher,
) -> Result<Identifier, DetectError> {
    match strategy {
        CompareBy::Size => Ok(Identifier::Size(file.byte_size)),
        CompareBy::Name => Ok(Identifier::Name(normalize_name(&file.name))),
        CompareBy::Hash => {
            let bytes = file.read()?;
            let mut hasher = Sha256::new();
            hasher.update(&bytes[..]);
            Ok(Identifier::Hash(format!("{:x}", hasher.finalize())))
        }
        CompareBy::Content => {
            let bytes = file.read()?;
            content.hash(&file.name, &bytes).map(Identifier::Content)
        }
    }
}

/// Lowercase stem with separators collapsed.
///
/// `IMG_0001 (copy).JPG` and `img 0001 copy.jpeg` normalize to the same text
/// apart from the extension, which is dropped.
pub fn normalize_name(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    let mut normalized = String::with_capacity(stem.len());
    let mut pending_space = false;
    for c in stem.chars() {
        if c.is_alphanumeric() {
            if pending_space && !normalized.is_empty() {
                normalized.push(' ');
            }
            pending_space = false;
            normalized.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    normalized
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`.
///
/// Identical strings (including two empty ones) score 1.0; any non-empty
/// string against an empty one scores 0.0.
pub fn calculate_string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
}

/// Share of matching bits between two perceptual hashes
pub fn content_similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let differing: u32 = a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum();
    1.0 - differing as f64 / (a.len() * 8) as f64
}

/// Cheap size check run before any identifier comparison.
///
/// Sizes must be equal or within 10% of the larger one.
pub fn fast_duplicate_check(a: &SourceFile, b: &SourceFile) -> bool {
    if a.byte_size == b.byte_size {
        return true;
    }
    let larger = a.byte_size.max(b.byte_size);
    let diff = a.byte_size.abs_diff(b.byte_size);
    diff as f64 <= larger as f64 * 0.1
}

/// Whether two identifiers match under `threshold`
pub fn identifiers_match(a: &Identifier, b: &Identifier, threshold: f64) -> bool {
    match (a, b) {
        (Identifier::Size(x), Identifier::Size(y)) => x == y,
        (Identifier::Hash(x), Identifier::Hash(y)) => x == y,
        (Identifier::Name(x), Identifier::Name(y)) => {
            calculate_string_similarity(x, y) >= threshold
        }
        (Identifier::Content(x), Identifier::Content(y)) => {
            content_similarity(x, y) >= threshold
        }
        _ => false,
    }
}
