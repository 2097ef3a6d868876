//! # Source Module
//!
//! The caller-owned input files fed into conversion and duplicate detection.
//!
//! A [`SourceFile`] is immutable once created. The pipeline only ever reads
//! the bytes behind its [`BinaryHandle`], which may live in memory, on disk,
//! or behind a caller-supplied [`SourceLoader`] (object storage, a share).

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Fetches source bytes the pipeline cannot read by itself.
///
/// I/O errors are classified by kind, so a `ConnectionReset` or `TimedOut`
/// is retried with backoff.
pub trait SourceLoader: Send + Sync + fmt::Debug {
    fn load(&self) -> io::Result<Vec<u8>>;
}

/// Where the bytes of a source file live
#[derive(Debug, Clone)]
pub enum BinaryHandle {
    /// Bytes already held in memory
    Memory(Arc<[u8]>),
    /// Bytes read lazily from disk (or a mounted share)
    Path(PathBuf),
    /// Bytes fetched on demand by the caller's loader
    Loader(Arc<dyn SourceLoader>),
}

impl BinaryHandle {
    /// Read the full contents.
    ///
    /// In-memory handles are shared, not copied.
    pub fn read(&self, name: &str) -> Result<Arc<[u8]>, SourceError> {
        let loaded = match self {
            BinaryHandle::Memory(bytes) => return Ok(Arc::clone(bytes)),
            BinaryHandle::Path(path) => fs::read(path),
            BinaryHandle::Loader(loader) => loader.load(),
        };
        loaded.map(Arc::from).map_err(|source| SourceError::Read {
            name: name.to_string(),
            source,
        })
    }
}

impl Default for BinaryHandle {
    fn default() -> Self {
        BinaryHandle::Memory(Arc::from(Vec::new()))
    }
}

/// An input image submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Caller-assigned identifier
    pub id: String,
    /// Display name (usually the file name)
    pub name: String,
    /// Size of the encoded source in bytes
    pub byte_size: u64,
    /// Declared MIME type
    pub mime_type: String,
    /// Last modification time, part of the hash cache key
    pub last_modified: SystemTime,
    /// Handle to the encoded bytes
    #[serde(skip)]
    pub data: BinaryHandle,
}

impl SourceFile {
    /// Create a source from bytes already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        let mime_type = SourceFormat::detect(&bytes, &name).mime_type().to_string();

        Self {
            id: Uuid::new_v4().to_string(),
            byte_size: bytes.len() as u64,
            mime_type,
            last_modified: SystemTime::now(),
            data: BinaryHandle::Memory(bytes),
            name,
        }
    }

    /// Create a source backed by a file on disk.
    ///
    /// Only metadata is read here; the contents are read on demand.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = fs::metadata(path).map_err(|source| SourceError::Read {
            name: name.clone(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        Ok(Self {
            id: path.display().to_string(),
            byte_size: metadata.len(),
            mime_type: SourceFormat::from_extension(extension).mime_type().to_string(),
            last_modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            data: BinaryHandle::Path(path.to_path_buf()),
            name,
        })
    }

    /// Create a source whose bytes come from `loader` on every read.
    ///
    /// `byte_size` is the caller's declared size; it feeds the hash cache key
    /// and the size strategy without touching the loader.
    pub fn from_loader(
        name: impl Into<String>,
        byte_size: u64,
        loader: Arc<dyn SourceLoader>,
    ) -> Self {
        let name = name.into();
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();

        Self {
            id: Uuid::new_v4().to_string(),
            byte_size,
            mime_type: SourceFormat::from_extension(&extension).mime_type().to_string(),
            last_modified: SystemTime::now(),
            data: BinaryHandle::Loader(loader),
            name,
        }
    }

    /// Replace the generated identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the modification time
    pub fn with_last_modified(mut self, modified: SystemTime) -> Self {
        self.last_modified = modified;
        self
    }

    /// Read the encoded bytes
    pub fn read(&self) -> Result<Arc<[u8]>, SourceError> {
        self.data.read(&self.name)
    }
}

/// Encoded formats recognised on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Bmp,
    Tiff,
    Unknown,
}

impl SourceFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => SourceFormat::Jpeg,
            "png" => SourceFormat::Png,
            "webp" => SourceFormat::WebP,
            "avif" => SourceFormat::Avif,
            "gif" => SourceFormat::Gif,
            "bmp" => SourceFormat::Bmp,
            "tiff" | "tif" => SourceFormat::Tiff,
            _ => SourceFormat::Unknown,
        }
    }

    /// Detect format from a declared MIME type
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => SourceFormat::Jpeg,
            "image/png" => SourceFormat::Png,
            "image/webp" => SourceFormat::WebP,
            "image/avif" => SourceFormat::Avif,
            "image/gif" => SourceFormat::Gif,
            "image/bmp" => SourceFormat::Bmp,
            "image/tiff" => SourceFormat::Tiff,
            _ => SourceFormat::Unknown,
        }
    }

    /// Detect format from magic bytes, falling back to the name's extension
    pub fn detect(bytes: &[u8], name: &str) -> Self {
        let sniffed = match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => SourceFormat::Jpeg,
            Ok(image::ImageFormat::Png) => SourceFormat::Png,
            Ok(image::ImageFormat::WebP) => SourceFormat::WebP,
            Ok(image::ImageFormat::Avif) => SourceFormat::Avif,
            Ok(image::ImageFormat::Gif) => SourceFormat::Gif,
            Ok(image::ImageFormat::Bmp) => SourceFormat::Bmp,
            Ok(image::ImageFormat::Tiff) => SourceFormat::Tiff,
            _ => SourceFormat::Unknown,
        };

        if sniffed != SourceFormat::Unknown {
            return sniffed;
        }

        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(SourceFormat::from_extension)
            .unwrap_or(SourceFormat::Unknown)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::WebP => "image/webp",
            SourceFormat::Avif => "image/avif",
            SourceFormat::Gif => "image/gif",
            SourceFormat::Bmp => "image/bmp",
            SourceFormat::Tiff => "image/tiff",
            SourceFormat::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
            SourceFormat::WebP => "webp",
            SourceFormat::Avif => "avif",
            SourceFormat::Gif => "gif",
            SourceFormat::Bmp => "bmp",
            SourceFormat::Tiff => "tiff",
            SourceFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
