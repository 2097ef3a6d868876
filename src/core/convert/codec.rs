//! Decoding and encoding on top of the bitmap codec libraries.
//!
//! Uses zune-jpeg for JPEG sources (1.5-2x faster than the image crate),
//! falls back to the image crate for everything else and for encoding.

use crate::core::capability::OutputFormat;
use crate::error::ConversionError;
use crossbeam_channel::{bounded, RecvTimeoutError};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{
    DynamicImage, ExtendedColorType, ImageBuffer, ImageEncoder, ImageError, ImageReader,
    ImageResult, Limits, Luma, Rgb, Rgba,
};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest)
const AVIF_SPEED: u8 = 8;

/// Bitmap codec used by the conversion worker
pub trait Codec: Send + Sync {
    fn read_dimensions(&self, bytes: &[u8]) -> ImageResult<(u32, u32)>;

    fn decode(&self, bytes: &[u8], limits: Option<Limits>) -> ImageResult<DynamicImage>;

    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> ImageResult<Vec<u8>>;
}

/// zune-jpeg and image crate codecs
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn read_dimensions(&self, bytes: &[u8]) -> ImageResult<(u32, u32)> {
        read_dimensions(bytes)
    }

    fn decode(&self, bytes: &[u8], limits: Option<Limits>) -> ImageResult<DynamicImage> {
        decode(bytes, limits)
    }

    fn encode(&self, image: &DynamicImage, format: OutputFormat, quality: u8) -> ImageResult<Vec<u8>> {
        encode(image, format, quality)
    }
}

/// Read image dimensions from the header without decoding pixels
pub fn read_dimensions(bytes: &[u8]) -> ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
}

/// Decode an encoded image.
///
/// With `limits` set, the image crate decoder is used directly so the
/// allocation ceiling is enforced. Otherwise JPEG goes through zune-jpeg.
pub fn decode(bytes: &[u8], limits: Option<Limits>) -> ImageResult<DynamicImage> {
    if let Some(limits) = limits {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        reader.limits(limits);
        return reader.decode();
    }

    if is_jpeg(bytes) {
        if let Some(image) = decode_jpeg(bytes) {
            return Ok(image);
        }
    }

    image::load_from_memory(bytes)
}

/// Decode on a helper thread, giving up after `timeout`.
///
/// The helper keeps running after a timeout; its result is discarded.
pub fn decode_with_timeout(
    codec: Arc<dyn Codec>,
    name: &str,
    bytes: Arc<[u8]>,
    limits: Option<Limits>,
    timeout: Duration,
) -> Result<DynamicImage, ConversionError> {
    let (sender, receiver) = bounded(1);

    thread::Builder::new()
        .name("image-decode".to_string())
        .spawn(move || {
            let _ = sender.send(codec.decode(&bytes, limits));
        })
        .map_err(|e| ConversionError::Memory {
            name: name.to_string(),
            detail: format!("could not start decode thread: {}", e),
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result.map_err(|e| decode_error(name, e)),
        Err(RecvTimeoutError::Timeout) => Err(ConversionError::Timeout {
            name: name.to_string(),
            operation: "decode",
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ConversionError::Corrupt {
            name: name.to_string(),
            reason: "decoder stopped unexpectedly".to_string(),
        }),
    }
}

/// Encode an image in the given format.
///
/// `quality` is 1-100 and is ignored by lossless encoders.
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    let (width, height) = (image.width(), image.height());
    let quality = quality.clamp(1, 100);

    match format {
        OutputFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            if image.color().has_alpha() {
                let rgba = image.to_rgba8();
                PngEncoder::new(&mut out).write_image(
                    rgba.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
            } else {
                let rgb = image.to_rgb8();
                PngEncoder::new(&mut out).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            }
        }
        OutputFormat::Webp => {
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut out).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        OutputFormat::Avif => {
            let rgba = image.to_rgba8();
            AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, quality).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
    }

    Ok(out)
}

/// Map a decode failure onto the error taxonomy
pub fn decode_error(name: &str, error: ImageError) -> ConversionError {
    match error {
        ImageError::Limits(e) => ConversionError::Memory {
            name: name.to_string(),
            detail: e.to_string(),
        },
        other => ConversionError::Corrupt {
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Map an encode failure onto the error taxonomy
pub fn encode_error(name: &str, format: OutputFormat, error: ImageError) -> ConversionError {
    match error {
        ImageError::Unsupported(_) => ConversionError::Unsupported {
            format: format.to_string(),
        },
        ImageError::Limits(e) => ConversionError::Memory {
            name: name.to_string(),
            detail: e.to_string(),
        },
        other => ConversionError::Encode {
            name: name.to_string(),
            format: format.to_string(),
            reason: other.to_string(),
        },
    }
}

fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8
}

/// Fast JPEG decoding using zune-jpeg.
///
/// Returns `None` for anything zune-jpeg cannot handle so the caller can
/// fall back to the image crate.
fn decode_jpeg(bytes: &[u8]) -> Option<DynamicImage> {
    let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);

    let pixels = decoder.decode().ok()?;
    let info = decoder.info()?;
    let width = info.width as u32;
    let height = info.height as u32;

    match decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB) {
        ColorSpace::RGB => {
            let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)?;
            Some(DynamicImage::ImageRgb8(buffer))
        }
        ColorSpace::RGBA => {
            let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)?;
            Some(DynamicImage::ImageRgba8(buffer))
        }
        ColorSpace::Luma => {
            let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)?;
            Some(DynamicImage::ImageLuma8(buffer))
        }
        _ => None,
    }
}
