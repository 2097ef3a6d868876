//! Output dimension calculation and SIMD-accelerated resizing.
//!
//! Uses fast_image_resize, which is 5-14x faster than the image crate's
//! resize and picks AVX2/NEON automatically.

use super::ResizeOptions;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions as FirOptions, Resizer};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

/// Compute output dimensions for a resize request.
///
/// With aspect preservation and both bounds given, the tighter constraint
/// wins: whichever candidate has the smaller area.
pub fn target_dimensions(src_width: u32, src_height: u32, resize: &ResizeOptions) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (src_width, src_height);
    }

    let width = resize.width.filter(|w| *w > 0);
    let height = resize.height.filter(|h| *h > 0);

    let by_width = |w: u32| (w, scale(src_height, w, src_width));
    let by_height = |h: u32| (scale(src_width, h, src_height), h);

    match (width, height) {
        (None, None) => (src_width, src_height),
        (Some(w), None) if resize.keep_aspect => by_width(w),
        (None, Some(h)) if resize.keep_aspect => by_height(h),
        (Some(w), None) => (w, src_height),
        (None, Some(h)) => (src_width, h),
        (Some(w), Some(h)) if !resize.keep_aspect => (w, h),
        (Some(w), Some(h)) => {
            let a = by_width(w);
            let b = by_height(h);
            if area(a) <= area(b) {
                a
            } else {
                b
            }
        }
    }
}

/// Dimensions that fit inside a square of `max_dimension`, keeping aspect
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    if width >= height {
        (max_dimension, scale(height, max_dimension, width))
    } else {
        (scale(width, max_dimension, height), max_dimension)
    }
}

/// Resize an image to exactly `width` x `height`.
///
/// Alpha images go through RGBA, everything else through RGB. The source
/// buffer is consumed so its memory is released as soon as the copy exists.
pub fn resize_exact(image: DynamicImage, width: u32, height: u32) -> Result<DynamicImage, String> {
    if width == 0 || height == 0 {
        return Err("Invalid destination dimensions".to_string());
    }
    if image.width() == width && image.height() == height {
        return Ok(image);
    }

    let (src_width, src_height) = (image.width(), image.height());
    let has_alpha = image.color().has_alpha();
    let (raw, pixel_type) = if has_alpha {
        (image.into_rgba8().into_raw(), PixelType::U8x4)
    } else {
        (image.into_rgb8().into_raw(), PixelType::U8x3)
    };

    let src_image = Image::from_vec_u8(src_width, src_height, raw, pixel_type)
        .map_err(|e| format!("Failed to create source image: {}", e))?;
    let mut dst_image = Image::new(width, height, pixel_type);

    let options = FirOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("Resize failed: {}", e))?;
    drop(src_image);

    let raw = dst_image.into_vec();
    if has_alpha {
        ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, raw)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "Failed to create result buffer".to_string())
    } else {
        ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, raw)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "Failed to create result buffer".to_string())
    }
}

fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (value as f64 * numerator as f64 / denominator as f64).round() as u32;
    scaled.max(1)
}

fn area((w, h): (u32, u32)) -> u64 {
    w as u64 * h as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::codec::tests::gradient;

    fn resize(width: Option<u32>, height: Option<u32>, keep_aspect: bool) -> ResizeOptions {
        ResizeOptions {
            width,
            height,
            keep_aspect,
        }
    }

    #[test]
    fn width_only_keeps_aspect() {
        assert_eq!(target_dimensions(2000, 1000, &resize(Some(500), None, true)), (500, 250));
    }

    #[test]
    fn height_only_keeps_aspect() {
        assert_eq!(target_dimensions(2000, 1000, &resize(None, Some(100), true)), (200, 100));
    }

    #[test]
    fn both_bounds_pick_tighter_constraint() {
        // by width: 800x400, by height: 1200x600 -> width is tighter
        assert_eq!(
            target_dimensions(2000, 1000, &resize(Some(800), Some(600), true)),
            (800, 400)
        );
        // by width: 800x1600, by height: 300x600 -> height is tighter
        assert_eq!(
            target_dimensions(1000, 2000, &resize(Some(800), Some(600), true)),
            (300, 600)
        );
    }

    #[test]
    fn disabled_aspect_uses_exact_bounds() {
        assert_eq!(
            target_dimensions(2000, 1000, &resize(Some(300), Some(300), false)),
            (300, 300)
        );
    }

    #[test]
    fn no_bounds_keeps_source() {
        assert_eq!(target_dimensions(640, 480, &resize(None, None, true)), (640, 480));
    }

    #[test]
    fn tiny_results_never_hit_zero() {
        assert_eq!(target_dimensions(10_000, 10, &resize(Some(100), None, true)), (100, 1));
    }

    #[test]
    fn fit_within_shrinks_long_edge() {
        assert_eq!(fit_within(4000, 3000, 2048), (2048, 1536));
        assert_eq!(fit_within(3000, 4000, 2048), (1536, 2048));
        assert_eq!(fit_within(100, 50, 2048), (100, 50));
    }

    #[test]
    fn resize_produces_correct_dimensions() {
        let resized = resize_exact(gradient(100, 80), 25, 20).unwrap();
        assert_eq!((resized.width(), resized.height()), (25, 20));
    }

    #[test]
    fn resize_preserves_alpha_channel() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_fn(20, 20, |_, _| Rgba([9, 9, 9, 10])));
        let resized = resize_exact(rgba, 10, 10).unwrap();
        assert!(resized.color().has_alpha());
    }
}
