//! Raster decoding, bounded resizing and re-encoding.

use std::io::Cursor;

use derive_more::Display;
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};

use crate::entities::photo_metadata::Codec;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ImagingError {
    #[display("Could not decode image: {_0}")]
    Decode(String),

    #[display("Could not encode variant: {_0}")]
    Encode(String),
}

impl std::error::Error for ImagingError {}

/// An original decoded once and shared by every variant job.
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Detected source codec, when it is one we can write back.
    pub codec: Option<Codec>,
}

#[derive(Debug)]
pub struct EncodedVariant {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub codec: Codec,
}

pub fn codec_from_format(format: ImageFormat) -> Option<Codec> {
    match format {
        ImageFormat::WebP => Some(Codec::Webp),
        ImageFormat::Jpeg => Some(Codec::Jpeg),
        ImageFormat::Png => Some(Codec::Png),
        ImageFormat::Gif => Some(Codec::Gif),
        ImageFormat::Bmp => Some(Codec::Bmp),
        ImageFormat::Tiff => Some(Codec::Tiff),
        _ => None,
    }
}

fn image_format(codec: Codec) -> ImageFormat {
    match codec {
        Codec::Webp => ImageFormat::WebP,
        Codec::Jpeg => ImageFormat::Jpeg,
        Codec::Png => ImageFormat::Png,
        Codec::Gif => ImageFormat::Gif,
        Codec::Bmp => ImageFormat::Bmp,
        Codec::Tiff => ImageFormat::Tiff,
    }
}

pub fn decode(bytes: &[u8]) -> Result<DecodedImage, ImagingError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    let codec = reader.format().and_then(codec_from_format);
    let image = reader.decode().map_err(|e| ImagingError::Decode(e.to_string()))?;
    Ok(DecodedImage { image, codec })
}

/// Scales `(width, height)` so the longest edge fits `bound`, keeping the
/// aspect ratio. Images already within the bound are left untouched.
pub fn bounded_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= bound || longest == 0 {
        return (width, height);
    }
    let scale = bound as f64 / longest as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);
    if width >= height {
        (bound, scaled(height))
    } else {
        (scaled(width), bound)
    }
}

/// Codecs to try, in order: WebP when preferred, then the source codec, then
/// PNG as the last lossless resort.
pub fn codec_candidates(source: Option<Codec>, prefer_modern: bool) -> Vec<Codec> {
    let mut candidates = Vec::with_capacity(3);
    if prefer_modern {
        candidates.push(Codec::Webp);
    }
    if let Some(source) = source {
        if !candidates.contains(&source) {
            candidates.push(source);
        }
    }
    if !candidates.contains(&Codec::Png) {
        candidates.push(Codec::Png);
    }
    candidates
}

pub fn encode(image: &DynamicImage, codec: Codec) -> Result<Vec<u8>, ImagingError> {
    // JPEG has no alpha channel; everything else takes RGBA.
    let prepared = match codec {
        Codec::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    };
    let mut buffer = Cursor::new(Vec::new());
    prepared
        .write_to(&mut buffer, image_format(codec))
        .map_err(|e| ImagingError::Encode(format!("{:?}: {}", codec, e)))?;
    Ok(buffer.into_inner())
}

/// Resizes `image` to fit `bound` and encodes it with the first codec that
/// succeeds.
pub fn render_variant(
    image: &DynamicImage,
    bound: u32,
    source: Option<Codec>,
    prefer_modern: bool,
) -> Result<EncodedVariant, ImagingError> {
    let (width, height) = bounded_dimensions(image.width(), image.height(), bound);
    let resized = if (width, height) == (image.width(), image.height()) {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };

    let mut last_error = ImagingError::Encode("no codec available".into());
    for codec in codec_candidates(source, prefer_modern) {
        match encode(&resized, codec) {
            Ok(bytes) => {
                return Ok(EncodedVariant { bytes, width, height, codec });
            }
            Err(e) => {
                tracing::debug!(?codec, error = %e, "codec unavailable, falling back");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 160, 60]));
        encode(&DynamicImage::ImageRgb8(img), Codec::Png).unwrap()
    }

    #[test]
    fn longest_edge_is_bounded() {
        assert_eq!(bounded_dimensions(4000, 3000, 300), (300, 225));
        assert_eq!(bounded_dimensions(3000, 4000, 800), (600, 800));
        assert_eq!(bounded_dimensions(1000, 10, 300), (300, 3));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        assert_eq!(bounded_dimensions(640, 480, 1920), (640, 480));
    }

    #[test]
    fn candidates_respect_preference() {
        assert_eq!(codec_candidates(Some(Codec::Jpeg), true), vec![Codec::Webp, Codec::Jpeg, Codec::Png]);
        assert_eq!(codec_candidates(Some(Codec::Jpeg), false), vec![Codec::Jpeg, Codec::Png]);
        assert_eq!(codec_candidates(None, false), vec![Codec::Png]);
        assert_eq!(codec_candidates(Some(Codec::Webp), true), vec![Codec::Webp, Codec::Png]);
    }

    #[test]
    fn decode_detects_source_codec() {
        let decoded = decode(&png(20, 10)).unwrap();
        assert_eq!(decoded.codec, Some(Codec::Png));
        assert_eq!((decoded.image.width(), decoded.image.height()), (20, 10));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(matches!(decode(b"definitely not an image"), Err(ImagingError::Decode(_))));
    }

    #[test]
    fn render_resizes_and_encodes_webp() {
        let decoded = decode(&png(600, 400)).unwrap();
        let variant = render_variant(&decoded.image, 300, decoded.codec, true).unwrap();

        assert_eq!((variant.width, variant.height), (300, 200));
        assert_eq!(variant.codec, Codec::Webp);

        let round_trip = decode(&variant.bytes).unwrap();
        assert_eq!(round_trip.codec, Some(Codec::Webp));
        assert_eq!((round_trip.image.width(), round_trip.image.height()), (300, 200));
    }

    #[test]
    fn render_keeps_source_codec_without_preference() {
        let decoded = decode(&png(50, 50)).unwrap();
        let variant = render_variant(&decoded.image, 300, decoded.codec, false).unwrap();
        assert_eq!(variant.codec, Codec::Png);
        assert_eq!((variant.width, variant.height), (50, 50));
    }
}
