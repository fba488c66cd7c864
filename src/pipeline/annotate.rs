use chrono::{DateTime, Utc};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;

use super::error::EmbedError;

/// Capture timestamps are rendered in US Eastern time.
const CAPTURE_TZ: chrono_tz::Tz = chrono_tz::America::New_York;

const JPEG_QUALITY: u8 = 95;

/// Re-encode an image with capture metadata embedded.
///
/// The image is decoded, flattened to RGB, and re-encoded as a quality-95
/// progressive JPEG with no chroma subsampling. The EXIF block then gets
/// `DateTimeOriginal` (the event time in US Eastern), the pixel dimensions
/// as X/Y resolution, and a fixed `Make` identifying where the photo came
/// from. Callers own the fallback on error.
pub fn annotate_image(bytes: &[u8], taken_at: DateTime<Utc>) -> Result<Vec<u8>, EmbedError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let jpeg_width =
        u16::try_from(width).map_err(|_| EmbedError::Oversize { width, height })?;
    let jpeg_height =
        u16::try_from(height).map_err(|_| EmbedError::Oversize { width, height })?;

    let mut jpeg = Vec::new();
    let mut encoder = Encoder::new(&mut jpeg, JPEG_QUALITY);
    encoder.set_progressive(true);
    encoder.set_sampling_factor(SamplingFactor::F_1_1);
    encoder
        .encode(rgb.as_raw(), jpeg_width, jpeg_height, ColorType::Rgb)
        .map_err(|e| EmbedError::Encode(e.to_string()))?;

    let taken_local = taken_at.with_timezone(&CAPTURE_TZ);
    let mut metadata = Metadata::new();
    metadata.set_tag(ExifTag::DateTimeOriginal(
        taken_local.format("%Y:%m:%d %H:%M:%S %Z").to_string(),
    ));
    metadata.set_tag(ExifTag::Make("Tadpoles".to_string()));
    metadata.set_tag(ExifTag::XResolution(vec![uR64 {
        nominator: width,
        denominator: 1,
    }]));
    metadata.set_tag(ExifTag::YResolution(vec![uR64 {
        nominator: height,
        denominator: 1,
    }]));
    metadata
        .write_to_vec(&mut jpeg, FileExtension::JPEG)
        .map_err(|e| EmbedError::Metadata(e.to_string()))?;

    Ok(jpeg)
}
