//! Image normalisation: raw image bytes → downscaled base64 JPEG.
//!
//! Photos of whiteboards and phone screenshots routinely arrive at 4000 px or
//! more. The model gains nothing from that resolution, and every extra pixel
//! costs request size, so images are capped at
//! [`crate::policy::MAX_IMAGE_EDGE`] on the longer edge, flattened to RGB and
//! re-encoded as JPEG. Transparency is dropped; for notes that is harmless.

use crate::policy::fit_within;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// MIME type of every normalised image.
pub const JPEG_MIME: &str = "image/jpeg";

/// One inline image ready for the model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    pub mime_type: String,
    /// Standard-alphabet base64 of the encoded bytes.
    pub data: String,
}

/// Downscale `img` so neither edge exceeds `max_edge`. Never upscales.
pub fn downscale(img: DynamicImage, max_edge: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let (nw, nh) = fit_within(w, h, max_edge);
    if (nw, nh) == (w, h) {
        return img;
    }
    debug!("Downscaling image {}x{} → {}x{}", w, h, nw, nh);
    img.resize_exact(nw, nh, FilterType::Lanczos3)
}

/// Encode `img` as an RGB JPEG at `quality` and wrap it as an [`ImagePart`].
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> ImageResult<ImagePart> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;

    let data = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", data.len());

    Ok(ImagePart {
        mime_type: JPEG_MIME.to_string(),
        data,
    })
}

/// Decode, downscale and re-encode image bytes in one step.
///
/// Decode and encode failures are reported separately so the caller can tell
/// a corrupt file from an encoder problem.
pub fn normalize_image(bytes: &[u8], max_edge: u32, quality: u8) -> Result<ImagePart, NormalizeError> {
    let img = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    let img = downscale(img, max_edge);
    encode_jpeg(&img, quality).map_err(NormalizeError::Encode)
}

/// Which half of [`normalize_image`] failed.
#[derive(Debug)]
pub enum NormalizeError {
    Decode(image::ImageError),
    Encode(image::ImageError),
}
