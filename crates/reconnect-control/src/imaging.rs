// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Encoding of passive image frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

/// Why a frame could not be encoded.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// The captured frame has no pixels.
    #[error("captured frame is empty")]
    EmptyFrame,
    /// The JPEG encoder failed.
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// How passive frames are shrunk and compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoding {
    /// Maximum width after downscaling.
    pub max_width: u32,
    /// Maximum height after downscaling.
    pub max_height: u32,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for FrameEncoding {
    fn default() -> Self {
        Self {
            max_width: 320,
            max_height: 240,
            jpeg_quality: 50,
        }
    }
}

/// Shrinks `frame` to fit the bounding box, keeping its aspect ratio.
/// Frames that already fit are returned unchanged.
pub fn downscale(frame: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if frame.width() <= max_width && frame.height() <= max_height {
        return frame;
    }
    frame.resize(max_width, max_height, FilterType::Triangle)
}

/// Downscales, JPEG-encodes and base64-encodes a frame.
pub fn encode_frame(frame: DynamicImage, encoding: &FrameEncoding) -> Result<String, ImagingError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ImagingError::EmptyFrame);
    }
    let scaled = downscale(frame, encoding.max_width, encoding.max_height);
    // JPEG has no alpha channel.
    let rgb = scaled.to_rgb8();

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, encoding.jpeg_quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    log::trace!("Encoded {}x{} frame into {} bytes.", rgb.width(), rgb.height(), bytes.len());
    Ok(STANDARD.encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_downscale_keeps_aspect() {
        let frame = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let scaled = downscale(frame, 320, 240);
        assert_eq!((scaled.width(), scaled.height()), (320, 240));

        let wide = DynamicImage::ImageRgb8(RgbImage::new(1280, 480));
        let scaled = downscale(wide, 320, 240);
        assert_eq!(scaled.width(), 320);
        assert_eq!(scaled.height(), 120);

        let small = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let kept = downscale(small, 320, 240);
        assert_eq!((kept.width(), kept.height()), (100, 50));
    }

    #[test]
    fn test_encoded_frame_decodes_as_jpeg() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([200, 40, 40])));
        let data = encode_frame(frame, &FrameEncoding::default()).unwrap();

        let bytes = STANDARD.decode(data).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            encode_frame(frame, &FrameEncoding::default()),
            Err(ImagingError::EmptyFrame)
        ));
    }
}
