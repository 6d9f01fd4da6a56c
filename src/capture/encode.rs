use crate::errors::CaptureError;
use crate::types::{CapturedImage, Frame, QualityMetrics};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageReader, Rgb};
use std::io::Cursor;

/// Turns a frame snapshot into a [`CapturedImage`].
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame, quality: QualityMetrics) -> Result<CapturedImage, CaptureError>;
}

/// JPEG encoder, quality 85 unless configured otherwise.
#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(85)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &Frame, quality: QualityMetrics) -> Result<CapturedImage, CaptureError> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
                CaptureError::Encoding(format!(
                    "frame buffer of {} bytes does not match {}x{}",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            })?;

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(encoder)
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;

        log::debug!(
            "Encoded frame {} as {} byte JPEG (quality {})",
            frame.sequence,
            buffer.len(),
            self.quality
        );

        Ok(CapturedImage::new(
            Bytes::from(buffer),
            "image/jpeg",
            frame.width,
            frame.height,
            quality,
        ))
    }
}

/// Read back the pixel dimensions of an encoded image.
pub fn decode_dimensions(encoded: &[u8]) -> Result<(u32, u32), CaptureError> {
    let reader = ImageReader::new(Cursor::new(encoded))
        .with_guessed_format()
        .map_err(|e| CaptureError::Encoding(e.to_string()))?;
    reader
        .into_dimensions()
        .map_err(|e| CaptureError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_face_frame, FaceParams};

    #[test]
    fn test_jpeg_round_trip_dimensions() {
        let frame = synthetic_face_frame(320, 240, FaceParams::default());
        let image = JpegFrameEncoder::default()
            .encode(&frame, QualityMetrics::empty())
            .unwrap();

        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!((image.width(), image.height()), (320, 240));
        assert_eq!(&image.encoded_bytes()[..2], &[0xFF, 0xD8]);
        assert_eq!(decode_dimensions(image.encoded_bytes()).unwrap(), (320, 240));
    }

    #[test]
    fn test_malformed_frame_is_encoding_error() {
        let frame = Frame::new(vec![0; 5], 10, 10, "t".to_string());
        assert!(matches!(
            JpegFrameEncoder::default().encode(&frame, QualityMetrics::empty()),
            Err(CaptureError::Encoding(_))
        ));
    }
}
