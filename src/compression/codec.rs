use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// A decoded raster image. Pixels are shared so every encode attempt can
/// render from the same source without copying it.
#[derive(Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<DynamicImage>,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: Arc::new(image),
        }
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Raster decode / lossy encode surface used by the compressor.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    async fn decode(&self, bytes: Bytes) -> Result<DecodedImage, CodecError>;

    /// Render `image` at `width`x`height` and encode it at `quality` (0.0..=1.0).
    async fn encode(
        &self,
        image: &DecodedImage,
        width: u32,
        height: u32,
        quality: f32,
    ) -> Result<Bytes, CodecError>;
}

/// JPEG codec backed by the `image` crate. CPU work runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

#[async_trait]
impl ImageCodec for JpegCodec {
    async fn decode(&self, bytes: Bytes) -> Result<DecodedImage, CodecError> {
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(DecodedImage::new(image))
    }

    async fn encode(
        &self,
        image: &DecodedImage,
        width: u32,
        height: u32,
        quality: f32,
    ) -> Result<Bytes, CodecError> {
        let source = Arc::clone(&image.pixels);
        let same_size = width == image.width && height == image.height;
        let jpeg_quality = quality_to_jpeg(quality);

        tokio::task::spawn_blocking(move || {
            // JPEG has no alpha; flattening to RGB matches what a canvas export does.
            let rgb = if same_size {
                source.to_rgb8()
            } else {
                source.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
            };

            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality)
                .encode_image(&rgb)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            Ok(Bytes::from(out))
        })
        .await
        .map_err(|e| CodecError::Encode(e.to_string()))?
    }
}

/// Map a 0.0..=1.0 quality onto libjpeg's 1..=100 scale.
fn quality_to_jpeg(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
