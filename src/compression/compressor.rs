use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::codec::{CodecError, ImageCodec, JpegCodec};
use super::dimensions::{fit_within, Dimensions};

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_QUALITY: f32 = 0.8;
pub const DEFAULT_TARGET_SIZE: usize = 1024 * 1024;
pub const MIN_QUALITY: f32 = 0.1;
pub const QUALITY_STEP: f32 = 0.1;
pub const MAX_ATTEMPTS: usize = 10;

/// Content type of everything the compressor produces.
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("no image provided")]
    InvalidInput,
    #[error("failed to load image: {0}")]
    Decode(String),
    #[error("compression failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub initial_quality: f32,
    pub target_size_bytes: usize,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            initial_quality: DEFAULT_QUALITY,
            target_size_bytes: DEFAULT_TARGET_SIZE,
        }
    }
}

impl CompressionOptions {
    /// Zero bounds fall back to the defaults and quality is clamped to
    /// `[MIN_QUALITY, 1.0]` (NaN counts as the default quality).
    pub fn normalized(self) -> Self {
        let initial_quality = if self.initial_quality.is_nan() {
            DEFAULT_QUALITY
        } else {
            self.initial_quality.clamp(MIN_QUALITY, 1.0)
        };
        Self {
            max_width: if self.max_width == 0 { DEFAULT_MAX_WIDTH } else { self.max_width },
            max_height: if self.max_height == 0 { DEFAULT_MAX_HEIGHT } else { self.max_height },
            initial_quality,
            target_size_bytes: self.target_size_bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub encoded: Bytes,
    pub original_size: usize,
    pub compressed_size: usize,
    /// `(original - compressed) / original * 100`; negative when re-encoding grew the file.
    pub compression_ratio: f64,
    pub quality: f32,
    pub dimensions: Dimensions,
    /// Encode passes performed, including the forced final pass.
    pub attempts: usize,
}

impl CompressionResult {
    pub fn summary(&self) -> CompressionSummary {
        CompressionSummary {
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            compression_ratio: self.compression_ratio,
            quality: self.quality,
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }
}

/// Byte-free view of a [`CompressionResult`] for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    pub quality: f32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct Compressor {
    codec: Arc<dyn ImageCodec>,
    defaults: CompressionOptions,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(Arc::new(JpegCodec), CompressionOptions::default())
    }
}

impl Compressor {
    pub fn new(codec: Arc<dyn ImageCodec>, defaults: CompressionOptions) -> Self {
        Self {
            codec,
            defaults: defaults.normalized(),
        }
    }

    pub fn defaults(&self) -> CompressionOptions {
        self.defaults
    }

    /// Re-encode `source` as JPEG, stepping quality down until the output
    /// fits `target_size_bytes` or the minimum quality is reached.
    ///
    /// Small inputs are re-encoded too; the output is always JPEG even when
    /// that makes it marginally larger than the source.
    #[instrument(skip(self, source), fields(source_len = source.as_ref().map(|b| b.len())))]
    pub async fn compress(
        &self,
        source: Option<Bytes>,
        options: CompressionOptions,
    ) -> Result<CompressionResult, CompressionError> {
        let source = match source {
            Some(b) if !b.is_empty() => b,
            _ => return Err(CompressionError::InvalidInput),
        };
        let options = options.normalized();
        let original_size = source.len();

        let image = self.codec.decode(source).await.map_err(|e| match e {
            CodecError::Decode(msg) | CodecError::Encode(msg) => CompressionError::Decode(msg),
        })?;
        let dims = fit_within(image.width, image.height, options.max_width, options.max_height);
        debug!(
            src_width = image.width,
            src_height = image.height,
            width = dims.width,
            height = dims.height,
            "image decoded"
        );

        let mut quality = options.initial_quality;
        let mut attempts = 0;
        let mut accepted = None;

        while attempts < MAX_ATTEMPTS {
            let encoded = self.encode(&image, dims, quality).await?;
            attempts += 1;
            debug!(attempt = attempts, quality, size = encoded.len(), "encode attempt");

            if encoded.len() <= options.target_size_bytes || quality <= MIN_QUALITY {
                accepted = Some(encoded);
                break;
            }
            quality = quality_for_attempt(options.initial_quality, attempts);
        }

        let encoded = match accepted {
            Some(encoded) => encoded,
            None => {
                warn!(attempts, "target size not reached, forcing minimum quality");
                quality = MIN_QUALITY;
                attempts += 1;
                self.encode(&image, dims, MIN_QUALITY).await?
            }
        };

        let compressed_size = encoded.len();
        let compression_ratio =
            (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0;
        info!(
            original_size,
            compressed_size,
            ratio = compression_ratio,
            quality,
            attempts,
            "image compressed"
        );

        Ok(CompressionResult {
            encoded,
            original_size,
            compressed_size,
            compression_ratio,
            quality,
            dimensions: dims,
            attempts,
        })
    }

    /// Like [`Compressor::compress`] with the configured defaults, returning only the bytes.
    pub async fn compress_bytes(&self, source: Bytes) -> Result<Bytes, CompressionError> {
        Ok(self.compress(Some(source), self.defaults).await?.encoded)
    }

    async fn encode(
        &self,
        image: &super::codec::DecodedImage,
        dims: Dimensions,
        quality: f32,
    ) -> Result<Bytes, CompressionError> {
        self.codec
            .encode(image, dims.width, dims.height, quality)
            .await
            .map_err(|e| CompressionError::Encoding(e.to_string()))
    }
}

/// Quality of the encode pass after `steps` reductions from `initial`.
/// Values within float noise of the floor snap to exactly `MIN_QUALITY`.
fn quality_for_attempt(initial: f32, steps: usize) -> f32 {
    let quality = initial - steps as f32 * QUALITY_STEP;
    if quality <= MIN_QUALITY + f32::EPSILON {
        MIN_QUALITY
    } else {
        quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::codec::tests::{noisy_image, png_bytes};
    use crate::compression::codec::DecodedImage;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::Mutex;

    /// Codec whose encoded size is a function of quality, recording every call.
    struct ScriptedCodec {
        width: u32,
        height: u32,
        size_for: fn(f32) -> usize,
        fail_on_attempt: Option<usize>,
        calls: Mutex<Vec<(u32, u32, f32)>>,
    }

    impl ScriptedCodec {
        fn new(width: u32, height: u32, size_for: fn(f32) -> usize) -> Self {
            Self {
                width,
                height,
                size_for,
                fail_on_attempt: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn qualities(&self) -> Vec<f32> {
            self.calls.lock().unwrap().iter().map(|c| c.2).collect()
        }
    }

    #[async_trait]
    impl ImageCodec for ScriptedCodec {
        async fn decode(&self, _bytes: Bytes) -> Result<DecodedImage, CodecError> {
            Ok(DecodedImage {
                width: self.width,
                height: self.height,
                pixels: Arc::new(DynamicImage::new_rgb8(1, 1)),
            })
        }

        async fn encode(
            &self,
            _image: &DecodedImage,
            width: u32,
            height: u32,
            quality: f32,
        ) -> Result<Bytes, CodecError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((width, height, quality));
            if Some(calls.len()) == self.fail_on_attempt {
                return Err(CodecError::Encode("backend exploded".into()));
            }
            Ok(Bytes::from(vec![0u8; (self.size_for)(quality)]))
        }
    }

    fn assert_close(got: &[f32], want: &[f32]) {
        assert_eq!(got.len(), want.len(), "{got:?} vs {want:?}");
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-5, "{got:?} vs {want:?}");
        }
    }

    fn compressor(codec: Arc<ScriptedCodec>) -> Compressor {
        Compressor::new(codec, CompressionOptions::default())
    }

    fn source(len: usize) -> Option<Bytes> {
        Some(Bytes::from(vec![1u8; len]))
    }

    #[tokio::test]
    async fn missing_or_empty_input_is_rejected_before_decode() {
        let codec = Arc::new(ScriptedCodec::new(10, 10, |_| 1));
        let c = compressor(codec.clone());

        let err = c.compress(None, CompressionOptions::default()).await.unwrap_err();
        assert!(matches!(err, CompressionError::InvalidInput));
        let err = c
            .compress(Some(Bytes::new()), CompressionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::InvalidInput));
        assert!(codec.qualities().is_empty());
    }

    #[tokio::test]
    async fn garbage_bytes_fail_with_decode_error() {
        let c = Compressor::default();
        let err = c
            .compress(source(64), CompressionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::Decode(_)));
    }

    #[tokio::test]
    async fn small_input_still_gets_one_encode_pass() {
        let codec = Arc::new(ScriptedCodec::new(100, 100, |_| 500));
        let res = compressor(codec.clone())
            .compress(source(100), CompressionOptions::default())
            .await
            .unwrap();

        assert_eq!(codec.qualities(), vec![0.8]);
        assert_eq!(res.attempts, 1);
        assert_eq!(res.quality, 0.8);
        // encoding enlarged the input: ratio goes negative and is not clamped
        assert_eq!(res.compressed_size, 500);
        assert!((res.compression_ratio - (-400.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn steps_quality_down_until_target_met() {
        // size shrinks with quality: 0.8 -> 4000, 0.5 -> 2500, 0.4 -> 2000
        let codec = Arc::new(ScriptedCodec::new(800, 600, |q| (q * 5000.0).round() as usize));
        let opts = CompressionOptions {
            target_size_bytes: 2000,
            ..CompressionOptions::default()
        };
        let res = compressor(codec.clone())
            .compress(source(10_000), opts)
            .await
            .unwrap();

        assert_close(&codec.qualities(), &[0.8, 0.7, 0.6, 0.5, 0.4]);
        assert!((res.quality - 0.4).abs() < 1e-6);
        assert_eq!(res.compressed_size, 2000);
        assert!((res.compression_ratio - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn accepts_minimum_quality_even_over_target() {
        let codec = Arc::new(ScriptedCodec::new(800, 600, |_| 10_000));
        let opts = CompressionOptions {
            target_size_bytes: 10,
            ..CompressionOptions::default()
        };
        let res = compressor(codec.clone()).compress(source(5000), opts).await.unwrap();

        let qualities = codec.qualities();
        assert_close(&qualities, &[0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
        assert_eq!(res.quality, MIN_QUALITY);
        assert_eq!(res.attempts, 8);
    }

    #[tokio::test]
    async fn qualities_are_monotonic_and_bounded() {
        let codec = Arc::new(ScriptedCodec::new(800, 600, |_| 1_000));
        let opts = CompressionOptions {
            initial_quality: 1.0,
            target_size_bytes: 0,
            ..CompressionOptions::default()
        };
        let res = compressor(codec.clone()).compress(source(10), opts).await.unwrap();

        let qualities = codec.qualities();
        assert!(qualities.len() <= MAX_ATTEMPTS + 1);
        assert!(qualities.windows(2).all(|w| w[1] < w[0]));
        assert!(qualities.iter().all(|q| (MIN_QUALITY..=1.0).contains(q)));
        assert_eq!(res.quality, MIN_QUALITY);
        assert_eq!(res.attempts, qualities.len());
    }

    #[tokio::test]
    async fn initial_quality_is_clamped() {
        let codec = Arc::new(ScriptedCodec::new(10, 10, |_| 1));
        let opts = CompressionOptions {
            initial_quality: 7.5,
            ..CompressionOptions::default()
        };
        compressor(codec.clone()).compress(source(10), opts).await.unwrap();
        assert_eq!(codec.qualities(), vec![1.0]);

        let codec = Arc::new(ScriptedCodec::new(10, 10, |_| 1));
        let opts = CompressionOptions {
            initial_quality: 0.01,
            ..CompressionOptions::default()
        };
        compressor(codec.clone()).compress(source(10), opts).await.unwrap();
        assert_eq!(codec.qualities(), vec![MIN_QUALITY]);
    }

    #[tokio::test]
    async fn encoder_failure_aborts_immediately() {
        let mut codec = ScriptedCodec::new(800, 600, |_| 10_000);
        codec.fail_on_attempt = Some(3);
        let codec = Arc::new(codec);
        let opts = CompressionOptions {
            target_size_bytes: 10,
            ..CompressionOptions::default()
        };
        let err = compressor(codec.clone()).compress(source(10), opts).await.unwrap_err();

        assert!(matches!(err, CompressionError::Encoding(_)));
        assert_eq!(codec.qualities().len(), 3);
    }

    #[tokio::test]
    async fn oversized_source_is_rendered_downscaled() {
        let codec = Arc::new(ScriptedCodec::new(4032, 3024, |_| 1));
        let res = compressor(codec.clone())
            .compress(source(10), CompressionOptions::default())
            .await
            .unwrap();

        let calls = codec.calls.lock().unwrap().clone();
        assert_eq!((calls[0].0, calls[0].1), (1440, 1080));
        assert_eq!(res.dimensions, Dimensions { width: 1440, height: 1080 });
    }

    #[tokio::test]
    async fn real_jpeg_path_shrinks_a_noisy_png() {
        let png = png_bytes(&noisy_image(320, 240));
        let opts = CompressionOptions {
            max_width: 160,
            max_height: 160,
            target_size_bytes: 8 * 1024,
            ..CompressionOptions::default()
        };
        let res = Compressor::default().compress(Some(png.clone()), opts).await.unwrap();

        assert_eq!(res.original_size, png.len());
        assert_eq!(res.dimensions, Dimensions { width: 160, height: 120 });
        assert!(res.quality >= MIN_QUALITY && res.quality <= 0.8);
        assert!(res.attempts <= MAX_ATTEMPTS + 1);
        let decoded = image::load_from_memory(&res.encoded).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 120));
    }

    #[tokio::test]
    async fn compress_bytes_returns_jpeg() {
        let png = png_bytes(&noisy_image(20, 20));
        let out = Compressor::default().compress_bytes(png).await.unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn quality_steps_by_exactly_one_tenth() {
        let walk = |initial: f32| -> Vec<f32> {
            (0..MAX_ATTEMPTS)
                .map(|n| quality_for_attempt(initial, n))
                .take_while(|q| *q > MIN_QUALITY)
                .chain(std::iter::once(MIN_QUALITY))
                .collect()
        };
        assert_close(&walk(0.8), &[0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
        assert_close(
            &walk(0.85),
            &[0.85, 0.75, 0.65, 0.55, 0.45, 0.35, 0.25, 0.15, 0.1],
        );
        assert_close(&walk(0.84)[..2], &[0.84, 0.74]);
        assert_eq!(quality_for_attempt(0.8, 7), MIN_QUALITY);
        assert_eq!(quality_for_attempt(0.15, 1), MIN_QUALITY);
    }

    #[tokio::test]
    async fn off_grid_initial_quality_keeps_its_offset() {
        let codec = Arc::new(ScriptedCodec::new(800, 600, |_| 10_000));
        let opts = CompressionOptions {
            initial_quality: 0.85,
            target_size_bytes: 10,
            ..CompressionOptions::default()
        };
        let res = compressor(codec.clone()).compress(source(10), opts).await.unwrap();

        assert_close(
            &codec.qualities(),
            &[0.85, 0.75, 0.65, 0.55, 0.45, 0.35, 0.25, 0.15, 0.1],
        );
        assert_eq!(res.quality, MIN_QUALITY);
        assert_eq!(res.attempts, 9);
    }
}
