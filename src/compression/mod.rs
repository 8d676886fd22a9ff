//! Client-facing image compression: decode, fit inside pixel bounds, then
//! re-encode as JPEG at decreasing quality until a byte budget is met.

pub mod codec;
pub mod compressor;
pub mod dimensions;

pub use codec::{CodecError, DecodedImage, ImageCodec, JpegCodec};
pub use compressor::{
    CompressionError, CompressionOptions, CompressionResult, CompressionSummary, Compressor,
    MAX_ATTEMPTS, MIN_QUALITY, OUTPUT_CONTENT_TYPE, QUALITY_STEP,
};
pub use dimensions::{fit_within, Dimensions};
