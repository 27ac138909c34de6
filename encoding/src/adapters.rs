//! Core module for building pixel data adapters.
//!
//! Transfer syntaxes which define a pixel data encoding
//! provide implementations of [`PixelDataReader`] and [`PixelDataWriter`]
//! to decode and encode imaging data one frame at a time.
//! Frame bytes are obtained through a
//! [`FrameExtractor`](crate::FrameExtractor),
//! and interpreted according to a [`FrameDescriptor`].

use crate::descriptor::{FrameDescriptor, PhotometricInterpretation, PlanarConfiguration};
use crate::ops::AttributeOp;
use snafu::Snafu;

/// The possible error conditions when decoding (reading) pixel data.
///
/// Users of this type are free to handle errors based on their variant,
/// but should not make decisions based on the display message,
/// since that is not considered part of the API
/// and may change on any new release.
///
/// When no suitable variant is available,
/// the [`Custom`](DecodeError::Custom) variant may be used.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum DecodeError {
    /// A custom error occurred when decoding,
    /// reported as a dynamic error value with a message.
    ///
    /// The [`whatever!`](snafu::whatever) macro can be used
    /// to easily create an error of this kind.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The frame data is shorter than the image geometry requires.
    #[snafu(display("Frame data too short: {} bytes, expected {}", actual, expected))]
    FrameTooShort { actual: usize, expected: usize },

    /// The image geometry is not supported by this decoder.
    #[snafu(display("Unsupported image: {}", reason))]
    Unsupported { reason: String },
}

/// The possible error conditions when encoding (writing) pixel data.
///
/// Users of this type are free to handle errors based on their variant,
/// but should not make decisions based on the display message,
/// since that is not considered part of the API
/// and may change on any new release.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum EncodeError {
    /// A custom error when encoding fails.
    /// Read the `message` and the underlying `source`
    /// for more details.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The encoding cannot represent an image of this geometry
    /// (bit depth, number of samples, ...).
    ///
    /// Callers may choose another encoding when this error is raised.
    #[snafu(display("Image cannot be represented in this encoding: {}", reason))]
    Unrepresentable { reason: String },

    /// The frame data is shorter than the image geometry requires.
    #[snafu(display("Frame data too short: {} bytes, expected {}", actual, expected))]
    FrameTooShort { actual: usize, expected: usize },
}

/// The result of decoding (reading) pixel data
pub type DecodeResult<T, E = DecodeError> = Result<T, E>;

/// The result of encoding (writing) pixel data
pub type EncodeResult<T, E = EncodeError> = Result<T, E>;

/// Custom options when encoding pixel data.
#[derive(Debug, Default, Clone, PartialEq)]
#[non_exhaustive]
pub struct EncodeOptions {
    /// The quality of the output image as a number between 0 and 100,
    /// where 100 is the best quality that the encapsulated form can achieve
    /// and smaller values represent smaller data size
    /// with an increasingly higher error.
    /// It is ignored if the transfer syntax only supports lossless compression.
    ///
    /// If this option is not specified,
    /// the output quality is decided automatically by the underlying adapter.
    pub quality: Option<u8>,

    /// The desired ratio between the native frame length
    /// and the encoded frame length.
    /// Lossy encoders may search for a quality
    /// which approaches this ratio.
    /// When set, it takes precedence over `quality`.
    pub compression_ratio: Option<f32>,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality.min(100));
        self
    }

    pub fn with_compression_ratio(mut self, ratio: f32) -> Self {
        self.compression_ratio = Some(ratio);
        self
    }
}

/// Trait object responsible for decoding
/// pixel data based on the transfer syntax.
pub trait PixelDataReader {
    /// Decode the bytes of a single frame
    /// into native pixel data in little endian,
    /// appending these bytes to the given vector `dst`.
    ///
    /// The output is a sequence of native pixel values
    /// which follow the image properties of the given descriptor
    /// _save for the photometric interpretation and planar configuration_,
    /// as reported by [`decoded_descriptor`](PixelDataReader::decoded_descriptor).
    fn decode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()>;

    /// Describe the frames produced by this reader.
    ///
    /// By default, samples are pixel-interleaved
    /// and the photometric interpretation is unchanged.
    fn decoded_descriptor(&self, descriptor: &FrameDescriptor) -> FrameDescriptor {
        descriptor
            .clone()
            .with_planar_configuration(PlanarConfiguration::Standard)
    }
}

/// Trait object responsible for encoding
/// pixel data based on a certain transfer syntax.
pub trait PixelDataWriter {
    /// Encode a single native frame (pixel-interleaved, little endian)
    /// into the format supported by this adapter,
    /// appending the bytes of one fragment to `dst`.
    ///
    /// When the operation is successful,
    /// a listing of attribute changes is returned,
    /// comprising the sequence of operations that the DICOM object
    /// should consider upon assuming the new encoding.
    ///
    /// If the image cannot be represented,
    /// an [`Unrepresentable`](EncodeError::Unrepresentable) error is returned
    /// before anything is written.
    fn encode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        options: &EncodeOptions,
        dst: &mut Vec<u8>,
    ) -> EncodeResult<Vec<AttributeOp>>;
}

/// Whether the given photometric interpretation
/// is one that decoders turn into `RGB`.
pub fn decodes_to_rgb(pi: &PhotometricInterpretation) -> bool {
    matches!(
        pi,
        PhotometricInterpretation::YbrFull
            | PhotometricInterpretation::YbrFull422
            | PhotometricInterpretation::YbrPartial420
            | PhotometricInterpretation::YbrIct
            | PhotometricInterpretation::YbrRct
    )
}
