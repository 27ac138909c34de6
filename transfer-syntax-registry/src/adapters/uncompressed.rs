//! Support for native and encapsulated uncompressed pixel data.

use fragstream_encoding::adapters::{
    decode_error, encode_error, DecodeResult, EncodeOptions, EncodeResult, PixelDataReader,
    PixelDataWriter,
};
use fragstream_encoding::descriptor::{FrameDescriptor, PlanarConfiguration};
use fragstream_encoding::ops::AttributeOp;
use fragstream_encoding::snafu::ensure;

/// Adapter for native pixel data and for
/// [Encapsulated Uncompressed Explicit VR Little Endian][1].
///
/// Frames are taken as they are,
/// except that color-by-plane frames are interleaved on decoding.
///
/// [1]: https://dicom.nema.org/medical/dicom/2023c/output/chtml/part05/sect_A.4.11.html
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UncompressedAdapter;

impl PixelDataReader for UncompressedAdapter {
    fn decode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        let frame_len = descriptor.frame_len();
        ensure!(
            data.len() >= frame_len,
            decode_error::FrameTooShortSnafu {
                actual: data.len(),
                expected: frame_len,
            }
        );
        let data = &data[..frame_len];

        let samples = descriptor.samples_per_pixel() as usize;
        if samples == 1 || descriptor.planar_configuration() == PlanarConfiguration::Standard {
            dst.extend_from_slice(data);
            return Ok(());
        }

        interleave_planes(data, samples, descriptor.bytes_per_sample(), dst);
        Ok(())
    }
}

impl PixelDataWriter for UncompressedAdapter {
    fn encode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        _options: &EncodeOptions,
        dst: &mut Vec<u8>,
    ) -> EncodeResult<Vec<AttributeOp>> {
        let frame_len = descriptor.frame_len();
        ensure!(
            data.len() >= frame_len,
            encode_error::FrameTooShortSnafu {
                actual: data.len(),
                expected: frame_len,
            }
        );
        dst.extend_from_slice(&data[..frame_len]);
        // the frame is kept in its native form,
        // so no attribute needs to change
        Ok(Vec::new())
    }
}

/// Turn color-by-plane samples into color-by-pixel samples.
fn interleave_planes(data: &[u8], samples: usize, bytes_per_sample: usize, dst: &mut Vec<u8>) {
    let plane_len = data.len() / samples;
    let pixels = plane_len / bytes_per_sample;
    dst.reserve(data.len());
    for pixel in 0..pixels {
        for plane in 0..samples {
            let start = plane * plane_len + pixel * bytes_per_sample;
            dst.extend_from_slice(&data[start..start + bytes_per_sample]);
        }
    }
}
