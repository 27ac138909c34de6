//! Support for JPEG image decoding and encoding.
use fragstream_encoding::adapters::{
    decode_error, decodes_to_rgb, encode_error, DecodeResult, EncodeOptions, EncodeResult,
    PixelDataReader, PixelDataWriter,
};
use fragstream_encoding::descriptor::{
    FrameDescriptor, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};
use fragstream_encoding::ops::{AttributeAction, AttributeOp};
use fragstream_encoding::snafu::prelude::*;
use fragstream_encoding::tags;
use fragstream_encoding::PrimitiveValue;
use jpeg_decoder::{Decoder, PixelFormat};
use jpeg_encoder::ColorType;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Quality used when the encode options do not specify one.
const DEFAULT_QUALITY: u8 = 85;

/// Pixel data adapter for JPEG-based transfer syntaxes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JpegAdapter;

impl PixelDataReader for JpegAdapter {
    /// Decode a single JPEG frame.
    fn decode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        let bits_allocated = descriptor.bits_allocated();
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::UnsupportedSnafu {
                reason: format!("BitsAllocated {} in JPEG", bits_allocated),
            }
        );

        let mut decoder = Decoder::new(Cursor::new(data));
        let decoded = decoder
            .decode()
            .map_err(|e| Box::new(e) as Box<_>)
            .whatever_context("JPEG decoder failure")?;
        let info = decoder
            .info()
            .whatever_context("JPEG decoder did not report image information")?;

        ensure_whatever!(
            info.width == descriptor.columns() && info.height == descriptor.rows(),
            "JPEG frame is {}x{}, expected {}x{}",
            info.width,
            info.height,
            descriptor.columns(),
            descriptor.rows()
        );

        let base_offset = dst.len();
        match (info.pixel_format, bits_allocated) {
            (PixelFormat::L8, 8) | (PixelFormat::RGB24, 8) => dst.extend_from_slice(&decoded),
            (PixelFormat::L8, 16) | (PixelFormat::RGB24, 16) => {
                // widen to the allocated sample size
                dst.extend(decoded.iter().flat_map(|&b| [b, 0]));
            }
            (PixelFormat::L16, 16) => {
                // the decoder yields big endian samples
                dst.extend(decoded.chunks_exact(2).flat_map(|c| [c[1], c[0]]));
            }
            (format, _) => {
                return decode_error::UnsupportedSnafu {
                    reason: format!(
                        "JPEG pixel format {:?} with BitsAllocated {}",
                        format, bits_allocated
                    ),
                }
                .fail();
            }
        }

        let expected = self.decoded_descriptor(descriptor).frame_len();
        let actual = dst.len() - base_offset;
        if actual != expected {
            dst.truncate(base_offset);
            whatever!(
                "JPEG frame decoded to {} bytes, expected {}",
                actual,
                expected
            );
        }
        Ok(())
    }

    /// JPEG decoding turns luminance-chrominance samples into RGB.
    fn decoded_descriptor(&self, descriptor: &FrameDescriptor) -> FrameDescriptor {
        let decoded = descriptor
            .clone()
            .with_planar_configuration(PlanarConfiguration::Standard);
        if decodes_to_rgb(descriptor.photometric_interpretation()) {
            decoded.with_photometric_interpretation(PhotometricInterpretation::Rgb)
        } else {
            decoded
        }
    }
}

impl PixelDataWriter for JpegAdapter {
    fn encode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        options: &EncodeOptions,
        dst: &mut Vec<u8>,
    ) -> EncodeResult<Vec<AttributeOp>> {
        let samples_per_pixel = descriptor.samples_per_pixel();
        let color_type = match samples_per_pixel {
            1 => ColorType::Luma,
            3 => ColorType::Rgb,
            _ => {
                return encode_error::UnrepresentableSnafu {
                    reason: format!("{} samples per pixel in JPEG", samples_per_pixel),
                }
                .fail()
            }
        };
        let bits_allocated = descriptor.bits_allocated();
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            encode_error::UnrepresentableSnafu {
                reason: format!("BitsAllocated {} in JPEG baseline", bits_allocated),
            }
        );
        ensure!(
            descriptor.pixel_representation() == PixelRepresentation::Unsigned,
            encode_error::UnrepresentableSnafu {
                reason: "signed samples in JPEG baseline",
            }
        );

        let frame_size = descriptor.frame_len();
        ensure!(
            data.len() >= frame_size,
            encode_error::FrameTooShortSnafu {
                actual: data.len(),
                expected: frame_size,
            }
        );
        let frame_data = narrow_8bit(
            &data[..frame_size],
            bits_allocated,
            descriptor.bits_stored(),
        );

        let cols = descriptor.columns();
        let rows = descriptor.rows();
        let encoded = match options.compression_ratio {
            Some(ratio) => encode_for_ratio(&frame_data, cols, rows, color_type, frame_size, ratio)?,
            None => encode_jpeg(
                &frame_data,
                cols,
                rows,
                color_type,
                options.quality.unwrap_or(DEFAULT_QUALITY),
            )?,
        };

        let compression_ratio = frame_size as f64 / encoded.len() as f64;
        let compression_ratio = format!("{:.6}", compression_ratio);
        dst.extend_from_slice(&encoded);

        // provide attribute changes
        let mut changes = vec![
            AttributeOp::new(
                tags::BITS_ALLOCATED,
                AttributeAction::Set(PrimitiveValue::from(8_u16)),
            ),
            AttributeOp::new(
                tags::BITS_STORED,
                AttributeAction::Set(PrimitiveValue::from(8_u16)),
            ),
            AttributeOp::new(
                tags::HIGH_BIT,
                AttributeAction::Set(PrimitiveValue::from(7_u16)),
            ),
            AttributeOp::new(
                tags::LOSSY_IMAGE_COMPRESSION,
                AttributeAction::SetStr("01".into()),
            ),
            AttributeOp::new(
                tags::LOSSY_IMAGE_COMPRESSION_RATIO,
                AttributeAction::PushStr(compression_ratio.into()),
            ),
            AttributeOp::new(
                tags::LOSSY_IMAGE_COMPRESSION_METHOD,
                AttributeAction::PushStr("ISO_10918_1".into()),
            ),
        ];

        let pmi = descriptor.photometric_interpretation();
        if samples_per_pixel == 1 {
            // set Photometric Interpretation to Monochrome2
            // if it was neither of the expected monochromes
            if !pmi.is_monochrome() {
                changes.push(AttributeOp::new(
                    tags::PHOTOMETRIC_INTERPRETATION,
                    AttributeAction::SetStr("MONOCHROME2".into()),
                ));
            }
        } else {
            if *pmi != PhotometricInterpretation::Rgb {
                changes.push(AttributeOp::new(
                    tags::PHOTOMETRIC_INTERPRETATION,
                    AttributeAction::SetStr("RGB".into()),
                ));
            }
            changes.push(AttributeOp::new(
                tags::PLANAR_CONFIGURATION,
                AttributeAction::Set(PrimitiveValue::from(0_u16)),
            ));
        }

        Ok(changes)
    }
}

fn encode_jpeg(
    data: &[u8],
    cols: u16,
    rows: u16,
    color_type: ColorType,
    quality: u8,
) -> EncodeResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.clamp(1, 100));
    encoder.set_progressive(false);
    encoder
        .encode(data, cols, rows, color_type)
        .whatever_context("JPEG encoding failed")?;
    Ok(out)
}

/// Find the highest quality whose output meets the target compression ratio.
///
/// If no quality meets it, the output at the lowest quality is used.
fn encode_for_ratio(
    data: &[u8],
    cols: u16,
    rows: u16,
    color_type: ColorType,
    frame_size: usize,
    target: f32,
) -> EncodeResult<Vec<u8>> {
    let (mut lo, mut hi) = (1_u8, 100_u8);
    let mut best: Option<(u8, Vec<u8>)> = None;
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let encoded = encode_jpeg(data, cols, rows, color_type, mid)?;
        let ratio = frame_size as f64 / encoded.len() as f64;
        if ratio >= f64::from(target) {
            best = Some((mid, encoded));
            lo = mid + 1;
        } else if mid == 1 {
            break;
        } else {
            hi = mid - 1;
        }
    }
    match best {
        Some((quality, encoded)) => {
            debug!("JPEG quality {} meets compression ratio {}", quality, target);
            Ok(encoded)
        }
        None => {
            debug!("Compression ratio {} not reachable, using quality 1", target);
            encode_jpeg(data, cols, rows, color_type, 1)
        }
    }
}

/// reduce data precision to 8 bits if necessary
/// data loss is possible
fn narrow_8bit(frame_data: &[u8], bits_allocated: u16, bits_stored: u16) -> Cow<[u8]> {
    if bits_allocated == 8 {
        return Cow::Borrowed(frame_data);
    }
    let shift = bits_stored.clamp(8, 16) - 8;
    Cow::Owned(
        frame_data
            .chunks_exact(2)
            .map(|chunk| (u16::from_le_bytes([chunk[0], chunk[1]]) >> shift) as u8)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragstream_encoding::adapters::EncodeError;
    use rstest::rstest;

    fn gradient(cols: u16, rows: u16) -> Vec<u8> {
        (0..rows as usize)
            .flat_map(|y| (0..cols as usize).map(move |x| ((x + y) * 4) as u8))
            .collect()
    }

    #[test]
    fn encode_and_decode_gray() {
        let desc = FrameDescriptor::new(16, 16, 1, 8);
        let frame = gradient(16, 16);
        let mut encoded = Vec::new();
        let ops = JpegAdapter
            .encode_frame(
                &desc,
                &frame,
                &EncodeOptions::new().with_quality(95),
                &mut encoded,
            )
            .unwrap();
        assert_eq!(&encoded[0..2], &[0xFF, 0xD8]);
        assert!(ops
            .iter()
            .any(|op| op.tag == tags::LOSSY_IMAGE_COMPRESSION));
        // already MONOCHROME2
        assert!(!ops
            .iter()
            .any(|op| op.tag == tags::PHOTOMETRIC_INTERPRETATION));

        let mut decoded = Vec::new();
        JpegAdapter
            .decode_frame(&desc, &encoded, &mut decoded)
            .unwrap();
        assert_eq!(decoded.len(), frame.len());
        let max_error = decoded
            .iter()
            .zip(&frame)
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .max()
            .unwrap();
        assert!(max_error < 24, "error too high: {}", max_error);
    }

    #[test]
    fn narrow_16bit_samples() {
        let data = [0xFF, 0x0F, 0x00, 0x08];
        assert_eq!(&*narrow_8bit(&data, 16, 12), &[0xFF, 0x80]);
        assert_eq!(&*narrow_8bit(&[1, 2], 8, 8), &[1, 2]);
    }

    #[test]
    fn encode_16bit_sets_8bit_attributes() {
        let desc = FrameDescriptor::new(8, 8, 1, 16).with_bits_stored(12);
        let frame: Vec<u8> = (0..64_u16).flat_map(|v| (v * 64).to_le_bytes()).collect();
        let mut encoded = Vec::new();
        let ops = JpegAdapter
            .encode_frame(&desc, &frame, &EncodeOptions::default(), &mut encoded)
            .unwrap();
        let bits_allocated = ops
            .iter()
            .find(|op| op.tag == tags::BITS_ALLOCATED)
            .unwrap();
        assert_eq!(
            bits_allocated.action,
            AttributeAction::Set(PrimitiveValue::from(8_u16))
        );
    }

    #[rstest]
    #[case(FrameDescriptor::new(4, 4, 2, 8))]
    #[case(FrameDescriptor::new(4, 4, 1, 32))]
    #[case(FrameDescriptor::new(4, 4, 1, 16).with_pixel_representation(PixelRepresentation::Signed))]
    fn unrepresentable_frames(#[case] desc: FrameDescriptor) {
        let frame = vec![0; desc.frame_len()];
        let mut encoded = Vec::new();
        let err = JpegAdapter
            .encode_frame(&desc, &frame, &EncodeOptions::default(), &mut encoded)
            .unwrap_err();
        assert!(matches!(err, EncodeError::Unrepresentable { .. }));
        assert!(encoded.is_empty());
    }

    #[test]
    fn encode_for_compression_ratio() {
        let desc = FrameDescriptor::new(64, 64, 1, 8);
        let frame = gradient(64, 64);
        let mut encoded = Vec::new();
        JpegAdapter
            .encode_frame(
                &desc,
                &frame,
                &EncodeOptions::new().with_compression_ratio(2.),
                &mut encoded,
            )
            .unwrap();
        assert!(!encoded.is_empty());

        let mut decoded = Vec::new();
        JpegAdapter
            .decode_frame(&desc, &encoded, &mut decoded)
            .unwrap();
        assert_eq!(decoded.len(), 64 * 64);
    }

    #[test]
    fn ybr_decodes_to_rgb() {
        let desc = FrameDescriptor::new(2, 2, 3, 8)
            .with_photometric_interpretation(PhotometricInterpretation::YbrFull422);
        let decoded = JpegAdapter.decoded_descriptor(&desc);
        assert_eq!(
            decoded.photometric_interpretation(),
            &PhotometricInterpretation::Rgb
        );
    }

    #[test]
    fn decode_garbage() {
        let desc = FrameDescriptor::new(2, 2, 1, 8);
        let mut out = Vec::new();
        assert!(JpegAdapter
            .decode_frame(&desc, &[0xFF, 0xD8, 0x00, 0x01], &mut out)
            .is_err());
        assert!(out.is_empty());
    }
}
