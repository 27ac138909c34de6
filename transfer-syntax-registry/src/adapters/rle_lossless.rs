//! Support for RLE Lossless image decoding and encoding.
//!
//! Each frame is one fragment made of a 64-byte header
//! followed by up to 15 PackBits segments.
//! Segment `k` holds byte `k % bytes_per_sample` (most significant first)
//! of sample `k / bytes_per_sample` for every pixel of the frame.
//!
//! See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>
use byteordered::byteorder::{ByteOrder, LittleEndian};

use fragstream_encoding::adapters::{
    decode_error, encode_error, DecodeResult, EncodeOptions, EncodeResult, PixelDataReader,
    PixelDataWriter,
};
use fragstream_encoding::descriptor::FrameDescriptor;
use fragstream_encoding::ops::{AttributeAction, AttributeOp};
use fragstream_encoding::snafu::prelude::*;
use fragstream_encoding::tags;
use fragstream_encoding::PrimitiveValue;

/// The length of the RLE header in bytes.
const HEADER_LEN: usize = 64;
/// The maximum number of segments in one frame.
const MAX_SEGMENTS: usize = 15;

/// Pixel data adapter for the RLE Lossless transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RleLosslessAdapter;

/// Pixel data decoder for RLE Lossless (UID `1.2.840.10008.1.2.5`)
impl PixelDataReader for RleLosslessAdapter {
    fn decode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        dst: &mut Vec<u8>,
    ) -> DecodeResult<()> {
        let bits_allocated = descriptor.bits_allocated();
        ensure!(
            matches!(bits_allocated, 8 | 16 | 32),
            decode_error::UnsupportedSnafu {
                reason: format!("BitsAllocated {} in RLE Lossless", bits_allocated),
            }
        );

        let bytes_per_sample = descriptor.bytes_per_sample();
        let samples_per_pixel = descriptor.samples_per_pixel() as usize;
        let nr_segments = bytes_per_sample * samples_per_pixel;
        let pixels = descriptor.rows() as usize * descriptor.columns() as usize;

        let offsets = read_rle_header(data)?;
        if offsets.len() != nr_segments {
            whatever!(
                "RLE header declares {} segments, expected {}",
                offsets.len(),
                nr_segments
            );
        }

        let base_offset = dst.len();
        dst.resize(base_offset + pixels * nr_segments, 0);
        let frame = &mut dst[base_offset..];

        // RLE encoded data is ordered like this (for 16-bit, 3 sample):
        //  Segment: 0     | 1     | 2     | 3     | 4     | 5
        //           R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
        // while the output is pixel-interleaved and little endian:
        //    LSB R MSB R LSB G MSB G LSB B MSB B | ...
        for (k, &start) in offsets.iter().enumerate() {
            let end = offsets.get(k + 1).copied().unwrap_or(data.len());
            if start > end || end > data.len() {
                whatever!("RLE segment #{} out of bounds: {}..{}", k, start, end);
            }
            let decoded = unpack_bits(&data[start..end], pixels);
            if decoded.len() < pixels {
                whatever!(
                    "RLE segment #{} too short: {} bytes, expected {}",
                    k,
                    decoded.len(),
                    pixels
                );
            }

            let sample = k / bytes_per_sample;
            let byte = bytes_per_sample - 1 - k % bytes_per_sample;
            let first = sample * bytes_per_sample + byte;
            for (pixel, value) in decoded.into_iter().take(pixels).enumerate() {
                frame[pixel * nr_segments + first] = value;
            }
        }

        Ok(())
    }
}

/// Pixel data encoder for RLE Lossless (UID `1.2.840.10008.1.2.5`)
impl PixelDataWriter for RleLosslessAdapter {
    fn encode_frame(
        &self,
        descriptor: &FrameDescriptor,
        data: &[u8],
        _options: &EncodeOptions,
        dst: &mut Vec<u8>,
    ) -> EncodeResult<Vec<AttributeOp>> {
        let bits_allocated = descriptor.bits_allocated();
        ensure!(
            matches!(bits_allocated, 8 | 16 | 32),
            encode_error::UnrepresentableSnafu {
                reason: format!("BitsAllocated {} in RLE Lossless", bits_allocated),
            }
        );
        let bytes_per_sample = descriptor.bytes_per_sample();
        let samples_per_pixel = descriptor.samples_per_pixel() as usize;
        let nr_segments = bytes_per_sample * samples_per_pixel;
        ensure!(
            nr_segments <= MAX_SEGMENTS,
            encode_error::UnrepresentableSnafu {
                reason: format!("{} RLE segments needed, at most 15", nr_segments),
            }
        );
        let frame_len = descriptor.frame_len();
        ensure!(
            data.len() >= frame_len,
            encode_error::FrameTooShortSnafu {
                actual: data.len(),
                expected: frame_len,
            }
        );

        let rows = descriptor.rows() as usize;
        let columns = descriptor.columns() as usize;

        let base_offset = dst.len();
        dst.resize(base_offset + HEADER_LEN, 0);
        let mut offsets = Vec::with_capacity(nr_segments);
        let mut row_bytes = Vec::with_capacity(columns);

        for k in 0..nr_segments {
            offsets.push((dst.len() - base_offset) as u32);
            let sample = k / bytes_per_sample;
            let byte = bytes_per_sample - 1 - k % bytes_per_sample;
            let first = sample * bytes_per_sample + byte;
            // each row is packed separately
            for row in 0..rows {
                row_bytes.clear();
                row_bytes.extend(
                    (0..columns).map(|col| data[(row * columns + col) * nr_segments + first]),
                );
                pack_bits(&row_bytes, dst);
            }
            if (dst.len() - base_offset) % 2 != 0 {
                dst.push(0);
            }
        }

        let header = &mut dst[base_offset..base_offset + HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], nr_segments as u32);
        for (k, offset) in offsets.into_iter().enumerate() {
            LittleEndian::write_u32(&mut header[4 + k * 4..8 + k * 4], offset);
        }

        let mut ops = Vec::new();
        if samples_per_pixel > 1 {
            ops.push(AttributeOp::new(
                tags::PLANAR_CONFIGURATION,
                AttributeAction::Set(PrimitiveValue::from(0_u16)),
            ));
        }
        Ok(ops)
    }
}

/// Read the RLE header and return the segment offsets.
fn read_rle_header(fragment: &[u8]) -> DecodeResult<Vec<usize>> {
    if fragment.len() < HEADER_LEN {
        whatever!(
            "RLE fragment of {} bytes is shorter than its header",
            fragment.len()
        );
    }
    let nr_segments = LittleEndian::read_u32(&fragment[0..4]) as usize;
    if nr_segments == 0 || nr_segments > MAX_SEGMENTS {
        whatever!("Invalid number of RLE segments: {}", nr_segments);
    }
    let mut offsets = vec![0; nr_segments];
    LittleEndian::read_u32_into(&fragment[4..4 * (nr_segments + 1)], &mut offsets);
    Ok(offsets.into_iter().map(|o| o as usize).collect())
}

/// Decode a PackBits segment, stopping once `expected` bytes are produced.
///
/// A literal run cut short by the end of the segment is kept as is.
fn unpack_bits(segment: &[u8], expected: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while i < segment.len() && out.len() < expected {
        let h = segment[i] as i8;
        i += 1;
        if h >= 0 {
            let n = h as usize + 1;
            let end = (i + n).min(segment.len());
            out.extend_from_slice(&segment[i..end]);
            i = end;
        } else if h != -128 {
            let Some(&value) = segment.get(i) else {
                break;
            };
            i += 1;
            out.resize(out.len() + (1 - h as isize) as usize, value);
        }
        // h = -128 is a no-op
    }
    out
}

/// Encode a sequence of bytes with PackBits, appending to `dst`.
///
/// Runs of 3 or more equal bytes become replicate runs,
/// everything else goes into literal runs of at most 128 bytes.
fn pack_bits(src: &[u8], dst: &mut Vec<u8>) {
    let mut i = 0;
    let mut literal_start = 0;
    while i < src.len() {
        let mut run = 1;
        while i + run < src.len() && run < 128 && src[i + run] == src[i] {
            run += 1;
        }
        if run >= 3 {
            flush_literal(&src[literal_start..i], dst);
            dst.push((1 - run as isize) as i8 as u8);
            dst.push(src[i]);
            i += run;
            literal_start = i;
        } else {
            i += run;
        }
    }
    flush_literal(&src[literal_start..], dst);
}

fn flush_literal(literal: &[u8], dst: &mut Vec<u8>) {
    for chunk in literal.chunks(128) {
        dst.push((chunk.len() - 1) as u8);
        dst.extend_from_slice(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragstream_encoding::adapters::{DecodeError, EncodeError};
    use fragstream_encoding::descriptor::PhotometricInterpretation;

    #[test]
    fn test_packbits() {
        let encoded = vec![
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let decoded = unpack_bits(&encoded, 1000);
        let expected = vec![
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decoded, expected);
    }

    #[test]
    fn packbits_stops_at_expected_length() {
        // a padding byte after the last run must not be read as a literal
        assert_eq!(unpack_bits(&[0xFD, 0x07, 0x00], 4), vec![7; 4]);
    }

    #[test]
    fn pack_then_unpack() {
        let mut row: Vec<u8> = vec![5; 200];
        row.extend([1, 2, 3, 3, 4]);
        row.extend((0..=255).collect::<Vec<u8>>());
        let mut packed = Vec::new();
        pack_bits(&row, &mut packed);
        assert!(packed.len() < row.len());
        assert_eq!(unpack_bits(&packed, row.len()), row);
    }

    #[test]
    fn encode_and_decode_16bit_rgb() {
        let desc = FrameDescriptor::new(3, 4, 3, 16)
            .with_photometric_interpretation(PhotometricInterpretation::Rgb);
        let frame: Vec<u8> = (0..desc.frame_len()).map(|i| (i * 7 % 251) as u8).collect();

        let mut encoded = Vec::new();
        let ops = RleLosslessAdapter
            .encode_frame(&desc, &frame, &EncodeOptions::default(), &mut encoded)
            .unwrap();
        assert_eq!(encoded.len() % 2, 0);
        assert_eq!(LittleEndian::read_u32(&encoded[0..4]), 6);
        assert_eq!(LittleEndian::read_u32(&encoded[4..8]), 64);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].tag, tags::PLANAR_CONFIGURATION);

        let mut decoded = Vec::new();
        RleLosslessAdapter
            .decode_frame(&desc, &encoded, &mut decoded)
            .unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_known_8bit_frame() {
        // 1 segment: 2x2 pixels, all 0x10
        let mut fragment = vec![0; 64];
        fragment[0] = 1;
        fragment[4] = 64;
        fragment.extend([0xFD, 0x10]);
        let desc = FrameDescriptor::new(2, 2, 1, 8);
        let mut out = Vec::new();
        RleLosslessAdapter
            .decode_frame(&desc, &fragment, &mut out)
            .unwrap();
        assert_eq!(out, [0x10; 4]);
    }

    #[test]
    fn decode_segment_count_mismatch() {
        let mut fragment = vec![0; 64];
        fragment[0] = 1;
        fragment[4] = 64;
        fragment.extend([0xFD, 0x10]);
        let desc = FrameDescriptor::new(2, 2, 1, 16);
        let err = RleLosslessAdapter
            .decode_frame(&desc, &fragment, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Custom { .. }));
    }

    #[test]
    fn decode_short_header() {
        let desc = FrameDescriptor::new(2, 2, 1, 8);
        assert!(RleLosslessAdapter
            .decode_frame(&desc, &[1, 0, 0, 0], &mut Vec::new())
            .is_err());
    }

    #[test]
    fn cannot_encode_too_many_segments() {
        // 64-bit RGB would need 24 segments
        let desc = FrameDescriptor::new(1, 1, 3, 64);
        let err = RleLosslessAdapter
            .encode_frame(&desc, &[0; 24], &EncodeOptions::default(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, EncodeError::Unrepresentable { .. }));
    }
}
