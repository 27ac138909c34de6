//! Frame start probes.
//!
//! Some encoders split one frame over several fragments.
//! When the basic offset table does not tell where each frame begins,
//! each fragment is tested for the codec's frame header.
//! Probes are pure functions over the fragment bytes.
use std::fmt::Debug;

/// A test for whether a fragment begins a new frame.
pub trait FrameStartProbe: Debug {
    /// Whether `data`, the full contents of a fragment,
    /// starts with a frame header of this codec.
    fn is_frame_start(&self, data: &[u8]) -> bool;
}

/// Frame start probe for the JPEG family
/// (baseline, extended, lossless and JPEG-LS).
///
/// A frame start is a start of image marker
/// followed by well-formed marker segments up to a start of frame marker.
/// A fragment which ends before the start of frame marker
/// is still accepted.
#[derive(Debug, Default, Copy, Clone)]
pub struct JpegFrameStartProbe;

/// Frame start probe for JPEG 2000 codestreams and JP2 files.
#[derive(Debug, Default, Copy, Clone)]
pub struct Jpeg2000FrameStartProbe;

pub static JPEG_PROBE: JpegFrameStartProbe = JpegFrameStartProbe;
pub static JPEG2000_PROBE: Jpeg2000FrameStartProbe = Jpeg2000FrameStartProbe;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DHT: u8 = 0xC4;
const JPG: u8 = 0xC8;
const DAC: u8 = 0xCC;
/// JPEG-LS start of frame
const SOF55: u8 = 0xF7;

impl FrameStartProbe for JpegFrameStartProbe {
    fn is_frame_start(&self, data: &[u8]) -> bool {
        if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
            return false;
        }
        let mut i = 2;
        loop {
            // fill bytes may precede a marker
            while i < data.len() && data[i] == 0xFF && data.get(i + 1) == Some(&0xFF) {
                i += 1;
            }
            if i + 1 >= data.len() {
                return true;
            }
            if data[i] != 0xFF {
                return false;
            }
            let marker = data[i + 1];
            match marker {
                0xC0..=0xCF if !matches!(marker, DHT | JPG | DAC) => return true,
                SOF55 => return true,
                SOS | EOI | SOI => return false,
                // standalone markers, no length
                0x01 | 0xD0..=0xD7 => {
                    i += 2;
                }
                _ => {
                    if i + 3 >= data.len() {
                        return true;
                    }
                    let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
                    if len < 2 {
                        return false;
                    }
                    i += 2 + len;
                }
            }
        }
    }
}

const J2K_SOC: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

impl FrameStartProbe for Jpeg2000FrameStartProbe {
    fn is_frame_start(&self, data: &[u8]) -> bool {
        data.starts_with(&J2K_SOC) || data.starts_with(&JP2_SIGNATURE)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal JPEG header: SOI, an APP0 segment, then SOF0.
    pub(crate) fn jpeg_header() -> Vec<u8> {
        vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46, // APP0, 2 bytes of payload
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00,
        ]
    }

    #[test]
    fn jpeg_frame_start() {
        let probe = JpegFrameStartProbe;
        assert!(probe.is_frame_start(&jpeg_header()));
        // cut short before the start of frame marker
        assert!(probe.is_frame_start(&jpeg_header()[..7]));
        // continuation of a split frame
        assert!(!probe.is_frame_start(&[0x12, 0xFF, 0x00, 0x34]));
        assert!(!probe.is_frame_start(&[]));
    }

    #[test]
    fn jpeg_without_frame_header() {
        let probe = JpegFrameStartProbe;
        assert!(!probe.is_frame_start(&[0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02]));
        // garbage where a marker was expected
        assert!(!probe.is_frame_start(&[0xFF, 0xD8, 0x00, 0x11, 0x22]));
    }

    #[test]
    fn jpeg_ls_frame_start() {
        let data = [0xFF, 0xD8, 0xFF, 0xF7, 0x00, 0x0B];
        assert!(JpegFrameStartProbe.is_frame_start(&data));
    }

    #[test]
    fn jpeg2000_frame_start() {
        let probe = Jpeg2000FrameStartProbe;
        assert!(probe.is_frame_start(&[0xFF, 0x4F, 0xFF, 0x51, 0x00, 0x2F]));
        assert!(probe.is_frame_start(&JP2_SIGNATURE));
        assert!(!probe.is_frame_start(&[0xFF, 0x4F, 0xFF, 0x90]));
        assert!(!probe.is_frame_start(&jpeg_header()));
    }
}
