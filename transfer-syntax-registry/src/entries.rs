//! A list of compiled transfer syntax specifiers.
//!
//! The constants exported here refer to the library's built-in support
//! for DICOM transfer syntaxes.
//!
//! - **Fully implemented** means that the default transfer syntax registry
//!   provides built-in support for reading and writing data sets,
//!   as well as for encoding and decoding encapsulated pixel data,
//!   if applicable.
//! - When specified as **Implemented**,
//!   the transfer syntax is supported to some extent
//!   (usually decoding is supported but not encoding).
//! - **Stub descriptors** serve to provide information about
//!   the transfer syntax.
//!   Their fragments can be enumerated and split into frames,
//!   but their pixel data cannot be decoded or encoded.

use crate::{Codec, TransferSyntax as Ts};
use byteordered::Endianness;
use fragstream_encoding::probe::{Jpeg2000FrameStartProbe, JpegFrameStartProbe};
use fragstream_encoding::FragmentLayout;

#[cfg(feature = "jpeg")]
use crate::adapters::jpeg::JpegAdapter;
#[cfg(feature = "rle")]
use crate::adapters::rle_lossless::RleLosslessAdapter;
use crate::adapters::uncompressed::UncompressedAdapter;

/// Create a transfer syntax with encapsulated pixel data
/// which cannot be decoded or encoded by this library.
pub(crate) const fn create_ts_stub(
    uid: &'static str,
    name: &'static str,
    layout: FragmentLayout,
) -> Ts {
    Ts::new_ele(
        uid,
        name,
        Codec::EncapsulatedPixelData {
            layout,
            reader: None,
            writer: None,
        },
    )
}

const JPEG_FAMILY: FragmentLayout = FragmentLayout::MaySplitFrames(&JpegFrameStartProbe);
const JPEG_2000_FAMILY: FragmentLayout =
    FragmentLayout::MaySplitFrames(&Jpeg2000FrameStartProbe);

// -- the three base transfer syntaxes --

/// **Fully implemented:** Implicit VR Little Endian: Default Transfer Syntax for DICOM
pub const IMPLICIT_VR_LITTLE_ENDIAN: Ts = Ts::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    false,
    Endianness::Little,
    Codec::None,
);

/// **Fully implemented:** Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: Ts = Ts::new_ele(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Codec::None,
);

/// **Stub descriptor:** Explicit VR Big Endian
///
/// Recognized so that it can be reported, but data sets are not read.
pub const EXPLICIT_VR_BIG_ENDIAN: Ts = Ts::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    true,
    Endianness::Big,
    Codec::None,
);

/// **Stub descriptor:** Deflated Explicit VR Little Endian
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: Ts = Ts::new_ele(
    "1.2.840.10008.1.2.1.99",
    "Deflated Explicit VR Little Endian",
    Codec::Unsupported,
);

// -- encapsulated pixel data --

/// **Fully implemented:** Encapsulated Uncompressed Explicit VR Little Endian
pub const ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN: Ts = Ts::new_ele(
    "1.2.840.10008.1.2.1.98",
    "Encapsulated Uncompressed Explicit VR Little Endian",
    Codec::EncapsulatedPixelData {
        layout: FragmentLayout::OneFragmentPerFrame,
        reader: Some(&UncompressedAdapter),
        writer: Some(&UncompressedAdapter),
    },
);

/// **Fully implemented:** RLE Lossless
#[cfg(feature = "rle")]
pub const RLE_LOSSLESS: Ts = Ts::new_ele(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    Codec::EncapsulatedPixelData {
        layout: FragmentLayout::OneFragmentPerFrame,
        reader: Some(&RleLosslessAdapter),
        writer: Some(&RleLosslessAdapter),
    },
);

/// **Stub descriptor:** RLE Lossless
#[cfg(not(feature = "rle"))]
pub const RLE_LOSSLESS: Ts = create_ts_stub(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    FragmentLayout::OneFragmentPerFrame,
);

// JPEG encoded pixel data

/// An alias for a transfer syntax specifier with JPEG reading only.
#[cfg(feature = "jpeg")]
const fn create_ts_jpeg_reader(uid: &'static str, name: &'static str) -> Ts {
    Ts::new_ele(
        uid,
        name,
        Codec::EncapsulatedPixelData {
            layout: JPEG_FAMILY,
            reader: Some(&JpegAdapter),
            writer: None,
        },
    )
}

#[cfg(not(feature = "jpeg"))]
const fn create_ts_jpeg_reader(uid: &'static str, name: &'static str) -> Ts {
    create_ts_stub(uid, name, JPEG_FAMILY)
}

/// **Fully implemented:** JPEG Baseline (Process 1):
/// Default Transfer Syntax for Lossy JPEG 8 Bit Image Compression
#[cfg(feature = "jpeg")]
pub const JPEG_BASELINE: Ts = Ts::new_ele(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Codec::EncapsulatedPixelData {
        layout: JPEG_FAMILY,
        reader: Some(&JpegAdapter),
        writer: Some(&JpegAdapter),
    },
);

/// **Stub descriptor:** JPEG Baseline (Process 1)
#[cfg(not(feature = "jpeg"))]
pub const JPEG_BASELINE: Ts = create_ts_stub(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    JPEG_FAMILY,
);

/// **Implemented:** JPEG Extended (Process 2 & 4):
/// Default Transfer Syntax for Lossy JPEG 12 Bit Image Compression
/// (Process 4 only)
pub const JPEG_EXTENDED: Ts =
    create_ts_jpeg_reader("1.2.840.10008.1.2.4.51", "JPEG Extended (Process 2 & 4)");

/// **Implemented:** JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: Ts = create_ts_jpeg_reader(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
);

/// **Implemented:** JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14 [Selection Value 1]):
/// Default Transfer Syntax for Lossless JPEG Image Compression
pub const JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION: Ts = create_ts_jpeg_reader(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
);

// JPEG-LS and JPEG 2000

/// **Stub descriptor:** JPEG-LS Lossless Image Compression
pub const JPEG_LS_LOSSLESS_IMAGE_COMPRESSION: Ts = create_ts_stub(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    JPEG_FAMILY,
);

/// **Stub descriptor:** JPEG-LS Lossy (Near-Lossless) Image Compression
pub const JPEG_LS_LOSSY_IMAGE_COMPRESSION: Ts = create_ts_stub(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    JPEG_FAMILY,
);

/// **Stub descriptor:** JPEG 2000 Image Compression (Lossless Only)
pub const JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY: Ts = create_ts_stub(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    JPEG_2000_FAMILY,
);

/// **Stub descriptor:** JPEG 2000 Image Compression
pub const JPEG_2000_IMAGE_COMPRESSION: Ts = create_ts_stub(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    JPEG_2000_FAMILY,
);
