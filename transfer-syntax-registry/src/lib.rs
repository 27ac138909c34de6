//! This crate contains the DICOM transfer syntax registry.
//! The transfer syntax registry maps a DICOM UID of a transfer syntax into the
//! respective transfer syntax specifier,
//! which tells how the data set is encoded
//! and which adapters decode and encode its pixel data.
//!
//! ```
//! use fragstream_transfer_syntax_registry::TransferSyntaxRegistry;
//!
//! let ts = TransferSyntaxRegistry.get("1.2.840.10008.1.2.5").unwrap();
//! assert_eq!(ts.name(), "RLE Lossless");
//! assert!(ts.is_encapsulated());
//! ```

pub mod adapters;
pub mod entries;

use byteordered::Endianness;
use fragstream_encoding::adapters::{PixelDataReader, PixelDataWriter};
use fragstream_encoding::FragmentLayout;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// Alias type for a statically dispatched pixel data reader.
pub type DynPixelDataReader = dyn PixelDataReader + Send + Sync;

/// Alias type for a statically dispatched pixel data writer.
pub type DynPixelDataWriter = dyn PixelDataWriter + Send + Sync;

/// How the pixel data of a transfer syntax is encoded.
#[derive(Copy, Clone)]
pub enum Codec {
    /// Native pixel data, in a single element of defined length.
    None,
    /// Encapsulated pixel data,
    /// with the adapters available for it.
    EncapsulatedPixelData {
        layout: FragmentLayout,
        reader: Option<&'static DynPixelDataReader>,
        writer: Option<&'static DynPixelDataWriter>,
    },
    /// The data set itself cannot be read or written
    /// (such as deflated data sets).
    Unsupported,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::None => f.write_str("None"),
            Codec::EncapsulatedPixelData {
                layout,
                reader,
                writer,
            } => f
                .debug_struct("EncapsulatedPixelData")
                .field("layout", layout)
                .field("reader", &reader.is_some())
                .field("writer", &writer.is_some())
                .finish(),
            Codec::Unsupported => f.write_str("Unsupported"),
        }
    }
}

/// A DICOM transfer syntax specifier.
#[derive(Debug, Copy, Clone)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    explicit_vr: bool,
    endianness: Endianness,
    codec: Codec,
}

impl TransferSyntax {
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        explicit_vr: bool,
        endianness: Endianness,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            explicit_vr,
            endianness,
            codec,
        }
    }

    /// Create a transfer syntax with an explicit VR little endian data set.
    pub const fn new_ele(uid: &'static str, name: &'static str, codec: Codec) -> Self {
        Self::new(uid, name, true, Endianness::Little, codec)
    }

    pub fn uid(&self) -> &'static str {
        self.uid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Whether pixel data is native (not encapsulated).
    pub fn is_native(&self) -> bool {
        matches!(self.codec, Codec::None)
    }

    pub fn is_encapsulated(&self) -> bool {
        matches!(self.codec, Codec::EncapsulatedPixelData { .. })
    }

    /// Whether data sets in this transfer syntax can be read and written.
    ///
    /// Only little endian data sets which are not deflated are supported.
    pub fn is_dataset_supported(&self) -> bool {
        self.endianness == Endianness::Little && !matches!(self.codec, Codec::Unsupported)
    }

    /// The layout of frames over pixel data fragments.
    pub fn fragment_layout(&self) -> Option<FragmentLayout> {
        match self.codec {
            Codec::None => Some(FragmentLayout::Native),
            Codec::EncapsulatedPixelData { layout, .. } => Some(layout),
            Codec::Unsupported => None,
        }
    }

    /// The adapter for decoding pixel data in this transfer syntax.
    ///
    /// Native pixel data is "decoded" by the uncompressed adapter.
    pub fn pixel_reader(&self) -> Option<&'static DynPixelDataReader> {
        match self.codec {
            Codec::None => Some(&adapters::uncompressed::UncompressedAdapter),
            Codec::EncapsulatedPixelData { reader, .. } => reader,
            Codec::Unsupported => None,
        }
    }

    /// The adapter for encoding pixel data into this transfer syntax.
    pub fn pixel_writer(&self) -> Option<&'static DynPixelDataWriter> {
        match self.codec {
            Codec::None => Some(&adapters::uncompressed::UncompressedAdapter),
            Codec::EncapsulatedPixelData { writer, .. } => writer,
            Codec::Unsupported => None,
        }
    }
}

impl PartialEq for TransferSyntax {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for TransferSyntax {}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}

/// Zero-sized representative of the main transfer syntax registry.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct TransferSyntaxRegistry;

impl TransferSyntaxRegistry {
    /// Obtain a transfer syntax specifier by UID.
    ///
    /// Trailing null and space padding is ignored.
    pub fn get(&self, uid: &str) -> Option<&'static TransferSyntax> {
        let uid = uid.trim_end_matches(['\0', ' ']);
        REGISTRY.get(uid)
    }

    /// Iterate over every registered transfer syntax.
    pub fn iter(&self) -> impl Iterator<Item = &'static TransferSyntax> {
        REGISTRY.values()
    }
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, TransferSyntax> = initialize_codecs();
}

fn initialize_codecs() -> HashMap<&'static str, TransferSyntax> {
    use crate::entries::*;

    [
        IMPLICIT_VR_LITTLE_ENDIAN,
        EXPLICIT_VR_LITTLE_ENDIAN,
        EXPLICIT_VR_BIG_ENDIAN,
        DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN,
        RLE_LOSSLESS,
        JPEG_BASELINE,
        JPEG_EXTENDED,
        JPEG_LOSSLESS_NON_HIERARCHICAL,
        JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION,
        JPEG_LS_LOSSLESS_IMAGE_COMPRESSION,
        JPEG_LS_LOSSY_IMAGE_COMPRESSION,
        JPEG_2000_IMAGE_COMPRESSION_LOSSLESS_ONLY,
        JPEG_2000_IMAGE_COMPRESSION,
    ]
    .into_iter()
    .map(|ts| (ts.uid(), ts))
    .collect()
}
