//! This crate contains a high-level abstraction for reading and manipulating
//! DICOM objects whose pixel data is located, but not loaded, when opened.
//!
//! At this level, objects are comparable to a dictionary of elements,
//! in which some of them can have DICOM objects themselves.
//! The pixel data element is the exception:
//! opening a file only records where it begins,
//! and its fragments are read later on demand
//! through a [`FrameExtractor`](fragstream_encoding::FrameExtractor).
//!
//! # Examples
//!
//! Read an object and fetch some attributes:
//!
//! ```no_run
//! use fragstream_encoding::tags;
//! use fragstream_object::open_file;
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let obj = open_file("0001.dcm")?;
//!
//! let patient_name = obj.str_value(tags::PATIENT_NAME)?;
//! let modality = obj.str_value(tags::MODALITY)?;
//! # Ok(())
//! # }
//! ```
//!
//! Fetch the bytes of the second frame:
//!
//! ```no_run
//! # use fragstream_object::open_file;
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let obj = open_file("0002.dcm")?;
//! let mut frames = obj.frame_extractor()?;
//! let frame = frames.frame_bytes(1)?;
//! # Ok(())
//! # }
//! ```
pub mod dictionary;
pub mod file;
pub mod mem;
pub mod meta;
pub mod read;
pub mod write;

pub use crate::file::{open_file, FileDicomObject, OpenFileOptions, PixelData, PixelSource};
pub use crate::mem::{InMemDicomObject, InMemElement, Value};
pub use crate::meta::{FileMetaTable, FileMetaTableBuilder};
pub use crate::write::DataSetWriter;

use fragstream_encoding::Tag;
use snafu::{Backtrace, Snafu};

/// The current implementation class UID generically referring to this library.
///
/// This UID may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.214929374125963618741021542834618931553";

/// The current implementation version name generically referring to this library.
///
/// This name may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_VERSION_NAME: &str = "FRAGSTREAM_030";

/// An error which may occur when loading a DICOM object
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum ReadError {
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not read from file '{}'", filename.display()))]
    ReadFile {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    /// Could not read preamble bytes
    ReadPreambleBytes {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not parse meta group data set"))]
    ParseMetaDataSet {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },
    #[snafu(display("Could not read data set"))]
    ReadDataSet {
        #[snafu(backtrace)]
        source: crate::read::Error,
    },
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    ReadUnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display("Could not locate the elements after the pixel data"))]
    LocateTrailingElements {
        #[snafu(backtrace)]
        source: fragstream_encoding::Error,
    },
}

/// An error which may occur when writing a DICOM object
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    #[snafu(display("Could not write to file '{}'", filename.display()))]
    WriteFile {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not write object preamble"))]
    WritePreamble {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not print meta group data set"))]
    PrintMetaDataSet {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },
    #[snafu(display("Could not print data set"))]
    PrintDataSet {
        #[snafu(backtrace)]
        source: crate::write::Error,
    },
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    WriteUnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display("Could not access the pixel data"))]
    ReadPixelData {
        #[snafu(backtrace)]
        source: AccessError,
    },
    #[snafu(display("Could not copy a pixel data fragment"))]
    CopyFragment {
        #[snafu(backtrace)]
        source: fragstream_encoding::Error,
    },
    #[snafu(display("Could not write pixel data"))]
    WritePixelData {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

/// An error which may occur when looking up a DICOM object's attributes
/// or its pixel data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum AccessError {
    #[snafu(display("No such data element with tag {}", tag))]
    NoSuchDataElementTag { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Object has no pixel data"))]
    NoPixelData { backtrace: Backtrace },
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    AccessUnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display("Could not reopen file '{}' for its pixel data", filename.display()))]
    OpenPixelSource {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not describe the image"))]
    DescribeFrames {
        #[snafu(backtrace)]
        source: fragstream_encoding::descriptor::DescriptorError,
    },
}

/// An error which may occur when applying an attribute operation to an object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum ApplyError {
    /// Incompatible source element type for extension of {tag}
    IncompatibleTypes { tag: Tag },
    /// Unsupported action
    UnsupportedAction,
}

/// Result type for reading DICOM objects.
pub type Result<T, E = ReadError> = std::result::Result<T, E>;

/// Write the 128-byte preamble (all zeros)
/// and the file meta group of a DICOM file.
pub fn write_file_header<W>(to: &mut W, meta: &FileMetaTable) -> Result<(), WriteError>
where
    W: ?Sized + std::io::Write,
{
    use snafu::ResultExt;
    to.write_all(&[0_u8; 128]).context(WritePreambleSnafu)?;
    meta.write(to).context(PrintMetaDataSetSnafu)
}
