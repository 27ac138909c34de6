//! This crate contains the DICOM pixel data transcoder,
//! which converts the pixel data of a DICOM object
//! into another transfer syntax,
//! decoding and encoding one frame at a time.
//!
//! Pixel data is never loaded as a whole:
//! frames are fetched on demand from the object's file
//! through a [`FrameExtractor`](fragstream_encoding::FrameExtractor),
//! decoded by the source transfer syntax' reader,
//! and encoded by the target transfer syntax' writer
//! while the output is being written.
//!
//! When the target encoding cannot represent the image,
//! the next suitable encoding in a list of fallbacks is used instead,
//! and the substitution is reported back.
//!
//! # Examples
//!
//! ```no_run
//! # use std::error::Error;
//! use fragstream_object::open_file;
//! use fragstream_pixeldata::Transcode;
//! use fragstream_transfer_syntax_registry::entries::RLE_LOSSLESS;
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let obj = open_file("dicom.dcm")?;
//! let report = obj.transcode_to_file(&RLE_LOSSLESS, "dicom-rle.dcm")?;
//! println!("Written in {}", report.transfer_syntax);
//! #   Ok(())
//! # }
//! ```
//!
//! Use a [`Transcoder`] to set encoding options,
//! edit the decoded frames,
//! or defer writing to an arbitrary sink.

pub mod transcode;

pub use crate::transcode::{
    transcode_needed, Adjustment, DeferredWrite, Error, FrameEditor, Result, Transcode,
    TranscodeOptions, TranscodeReport, Transcoder,
};
