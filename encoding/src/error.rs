//! Crate-level error types for fragment resolution and frame extraction.
use crate::Tag;
use snafu::{Backtrace, Snafu};
use std::io;

/// An error raised while resolving fragments,
/// reading a segmented stream or extracting frames.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Could not reposition the underlying source
    #[snafu(display("Could not seek to source offset {}", offset))]
    SeekSource {
        offset: u64,
        source: io::Error,
        backtrace: Backtrace,
    },
    /// Could not read an item header
    #[snafu(display("Could not read item header at offset {}", offset))]
    ReadItemHeader {
        offset: u64,
        source: io::Error,
        backtrace: Backtrace,
    },
    /// The header found was neither an item nor a sequence delimiter
    #[snafu(display("Unexpected tag {} at offset {}, expected an item", tag, offset))]
    UnexpectedItemTag {
        tag: Tag,
        offset: u64,
        backtrace: Backtrace,
    },
    /// Fragment items must have a defined length
    #[snafu(display("Undefined length in fragment item at offset {}", offset))]
    UndefinedItemLength { offset: u64, backtrace: Backtrace },
    /// Could not read the contents of a fragment
    #[snafu(display("Could not read fragment #{}", slot))]
    ReadFragment {
        slot: usize,
        source: io::Error,
        backtrace: Backtrace,
    },
    /// Could not write to the given sink
    #[snafu(display("Could not write stream data to sink"))]
    WriteSink {
        source: io::Error,
        backtrace: Backtrace,
    },
    /// The requested frame does not exist
    #[snafu(display("Frame #{} is out of range", frame))]
    FrameOutOfRange { frame: u32, backtrace: Backtrace },
    /// The fragment is shorter than the image geometry requires
    #[snafu(display(
        "Frame #{} is out of range: fragment #{} holds {} bytes, {} needed",
        frame,
        slot,
        available,
        needed
    ))]
    FragmentTooShort {
        slot: usize,
        frame: u32,
        available: u64,
        needed: u64,
        backtrace: Backtrace,
    },
    /// The frame start boundaries found do not match the declared frame count
    #[snafu(display(
        "Cannot match fragments to frames: found {} frame starts, expected {}",
        found,
        frames
    ))]
    FragmentFrameMismatch {
        found: usize,
        frames: u32,
        backtrace: Backtrace,
    },
}

/// Type alias for a result from this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match &e {
            Error::SeekSource { source, .. }
            | Error::ReadItemHeader { source, .. }
            | Error::ReadFragment { source, .. }
            | Error::WriteSink { source, .. } => source.kind(),
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, e)
    }
}
