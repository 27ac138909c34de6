//! Encapsulated DICOM pixel data primitives.
//!
//! This crate provides the data structures for reading
//! pixel data stored as a sequence of length-prefixed fragments
//! (_encapsulated_ pixel data),
//! without knowing the fragment boundaries in advance:
//!
//! - [`FragmentTable`] records where each fragment lives,
//!   resolving item headers lazily against the underlying source;
//! - [`SegmentedStream`] exposes one frame's fragments,
//!   or the whole object, as a single seekable byte stream;
//! - [`FrameExtractor`] maps frame indices to fragments
//!   and produces the bytes of any frame;
//! - [`FrameDescriptor`] summarizes the image attributes
//!   needed to interpret those bytes.
//!
//! The [`adapters`] module hosts the traits implemented by
//! pixel data codecs, so that transfer syntax implementers
//! only need to depend on this crate.
//!
//! All APIs are based on synchronous I/O.
//! None of the stateful types here are meant to be shared across threads:
//! open separate instances over independent handles instead.

pub mod adapters;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod fragment;
pub mod header;
pub mod ops;
pub mod probe;
pub mod stream;
pub mod tags;
pub mod value;

pub use byteordered::Endianness;
pub use descriptor::FrameDescriptor;
pub use error::{Error, Result};
pub use extract::{FragmentLayout, FrameExtractor};
pub use fragment::{Fragment, FragmentTable};
pub use header::{Length, Tag, VR};
pub use stream::SegmentedStream;
pub use value::PrimitiveValue;

// re-export snafu so that adapter implementers
// can use the same version of the context selectors
pub use snafu;
pub use smallvec;
