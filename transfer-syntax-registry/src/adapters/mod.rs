//! Root module for pixel data adapters.
//!
//! Additional support for certain transfer syntaxes
//! can be added via Cargo features.
//!
//! - [`jpeg`](jpeg) provides native JPEG decoding
//!   (baseline, extended and lossless)
//!   and encoding (baseline).
//!   Requires the `jpeg` feature,
//!   enabled by default.
//! - [`rle_lossless`](rle_lossless) provides native RLE lossless
//!   decoding and encoding.
//!   Requires the `rle` feature,
//!   enabled by default.
//! - [`uncompressed`](uncompressed) handles native pixel data
//!   and encapsulated uncompressed pixel data.
#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "rle")]
pub mod rle_lossless;

pub mod uncompressed;

/// **Note:** This module is a stub.
/// Enable the `jpeg` feature to use this module.
#[cfg(not(feature = "jpeg"))]
pub mod jpeg {}

/// **Note:** This module is a stub.
/// Enable the `rle` feature to use this module.
#[cfg(not(feature = "rle"))]
pub mod rle_lossless {}
