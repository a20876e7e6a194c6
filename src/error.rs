//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the census crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// The census window holds more bits than the widest word class.
    #[error("Census word of {bits} bits is wider than the supported maximum of 256 bits")]
    UnsupportedWidth { bits: usize },

    /// The two images of a stereo pair are not the same size.
    #[error("Stereo images differ in size: base is {base:?}, matched is {matched:?}")]
    DimensionMismatch {
        base: (usize, usize),
        matched: (usize, usize)
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String)
}
