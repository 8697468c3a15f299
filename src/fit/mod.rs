//! Decoder for the FIT (Flexible and Interoperable Data Transfer) binary format.
//!
//! A FIT file is a header, a stream of definition and data records, and a
//! trailing CRC. Several files may be chained back to back in one buffer.

#[cfg(any(test, feature = "test-support"))]
pub mod builder;
pub mod crc;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod profile;
pub mod reader;
pub mod types;

pub use error::FitError;
pub use reader::{
    decode, DecodeOptions, FitDataMessage, FitField, FitFrame, FitHeader, FitReader,
    MessageDefinition,
};
pub use types::{BaseType, FieldValue};
