//! Error types for TDS protocol parsing and encoding.

use crate::prelude::*;
use thiserror::Error;

/// Errors that can occur while decoding or encoding TDS protocol structures.
///
/// This type is `no_std`-compatible: string payloads are carried as `String`
/// when the `std`/`alloc` feature is enabled and as `&'static str` otherwise,
/// since heap-allocated owned strings require at least `alloc`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The buffer did not contain enough bytes to decode the expected structure.
    #[error("incomplete packet: expected at least {expected} bytes, got {actual}")]
    IncompletePacket {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes actually available.
        actual: usize,
    },

    /// Ran out of input while decoding a variable-length field.
    #[error("unexpected end of buffer")]
    UnexpectedEof,

    /// An unrecognized TDS packet type byte.
    #[error("invalid packet type byte: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// An unrecognized packet status bit pattern.
    #[error("invalid packet status byte: 0x{0:02X}")]
    InvalidPacketStatus(u8),

    /// An unrecognized PRELOGIN option token.
    #[error("invalid prelogin option token: 0x{0:02X}")]
    InvalidPreloginOption(u8),

    /// An unrecognized token type tag byte.
    #[error("invalid token type byte: 0x{0:02X}")]
    InvalidTokenType(u8),

    /// A field held a value outside its valid range.
    #[error("invalid value for field {field}: {value}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The out-of-range value observed.
        value: u32,
    },

    /// A string field could not be decoded as valid text.
    #[cfg(feature = "std")]
    #[error("string encoding error: {0}")]
    StringEncoding(String),

    /// A string field could not be decoded as valid text (`no_std` variant).
    #[cfg(not(feature = "std"))]
    #[error("string encoding error: {0}")]
    StringEncoding(&'static str),
}
