//! Error types for the TDS packet framing and codec layer.

use thiserror::Error;

/// Errors that can occur while framing or transporting TDS packets.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The packet header declared a length below the minimum header size.
    #[error("invalid packet header length")]
    InvalidHeader,

    /// The declared packet length exceeds the negotiated maximum packet size.
    #[error("packet too large: {size} bytes exceeds maximum of {max}")]
    PacketTooLarge {
        /// Declared packet size in bytes, including the header.
        size: usize,
        /// Negotiated maximum packet size.
        max: usize,
    },

    /// The underlying TDS protocol layer rejected a packet or token.
    #[error(transparent)]
    Protocol(#[from] tds_protocol::ProtocolError),

    /// The peer closed the connection mid-message.
    #[error("connection closed while reading a message")]
    ConnectionClosed,

    /// An I/O error occurred on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
