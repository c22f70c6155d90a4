use super::view::OutOfBounds;

/// The error type for dissecting and rewriting packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A header read or write would cross the end of the packet buffer.
    ///
    /// The packet may be shorter than the minimum header length, or a length field within a
    /// header claims more data than was received.
    #[error("header exceeds packet bounds")]
    OutOfBounds,

    /// The selector field names a protocol that has no codec.
    ///
    /// E.g. an Ethernet frame carrying ARP, or an IPv4 packet carrying SCTP.
    #[error("unsupported protocol 0x{0:04x}")]
    UnsupportedProtocol(u16),

    /// An incoming header was recognized but was self-contradictory.
    ///
    /// Examples: an IPv4 header with a header length below 20 octets; a UDP datagram claiming to
    /// contain less than 8 bytes of data.
    #[error("malformed header")]
    Malformed,

    /// A checksum did not match the content it covers.
    #[error("checksum error")]
    WrongChecksum,

    /// A field edit does not apply to the header it was directed at.
    #[error("field does not belong to the header")]
    FieldMismatch,
}

/// The result type for dissecting and rewriting packets.
pub type Result<T> = core::result::Result<T, Error>;

impl From<OutOfBounds> for Error {
    fn from(_: OutOfBounds) -> Self {
        Error::OutOfBounds
    }
}
