//! The internet checksum.
//!
//! Full computation follows RFC 1071, incremental repair after rewriting a field follows
//! RFC 1624. All functions here are pure and operate on octets in network order; the sums they
//! return are in host order and are written with `NetworkEndian` like every other field.
//!
//! The incremental update never needs to look at more than the rewritten field:
//!
//! ```text
//! HC' = ~(~HC + ~m + m')
//! ```
//!
//! where `HC` is the old checksum field, `m` the old and `m'` the new 16-bit word. Fields longer
//! than 16 bits are treated as a sequence of words. A repaired checksum is identical to a full
//! recomputation because a one's complement sum over data that is not entirely zero is never
//! `0x0000`, and the pseudo header always contributes a non-zero protocol number.
use byteorder::{ByteOrder, NetworkEndian};

use super::ip::Protocol;
use super::{ipv4, ipv6};

fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 compliant checksum (without the final complement).
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum = 0;

    // For each 32-byte chunk...
    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        // ... take by 2 bytes and sum them.
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }

        data = &data[CHUNK_SIZE..];
    }

    // Sum the rest that does not fit the last 32-byte chunk,
    // taking by 2 bytes.
    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    // Add the last remaining odd byte, if any.
    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 compliant checksums.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// Incrementally repair a checksum field after `old` was overwritten with `new`.
///
/// Both slices hold the affected octets in network order, starting at an even offset of the
/// checksummed data. They must have the same length; an odd trailing octet is treated as the
/// high half of a word, like [`data`] does.
pub fn repair(checksum: u16, old: &[u8], new: &[u8]) -> u16 {
    debug_assert_eq!(old.len(), new.len());
    // ~m summed word by word is the complement of the sum of m.
    !combine(&[!checksum, !data(old), data(new)])
}

/// The IP derived fields covered by a TCP or UDP checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    /// The IPv4 pseudo header.
    Ipv4 {
        src_addr: ipv4::Address,
        dst_addr: ipv4::Address,
        protocol: Protocol,
        length: u16,
    },
    /// The IPv6 pseudo header.
    Ipv6 {
        src_addr: ipv6::Address,
        dst_addr: ipv6::Address,
        protocol: Protocol,
        length: u32,
    },
}

impl PseudoHeader {
    /// Sum the pseudo header (without the final complement).
    pub fn checksum(&self) -> u16 {
        match self {
            PseudoHeader::Ipv4 { src_addr, dst_addr, protocol, length } => {
                let mut proto_len = [0u8; 4];
                proto_len[1] = (*protocol).into();
                NetworkEndian::write_u16(&mut proto_len[2..4], *length);

                combine(&[
                    data(src_addr.as_bytes()),
                    data(dst_addr.as_bytes()),
                    data(&proto_len[..])
                ])
            },
            PseudoHeader::Ipv6 { src_addr, dst_addr, protocol, length } => {
                let mut proto_len = [0u8; 8];
                proto_len[7] = (*protocol).into();
                NetworkEndian::write_u32(&mut proto_len[0..4], *length);

                combine(&[
                    data(src_addr.as_bytes()),
                    data(dst_addr.as_bytes()),
                    data(&proto_len[..])
                ])
            },
        }
    }
}

/// Compute a transport checksum over a pseudo header and a segment from scratch.
///
/// The checksum field within `segment` must be zero. The result is the value to store, before
/// any protocol specific substitution (see UDP).
pub fn transport(pseudo: &PseudoHeader, segment: &[u8]) -> u16 {
    !combine(&[pseudo.checksum(), data(segment)])
}

/// Check a transport segment, including its checksum field, against the pseudo header.
pub fn verify_transport(pseudo: &PseudoHeader, segment: &[u8]) -> bool {
    combine(&[pseudo.checksum(), data(segment)]) == !0
}

#[cfg(test)]
mod test {
    use super::*;

    // Example from RFC 1071 section 3.
    static RFC1071_BYTES: [u8; 8] = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];

    #[test]
    fn rfc1071_sum() {
        assert_eq!(data(&RFC1071_BYTES), 0xddf2);
    }

    #[test]
    fn odd_trailing_byte() {
        assert_eq!(data(&[0x12, 0x34, 0x56]), 0x1234 + 0x5600);
    }

    #[test]
    fn combine_folds_carries() {
        assert_eq!(combine(&[0xffff, 0x0001]), 0x0001);
        assert_eq!(combine(&[0x8000, 0x8000]), 0x0001);
    }

    #[test]
    fn repair_matches_recompute() {
        let mut bytes = [0x45, 0x00, 0x00, 0x1e, 0x01, 0x02, 0x62, 0x03,
                         0x1a, 0x01, 0x00, 0x00, 0x11, 0x12, 0x13, 0x14,
                         0x21, 0x22, 0x23, 0x24];
        let before = !data(&bytes);

        let old = [bytes[16], bytes[17], bytes[18], bytes[19]];
        bytes[16..20].copy_from_slice(&[192, 168, 7, 1]);
        let repaired = repair(before, &old, &bytes[16..20]);

        assert_eq!(repaired, !data(&bytes));
    }

    #[test]
    fn repair_identity() {
        assert_eq!(repair(0x1234, &[0xab, 0xcd], &[0xab, 0xcd]), 0x1234);
    }

    #[test]
    fn pseudo_header_v4() {
        let pseudo = PseudoHeader::Ipv4 {
            src_addr: ipv4::Address::new(192, 168, 1, 1),
            dst_addr: ipv4::Address::new(192, 168, 1, 2),
            protocol: Protocol::Udp,
            length: 8,
        };
        // 0xc0a8 + 0x0101 + 0xc0a8 + 0x0102 + 0x0011 + 0x0008
        assert_eq!(pseudo.checksum(), combine(&[0xc0a8, 0x0101, 0xc0a8, 0x0102, 0x0011, 0x0008]));
    }
}
