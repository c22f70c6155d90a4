//! User datagram protocol headers.
use core::fmt;
use core::ops::Range;
use byteorder::{ByteOrder, NetworkEndian};

use super::{BoundedView, Error, HeaderCodec, NextProtocol, Result};
use super::checksum::{self, PseudoHeader};

byte_wrapper! {
    /// A byte sequence representing a UDP header, optionally followed by the payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct packet([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const LENGTH:   Field = 4..6;
    pub(crate) const CHECKSUM: Field = 6..8;
}

/// The length of a UDP header.
pub const HEADER_LEN: usize = field::CHECKSUM.end;

header_impl!(packet, HEADER_LEN);

impl packet {
    /// Imbue a raw octet buffer with UDP packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with UDP packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// View the datagram as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the datagram as a mutable raw byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the length field.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the length field.
    #[inline]
    pub fn set_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// The octets covered by the length field, or the whole wrapper if it is shorter.
    fn datagram(&self) -> &[u8] {
        let len = usize::from(self.len()).min(self.0.len());
        &self.0[..len]
    }

    /// Compute and fill in the checksum.
    pub fn fill_checksum(&mut self, pseudo: &PseudoHeader) {
        self.set_checksum(0);
        let checksum = checksum::transport(pseudo, self.datagram());
        // Zero is reserved for "no checksum", all ones is the same value in one's complement.
        self.set_checksum(if checksum == 0 { 0xffff } else { checksum })
    }

    /// Validate the packet checksum.
    ///
    /// A zero checksum over IPv4 means that the sender did not compute one, which is accepted.
    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        if self.checksum() == 0 {
            if let PseudoHeader::Ipv4 { .. } = pseudo {
                return true;
            }
        }

        checksum::verify_transport(pseudo, self.datagram())
    }
}

impl AsRef<[u8]> for packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The rewritable fields of a UDP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The source port.
    SrcPort(u16),
    /// The destination port.
    DstPort(u16),
}

impl HeaderCodec for packet {
    type Repr = Repr;
    type Field = Field;

    const SELECTOR: Option<usize> = None;

    fn decode(view: &mut BoundedView<'_>) -> Result<Repr> {
        let header = view.peek::<packet>()?;
        let length = usize::from(header.len());
        if length < HEADER_LEN { return Err(Error::Malformed) }
        if length > view.remaining() { return Err(Error::OutOfBounds) }

        let repr = Repr::parse(header);
        view.advance(HEADER_LEN)?;
        Ok(repr)
    }

    fn field_range(field: &Field) -> Range<usize> {
        match field {
            Field::SrcPort(_) => field::SRC_PORT,
            Field::DstPort(_) => field::DST_PORT,
        }
    }

    fn encode_field(&mut self, field: Field) {
        match field {
            Field::SrcPort(port) => self.set_src_port(port),
            Field::DstPort(port) => self.set_dst_port(port),
        }
    }

    fn selector(_: &Repr) -> NextProtocol {
        NextProtocol::End
    }
}

/// A high-level representation of a User Datagram Protocol header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_port: u16,
    pub dst_port: u16,
    /// The length of header and payload, in octets.
    pub length:   u16,
    pub checksum: u16,
}

impl Repr {
    /// Parse a UDP header and return a high-level representation.
    pub fn parse(header: &packet) -> Repr {
        Repr {
            src_port: header.src_port(),
            dst_port: header.dst_port(),
            length:   header.len(),
            checksum: header.checksum(),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// The length of the payload, in octets.
    pub fn payload_len(&self) -> usize {
        usize::from(self.length).saturating_sub(HEADER_LEN)
    }

    /// Emit a high-level representation into a UDP header.
    pub fn emit(&self, header: &mut packet) {
        header.set_src_port(self.src_port);
        header.set_dst_port(self.dst_port);
        header.set_len(self.length);
        header.set_checksum(self.checksum);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UDP src={} dst={} len={}",
               self.src_port, self.dst_port, self.payload_len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::ip::Protocol;
    use crate::wire::ipv4::Address as Ipv4Address;

    const SRC_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 1]);
    const DST_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 2]);

    static PACKET_BYTES: [u8; 12] =
        [0xbf, 0x00, 0x00, 0x35,
         0x00, 0x0c, 0x12, 0x4d,
         0xaa, 0x00, 0x00, 0xff];

    fn pseudo(length: u16) -> PseudoHeader {
        PseudoHeader::Ipv4 {
            src_addr: SRC_ADDR,
            dst_addr: DST_ADDR,
            protocol: Protocol::Udp,
            length,
        }
    }

    #[test]
    fn test_deconstruct() {
        let header = packet::new_unchecked(&PACKET_BYTES[..]);
        assert_eq!(header.src_port(), 48896);
        assert_eq!(header.dst_port(), 53);
        assert_eq!(header.len(), 12);
        assert_eq!(header.checksum(), 0x124d);
        assert_eq!(header.verify_checksum(&pseudo(12)), true);
    }

    #[test]
    fn test_construct() {
        let mut bytes = [0xa5; 12];
        bytes[8..].copy_from_slice(&PACKET_BYTES[8..]);
        let header = packet::new_unchecked_mut(&mut bytes);
        header.set_src_port(48896);
        header.set_dst_port(53);
        header.set_len(12);
        header.set_checksum(0xffff);
        header.fill_checksum(&pseudo(12));
        assert_eq!(header.as_bytes(), &PACKET_BYTES[..]);
    }

    #[test]
    fn test_zero_checksum() {
        let mut bytes = PACKET_BYTES;
        let header = packet::new_unchecked_mut(&mut bytes);
        header.set_checksum(0);
        assert!(header.verify_checksum(&pseudo(12)));
    }

    #[test]
    fn test_zero_checksum_becomes_ones() {
        // A datagram whose checksum computes to zero, found by cancelling the pseudo header.
        let mut bytes = [0u8; 8];
        let pseudo = pseudo(8);
        {
            let header = packet::new_unchecked_mut(&mut bytes);
            header.set_len(8);
            header.set_src_port(0);
            header.fill_checksum(&pseudo);
            let sum = !header.checksum();
            // Choose the source port so that the one's complement sum is all ones.
            header.set_src_port(!sum);
            header.fill_checksum(&pseudo);
            assert_eq!(header.checksum(), 0xffff);
        }
        assert!(packet::new_unchecked(&bytes).verify_checksum(&pseudo));
    }

    #[test]
    fn test_decode() {
        let mut bytes = PACKET_BYTES;
        let mut view = BoundedView::new(&mut bytes);
        let repr = packet::decode(&mut view).unwrap();
        assert_eq!(view.cursor(), HEADER_LEN);
        assert_eq!(repr.payload_len(), 4);
        assert_eq!(packet::selector(&repr), NextProtocol::End);
    }

    #[test]
    fn test_decode_rejects() {
        let mut bytes = PACKET_BYTES;
        bytes[5] = 7;
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::Malformed));

        let mut bytes = PACKET_BYTES;
        bytes[5] = 13;
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::OutOfBounds));

        let mut bytes = [0u8; 7];
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::OutOfBounds));
    }

    #[test]
    fn test_emit_reproduces() {
        let repr = Repr::parse(packet::new_unchecked(&PACKET_BYTES));
        let mut bytes = PACKET_BYTES;
        bytes[..8].copy_from_slice(&[0; 8]);
        repr.emit(packet::new_unchecked_mut(&mut bytes));
        assert_eq!(bytes, PACKET_BYTES);
    }

    #[test]
    fn test_encode_field() {
        let mut bytes = PACKET_BYTES;
        let header = packet::new_unchecked_mut(&mut bytes);
        header.encode_field(Field::SrcPort(4789));
        assert_eq!(header.src_port(), 4789);
        assert_eq!(packet::field_range(&Field::SrcPort(0)), 0..2);
    }
}
