//! Transmission control protocol headers.
//!
//! Only the header is interpreted. Options are bounds checked as part of the header but their
//! content is left alone, and the connection state is of no concern to a packet filter.
use core::fmt;
use core::ops::Range;
use byteorder::{ByteOrder, NetworkEndian};

use super::{BoundedView, Error, HeaderCodec, NextProtocol, Result};
use super::checksum::{self, PseudoHeader};

/// The twelve flag bits of a TCP header, including the three reserved bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u16);

impl Flags {
    /// No more data from the sender.
    pub const FIN: Flags = Flags(0x001);
    /// Synchronize sequence numbers.
    pub const SYN: Flags = Flags(0x002);
    /// Reset the connection.
    pub const RST: Flags = Flags(0x004);
    /// Push function.
    pub const PSH: Flags = Flags(0x008);
    /// The acknowledgement number is significant.
    pub const ACK: Flags = Flags(0x010);
    /// The urgent pointer is significant.
    pub const URG: Flags = Flags(0x020);
    /// ECN echo.
    pub const ECE: Flags = Flags(0x040);
    /// Congestion window reduced.
    pub const CWR: Flags = Flags(0x080);
    /// ECN nonce, RFC 3540.
    pub const NS:  Flags = Flags(0x100);

    /// Check whether all bits of `other` are set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

byte_wrapper! {
    /// A byte sequence representing a TCP header, optionally followed by the payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct packet([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;
}

/// The length of a TCP header without options.
pub const HEADER_LEN: usize = field::URGENT.end;

header_impl!(packet, HEADER_LEN);

impl packet {
    /// Imbue a raw octet buffer with TCP structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with TCP structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// View the segment as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the segment as a mutable raw byte slice.
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

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> u32 {
        NetworkEndian::read_u32(&self.0[field::SEQ_NUM])
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> u32 {
        NetworkEndian::read_u32(&self.0[field::ACK_NUM])
    }

    /// Read all flags at once.
    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0xfff)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        ((raw >> 12) * 4) as u8
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// Return the options, or an empty slice if the wrapper does not span them.
    pub fn options(&self) -> &[u8] {
        let end = usize::from(self.header_len());
        self.0.get(HEADER_LEN..end).unwrap_or(&[])
    }

    /// Validate the segment checksum.
    ///
    /// The wrapper must span the whole segment that the pseudo header describes.
    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        checksum::verify_transport(pseudo, &self.0)
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

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.0[field::SEQ_NUM], value)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.0[field::ACK_NUM], value)
    }

    /// Set a combination of flags.
    #[inline]
    pub fn set_flags(&mut self, Flags(flags): Flags) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]) & !0xfff;
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], raw | (flags & 0xfff))
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        let raw = (raw & !0xf000) | ((value as u16) / 4) << 12;
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], raw)
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill in the checksum over the whole wrapped segment.
    pub fn fill_checksum(&mut self, pseudo: &PseudoHeader) {
        self.set_checksum(0);
        let checksum = checksum::transport(pseudo, &self.0);
        self.set_checksum(checksum)
    }
}

impl AsRef<[u8]> for packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Flags::SYN, "syn"), (Flags::FIN, "fin"), (Flags::RST, "rst"),
            (Flags::PSH, "psh"), (Flags::ACK, "ack"), (Flags::URG, "urg"),
            (Flags::ECE, "ece"), (Flags::CWR, "cwr"), (Flags::NS, "ns"),
        ];
        let mut first = true;
        for &(flag, name) in names.iter() {
            if !self.contains(flag) { continue }
            if !first { write!(f, ",")?; }
            write!(f, "{}", name)?;
            first = false;
        }
        Ok(())
    }
}

/// The rewritable fields of a TCP header.
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
        let fixed = view.peek::<packet>()?;
        let header_len = usize::from(fixed.header_len());
        if header_len < HEADER_LEN { return Err(Error::Malformed) }

        // Options must be within the buffer as well.
        let header = view.peek_len::<packet>(header_len)?;
        let repr = Repr::parse(header);
        view.advance(header_len)?;
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

/// A high-level representation of a TCP header, without options.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_port:   u16,
    pub dst_port:   u16,
    pub seq_number: u32,
    pub ack_number: u32,
    /// The header length including options, in octets.
    pub header_len: u8,
    pub flags:      Flags,
    pub window_len: u16,
    pub checksum:   u16,
    pub urgent_at:  u16,
}

impl Repr {
    /// Parse the fixed part of a TCP header and return a high-level representation.
    pub fn parse(header: &packet) -> Repr {
        Repr {
            src_port:   header.src_port(),
            dst_port:   header.dst_port(),
            seq_number: header.seq_number(),
            ack_number: header.ack_number(),
            header_len: header.header_len(),
            flags:      header.flags(),
            window_len: header.window_len(),
            checksum:   header.checksum(),
            urgent_at:  header.urgent_at(),
        }
    }

    /// Return the length of the header including options.
    pub fn header_len(&self) -> usize {
        usize::from(self.header_len)
    }

    /// Emit a high-level representation into a TCP header.
    ///
    /// The stored checksum is written as is, use [`packet::fill_checksum`] to recompute it.
    pub fn emit(&self, header: &mut packet) {
        header.set_src_port(self.src_port);
        header.set_dst_port(self.dst_port);
        header.set_seq_number(self.seq_number);
        header.set_ack_number(self.ack_number);
        header.set_header_len(self.header_len);
        header.set_flags(self.flags);
        header.set_window_len(self.window_len);
        header.set_checksum(self.checksum);
        header.set_urgent_at(self.urgent_at);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} [{}] seq={} ack={} win={}",
               self.src_port, self.dst_port, self.flags,
               self.seq_number, self.ack_number, self.window_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::ip::Protocol;
    use crate::wire::ipv4::Address as Ipv4Address;

    const SRC_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 1]);
    const DST_ADDR: Ipv4Address = Ipv4Address([192, 168, 1, 2]);

    static PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x35, 0x01, 0x23,
         0x01, 0xb6, 0x02, 0x01,
         0x03, 0x03, 0x0c, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    static OPTION_BYTES: [u8; 4] =
        [0x03, 0x03, 0x0c, 0x01];

    fn pseudo() -> PseudoHeader {
        PseudoHeader::Ipv4 {
            src_addr: SRC_ADDR,
            dst_addr: DST_ADDR,
            protocol: Protocol::Tcp,
            length: PACKET_BYTES.len() as u16,
        }
    }

    #[test]
    fn test_deconstruct() {
        let header = packet::new_unchecked(&PACKET_BYTES[..]);
        assert_eq!(header.src_port(), 48896);
        assert_eq!(header.dst_port(), 80);
        assert_eq!(header.seq_number(), 0x01234567);
        assert_eq!(header.ack_number(), 0x89abcdef);
        assert_eq!(header.header_len(), 24);
        assert_eq!(header.flags(), Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
        assert!(!header.flags().contains(Flags::SYN));
        assert_eq!(header.window_len(), 0x0123);
        assert_eq!(header.urgent_at(), 0x0201);
        assert_eq!(header.checksum(), 0x01b6);
        assert_eq!(header.options(), &OPTION_BYTES[..]);
        assert_eq!(header.verify_checksum(&pseudo()), true);
    }

    #[test]
    fn test_construct() {
        let mut bytes = [0xa5; 28];
        bytes[20..].copy_from_slice(&PACKET_BYTES[20..]);
        let header = packet::new_unchecked_mut(&mut bytes);
        header.set_src_port(48896);
        header.set_dst_port(80);
        header.set_seq_number(0x01234567);
        header.set_ack_number(0x89abcdef);
        header.set_header_len(24);
        header.set_flags(Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
        header.set_window_len(0x0123);
        header.set_urgent_at(0x0201);
        header.set_checksum(0xEEEE);
        header.fill_checksum(&pseudo());
        assert_eq!(header.as_bytes(), &PACKET_BYTES[..]);
    }

    #[test]
    fn test_truncated() {
        let mut bytes = PACKET_BYTES;
        let mut view = BoundedView::new(&mut bytes[..23]);
        assert_eq!(packet::decode(&mut view), Err(Error::OutOfBounds));
        assert_eq!(view.cursor(), 0);
    }

    #[test]
    fn test_decode() {
        let mut bytes = PACKET_BYTES;
        let mut view = BoundedView::new(&mut bytes);
        let repr = packet::decode(&mut view).unwrap();
        assert_eq!(view.cursor(), 24);
        assert_eq!(repr.header_len(), 24);
        assert_eq!(repr.dst_port, 80);
        assert_eq!(packet::selector(&repr), NextProtocol::End);
    }

    #[test]
    fn test_small_data_offset() {
        let mut bytes = PACKET_BYTES;
        bytes[12] = 0x40;
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::Malformed));
    }

    #[test]
    fn test_emit_reproduces() {
        let repr = Repr::parse(packet::new_unchecked(&PACKET_BYTES));
        let mut bytes = PACKET_BYTES;
        bytes[..20].copy_from_slice(&[0; 20]);
        repr.emit(packet::new_unchecked_mut(&mut bytes));
        assert_eq!(bytes, PACKET_BYTES);
    }

    #[test]
    fn test_encode_field() {
        let mut bytes = PACKET_BYTES;
        let header = packet::new_unchecked_mut(&mut bytes);
        header.encode_field(Field::DstPort(8080));
        assert_eq!(header.dst_port(), 8080);
        assert_eq!(&header.as_bytes()[packet::field_range(&Field::DstPort(0))], &[0x1f, 0x90]);
    }
}
