//! Internet protocol version 6 headers.
//!
//! Extension headers are not followed. A next header value other than TCP or UDP ends the
//! dissection with an unsupported protocol.
use core::fmt;
use core::ops::Range;
use byteorder::{ByteOrder, NetworkEndian};

use super::{BoundedView, Error, HeaderCodec, NextProtocol, Result};

pub use super::ip::Protocol;

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 16]);

impl Address {
    /// The [unspecified address].
    ///
    /// [unspecified address]: https://tools.ietf.org/html/rfc4291#section-2.5.2
    pub const UNSPECIFIED: Address = Address([0x00; 16]);

    /// The link-local [all nodes multicast address].
    ///
    /// [all nodes multicast address]: https://tools.ietf.org/html/rfc4291#section-2.7.1
    pub const LINK_LOCAL_ALL_NODES: Address =
        Address([0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// The [loopback address].
    ///
    /// [loopback address]: https://tools.ietf.org/html/rfc4291#section-2.5.3
    pub const LOOPBACK: Address =
        Address([0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// Construct an IPv6 address from parts.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        a0: u16, a1: u16, a2: u16, a3: u16,
        a4: u16, a5: u16, a6: u16, a7: u16,
    ) -> Address {
        let words = [a0, a1, a2, a3, a4, a5, a6, a7];
        let mut addr = [0u8; 16];
        let mut i = 0;
        while i < words.len() {
            let [hi, lo] = words[i].to_be_bytes();
            addr[2 * i] = hi;
            addr[2 * i + 1] = lo;
            i += 1;
        }
        Address(addr)
    }

    /// Construct an IPv6 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Write the address as a sequence of words, in host order.
    fn write_parts(&self, data: &mut [u16; 8]) {
        for (i, word) in data.iter_mut().enumerate() {
            let byte_idx = i * 2;
            *word = NetworkEndian::read_u16(&self.0[byte_idx..(byte_idx + 2)]);
        }
    }

    /// Return an IPv6 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

}

#[cfg(feature = "std")]
impl From<::std::net::Ipv6Addr> for Address {
    fn from(x: ::std::net::Ipv6Addr) -> Address {
        Address(x.octets())
    }
}

#[cfg(feature = "std")]
impl From<Address> for ::std::net::Ipv6Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv6Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // IPv4 mapped addresses keep the dotted quad, RFC 4291 section 2.5.5.2.
        if self.0[..12] == [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff] {
            return write!(f, "::ffff:{}.{}.{}.{}", self.0[12], self.0[13], self.0[14], self.0[15])
        }

        // The first run of zero words collapses to "::", see RFC 4291 section 2.2.
        enum State {
            Head,
            HeadBody,
            Tail,
            TailBody
        }
        let mut words = [0u16; 8];
        self.write_parts(&mut words);
        let mut state = State::Head;
        for word in words.iter() {
            state = match (*word, &state) {
                (0, &State::Head) | (0, &State::HeadBody) => {
                    write!(f, "::")?;
                    State::Tail
                },
                (0, &State::Tail) => State::Tail,
                (_, &State::Head) => {
                    write!(f, "{:x}", word)?;
                    State::HeadBody
                },
                (_, &State::Tail) => {
                    write!(f, "{:x}", word)?;
                    State::TailBody
                },
                (_, &State::HeadBody) | (_, &State::TailBody) => {
                    write!(f, ":{:x}", word)?;
                    state
                }
            }
        }
        Ok(())
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv6 packet header.
    #[derive(Debug, PartialEq, Eq)]
    pub struct packet([u8]);
}

mod field {
    use crate::wire::field::Field;
    // Version, traffic class and flow label share the first word.
    pub(crate) const VER_TC_FLOW: Field = 0..4;
    // Counts extension headers as payload.
    pub(crate) const LENGTH:      Field = 4..6;
    pub(crate) const NXT_HDR:     usize = 6;
    pub(crate) const HOP_LIMIT:   usize = 7;
    pub(crate) const SRC_ADDR:    Field = 8..24;
    pub(crate) const DST_ADDR:    Field = 24..40;
}

/// The length of the fixed IPv6 header.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

header_impl!(packet, HEADER_LEN);

impl packet {
    /// Create a raw octet buffer with an IPv6 packet structure.
    #[inline]
    pub fn new_unchecked(buffer: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Create a raw octet buffer with an IPv6 packet structure.
    #[inline]
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the packet as a mutable raw byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_TC_FLOW.start] >> 4
    }

    /// Return the traffic class.
    #[inline]
    pub fn traffic_class(&self) -> u8 {
        ((NetworkEndian::read_u16(&self.0[0..2]) & 0x0ff0) >> 4) as u8
    }

    /// Return the flow label field.
    #[inline]
    pub fn flow_label(&self) -> u32 {
        NetworkEndian::read_u24(&self.0[1..4]) & 0x000fffff
    }

    /// Return the payload length field.
    #[inline]
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the payload length added to the fixed header length.
    #[inline]
    pub fn total_len(&self) -> usize {
        HEADER_LEN + usize::from(self.payload_len())
    }

    /// Return the next header field.
    #[inline]
    pub fn next_header(&self) -> Protocol {
        Protocol::from(self.0[field::NXT_HDR])
    }

    /// Return the hop limit field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::HOP_LIMIT]
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        // Retain the higher order bits of the traffic class.
        self.0[0] = (self.0[0] & 0x0f) | ((value & 0x0f) << 4);
    }

    /// Set the traffic class field.
    #[inline]
    pub fn set_traffic_class(&mut self, value: u8) {
        let data = &mut self.0;
        data[0] = (data[0] & 0xf0) | ((value & 0xf0) >> 4);
        data[1] = (data[1] & 0x0f) | ((value & 0x0f) << 4);
    }

    /// Set the flow label field.
    #[inline]
    pub fn set_flow_label(&mut self, value: u32) {
        // Retain the lower order 4-bits of the traffic class
        let raw = (((self.0[1] & 0xf0) as u32) << 16) | (value & 0x0fffff);
        NetworkEndian::write_u24(&mut self.0[1..4], raw);
    }

    /// Set the payload length field.
    #[inline]
    pub fn set_payload_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value);
    }

    /// Set the next header field.
    #[inline]
    pub fn set_next_header(&mut self, value: Protocol) {
        self.0[field::NXT_HDR] = value.into();
    }

    /// Set the hop limit field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::HOP_LIMIT] = value;
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes());
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes());
    }
}

impl AsRef<[u8]> for packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The rewritable fields of an IPv6 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The source address.
    SrcAddr(Address),
    /// The destination address.
    DstAddr(Address),
    /// The hop limit.
    HopLimit(u8),
}

impl HeaderCodec for packet {
    type Repr = Repr;
    type Field = Field;

    const SELECTOR: Option<usize> = Some(field::NXT_HDR);

    fn decode(view: &mut BoundedView<'_>) -> Result<Repr> {
        let header = view.peek::<packet>()?;
        if header.version() != 6 { return Err(Error::Malformed) }
        // The payload must fit, trailing padding is allowed.
        if header.total_len() > view.remaining() { return Err(Error::OutOfBounds) }

        let repr = Repr::parse(header);
        view.advance(HEADER_LEN)?;
        Ok(repr)
    }

    fn field_range(field: &Field) -> Range<usize> {
        match field {
            Field::SrcAddr(_) => field::SRC_ADDR,
            Field::DstAddr(_) => field::DST_ADDR,
            Field::HopLimit(_) => field::HOP_LIMIT..field::HOP_LIMIT + 1,
        }
    }

    fn encode_field(&mut self, field: Field) {
        match field {
            Field::SrcAddr(addr) => self.set_src_addr(addr),
            Field::DstAddr(addr) => self.set_dst_addr(addr),
            Field::HopLimit(hop_limit) => self.set_hop_limit(hop_limit),
        }
    }

    fn selector(repr: &Repr) -> NextProtocol {
        repr.next_header.next()
    }
}

/// A high-level representation of an Internet Protocol version 6 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr:      Address,
    pub dst_addr:      Address,
    pub next_header:   Protocol,
    /// The length of the payload, including extension headers.
    pub payload_len:   u16,
    pub hop_limit:     u8,
    pub traffic_class: u8,
    /// The flow label, only the lower 20 bits are used.
    pub flow_label:    u32,
}

impl Repr {
    /// Parse an IPv6 header and return a high-level representation.
    pub fn parse(header: &packet) -> Repr {
        Repr {
            src_addr:      header.src_addr(),
            dst_addr:      header.dst_addr(),
            next_header:   header.next_header(),
            payload_len:   header.payload_len(),
            hop_limit:     header.hop_limit(),
            traffic_class: header.traffic_class(),
            flow_label:    header.flow_label(),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into an IPv6 header.
    pub fn emit(&self, header: &mut packet) {
        header.set_version(6);
        header.set_traffic_class(self.traffic_class);
        header.set_flow_label(self.flow_label);
        header.set_payload_len(self.payload_len);
        header.set_hop_limit(self.hop_limit);
        header.set_next_header(self.next_header);
        header.set_src_addr(self.src_addr);
        header.set_dst_addr(self.dst_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv6 src={} dst={} nxt_hdr={} hop_limit={}",
               self.src_addr, self.dst_addr, self.next_header, self.hop_limit)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LINK_LOCAL_ADDR: Address = Address([0xfe, 0x80, 0x00, 0x00,
                                              0x00, 0x00, 0x00, 0x00,
                                              0x00, 0x00, 0x00, 0x00,
                                              0x00, 0x00, 0x00, 0x01]);

    static REPR_PACKET_BYTES: [u8; 52] = [0x60, 0x00, 0x00, 0x00,
                                          0x00, 0x0c, 0x11, 0x40,
                                          0xfe, 0x80, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x01,
                                          0xff, 0x02, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x01,
                                          0x00, 0x01, 0x00, 0x02,
                                          0x00, 0x0c, 0x02, 0x4e,
                                          0xff, 0xff, 0xff, 0xff];

    #[test]
    fn test_address_format() {
        assert_eq!("ff02::1",
                   format!("{}", Address::LINK_LOCAL_ALL_NODES));
        assert_eq!("fe80::1",
                   format!("{}", LINK_LOCAL_ADDR));
        assert_eq!("fe80::7f00:0:1",
                   format!("{}", Address::new(0xfe80, 0, 0, 0, 0, 0x7f00, 0x0000, 0x0001)));
        assert_eq!("::",
                   format!("{}", Address::UNSPECIFIED));
        assert_eq!("::1",
                   format!("{}", Address::LOOPBACK));
        assert_eq!("::ffff:192.168.1.1",
                   format!("{}", Address::new(0, 0, 0, 0, 0, 0xffff, 0xc0a8, 0x0101)));
    }

    #[test]
    fn test_packet_deconstruction() {
        let header = packet::new_unchecked(&REPR_PACKET_BYTES[..]);
        assert_eq!(header.version(), 6);
        assert_eq!(header.traffic_class(), 0);
        assert_eq!(header.flow_label(), 0);
        assert_eq!(header.payload_len(), 0xc);
        assert_eq!(header.total_len(), 52);
        assert_eq!(header.next_header(), Protocol::Udp);
        assert_eq!(header.hop_limit(), 0x40);
        assert_eq!(header.src_addr(), LINK_LOCAL_ADDR);
        assert_eq!(header.dst_addr(), Address::LINK_LOCAL_ALL_NODES);
    }

    #[test]
    fn test_traffic_class_and_flow() {
        let mut bytes = REPR_PACKET_BYTES;
        let header = packet::new_unchecked_mut(&mut bytes[..]);
        header.set_traffic_class(0xab);
        header.set_flow_label(0xcdef1);
        assert_eq!(header.version(), 6);
        assert_eq!(header.traffic_class(), 0xab);
        assert_eq!(header.flow_label(), 0xcdef1);
        assert_eq!(&header.as_bytes()[..4], &[0x6a, 0xbc, 0xde, 0xf1]);
    }

    #[test]
    fn test_emit_reproduces() {
        let repr = Repr::parse(packet::new_unchecked(&REPR_PACKET_BYTES));
        let mut bytes = [0u8; 52];
        bytes[40..].copy_from_slice(&REPR_PACKET_BYTES[40..]);
        repr.emit(packet::new_unchecked_mut(&mut bytes));
        assert_eq!(bytes, REPR_PACKET_BYTES);
    }

    #[test]
    fn test_decode() {
        let mut bytes = REPR_PACKET_BYTES;
        let mut view = BoundedView::new(&mut bytes);
        let repr = packet::decode(&mut view).unwrap();
        assert_eq!(view.cursor(), HEADER_LEN);
        assert_eq!(repr.hop_limit, 0x40);
        assert_eq!(packet::selector(&repr), NextProtocol::Udp);
    }

    #[test]
    fn test_decode_rejects() {
        let mut bytes = REPR_PACKET_BYTES;
        bytes[0] = 0x40;
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::Malformed));

        // Payload length exceeding the buffer.
        let mut bytes = REPR_PACKET_BYTES;
        bytes[5] = 0x0d;
        let mut view = BoundedView::new(&mut bytes);
        assert_eq!(packet::decode(&mut view), Err(Error::OutOfBounds));
        assert_eq!(view.cursor(), 0);

        let mut bytes = [0x60; 39];
        assert_eq!(packet::decode(&mut BoundedView::new(&mut bytes)), Err(Error::OutOfBounds));
    }

    #[test]
    fn test_extension_header_unsupported() {
        let mut bytes = REPR_PACKET_BYTES;
        bytes[field::NXT_HDR] = Protocol::HopByHop.into();
        let repr = packet::decode(&mut BoundedView::new(&mut bytes)).unwrap();
        assert_eq!(packet::selector(&repr), NextProtocol::Unsupported(0));
    }

    #[test]
    fn test_encode_field() {
        let mut bytes = REPR_PACKET_BYTES;
        let header = packet::new_unchecked_mut(&mut bytes);
        header.encode_field(Field::DstAddr(LINK_LOCAL_ADDR));
        header.encode_field(Field::HopLimit(1));
        assert_eq!(header.dst_addr(), LINK_LOCAL_ADDR);
        assert_eq!(header.hop_limit(), 1);
        assert_eq!(packet::field_range(&Field::SrcAddr(LINK_LOCAL_ADDR)), 8..24);
    }
}
