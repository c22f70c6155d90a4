//! Internet protocol version 4 headers.
use core::fmt;
use core::ops::Range;
use byteorder::{ByteOrder, NetworkEndian};

use super::{BoundedView, Checksum, Error, HeaderCodec, NextProtocol, Result};
use super::checksum;

pub use super::ip::Protocol;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

}

#[cfg(feature = "std")]
impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

#[cfg(feature = "std")]
impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet header.
    #[derive(Debug, PartialEq, Eq)]
    pub struct packet([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// The length of an IPv4 header without options.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

header_impl!(packet, HEADER_LEN);

impl packet {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &packet {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut packet {
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
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the Differential Services Code Point field.
    pub fn dscp(&self) -> u8 {
        self.0[field::DSCP_ECN] >> 2
    }

    /// Return the Explicit Congestion Notification field.
    pub fn ecn(&self) -> u8 {
        self.0[field::DSCP_ECN] & 0x03
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the fragment identification field.
    #[inline]
    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::IDENT])
    }

    /// Return the reserved flag, the most significant bit of the flags.
    #[inline]
    pub fn reserved_flag(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x8000 != 0
    }

    /// Return the "don't fragment" flag.
    #[inline]
    pub fn dont_frag(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x4000 != 0
    }

    /// Return the "more fragments" flag.
    #[inline]
    pub fn more_frags(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x2000 != 0
    }

    /// Return the fragment offset, in octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) << 3
    }

    /// Return the time to live field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the header checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
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

    /// Validate the header checksum, including options.
    ///
    /// The wrapper must span the whole header, which is the case for every header handed out by
    /// the dissector.
    pub fn verify_checksum(&self) -> bool {
        match self.0.get(..usize::from(self.header_len())) {
            Some(header) => checksum::data(header) == !0,
            None => false,
        }
    }

    /// Set the version field.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0xf0) | (value << 4);
    }

    /// Set the header length, in octets.
    #[inline]
    pub fn set_header_len(&mut self, value: u8) {
        self.0[field::VER_IHL] = (self.0[field::VER_IHL] & !0x0f) | ((value / 4) & 0x0f);
    }

    /// Set the Differential Services Code Point field.
    pub fn set_dscp(&mut self, value: u8) {
        self.0[field::DSCP_ECN] = (self.0[field::DSCP_ECN] & !0xfc) | (value << 2)
    }

    /// Set the Explicit Congestion Notification field.
    pub fn set_ecn(&mut self, value: u8) {
        self.0[field::DSCP_ECN] = (self.0[field::DSCP_ECN] & !0x03) | (value & 0x03)
    }

    /// Set the total length field.
    #[inline]
    pub fn set_total_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value)
    }

    /// Set the fragment identification field.
    #[inline]
    pub fn set_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::IDENT], value)
    }

    /// Clear the entire flags field.
    #[inline]
    pub fn clear_flags(&mut self) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = raw & !0xe000;
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the reserved flag.
    #[inline]
    pub fn set_reserved_flag(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | 0x8000 } else { raw & !0x8000 };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the "don't fragment" flag.
    #[inline]
    pub fn set_dont_frag(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | 0x4000 } else { raw & !0x4000 };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the "more fragments" flag.
    #[inline]
    pub fn set_more_frags(&mut self, value: bool) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = if value { raw | 0x2000 } else { raw & !0x2000 };
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the fragment offset, in octets.
    #[inline]
    pub fn set_frag_offset(&mut self, value: u16) {
        let raw = NetworkEndian::read_u16(&self.0[field::FLG_OFF]);
        let raw = (raw & 0xe000) | (value >> 3);
        NetworkEndian::write_u16(&mut self.0[field::FLG_OFF], raw);
    }

    /// Set the time to live field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::TTL] = value
    }

    /// Set the protocol field.
    #[inline]
    pub fn set_protocol(&mut self, value: Protocol) {
        self.0[field::PROTOCOL] = value.into()
    }

    /// Set the header checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes())
    }

    /// Compute and fill in the header checksum.
    ///
    /// Options are included when the wrapper spans them.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let header_len = usize::from(self.header_len()).min(self.0.len());
        let checksum = !checksum::data(&self.0[..header_len]);
        self.set_checksum(checksum)
    }

}

impl AsRef<[u8]> for packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for packet {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// The rewritable fields of an IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The source address.
    SrcAddr(Address),
    /// The destination address.
    DstAddr(Address),
    /// The time to live.
    HopLimit(u8),
    /// The Differentiated Services Code Point, the upper six bits of the second octet.
    Dscp(u8),
}

impl HeaderCodec for packet {
    type Repr = Repr;
    type Field = Field;

    const SELECTOR: Option<usize> = Some(field::PROTOCOL);

    fn decode(view: &mut BoundedView<'_>) -> Result<Repr> {
        let fixed = view.peek::<packet>()?;
        // Version 4 is expected.
        if fixed.version() != 4 { return Err(Error::Malformed) }
        let header_len = usize::from(fixed.header_len());
        if header_len < HEADER_LEN { return Err(Error::Malformed) }

        // Options must be within the buffer as well.
        let header = view.peek_len::<packet>(header_len)?;
        let total_len = usize::from(header.total_len());
        if total_len < header_len { return Err(Error::Malformed) }
        // Trailing link layer padding is fine, a truncated payload is not.
        if total_len > view.remaining() { return Err(Error::OutOfBounds) }

        let repr = Repr::parse(header);
        view.advance(header_len)?;
        Ok(repr)
    }

    fn field_range(field: &Field) -> Range<usize> {
        match field {
            Field::SrcAddr(_) => field::SRC_ADDR,
            Field::DstAddr(_) => field::DST_ADDR,
            Field::HopLimit(_) => field::TTL..field::TTL + 1,
            Field::Dscp(_) => field::DSCP_ECN..field::DSCP_ECN + 1,
        }
    }

    fn encode_field(&mut self, field: Field) {
        match field {
            Field::SrcAddr(addr) => self.set_src_addr(addr),
            Field::DstAddr(addr) => self.set_dst_addr(addr),
            Field::HopLimit(ttl) => self.set_hop_limit(ttl),
            Field::Dscp(dscp) => self.set_dscp(dscp),
        }
    }

    fn selector(repr: &Repr) -> NextProtocol {
        repr.protocol.next()
    }
}

/// A high-level representation of an Internet Protocol version 4 packet header.
///
/// All fixed header fields are kept, options are not. Emitting a parsed representation into
/// the header it came from leaves the fixed header unchanged.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr:    Address,
    pub dst_addr:    Address,
    pub protocol:    Protocol,
    /// The header length including options, in octets.
    pub header_len:  u8,
    /// The total length of header and payload, in octets.
    pub total_len:   u16,
    pub dscp:        u8,
    pub ecn:         u8,
    pub ident:       u16,
    /// The reserved flag bit, kept so that emitting reproduces it.
    pub reserved_flag: bool,
    pub dont_frag:   bool,
    pub more_frags:  bool,
    pub frag_offset: u16,
    pub hop_limit:   u8,
    pub checksum:    u16,
}

impl Repr {
    /// Parse the fixed part of an IPv4 header and return a high-level representation.
    ///
    /// No consistency checks are performed here, that is the job of [`HeaderCodec::decode`].
    pub fn parse(header: &packet) -> Repr {
        // All DSCP and ECN values are acceptable, we only forward.
        Repr {
            src_addr:    header.src_addr(),
            dst_addr:    header.dst_addr(),
            protocol:    header.protocol(),
            header_len:  header.header_len(),
            total_len:   header.total_len(),
            dscp:        header.dscp(),
            ecn:         header.ecn(),
            ident:       header.ident(),
            reserved_flag: header.reserved_flag(),
            dont_frag:   header.dont_frag(),
            more_frags:  header.more_frags(),
            frag_offset: header.frag_offset(),
            hop_limit:   header.hop_limit(),
            checksum:    header.checksum(),
        }
    }

    /// The length of the payload as announced by the length fields.
    pub fn payload_len(&self) -> usize {
        usize::from(self.total_len).saturating_sub(usize::from(self.header_len))
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        usize::from(self.header_len)
    }

    /// Emit a high-level representation into an IPv4 header.
    ///
    /// With `Checksum::Manual` the checksum is recomputed, otherwise the stored one is written.
    pub fn emit(&self, header: &mut packet, checksum: Checksum) {
        header.set_version(4);
        header.set_header_len(self.header_len);
        header.set_dscp(self.dscp);
        header.set_ecn(self.ecn);
        header.set_total_len(self.total_len);
        header.set_ident(self.ident);
        header.clear_flags();
        header.set_reserved_flag(self.reserved_flag);
        header.set_more_frags(self.more_frags);
        header.set_dont_frag(self.dont_frag);
        header.set_frag_offset(self.frag_offset);
        header.set_hop_limit(self.hop_limit);
        header.set_protocol(self.protocol);
        header.set_src_addr(self.src_addr);
        header.set_dst_addr(self.dst_addr);

        if checksum.manual() {
            header.fill_checksum();
        } else {
            header.set_checksum(self.checksum);
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={} ttl={}",
               self.src_addr, self.dst_addr, self.protocol, self.hop_limit)?;
        if self.header_len != 20 {
            write!(f, " hlen={}", self.header_len)?;
        }
        if self.dscp != 0 {
            write!(f, " dscp={}", self.dscp)?;
        }
        write!(f, " tlen={}", self.total_len)
    }
}
