//! Ethernet II frames.
use core::fmt;
use core::ops::Range;
use byteorder::{ByteOrder, NetworkEndian};

use super::{BoundedView, HeaderCodec, NextProtocol, Result};

enum_with_unknown! {
    /// Ethernet protocol type.
    pub doc enum EtherType(u16) {
        /// Internet protocol version 4.
        Ipv4 = 0x0800,
        /// Address resolution protocol.
        Arp  = 0x0806,
        /// 802.1Q VLAN tag.
        Vlan = 0x8100,
        /// Internet protocol version 6.
        Ipv6 = 0x86DD,
        /// Jumbo frame.
        JumboFrame = 0x8870,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Arp  => write!(f, "ARP"),
            EtherType::Vlan => write!(f, "802.1Q"),
            EtherType::JumboFrame => write!(f, "JumboFrame"),
            EtherType::Unknown(id) => write!(f, "0x{:04x}", id)
        }
    }
}

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
    }
}

byte_wrapper! {
    /// A byte sequence representing an Ethernet II frame header.
    #[derive(Debug, PartialEq, Eq)]
    pub struct frame([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const DESTINATION: Field =  0..6;
    pub(crate) const SOURCE:      Field =  6..12;
    pub(crate) const ETHERTYPE:   Field = 12..14;
    pub(crate) const PAYLOAD:     Rest  = 14..;
}

/// The length of an Ethernet II header.
pub const HEADER_LEN: usize = field::PAYLOAD.start;

header_impl!(frame, HEADER_LEN);

impl frame {
    /// Imbue a raw octet buffer with Ethernet frame structure.
    ///
    /// Accessors panic if the buffer is shorter than [`HEADER_LEN`].
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with Ethernet frame structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Unwrap the frame as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwrap the frame as a mutable raw byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DESTINATION])
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SOURCE])
    }

    /// Return the EtherType field, without checking for 802.1Q.
    pub fn ethertype(&self) -> EtherType {
        let raw = NetworkEndian::read_u16(&self.0[field::ETHERTYPE]);
        EtherType::from(raw)
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DESTINATION].copy_from_slice(value.as_bytes())
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SOURCE].copy_from_slice(value.as_bytes())
    }

    /// Set the EtherType field.
    pub fn set_ethertype(&mut self, value: EtherType) {
        NetworkEndian::write_u16(&mut self.0[field::ETHERTYPE], value.into())
    }
}

impl AsRef<[u8]> for frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The rewritable fields of an Ethernet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The destination hardware address.
    DstAddr(Address),
    /// The source hardware address.
    SrcAddr(Address),
    /// The protocol of the payload.
    EtherType(EtherType),
}

impl HeaderCodec for frame {
    type Repr = Repr;
    type Field = Field;

    const SELECTOR: Option<usize> = Some(field::ETHERTYPE.start);

    fn decode(view: &mut BoundedView<'_>) -> Result<Repr> {
        let header = view.commit::<frame>()?;
        Ok(Repr::parse(header))
    }

    fn field_range(field: &Field) -> Range<usize> {
        match field {
            Field::DstAddr(_) => field::DESTINATION,
            Field::SrcAddr(_) => field::SOURCE,
            Field::EtherType(_) => field::ETHERTYPE,
        }
    }

    fn encode_field(&mut self, field: Field) {
        match field {
            Field::DstAddr(addr) => self.set_dst_addr(addr),
            Field::SrcAddr(addr) => self.set_src_addr(addr),
            Field::EtherType(ethertype) => self.set_ethertype(ethertype),
        }
    }

    fn selector(repr: &Repr) -> NextProtocol {
        match repr.ethertype {
            EtherType::Ipv4 => NextProtocol::Ipv4,
            EtherType::Ipv6 => NextProtocol::Ipv6,
            other => NextProtocol::Unsupported(other.into()),
        }
    }
}

impl fmt::Display for frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EthernetII src={} dst={} type={}",
               self.src_addr(), self.dst_addr(), self.ethertype())
    }
}

/// A high-level representation of an Ethernet II frame header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr:    Address,
    pub dst_addr:    Address,
    pub ethertype:   EtherType,
}

impl Repr {
    /// Read the addresses and the EtherType out of a header.
    pub fn parse(header: &frame) -> Repr {
        Repr {
            src_addr: header.src_addr(),
            dst_addr: header.dst_addr(),
            ethertype: header.ethertype(),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Write every field of the representation into a header.
    pub fn emit(&self, header: &mut frame) {
        header.set_src_addr(self.src_addr);
        header.set_dst_addr(self.dst_addr);
        header.set_ethertype(self.ethertype);
    }
}
