//! In-place rewriting of header fields.
//!
//! A field edit and the repair of every checksum covering that field happen in one call to
//! [`Packet::set_field`]. All byte ranges the edit touches are checked against the buffer before
//! the first octet is written, so an edit either applies completely or leaves the packet as it
//! was. Checksums are repaired incrementally (RFC 1624) from the octets before and after the
//! write, which gives the same value as a full recomputation.
use core::ops::Range;

use crate::dissect::ParsedHeader;
use crate::packet::Packet;
use crate::wire::{checksum, Error, HeaderCodec, Result};
use crate::wire::{ethernet, ipv4, ipv6, tcp, udp};

/// A header field and its new value, in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The Ethernet destination address.
    EthDstAddr(ethernet::Address),
    /// The Ethernet source address.
    EthSrcAddr(ethernet::Address),
    /// The EtherType.
    ///
    /// The header chain is not dissected again, later layers keep their interpretation.
    EtherType(ethernet::EtherType),
    /// The IPv4 source address.
    Ipv4SrcAddr(ipv4::Address),
    /// The IPv4 destination address.
    Ipv4DstAddr(ipv4::Address),
    /// The IPv4 time to live.
    Ipv4HopLimit(u8),
    /// The IPv4 DSCP. Only values up to 63 fit into its six bits.
    Ipv4Dscp(u8),
    /// The IPv6 source address.
    Ipv6SrcAddr(ipv6::Address),
    /// The IPv6 destination address.
    Ipv6DstAddr(ipv6::Address),
    /// The IPv6 hop limit.
    Ipv6HopLimit(u8),
    /// The TCP or UDP source port.
    SrcPort(u16),
    /// The TCP or UDP destination port.
    DstPort(u16),
}

impl Field {
    fn applies_to(&self, header: &ParsedHeader) -> bool {
        match (self, header) {
            (Field::EthDstAddr(_), ParsedHeader::Ethernet(_))
            | (Field::EthSrcAddr(_), ParsedHeader::Ethernet(_))
            | (Field::EtherType(_), ParsedHeader::Ethernet(_)) => true,
            (Field::Ipv4SrcAddr(_), ParsedHeader::Ipv4(_))
            | (Field::Ipv4DstAddr(_), ParsedHeader::Ipv4(_))
            | (Field::Ipv4HopLimit(_), ParsedHeader::Ipv4(_))
            | (Field::Ipv4Dscp(_), ParsedHeader::Ipv4(_)) => true,
            (Field::Ipv6SrcAddr(_), ParsedHeader::Ipv6(_))
            | (Field::Ipv6DstAddr(_), ParsedHeader::Ipv6(_))
            | (Field::Ipv6HopLimit(_), ParsedHeader::Ipv6(_)) => true,
            (Field::SrcPort(_), ParsedHeader::Tcp(_))
            | (Field::SrcPort(_), ParsedHeader::Udp(_))
            | (Field::DstPort(_), ParsedHeader::Tcp(_))
            | (Field::DstPort(_), ParsedHeader::Udp(_)) => true,
            _ => false,
        }
    }

    /// Whether the new value fits into the bits of the field.
    fn fits(&self) -> bool {
        match self {
            Field::Ipv4Dscp(dscp) => *dscp <= 0x3f,
            _ => true,
        }
    }

    /// Whether the field is part of the transport pseudo header.
    fn in_pseudo_header(&self) -> bool {
        matches!(self,
            Field::Ipv4SrcAddr(_) | Field::Ipv4DstAddr(_)
            | Field::Ipv6SrcAddr(_) | Field::Ipv6DstAddr(_))
    }
}

/// The 16-bit aligned octets around a rewritten field.
struct Edit {
    len: usize,
    old: [u8; 16],
    new: [u8; 16],
}

impl Edit {
    fn before(&self) -> &[u8] {
        &self.old[..self.len]
    }

    fn after(&self) -> &[u8] {
        &self.new[..self.len]
    }
}

impl Packet<'_> {
    /// Rewrite a field of the header at `index` in the chain and repair its checksums.
    ///
    /// The IPv4 header checksum is repaired for every IPv4 field. The TCP or UDP checksum is
    /// repaired for port changes and for address changes, as the addresses are part of its
    /// pseudo header. A UDP checksum of zero over IPv4 stays zero.
    ///
    /// Returns `Error::FieldMismatch` if the header at `index` does not carry the field, or if
    /// there is no such header, and `Error::Malformed` if the value does not fit the field.
    /// Nothing is written when an error is returned.
    pub fn set_field(&mut self, index: usize, field: Field) -> Result<()> {
        let (range, header) = match self.chain.get(index) {
            Some(layer) => (layer.range(), *layer.header()),
            None => return Err(Error::FieldMismatch),
        };

        if !field.applies_to(&header) {
            return Err(Error::FieldMismatch);
        }

        if !field.fits() {
            return Err(Error::Malformed);
        }

        let transport = match header {
            ParsedHeader::Tcp(_) | ParsedHeader::Udp(_) => Some(index),
            _ if field.in_pseudo_header() => index.checked_add(1)
                .filter(|&next| next < self.chain.len()),
            _ => None,
        };

        // Check every range before the first write.
        self.view.slice(range.clone())?;
        let segment = match transport {
            Some(transport) => {
                let (_, segment) = self.transport(transport)?;
                self.view.slice(segment.clone())?;
                Some((transport, segment))
            },
            None => None,
        };

        let edit = match field {
            Field::EthDstAddr(addr) =>
                self.rewrite::<ethernet::frame>(range.clone(), ethernet::Field::DstAddr(addr))?,
            Field::EthSrcAddr(addr) =>
                self.rewrite::<ethernet::frame>(range.clone(), ethernet::Field::SrcAddr(addr))?,
            Field::EtherType(ethertype) =>
                self.rewrite::<ethernet::frame>(range.clone(), ethernet::Field::EtherType(ethertype))?,
            Field::Ipv4SrcAddr(addr) =>
                self.rewrite::<ipv4::packet>(range.clone(), ipv4::Field::SrcAddr(addr))?,
            Field::Ipv4DstAddr(addr) =>
                self.rewrite::<ipv4::packet>(range.clone(), ipv4::Field::DstAddr(addr))?,
            Field::Ipv4HopLimit(ttl) =>
                self.rewrite::<ipv4::packet>(range.clone(), ipv4::Field::HopLimit(ttl))?,
            Field::Ipv4Dscp(dscp) =>
                self.rewrite::<ipv4::packet>(range.clone(), ipv4::Field::Dscp(dscp))?,
            Field::Ipv6SrcAddr(addr) =>
                self.rewrite::<ipv6::packet>(range.clone(), ipv6::Field::SrcAddr(addr))?,
            Field::Ipv6DstAddr(addr) =>
                self.rewrite::<ipv6::packet>(range.clone(), ipv6::Field::DstAddr(addr))?,
            Field::Ipv6HopLimit(hop_limit) =>
                self.rewrite::<ipv6::packet>(range.clone(), ipv6::Field::HopLimit(hop_limit))?,
            Field::SrcPort(port) => match header {
                ParsedHeader::Tcp(_) =>
                    self.rewrite::<tcp::packet>(range.clone(), tcp::Field::SrcPort(port))?,
                _ => self.rewrite::<udp::packet>(range.clone(), udp::Field::SrcPort(port))?,
            },
            Field::DstPort(port) => match header {
                ParsedHeader::Tcp(_) =>
                    self.rewrite::<tcp::packet>(range.clone(), tcp::Field::DstPort(port))?,
                _ => self.rewrite::<udp::packet>(range.clone(), udp::Field::DstPort(port))?,
            },
        };

        if let ParsedHeader::Ipv4(_) = header {
            self.repair_ipv4(range, &edit)?;
        }

        if let Some((transport, segment)) = segment {
            self.repair_transport(transport, segment, &edit)?;
            self.refresh(transport)?;
        }

        self.refresh(index)
    }

    fn rewrite<H: HeaderCodec + ?Sized>(&mut self, range: Range<usize>, field: H::Field)
        -> Result<Edit>
    {
        let relative = H::field_range(&field);
        let aligned = (relative.start & !1)..((relative.end + 1) & !1);
        let mut edit = Edit { len: aligned.len(), old: [0; 16], new: [0; 16] };

        let bytes = self.view.slice_mut(range)?;
        let before = bytes.get(aligned.clone()).ok_or(Error::OutOfBounds)?;
        edit.old.get_mut(..edit.len)
            .ok_or(Error::Malformed)?
            .copy_from_slice(before);

        H::from_bytes_mut(bytes).encode_field(field);

        let after = bytes.get(aligned).ok_or(Error::OutOfBounds)?;
        edit.new.get_mut(..edit.len)
            .ok_or(Error::Malformed)?
            .copy_from_slice(after);
        Ok(edit)
    }

    fn repair_ipv4(&mut self, range: Range<usize>, edit: &Edit) -> Result<()> {
        let packet = ipv4::packet::new_unchecked_mut(self.view.slice_mut(range)?);
        let old = packet.checksum();
        let repaired = checksum::repair(old, edit.before(), edit.after());
        packet.set_checksum(repaired);
        net_trace!("mutate: ipv4 header checksum {:#06x} -> {:#06x}", old, repaired);
        Ok(())
    }

    fn repair_transport(&mut self, index: usize, segment: Range<usize>, edit: &Edit)
        -> Result<()>
    {
        let over_ipv4 = index.checked_sub(1)
            .and_then(|prev| self.chain.get(prev))
            .map_or(false, |layer| matches!(layer.header(), ParsedHeader::Ipv4(_)));
        let header = self.chain.get(index).map(|layer| *layer.header());
        let bytes = self.view.slice_mut(segment)?;

        match header {
            Some(ParsedHeader::Tcp(_)) => {
                let packet = tcp::packet::new_unchecked_mut(bytes);
                let old = packet.checksum();
                let repaired = checksum::repair(old, edit.before(), edit.after());
                packet.set_checksum(repaired);
                net_trace!("mutate: tcp checksum {:#06x} -> {:#06x}", old, repaired);
            },
            Some(ParsedHeader::Udp(_)) => {
                let packet = udp::packet::new_unchecked_mut(bytes);
                let old = packet.checksum();
                if old == 0 && over_ipv4 {
                    net_trace!("mutate: udp checksum disabled, not repaired");
                    return Ok(());
                }
                let repaired = match checksum::repair(old, edit.before(), edit.after()) {
                    0 => 0xffff,
                    sum => sum,
                };
                packet.set_checksum(repaired);
                net_trace!("mutate: udp checksum {:#06x} -> {:#06x}", old, repaired);
            },
            _ => return Err(Error::Malformed),
        }

        Ok(())
    }

    /// Parse the representation of a layer again from the buffer.
    fn refresh(&mut self, index: usize) -> Result<()> {
        let layer = self.chain.get_mut(index).ok_or(Error::Malformed)?;
        let bytes = self.view.slice(layer.range())?;
        let header = layer.header().reparse(bytes);
        layer.set_header(header);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dissect::{Config, Dissector};
    use crate::wire::Checksum;
    use crate::wire::checksum::PseudoHeader;
    use crate::wire::ip::Protocol;

    const SRC: ipv4::Address = ipv4::Address::new(10, 0, 0, 1);
    const DST: ipv4::Address = ipv4::Address::new(10, 0, 0, 2);

    // Ethernet, IPv4, UDP with the given checksum handling and four bytes of payload.
    fn ipv4_udp(udp_checksum: bool) -> [u8; 46] {
        let mut bytes = [0u8; 46];
        bytes[12..14].copy_from_slice(&[0x08, 0x00]);
        ipv4::Repr {
            src_addr: SRC,
            dst_addr: DST,
            protocol: Protocol::Udp,
            header_len: 20,
            total_len: 32,
            dscp: 0,
            ecn: 0,
            ident: 0x1234,
            reserved_flag: false,
            dont_frag: true,
            more_frags: false,
            frag_offset: 0,
            hop_limit: 64,
            checksum: 0,
        }.emit(ipv4::packet::new_unchecked_mut(&mut bytes[14..34]), Checksum::Manual);

        let udp = udp::packet::new_unchecked_mut(&mut bytes[34..46]);
        udp.set_src_port(49152);
        udp.set_dst_port(53);
        udp.set_len(12);
        bytes[42..46].copy_from_slice(b"ping");
        if udp_checksum {
            let pseudo = PseudoHeader::Ipv4 {
                src_addr: SRC,
                dst_addr: DST,
                protocol: Protocol::Udp,
                length: 12,
            };
            udp::packet::new_unchecked_mut(&mut bytes[34..46]).fill_checksum(&pseudo);
        }
        bytes
    }

    fn dissector() -> Dissector {
        Dissector::new(Config::default().with_checksum(Checksum::Manual))
    }

    #[test]
    fn rewrite_hop_limit() {
        let mut bytes = ipv4_udp(true);
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        packet.set_field(1, Field::Ipv4HopLimit(63)).unwrap();
        assert_eq!(packet.ipv4().map(|ip| ip.hop_limit), Some(63));
        assert_eq!(packet.verify_checksums(), Ok(()));
        assert_eq!(packet.as_bytes()[22], 63);
    }

    #[test]
    fn rewrite_dscp() {
        let mut bytes = ipv4_udp(true);
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        packet.set_field(1, Field::Ipv4Dscp(46)).unwrap();
        assert_eq!(packet.ipv4().map(|ip| ip.dscp), Some(46));
        assert_eq!(packet.verify_checksums(), Ok(()));
    }

    #[test]
    fn oversized_dscp_rejected() {
        let original = ipv4_udp(true);
        let mut bytes = original;
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        assert_eq!(packet.set_field(1, Field::Ipv4Dscp(200)), Err(Error::Malformed));
        assert_eq!(packet.set_field(1, Field::Ipv4Dscp(64)), Err(Error::Malformed));
        assert_eq!(packet.ipv4().map(|ip| ip.dscp), Some(0));
        assert_eq!(packet.as_bytes(), &original[..]);

        packet.set_field(1, Field::Ipv4Dscp(63)).unwrap();
        assert_eq!(packet.ipv4().map(|ip| ip.dscp), Some(63));
        assert_eq!(packet.verify_checksums(), Ok(()));
    }

    #[test]
    fn rewrite_address_repairs_transport() {
        let mut bytes = ipv4_udp(true);
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        let addr = ipv4::Address::new(192, 0, 2, 77);
        packet.set_field(1, Field::Ipv4DstAddr(addr)).unwrap();
        assert_eq!(packet.ipv4().map(|ip| ip.dst_addr), Some(addr));
        assert_eq!(packet.verify_checksums(), Ok(()));
        // The refreshed representation carries the repaired checksum.
        let stored = udp::packet::new_unchecked(&packet.as_bytes()[34..46]).checksum();
        assert_eq!(packet.udp().map(|udp| udp.checksum), Some(stored));
    }

    #[test]
    fn disabled_udp_checksum_stays_zero() {
        let mut bytes = ipv4_udp(false);
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        packet.set_field(2, Field::DstPort(5353)).unwrap();
        packet.set_field(1, Field::Ipv4SrcAddr(DST)).unwrap();
        assert_eq!(packet.udp().map(|udp| udp.checksum), Some(0));
        assert_eq!(packet.udp().map(|udp| udp.dst_port), Some(5353));
        assert_eq!(packet.verify_checksums(), Ok(()));
    }

    #[test]
    fn rewrite_ethernet() {
        let mut bytes = ipv4_udp(true);
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        let addr = ethernet::Address([0x02, 0, 0, 0, 0, 0x42]);
        packet.set_field(0, Field::EthDstAddr(addr)).unwrap();
        packet.set_field(0, Field::EthSrcAddr(ethernet::Address::BROADCAST)).unwrap();
        assert_eq!(packet.ethernet().map(|eth| eth.dst_addr), Some(addr));
        assert_eq!(&packet.as_bytes()[..12], &[
            0x02, 0, 0, 0, 0, 0x42,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        ]);
        assert_eq!(packet.verify_checksums(), Ok(()));
    }

    #[test]
    fn mismatch_leaves_packet() {
        let original = ipv4_udp(true);
        let mut bytes = original;
        let mut packet = Packet::dissect(&mut bytes, &dissector()).unwrap();
        assert_eq!(packet.set_field(0, Field::DstPort(80)), Err(Error::FieldMismatch));
        assert_eq!(packet.set_field(1, Field::Ipv6HopLimit(1)), Err(Error::FieldMismatch));
        assert_eq!(packet.set_field(2, Field::Ipv4HopLimit(1)), Err(Error::FieldMismatch));
        assert_eq!(packet.set_field(3, Field::SrcPort(1)), Err(Error::FieldMismatch));
        assert_eq!(packet.as_bytes(), &original[..]);
    }
}
