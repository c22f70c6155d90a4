//! A dissected packet.
use core::ops::Range;

use crate::dissect::{Dissection, Dissector, HeaderChain, ParsedHeader};
use crate::wire::checksum::PseudoHeader;
use crate::wire::ip::Protocol;
use crate::wire::{BoundedView, Error, Result};
use crate::wire::{ethernet, ipv4, ipv6, tcp, udp};

/// The buffer of one packet together with its decoded headers.
///
/// The header chain always describes the bytes in the buffer. Fields can only be changed through
/// [`Packet::set_field`], which repairs every checksum covering the field.
#[derive(Debug)]
pub struct Packet<'a> {
    pub(crate) view: BoundedView<'a>,
    pub(crate) chain: HeaderChain,
}

impl<'a> Packet<'a> {
    /// Dissect a buffer holding an Ethernet frame.
    pub fn dissect(buffer: &'a mut [u8], dissector: &Dissector) -> Result<Self> {
        let mut view = BoundedView::new(buffer);
        match dissector.dissect(&mut view) {
            Dissection::Complete(chain) => Ok(Packet::new(view, chain)),
            Dissection::Verdict(_, err) => Err(err),
        }
    }

    pub(crate) fn new(view: BoundedView<'a>, chain: HeaderChain) -> Self {
        Packet { view, chain }
    }

    /// The decoded headers.
    pub fn chain(&self) -> &HeaderChain {
        &self.chain
    }

    /// The whole packet buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.view.as_bytes()
    }

    /// The offset of the first octet after the innermost header.
    pub fn payload_offset(&self) -> usize {
        self.view.cursor()
    }

    /// The transport payload, without any link layer padding.
    pub fn payload(&self) -> &[u8] {
        let start = self.view.cursor();
        let end = self.chain.len()
            .checked_sub(1)
            .and_then(|index| self.transport(index).ok())
            .map_or(self.view.len(), |(_, segment)| segment.end);
        self.view.slice(start..end).unwrap_or(&[])
    }

    /// The Ethernet header.
    pub fn ethernet(&self) -> Option<&ethernet::Repr> {
        self.chain.ethernet()
    }

    /// The IPv4 header, if the packet is IPv4.
    pub fn ipv4(&self) -> Option<&ipv4::Repr> {
        self.chain.ipv4()
    }

    /// The IPv6 header, if the packet is IPv6.
    pub fn ipv6(&self) -> Option<&ipv6::Repr> {
        self.chain.ipv6()
    }

    /// The TCP header, if the packet is TCP.
    pub fn tcp(&self) -> Option<&tcp::Repr> {
        self.chain.tcp()
    }

    /// The UDP header, if the packet is UDP.
    pub fn udp(&self) -> Option<&udp::Repr> {
        self.chain.udp()
    }

    /// The pseudo header and the absolute segment range covered by a transport checksum.
    ///
    /// `index` names the transport layer in the chain, its predecessor must be an IP header.
    pub(crate) fn transport(&self, index: usize) -> Result<(PseudoHeader, Range<usize>)> {
        let network = index.checked_sub(1)
            .and_then(|prev| self.chain.get(prev))
            .ok_or(Error::Malformed)?;
        let layer = self.chain.get(index).ok_or(Error::Malformed)?;
        let (protocol, udp_len) = match layer.header() {
            ParsedHeader::Tcp(_) => (Protocol::Tcp, None),
            ParsedHeader::Udp(repr) => (Protocol::Udp, Some(repr.length)),
            _ => return Err(Error::Malformed),
        };

        let (pseudo, length) = match network.header() {
            ParsedHeader::Ipv4(repr) => {
                let length = match udp_len {
                    Some(length) => length,
                    None => u16::try_from(repr.payload_len()).map_err(|_| Error::Malformed)?,
                };
                let pseudo = PseudoHeader::Ipv4 {
                    src_addr: repr.src_addr,
                    dst_addr: repr.dst_addr,
                    protocol,
                    length,
                };
                (pseudo, usize::from(length))
            },
            ParsedHeader::Ipv6(repr) => {
                let length = udp_len.unwrap_or(repr.payload_len);
                let pseudo = PseudoHeader::Ipv6 {
                    src_addr: repr.src_addr,
                    dst_addr: repr.dst_addr,
                    protocol,
                    length: u32::from(length),
                };
                (pseudo, usize::from(length))
            },
            _ => return Err(Error::Malformed),
        };

        if length < layer.range().len() {
            return Err(Error::Malformed);
        }

        let start = layer.offset();
        let end = start.checked_add(length).ok_or(Error::OutOfBounds)?;
        Ok((pseudo, start..end))
    }

    /// Recompute every checksum of the packet from scratch and compare.
    ///
    /// This covers the IPv4 header checksum and the TCP or UDP checksum. A UDP checksum of zero
    /// over IPv4 is accepted as not computed.
    pub fn verify_checksums(&self) -> Result<()> {
        for (index, layer) in self.chain.iter().enumerate() {
            let valid = match layer.header() {
                ParsedHeader::Ipv4(_) => {
                    let bytes = self.view.slice(layer.range())?;
                    ipv4::packet::new_unchecked(bytes).verify_checksum()
                },
                ParsedHeader::Tcp(_) => {
                    let (pseudo, segment) = self.transport(index)?;
                    let bytes = self.view.slice(segment)?;
                    tcp::packet::new_unchecked(bytes).verify_checksum(&pseudo)
                },
                ParsedHeader::Udp(_) => {
                    let (pseudo, segment) = self.transport(index)?;
                    let bytes = self.view.slice(segment)?;
                    udp::packet::new_unchecked(bytes).verify_checksum(&pseudo)
                },
                ParsedHeader::Ethernet(_) | ParsedHeader::Ipv6(_) => true,
            };

            if !valid {
                net_trace!("packet: checksum mismatch in layer {} at {:?}", index, layer.range());
                return Err(Error::WrongChecksum);
            }
        }

        Ok(())
    }
}
