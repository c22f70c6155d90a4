//! Walks a packet buffer through the protocol stack.
//!
//! The dissector is a small state machine that only ever moves forward: Ethernet first, then
//! the network layer selected by the EtherType, then the transport layer selected by the IP
//! protocol. Every layer is decoded by its [`HeaderCodec`] against the same [`BoundedView`], so
//! the bounds check is repeated for each of them. At most three headers are decoded.
//!
//! A packet that can not be dissected completely is dropped. The reason is kept next to the
//! verdict for logging and statistics but never escalates to an abort.
use core::ops::Range;

use crate::verdict::Verdict;
use crate::wire::{BoundedView, Checksum, Error, HeaderCodec, NextProtocol, Result};
use crate::wire::{ethernet, ipv4, ipv6, tcp, udp};

/// Runtime configuration of the dissector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Config {
    /// Whether the IPv4 header checksum is verified on ingress.
    ///
    /// With `Checksum::Ignored` the check is assumed to be offloaded to the NIC.
    pub checksum: Checksum,
}

impl Config {
    /// Change the ingress checksum handling.
    pub fn with_checksum(self, checksum: Checksum) -> Self {
        Config { checksum, ..self }
    }
}

/// The layer the dissector decodes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// The link layer header at the start of the buffer.
    Ethernet,
    /// An IPv4 or IPv6 header.
    Network,
    /// A TCP or UDP header.
    Transport,
    /// Nothing is left to decode.
    Done,
}

/// A decoded header of any supported protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedHeader {
    /// An Ethernet II header.
    Ethernet(ethernet::Repr),
    /// An IPv4 header.
    Ipv4(ipv4::Repr),
    /// An IPv6 header.
    Ipv6(ipv6::Repr),
    /// A TCP header.
    Tcp(tcp::Repr),
    /// A UDP header.
    Udp(udp::Repr),
}

impl ParsedHeader {
    /// The protocol of the layer following this header.
    pub fn next_protocol(&self) -> NextProtocol {
        match self {
            ParsedHeader::Ethernet(repr) => ethernet::frame::selector(repr),
            ParsedHeader::Ipv4(repr) => ipv4::packet::selector(repr),
            ParsedHeader::Ipv6(repr) => ipv6::packet::selector(repr),
            ParsedHeader::Tcp(repr) => tcp::packet::selector(repr),
            ParsedHeader::Udp(repr) => udp::packet::selector(repr),
        }
    }

    /// Offset of the selector field relative to the start of this header.
    pub fn selector_offset(&self) -> Option<usize> {
        match self {
            ParsedHeader::Ethernet(_) => <ethernet::frame as HeaderCodec>::SELECTOR,
            ParsedHeader::Ipv4(_) => <ipv4::packet as HeaderCodec>::SELECTOR,
            ParsedHeader::Ipv6(_) => <ipv6::packet as HeaderCodec>::SELECTOR,
            ParsedHeader::Tcp(_) => <tcp::packet as HeaderCodec>::SELECTOR,
            ParsedHeader::Udp(_) => <udp::packet as HeaderCodec>::SELECTOR,
        }
    }

    /// The end of the payload announced by an IP header starting at `offset`.
    fn payload_end(&self, offset: usize) -> Option<usize> {
        match self {
            ParsedHeader::Ipv4(repr) => Some(offset + usize::from(repr.total_len)),
            ParsedHeader::Ipv6(repr) => Some(offset + ipv6::HEADER_LEN + usize::from(repr.payload_len)),
            _ => None,
        }
    }

    /// Parse the same kind of header again from its bytes.
    ///
    /// `bytes` must span the whole header that was originally decoded.
    pub(crate) fn reparse(&self, bytes: &[u8]) -> ParsedHeader {
        match self {
            ParsedHeader::Ethernet(_) =>
                ParsedHeader::Ethernet(ethernet::Repr::parse(ethernet::frame::new_unchecked(bytes))),
            ParsedHeader::Ipv4(_) =>
                ParsedHeader::Ipv4(ipv4::Repr::parse(ipv4::packet::new_unchecked(bytes))),
            ParsedHeader::Ipv6(_) =>
                ParsedHeader::Ipv6(ipv6::Repr::parse(ipv6::packet::new_unchecked(bytes))),
            ParsedHeader::Tcp(_) =>
                ParsedHeader::Tcp(tcp::Repr::parse(tcp::packet::new_unchecked(bytes))),
            ParsedHeader::Udp(_) =>
                ParsedHeader::Udp(udp::Repr::parse(udp::packet::new_unchecked(bytes))),
        }
    }
}

/// One entry of a [`HeaderChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    header: ParsedHeader,
    range: Range<usize>,
    selector: Option<usize>,
}

impl Layer {
    /// The decoded header.
    pub fn header(&self) -> &ParsedHeader {
        &self.header
    }

    /// The octets occupied by the header, options included.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The offset of the header within the packet.
    pub fn offset(&self) -> usize {
        self.range.start
    }

    /// The absolute offset of the predecessor's field that selected this header.
    ///
    /// This is `None` for the first header.
    pub fn selector(&self) -> Option<usize> {
        self.selector
    }

    pub(crate) fn set_header(&mut self, header: ParsedHeader) {
        self.header = header;
    }
}

const MAX_LAYERS: usize = 3;

/// The headers of one packet in wire order.
///
/// Built once by the dissector. Entries are never added or removed afterwards, only their
/// representation is refreshed after a field was rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderChain {
    layers: [Option<Layer>; MAX_LAYERS],
    len: usize,
}

impl HeaderChain {
    /// The maximum number of headers in a chain.
    pub const CAPACITY: usize = MAX_LAYERS;

    fn push(&mut self, layer: Layer) {
        if let Some(slot) = self.layers.get_mut(self.len) {
            *slot = Some(layer);
            self.len += 1;
        }
    }

    /// The number of headers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no header was decoded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the header at an index, outermost first.
    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)?.as_mut()
    }

    /// The innermost header.
    pub fn last(&self) -> Option<&Layer> {
        self.get(self.len.checked_sub(1)?)
    }

    /// Iterate over the headers, outermost first.
    pub fn iter(&self) -> impl Iterator<Item=&Layer> + '_ {
        self.layers.iter().filter_map(Option::as_ref)
    }

    /// The Ethernet header, if any.
    pub fn ethernet(&self) -> Option<&ethernet::Repr> {
        self.iter().find_map(|layer| match &layer.header {
            ParsedHeader::Ethernet(repr) => Some(repr),
            _ => None,
        })
    }

    /// The IPv4 header, if any.
    pub fn ipv4(&self) -> Option<&ipv4::Repr> {
        self.iter().find_map(|layer| match &layer.header {
            ParsedHeader::Ipv4(repr) => Some(repr),
            _ => None,
        })
    }

    /// The IPv6 header, if any.
    pub fn ipv6(&self) -> Option<&ipv6::Repr> {
        self.iter().find_map(|layer| match &layer.header {
            ParsedHeader::Ipv6(repr) => Some(repr),
            _ => None,
        })
    }

    /// The TCP header, if any.
    pub fn tcp(&self) -> Option<&tcp::Repr> {
        self.iter().find_map(|layer| match &layer.header {
            ParsedHeader::Tcp(repr) => Some(repr),
            _ => None,
        })
    }

    /// The UDP header, if any.
    pub fn udp(&self) -> Option<&udp::Repr> {
        self.iter().find_map(|layer| match &layer.header {
            ParsedHeader::Udp(repr) => Some(repr),
            _ => None,
        })
    }
}

/// The outcome of dissecting one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dissection {
    /// All headers were decoded, policy logic decides on the verdict.
    Complete(HeaderChain),
    /// Dissection ended early with a final verdict.
    Verdict(Verdict, Error),
}

/// Decodes the headers of packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dissector {
    config: Config,
}

impl Dissector {
    /// Create a dissector with a configuration.
    pub fn new(config: Config) -> Self {
        Dissector { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Decode all headers of the packet in the view.
    ///
    /// The view must be positioned at the start of the Ethernet header. On success its cursor
    /// is at the first octet of the transport payload.
    pub fn dissect(&self, view: &mut BoundedView<'_>) -> Dissection {
        let mut chain = HeaderChain::default();
        let mut state = State::Ethernet;

        while state != State::Done {
            state = match self.step(state, view, &mut chain) {
                Ok(next) => next,
                Err(err) => {
                    net_trace!("dissect: drop in state {:?} at offset {}: {}",
                        state, view.cursor(), err);
                    return Dissection::Verdict(Verdict::Drop, err);
                },
            };
        }

        Dissection::Complete(chain)
    }

    fn step(&self, state: State, view: &mut BoundedView<'_>, chain: &mut HeaderChain)
        -> Result<State>
    {
        if state == State::Ethernet {
            let layer = decode_layer::<ethernet::frame>(view, None, ParsedHeader::Ethernet)?;
            chain.push(layer);
            return Ok(State::Network);
        }

        let (next, selector, payload_end) = match chain.last() {
            Some(prev) => (
                prev.header.next_protocol(),
                prev.header.selector_offset().map(|offset| prev.range.start + offset),
                prev.header.payload_end(prev.range.start),
            ),
            None => return Err(Error::Malformed),
        };

        let (layer, following) = match (state, next) {
            (_, NextProtocol::Unsupported(code)) =>
                return Err(Error::UnsupportedProtocol(code)),
            (State::Network, NextProtocol::Ipv4) => {
                let layer = decode_layer::<ipv4::packet>(view, selector, ParsedHeader::Ipv4)?;
                if self.config.checksum.manual() {
                    let header = ipv4::packet::new_unchecked(view.slice(layer.range())?);
                    if !header.verify_checksum() {
                        return Err(Error::WrongChecksum);
                    }
                }
                // Only the first fragment starts with the transport header.
                if let ParsedHeader::Ipv4(repr) = layer.header {
                    if repr.frag_offset != 0 {
                        return Err(Error::UnsupportedProtocol(u8::from(repr.protocol).into()));
                    }
                }
                (layer, State::Transport)
            },
            (State::Network, NextProtocol::Ipv6) =>
                (decode_layer::<ipv6::packet>(view, selector, ParsedHeader::Ipv6)?, State::Transport),
            (State::Transport, NextProtocol::Tcp) => {
                let layer = decode_layer::<tcp::packet>(view, selector, ParsedHeader::Tcp)?;
                (within(layer, payload_end)?, State::Done)
            },
            (State::Transport, NextProtocol::Udp) => {
                let layer = decode_layer::<udp::packet>(view, selector, ParsedHeader::Udp)?;
                (within(layer, payload_end)?, State::Done)
            },
            _ => return Err(Error::Malformed),
        };

        net_trace!("dissect: {:?} at {:?}", layer.header, layer.range);
        chain.push(layer);
        Ok(following)
    }
}

/// Check that a transport header lies within the payload of its IP packet.
fn within(layer: Layer, payload_end: Option<usize>) -> Result<Layer> {
    let end = match layer.header {
        ParsedHeader::Udp(udp) => layer.range.start + usize::from(udp.length),
        _ => layer.range.end,
    };

    match payload_end {
        Some(limit) if end > limit => Err(Error::Malformed),
        _ => Ok(layer),
    }
}

fn decode_layer<H: HeaderCodec + ?Sized>(
    view: &mut BoundedView<'_>,
    selector: Option<usize>,
    wrap: fn(H::Repr) -> ParsedHeader,
) -> Result<Layer> {
    let start = view.cursor();
    let repr = H::decode(view)?;
    Ok(Layer {
        header: wrap(repr),
        range: start..view.cursor(),
        selector,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    // Ethernet, IPv4 without options, UDP with four bytes of payload.
    static UDP_FRAME: [u8; 46] = [
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x08, 0x00,
        0x45, 0x00, 0x00, 0x20,
        0x00, 0x00, 0x40, 0x00,
        0x40, 0x11, 0x00, 0x00,
        0xc0, 0xa8, 0x01, 0x01,
        0xc0, 0xa8, 0x01, 0x02,
        0xbf, 0x00, 0x00, 0x35,
        0x00, 0x0c, 0x00, 0x00,
        0xaa, 0x00, 0x00, 0xff,
    ];

    #[test]
    fn complete_chain() {
        let mut bytes = UDP_FRAME;
        let mut view = BoundedView::new(&mut bytes);
        let chain = match Dissector::default().dissect(&mut view) {
            Dissection::Complete(chain) => chain,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(chain.len(), 3);
        assert_eq!(view.cursor(), 42);
        let ranges: [Range<usize>; 3] = [0..14, 14..34, 34..42];
        for (layer, range) in chain.iter().zip(ranges.iter()) {
            assert_eq!(&layer.range(), range);
        }
        assert_eq!(chain.get(0).and_then(Layer::selector), None);
        assert_eq!(chain.get(1).and_then(Layer::selector), Some(12));
        assert_eq!(chain.get(2).and_then(Layer::selector), Some(23));
        assert_eq!(chain.udp().map(|udp| udp.dst_port), Some(53));
        assert!(chain.tcp().is_none());
    }

    #[test]
    fn unsupported_ethertype() {
        let mut bytes = UDP_FRAME;
        bytes[12..14].copy_from_slice(&[0x08, 0x06]);
        let mut view = BoundedView::new(&mut bytes);
        assert_eq!(Dissector::default().dissect(&mut view),
                   Dissection::Verdict(Verdict::Drop, Error::UnsupportedProtocol(0x0806)));
    }

    #[test]
    fn unsupported_ip_protocol() {
        let mut bytes = UDP_FRAME;
        bytes[23] = 132;
        let mut view = BoundedView::new(&mut bytes);
        assert_eq!(Dissector::default().dissect(&mut view),
                   Dissection::Verdict(Verdict::Drop, Error::UnsupportedProtocol(132)));
    }

    #[test]
    fn later_fragment_dropped() {
        let mut bytes = UDP_FRAME;
        // Fragment offset of 185 units, 1480 octets.
        bytes[20..22].copy_from_slice(&[0x00, 0xb9]);
        let mut view = BoundedView::new(&mut bytes);
        assert_eq!(Dissector::default().dissect(&mut view),
                   Dissection::Verdict(Verdict::Drop, Error::UnsupportedProtocol(17)));

        // The first fragment still carries the UDP header.
        let mut bytes = UDP_FRAME;
        bytes[20] = 0x20;
        let mut view = BoundedView::new(&mut bytes);
        assert!(matches!(Dissector::default().dissect(&mut view), Dissection::Complete(_)));
    }

    #[test]
    fn truncated_at_every_length() {
        for len in 0..42 {
            let mut bytes = UDP_FRAME;
            let mut view = BoundedView::new(&mut bytes[..len]);
            match Dissector::default().dissect(&mut view) {
                Dissection::Verdict(Verdict::Drop, _) => {},
                other => panic!("length {} gave {:?}", len, other),
            }
        }
    }

    #[test]
    fn ingress_checksum() {
        let manual = Dissector::new(Config::default().with_checksum(Checksum::Manual));

        // The fixture carries a zero IPv4 checksum.
        let mut bytes = UDP_FRAME;
        let mut view = BoundedView::new(&mut bytes);
        assert_eq!(manual.dissect(&mut view),
                   Dissection::Verdict(Verdict::Drop, Error::WrongChecksum));

        let mut bytes = UDP_FRAME;
        ipv4::packet::new_unchecked_mut(&mut bytes[14..34]).fill_checksum();
        let mut view = BoundedView::new(&mut bytes);
        assert!(matches!(manual.dissect(&mut view), Dissection::Complete(_)));
    }
}
