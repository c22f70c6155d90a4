//! Definitions shared by both IP versions.
use core::fmt;

use super::NextProtocol;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub doc enum Protocol(u8) {
        /// IPv6 hop-by-hop options.
        HopByHop  = 0x00,
        /// Internet control message protocol.
        Icmp      = 0x01,
        /// Internet group management protocol.
        Igmp      = 0x02,
        /// Transmission control protocol.
        Tcp       = 0x06,
        /// User datagram protocol.
        Udp       = 0x11,
        /// IPv6 routing header.
        Ipv6Route = 0x2b,
        /// IPv6 fragment header.
        Ipv6Frag  = 0x2c,
        /// ICMP for IPv6.
        Icmpv6    = 0x3a,
        /// No next header.
        Ipv6NoNxt = 0x3b,
        /// IPv6 destination options.
        Ipv6Opts  = 0x3c,
        /// Stream control transmission protocol.
        Sctp      = 0x84,
    }
}

impl Protocol {
    /// The transport layer this protocol selects.
    ///
    /// IPv6 extension headers are not followed, they select nothing we can dissect.
    pub fn next(self) -> NextProtocol {
        match self {
            Protocol::Tcp => NextProtocol::Tcp,
            Protocol::Udp => NextProtocol::Udp,
            other => NextProtocol::Unsupported(u8::from(other).into()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop    => write!(f, "Hop-by-Hop"),
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Igmp        => write!(f, "IGMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Ipv6Route   => write!(f, "IPv6-Route"),
            Protocol::Ipv6Frag    => write!(f, "IPv6-Frag"),
            Protocol::Icmpv6      => write!(f, "ICMPv6"),
            Protocol::Ipv6NoNxt   => write!(f, "IPv6-NoNxt"),
            Protocol::Ipv6Opts    => write!(f, "IPv6-Opts"),
            Protocol::Sctp        => write!(f, "SCTP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn protocol_selects_transport() {
        assert_eq!(Protocol::from(6).next(), NextProtocol::Tcp);
        assert_eq!(Protocol::from(17).next(), NextProtocol::Udp);
        assert_eq!(Protocol::from(132).next(), NextProtocol::Unsupported(132));
        assert_eq!(Protocol::from(0x99), Protocol::Unknown(0x99));
    }
}
