//! The per-packet pipeline.
//!
//! A [`Program`] is invoked once for every received frame. It dissects the frame, hands the
//! decoded packet to a [`Policy`] and returns the verdict for the hook. Frames that can not be
//! dissected never reach the policy, they are dropped. A policy that fails with an error aborts
//! the packet.
//!
//! ```
//! use ethox_xdp::{Config, Context, Program, Verdict};
//! use ethox_xdp::program::PassAll;
//!
//! let mut program = Program::new(Config::default(), PassAll);
//!
//! // Too short for an Ethernet header.
//! let mut frame = [0u8; 13];
//! assert_eq!(program.run(Context::new(&mut frame)), Verdict::Drop);
//! ```
use crate::dissect::{Config, Dissection, Dissector, ParsedHeader};
use crate::mutate::Field;
use crate::packet::Packet;
use crate::verdict::Verdict;
use crate::wire::{BoundedView, Result};
use crate::wire::ip::Protocol;

/// Information about the received frame, provided by the hook.
///
/// None of it is interpreted, it is passed through to the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Metadata {
    /// The index of the interface that received the frame.
    pub ingress_ifindex: u32,
    /// The index of the receive queue.
    pub rx_queue_index: u32,
    /// The length of the metadata area in front of the frame.
    pub data_meta: usize,
}

/// The input of one invocation.
#[derive(Debug)]
pub struct Context<'a> {
    /// The frame, starting with its Ethernet header.
    pub data: &'a mut [u8],
    /// Information about the frame.
    pub meta: Metadata,
}

impl<'a> Context<'a> {
    /// Wrap a frame without any metadata.
    pub fn new(data: &'a mut [u8]) -> Self {
        Context {
            data,
            meta: Metadata::default(),
        }
    }

    /// Attach metadata to the frame.
    pub fn with_meta(self, meta: Metadata) -> Self {
        Context { meta, ..self }
    }
}

/// Decides the verdict for a dissected packet.
///
/// The policy may rewrite header fields through [`Packet::set_field`]. Returning an error means
/// that an internal fault occurred, the packet is then aborted.
pub trait Policy {
    /// Inspect one packet and choose its disposition.
    fn decide(&mut self, packet: &mut Packet<'_>, meta: &Metadata) -> Result<Verdict>;
}

/// A standard wrapper for a function implementing [`Policy`].
pub struct FnPolicy<F>(pub F);

/// Use a closure as a policy.
pub fn from_fn<F>(f: F) -> FnPolicy<F>
    where F: FnMut(&mut Packet<'_>, &Metadata) -> Result<Verdict>
{
    FnPolicy(f)
}

impl<F> Policy for FnPolicy<F>
    where F: FnMut(&mut Packet<'_>, &Metadata) -> Result<Verdict>
{
    fn decide(&mut self, packet: &mut Packet<'_>, meta: &Metadata) -> Result<Verdict> {
        (self.0)(packet, meta)
    }
}

impl<P: Policy + ?Sized> Policy for &'_ mut P {
    fn decide(&mut self, packet: &mut Packet<'_>, meta: &Metadata) -> Result<Verdict> {
        (**self).decide(packet, meta)
    }
}

/// Passes every packet that could be dissected to the network stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassAll;

impl Policy for PassAll {
    fn decide(&mut self, _: &mut Packet<'_>, _: &Metadata) -> Result<Verdict> {
        Ok(Verdict::Pass)
    }
}

/// Rewrites the destination port of matching segments or datagrams.
///
/// Packets of the configured transport protocol and destination port get the new port, with
/// the transport checksum repaired, and the configured verdict. All other packets are passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRewrite {
    protocol: Protocol,
    from: u16,
    to: u16,
    verdict: Verdict,
}

impl PortRewrite {
    /// Rewrite port `from` to `to` and transmit the packet.
    ///
    /// `protocol` should be either `Protocol::Tcp` or `Protocol::Udp`, nothing matches otherwise.
    pub fn new(protocol: Protocol, from: u16, to: u16) -> Self {
        PortRewrite {
            protocol,
            from,
            to,
            verdict: Verdict::Transmit,
        }
    }

    /// Choose another verdict for rewritten packets.
    pub fn with_verdict(self, verdict: Verdict) -> Self {
        PortRewrite { verdict, ..self }
    }
}

impl Policy for PortRewrite {
    fn decide(&mut self, packet: &mut Packet<'_>, _: &Metadata) -> Result<Verdict> {
        let index = match packet.chain().len().checked_sub(1) {
            Some(index) => index,
            None => return Ok(Verdict::Pass),
        };

        let matches = match packet.chain().get(index).map(|layer| layer.header()) {
            Some(ParsedHeader::Tcp(tcp)) =>
                self.protocol == Protocol::Tcp && tcp.dst_port == self.from,
            Some(ParsedHeader::Udp(udp)) =>
                self.protocol == Protocol::Udp && udp.dst_port == self.from,
            _ => false,
        };

        if !matches {
            return Ok(Verdict::Pass);
        }

        packet.set_field(index, Field::DstPort(self.to))?;
        Ok(self.verdict)
    }
}

/// Dissects frames and runs a policy on them.
pub struct Program<P> {
    dissector: Dissector,
    policy: P,
}

impl<P: Policy> Program<P> {
    /// Create a program from a dissector configuration and a policy.
    pub fn new(config: Config, policy: P) -> Self {
        Program {
            dissector: Dissector::new(config),
            policy,
        }
    }

    /// Get a reference to the policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Get a mutable reference to the policy.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Process one frame and return its verdict.
    pub fn run(&mut self, ctx: Context<'_>) -> Verdict {
        let Context { data, meta } = ctx;
        let mut view = BoundedView::new(data);

        let chain = match self.dissector.dissect(&mut view) {
            Dissection::Complete(chain) => chain,
            Dissection::Verdict(verdict, _) => return verdict,
        };

        let mut packet = Packet::new(view, chain);
        match self.policy.decide(&mut packet, &meta) {
            Ok(verdict) => verdict,
            Err(err) => {
                net_debug!("program: policy fault on interface {}: {}", meta.ingress_ifindex, err);
                Verdict::Aborted
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::Error;

    // Ethernet, IPv4 and a TCP SYN to port 5001, without valid checksums.
    static TCP_FRAME: [u8; 54] = [
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x08, 0x00,
        0x45, 0x00, 0x00, 0x28,
        0x00, 0x01, 0x40, 0x00,
        0x40, 0x06, 0x00, 0x00,
        0x0a, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00, 0x02,
        0xc0, 0x00, 0x13, 0x89,
        0x00, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00,
        0x50, 0x02, 0x72, 0x10,
        0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn pass_all() {
        let mut frame = TCP_FRAME;
        let mut program = Program::new(Config::default(), PassAll);
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Pass);
        assert_eq!(frame, TCP_FRAME);
    }

    #[test]
    fn port_rewrite() {
        let mut frame = TCP_FRAME;
        let mut program = Program::new(Config::default(), PortRewrite::new(Protocol::Tcp, 5001, 8000));
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Transmit);
        assert_eq!(&frame[36..38], &[0x1f, 0x40]);

        // Already rewritten, so it no longer matches.
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Pass);
    }

    #[test]
    fn later_fragment_untouched() {
        let mut frame = TCP_FRAME;
        // More fragments, offset 1480. Bytes 36..38 are payload, not a port.
        frame[20..22].copy_from_slice(&[0x20, 0xb9]);
        let original = frame;
        let mut program = Program::new(Config::default(), PortRewrite::new(Protocol::Tcp, 5001, 8000));
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Drop);
        assert_eq!(frame, original);
    }

    #[test]
    fn port_rewrite_other_protocol() {
        let mut frame = TCP_FRAME;
        let policy = PortRewrite::new(Protocol::Udp, 5001, 8000)
            .with_verdict(Verdict::Redirect);
        let mut program = Program::new(Config::default(), policy);
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Pass);
        assert_eq!(frame, TCP_FRAME);
    }

    #[test]
    fn policy_fault_aborts() {
        let mut frame = TCP_FRAME;
        let mut program = Program::new(Config::default(), from_fn(|packet, _| {
            packet.set_field(0, Field::DstPort(1))?;
            Ok(Verdict::Pass)
        }));
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Aborted);
        assert_eq!(frame, TCP_FRAME);
    }

    #[test]
    fn malformed_never_aborts() {
        let mut program = Program::new(Config::default(), from_fn(|_, _| Err(Error::Malformed)));
        let mut frame = TCP_FRAME;
        frame[14] = 0x44;
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Drop);
        let mut frame = TCP_FRAME;
        frame[23] = 132;
        assert_eq!(program.run(Context::new(&mut frame)), Verdict::Drop);
    }

    #[test]
    fn metadata_is_passed() {
        let mut seen = None;
        let mut frame = TCP_FRAME;
        let meta = Metadata { ingress_ifindex: 3, rx_queue_index: 1, data_meta: 0 };
        {
            let mut policy = from_fn(|_, meta: &Metadata| {
                seen = Some(*meta);
                Ok(Verdict::Redirect)
            });
            let mut program = Program::new(Config::default(), &mut policy);
            let ctx = Context::new(&mut frame).with_meta(meta);
            assert_eq!(program.run(ctx), Verdict::Redirect);
        }
        assert_eq!(seen, Some(meta));
    }
}
