//! Bounds-checked packet dissection and rewriting for XDP-style programs.
//!
//! A program of this kind is handed one received frame at a time, as a mutable buffer of fixed
//! length. It decodes the Ethernet, IPv4 or IPv6, and TCP or UDP headers in place, may rewrite
//! some of their fields, and finally returns a [`Verdict`] that tells the caller what to do
//! with the frame. Nothing is allocated, nothing is copied and no octet outside the buffer is
//! ever accessed.
//!
//! ## Design
//!
//! The crate is layered like the protocols it handles.
//!
//! * [`wire`] holds the header codecs: byte wrappers with network order field accessors, their
//!   decoded representations, a [`BoundedView`](wire::BoundedView) that guards every access
//!   against the end of the buffer, and the internet checksum.
//! * [`dissect`] walks a frame through the codecs and collects the decoded headers.
//! * [`packet`] and [`mutate`] give access to a dissected frame. Header fields can only be
//!   rewritten together with a repair of every checksum that covers them.
//! * [`program`] glues it together: dissect, ask a [`Policy`] and map failures to verdicts.
//!
//! ## Usage
//!
//! ```
//! use ethox_xdp::{Config, Context, Program, Verdict};
//! use ethox_xdp::program::PortRewrite;
//! use ethox_xdp::wire::ip::Protocol;
//!
//! // Send all UDP traffic for port 53 to port 5353 instead.
//! let mut program = Program::new(Config::default(), PortRewrite::new(Protocol::Udp, 53, 5353));
//!
//! let mut frame = [0u8; 64];
//! // An ARP frame is not dissected and dropped.
//! frame[12..14].copy_from_slice(&[0x08, 0x06]);
//! assert_eq!(program.run(Context::new(&mut frame)), Verdict::Drop);
//! ```
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod wire;
pub mod dissect;
pub mod packet;
pub mod mutate;
pub mod verdict;
pub mod program;

pub use self::dissect::{Config, Dissector};
pub use self::mutate::Field;
pub use self::packet::Packet;
pub use self::program::{Context, Metadata, Policy, Program};
pub use self::verdict::Verdict;
