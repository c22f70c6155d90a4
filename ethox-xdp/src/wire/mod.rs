/*! Low-level, bounds-checked header access.

# An overview over header representations

The `wire` module deals with the header *representation*. It provides three levels of
functionality.

 * First, a [`BoundedView`] over the raw octets of one frame. It tracks a cursor and refuses to
   hand out any header that does not fit entirely before the end of the buffer. This check is
   performed again for every single layer, never derived from an earlier layer's success.
 * Second, dynamically sized byte wrappers such as [`ethernet::frame`] or [`ipv4::packet`] that
   extract fields from sequences of octets and insert fields into them. Every multi-byte field
   is converted between network and host byte order on access, bit-packed fields are extracted
   by masking and shifting single octets.
 * Third, a compact, high-level `Repr` of each header with every field decoded, which can be
   parsed from and emitted into a byte wrapper.

The byte wrappers are only ever constructed from a slice that the view has already proven to
be long enough, which is what makes their accessors free of panics. The [`HeaderCodec`] trait
ties the three levels together for the dissector.

# Examples

Decode the Ethernet header at the front of a buffer:

```rust
use ethox_xdp::wire::{BoundedView, HeaderCodec, NextProtocol, ethernet};

let mut bytes = [0u8; 14];
bytes[12..14].copy_from_slice(&[0x08, 0x00]);

let mut view = BoundedView::new(&mut bytes[..]);
let repr = ethernet::frame::decode(&mut view).expect("fits in the buffer");
assert_eq!(repr.ethertype, ethernet::EtherType::Ipv4);
assert_eq!(ethernet::frame::selector(&repr), NextProtocol::Ipv4);
assert_eq!(view.remaining(), 0);
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to the header codecs in this folder:
// * `ethernet.rs`
// * `ip.rs`
// * `ipv4.rs`
// * `ipv6.rs`
// * `tcp.rs`
// * `udp.rs`

// `Repr` fields are named after the header fields they hold.
#![allow(missing_docs)]

use core::ops::Range;

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
    pub(crate) type Rest  = ::core::ops::RangeFrom<usize>;
}

mod error;
mod view;

pub mod checksum;
pub mod ethernet;
pub mod ip;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;

pub use self::error::{Error, Result};
pub use self::view::{BoundedView, OutOfBounds};

/// Describes how to handle checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled or checked by the NIC.
    Ignored,
}

impl Checksum {
    /// Check if a checksum should be calculated by the library.
    ///
    /// Otherwise it is ignored due to the assumption that it was offloaded or is otherwise
    /// undesirable to check.
    pub fn manual(self) -> bool {
        match self {
            Checksum::Manual => true,
            Checksum::Ignored => false,
        }
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Checksum::Ignored
    }
}

/// A byte wrapper for one protocol header.
///
/// Implementors are dynamically sized wrappers around `[u8]`. The conversions are unchecked: all
/// accessors of the header assume that the slice holds at least `LEN` bytes, which is exactly
/// what [`BoundedView::peek`] and [`BoundedView::commit`] prove before calling them.
pub trait Header {
    /// The length of the fixed part of the header, in octets.
    const LEN: usize;

    /// Imbue a slice with the header structure.
    fn from_bytes(bytes: &[u8]) -> &Self;

    /// Imbue a mutable slice with the header structure.
    fn from_bytes_mut(bytes: &mut [u8]) -> &mut Self;
}

/// The protocol that the dissector should decode next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextProtocol {
    /// An IPv4 header follows.
    Ipv4,
    /// An IPv6 header follows.
    Ipv6,
    /// A TCP header follows.
    Tcp,
    /// A UDP header follows.
    Udp,
    /// The selector names a protocol without a codec.
    Unsupported(u16),
    /// This is the innermost header that is dissected.
    End,
}

/// Encode and decode one protocol header within a bounded view.
pub trait HeaderCodec: Header {
    /// The decoded header, with every field in host order.
    type Repr: Copy;

    /// The fields that can be rewritten in place.
    type Field: Copy;

    /// Offset of the field that selects the next protocol, relative to the header start.
    const SELECTOR: Option<usize>;

    /// Decode the header at the cursor and move the cursor past it.
    ///
    /// The bounds check happens before any field is read. On error the cursor is not moved.
    fn decode(view: &mut BoundedView<'_>) -> Result<Self::Repr>;

    /// The octets occupied by a field, relative to the header start.
    fn field_range(field: &Self::Field) -> Range<usize>;

    /// Write a host order field value in network order.
    fn encode_field(&mut self, field: Self::Field);

    /// The protocol of the next layer.
    fn selector(repr: &Self::Repr) -> NextProtocol;
}
