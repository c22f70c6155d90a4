use core::ops::Range;

use super::Header;

/// An access crossed the verified end of the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("access beyond the end of the packet")]
pub struct OutOfBounds;

/// A cursor-tracked, length-checked window over one packet buffer.
///
/// The start of the window is the first octet of the buffer, its end the buffer length. The
/// cursor always satisfies `0 <= cursor <= end`. Every operation that would move it, or hand out
/// bytes, beyond the end fails and leaves the view unchanged.
#[derive(Debug)]
pub struct BoundedView<'a> {
    buffer: &'a mut [u8],
    cursor: usize,
}

impl<'a> BoundedView<'a> {
    /// Create a view over a whole packet buffer, with the cursor at its start.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        BoundedView {
            buffer,
            cursor: 0,
        }
    }

    /// The current cursor offset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The offset of the end of the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of octets between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Move the cursor forward by `n` octets.
    pub fn advance(&mut self, n: usize) -> Result<(), OutOfBounds> {
        self.cursor = self.end_of(n)?;
        Ok(())
    }

    /// View the octets at the cursor as header `H`, without moving the cursor.
    pub fn peek<H: Header + ?Sized>(&self) -> Result<&H, OutOfBounds> {
        self.peek_len(H::LEN)
    }

    /// View `len` octets at the cursor as header `H`, without moving the cursor.
    ///
    /// This is for headers with options, whose length is only known after reading their fixed
    /// part. Lengths below `H::LEN` are extended to `H::LEN`.
    pub fn peek_len<H: Header + ?Sized>(&self, len: usize) -> Result<&H, OutOfBounds> {
        let end = self.end_of(len.max(H::LEN))?;
        Ok(H::from_bytes(&self.buffer[self.cursor..end]))
    }

    /// View the octets at the cursor as mutable header `H`, and move past it.
    pub fn commit<H: Header + ?Sized>(&mut self) -> Result<&mut H, OutOfBounds> {
        self.commit_len(H::LEN)
    }

    /// View `len` octets at the cursor as mutable header `H`, and move past them.
    ///
    /// Lengths below `H::LEN` are extended to `H::LEN`.
    pub fn commit_len<H: Header + ?Sized>(&mut self, len: usize) -> Result<&mut H, OutOfBounds> {
        let start = self.cursor;
        let end = self.end_of(len.max(H::LEN))?;
        self.cursor = end;
        Ok(H::from_bytes_mut(&mut self.buffer[start..end]))
    }

    /// Access an absolute byte range of the packet.
    pub fn slice(&self, range: Range<usize>) -> Result<&[u8], OutOfBounds> {
        self.buffer.get(range).ok_or(OutOfBounds)
    }

    /// Mutably access an absolute byte range of the packet.
    pub fn slice_mut(&mut self, range: Range<usize>) -> Result<&mut [u8], OutOfBounds> {
        self.buffer.get_mut(range).ok_or(OutOfBounds)
    }

    /// The whole packet buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer
    }

    fn end_of(&self, n: usize) -> Result<usize, OutOfBounds> {
        match self.cursor.checked_add(n) {
            Some(end) if end <= self.buffer.len() => Ok(end),
            _ => Err(OutOfBounds),
        }
    }
}
