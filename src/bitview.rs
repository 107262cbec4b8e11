use bitvec::{field::BitField, order::Lsb0, slice::BitSlice, view::BitView as _};

use crate::deflate::DecompressError;

/// Bit-granular read cursor over a byte buffer.
///
/// Bits are visited in DEFLATE order: bytes in ascending address order, and
/// within a byte from least to most significant. Multi-bit reads are packed
/// the same way, so the first bit read lands in bit 0 of the result.
///
/// Unlike a raw pointer cursor, the view knows where the buffer ends. Any read
/// that would go past it fails with [`DecompressError::Truncated`]. The cursor
/// itself may be moved past the end with [`BitView::seek`] or
/// [`BitView::jump`]; only the following read fails.
#[derive(Clone, Copy, Debug)]
pub struct BitView<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn with_bit_offset(data: &'a [u8], bit_offset: usize) -> Self {
        Self {
            data,
            pos: bit_offset,
        }
    }

    #[inline]
    fn bits(&self) -> &'a BitSlice<u8, Lsb0> {
        self.data.view_bits::<Lsb0>()
    }

    #[inline]
    fn check(&self, nbits: usize) -> Result<(), DecompressError> {
        if nbits > self.remaining_bits() {
            Err(DecompressError::Truncated)
        } else {
            Ok(())
        }
    }

    /// Absolute bit offset of the cursor from the start of the buffer
    pub fn bit_pos(&self) -> usize {
        self.pos
    }

    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    #[inline]
    pub fn peek_bit(&self) -> Result<bool, DecompressError> {
        self.check(1)?;
        Ok(self.bits()[self.pos])
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, DecompressError> {
        let bit = self.peek_bit()?;
        self.pos += 1;
        Ok(bit)
    }

    /// Copies the next `nbits` bits into `dest` without advancing.
    ///
    /// `dest` must hold at least `ceil(nbits / 8)` bytes. Those bytes are
    /// overwritten; unused high bits of a trailing partial byte are zeroed.
    pub fn peek_bits_into(&self, dest: &mut [u8], nbits: usize) -> Result<(), DecompressError> {
        let nbytes = (nbits + 7) / 8;
        assert!(dest.len() >= nbytes);
        self.check(nbits)?;

        dest[..nbytes].fill(0);
        dest.view_bits_mut::<Lsb0>()[..nbits]
            .clone_from_bitslice(&self.bits()[self.pos..self.pos + nbits]);
        Ok(())
    }

    pub fn read_bits_into(&mut self, dest: &mut [u8], nbits: usize) -> Result<(), DecompressError> {
        self.peek_bits_into(dest, nbits)?;
        self.pos += nbits;
        Ok(())
    }

    /// Loads the next `nbits` bits as an unsigned little-endian number
    /// without advancing. `nbits` may be 0, which yields 0.
    #[inline]
    pub fn peek_bits<T: funty::Integral>(&self, nbits: usize) -> Result<T, DecompressError> {
        debug_assert!(nbits <= 8 * core::mem::size_of::<T>());
        if nbits == 0 {
            return Ok(T::ZERO);
        }
        self.check(nbits)?;
        Ok(self.bits()[self.pos..self.pos + nbits].load_le::<T>())
    }

    #[inline]
    pub fn read_bits<T: funty::Integral>(&mut self, nbits: usize) -> Result<T, DecompressError> {
        let ret = self.peek_bits::<T>(nbits)?;
        self.pos += nbits;
        Ok(ret)
    }

    /// Returns the next `len` whole bytes and advances past them.
    ///
    /// The cursor must be on a byte boundary.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecompressError> {
        debug_assert!(self.pos % 8 == 0);
        self.check(len * 8)?;
        let start = self.pos / 8;
        self.pos += len * 8;
        Ok(&self.data[start..start + len])
    }

    pub fn seek(&mut self, bit_pos: usize) {
        self.pos = bit_pos;
    }

    pub fn jump(&mut self, nbits: usize) {
        self.pos += nbits;
    }

    pub fn skip_to_byte_boundary(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }
}
