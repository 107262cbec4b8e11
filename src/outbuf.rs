extern crate alloc as alloc_crate;
use alloc_crate::vec::Vec;

use crate::deflate::DecompressError;

/// Sink for decompressed bytes.
///
/// `add_match` copies `len` bytes starting `dist` bytes back from the current
/// end. When `dist < len` the copy reads bytes it has just written, which
/// repeats the last `dist` bytes. Bytes past [`OutputBuf::limit`] are
/// dropped.
pub trait OutputBuf {
    fn add_lit(&mut self, b: u8);
    fn add_lits(&mut self, lits: &[u8]);
    fn add_match(&mut self, dist: usize, len: usize) -> Result<(), DecompressError>;
    fn cur_pos(&self) -> usize;
    fn limit(&self) -> usize;

    fn is_at_limit(&self) -> bool {
        self.cur_pos() >= self.limit()
    }
}

#[inline]
fn check_lookback(dist: usize, avail: usize) -> Result<(), DecompressError> {
    if dist == 0 || dist > avail {
        Err(DecompressError::BadLookback { disp: dist, avail })
    } else {
        Ok(())
    }
}

pub struct PreallocatedBuf<'a> {
    cur_pos: usize,
    buf: &'a mut [u8],
}

impl<'a> From<&'a mut [u8]> for PreallocatedBuf<'a> {
    fn from(value: &'a mut [u8]) -> Self {
        Self {
            cur_pos: 0,
            buf: value,
        }
    }
}

impl<'a> OutputBuf for PreallocatedBuf<'a> {
    fn add_lit(&mut self, b: u8) {
        if self.cur_pos < self.buf.len() {
            self.buf[self.cur_pos] = b;
            self.cur_pos += 1;
        }
    }

    fn add_lits(&mut self, lits: &[u8]) {
        let len = core::cmp::min(lits.len(), self.buf.len() - self.cur_pos);
        self.buf[self.cur_pos..(self.cur_pos + len)].copy_from_slice(&lits[..len]);
        self.cur_pos += len;
    }

    fn add_match(&mut self, dist: usize, len: usize) -> Result<(), DecompressError> {
        check_lookback(dist, self.cur_pos)?;

        let mut len = core::cmp::min(len, self.buf.len() - self.cur_pos);
        let start = self.cur_pos - dist;
        while len > 0 {
            let chunk = core::cmp::min(len, self.cur_pos - start);
            self.buf.copy_within(start..start + chunk, self.cur_pos);
            self.cur_pos += chunk;
            len -= chunk;
        }

        Ok(())
    }

    fn cur_pos(&self) -> usize {
        self.cur_pos
    }

    fn limit(&self) -> usize {
        self.buf.len()
    }
}

/// Growable output, optionally capped at `limit` bytes
pub struct VecBuf {
    limit: usize,
    buf: Vec<u8>,
}

impl VecBuf {
    pub fn new(prealloc: usize, limit: usize) -> Self {
        let buf = if prealloc > 0 {
            Vec::with_capacity(core::cmp::min(prealloc, limit))
        } else {
            Vec::new()
        };

        Self { limit, buf }
    }
}

impl From<VecBuf> for Vec<u8> {
    fn from(value: VecBuf) -> Self {
        value.buf
    }
}

impl OutputBuf for VecBuf {
    fn add_lit(&mut self, b: u8) {
        if self.buf.len() < self.limit {
            self.buf.push(b);
        }
    }

    fn add_lits(&mut self, lits: &[u8]) {
        let len = core::cmp::min(lits.len(), self.limit - self.buf.len());
        self.buf.extend_from_slice(&lits[..len]);
    }

    fn add_match(&mut self, dist: usize, len: usize) -> Result<(), DecompressError> {
        check_lookback(dist, self.buf.len())?;

        let mut len = core::cmp::min(len, self.limit - self.buf.len());
        self.buf.reserve(len);
        let start = self.buf.len() - dist;
        while len > 0 {
            // everything from start to the end is valid source, and it
            // grows with every chunk
            let chunk = core::cmp::min(len, self.buf.len() - start);
            self.buf.extend_from_within(start..start + chunk);
            len -= chunk;
        }

        Ok(())
    }

    fn cur_pos(&self) -> usize {
        self.buf.len()
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbuf_prealloc_buf() {
        let mut buf_ = [0u8; 4];
        let mut buf = PreallocatedBuf::from(&mut buf_[..]);

        assert_eq!(buf.cur_pos(), 0);
        buf.add_lit(0x11);
        assert_eq!(buf.cur_pos(), 1);
        buf.add_lits(&[0x22]);
        assert_eq!(buf.cur_pos(), 2);
        buf.add_lits(&[0x33]);
        assert_eq!(buf.cur_pos(), 3);
        buf.add_lits(&[0x44, 0x55]);
        buf.add_lit(0x66);

        assert!(buf.is_at_limit());
        assert_eq!(buf_, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn outbuf_prealloc_buf_match() {
        let mut buf_ = [0u8; 8];
        let mut buf = PreallocatedBuf::from(&mut buf_[..]);

        buf.add_lits(&[0x11, 0x22, 0x33]);
        buf.add_match(2, 7).unwrap();
        assert_eq!(buf.cur_pos(), 8);

        assert_eq!(buf_, [0x11, 0x22, 0x33, 0x22, 0x33, 0x22, 0x33, 0x22]);
    }

    #[test]
    fn outbuf_vec_buf() {
        let mut buf = VecBuf::new(0, 4);

        assert_eq!(buf.limit(), 4);
        buf.add_lit(0x11);
        buf.add_lits(&[0x22, 0x33]);
        assert_eq!(buf.cur_pos(), 3);
        buf.add_lits(&[0x44, 0x55]);
        buf.add_lit(0x66);

        assert!(buf.is_at_limit());
        let buf: Vec<_> = buf.into();
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn outbuf_vec_buf_overlapping_match() {
        let mut buf = VecBuf::new(16, usize::MAX);

        buf.add_lits(b"AB");
        buf.add_match(2, 6).unwrap();
        buf.add_match(1, 3).unwrap();
        buf.add_lit(b'C');
        buf.add_match(4, 4).unwrap();

        let buf: Vec<_> = buf.into();
        assert_eq!(buf, b"ABABABABBBBCBBBC");
    }

    #[test]
    fn outbuf_vec_buf_long_period() {
        let mut buf = VecBuf::new(0, usize::MAX);
        let pattern: Vec<u8> = (0..=20).collect();
        buf.add_lits(&pattern);
        buf.add_match(21, 100).unwrap();

        let buf: Vec<_> = buf.into();
        assert_eq!(buf.len(), 121);
        for (i, &b) in buf.iter().enumerate() {
            assert_eq!(b as usize, i % 21);
        }
    }

    #[test]
    fn outbuf_match_capped_at_limit() {
        let mut buf = VecBuf::new(0, 5);
        buf.add_lits(&[1, 2]);
        buf.add_match(1, 10).unwrap();
        assert!(buf.is_at_limit());
        let buf: Vec<_> = buf.into();
        assert_eq!(buf, [1, 2, 2, 2, 2]);
    }

    #[test]
    fn outbuf_bad_lookback() {
        let mut buf = VecBuf::new(0, usize::MAX);
        assert_eq!(
            buf.add_match(1, 3),
            Err(DecompressError::BadLookback { disp: 1, avail: 0 })
        );
        buf.add_lits(&[1, 2, 3]);
        assert_eq!(
            buf.add_match(4, 3),
            Err(DecompressError::BadLookback { disp: 4, avail: 3 })
        );
        assert_eq!(
            buf.add_match(0, 3),
            Err(DecompressError::BadLookback { disp: 0, avail: 3 })
        );

        let mut buf_ = [0u8; 4];
        let mut buf = PreallocatedBuf::from(&mut buf_[..]);
        buf.add_lit(9);
        assert_eq!(
            buf.add_match(2, 1),
            Err(DecompressError::BadLookback { disp: 2, avail: 1 })
        );
    }
}
