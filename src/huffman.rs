extern crate alloc as alloc_crate;
use alloc_crate::vec::Vec;

use bitvec::{order::Lsb0, slice::BitSlice};

use crate::{bitview::BitView, deflate::DecompressError};

/// DEFLATE never uses codes longer than this
pub const MAX_CODE_LEN: usize = 15;

/// Values that can be stored in a [`HuffmanTree`] node.
///
/// A node holds either a decoded symbol (leaf) or the number of internal
/// nodes in its left subtree, so the type must fit both.
pub trait TreeSym: funty::Unsigned + TryFrom<usize> + Into<usize> {}
impl<T> TreeSym for T where T: funty::Unsigned + TryFrom<usize> + Into<usize> {}

/// Canonical Huffman code stored as a flat, pointer-free binary tree.
///
/// The tree lives in one array. A parent comes immediately before its
/// children, and its whole left subtree comes before its right subtree.
/// Internal nodes store the number of internal nodes in their left subtree
/// (`n`), which puts the left child at `+1` and the right child at `+2n+2`.
/// Leaves store the symbol. Entry 0 is always an internal node. When the code
/// lengths leave part of the code space unused, the spare leaves hold
/// `T::MAX`, so `T::MAX` itself cannot be a symbol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HuffmanTree<T> {
    tree: Vec<T>,
}

#[inline]
fn node<T: TreeSym>(v: usize) -> Result<T, DecompressError> {
    <T as TryFrom<usize>>::try_from(v).map_err(|_| DecompressError::InvalidHuffTree)
}

impl<T: TreeSym> HuffmanTree<T> {
    /// Builds the tree for a DEFLATE canonical code.
    ///
    /// `code_lens[sym]` is the bit length of `sym`'s code, 0 if unused.
    /// A set of all-zero lengths gives an empty tree.
    pub fn new(code_lens: &[u8]) -> Result<Self, DecompressError> {
        let mut codes_at_bit_count = [0u32; MAX_CODE_LEN + 1];
        let mut nsyms = 0;
        for (sym, &l) in code_lens.iter().enumerate() {
            if l as usize > MAX_CODE_LEN {
                return Err(DecompressError::BadCodeLen { sym, len: l });
            }
            if l > 0 {
                codes_at_bit_count[l as usize] += 1;
                nsyms += 1;
            }
        }
        if nsyms == 0 {
            return Ok(Self::default());
        }

        let mut next_code_at_bit_count = [0u32; MAX_CODE_LEN + 1];
        let mut code = 0;
        for i in 2..=MAX_CODE_LEN {
            code = (code + codes_at_bit_count[i - 1]) << 1;
            next_code_at_bit_count[i] = code;
        }

        let unused: usize = T::MAX.into();
        let mut tree: Vec<T> = Vec::with_capacity(nsyms * 2 - 1);
        tree.push(T::MAX);
        let mut internal_nodes = 0usize;
        let mut path = [0usize; MAX_CODE_LEN];

        for (sym, &l) in code_lens.iter().enumerate() {
            let l = l as usize;
            if l == 0 {
                continue;
            }
            if sym >= unused {
                return Err(DecompressError::InvalidHuffTree);
            }
            let code = next_code_at_bit_count[l];
            if code >> l != 0 {
                // more codes of this length than the code space allows
                return Err(DecompressError::InvalidHuffTree);
            }
            let code_bit = |j: usize| code & (1 << (l - j - 1)) != 0;

            let mut idx = 0;
            // internal nodes in the subtree rooted at idx
            let mut branch_nodes = internal_nodes;
            for j in 0..l {
                path[j] = idx;

                if branch_nodes == 0 {
                    // idx is a leaf; split it into an internal node with two leaves
                    tree[idx] = T::ZERO;
                    tree.insert(idx + 1, T::MAX);
                    tree.insert(idx + 1, T::MAX);
                    internal_nodes += 1;
                    branch_nodes += 1;

                    // the new node sits in the left subtree of every
                    // ancestor we went left from
                    for k in 0..j {
                        if !code_bit(k) {
                            let n: usize = tree[path[k]].into();
                            tree[path[k]] = node(n + 1)?;
                        }
                    }
                }

                let left_nodes: usize = tree[idx].into();
                if code_bit(j) {
                    branch_nodes -= left_nodes + 1;
                    idx += left_nodes * 2 + 2;
                } else {
                    branch_nodes = left_nodes;
                    idx += 1;
                }
            }

            next_code_at_bit_count[l] += 1;
            tree[idx] = node(sym)?;
        }

        Ok(Self { tree })
    }

    /// Number of leaves, i.e. `(nodes + 1) / 2`
    pub fn leaf_count(&self) -> usize {
        (self.tree.len() + 1) / 2
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    #[inline]
    fn internal_nodes(&self) -> usize {
        (self.tree.len() - 1) / 2
    }

    /// Moves from internal node `idx` to one of its children, updating the
    /// internal node count of the current subtree.
    #[inline]
    fn step(&self, idx: usize, branch_nodes: usize, right: bool) -> (usize, usize) {
        let left_nodes: usize = self.tree[idx].into();
        if right {
            (idx + left_nodes * 2 + 2, branch_nodes - left_nodes - 1)
        } else {
            (idx + 1, left_nodes)
        }
    }

    /// Looks up a complete code. `code[0]` is the first bit of the code.
    ///
    /// Returns `None` if the code ends on an internal node or runs past a
    /// leaf before it is exhausted.
    pub fn traverse(&self, code: &BitSlice<u8, Lsb0>) -> Option<T> {
        if self.tree.is_empty() || code.is_empty() {
            return None;
        }

        let mut idx = 0;
        let mut branch_nodes = self.internal_nodes();
        for bit in code.iter().by_vals() {
            if branch_nodes == 0 {
                return None;
            }
            (idx, branch_nodes) = self.step(idx, branch_nodes, bit);
            if idx >= self.tree.len() {
                return None;
            }
        }

        if branch_nodes == 0 && self.tree[idx] != T::MAX {
            Some(self.tree[idx])
        } else {
            None
        }
    }

    /// Whether `code` leads exactly to a leaf
    pub fn is_leaf(&self, code: &BitSlice<u8, Lsb0>) -> bool {
        self.traverse(code).is_some()
    }

    /// Reads one code from `inp`, a bit at a time, and returns its symbol.
    pub fn decode_next(&self, inp: &mut BitView) -> Result<T, DecompressError> {
        if self.tree.is_empty() {
            return Err(DecompressError::InvalidHuffNoSyms);
        }

        let mut idx = 0;
        let mut branch_nodes = self.internal_nodes();
        loop {
            let bit = inp.read_bit()?;
            (idx, branch_nodes) = self.step(idx, branch_nodes, bit);
            if idx >= self.tree.len() {
                return Err(DecompressError::BadHuffSym);
            }
            if branch_nodes == 0 {
                if self.tree[idx] == T::MAX {
                    return Err(DecompressError::BadHuffSym);
                }
                return Ok(self.tree[idx]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use bitvec::{bits, bitvec, vec::BitVec};

    use super::*;

    #[test]
    fn huffman_layout_small() {
        let t = HuffmanTree::<u16>::new(&crate::code_lengths!(0 => 2, 1 => 1, 2..=3 => 3)).unwrap();
        assert_eq!(t.tree, [0, 1, 0, 0, 0, 2, 3]);
        assert_eq!(t.leaf_count(), 4);
    }

    #[test]
    fn huffman_decode_canonical_codes() {
        let t = HuffmanTree::<u8>::new(&[2, 1, 3, 3]).unwrap();

        // codes 0, 10, 110, 111 packed first-bit-first
        let data = bits![u8, Lsb0; 0, 1, 0, 1, 1, 0, 1, 1, 1];
        let data = data.to_bitvec().into_vec();
        let mut v = BitView::new(&data);
        assert_eq!(t.decode_next(&mut v), Ok(1));
        assert_eq!(t.decode_next(&mut v), Ok(0));
        assert_eq!(t.decode_next(&mut v), Ok(2));
        assert_eq!(t.decode_next(&mut v), Ok(3));
        assert_eq!(v.bit_pos(), 9);
    }

    #[test]
    fn huffman_traverse_whole_codes() {
        let t = HuffmanTree::<u8>::new(&[2, 1, 3, 3]).unwrap();

        assert_eq!(t.traverse(bits![u8, Lsb0; 0]), Some(1));
        assert_eq!(t.traverse(bits![u8, Lsb0; 1, 0]), Some(0));
        assert_eq!(t.traverse(bits![u8, Lsb0; 1, 1, 0]), Some(2));
        assert_eq!(t.traverse(bits![u8, Lsb0; 1, 1, 1]), Some(3));

        assert!(!t.is_leaf(BitSlice::empty()));
        assert!(!t.is_leaf(bits![u8, Lsb0; 1]));
        assert!(!t.is_leaf(bits![u8, Lsb0; 1, 1]));
        assert!(!t.is_leaf(bits![u8, Lsb0; 0, 0]));
        assert!(t.is_leaf(bits![u8, Lsb0; 1, 1, 0]));
    }

    #[test]
    fn huffman_is_leaf_accumulating() {
        // the way a caller reads a code without knowing its length up front
        let t = HuffmanTree::<u16>::new(&[3, 3, 3, 3, 3, 2, 4, 4]).unwrap();
        let data = [0b1111_0110u8];
        let mut v = BitView::new(&data);

        let mut code: BitVec<u8, Lsb0> = BitVec::new();
        while !t.is_leaf(&code) {
            code.push(v.read_bit().unwrap());
        }
        // 0 and 01 are prefixes, 011 is symbol 1
        assert_eq!(code.len(), 3);
        assert_eq!(t.traverse(&code), Some(1));
    }

    #[test]
    fn huffman_fixed_shape() {
        let lit = HuffmanTree::<u16>::new(&crate::code_lengths!(
            0..=143 => 8, 144..=255 => 9, 256..=279 => 7, 280..=287 => 8
        ))
        .unwrap();
        assert_eq!(lit.leaf_count(), 288);

        let dist = HuffmanTree::<u16>::new(&[5; 32]).unwrap();
        assert_eq!(dist.leaf_count(), 32);
        for sym in 0..32u8 {
            let mut code = bitvec![u8, Lsb0; 0; 5];
            for j in 0..5 {
                code.set(j, sym & (1 << (4 - j)) != 0);
            }
            assert_eq!(dist.traverse(&code), Some(sym as u16));
        }
    }

    #[test]
    fn huffman_single_symbol() {
        let t = HuffmanTree::<u16>::new(&[0, 0, 1]).unwrap();
        assert_eq!(t.leaf_count(), 2);

        assert_eq!(t.tree, [0, 2, u16::MAX]);
        assert_eq!(t.traverse(bits![u8, Lsb0; 0]), Some(2));
        assert_eq!(t.traverse(bits![u8, Lsb0; 1]), None);
        assert!(!t.is_leaf(bits![u8, Lsb0; 1]));

        let data = [0b10u8];
        let mut v = BitView::new(&data);
        assert_eq!(t.decode_next(&mut v), Ok(2));
        assert_eq!(t.decode_next(&mut v), Err(DecompressError::BadHuffSym));
    }

    #[test]
    fn huffman_incomplete_code() {
        // 0 -> 0, 10 -> 1, 11 unassigned
        let t = HuffmanTree::<u8>::new(&[1, 2]).unwrap();
        assert_eq!(t.leaf_count(), 3);
        assert_eq!(t.traverse(bits![u8, Lsb0; 1, 0]), Some(1));
        assert_eq!(t.traverse(bits![u8, Lsb0; 1, 1]), None);

        let data = [0b0000_1110u8];
        let mut v = BitView::new(&data);
        assert_eq!(t.decode_next(&mut v), Ok(0));
        assert_eq!(t.decode_next(&mut v), Err(DecompressError::BadHuffSym));
        assert_eq!(v.bit_pos(), 3);
    }

    #[test]
    fn huffman_empty() {
        let t = HuffmanTree::<u16>::new(&[0; 30]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.leaf_count(), 0);
        assert!(!t.is_leaf(bits![u8, Lsb0; 0]));

        let data = [0u8];
        let mut v = BitView::new(&data);
        assert_eq!(t.decode_next(&mut v), Err(DecompressError::InvalidHuffNoSyms));
    }

    #[test]
    fn huffman_bad_lengths() {
        assert_eq!(
            HuffmanTree::<u16>::new(&[1, 16]),
            Err(DecompressError::BadCodeLen { sym: 1, len: 16 })
        );
        assert_eq!(
            HuffmanTree::<u16>::new(&[1, 1, 1]),
            Err(DecompressError::InvalidHuffTree)
        );
        assert_eq!(
            HuffmanTree::<u16>::new(&[1, 2, 2, 2]),
            Err(DecompressError::InvalidHuffTree)
        );
        // symbol 256 does not fit in a u8 leaf
        let mut lens = vec![0u8; 257];
        lens[0] = 1;
        lens[256] = 1;
        assert_eq!(
            HuffmanTree::<u8>::new(&lens),
            Err(DecompressError::InvalidHuffTree)
        );
        // 255 is the u8 marker for unused leaves
        let mut lens = vec![0u8; 256];
        lens[0] = 1;
        lens[255] = 1;
        assert_eq!(
            HuffmanTree::<u8>::new(&lens),
            Err(DecompressError::InvalidHuffTree)
        );
        assert!(HuffmanTree::<u16>::new(&lens).is_ok());
    }

    #[test]
    fn huffman_truncated_code() {
        let t = HuffmanTree::<u16>::new(&[5; 32]).unwrap();
        let data = [0u8];
        let mut v = BitView::with_bit_offset(&data, 4);
        assert_eq!(t.decode_next(&mut v), Err(DecompressError::Truncated));
    }
}
