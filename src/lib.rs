//! Raw DEFLATE (RFC 1951) decompression.
//!
//! Huffman codes are kept as flat arrays in which every internal node records
//! the size of its left subtree, so decoding walks an array instead of
//! following pointers. Works without `std` (needs `alloc`).

#![no_std]

pub mod bitview;
pub mod deflate;
pub mod huffman;
pub mod outbuf;

pub use bitview::BitView;
pub use deflate::{decompress, DecompressBuffered, DecompressError};
pub use huffman::HuffmanTree;
pub use outbuf::{OutputBuf, PreallocatedBuf, VecBuf};
pub use treeflate_macros::code_lengths;
