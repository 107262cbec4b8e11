#[cfg(feature = "std")]
extern crate std;
#[cfg(feature = "std")]
use std::error::Error;

extern crate alloc as alloc_crate;
use alloc_crate::vec::Vec;

use tracing::{debug, trace, warn};

use crate::{
    bitview::BitView,
    code_lengths,
    huffman::HuffmanTree,
    outbuf::{OutputBuf, PreallocatedBuf, VecBuf},
};

const CODE_LEN_ALPHABET_SIZE: usize = 19;
const CODE_LEN_ORDER: [u8; CODE_LEN_ALPHABET_SIZE] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];
// HLIT and HDIST are 5-bit fields
const MAX_LIT_SYMS: usize = 31 + 257;
const MAX_DIST_SYMS: usize = 31 + 1;

const LEN_FOR_SYM: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LEN_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_FOR_SYM: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

const FIXED_LIT_LENS: [u8; 288] =
    code_lengths!(0..=143 => 8, 144..=255 => 9, 256..=279 => 7, 280..=287 => 8);
const FIXED_DIST_LENS: [u8; 32] = code_lengths!(0..32 => 5);

#[derive(Debug, PartialEq, Eq)]
pub enum DecompressError {
    BadLookback { disp: usize, avail: usize },
    InvalidBlockType,
    BadCodeLen { sym: usize, len: u8 },
    InvalidHuffTree,
    InvalidHuffNoSyms,
    InvalidCodeLenRep,
    BadHuffSym,
    Truncated,
}

impl core::fmt::Display for DecompressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            DecompressError::BadLookback { disp, avail } => {
                write!(
                    f,
                    "Bad lookback (attempted -{} bytes out of {})",
                    disp, avail
                )
            }
            DecompressError::InvalidBlockType => {
                write!(f, "Block type is not valid")
            }
            DecompressError::BadCodeLen { sym, len } => {
                write!(f, "Code length {} for symbol {} is too long", len, sym)
            }
            DecompressError::InvalidHuffTree => {
                write!(f, "Code lengths do not describe a valid Huffman tree")
            }
            DecompressError::InvalidHuffNoSyms => {
                write!(f, "Invalid Huffman tree without symbols")
            }
            DecompressError::InvalidCodeLenRep => {
                write!(f, "Invalid repeat in Huffman tree code lengths")
            }
            DecompressError::BadHuffSym => {
                write!(f, "An invalid symbol was encoded")
            }
            DecompressError::Truncated => {
                write!(f, "Input is truncated")
            }
        }
    }
}

#[cfg(feature = "std")]
impl Error for DecompressError {}

/// The RFC 1951 3.2.6 fixed literal/length and distance codes
#[derive(Debug)]
struct FixedTables {
    lit: HuffmanTree<u16>,
    dist: HuffmanTree<u16>,
}

impl FixedTables {
    fn build() -> Self {
        trace!("building fixed Huffman tables");
        Self {
            lit: HuffmanTree::new(&FIXED_LIT_LENS).expect("fixed literal/length code is valid"),
            dist: HuffmanTree::new(&FIXED_DIST_LENS).expect("fixed distance code is valid"),
        }
    }
}

/// Built on first use and shared by every stream in the process
#[cfg(feature = "std")]
fn fixed_tables() -> &'static FixedTables {
    static FIXED_TABLES: std::sync::OnceLock<FixedTables> = std::sync::OnceLock::new();
    FIXED_TABLES.get_or_init(FixedTables::build)
}

/// Per-stream handle to the fixed tables. Without `std` they are built on
/// the first fixed block of the stream, so streams without one never pay for
/// them.
#[derive(Default)]
struct LazyFixedTables {
    #[cfg(not(feature = "std"))]
    tables: Option<FixedTables>,
}

impl LazyFixedTables {
    #[cfg(feature = "std")]
    fn get(&mut self) -> &FixedTables {
        fixed_tables()
    }

    #[cfg(not(feature = "std"))]
    fn get(&mut self) -> &FixedTables {
        self.tables.get_or_insert_with(FixedTables::build)
    }
}

fn decompress_stored<B>(inp: &mut BitView, outp: &mut B) -> Result<(), DecompressError>
where
    B: OutputBuf,
{
    inp.skip_to_byte_boundary();

    let len = inp.read_bits::<u16>(16)?;
    let nlen = inp.read_bits::<u16>(16)?;
    trace!(len, nlen, "stored block");
    if len != !nlen {
        warn!(len, nlen, "stored block LEN/NLEN mismatch, ignoring NLEN");
    }

    outp.add_lits(inp.read_bytes(len as usize)?);
    Ok(())
}

fn read_dynamic_trees(
    inp: &mut BitView,
) -> Result<(HuffmanTree<u16>, HuffmanTree<u16>), DecompressError> {
    let hlit = inp.read_bits::<usize>(5)? + 257;
    let hdist = inp.read_bits::<usize>(5)? + 1;
    let hclen = inp.read_bits::<usize>(4)? + 4;
    trace!(hlit, hdist, hclen, "dynamic block header");

    let mut code_len_lens = [0u8; CODE_LEN_ALPHABET_SIZE];
    for &sym in &CODE_LEN_ORDER[..hclen] {
        code_len_lens[sym as usize] = inp.read_bits::<u8>(3)?;
    }
    let code_len_tree = HuffmanTree::<u8>::new(&code_len_lens)?;

    // one run of lengths covers both alphabets; repeats may cross between them
    let mut lens_buf = [0u8; MAX_LIT_SYMS + MAX_DIST_SYMS];
    let lens = &mut lens_buf[..hlit + hdist];
    let mut i = 0;
    while i < lens.len() {
        let code_len_sym = code_len_tree.decode_next(inp)?;
        let (len, rep) = match code_len_sym {
            0..=15 => (code_len_sym, 1),
            16 => {
                if i == 0 {
                    return Err(DecompressError::InvalidCodeLenRep);
                }
                (lens[i - 1], inp.read_bits::<usize>(2)? + 3)
            }
            17 => (0, inp.read_bits::<usize>(3)? + 3),
            18 => (0, inp.read_bits::<usize>(7)? + 11),
            _ => return Err(DecompressError::BadHuffSym),
        };

        if i + rep > lens.len() {
            return Err(DecompressError::InvalidCodeLenRep);
        }
        lens[i..i + rep].fill(len);
        i += rep;
    }

    let (lit_lens, dist_lens) = lens.split_at(hlit);
    Ok((HuffmanTree::new(lit_lens)?, HuffmanTree::new(dist_lens)?))
}

fn decompress_huffman<B>(
    inp: &mut BitView,
    outp: &mut B,
    lit_tree: &HuffmanTree<u16>,
    dist_tree: &HuffmanTree<u16>,
) -> Result<(), DecompressError>
where
    B: OutputBuf,
{
    while !outp.is_at_limit() {
        let litsym = lit_tree.decode_next(inp)? as usize;
        match litsym {
            0..=0xff => {
                outp.add_lit(litsym as u8);
            }
            256 => {
                break;
            }
            257..=285 => {
                let len_extra = inp.read_bits::<usize>(LEN_EXTRA_BITS[litsym - 257] as usize)?;
                let len = LEN_FOR_SYM[litsym - 257] as usize + len_extra;

                let distsym = dist_tree.decode_next(inp)? as usize;
                if distsym > 29 {
                    return Err(DecompressError::BadHuffSym);
                }
                let dist_extra = inp.read_bits::<usize>(DIST_EXTRA_BITS[distsym] as usize)?;
                let dist = DIST_FOR_SYM[distsym] as usize + dist_extra;

                outp.add_match(dist, len)?;
            }
            _ => return Err(DecompressError::BadHuffSym),
        }
    }

    Ok(())
}

#[derive(Copy, Clone, Default)]
pub struct DecompressBuffered {}

impl DecompressBuffered {
    pub fn new() -> Self {
        Self {}
    }

    fn decompress<B>(&self, inp: &[u8], outp: &mut B) -> Result<(), DecompressError>
    where
        B: OutputBuf,
    {
        self.decompress_with(inp, outp, &mut LazyFixedTables::default())
    }

    fn decompress_with<B>(
        &self,
        inp: &[u8],
        outp: &mut B,
        fixed: &mut LazyFixedTables,
    ) -> Result<(), DecompressError>
    where
        B: OutputBuf,
    {
        let mut inp = BitView::new(inp);

        loop {
            let bfinal = inp.read_bit()?;
            let btype = inp.read_bits::<u8>(2)?;
            debug!(bfinal, btype, "deflate block");

            match btype {
                0 => decompress_stored(&mut inp, outp)?,
                1 => {
                    let fixed = fixed.get();
                    decompress_huffman(&mut inp, outp, &fixed.lit, &fixed.dist)?;
                }
                2 => {
                    let (lit_tree, dist_tree) = read_dynamic_trees(&mut inp)?;
                    decompress_huffman(&mut inp, outp, &lit_tree, &dist_tree)?;
                }
                _ => return Err(DecompressError::InvalidBlockType),
            }

            if bfinal || outp.is_at_limit() {
                break;
            }
        }

        debug!(
            out_len = outp.cur_pos(),
            in_bits = inp.bit_pos(),
            "deflate stream done"
        );
        Ok(())
    }

    /// Decompresses into `outp`, stopping once it is full.
    /// Returns the number of bytes written.
    pub fn decompress_into(&self, inp: &[u8], outp: &mut [u8]) -> Result<usize, DecompressError> {
        let mut buf = PreallocatedBuf::from(outp);
        self.decompress(inp, &mut buf)?;
        Ok(buf.cur_pos())
    }

    /// Decompresses into a new vector holding at most `max_sz` bytes.
    pub fn decompress_new(&self, inp: &[u8], max_sz: usize) -> Result<Vec<u8>, DecompressError> {
        let mut buf = VecBuf::new(0, max_sz);
        self.decompress(inp, &mut buf)?;
        Ok(buf.into())
    }
}

/// Decompresses a raw DEFLATE stream (no zlib or gzip framing).
///
/// `predicted_size` only preallocates the output; it does not limit it.
pub fn decompress(data: &[u8], predicted_size: usize) -> Result<Vec<u8>, DecompressError> {
    let mut buf = VecBuf::new(predicted_size, usize::MAX);
    DecompressBuffered::new().decompress(data, &mut buf)?;
    Ok(buf.into())
}
