//! # Fixed width bit words
//!
//! Census words are stored as fixed width bit vectors built from 32 bit blocks. The width is
//! chosen once from the census window area, rounded up to the next multiple of 32 bits (at most
//! 256), and encoded in the type as the block count `N`. Two words can only be compared if they
//! share a width class, which the type system enforces.
//!
//! Hamming distances are computed with a two level population count: a 65,536 entry table holds
//! the number of set bits of every 16 bit pattern, and each 32 bit block is counted with one
//! lookup per half.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::OnceLock;

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Number of bits in one block of a word.
pub const BLOCK_BITS: usize = 32;

/// Widest supported word.
pub const MAX_BITS: usize = 256;

/// Block count of the widest supported word.
pub const MAX_BLOCKS: usize = MAX_BITS / BLOCK_BITS;

const LOOKUP_SIZE: usize = 1 << 16;

static WORD_BITS: OnceLock<Box<[u8]>> = OnceLock::new();

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// An immutable bit vector of `N` 32 bit blocks. Bit `i` lives in block `i / 32` at position
/// `i % 32`, counting from the least significant bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitWord<const N: usize> {
    blocks: [u32; N]
}

/// Factory for words of the width configured for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitWordCodec {
    bits: usize,
    class: WidthClass
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// The supported word widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WidthClass {
    W32 = 1,
    W64 = 2,
    W96 = 3,
    W128 = 4,
    W160 = 5,
    W192 = 6,
    W224 = 7,
    W256 = 8
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl WidthClass {
    /// Select the smallest class holding at least `bits` bits.
    pub fn for_bits(bits: usize) -> Result<Self> {
        let class = match (bits + BLOCK_BITS - 1) / BLOCK_BITS {
            0 | 1 => WidthClass::W32,
            2 => WidthClass::W64,
            3 => WidthClass::W96,
            4 => WidthClass::W128,
            5 => WidthClass::W160,
            6 => WidthClass::W192,
            7 => WidthClass::W224,
            8 => WidthClass::W256,
            _ => return Err(Error::UnsupportedWidth { bits })
        };

        Ok(class)
    }

    pub fn blocks(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> usize {
        self.blocks() * BLOCK_BITS
    }
}

impl BitWordCodec {
    /// Configure the codec for words of `bits` meaningful bits.
    pub fn configure_width(bits: usize) -> Result<Self> {
        let class = WidthClass::for_bits(bits)?;

        // Make sure the first comparison doesn't pay for building the table
        compute_word_bits_lookup();

        Ok(Self { bits, class })
    }

    /// Number of meaningful bits in each word.
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn class(&self) -> WidthClass {
        self.class
    }

    /// Number of blocks each word is made of.
    pub fn blocks(&self) -> usize {
        self.class.blocks()
    }

    /// Construct a word of the configured width from raw blocks.
    ///
    /// # Panics
    ///
    /// If `N` is not the configured block count, if `blocks` does not hold exactly `N` blocks, or
    /// (in debug builds) if any bit past the configured width is set.
    pub fn create<const N: usize>(&self, blocks: &[u32]) -> BitWord<N> {
        assert_eq!(N, self.blocks(), "word type does not match the configured width");
        assert_eq!(blocks.len(), N, "expected {} blocks, got {}", N, blocks.len());

        debug_assert!(
            self.padding_is_clear(blocks),
            "bits past the configured width of {} must be zero",
            self.bits
        );

        let mut arr = [0u32; N];
        arr.copy_from_slice(blocks);
        BitWord::from_blocks(arr)
    }

    fn padding_is_clear(&self, blocks: &[u32]) -> bool {
        blocks.iter().enumerate().all(|(j, &b)| {
            let used = self.bits.saturating_sub(j * BLOCK_BITS).min(BLOCK_BITS);
            let unused = match used {
                BLOCK_BITS => 0,
                _ => !0u32 << used
            };
            b & unused == 0
        })
    }
}

impl<const N: usize> BitWord<N> {
    /// Total width of the word in bits.
    pub const BITS: usize = N * BLOCK_BITS;

    pub fn zero() -> Self {
        Self { blocks: [0; N] }
    }

    pub fn from_blocks(blocks: [u32; N]) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[u32; N] {
        &self.blocks
    }

    pub fn bit(&self, i: usize) -> bool {
        self.blocks[i / BLOCK_BITS] >> (i % BLOCK_BITS) & 1 == 1
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        let lookup = compute_word_bits_lookup();
        self.blocks.iter().map(|&b| popcount32(lookup, b)).sum()
    }

    /// Number of bits that differ between `self` and `other`.
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        let lookup = compute_word_bits_lookup();

        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .map(|(&a, &b)| popcount32(lookup, a ^ b))
            .sum()
    }
}

impl<const N: usize> Default for BitWord<N> {
    fn default() -> Self {
        Self::zero()
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Get the 16 bit population count table, building it on first use.
pub fn compute_word_bits_lookup() -> &'static [u8] {
    WORD_BITS.get_or_init(|| {
        let mut table = vec![0u8; LOOKUP_SIZE];
        for i in 1..LOOKUP_SIZE {
            table[i] = table[i >> 1] + (i & 1) as u8;
        }
        table.into_boxed_slice()
    })
}

/// Count the set bits of a 32 bit block using two lookups.
#[inline]
pub fn popcount32(lookup: &[u8], v: u32) -> u32 {
    lookup[(v & 0xFFFF) as usize] as u32 + lookup[(v >> 16) as usize] as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_count_ones() {
        let lookup = compute_word_bits_lookup();
        assert_eq!(lookup.len(), LOOKUP_SIZE);
        for i in 0..LOOKUP_SIZE {
            assert_eq!(lookup[i] as u32, (i as u32).count_ones());
        }
    }

    #[test]
    fn popcount32_counts_both_halves() {
        let lookup = compute_word_bits_lookup();
        assert_eq!(popcount32(lookup, 0), 0);
        assert_eq!(popcount32(lookup, u32::MAX), 32);
        assert_eq!(popcount32(lookup, 0x8001_0001), 3);
        assert_eq!(popcount32(lookup, 0xDEAD_BEEF), 0xDEAD_BEEFu32.count_ones());
    }

    #[test]
    fn padding_check_accepts_clear_bits() {
        let codec = BitWordCodec::configure_width(9).unwrap();
        assert!(codec.padding_is_clear(&[0x1FF]));
        assert!(!codec.padding_is_clear(&[0x200]));

        let codec = BitWordCodec::configure_width(64).unwrap();
        assert!(codec.padding_is_clear(&[u32::MAX, u32::MAX]));
    }
}
