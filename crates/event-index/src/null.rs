//! The uncompressed bitstream encoding.
//!
//! Forwards all operations to an underlying [`Bitvector`] 1:1. Sequence
//! iteration synthesizes fills from runs of clean blocks so the generic
//! bitwise machinery can skip them.

use crate::bitstream::{BitSequence, Bitstream, Encoding, SequenceKind};
use crate::bitvector::{Bitvector, ALL_ONE, BLOCK_WIDTH};
use crate::IndexError;

/// An uncompressed bitstream over a flat bitvector.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NullBitstream {
    bits: Bitvector,
}

impl NullBitstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying bitvector.
    pub fn bits(&self) -> &Bitvector {
        &self.bits
    }
}

impl From<Bitvector> for NullBitstream {
    fn from(bits: Bitvector) -> Self {
        Self { bits }
    }
}

impl Bitstream for NullBitstream {
    type Sequences<'a> = NullSequences<'a>;

    const ENCODING: Encoding = Encoding::Null;

    fn sequences(&self) -> NullSequences<'_> {
        NullSequences {
            bits: &self.bits,
            offset: 0,
        }
    }

    fn size(&self) -> u64 {
        self.bits.size()
    }

    fn blocks(&self) -> &[u64] {
        self.bits.blocks()
    }

    fn from_image(size: u64, blocks: Vec<u64>) -> Result<Self, IndexError> {
        Bitvector::from_raw(blocks, size)
            .map(|bits| Self { bits })
            .ok_or(IndexError::CorruptImage)
    }

    fn append(&mut self, n: u64, bit: bool) -> bool {
        if n == 0 {
            return true;
        }
        if self.bits.size().checked_add(n).is_none() {
            return false;
        }
        self.bits.append(n, bit);
        true
    }

    fn append_block(&mut self, block: u64, nbits: u32) -> bool {
        if nbits == 0 {
            return true;
        }
        if self.bits.size().checked_add(nbits as u64).is_none() {
            return false;
        }
        self.bits.append_block(block, nbits);
        true
    }

    fn push_back(&mut self, bit: bool) -> bool {
        if self.bits.size() == u64::MAX {
            return false;
        }
        self.bits.push(bit);
        true
    }

    fn trim(&mut self) {
        match self.bits.find_last() {
            Some(last) => self.bits.truncate(last + 1),
            None => self.bits.clear(),
        }
    }

    fn clear(&mut self) {
        self.bits.clear();
    }

    fn flip(&mut self) {
        self.bits.flip();
    }

    // Direct bitvector access beats walking sequences for these.

    fn count(&self) -> u64 {
        self.bits.count()
    }

    fn get(&self, i: u64) -> bool {
        self.bits.get(i)
    }

    fn find_first(&self) -> Option<u64> {
        self.bits.find_first()
    }

    fn find_next(&self, i: u64) -> Option<u64> {
        self.bits.find_next(i)
    }

    fn find_last(&self) -> Option<u64> {
        self.bits.find_last()
    }

    fn find_prev(&self, i: u64) -> Option<u64> {
        self.bits.find_prev(i)
    }
}

/// Sequence iteration over an uncompressed stream: consecutive clean blocks
/// coalesce into fills, mixed blocks come out as literals.
pub struct NullSequences<'a> {
    bits: &'a Bitvector,
    offset: u64,
}

impl Iterator for NullSequences<'_> {
    type Item = BitSequence;

    fn next(&mut self) -> Option<BitSequence> {
        let size = self.bits.size();
        if self.offset >= size {
            return None;
        }
        let index = (self.offset / BLOCK_WIDTH) as usize;
        let remaining = size - self.offset;
        if remaining < BLOCK_WIDTH {
            // Trailing partial block is always a literal.
            let seq = BitSequence {
                kind: SequenceKind::Literal,
                offset: self.offset,
                data: self.bits.block(index),
                length: remaining,
            };
            self.offset = size;
            return Some(seq);
        }
        let block = self.bits.block(index);
        if block == 0 || block == ALL_ONE {
            // Extend the fill over subsequent whole clean blocks.
            let mut length = BLOCK_WIDTH;
            let mut next = index + 1;
            while (next as u64 + 1) * BLOCK_WIDTH <= size && self.bits.block(next) == block {
                length += BLOCK_WIDTH;
                next += 1;
            }
            let seq = BitSequence {
                kind: SequenceKind::Fill,
                offset: self.offset,
                data: block,
                length,
            };
            self.offset += length;
            Some(seq)
        } else {
            let seq = BitSequence {
                kind: SequenceKind::Literal,
                offset: self.offset,
                data: block,
                length: BLOCK_WIDTH,
            };
            self.offset += BLOCK_WIDTH;
            Some(seq)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut x = NullBitstream::new();
        assert!(x.append(3, true));
        assert!(x.append(7, false));
        assert!(x.push_back(true));
        assert_eq!(x.size(), 11);
        assert_eq!(x.count(), 4);
        assert!(x.get(0));
        assert!(!x.get(3));
        assert!(x.get(10));
        assert_eq!(x.back(), Some(true));
    }

    #[test]
    fn test_append_zero_bits_is_noop() {
        let mut x = NullBitstream::new();
        assert!(x.append(0, true));
        assert!(x.append_block(0xff, 0));
        assert!(x.is_empty());
    }

    #[test]
    fn test_trim() {
        let mut z = NullBitstream::new();
        z.push_back(false);
        z.push_back(true);
        z.append(1337, false);
        z.trim();
        assert_eq!(z.size(), 2);
        assert_eq!(z.count(), 1);

        let mut all_zero = NullBitstream::filled(512, false);
        all_zero.trim();
        assert_eq!(all_zero.size(), 0);
    }

    #[test]
    fn test_sequence_iteration() {
        let mut nbs = NullBitstream::new();
        nbs.push_back(true);
        nbs.push_back(false);
        nbs.append(62, true);
        nbs.append(320, false);
        nbs.append(512, true);

        let mut seqs = nbs.sequences();

        let first = seqs.next().unwrap();
        assert_eq!(first.offset, 0);
        assert!(first.is_literal());
        assert_eq!(first.data, ALL_ONE & !2);

        let second = seqs.next().unwrap();
        assert_eq!(second.offset, 64);
        assert!(second.is_fill());
        assert_eq!(second.data, 0);
        assert_eq!(second.length, 320);

        let third = seqs.next().unwrap();
        assert_eq!(third.offset, 64 + 320);
        assert!(third.is_fill());
        assert_eq!(third.data, ALL_ONE);
        assert_eq!(third.length, 512);

        assert!(seqs.next().is_none());
    }

    #[test]
    fn test_count_via_fills() {
        let mut nbs = NullBitstream::new();
        nbs.push_back(true);
        nbs.push_back(false);
        nbs.append(62, true);
        nbs.append(320, false);
        nbs.append(512, true);
        nbs.append(47, false);
        assert_eq!(nbs.count(), 575);
    }

    #[test]
    fn test_ones_iteration() {
        let mut bs = NullBitstream::new();
        bs.push_back(true);
        bs.append(10, false);
        bs.append(2, true);

        let ones: Vec<u64> = bs.ones().collect();
        assert_eq!(ones, vec![0, 11, 12]);
    }

    #[test]
    fn test_find() {
        let mut bs = NullBitstream::new();
        bs.append(100, false);
        bs.append(2, true);
        bs.append(100, false);
        assert_eq!(bs.find_first(), Some(100));
        assert_eq!(bs.find_next(100), Some(101));
        assert_eq!(bs.find_next(101), None);
        assert_eq!(bs.find_last(), Some(101));
        assert_eq!(bs.find_prev(101), Some(100));
        assert_eq!(bs.find_prev(100), None);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut bs = NullBitstream::new();
        bs.append(3, true);
        bs.append(130, false);
        bs.push_back(true);

        let mut image = Vec::new();
        bs.write_to(&mut image).unwrap();
        assert_eq!(image[0], 0);

        let restored = NullBitstream::read_from(&mut image.as_slice()).unwrap();
        assert_eq!(restored, bs);
    }
}
