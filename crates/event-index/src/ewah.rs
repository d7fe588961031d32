//! The Enhanced Word-Aligned Hybrid (EWAH) bitstream encoding.
//!
//! The block image interleaves *marker* blocks and *dirty* blocks. A marker
//! encodes, from the most significant bit down: a 1-bit run type, a 32-bit
//! counter of clean blocks of that type following it, and a 31-bit counter
//! of dirty blocks following the clean run.
//!
//! Invariants:
//!
//!   1. The first block is a marker.
//!   2. The last block is always dirty, with zeroed bits above
//!      `size % 64`.
//!
//! A trailing block that fills up completely is *integrated* lazily at the
//! start of the next mutation: a clean block folds into an adjacent
//! marker's counter (or becomes a new marker), a mixed block bumps the
//! current marker's dirty counter. Deferring this keeps invariant 2 intact
//! between operations.

use crate::bitstream::{
    fill_value, split_whole_blocks, BitSequence, Bitstream, Encoding, SequenceKind,
};
use crate::bitvector::{low_mask, ALL_ONE, BLOCK_WIDTH, MSB_ONE};
use crate::IndexError;

/// The offset from the LSB which separates clean and dirty counters.
const CLEAN_DIRTY_DIVIDE: u32 = 31;

/// The mask extracting the dirty-block counter from a marker.
const MARKER_DIRTY_MASK: u64 = !(ALL_ONE << CLEAN_DIRTY_DIVIDE);

/// The maximum value of the dirty-block counter.
const MARKER_DIRTY_MAX: u64 = MARKER_DIRTY_MASK;

/// The mask extracting the clean-block counter from a marker.
const MARKER_CLEAN_MASK: u64 = !(MARKER_DIRTY_MASK | MSB_ONE);

/// The maximum value of the clean-block counter.
const MARKER_CLEAN_MAX: u64 = MARKER_CLEAN_MASK >> CLEAN_DIRTY_DIVIDE;

const fn marker_type(block: u64) -> bool {
    block & MSB_ONE == MSB_ONE
}

const fn marker_num_clean(block: u64) -> u64 {
    (block & MARKER_CLEAN_MASK) >> CLEAN_DIRTY_DIVIDE
}

const fn marker_num_dirty(block: u64) -> u64 {
    block & MARKER_DIRTY_MASK
}

const fn with_marker_type(block: u64, bit: bool) -> u64 {
    (block & !MSB_ONE) | if bit { MSB_ONE } else { 0 }
}

const fn with_marker_num_clean(block: u64, n: u64) -> u64 {
    (block & !MARKER_CLEAN_MASK) | (n << CLEAN_DIRTY_DIVIDE)
}

const fn with_marker_num_dirty(block: u64, n: u64) -> u64 {
    (block & !MARKER_DIRTY_MASK) | n
}

const fn marker(bit: bool, clean: u64, dirty: u64) -> u64 {
    with_marker_num_dirty(
        with_marker_num_clean(with_marker_type(0, bit), clean),
        dirty,
    )
}

/// An EWAH-compressed bitstream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EwahBitstream {
    blocks: Vec<u64>,
    num_bits: u64,
    /// Index of the most recent marker block.
    last_marker: usize,
}

impl EwahBitstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of physical blocks in the image.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The physical block at the given index.
    pub fn block(&self, i: usize) -> u64 {
        self.blocks[i]
    }

    /// Incorporate the most recent complete trailing block into the marker
    /// structure. No-op when the trailing block already is a marker.
    fn integrate_last_block(&mut self) {
        debug_assert!(self.num_bits % BLOCK_WIDTH == 0 && !self.blocks.is_empty());
        let last = self.blocks.len() - 1;
        if self.last_marker == last {
            return;
        }
        let block = self.blocks[last];
        if block == 0 || block == ALL_ONE {
            let bit = block == ALL_ONE;
            let m = self.blocks[self.last_marker];
            let adjacent = self.last_marker + 1 == last;
            if adjacent
                && marker_num_dirty(m) == 0
                && (marker_num_clean(m) == 0 || marker_type(m) == bit)
                && marker_num_clean(m) < MARKER_CLEAN_MAX
            {
                // Fold the clean block into the adjacent marker's run.
                let folded =
                    with_marker_type(with_marker_num_clean(m, marker_num_clean(m) + 1), bit);
                self.blocks[self.last_marker] = folded;
                self.blocks.pop();
            } else {
                // The clean block opens a run of its own.
                self.blocks[last] = marker(bit, 1, 0);
                self.last_marker = last;
            }
        } else {
            self.bump_dirty_count();
        }
    }

    /// Count the completed dirty block in the current marker, starting a
    /// fresh marker when the counter is saturated.
    fn bump_dirty_count(&mut self) {
        let m = self.blocks[self.last_marker];
        let dirty = marker_num_dirty(m);
        if dirty == MARKER_DIRTY_MAX {
            let last = self.blocks.len() - 1;
            self.blocks.insert(last, marker(false, 0, 1));
            self.last_marker = last;
        } else {
            self.blocks[self.last_marker] = with_marker_num_dirty(m, dirty + 1);
        }
    }

    /// Record `n` whole clean blocks of value `bit`, extending the trailing
    /// marker where possible and chaining new markers on saturation.
    fn append_clean(&mut self, mut n: u64, bit: bool) {
        let last = self.blocks.len() - 1;
        if self.last_marker == last {
            let m = self.blocks[last];
            debug_assert_eq!(marker_num_dirty(m), 0);
            if marker_num_clean(m) == 0 || marker_type(m) == bit {
                let room = MARKER_CLEAN_MAX - marker_num_clean(m);
                let add = n.min(room);
                if add > 0 {
                    let extended = with_marker_type(
                        with_marker_num_clean(m, marker_num_clean(m) + add),
                        bit,
                    );
                    self.blocks[last] = extended;
                    n -= add;
                }
            }
        }
        while n > 0 {
            let add = n.min(MARKER_CLEAN_MAX);
            self.blocks.push(marker(bit, add, 0));
            self.last_marker = self.blocks.len() - 1;
            n -= add;
        }
    }

    /// Ensure the stream is ready to receive bits at a block boundary:
    /// create the leading marker on first use, otherwise integrate the
    /// completed trailing block.
    fn prepare_boundary(&mut self) {
        if self.blocks.is_empty() {
            self.blocks.push(0);
            self.last_marker = 0;
        } else {
            self.integrate_last_block();
        }
    }
}

impl Bitstream for EwahBitstream {
    type Sequences<'a> = EwahSequences<'a>;

    const ENCODING: Encoding = Encoding::Ewah;

    fn sequences(&self) -> EwahSequences<'_> {
        EwahSequences {
            blocks: &self.blocks,
            num_bits: self.num_bits,
            index: 0,
            offset: 0,
            dirty_left: 0,
        }
    }

    fn size(&self) -> u64 {
        self.num_bits
    }

    fn blocks(&self) -> &[u64] {
        &self.blocks
    }

    fn from_image(size: u64, blocks: Vec<u64>) -> Result<Self, IndexError> {
        if blocks.is_empty() {
            return if size == 0 {
                Ok(Self::default())
            } else {
                Err(IndexError::CorruptImage)
            };
        }
        if blocks.len() < 2 || size == 0 {
            return Err(IndexError::CorruptImage);
        }
        // Recover the last marker by walking the marker chain; it must land
        // exactly on the trailing dirty block.
        let last = blocks.len() - 1;
        let mut index = 0;
        let mut last_marker = 0;
        while index < last {
            last_marker = index;
            let skip = marker_num_dirty(blocks[index]) as usize;
            index = index
                .checked_add(1 + skip)
                .ok_or(IndexError::CorruptImage)?;
        }
        if index != last {
            return Err(IndexError::CorruptImage);
        }
        let stream = Self {
            blocks,
            num_bits: size,
            last_marker,
        };
        Ok(stream)
    }

    fn append(&mut self, n: u64, bit: bool) -> bool {
        if n == 0 {
            return true;
        }
        if self.num_bits.checked_add(n).is_none() {
            return false;
        }
        let mut n = n;
        if self.blocks.is_empty() {
            self.blocks.push(0);
            self.last_marker = 0;
        } else {
            let partial = (self.num_bits % BLOCK_WIDTH) as u32;
            if partial != 0 {
                let fill = n.min(BLOCK_WIDTH - partial as u64);
                if bit {
                    let mask = low_mask(fill as u32) << partial;
                    *self.blocks.last_mut().expect("trailing block exists") |= mask;
                }
                self.num_bits += fill;
                n -= fill;
                if n == 0 {
                    return true;
                }
                self.integrate_last_block();
            } else {
                self.integrate_last_block();
            }
        }
        let (whole, rest) = split_whole_blocks(n);
        if whole > 0 {
            self.append_clean(whole, bit);
        }
        self.blocks.push(fill_value(bit) & low_mask(rest));
        self.num_bits += n;
        true
    }

    fn append_block(&mut self, block: u64, nbits: u32) -> bool {
        debug_assert!(nbits as u64 <= BLOCK_WIDTH);
        if nbits == 0 {
            return true;
        }
        if self.num_bits.checked_add(nbits as u64).is_none() {
            return false;
        }
        let mut block = block & low_mask(nbits);
        let mut nbits = nbits;
        if self.blocks.is_empty() {
            self.blocks.push(0);
            self.last_marker = 0;
        } else {
            let partial = (self.num_bits % BLOCK_WIDTH) as u32;
            if partial != 0 {
                let fill = nbits.min(64 - partial);
                *self.blocks.last_mut().expect("trailing block exists") |=
                    (block & low_mask(fill)) << partial;
                self.num_bits += fill as u64;
                block = if fill == 64 { 0 } else { block >> fill };
                nbits -= fill;
                if nbits == 0 {
                    return true;
                }
                self.integrate_last_block();
            } else {
                self.integrate_last_block();
            }
        }
        self.blocks.push(block);
        self.num_bits += nbits as u64;
        true
    }

    fn push_back(&mut self, bit: bool) -> bool {
        if self.num_bits == u64::MAX {
            return false;
        }
        let partial = self.num_bits % BLOCK_WIDTH;
        if self.num_bits == 0 || partial == 0 {
            self.prepare_boundary();
            self.blocks.push(if bit { 1 } else { 0 });
        } else if bit {
            *self.blocks.last_mut().expect("trailing block exists") |= 1 << partial;
        }
        self.num_bits += 1;
        true
    }

    fn trim(&mut self) {
        match self.find_last() {
            None => self.clear(),
            Some(last) if last + 1 == self.num_bits => {}
            Some(last) => {
                // Rebuild up to and including the last set bit; the result
                // is the canonical encoding of the shortened stream.
                let target = last + 1;
                let mut trimmed = Self::default();
                for seq in self.sequences() {
                    if seq.offset >= target {
                        break;
                    }
                    let take = (target - seq.offset).min(seq.length);
                    match seq.kind {
                        SequenceKind::Fill => {
                            trimmed.append(take, seq.fill_bit());
                        }
                        SequenceKind::Literal => {
                            trimmed.append_block(seq.data & low_mask(take as u32), take as u32);
                        }
                    }
                }
                *self = trimmed;
            }
        }
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.num_bits = 0;
        self.last_marker = 0;
    }

    fn flip(&mut self) {
        let len = self.blocks.len();
        let mut index = 0;
        while index < len {
            if index == len - 1 {
                // Trailing dirty block: complement within the logical size.
                let partial = (self.num_bits % BLOCK_WIDTH) as u32;
                let mask = if partial == 0 {
                    ALL_ONE
                } else {
                    low_mask(partial)
                };
                self.blocks[index] = !self.blocks[index] & mask;
                break;
            }
            let m = self.blocks[index];
            let dirty = marker_num_dirty(m) as usize;
            if marker_num_clean(m) > 0 {
                self.blocks[index] = m ^ MSB_ONE;
            }
            for block in &mut self.blocks[index + 1..index + 1 + dirty] {
                *block = !*block;
            }
            index += 1 + dirty;
        }
    }
}

/// Sequence iteration over an EWAH stream. Clean runs of the same type from
/// consecutive markers coalesce into a single fill; counted dirty blocks and
/// the trailing uncounted block come out as literals.
pub struct EwahSequences<'a> {
    blocks: &'a [u64],
    num_bits: u64,
    index: usize,
    offset: u64,
    dirty_left: u64,
}

impl Iterator for EwahSequences<'_> {
    type Item = BitSequence;

    fn next(&mut self) -> Option<BitSequence> {
        loop {
            if self.index >= self.blocks.len() {
                return None;
            }
            if self.dirty_left > 0 {
                self.dirty_left -= 1;
                let length = BLOCK_WIDTH.min(self.num_bits - self.offset);
                let seq = BitSequence {
                    kind: SequenceKind::Literal,
                    offset: self.offset,
                    data: self.blocks[self.index],
                    length,
                };
                self.index += 1;
                self.offset += length;
                return Some(seq);
            }
            let last = self.blocks.len() - 1;
            if self.index == last {
                // Trailing dirty block, not yet counted by any marker.
                let length = self.num_bits - self.offset;
                let data = self.blocks[self.index];
                self.index += 1;
                if length == 0 {
                    return None;
                }
                let seq = BitSequence {
                    kind: SequenceKind::Literal,
                    offset: self.offset,
                    data,
                    length,
                };
                self.offset += length;
                return Some(seq);
            }
            let m = self.blocks[self.index];
            self.index += 1;
            self.dirty_left = marker_num_dirty(m);
            let clean = marker_num_clean(m);
            if clean == 0 {
                continue;
            }
            let bit = marker_type(m);
            let mut length = clean * BLOCK_WIDTH;
            // Merge clean runs of the same type from subsequent markers.
            while self.dirty_left == 0 && self.index < last {
                let next = self.blocks[self.index];
                let next_clean = marker_num_clean(next);
                if next_clean > 0 && marker_type(next) != bit {
                    break;
                }
                self.index += 1;
                self.dirty_left = marker_num_dirty(next);
                length += next_clean * BLOCK_WIDTH;
            }
            let seq = BitSequence {
                kind: SequenceKind::Fill,
                offset: self.offset,
                data: fill_value(bit),
                length,
            };
            self.offset += length;
            return Some(seq);
        }
    }
}
