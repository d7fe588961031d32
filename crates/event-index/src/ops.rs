//! Block-wise bitwise operations over bitstreams.
//!
//! The algorithm walks two sequence ranges in lockstep, consuming the
//! lesser of their remaining lengths at each step and applying the
//! operation block-wise. Fills combine in O(1) per run. After one side
//! runs out, the surviving tail is appended or dropped according to the
//! per-operation policy, and every result is zero-padded to the longer
//! operand so complements of the result remain well-defined.

use crate::bitstream::{BitSequence, Bitstream};
use crate::bitvector::BLOCK_WIDTH;
use crate::{EwahBitstream, NullBitstream};

/// Apply a block-wise operation to two bitstreams.
///
/// `fill_lhs` and `fill_rhs` control whether the remaining tail of the
/// respective operand is appended to the result once the other side is
/// exhausted.
pub fn apply<B: Bitstream>(
    lhs: &B,
    rhs: &B,
    fill_lhs: bool,
    fill_rhs: bool,
    op: impl Fn(u64, u64) -> u64,
) -> B {
    let mut rx = lhs.sequences();
    let mut ry = rhs.sequences();
    let (mut sx, mut sy) = match (rx.next(), ry.next()) {
        (None, None) => return B::default(),
        (None, Some(_)) => return rhs.clone(),
        (Some(_), None) => return lhs.clone(),
        (Some(sx), Some(sy)) => (sx, sy),
    };

    let mut result = B::default();
    let mut lx = sx.length;
    let mut ly = sy.length;
    loop {
        let min = lx.min(ly);
        let block = op(sx.data, sy.data);
        if sx.is_fill() && sy.is_fill() {
            result.append(min, block != 0);
            lx -= min;
            ly -= min;
        } else if sx.is_fill() {
            result.append_block(block, BLOCK_WIDTH as u32);
            lx -= BLOCK_WIDTH;
            ly = 0;
        } else if sy.is_fill() {
            result.append_block(block, BLOCK_WIDTH as u32);
            ly -= BLOCK_WIDTH;
            lx = 0;
        } else {
            result.append_block(block, lx.max(ly) as u32);
            lx = 0;
            ly = 0;
        }
        if lx == 0 {
            match rx.next() {
                Some(seq) => {
                    sx = seq;
                    lx = seq.length;
                }
                None => break,
            }
        }
        if ly == 0 {
            match ry.next() {
                Some(seq) => {
                    sy = seq;
                    ly = seq.length;
                }
                None => break,
            }
        }
    }

    if fill_lhs {
        drain_tail(&mut result, sx, lx, rx);
    }
    if fill_rhs {
        drain_tail(&mut result, sy, ly, ry);
    }

    let max_size = lhs.size().max(rhs.size());
    if result.size() < max_size {
        result.append(max_size - result.size(), false);
    }
    result
}

/// Append what remains of one operand after the other ran out.
fn drain_tail<B: Bitstream>(
    result: &mut B,
    mut seq: BitSequence,
    mut remaining: u64,
    mut seqs: impl Iterator<Item = BitSequence>,
) {
    loop {
        if remaining > 0 {
            if seq.is_fill() {
                result.append(remaining, seq.fill_bit());
            } else {
                result.append_block(seq.data, remaining as u32);
            }
        }
        match seqs.next() {
            Some(next) => {
                seq = next;
                remaining = seq.length;
            }
            None => break,
        }
    }
}

/// Bitwise AND; both tails are dropped.
pub fn and<B: Bitstream>(lhs: &B, rhs: &B) -> B {
    apply(lhs, rhs, false, false, |x, y| x & y)
}

/// Bitwise OR; both tails are appended.
pub fn or<B: Bitstream>(lhs: &B, rhs: &B) -> B {
    apply(lhs, rhs, true, true, |x, y| x | y)
}

/// Bitwise XOR; both tails are appended.
pub fn xor<B: Bitstream>(lhs: &B, rhs: &B) -> B {
    apply(lhs, rhs, true, true, |x, y| x ^ y)
}

/// Bitwise subtraction (`lhs & !rhs`); only the left tail is appended.
pub fn nand<B: Bitstream>(lhs: &B, rhs: &B) -> B {
    apply(lhs, rhs, true, false, |x, y| x & !y)
}

/// Bitwise NOR-style union with the complement; both tails are appended.
pub fn nor<B: Bitstream>(lhs: &B, rhs: &B) -> B {
    apply(lhs, rhs, true, true, |x, y| x | !y)
}

/// The complement of a stream.
pub fn not<B: Bitstream>(stream: &B) -> B {
    let mut flipped = stream.clone();
    flipped.flip();
    flipped
}

macro_rules! impl_bitwise_operators {
    ($stream:ty) => {
        impl std::ops::BitAnd for &$stream {
            type Output = $stream;

            fn bitand(self, rhs: Self) -> $stream {
                and(self, rhs)
            }
        }

        impl std::ops::BitOr for &$stream {
            type Output = $stream;

            fn bitor(self, rhs: Self) -> $stream {
                or(self, rhs)
            }
        }

        impl std::ops::BitXor for &$stream {
            type Output = $stream;

            fn bitxor(self, rhs: Self) -> $stream {
                xor(self, rhs)
            }
        }

        impl std::ops::Sub for &$stream {
            type Output = $stream;

            fn sub(self, rhs: Self) -> $stream {
                nand(self, rhs)
            }
        }

        impl std::ops::Not for &$stream {
            type Output = $stream;

            fn not(self) -> $stream {
                not(self)
            }
        }

        impl std::ops::BitAndAssign<&$stream> for $stream {
            fn bitand_assign(&mut self, rhs: &$stream) {
                *self = and(self, rhs);
            }
        }

        impl std::ops::BitOrAssign<&$stream> for $stream {
            fn bitor_assign(&mut self, rhs: &$stream) {
                *self = or(self, rhs);
            }
        }

        impl std::ops::BitXorAssign<&$stream> for $stream {
            fn bitxor_assign(&mut self, rhs: &$stream) {
                *self = xor(self, rhs);
            }
        }

        impl std::ops::SubAssign<&$stream> for $stream {
            fn sub_assign(&mut self, rhs: &$stream) {
                *self = nand(self, rhs);
            }
        }
    };
}

impl_bitwise_operators!(NullBitstream);
impl_bitwise_operators!(EwahBitstream);
