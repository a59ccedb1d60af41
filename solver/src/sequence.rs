//! Canonical enumeration of the piece sequences a 7-bag randomiser can deal.

use bitvec::prelude::{bitvec, BitVec};
use smallvec::SmallVec;

use srs_6l::bag::{GameState, SevenBag};
use srs_6l::gameplay::{Board, Shape};
use srs_6l::kicks::KickFn;

/// A sequence of up to 16 shapes packed three bits apiece into a `u64`.
///
/// The low-order field is the piece in the hold slot, then the current
/// piece, then the preview.  Unused fields hold the all-ones sentinel, so a
/// short sequence terminates itself.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Sequence(pub u64);

/// All-ones: no shape, end of sequence.
pub const SENTINEL: u64 = 0b111;

impl Sequence {
    pub fn from_shapes(shapes: &[Shape]) -> Sequence {
        assert!(shapes.len() <= 16);

        let mut bits = (1 << 48) - 1;
        for (i, &shape) in shapes.iter().enumerate() {
            bits &= !(SENTINEL << (3 * i));
            bits |= (shape as u64) << (3 * i);
        }

        Sequence(bits)
    }

    /// The shape in the given slot, if the sequence extends that far.
    pub fn get(self, index: usize) -> Option<Shape> {
        if index >= 16 {
            return None;
        }
        Shape::try_from((self.0 >> (3 * index) & SENTINEL) as u8)
    }

    /// Number of shapes before the sentinel.
    pub fn len(self) -> usize {
        (0..16).take_while(|&i| self.get(i).is_some()).count()
    }

    pub fn is_empty(self) -> bool {
        self.get(0).is_none()
    }

    pub fn shapes(self) -> impl Iterator<Item = Shape> {
        (0..16).map_while(move |i| self.get(i))
    }

    /// The game this sequence deals: the first shape waits in the hold slot,
    /// the second spawns as the current piece, and the rest fill the
    /// preview.  Requires at least two shapes.
    pub fn game(self, kicks: KickFn) -> GameState {
        let mut shapes = self.shapes();
        let hold = shapes.next();
        let current = shapes.next();
        assert!(current.is_some(), "sequence too short for a game");

        GameState {
            board: Board::empty(),
            current: current.unwrap(),
            hold,
            next: shapes.collect(),
            bag: SevenBag::new(0),
            kicks,
        }
    }
}

/// Enumerates every sequence of `len` pieces that a 7-bag randomiser can
/// present to a player, exactly once up to hold commutativity.
///
/// The first slot is the piece sitting in the hold slot.  It was saved from
/// some earlier bag, so it ranges over all seven shapes freely.  The
/// remaining slots must decompose into the tail of one shuffled bag, zero or
/// more complete bags, and the head of a final bag.  Since the first two
/// slots can always be interchanged by holding immediately, sequences are
/// deduplicated by their canonical form, which orders the second slot's
/// shape no higher than the first's.
///
/// Enumeration runs in batches: an outer base-7 counter fixes the trailing
/// `len - unlocked` slots, and all sequences with that tail are generated
/// against a seen-set of `7^unlocked` bits.  Canonicalisation only touches
/// the first two slots, so two duplicates always share a tail and the
/// per-tail seen-set deduplicates globally.  `unlocked` trades memory for
/// batch size and must be at least 2.
pub struct SequenceIterator {
    len: usize,
    unlocked: usize,
    /// Fixed shapes of the locked tail slots, little end first.
    lock: SmallVec<[u8; 16]>,
    exhausted: bool,
    seen: BitVec,
    scratch: SmallVec<[u8; 16]>,
    /// Sequences of the current batch, drained from the back.
    buffer: Vec<Sequence>,
}

impl SequenceIterator {
    pub fn new(len: usize, unlocked: usize) -> SequenceIterator {
        assert!((2..=16).contains(&len));
        let unlocked = unlocked.min(len);
        assert!(unlocked >= 2, "canonicalisation needs two unlocked slots");

        SequenceIterator {
            len,
            unlocked,
            lock: SmallVec::from_elem(0, len - unlocked),
            exhausted: false,
            seen: bitvec![0; 7usize.pow(unlocked as u32)],
            scratch: SmallVec::from_elem(0, len),
            buffer: Vec::new(),
        }
    }

    pub fn done(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Generate every sequence with the current locked tail, then advance
    /// the tail counter.
    fn refill(&mut self) {
        while self.buffer.is_empty() && !self.exhausted {
            self.seen.fill(false);

            // One partition per leading-bag size: the remainder after the
            // first partial bag splits uniquely into full bags plus a head.
            let bag_slots = self.len - 1;
            for first_bag in 1..=bag_slots.min(7) {
                self.fill_slot(0, first_bag, 0);
            }

            // base-7 increment
            self.exhausted = true;
            for digit in &mut self.lock {
                if *digit < 6 {
                    *digit += 1;
                    self.exhausted = false;
                    break;
                }
                *digit = 0;
            }
            if self.lock.is_empty() {
                self.exhausted = true;
            }
        }

        // The batch was generated forward; popping from the back should
        // yield it in the same order.
        self.buffer.reverse();
    }

    /// Place every allowed shape in `slot` and recurse.  `seg_left` counts
    /// the slots remaining in the current bag segment; `used` is the mask of
    /// shapes already dealt from it.
    fn fill_slot(&mut self, slot: usize, mut seg_left: usize, mut used: u8) {
        if slot == self.len {
            self.record();
            return;
        }

        if slot > 0 && seg_left == 0 {
            // A fresh bag: either a full seven or whatever tail remains.
            seg_left = (self.len - slot).min(7);
            used = 0;
        }

        if slot >= self.unlocked {
            let shape = self.lock[slot - self.unlocked];
            if used & (1 << shape) == 0 {
                self.scratch[slot] = shape;
                self.fill_slot(slot + 1, seg_left - 1, used | (1 << shape));
            }
            return;
        }

        if slot == 0 {
            // The hold slot is outside the bag structure entirely.
            for shape in 0..7 {
                self.scratch[0] = shape;
                self.fill_slot(1, seg_left, used);
            }
            return;
        }

        for shape in 0..7 {
            if used & (1 << shape) == 0 {
                self.scratch[slot] = shape;
                self.fill_slot(slot + 1, seg_left - 1, used | (1 << shape));
            }
        }
    }

    /// Canonicalise the scratch sequence and emit it if unseen.
    fn record(&mut self) {
        let mut head: SmallVec<[u8; 16]> = self.scratch[..self.unlocked].into();
        if head[1] > head[0] {
            head.swap(0, 1);
        }

        let index = head
            .iter()
            .rev()
            .fold(0usize, |acc, &shape| acc * 7 + shape as usize);
        if self.seen[index] {
            return;
        }
        self.seen.set(index, true);

        let shapes: SmallVec<[Shape; 16]> = head
            .iter()
            .chain(self.lock.iter())
            .map(|&n| Shape::try_from(n).unwrap())
            .collect();
        self.buffer.push(Sequence::from_shapes(&shapes));
    }
}

impl Iterator for SequenceIterator {
    type Item = Sequence;

    fn next(&mut self) -> Option<Sequence> {
        if self.buffer.is_empty() {
            self.refill();
        }
        self.buffer.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use Shape::*;

    #[test]
    fn sequences_pack_and_unpack() {
        let seq = Sequence::from_shapes(&[T, I, Z]);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.get(0), Some(T));
        assert_eq!(seq.get(2), Some(Z));
        assert_eq!(seq.get(3), None);
        assert_eq!(seq.shapes().collect::<Vec<_>>(), vec![T, I, Z]);

        // Sixteen shapes fill the packed space completely.
        let full = Sequence::from_shapes(&[O; 16]);
        assert_eq!(full.len(), 16);
    }

    /// Counts verified against a brute-force enumeration of all 7-bag deals
    /// with a free hold slot, deduplicated by head swap.
    #[test]
    fn canonical_counts_are_exact() {
        let expected = [(2, 28), (3, 196), (4, 1365), (5, 9198), (6, 57750)];

        for (len, count) in expected {
            for unlocked in 2..=len {
                let got = SequenceIterator::new(len, unlocked).count();
                assert_eq!(got, count, "len {} unlocked {}", len, unlocked);
            }
        }
    }

    #[test]
    fn no_duplicates_and_all_canonical() {
        let mut seen = HashSet::new();

        for seq in SequenceIterator::new(5, 3) {
            assert!(seen.insert(seq.0), "duplicate {:?}", seq);
            let a = seq.get(0).unwrap() as u8;
            let b = seq.get(1).unwrap() as u8;
            assert!(b <= a, "not canonical: {:?}", seq);
        }
    }

    #[test]
    fn batching_does_not_change_the_set() {
        let all: HashSet<u64> = SequenceIterator::new(5, 5).map(|s| s.0).collect();
        let batched: HashSet<u64> = SequenceIterator::new(5, 2).map(|s| s.0).collect();
        assert_eq!(all, batched);
    }

    /// The full production length: 79,516,080 canonical sequences of 11
    /// pieces.  Slow; run with `cargo test -- --ignored` when touching the
    /// enumeration.
    #[test]
    #[ignore]
    fn production_length_count() {
        let count = SequenceIterator::new(11, 6).count();
        assert_eq!(count, 79_516_080);
    }
}
