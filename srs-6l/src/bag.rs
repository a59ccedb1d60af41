//! The 7-bag randomiser and the player-visible game state.

use smallvec::SmallVec;

use crate::gameplay::{Board, Shape};
use crate::kicks::KickFn;

/// A 7-bag randomiser: each of the seven shapes is dealt exactly once per
/// bag, in a uniformly random permutation.
///
/// Deterministic from the seed, so a game can be replayed exactly.
#[derive(Clone, Debug)]
pub struct SevenBag {
    rng: fastrand::Rng,
    bag: [Shape; 7],
    /// Next position to deal from `bag`; 7 means the bag is exhausted.
    index: usize,
}

impl SevenBag {
    pub fn new(seed: u64) -> SevenBag {
        SevenBag {
            rng: fastrand::Rng::with_seed(seed),
            bag: Shape::ALL,
            index: 7,
        }
    }

    /// Deal the next shape, reshuffling when the bag empties.
    pub fn deal(&mut self) -> Shape {
        if self.index == 7 {
            self.bag = Shape::ALL;
            // Fisher-Yates
            for i in (1..7).rev() {
                let j = self.rng.usize(..=i);
                self.bag.swap(i, j);
            }
            self.index = 0;
        }

        let shape = self.bag[self.index];
        self.index += 1;
        shape
    }
}

impl Iterator for SevenBag {
    type Item = Shape;

    fn next(&mut self) -> Option<Shape> {
        Some(self.deal())
    }
}

/// The player-visible state: current piece, hold slot, preview queue, and
/// the bag the previews are drawn from.
///
/// The solver reads the state; [`advance`] and [`hold_swap`] exist so
/// playback and tests can drive a game forward.
///
/// [`advance`]: GameState::advance
/// [`hold_swap`]: GameState::hold_swap
#[derive(Clone, Debug)]
pub struct GameState {
    pub board: Board,
    pub current: Shape,
    pub hold: Option<Shape>,
    pub next: SmallVec<[Shape; 16]>,
    pub bag: SevenBag,
    pub kicks: KickFn,
}

impl GameState {
    /// Start a game from a seed, with `preview` pieces visible.
    pub fn new(seed: u64, preview: usize, kicks: KickFn) -> GameState {
        let mut bag = SevenBag::new(seed);
        let current = bag.deal();
        let next = (0..preview).map(|_| bag.deal()).collect();

        GameState {
            board: Board::empty(),
            current,
            hold: None,
            next,
            bag,
            kicks,
        }
    }

    /// Build a state from an explicit piece list `[current, next...]`.  The
    /// bag continues after the listed pieces; the hold slot starts empty.
    pub fn from_pieces(pieces: &[Shape], seed: u64, kicks: KickFn) -> GameState {
        assert!(!pieces.is_empty());

        GameState {
            board: Board::empty(),
            current: pieces[0],
            hold: None,
            next: pieces[1..].iter().copied().collect(),
            bag: SevenBag::new(seed),
            kicks,
        }
    }

    /// Consume the current piece and pull the next one, refilling the
    /// preview from the bag.
    pub fn advance(&mut self) {
        let refill = self.bag.deal();
        self.next.push(refill);
        self.current = self.next.remove(0);
    }

    /// Swap the current piece with the hold slot.  When the slot is empty,
    /// the current piece is stashed and the next piece becomes current.
    pub fn hold_swap(&mut self) {
        match self.hold.replace(self.current) {
            Some(held) => self.current = held,
            None => self.advance(),
        }
    }
}
