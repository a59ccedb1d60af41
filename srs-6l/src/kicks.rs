//! Kick tables for the supported rotation systems.
//!
//! A kick function maps a piece and a rotation to the ordered list of
//! `(column, row)` offsets to try; the first offset where the rotated piece
//! fits wins.  An empty list means the rotation does not exist in that
//! system (SRS has no half rotation, for example).
//!
//! The coordinate system here measures pieces from the bottom left of their
//! bounding box, so the kick data differs from the usual published tables:
//! the *first* checked position is shifted by the difference between the two
//! orientations' bounding corners --- equivalent to the usual rotation ---
//! and the other kicks are shifted by the same amount.
//!
//! Only clockwise kick data is written out.  Counter-clockwise kicks are
//! exact mirrors of clockwise kicks, derived at compile time by indexing the
//! clockwise table with the *final* orientation and negating each offset.

use crate::gameplay::{Piece, Shape};

/// A rotation input, distinct from [`Orientation`]: it names the change, not
/// the state.
///
/// [`Orientation`]: crate::gameplay::Orientation
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Rotation {
    Clockwise,
    Half,
    CounterClockwise,
}

/// The closed set of kick strategies, dispatched as plain function pointers.
pub type KickFn = fn(Piece, Rotation) -> &'static [(i8, i8)];

/// No kick table: quarter rotations succeed only in the basic rotated
/// position; half rotations do not exist.
pub fn kicks_none(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => &[],
        _ => &quarter_table(piece.shape, false)[direction(piece, rotation)][..1],
    }
}

/// Like [`kicks_none`], but half rotations succeed in the basic position.
pub fn kicks_none180(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => half_table(piece.shape, HalfKicks::Plain)[piece.orientation as usize],
        _ => &quarter_table(piece.shape, false)[direction(piece, rotation)][..1],
    }
}

/// Super Rotation System: five-offset quarter kicks, no half rotation.
pub fn kicks_srs(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => &[],
        _ => &quarter_table(piece.shape, false)[direction(piece, rotation)][..],
    }
}

/// SRS quarter kicks plus the two-offset half-rotation kicks.
pub fn kicks_srs180(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => half_table(piece.shape, HalfKicks::Two)[piece.orientation as usize],
        _ => &quarter_table(piece.shape, false)[direction(piece, rotation)][..],
    }
}

/// SRS+ quarter kicks (symmetric I kicks) plus plain half rotations.
pub fn kicks_srs_plus(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => half_table(piece.shape, HalfKicks::Plain)[piece.orientation as usize],
        _ => &quarter_table(piece.shape, true)[direction(piece, rotation)][..],
    }
}

/// SRS+ quarter kicks plus the six-offset half-rotation kicks.
pub fn kicks_srs_tetrio(piece: Piece, rotation: Rotation) -> &'static [(i8, i8)] {
    match rotation {
        Rotation::Half => half_table(piece.shape, HalfKicks::Six)[piece.orientation as usize],
        _ => &quarter_table(piece.shape, true)[direction(piece, rotation)][..],
    }
}

/// Row index into a quarter-kick table: clockwise tables are indexed by the
/// starting orientation, counter-clockwise tables by rotating the convention
/// into the derived table (see [`derive_ccw`]).
fn direction(piece: Piece, rotation: Rotation) -> usize {
    debug_assert!(!matches!(rotation, Rotation::Half));
    piece.orientation as usize
        + match rotation {
            Rotation::CounterClockwise => 4,
            _ => 0,
        }
}

/// The combined clockwise + counter-clockwise table for a shape: rows 0..4
/// are clockwise kicks by starting orientation, rows 4..8 counter-clockwise.
fn quarter_table(shape: Shape, plus: bool) -> &'static [[(i8, i8); 5]; 8] {
    match shape {
        Shape::I if plus => &I_PLUS_QUARTER,
        Shape::I => &I_QUARTER,
        Shape::O => &O_QUARTER,
        _ => &JLSTZ_QUARTER,
    }
}

enum HalfKicks {
    Plain,
    Two,
    Six,
}

fn half_table(shape: Shape, kind: HalfKicks) -> &'static [&'static [(i8, i8)]; 4] {
    match (shape, kind) {
        (Shape::O, _) => &O_HALF,
        (_, HalfKicks::Plain) => &HALF_PLAIN,
        (_, HalfKicks::Two) => &HALF_TWO,
        (_, HalfKicks::Six) => &HALF_SIX,
    }
}

/// Clockwise kick data for the J, L, S, T, and Z pieces.
///
/// These pieces have bounding boxes that are exactly the same shape, so it
/// makes sense that they have the same kick data.
static JLSTZ_CW: [[(i8, i8); 5]; 4] = [
    [(1, -1), (0, -1), (0, 0), (1, -3), (0, -3)],
    [(-1, 0), (0, 0), (0, -1), (-1, 2), (0, 2)],
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    [(0, 1), (-1, 1), (-1, 0), (0, 3), (-1, 3)],
];

/// Clockwise kick data for the I piece.
static I_CW: [[(i8, i8); 5]; 4] = [
    [(2, -2), (0, -2), (3, -2), (0, -3), (3, 0)],
    [(-2, 1), (-3, 1), (0, 1), (-3, 3), (0, 0)],
    [(1, -1), (3, -1), (0, -1), (3, 0), (0, -3)],
    [(-1, 2), (0, 2), (-3, 2), (0, 0), (-3, 3)],
];

/// Clockwise kick data for the I piece under SRS+, which makes the I kicks
/// left-right symmetric.  Only the spawn and flipped rows differ from SRS.
static I_PLUS_CW: [[(i8, i8); 5]; 4] = [
    [(2, -2), (3, -2), (0, -2), (0, -3), (3, 0)],
    [(-2, 1), (-3, 1), (0, 1), (-3, 3), (0, 0)],
    [(1, -1), (3, -1), (0, -1), (3, 0), (0, -3)],
    [(-1, 2), (0, 2), (-3, 2), (0, 4), (-3, 1)],
];

/// Kick data for the O piece.
///
/// The O piece has 90-degree rotational symmetry, so it cannot kick.  In
/// fact, it can always rotate in place.  To match the shape of kick data,
/// it's just a bunch of zeros.
static O_CW: [[(i8, i8); 5]; 4] = [[(0, 0); 5]; 4];

/// Build the eight-row quarter table: clockwise rows as given, then the
/// derived counter-clockwise rows (negate the clockwise kicks of the final
/// orientation).
const fn derive_ccw(cw: &[[(i8, i8); 5]; 4]) -> [[(i8, i8); 5]; 8] {
    let mut table = [[(0, 0); 5]; 8];
    let mut from = 0;
    while from < 4 {
        table[from] = cw[from];

        // counter-clockwise from `from` lands on (from + 3) % 4
        let target = (from + 3) % 4;
        let mut k = 0;
        while k < 5 {
            table[from + 4][k] = (-cw[target][k].0, -cw[target][k].1);
            k += 1;
        }

        from += 1;
    }
    table
}

static JLSTZ_QUARTER: [[(i8, i8); 5]; 8] = derive_ccw(&JLSTZ_CW);
static I_QUARTER: [[(i8, i8); 5]; 8] = derive_ccw(&I_CW);
static I_PLUS_QUARTER: [[(i8, i8); 5]; 8] = derive_ccw(&I_PLUS_CW);
static O_QUARTER: [[(i8, i8); 5]; 8] = derive_ccw(&O_CW);

/// Bounding-corner shift of a half rotation, per starting orientation.  The
/// same for the I piece and the three-wide pieces.
static HALF_PLAIN: [&[(i8, i8)]; 4] = [&[(0, -1)], &[(-1, 0)], &[(0, 1)], &[(1, 0)]];

/// Half-rotation kicks that also try one cell upward.
static HALF_TWO: [&[(i8, i8)]; 4] = [
    &[(0, -1), (0, 0)],
    &[(-1, 0), (-1, 1)],
    &[(0, 1), (0, 2)],
    &[(1, 0), (1, 1)],
];

/// The six-offset half-rotation kicks used by TETR.IO, shifted into this
/// coordinate system.
static HALF_SIX: [&[(i8, i8)]; 4] = [
    &[(0, -1), (0, 0), (1, 0), (-1, 0), (1, -1), (-1, -1)],
    &[(-1, 0), (0, 0), (0, 2), (0, 1), (-1, 2), (-1, 1)],
    &[(0, 1), (0, 0), (-1, 0), (1, 0), (-1, 1), (1, 1)],
    &[(1, 0), (0, 0), (0, 2), (0, 1), (1, 2), (1, 1)],
];

/// The O piece half-rotates in place in every system that lets it rotate.
static O_HALF: [&[(i8, i8)]; 4] = [&[(0, 0)]; 4];
