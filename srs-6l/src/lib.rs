//! Six-line SRS game engine: bit-packed boards, pieces, kick tables, and the
//! 7-bag randomiser.

pub mod bag;
pub mod gameplay;
pub mod kicks;
