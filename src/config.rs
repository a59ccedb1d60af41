//! Build-time configuration of the batch run.

use srs_6l::kicks::{kicks_srs, KickFn};

/// Height of the perfect clears being enumerated, in rows.
pub const HEIGHT: u32 = 4;

/// Placements per solution: every cell below [`HEIGHT`] divided by four.
pub const NEXT_LEN: usize = HEIGHT as usize * 10 / 4;

/// Pieces per sequence: one per placement, plus the held piece.
pub const SEQUENCE_LEN: usize = NEXT_LEN + 1;

/// Leading sequence slots enumerated freely per locked tail; bounds the
/// deduplication set at `7^UNLOCKED` bits.
pub const UNLOCKED: usize = 6;

/// Worker thread count; 0 means one less than the logical core count.
pub const THREADS: usize = 0;

/// Output file. The sequence-count checkpoint lives next to it.
pub const SAVE_PATH: &str = "solutions.pc";

/// The move-ordering network consumed by every worker.
pub const NETWORK_PATH: &str = "network.json";

/// Rotation rules used for the whole run.
pub const KICKS: KickFn = kicks_srs;
