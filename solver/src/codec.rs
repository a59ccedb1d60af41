//! The packed on-disk solution format.
//!
//! Per solution, with `next_len` placement slots:
//!
//! * 6 bytes, little endian: the packed piece [sequence] (hold first, then
//!   current, then preview; unused fields all-ones),
//! * 2 bytes, little endian: the hold bitmask (bit i set when placement i
//!   took the held piece),
//! * `next_len` bytes: one per placement, the facing in the low two bits and
//!   the canonical position index in the high six.  Slots past the solution
//!   length are padded with 0xFF.
//!
//! Total size: `8 + next_len` bytes.
//!
//! [sequence]: Sequence

use std::fmt;

use smallvec::SmallVec;

use srs_6l::gameplay::{Board, Orientation, Piece, Shape};

use crate::sequence::{Sequence, SENTINEL};

/// Size in bytes of one packed solution.
pub fn solution_size(next_len: usize) -> usize {
    8 + next_len
}

/// A decoded solution record: the dealt pieces and the placements, with the
/// shapes still implicit (they follow from replaying the sequence under the
/// hold mask).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SolutionRecord {
    pub sequence: Sequence,
    pub hold_bits: u16,
    pub moves: SmallVec<[(Orientation, u8); 16]>,
}

/// Why a record failed to decode or verify, with the offset of the culprit
/// byte relative to the record start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidSolution {
    pub offset: usize,
    pub reason: &'static str,
}

impl fmt::Display for InvalidSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.reason, self.offset)
    }
}

impl std::error::Error for InvalidSolution {}

/// Pack one placement into its byte: the facing in the low two bits, the
/// canonical position index in the high six.
pub fn placement_byte(piece: Piece) -> u8 {
    piece.orientation as u8 | (piece.canonical_index() << 2)
}

/// Pack one solution into `out`.
///
/// `placements` must hold at most `next_len` pieces, each fully inside the
/// board.
pub fn pack(sequence: Sequence, hold_bits: u16, placements: &[Piece], next_len: usize, out: &mut Vec<u8>) {
    let moves: SmallVec<[u8; 16]> = placements.iter().map(|&p| placement_byte(p)).collect();
    pack_raw(sequence, hold_bits, &moves, next_len, out);
}

/// Like [`pack`], but from already-encoded placement bytes.
pub fn pack_raw(sequence: Sequence, hold_bits: u16, moves: &[u8], next_len: usize, out: &mut Vec<u8>) {
    assert!(moves.len() <= next_len);

    out.extend_from_slice(&sequence.0.to_le_bytes()[..6]);
    out.extend_from_slice(&hold_bits.to_le_bytes());

    out.extend_from_slice(moves);
    for _ in moves.len()..next_len {
        out.push(0xFF);
    }
}

/// Unpack one solution record from the front of `bytes`.
///
/// Checks sizes, shape fields, and position indexes; whether the placements
/// actually clear the board is [`verify`]'s job.
pub fn unpack(bytes: &[u8], next_len: usize) -> Result<SolutionRecord, InvalidSolution> {
    if bytes.len() < solution_size(next_len) {
        return Err(InvalidSolution {
            offset: bytes.len(),
            reason: "truncated solution",
        });
    }

    let mut sequence_bits = (1u64 << 48) - 1;
    for (i, &byte) in bytes[..6].iter().enumerate() {
        sequence_bits &= !(0xFFu64 << (8 * i));
        sequence_bits |= (byte as u64) << (8 * i);
    }
    let sequence = Sequence(sequence_bits);

    // The sequence must be a run of shapes followed by a run of sentinels.
    let mut ended = false;
    for slot in 0..16 {
        let field = sequence_bits >> (3 * slot) & SENTINEL;
        if field == SENTINEL {
            ended = true;
        } else if ended {
            return Err(InvalidSolution {
                offset: 3 * slot / 8,
                reason: "piece after end of sequence",
            });
        }
    }

    let piece_count = sequence.len();
    if piece_count < 2 {
        return Err(InvalidSolution {
            offset: 0,
            reason: "sequence too short",
        });
    }
    if piece_count - 1 > next_len {
        return Err(InvalidSolution {
            offset: 0,
            reason: "sequence longer than the placement area",
        });
    }

    let hold_bits = u16::from_le_bytes([bytes[6], bytes[7]]);

    let mut moves = SmallVec::new();
    for (i, &byte) in bytes[8..solution_size(next_len)].iter().enumerate() {
        if i < piece_count - 1 {
            let index = byte >> 2;
            if index >= 60 {
                return Err(InvalidSolution {
                    offset: 8 + i,
                    reason: "position index out of range",
                });
            }
            let orientation = Orientation::try_from(byte & 0b11).unwrap();
            moves.push((orientation, index));
        } else if byte != 0xFF {
            return Err(InvalidSolution {
                offset: 8 + i,
                reason: "unused placement slot not padded",
            });
        }
    }

    Ok(SolutionRecord {
        sequence,
        hold_bits,
        moves,
    })
}

/// Replay a record from an empty board and check that it is a legal perfect
/// clear: every placement fits, matches the dealt pieces under the hold
/// mask, stays below `height`, and the board ends empty.
pub fn verify(record: &SolutionRecord, height: u32) -> Result<(), InvalidSolution> {
    let too_short = InvalidSolution {
        offset: 0,
        reason: "sequence too short",
    };
    let mut shapes = record.sequence.shapes();
    let mut hold = shapes.next().ok_or(too_short)?;
    let mut current = shapes.next().ok_or(too_short)?;

    let mut board = Board::empty();
    let mut max_height = height;

    for (i, &(orientation, index)) in record.moves.iter().enumerate() {
        if record.hold_bits & (1 << i) != 0 {
            std::mem::swap(&mut current, &mut hold);
        }

        let piece = Piece::from_canonical(current, orientation, index);
        let offset = 8 + i;

        if piece.top_row() >= max_height as i8 || !piece.in_bounds() {
            return Err(InvalidSolution {
                offset,
                reason: "placement above the height limit",
            });
        }
        if piece.collides_in(board) {
            return Err(InvalidSolution {
                offset,
                reason: "placement overlaps the board",
            });
        }
        if !piece.grounded(board) {
            return Err(InvalidSolution {
                offset,
                reason: "placement is floating",
            });
        }

        let (next_board, cleared) = piece.place(board);
        board = next_board;
        max_height -= cleared;

        match shapes.next() {
            Some(shape) => current = shape,
            None if i + 1 == record.moves.len() => {}
            None => {
                return Err(InvalidSolution {
                    offset,
                    reason: "sequence shorter than placements",
                })
            }
        }
    }

    if board != Board::empty() {
        return Err(InvalidSolution {
            offset: 8,
            reason: "placements do not clear the board",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use srs_6l::kicks::kicks_srs;

    use crate::network::Network;
    use crate::search::{find_pc, hold_bits};

    use Shape::*;

    #[test]
    fn round_trip_is_exact() {
        let shapes = [Z, T, O, I, L];
        let pieces = [
            Piece::from_canonical(T, Orientation::North, 0),
            Piece::from_canonical(O, Orientation::North, 24),
            Piece::from_canonical(I, Orientation::East, 29),
            Piece::from_canonical(L, Orientation::South, 7),
        ];

        let mut bytes = Vec::new();
        pack(Sequence::from_shapes(&shapes), 0b0101, &pieces, 10, &mut bytes);
        assert_eq!(bytes.len(), solution_size(10));

        let record = unpack(&bytes, 10).unwrap();
        assert_eq!(record.sequence, Sequence::from_shapes(&shapes));
        assert_eq!(record.hold_bits, 0b0101);
        assert_eq!(record.moves.len(), 4);
        assert_eq!(record.moves[2], (Orientation::East, 29));
    }

    #[test]
    fn malformed_records_are_rejected() {
        let pieces = [Piece::from_canonical(T, Orientation::North, 0)];
        let mut bytes = Vec::new();
        pack(Sequence::from_shapes(&[T, O]), 0, &pieces, 4, &mut bytes);

        // Truncation.
        assert!(unpack(&bytes[..5], 4).is_err());

        // A position index of 60 is out of range.
        let mut bad = bytes.clone();
        bad[8] = 60 << 2;
        let err = unpack(&bad, 4).unwrap_err();
        assert_eq!(err.offset, 8);

        // A piece field after the sentinel.
        let mut bad = bytes.clone();
        bad[1] = 0; // slots 2..: shape fields where sentinels belong
        assert!(unpack(&bad, 4).is_err());

        // Unused slots must be padding.
        let mut bad = bytes;
        bad[9] = 0;
        assert!(unpack(&bad, 4).is_err());
    }

    #[test]
    fn solved_games_verify() {
        // Solve a two-line clear, persist it, and replay it from the bytes.
        let sequence = Sequence::from_shapes(&[O, I, O, I, L, J]);
        let game = sequence.game(kicks_srs);
        let network = Network::linear(
            [true; 9],
            [-1.0, -4.0, -1.0, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0],
        );
        let mut out = vec![Piece::new(I); 5];
        let solution = find_pc(&game, &network, 0, &mut out, None).unwrap();
        let bits = hold_bits(&game, solution);

        let mut bytes = Vec::new();
        pack(sequence, bits, solution, 10, &mut bytes);
        let record = unpack(&bytes, 10).unwrap();
        assert_eq!(record.sequence, sequence);
        verify(&record, 2).unwrap();

        // Corrupting any placement breaks verification.
        let mut broken = record;
        broken.moves[0].1 = 59;
        assert!(verify(&broken, 2).is_err());
    }
}
