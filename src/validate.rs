//! Offline checking of persisted solution files.

use std::path::Path;

use anyhow::Context;

use solver::codec::{self, InvalidSolution};

use crate::config;

/// Decode and replay every solution in each file, printing either the
/// solution count or the position of the first invalid record.
///
/// A malformed file is still reported precisely (every file gets checked),
/// but the run as a whole fails: the exit code is non-zero unless every
/// file is valid.
pub fn run(paths: &[impl AsRef<Path>]) -> anyhow::Result<()> {
    let mut invalid = 0;

    for path in paths {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if !report(path, &bytes) {
            invalid += 1;
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} files invalid", invalid, paths.len());
    }
    Ok(())
}

/// Print one file's verdict; true when every record checked out.
fn report(path: &Path, bytes: &[u8]) -> bool {
    match check(bytes) {
        Ok(count) => {
            println!("{}: {} solutions", path.display(), count);
            true
        }
        Err((index, offset, invalid)) => {
            println!(
                "{}: solution {} invalid at byte {}: {}",
                path.display(),
                index,
                offset,
                invalid.reason,
            );
            false
        }
    }
}

/// The number of valid solutions, or `(solution index, absolute byte
/// offset, cause)` of the first bad one.
fn check(bytes: &[u8]) -> Result<usize, (usize, usize, InvalidSolution)> {
    let size = codec::solution_size(config::NEXT_LEN);
    let mut count = 0;

    for (index, record) in bytes.chunks(size).enumerate() {
        let base = index * size;
        let decoded = codec::unpack(record, config::NEXT_LEN)
            .and_then(|record| codec::verify(&record, config::HEIGHT).map(|()| record));

        match decoded {
            Ok(_) => count += 1,
            Err(invalid) => return Err((index, base + invalid.offset, invalid)),
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver::network::Network;
    use solver::search::{find_pc, hold_bits};
    use solver::sequence::Sequence;
    use srs_6l::gameplay::{Piece, Shape};

    use Shape::*;

    fn solved_bytes(shapes: &[Shape]) -> Vec<u8> {
        let sequence = Sequence::from_shapes(shapes);
        let game = sequence.game(config::KICKS);
        let network = Network::linear(
            [true; 9],
            [-1.0, -4.0, -1.0, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0],
        );
        let mut out = [Piece::new(I); config::NEXT_LEN];
        let solution = find_pc(&game, &network, config::HEIGHT, &mut out, None).unwrap();
        let bits = hold_bits(&game, solution);

        let mut bytes = Vec::new();
        codec::pack(sequence, bits, solution, config::NEXT_LEN, &mut bytes);
        bytes
    }

    #[test]
    fn valid_files_count_solutions() {
        let mut bytes = solved_bytes(&[L, J, S, Z, T, O, I, I, T, Z, O]);
        let again = bytes.clone();
        bytes.extend_from_slice(&again);

        assert_eq!(check(&bytes), Ok(2));
    }

    #[test]
    fn invalid_files_fail_the_run() {
        let mut path = std::env::temp_dir();
        path.push(format!("pc-batch-test-validate-{}.pc", std::process::id()));

        let bytes = solved_bytes(&[L, J, S, Z, T, O, I, I, T, Z, O]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(run(&[&path]).is_ok());

        let mut corrupt = bytes;
        corrupt[8] = 0xFB;
        std::fs::write(&path, &corrupt).unwrap();
        assert!(run(&[&path]).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corruption_is_located() {
        let mut bytes = solved_bytes(&[L, J, S, Z, T, O, I, I, T, Z, O]);
        let size = codec::solution_size(config::NEXT_LEN);
        let again = bytes.clone();
        bytes.extend_from_slice(&again);

        // Break a placement byte in the second record.
        bytes[size + 8] = 0xFB;
        let (index, offset, _) = check(&bytes).unwrap_err();
        assert_eq!(index, 1);
        assert!(offset >= size + 8);

        // Truncation points at the end of the partial record.
        bytes.truncate(size + 3);
        let (index, _, _) = check(&bytes).unwrap_err();
        assert_eq!(index, 1);
    }
}
