//! Worker threads, resume, and the solve loop.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;

use solver::codec;
use solver::network::Network;
use solver::search::{find_pc, hold_bits};
use solver::sequence::SequenceIterator;
use srs_6l::gameplay::{Piece, Shape};

use crate::config;
use crate::counter::Counter;
use crate::ring::{self, ChunkRing, SolvedEntry};
use crate::shutdown::Shutdown;

/// Enumerate every sequence, solve them all, and persist the solutions,
/// resuming from the checkpoint next to [`config::SAVE_PATH`].
pub fn run_solve() -> anyhow::Result<()> {
    let shutdown = Shutdown::install().context("installing signal handlers")?;
    let network = Network::load(config::NETWORK_PATH)
        .with_context(|| format!("loading network from {}", config::NETWORK_PATH))?;

    let workers = match config::THREADS {
        0 => num_cpus::get().saturating_sub(1).max(1),
        n => n,
    };

    let save_path = PathBuf::from(config::SAVE_PATH);
    let resumed = ring::read_count(&save_path.with_extension("count"))
        .context("reading the resume checkpoint")?;

    // The checkpoint counts consumed sequences, so replaying that many
    // next() calls realigns the iterator exactly.
    let mut iterator = SequenceIterator::new(config::SEQUENCE_LEN, config::UNLOCKED);
    for _ in 0..resumed {
        if iterator.next().is_none() {
            break;
        }
    }
    if iterator.done() {
        log::info!("nothing left to solve at checkpoint {}", resumed);
        return Ok(());
    }
    if resumed > 0 {
        log::info!("resuming after {} sequences", resumed);
    }

    let ring = ChunkRing::new(iterator, workers, save_path, config::NEXT_LEN, resumed)?;
    let counter = Counter::zero(workers);
    let done = AtomicBool::new(false);

    log::info!("solving with {} workers", workers);

    let failures = crossbeam::scope(|scope| {
        let ring = &ring;
        let network = &network;
        let counter = &counter;
        let done = &done;

        let progress = scope.spawn(move |_| {
            while !done.load(Ordering::Acquire) {
                eprint!("\r{:>13} sequences solved", resumed + counter.get());
                std::thread::sleep(Duration::from_millis(100));
            }
            eprintln!("\r{:>13} sequences solved", resumed + counter.get());
        });

        let handles: Vec<_> = (0..workers)
            .map(|id| scope.spawn(move |_| worker(ring, network, counter, id, shutdown)))
            .collect();

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(err) = handle.join().expect("worker panicked") {
                failures.push(err);
            }
        }

        done.store(true, Ordering::Release);
        let _ = progress.join();
        failures
    })
    .expect("scope panicked");

    if let Some(err) = failures.into_iter().next() {
        return Err(err).context("worker failed");
    }

    log::info!("finished; {} sequences persisted", ring.persisted());
    Ok(())
}

/// One worker: pull chunks, solve every sequence in them, publish, flush.
fn worker(
    ring: &ChunkRing,
    network: &Network,
    counter: &Counter,
    id: usize,
    shutdown: Shutdown,
) -> io::Result<()> {
    let mut placements = [Piece::new(Shape::I); 16];

    while !shutdown.is_exiting() {
        let chunk = match ring.next_chunk() {
            Some(chunk) => chunk,
            None => break,
        };

        let solved = {
            let mut data = chunk.data();
            let mut solved = 0;

            for i in 0..data.count {
                let sequence = data.sequences[i];
                let game = sequence.game(config::KICKS);

                data.solutions[i] = match find_pc(
                    &game,
                    network,
                    config::HEIGHT,
                    &mut placements[..config::NEXT_LEN],
                    None,
                ) {
                    Ok(solution) => {
                        solved += 1;
                        let mut entry = SolvedEntry {
                            len: solution.len() as i8,
                            hold_bits: hold_bits(&game, solution),
                            moves: [0xFF; 16],
                        };
                        for (slot, &piece) in entry.moves.iter_mut().zip(solution.iter()) {
                            *slot = codec::placement_byte(piece);
                        }
                        entry
                    }
                    // "No solution" is routine for a sequence; skip it.
                    Err(_) => SolvedEntry::NONE,
                };

                counter.increment(id);
            }

            solved
        };

        chunk.finish(solved);

        // A worker that finishes while shutdown is asserted must not start
        // a new save; the handler is already draining the in-flight ones.
        if !shutdown.is_exiting() {
            ring.flush(shutdown)?;
        }
    }

    ring.flush(shutdown)?;
    Ok(())
}

// The packed sequence and hold-bitmask formats cap both lengths at sixteen.
const _: () = assert!(config::NEXT_LEN <= 16 && config::SEQUENCE_LEN <= 16);
