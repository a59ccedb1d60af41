//! The bounded chunk ring between the sequence iterator and the workers.
//!
//! A fixed number of slots, each holding up to [`CHUNK_SIZE`] sequences and
//! their solutions.  Whichever worker wants work takes the write lock, pulls
//! the next chunk of sequences from the iterator, and solves it; chunks are
//! flushed to disk strictly in ring order under the read lock, so the output
//! file is always a prefix of the enumeration and the persisted sequence
//! count is an exact resume point.
//!
//! Write and read indexes run modulo twice the slot count so that a full
//! ring and an empty ring are distinguishable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};

use solver::codec;
use solver::sequence::{Sequence, SequenceIterator};

use crate::shutdown::Shutdown;

/// Sequences per chunk.
pub const CHUNK_SIZE: usize = 64;

/// Ring slots per worker.
pub const CHUNKS_PER_WORKER: usize = 8;

/// One solved (or unsolvable) sequence, placements already byte-encoded.
#[derive(Clone, Copy, Debug)]
pub struct SolvedEntry {
    /// Number of placements; negative when no solution was found.
    pub len: i8,
    pub hold_bits: u16,
    pub moves: [u8; 16],
}

impl SolvedEntry {
    pub const NONE: SolvedEntry = SolvedEntry {
        len: -1,
        hold_bits: 0,
        moves: [0xFF; 16],
    };

    pub fn is_solved(&self) -> bool {
        self.len >= 0
    }
}

pub struct SlotData {
    /// Sequences filled in this chunk; only the first `count` entries of the
    /// arrays are meaningful.
    pub count: usize,
    pub sequences: [Sequence; CHUNK_SIZE],
    pub solutions: [SolvedEntry; CHUNK_SIZE],
}

struct Slot {
    /// Number of solved sequences, or -1 while the chunk is outstanding.
    solved: AtomicIsize,
    data: Mutex<SlotData>,
}

struct WriteState {
    iterator: SequenceIterator,
    exhausted: bool,
}

struct ReadState {
    writer: BufWriter<File>,
    save_path: PathBuf,
    count_path: PathBuf,
    /// Sequences consumed from the iterator and persisted, in chunk
    /// granularity.  This is the resume point.
    count: u64,
    last_backup: u64,
    backup_every: u64,
    next_len: usize,
}

pub struct ChunkRing {
    capacity: usize,
    slots: Vec<Slot>,
    write: Mutex<WriteState>,
    read: Mutex<ReadState>,
    write_idx: AtomicUsize,
    read_idx: AtomicUsize,
    /// Signalled when a flush frees a slot.
    space: Condvar,
}

/// A borrowed, outstanding chunk.  Solve the sequences in [`data`], then
/// call [`finish`].
///
/// [`data`]: Chunk::data
/// [`finish`]: Chunk::finish
pub struct Chunk<'a> {
    ring: &'a ChunkRing,
    index: usize,
}

impl ChunkRing {
    /// Create the ring with all slot storage preallocated.  `resumed` is the
    /// persisted sequence count of an earlier run; the caller has already
    /// fast-forwarded the iterator past it.
    pub fn new(
        iterator: SequenceIterator,
        workers: usize,
        save_path: PathBuf,
        next_len: usize,
        resumed: u64,
    ) -> io::Result<ChunkRing> {
        let capacity = CHUNKS_PER_WORKER * workers;
        let mut slots = Vec::new();
        slots.resize_with(capacity, || Slot {
            solved: AtomicIsize::new(-1),
            data: Mutex::new(SlotData {
                count: 0,
                sequences: [Sequence(u64::MAX); CHUNK_SIZE],
                solutions: [SolvedEntry::NONE; CHUNK_SIZE],
            }),
        });

        let writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&save_path)?,
        );
        let count_path = save_path.with_extension("count");

        Ok(ChunkRing {
            capacity,
            slots,
            write: Mutex::new(WriteState {
                iterator,
                exhausted: false,
            }),
            read: Mutex::new(ReadState {
                writer,
                save_path,
                count_path,
                count: resumed,
                last_backup: resumed,
                backup_every: (workers * 1024) as u64,
                next_len,
            }),
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(0),
            space: Condvar::new(),
        })
    }

    /// Pull the next chunk of sequences, blocking while the ring is full.
    /// Returns `None` once the iterator is exhausted.
    pub fn next_chunk(&self) -> Option<Chunk<'_>> {
        let mut write = self.write.lock();
        if write.exhausted {
            return None;
        }

        loop {
            let occupied = self.occupied();
            if occupied < self.capacity {
                break;
            }
            self.space.wait(&mut write);
        }

        let write_idx = self.write_idx.load(Ordering::Acquire);
        let index = write_idx % self.capacity;
        let slot = &self.slots[index];
        slot.solved.store(-1, Ordering::Release);

        let count = {
            let mut data = slot.data.lock();
            data.count = 0;
            while data.count < CHUNK_SIZE {
                match write.iterator.next() {
                    Some(sequence) => {
                        let idx = data.count;
                        data.sequences[idx] = sequence;
                        data.count += 1;
                    }
                    None => {
                        write.exhausted = true;
                        break;
                    }
                }
            }
            data.count
        };

        if count == 0 {
            return None;
        }

        self.write_idx
            .store((write_idx + 1) % (2 * self.capacity), Ordering::Release);
        Some(Chunk { ring: self, index })
    }

    /// Flush every finished chunk at the head of the ring, in order, and
    /// checkpoint the sequence count.  Refuses to start once shutdown has
    /// been signalled.
    pub fn flush(&self, shutdown: Shutdown) -> io::Result<()> {
        let mut read = self.read.lock();

        loop {
            let read_idx = self.read_idx.load(Ordering::Acquire);
            if read_idx == self.write_idx.load(Ordering::Acquire) {
                break;
            }

            let slot = &self.slots[read_idx % self.capacity];
            if slot.solved.load(Ordering::Acquire) < 0 {
                break;
            }

            if !shutdown.begin_save() {
                break;
            }
            let result = flush_slot(&mut read, slot);
            shutdown.end_save();
            result?;

            self.read_idx
                .store((read_idx + 1) % (2 * self.capacity), Ordering::Release);

            // Taking the write lock pins any producer either inside its wait
            // (the notify reaches it) or before its fullness check (it sees
            // the new read index).  Read-then-write is the only lock nesting
            // in the ring.
            {
                let _write = self.write.lock();
                self.space.notify_one();
            }
        }

        Ok(())
    }

    /// Sequences persisted so far, including a resumed prefix.
    pub fn persisted(&self) -> u64 {
        self.read.lock().count
    }

    fn occupied(&self) -> usize {
        let write_idx = self.write_idx.load(Ordering::Acquire);
        let read_idx = self.read_idx.load(Ordering::Acquire);
        (write_idx + 2 * self.capacity - read_idx) % (2 * self.capacity)
    }
}

impl<'a> Chunk<'a> {
    pub fn data(&self) -> MutexGuard<'a, SlotData> {
        self.ring.slots[self.index].data.lock()
    }

    /// Publish the chunk as solved.  `solved` is the number of sequences
    /// that actually got a solution; the flusher only needs to know that
    /// the chunk is complete, but the count makes the logs honest.
    pub fn finish(self, solved: usize) {
        self.ring.slots[self.index]
            .solved
            .store(solved as isize, Ordering::Release);
    }
}

fn flush_slot(read: &mut ReadState, slot: &Slot) -> io::Result<()> {
    let mut buffer = Vec::with_capacity(CHUNK_SIZE * codec::solution_size(read.next_len));

    {
        let data = slot.data.lock();
        for i in 0..data.count {
            let entry = &data.solutions[i];
            if entry.is_solved() {
                codec::pack_raw(
                    data.sequences[i],
                    entry.hold_bits,
                    &entry.moves[..entry.len as usize],
                    read.next_len,
                    &mut buffer,
                );
            }
        }
    }

    read.writer.write_all(&buffer)?;
    read.writer.flush()?;

    // The chunk is on disk; only now may the checkpoint claim it.  The
    // unsolved tail of a final partial chunk is still counted, which merely
    // fast-forwards a resumed iterator to its own end.
    read.count += CHUNK_SIZE as u64;
    write_count(&read.count_path, read.count)?;

    if read.count - read.last_backup >= read.backup_every {
        read.last_backup = read.count;
        fs::copy(&read.save_path, read.save_path.with_extension("pc.bak"))?;
        fs::copy(&read.count_path, read.count_path.with_extension("count.bak"))?;
    }

    Ok(())
}

/// Rewrite the checkpoint atomically: write aside, then rename over.
fn write_count(path: &Path, count: u64) -> io::Result<()> {
    let tmp = path.with_extension("count.tmp");
    fs::write(&tmp, count.to_string())?;
    fs::rename(&tmp, path)
}

/// Read a checkpoint written by [`write_count`]; 0 when the file does not
/// exist yet.
pub fn read_count(path: &Path) -> io::Result<u64> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .trim()
            .parse()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(err),
    }
}
