//! Signal-coordinated shutdown.
//!
//! One integer carries the whole protocol.  Non-negative values count the
//! threads currently writing a checkpoint; when a termination signal
//! arrives, the handler flips the value to `-1 - n` ("exiting, n saves
//! still in flight"), waits for it to climb back to -1 as those saves
//! finish, and exits the process.  Threads that try to start a save after
//! the flip are refused, and nothing ever blocks inside the handler except
//! a bounded one-millisecond pacing sleep.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::time::Duration;

use signal_hook::consts::{SIGABRT, SIGINT, SIGQUIT, SIGTERM};

static SAVING_THREADS: AtomicIsize = AtomicIsize::new(0);

/// Exit status reported when a signal triggered the shutdown.
const INTERRUPTED: i32 = 130;

/// Handle to the shutdown state.
#[derive(Clone, Copy)]
pub struct Shutdown {
    state: &'static AtomicIsize,
}

impl Shutdown {
    /// Register the termination handlers.  Call once, before spawning
    /// workers.  (STOP cannot be caught, so of the termination signals only
    /// ABRT, INT, QUIT, and TERM are registered.)
    pub fn install() -> std::io::Result<Shutdown> {
        for signal in [SIGABRT, SIGINT, SIGQUIT, SIGTERM] {
            // Safety: the handler touches only the atomic and
            // signal-handler-safe primitives.
            unsafe {
                signal_hook::low_level::register(signal, request_exit)?;
            }
        }
        Ok(Shutdown {
            state: &SAVING_THREADS,
        })
    }

    /// A private shutdown state with no handler attached, for tests.
    #[cfg(test)]
    pub fn unarmed() -> Shutdown {
        Shutdown {
            state: Box::leak(Box::new(AtomicIsize::new(0))),
        }
    }

    /// Try to enter a save section.  Refused once shutdown has begun.
    pub fn begin_save(&self) -> bool {
        self.state
            .fetch_update(Ordering::Acquire, Ordering::Acquire, |count| {
                (count >= 0).then_some(count + 1)
            })
            .is_ok()
    }

    /// Leave a save section entered with [`begin_save`].
    ///
    /// [`begin_save`]: Shutdown::begin_save
    pub fn end_save(&self) {
        self.state
            .fetch_update(Ordering::Release, Ordering::Acquire, |count| {
                Some(if count >= 0 { count - 1 } else { count + 1 })
            })
            .ok();
    }

    pub fn is_exiting(&self) -> bool {
        self.state.load(Ordering::Acquire) < 0
    }
}

fn request_exit() {
    // -1 - n: still negative whatever n was, and counts back up to -1 as
    // the n in-flight saves complete.
    let previous = SAVING_THREADS
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            Some(if count >= 0 { -1 - count } else { count })
        })
        .unwrap();

    if previous < 0 {
        // A second signal while already draining: just exit harder.
        signal_hook::low_level::exit(INTERRUPTED);
    }

    while SAVING_THREADS.load(Ordering::Acquire) != -1 {
        std::thread::sleep(Duration::from_millis(1));
    }

    signal_hook::low_level::exit(INTERRUPTED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_sections_nest_and_refuse_after_exit() {
        let shutdown = Shutdown::unarmed();

        assert!(!shutdown.is_exiting());
        assert!(shutdown.begin_save());
        assert!(shutdown.begin_save());
        shutdown.end_save();
        shutdown.end_save();
        assert_eq!(shutdown.state.load(Ordering::Relaxed), 0);

        // Simulate the handler's flip while one save is active.
        assert!(shutdown.begin_save());
        shutdown
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| Some(-1 - count))
            .unwrap();
        assert!(shutdown.is_exiting());
        assert!(!shutdown.begin_save());

        // Finishing the in-flight save brings the counter to rest at -1.
        shutdown.end_save();
        assert_eq!(shutdown.state.load(Ordering::Relaxed), -1);
    }
}
