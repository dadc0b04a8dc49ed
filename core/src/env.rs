use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

// The only two non-deterministic inputs of the dispatcher: the wall clock and
// the chat picker. Both sit behind traits so tests can pin them down.

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..len`. Callers never pass `len == 0`.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform pick from the thread-local generator. No seed, no reproducibility.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Walks the pool in order, wrapping around. Lets tests reach every entry.
#[derive(Default)]
pub struct SequenceRandom {
    next: AtomicUsize,
}

impl RandomSource for SequenceRandom {
    fn pick(&self, len: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % len
    }
}
