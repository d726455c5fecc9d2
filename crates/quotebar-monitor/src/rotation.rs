//! Round-robin position for rotate mode.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Monotonic rotation counter.
///
/// The counter is reduced modulo the current key count when read, so a
/// reload that shrinks the list never leaves it out of range.
#[derive(Debug, Default)]
pub struct Rotation {
    counter: AtomicUsize,
}

impl Rotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step to the next key. Returns the new raw counter.
    pub fn advance(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Raw counter value.
    pub fn index(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    /// Position among `len` keys, `None` when there are none.
    pub fn position(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.index() % len)
    }

    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}
