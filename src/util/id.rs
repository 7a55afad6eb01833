use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out process-wide unique backend IDs.
///
/// The first ID handed out is 1, leaving 0 free to mean "no backend" in logs
/// and wire dumps.
#[derive(Debug)]
pub struct IdCounter {
    next: AtomicU64,
}

impl IdCounter {
    /// Creates a counter, suitable for a `static`.
    pub const fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Takes the next unused ID.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}
