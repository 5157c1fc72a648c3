use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Per-part upload counters, one slot per part, each written only by the
/// worker that owns that part. The aggregate is a read-only fold over the
/// slots; it may observe a torn snapshot across parts, which is fine for an
/// advisory value.
#[derive(Debug)]
pub struct Progress {
    slots: Vec<AtomicU64>,
    total: u64,
}

impl Progress {
    pub(crate) fn new(part_count: usize, total: u64) -> Arc<Self> {
        Arc::new(Self {
            slots: (0..part_count).map(|_| AtomicU64::new(0)).collect(),
            total,
        })
    }

    /// Records cumulative bytes sent for one part. `fetch_max` keeps a slot
    /// monotonic even when a retried attempt restarts its count from zero.
    pub(crate) fn record(&self, part_number: u32, bytes: u64) {
        if let Some(slot) = self.slots.get((part_number - 1) as usize) {
            slot.fetch_max(bytes, Ordering::Relaxed);
        }
    }

    pub fn bytes_loaded(&self) -> u64 {
        self.slots.iter().map(|s| s.load(Ordering::Relaxed)).sum()
    }

    /// Aggregate fraction of the source uploaded, clamped to `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.bytes_loaded() as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_sums_slots_and_clamps() {
        let progress = Progress::new(3, 250);
        progress.record(1, 100);
        progress.record(3, 50);
        assert_eq!(progress.bytes_loaded(), 150);
        assert!((progress.fraction() - 0.6).abs() < f64::EPSILON);

        // over-reporting never pushes the fraction past 1
        progress.record(2, 1000);
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn slots_stay_monotonic_across_retries() {
        let progress = Progress::new(1, 100);
        progress.record(1, 80);
        progress.record(1, 10);
        assert_eq!(progress.bytes_loaded(), 80);
    }
}
