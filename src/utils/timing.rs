//! Scoped stopwatches for per-frame phase timings.

use std::time::{Duration, Instant};

/// Adds the time between construction and drop to a duration slot.
///
/// The guard records on every exit path, including early returns and `?`.
#[must_use = "the timer records when dropped"]
pub struct ScopedTimer<'a> {
    label: &'static str,
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'static str, slot: &'a mut Duration) -> Self {
        Self {
            label,
            start: Instant::now(),
            slot,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        *self.slot += elapsed;
        tracing::trace!(
            phase = self.label,
            micros = elapsed.as_micros() as u64,
            "Phase finished"
        );
    }
}

/// Time spent in each phase of one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameTimings {
    pub cull: Duration,
    pub build: Duration,
    pub columns: Duration,
    pub emit: Duration,
    pub total: Duration,
}

impl FrameTimings {
    pub fn accumulate(&mut self, other: &FrameTimings) {
        self.cull += other.cull;
        self.build += other.build;
        self.columns += other.columns;
        self.emit += other.emit;
        self.total += other.total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn early_exit(slot: &mut Duration, bail: bool) -> Result<u32, ()> {
        let _timer = ScopedTimer::new("early", slot);
        std::thread::sleep(Duration::from_millis(2));
        if bail {
            return Err(());
        }
        Ok(1)
    }

    #[test]
    fn test_records_on_every_exit_path() {
        let mut slot = Duration::ZERO;
        assert!(early_exit(&mut slot, true).is_err());
        let after_error = slot;
        assert!(after_error >= Duration::from_millis(2));

        assert_eq!(early_exit(&mut slot, false), Ok(1));
        assert!(slot >= after_error + Duration::from_millis(2));
    }

    #[test]
    fn test_accumulate_sums_phases() {
        let mut total = FrameTimings::default();
        let frame = FrameTimings {
            cull: Duration::from_micros(3),
            total: Duration::from_micros(10),
            ..FrameTimings::default()
        };
        total.accumulate(&frame);
        total.accumulate(&frame);
        assert_eq!(total.cull, Duration::from_micros(6));
        assert_eq!(total.total, Duration::from_micros(20));
    }
}
