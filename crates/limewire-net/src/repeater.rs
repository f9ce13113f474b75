use std::time::{Duration, Instant};

/// Fires at most once per `interval`, checked via [`Repeater::fired`].
///
/// Generalized from the teacher's RDTSC-relative `flux_timing::Repeater`
/// cadence helper, reimplemented over `std::time::Instant` since nothing in
/// this workspace needs a hardware-clock-relative timer: the wire protocol
/// already carries wall-clock nanosecond timestamps, and reconnect/heartbeat
/// cadence only needs coarse wall-clock intervals.
#[derive(Debug)]
pub struct Repeater {
    interval: Duration,
    last_fired: Instant,
}

impl Repeater {
    pub fn every(interval: Duration) -> Self {
        // Fire immediately on the first `fired()` check.
        let last_fired = Instant::now()
            .checked_sub(interval)
            .unwrap_or_else(Instant::now);
        Self { interval, last_fired }
    }

    /// Returns `true` at most once per `interval`; each `true` resets the
    /// clock.
    pub fn fired(&mut self) -> bool {
        if self.last_fired.elapsed() >= self.interval {
            self.last_fired = Instant::now();
            true
        } else {
            false
        }
    }

    /// Forces the next `fired()` call to return `true`.
    pub fn force_fire(&mut self) {
        self.last_fired = Instant::now()
            .checked_sub(self.interval)
            .unwrap_or_else(Instant::now);
    }

    /// Resets the interval clock without forcing an immediate fire.
    pub fn reset(&mut self) {
        self.force_fire();
    }
}
