use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// RandomTimeout fires somewhere in `[base, 2 * base)` after it was last kept alive. The jitter is
/// redrawn on every re-arm.
pub(crate) struct RandomTimeout {
    base: Duration,
    deadline: Instant,
    rng: StdRng,
}

impl RandomTimeout {
    pub(crate) fn new(base: Duration, now: Instant, seed: u64) -> Self {
        let mut timeout = RandomTimeout {
            base,
            deadline: now,
            rng: StdRng::seed_from_u64(seed),
        };
        timeout.on_keep_alive(now);

        timeout
    }

    pub(crate) fn on_keep_alive(&mut self, now: Instant) {
        self.deadline = now + self.base + self.jitter();
    }

    /// Stays true from the deadline until the next `on_keep_alive()`.
    pub(crate) fn has_timed_out(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn jitter(&mut self) -> Duration {
        let bound = self.base.as_nanos() as u64;
        if bound == 0 {
            return Duration::from_nanos(0);
        }

        Duration::from_nanos(self.rng.gen_range(0..bound))
    }
}
