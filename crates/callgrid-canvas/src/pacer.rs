use std::time::Duration;

/// Chooses the animation tick interval.
///
/// Ticks run at the fast rate while anything moves. After `idle_ticks`
/// consecutive ticks without a change the interval relaxes to the slow
/// rate; the next change snaps it back.
#[derive(Debug, Clone)]
pub struct FramePacer {
    fast: Duration,
    slow: Duration,
    idle_ticks: u32,
    idle: u32,
}

impl FramePacer {
    pub fn new(fast: Duration, slow: Duration, idle_ticks: u32) -> Self {
        Self {
            fast,
            slow,
            idle_ticks,
            idle: 0,
        }
    }

    /// Record one tick and return the interval until the next.
    pub fn tick(&mut self, changed: bool) -> Duration {
        if changed {
            self.idle = 0;
        } else {
            self.idle = self.idle.saturating_add(1);
        }
        self.interval()
    }

    pub fn interval(&self) -> Duration {
        if self.is_idle() { self.slow } else { self.fast }
    }

    pub fn is_idle(&self) -> bool {
        self.idle >= self.idle_ticks
    }

    /// Input arrived; go back to the fast rate.
    pub fn wake(&mut self) {
        self.idle = 0;
    }
}
