use std::time::Duration;

/// Fixed-step clock polled from the event loop.
///
/// Each call to [`IntervalClock::tick`] reports how many whole intervals have
/// become due since the previous due point. Late polls do not drift the
/// schedule: due points stay on the `start + k * interval` grid.
#[derive(Debug, Clone)]
pub struct IntervalClock {
    interval: Duration,
    next_due: Option<u64>,
}

impl IntervalClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn from_hz(hz: f64) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// (Re)starts the grid so the first tick is due one interval after `now`.
    pub fn start(&mut self, now: u64) {
        self.next_due = Some(now.saturating_add(self.interval_ns()));
    }

    /// Time left until the next due point; zero when already due.
    pub fn until_due(&self, now: u64) -> Option<Duration> {
        self.next_due
            .map(|due| Duration::from_nanos(due.saturating_sub(now)))
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Number of intervals due at `now`; zero when not due or not running.
    pub fn tick(&mut self, now: u64) -> u64 {
        let Some(due) = self.next_due else {
            return 0;
        };
        if now < due {
            return 0;
        }
        let interval = self.interval_ns();
        if interval == 0 {
            self.next_due = Some(now);
            return 1;
        }
        let steps = (now - due) / interval + 1;
        self.next_due = Some(due.saturating_add(steps.saturating_mul(interval)));
        steps
    }

    fn interval_ns(&self) -> u64 {
        self.interval.as_nanos().min(u64::MAX as u128) as u64
    }
}

/// Elapsed time since the last restart, on a caller-supplied clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stopwatch {
    started_at: u64,
}

impl Stopwatch {
    pub fn started_at(now: u64) -> Self {
        Self { started_at: now }
    }

    pub fn restart(&mut self, now: u64) {
        self.started_at = now;
    }

    pub fn elapsed(&self, now: u64) -> Duration {
        Duration::from_nanos(now.saturating_sub(self.started_at))
    }
}
