/// A cancellable periodic schedule measured against session time.
///
/// Nothing sleeps here: the owner polls [`Cadence::due`] with the current
/// timestamp (frame time on the coordinator thread) and runs its activity
/// when it fires. Missed periods are skipped, not replayed.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval_us: u64,
    next_due_us: u64,
    cancelled: bool,
}

impl Cadence {
    /// First fires one full interval after `start_us`.
    pub fn new(interval_us: u64, start_us: u64) -> Self {
        Self {
            interval_us: interval_us.max(1),
            next_due_us: start_us.saturating_add(interval_us.max(1)),
            cancelled: false,
        }
    }

    pub fn due(&mut self, now_us: u64) -> bool {
        if self.cancelled || now_us < self.next_due_us {
            return false;
        }
        let behind = (now_us - self.next_due_us) / self.interval_us;
        self.next_due_us += (behind + 1) * self.interval_us;
        true
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn interval_us(&self) -> u64 {
        self.interval_us
    }

    pub fn next_due_us(&self) -> u64 {
        self.next_due_us
    }
}
