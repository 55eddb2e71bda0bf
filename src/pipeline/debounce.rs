use std::time::{Duration, Instant};

/// Trailing-edge debounce: a burst of triggers fires once, `wait` after
/// the last trigger of the burst.
#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    wait: Duration,
    deadline: Option<Instant>,
}

impl ScanDebouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
        }
    }

    /// Record a trigger, pushing the deadline back.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.wait);
    }

    /// Whether the burst has settled; consumes the pending trigger.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}
