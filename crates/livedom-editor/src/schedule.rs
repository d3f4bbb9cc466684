//! Deferred work driven by caller-supplied timestamps.
//!
//! Nothing here reads a clock. The session passes `now_ms` into every call
//! so bursts can be coalesced and retries bounded deterministically.

/// Trailing-edge debouncer. Every `schedule` pushes the deadline back by
/// the full interval; `poll` releases all pending keys once the deadline
/// has passed with no further scheduling.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    interval_ms: u64,
    deadline: Option<u64>,
    pending: Vec<T>,
}

impl<T: PartialEq> Debouncer<T> {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            deadline: None,
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, key: T, now_ms: u64) {
        if !self.pending.contains(&key) {
            self.pending.push(key);
        }
        self.deadline = Some(now_ms.saturating_add(self.interval_ms));
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Keys due at `now_ms`, in first-scheduled order. Empty if the burst
    /// has not settled yet.
    pub fn poll(&mut self, now_ms: u64) -> Vec<T> {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                std::mem::take(&mut self.pending)
            }
            _ => Vec::new(),
        }
    }
}

/// Bounded periodic retry that stops after the first success.
#[derive(Debug, Clone)]
pub struct RetryPoll {
    interval_ms: u64,
    max_attempts: u32,
    attempts: u32,
    next_at: Option<u64>,
}

impl RetryPoll {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
            attempts: 0,
            next_at: None,
        }
    }

    /// Start (or restart) polling; the first attempt is due immediately.
    pub fn start(&mut self, now_ms: u64) {
        self.attempts = 0;
        self.next_at = Some(now_ms);
    }

    pub fn is_active(&self) -> bool {
        self.next_at.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_at.is_some_and(|t| now_ms >= t)
    }

    /// Record the outcome of an attempt made at `now_ms`.
    pub fn record(&mut self, succeeded: bool, now_ms: u64) {
        self.attempts += 1;
        if succeeded {
            self.next_at = None;
        } else if self.attempts >= self.max_attempts {
            log::warn!("giving up after {} attempts", self.attempts);
            self.next_at = None;
        } else {
            self.next_at = Some(now_ms.saturating_add(self.interval_ms));
        }
    }
}
