//! Clocks and the engine's timer queue.
//!
//! Times are durations since the Unix epoch so breakpoint creation
//! timestamps from the control plane can be compared against them.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Time source for expiry and throttling.
pub trait Clock: Send + Sync + 'static {
    /// Current time since the Unix epoch.
    fn now(&self) -> Duration;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}

/// Wall clock anchored at construction and advanced by tokio's clock, so a
/// paused tokio runtime also pauses the engine.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch_offset: Duration,
    start: tokio::time::Instant,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch_offset: StdClock.now(),
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.epoch_offset + self.start.elapsed()
    }
}

/// Deterministic clock for tests and simulations.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn starting_at(time: Duration) -> Self {
        let clock = Self::new();
        clock.set(time);
        clock
    }

    /// Advance time by `delta` and return the new time.
    pub fn advance(&self, delta: Duration) -> Duration {
        let mut now = self.now.lock();
        *now = now.saturating_add(delta);
        *now
    }

    pub fn set(&self, time: Duration) {
        *self.now.lock() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// One-shot timers ordered by deadline, then by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    queue: BTreeMap<(Duration, TimerId), E>,
    deadlines: FxHashMap<TimerId, Duration>,
    next_id: u64,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            deadlines: FxHashMap::default(),
            next_id: 0,
        }
    }
}

impl<E> TimerQueue<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Duration, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((deadline, id), event);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a pending timer; returns its event if it had not fired.
    pub fn cancel(&mut self, id: TimerId) -> Option<E> {
        let deadline = self.deadlines.remove(&id)?;
        self.queue.remove(&(deadline, id))
    }

    /// Remove and return every event due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Duration) -> Vec<E> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            due.push(entry.remove());
            self.deadlines.remove(&id);
        }
        due
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_events_come_out_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_secs(5), "late");
        timers.schedule(Duration::from_secs(1), "early");
        timers.schedule(Duration::from_secs(1), "early-second");
        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(1)));
        assert_eq!(timers.pop_due(Duration::from_secs(2)), vec!["early", "early-second"]);
        assert_eq!(timers.len(), 1);
        assert!(timers.pop_due(Duration::from_secs(4)).is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(Duration::from_secs(1), 1);
        assert_eq!(timers.cancel(id), Some(1));
        assert_eq!(timers.cancel(id), None);
        assert!(timers.pop_due(Duration::from_secs(10)).is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::starting_at(Duration::from_secs(100));
        let other = clock.clone();
        other.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(101_500));
    }
}
