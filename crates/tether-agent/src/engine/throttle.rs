//! Per-logpoint rate limit over one-second windows.

use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Emit the message.
    Emit,
    /// Emit the message, then stop listening: the window is now full.
    EmitAndEngage,
    /// The window is already full; drop the hit and stop listening.
    Drop,
}

#[derive(Debug, Clone)]
pub(crate) struct LogThrottle {
    max_per_window: u32,
    window_end: Duration,
    count: u32,
}

impl LogThrottle {
    pub(crate) fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window_end: Duration::ZERO,
            count: 0,
        }
    }

    pub(crate) fn admit(&mut self, now: Duration) -> Admission {
        if now >= self.window_end {
            self.count = 0;
            self.window_end = now + WINDOW;
        }
        if self.count >= self.max_per_window {
            return Admission::Drop;
        }
        self.count += 1;
        if self.count >= self.max_per_window {
            Admission::EmitAndEngage
        } else {
            Admission::Emit
        }
    }
}
