//! Tunable timing thresholds and the clock they are measured against.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;
use web_time::Instant;

/// Timing windows for the selection heuristics.
///
/// None of these are contractual. They trade responsiveness against the
/// chance of misreading a browser-initiated selection change.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewConfig {
    /// How long a pointer or key origin tag applies to selection reads.
    pub selection_origin_window_ms: u64,
    /// How long native selection changes are ignored after a write.
    pub suppress_selection_window_ms: u64,
    /// How soon after focus a reset-to-start selection is distrusted.
    pub focus_reset_window_ms: u64,
    /// Pointer or touch activity within this window disables the focus
    /// reset override.
    pub pointer_quiet_window_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            selection_origin_window_ms: 50,
            suppress_selection_window_ms: 50,
            focus_reset_window_ms: 200,
            pointer_quiet_window_ms: 300,
        }
    }
}

impl ViewConfig {
    pub fn selection_origin_window(&self) -> Duration {
        Duration::from_millis(self.selection_origin_window_ms)
    }

    pub fn suppress_selection_window(&self) -> Duration {
        Duration::from_millis(self.suppress_selection_window_ms)
    }

    pub fn focus_reset_window(&self) -> Duration {
        Duration::from_millis(self.focus_reset_window_ms)
    }

    pub fn pointer_quiet_window(&self) -> Duration {
        Duration::from_millis(self.pointer_quiet_window_ms)
    }
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock, backed by `performance.now()` on the web.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock(Rc<Cell<Instant>>);

impl Default for ManualClock {
    fn default() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

/// Whether `then` happened within `window` of `now`.
pub(crate) fn within(now: Instant, then: Option<Instant>, window: Duration) -> bool {
    then.is_some_and(|then| now.saturating_duration_since(then) < window)
}
