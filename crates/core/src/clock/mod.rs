use std::{cell::Cell, fmt, rc::Rc, time::Instant};

/// Source of song time. Audio backends implement this; the core only reads it.
///
/// Readings must be monotonic while playing and stable while paused. Callers
/// compare readings and never assume a fixed step between them.
pub trait ClockSource {
    /// Milliseconds since the start of the song.
    fn current_time_ms(&self) -> f64;

    /// Length of the song in milliseconds. Unknown lengths report `f64::INFINITY`.
    fn duration_ms(&self) -> f64;
}

/// Clock driven explicitly by the caller.
///
/// Clones share the same underlying time, so a test or a headless driver can
/// keep one handle while the session owns another.
#[derive(Clone, Default)]
pub struct ManualClock {
    time_ms: Rc<Cell<f64>>,
    duration_ms: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            time_ms: Rc::new(Cell::new(0.0)),
            duration_ms: Rc::new(Cell::new(duration_ms)),
        }
    }

    pub fn reset(&self) {
        self.time_ms.set(0.0);
    }

    /// Moves the clock forward. Negative deltas are ignored.
    pub fn advance(&self, delta_ms: f64) {
        self.time_ms.set(self.time_ms.get() + delta_ms.max(0.0));
    }

    /// Jumps to an arbitrary position, backwards included.
    pub fn seek(&self, time_ms: f64) {
        self.time_ms.set(time_ms);
    }

    pub fn set_duration(&self, duration_ms: f64) {
        self.duration_ms.set(duration_ms);
    }
}

impl ClockSource for ManualClock {
    fn current_time_ms(&self) -> f64 {
        self.time_ms.get()
    }

    fn duration_ms(&self) -> f64 {
        self.duration_ms.get()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("time_ms", &self.time_ms.get())
            .field("duration_ms", &self.duration_ms.get())
            .finish()
    }
}

/// Wall-clock fallback used when no audio clock is attached.
#[derive(Debug, Clone)]
pub struct WallClock {
    started: Instant,
    duration_ms: f64,
}

impl WallClock {
    pub fn start(duration_ms: f64) -> Self {
        Self {
            started: Instant::now(),
            duration_ms,
        }
    }
}

impl ClockSource for WallClock {
    fn current_time_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}
