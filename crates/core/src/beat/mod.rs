//! Converts song time into beat boundaries.
//!
//! The grid is absolute: beat `n` sits at `n * beat_interval_ms` from song
//! start. A boundary is reported once the clock is a full interval plus the
//! miss window past the last beat, so late inputs for that beat are still
//! judged against it.

use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use crate::{
    clock::{ClockSource, WallClock},
    config::{TimingConfig, MAX_BPM, MIN_BPM},
    input::{InputClass, InputEvent, InputRouter, ListenerHandle},
};

/// Inputs queued between two ticks.
pub type InputInbox = Rc<RefCell<VecDeque<InputEvent>>>;

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatFrame {
    pub time_ms: f64,
    pub last_beat_ms: f64,
    /// Set on the tick that crossed a beat boundary.
    pub crossed: bool,
    pub current_loop: u64,
    /// Travel of the moving note towards the hit line, `0.0..=1.0`.
    pub note_travel: f64,
    pub pulse: f64,
    /// The clock reached the end of the song.
    pub finished: bool,
}

/// Fraction of the interval a note has travelled since the last beat.
pub fn note_travel(elapsed_ms: f64, beat_interval_ms: f64) -> f64 {
    if beat_interval_ms <= 0.0 {
        return 0.0;
    }
    (elapsed_ms / beat_interval_ms).clamp(0.0, 1.0)
}

/// Decorative pulse: 1.0 on the beat, fading to 0.0 a quarter interval away.
pub fn pulse_amplitude(elapsed_ms: f64, beat_interval_ms: f64) -> f64 {
    if beat_interval_ms <= 0.0 {
        return 0.0;
    }
    let distance = (1.0 - elapsed_ms / beat_interval_ms).abs();
    (1.0 - distance * 4.0).clamp(0.0, 1.0)
}

pub struct BeatScheduler {
    clock: Option<Box<dyn ClockSource>>,
    is_playing: bool,
    last_beat_ms: f64,
    current_loop: u64,
    beat_interval_ms: f64,
    beats_per_loop: u32,
    miss_window_ms: f64,
    duration_ms: f64,
    inbox: InputInbox,
    subscriptions: Vec<ListenerHandle>,
}

impl BeatScheduler {
    pub fn new(timing: &TimingConfig) -> Self {
        let timing = timing.clamped();
        Self {
            clock: None,
            is_playing: false,
            last_beat_ms: 0.0,
            current_loop: 0,
            beat_interval_ms: timing.beat_interval_ms(),
            beats_per_loop: timing.beats_per_loop,
            miss_window_ms: timing.miss_window_ms,
            duration_ms: f64::INFINITY,
            inbox: Rc::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Builder-style variant of [`BeatScheduler::attach_clock`].
    pub fn with_clock(mut self, clock: impl ClockSource + 'static) -> Self {
        self.attach_clock(clock);
        self
    }

    pub fn attach_clock(&mut self, clock: impl ClockSource + 'static) {
        self.clock = Some(Box::new(clock));
    }

    /// Starts playback and subscribes to every input class on `router`.
    ///
    /// The song ends at the earlier of `duration_ms` and the clock's own
    /// duration. Without an attached clock the scheduler falls back to wall time.
    /// Starting twice replaces the earlier subscriptions.
    pub fn start(&mut self, bpm: f64, duration_ms: f64, router: &mut InputRouter) {
        if self.is_playing {
            self.stop(router);
        }

        if self.clock.is_none() {
            tracing::warn!("no audio clock attached, timing beats from wall time");
            self.clock = Some(Box::new(WallClock::start(duration_ms)));
        }

        let bpm = if bpm.is_finite() {
            bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            MIN_BPM
        };
        self.beat_interval_ms = (60_000.0 / bpm) * self.beats_per_loop as f64;
        let requested = if duration_ms > 0.0 { duration_ms } else { f64::INFINITY };
        self.duration_ms = requested.min(self.clock_duration_ms());
        self.current_loop = 0;

        let now = self.now_ms();
        self.last_beat_ms = self.grid_floor(now);
        self.inbox.borrow_mut().clear();

        for class in InputClass::ALL {
            let inbox = self.inbox.clone();
            let handle = router.register(class, move |event| inbox.borrow_mut().push_back(*event));
            self.subscriptions.push(handle);
        }

        self.is_playing = true;
        tracing::info!(
            bpm,
            beat_interval_ms = self.beat_interval_ms,
            last_beat_ms = self.last_beat_ms,
            "beat scheduler started"
        );
    }

    /// Samples the clock. Returns `None` while stopped.
    pub fn tick(&mut self, _dt_ms: f64) -> Option<BeatFrame> {
        if !self.is_playing {
            return None;
        }

        let now = self.now_ms();
        let mut crossed = false;

        if now < self.last_beat_ms {
            let reseeded = self.grid_floor(now);
            tracing::warn!(
                now,
                last_beat_ms = self.last_beat_ms,
                reseeded,
                "clock moved backwards, re-seeding beat grid"
            );
            self.last_beat_ms = reseeded;
        } else if now - self.last_beat_ms >= self.beat_interval_ms + self.miss_window_ms {
            let quantized = self.grid_at_or_before(now);
            let skipped = ((quantized - self.last_beat_ms) / self.beat_interval_ms).round() as i64 - 1;
            if skipped > 0 {
                tracing::debug!(skipped, "clock jumped over beat boundaries");
            }

            self.last_beat_ms = quantized;
            self.current_loop += 1;
            crossed = true;
            tracing::debug!(loop_index = self.current_loop, last_beat_ms = quantized, "beat boundary");
        }

        let elapsed = now - self.last_beat_ms;
        Some(BeatFrame {
            time_ms: now,
            last_beat_ms: self.last_beat_ms,
            crossed,
            current_loop: self.current_loop,
            note_travel: note_travel(elapsed, self.beat_interval_ms),
            pulse: pulse_amplitude(elapsed, self.beat_interval_ms),
            finished: now >= self.duration_ms,
        })
    }

    /// Stops playback and drops this scheduler's router subscriptions.
    /// Calling it again is a no-op.
    pub fn stop(&mut self, router: &mut InputRouter) {
        for handle in self.subscriptions.drain(..) {
            router.unregister(handle);
        }

        if self.is_playing {
            self.is_playing = false;
            tracing::info!(loops = self.current_loop, "beat scheduler stopped");
        }
        self.inbox.borrow_mut().clear();
    }

    /// Takes every input queued since the last call, oldest first.
    pub fn drain_inputs(&mut self) -> Vec<InputEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn last_beat_ms(&self) -> f64 {
        self.last_beat_ms
    }

    pub fn current_loop(&self) -> u64 {
        self.current_loop
    }

    pub fn beat_interval_ms(&self) -> f64 {
        self.beat_interval_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Current clock reading, or 0.0 when no clock is attached yet.
    pub fn now_ms(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, |clock| clock.current_time_ms())
    }

    /// Song length reported by the attached clock.
    pub fn clock_duration_ms(&self) -> f64 {
        self.clock.as_ref().map_or(f64::INFINITY, |clock| clock.duration_ms())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn grid_floor(&self, time_ms: f64) -> f64 {
        (time_ms / self.beat_interval_ms).floor().max(0.0) * self.beat_interval_ms
    }

    /// Nearest grid point that has already happened at `time_ms`.
    fn grid_at_or_before(&self, time_ms: f64) -> f64 {
        let nearest = (time_ms / self.beat_interval_ms).round() * self.beat_interval_ms;
        if nearest > time_ms {
            nearest - self.beat_interval_ms
        } else {
            nearest
        }
    }
}

impl fmt::Debug for BeatScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeatScheduler")
            .field("has_clock", &self.clock.is_some())
            .field("is_playing", &self.is_playing)
            .field("last_beat_ms", &self.last_beat_ms)
            .field("current_loop", &self.current_loop)
            .field("beat_interval_ms", &self.beat_interval_ms)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
