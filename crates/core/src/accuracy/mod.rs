use serde::{Deserialize, Serialize};

use crate::config::TimingConfig;

// Only absorbs float representation error in window / interval, e.g. 100.0 / 2000.0.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Timing grade. Ordering follows reward: `Miss < Good < Perfect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccuracyRating {
    Miss,
    Good,
    Perfect,
}

impl AccuracyRating {
    /// Weight used by the accuracy percentage.
    pub fn weight(self) -> f64 {
        match self {
            AccuracyRating::Perfect => 1.0,
            AccuracyRating::Good => 0.5,
            AccuracyRating::Miss => 0.0,
        }
    }

    pub fn is_hit(self) -> bool {
        self != AccuracyRating::Miss
    }
}

/// Judgement windows in absolute milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingWindows {
    pub perfect_ms: f64,
    pub good_ms: f64,
    pub miss_ms: f64,
}

impl From<&TimingConfig> for TimingWindows {
    fn from(config: &TimingConfig) -> Self {
        Self {
            perfect_ms: config.perfect_window_ms,
            good_ms: config.good_window_ms,
            miss_ms: config.miss_window_ms,
        }
    }
}

/// Result of classifying one input against the beat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub rating: AccuracyRating,
    /// Fraction of the beat interval elapsed since the last beat; 1.0 is on-beat.
    pub progress: f64,
    /// `|1.0 - progress|`.
    pub distance: f64,
    /// Signed offset from the beat in milliseconds, positive when late.
    pub error_ms: f64,
    /// Set when the rating was forced by pattern state rather than timing.
    pub structural: bool,
}

/// Fraction of `beat_interval_ms` elapsed since `last_beat_ms`.
pub fn beat_progress(current_ms: f64, last_beat_ms: f64, beat_interval_ms: f64) -> f64 {
    if beat_interval_ms <= 0.0 {
        return 0.0;
    }
    (current_ms - last_beat_ms) / beat_interval_ms
}

/// Classifies inputs by their distance to the next beat.
///
/// Windows are absolute milliseconds; they are divided by the beat interval
/// and compared against the beat-normalised distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyEvaluator {
    windows: TimingWindows,
}

impl AccuracyEvaluator {
    pub fn new(windows: TimingWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> TimingWindows {
        self.windows
    }

    pub fn classify(&self, current_ms: f64, last_beat_ms: f64, beat_interval_ms: f64) -> Judgement {
        if beat_interval_ms <= 0.0 {
            tracing::warn!(beat_interval_ms, "classifying against a non-positive beat interval");
            return Judgement {
                rating: AccuracyRating::Miss,
                progress: 0.0,
                distance: f64::INFINITY,
                error_ms: f64::INFINITY,
                structural: false,
            };
        }

        let progress = beat_progress(current_ms, last_beat_ms, beat_interval_ms);
        let distance = (1.0 - progress).abs();

        let rating = if distance <= self.windows.perfect_ms / beat_interval_ms + BOUNDARY_EPSILON {
            AccuracyRating::Perfect
        } else if distance <= self.windows.good_ms / beat_interval_ms + BOUNDARY_EPSILON {
            AccuracyRating::Good
        } else {
            AccuracyRating::Miss
        };

        Judgement {
            rating,
            progress,
            distance,
            error_ms: (progress - 1.0) * beat_interval_ms,
            structural: false,
        }
    }

    /// Classifies a sync input. Until the directional part of the pattern is
    /// complete the result is a MISS whatever the timing.
    pub fn classify_sync(
        &self,
        current_ms: f64,
        last_beat_ms: f64,
        beat_interval_ms: f64,
        current_notes: usize,
        required_notes: usize,
    ) -> Judgement {
        let judgement = self.classify(current_ms, last_beat_ms, beat_interval_ms);
        if current_notes >= required_notes {
            judgement
        } else {
            Judgement {
                rating: AccuracyRating::Miss,
                structural: true,
                ..judgement
            }
        }
    }
}
