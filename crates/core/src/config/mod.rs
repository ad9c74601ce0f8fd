use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{sequencer::LevelSequenceDescriptor, Result, RhythmError};

pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 200.0;
pub const MIN_BEATS_PER_LOOP: u32 = 1;
pub const MAX_BEATS_PER_LOOP: u32 = 8;

/// Top-level configuration for one play session.
///
/// Every section falls back to its defaults when omitted, so a configuration
/// file only needs to name the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub input: InputConfig,
    pub pool: PoolConfig,
    pub scoring: ScoringConfig,
    pub sequence: SequenceConfig,
    /// Seed for pattern generation. `None` draws a fresh seed per session.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Clamps the tempo options into their supported ranges and rejects
    /// combinations that cannot be played.
    pub fn validated(mut self) -> Result<Self> {
        self.timing = self.timing.clamped();
        self.timing.check_windows()?;

        if self.pool.expand_amount == 0 {
            return Err(RhythmError::config("pool.expand_amount must be at least 1"));
        }

        if self.sequence.table.is_empty() {
            return Err(RhythmError::config("sequence.table must not be empty"));
        }

        if self.sequence.table.iter().all(|entry| entry.loop_count == 0) {
            return Err(RhythmError::config(
                "sequence.table needs at least one entry with a non-zero loop_count",
            ));
        }

        if self.scoring.max_combo_multiplier < 1.0 || self.scoring.max_pattern_multiplier < 1.0 {
            return Err(RhythmError::config("score multipliers must not drop below 1.0"));
        }

        Ok(self)
    }

    pub fn beat_interval_ms(&self) -> f64 {
        self.timing.beat_interval_ms()
    }
}

/// Tempo and judgement windows. Windows are absolute milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub bpm: f64,
    pub beats_per_loop: u32,
    pub perfect_window_ms: f64,
    pub good_window_ms: f64,
    pub miss_window_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_loop: 4,
            perfect_window_ms: 50.0,
            good_window_ms: 100.0,
            miss_window_ms: 150.0,
        }
    }
}

impl TimingConfig {
    /// Returns a copy with `bpm` and `beats_per_loop` forced into range.
    pub fn clamped(&self) -> Self {
        let bpm = if self.bpm.is_finite() {
            self.bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            MIN_BPM
        };

        Self {
            bpm,
            beats_per_loop: self.beats_per_loop.clamp(MIN_BEATS_PER_LOOP, MAX_BEATS_PER_LOOP),
            ..self.clone()
        }
    }

    /// Length of one loop in milliseconds. The scheduler treats a whole loop
    /// as one beat boundary.
    pub fn beat_interval_ms(&self) -> f64 {
        let clamped = self.clamped();
        (60_000.0 / clamped.bpm) * clamped.beats_per_loop as f64
    }

    fn check_windows(&self) -> Result<()> {
        let windows = [
            ("perfect_window_ms", self.perfect_window_ms),
            ("good_window_ms", self.good_window_ms),
            ("miss_window_ms", self.miss_window_ms),
        ];

        for (name, value) in windows {
            if !value.is_finite() || value <= 0.0 {
                return Err(RhythmError::config(format!(
                    "{name} must be a positive number of milliseconds, got {value}"
                )));
            }
        }

        if self.perfect_window_ms > self.good_window_ms || self.good_window_ms > self.miss_window_ms {
            return Err(RhythmError::config(format!(
                "timing windows must satisfy perfect <= good <= miss, got {} / {} / {}",
                self.perfect_window_ms, self.good_window_ms, self.miss_window_ms
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Minimum spacing between two accepted inputs of the same class.
    pub debounce_ms: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { debounce_ms: 100.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Tokens created up front for each note kind.
    pub initial_size: usize,
    /// Tokens added to a kind's free list when it runs dry.
    pub expand_amount: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 20,
            expand_amount: 10,
        }
    }
}

/// Scoring tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub perfect_score: u64,
    pub good_score: u64,
    pub combo_multiplier_increment: f64,
    pub max_combo_multiplier: f64,
    /// Points removed on every MISS, saturating at zero. Zero disables the penalty.
    pub combo_break_penalty: u64,
    /// Per-note value of a pattern, multiplied by its complexity.
    pub pattern_note_score: u64,
    pub perfect_sync_bonus: f64,
    pub pattern_multiplier_step: f64,
    pub max_pattern_multiplier: f64,
    pub finish_bonus: f64,
    /// Flat bonus per pattern of streak beyond the first.
    pub streak_bonus: u64,
    pub experience: ExperienceWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_score: 100,
            good_score: 50,
            combo_multiplier_increment: 0.1,
            max_combo_multiplier: 3.0,
            combo_break_penalty: 0,
            pattern_note_score: 50,
            perfect_sync_bonus: 1.5,
            pattern_multiplier_step: 0.1,
            max_pattern_multiplier: 3.0,
            finish_bonus: 2.0,
            streak_bonus: 10,
            experience: ExperienceWeights::default(),
        }
    }
}

/// Divisors and per-event constants used for the post-session experience figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceWeights {
    pub score_divisor: f64,
    pub accuracy_divisor: f64,
    pub combo_divisor: f64,
    pub per_pattern: u64,
    pub per_finish_move: u64,
}

impl Default for ExperienceWeights {
    fn default() -> Self {
        Self {
            score_divisor: 100.0,
            accuracy_divisor: 10.0,
            combo_divisor: 10.0,
            per_pattern: 5,
            per_finish_move: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Sequencer advances without new patterns after a miss.
    pub penalty_loops: u32,
    /// Horizontal distance between neighbouring notes of a pattern.
    pub note_spacing: f32,
    pub table: Vec<LevelSequenceDescriptor>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            penalty_loops: 2,
            note_spacing: 80.0,
            table: LevelSequenceDescriptor::default_table(),
        }
    }
}
