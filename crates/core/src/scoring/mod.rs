use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{accuracy::AccuracyRating, config::ScoringConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyCounts {
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
}

impl AccuracyCounts {
    pub fn total(&self) -> u32 {
        self.perfect + self.good + self.miss
    }

    fn record(&mut self, rating: AccuracyRating) {
        match rating {
            AccuracyRating::Perfect => self.perfect += 1,
            AccuracyRating::Good => self.good += 1,
            AccuracyRating::Miss => self.miss += 1,
        }
    }
}

/// Running score for one session. Only [`ScoringEngine`] mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub total_score: u64,
    pub current_combo: u32,
    pub max_combo: u32,
    pub pattern_multiplier: f64,
    pub accuracy_counts: AccuracyCounts,
    /// Consecutive successful non-finish patterns.
    pub pattern_streak: u32,
    pub patterns_completed: u32,
    pub patterns_failed: u32,
    pub finish_moves: u32,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            total_score: 0,
            current_combo: 0,
            max_combo: 0,
            pattern_multiplier: 1.0,
            accuracy_counts: AccuracyCounts::default(),
            pattern_streak: 0,
            patterns_completed: 0,
            patterns_failed: 0,
            finish_moves: 0,
        }
    }
}

/// Outcome of [`ScoringEngine::record_note`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteAward {
    pub rating: AccuracyRating,
    pub points: u64,
    pub combo: u32,
    pub combo_multiplier: f64,
    /// Points taken away by the miss penalty.
    pub penalty: u64,
}

/// Outcome of [`ScoringEngine::complete_pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternAward {
    pub points: u64,
    /// Pattern multiplier that was applied, before this pattern raised it.
    pub pattern_multiplier: f64,
    pub streak_bonus: u64,
    pub finish: bool,
}

/// Letter grade derived from the accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    F,
    D,
    C,
    B,
    A,
    S,
}

impl Grade {
    pub fn from_accuracy(accuracy: f64) -> Self {
        match accuracy {
            a if a >= 95.0 => Grade::S,
            a if a >= 90.0 => Grade::A,
            a if a >= 80.0 => Grade::B,
            a if a >= 70.0 => Grade::C,
            a if a >= 60.0 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Accumulates note and pattern results into score, combo and multipliers.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    state: ScoreState,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            state: ScoreState::default(),
        }
    }

    pub fn reset(&mut self) {
        self.state = ScoreState::default();
    }

    pub fn state(&self) -> &ScoreState {
        &self.state
    }

    /// Scores one graded note.
    ///
    /// Hits earn their base score times the combo multiplier; a MISS earns
    /// nothing and resets the combo.
    pub fn record_note(&mut self, rating: AccuracyRating) -> NoteAward {
        self.state.accuracy_counts.record(rating);

        let base = match rating {
            AccuracyRating::Perfect => self.config.perfect_score,
            AccuracyRating::Good => self.config.good_score,
            AccuracyRating::Miss => return self.break_combo(),
        };

        self.state.current_combo += 1;
        self.state.max_combo = self.state.max_combo.max(self.state.current_combo);

        let combo_multiplier = self.combo_multiplier();
        let points = (base as f64 * combo_multiplier).floor() as u64;
        self.state.total_score += points;

        NoteAward {
            rating,
            points,
            combo: self.state.current_combo,
            combo_multiplier,
            penalty: 0,
        }
    }

    /// Awards a pattern whose sync input landed with `sync_rating`.
    pub fn complete_pattern(
        &mut self,
        complexity: usize,
        sync_rating: AccuracyRating,
        finish: bool,
    ) -> PatternAward {
        let mut value = complexity as f64 * self.config.pattern_note_score as f64;
        if sync_rating == AccuracyRating::Perfect {
            value *= self.config.perfect_sync_bonus;
        }

        let pattern_multiplier = self.state.pattern_multiplier;
        value *= pattern_multiplier;

        let mut streak_bonus = 0;
        if finish {
            value *= self.config.finish_bonus;
            self.state.finish_moves += 1;
        } else {
            self.state.pattern_streak += 1;
            streak_bonus = self.config.streak_bonus * u64::from(self.state.pattern_streak - 1);
        }

        let points = value.floor() as u64 + streak_bonus;
        self.state.total_score += points;
        self.state.patterns_completed += 1;
        self.state.pattern_multiplier = (pattern_multiplier + self.config.pattern_multiplier_step)
            .min(self.config.max_pattern_multiplier);

        tracing::debug!(complexity, ?sync_rating, finish, points, "pattern completed");

        PatternAward {
            points,
            pattern_multiplier,
            streak_bonus,
            finish,
        }
    }

    pub fn fail_pattern(&mut self) {
        self.state.pattern_multiplier = 1.0;
        self.state.pattern_streak = 0;
        self.state.patterns_failed += 1;
    }

    /// Weighted accuracy over every graded note, 0–100.
    pub fn accuracy_percentage(&self) -> f64 {
        let counts = &self.state.accuracy_counts;
        let total = counts.total();
        if total == 0 {
            return 0.0;
        }

        let weighted = counts.perfect as f64 * AccuracyRating::Perfect.weight()
            + counts.good as f64 * AccuracyRating::Good.weight()
            + counts.miss as f64 * AccuracyRating::Miss.weight();

        weighted / total as f64 * 100.0
    }

    pub fn grade(&self) -> Grade {
        Grade::from_accuracy(self.accuracy_percentage())
    }

    /// Post-session experience. Reporting only; gameplay never reads it.
    pub fn experience(&self) -> u64 {
        let weights = &self.config.experience;
        let from_score = (self.state.total_score as f64 / weights.score_divisor).floor() as u64;
        let from_accuracy = (self.accuracy_percentage() / weights.accuracy_divisor).floor() as u64;
        let from_combo = (self.state.max_combo as f64 / weights.combo_divisor).floor() as u64;

        from_score
            + from_accuracy
            + from_combo
            + weights.per_pattern * u64::from(self.state.patterns_completed)
            + weights.per_finish_move * u64::from(self.state.finish_moves)
    }

    fn combo_multiplier(&self) -> f64 {
        let steps = self.state.current_combo.saturating_sub(1) as f64;
        1.0 + (self.config.max_combo_multiplier - 1.0).min(self.config.combo_multiplier_increment * steps)
    }

    fn break_combo(&mut self) -> NoteAward {
        let mut penalty = 0;
        if self.config.combo_break_penalty > 0 {
            penalty = self.config.combo_break_penalty.min(self.state.total_score);
            self.state.total_score -= penalty;
        }
        self.state.current_combo = 0;

        NoteAward {
            rating: AccuracyRating::Miss,
            points: 0,
            combo: 0,
            combo_multiplier: 1.0,
            penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig::default())
    }

    #[test]
    fn combo_multiplier_grows_and_caps() {
        let mut scoring = engine();
        let awards: Vec<u64> = (0..25)
            .map(|_| scoring.record_note(AccuracyRating::Perfect).points)
            .collect();

        assert_eq!(&awards[..3], &[100, 110, 120]);
        // 1 + min(2.0, 0.1 * 24) caps at 3.0
        assert_eq!(awards[24], 300);
        assert_eq!(scoring.state().max_combo, 25);
    }

    #[test]
    fn multiplier_is_floored() {
        let mut scoring = engine();
        scoring.record_note(AccuracyRating::Perfect);
        let award = scoring.record_note(AccuracyRating::Good);
        // 50 * 1.1 = 55.000000000000007
        assert_eq!(award.points, 55);
    }

    #[test]
    fn score_never_drops_without_penalty() {
        let mut scoring = engine();
        let ratings = [
            AccuracyRating::Perfect,
            AccuracyRating::Good,
            AccuracyRating::Miss,
            AccuracyRating::Good,
            AccuracyRating::Miss,
            AccuracyRating::Perfect,
        ];

        let mut previous = 0;
        for rating in ratings {
            let award = scoring.record_note(rating);
            assert!(scoring.state().total_score >= previous);
            if rating == AccuracyRating::Miss {
                assert_eq!(award.points, 0);
                assert_eq!(scoring.state().current_combo, 0);
            }
            previous = scoring.state().total_score;
        }
    }

    #[test]
    fn combo_break_penalty_saturates() {
        let mut scoring = ScoringEngine::new(ScoringConfig {
            combo_break_penalty: 500,
            ..ScoringConfig::default()
        });

        scoring.record_note(AccuracyRating::Perfect);
        let award = scoring.record_note(AccuracyRating::Miss);
        assert_eq!(award.penalty, 100);
        assert_eq!(scoring.state().total_score, 0);

        let award = scoring.record_note(AccuracyRating::Miss);
        assert_eq!(award.penalty, 0);
        assert_eq!(scoring.state().total_score, 0);
    }

    #[test]
    fn penalty_applies_on_every_miss() {
        let mut scoring = ScoringEngine::new(ScoringConfig {
            combo_break_penalty: 30,
            ..ScoringConfig::default()
        });

        scoring.record_note(AccuracyRating::Perfect);
        scoring.record_note(AccuracyRating::Miss);
        assert_eq!(scoring.state().total_score, 70);

        let award = scoring.record_note(AccuracyRating::Miss);
        assert_eq!(award.penalty, 30);
        assert_eq!(scoring.state().total_score, 40);
    }

    #[test]
    fn perfect_sync_pattern_awards_225_for_three_notes() {
        let mut scoring = engine();
        let award = scoring.complete_pattern(3, AccuracyRating::Perfect, false);

        assert_eq!(award.points, 225);
        assert_eq!(award.streak_bonus, 0);
        assert_relative_eq!(scoring.state().pattern_multiplier, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn streak_bonus_and_multiplier_reset() {
        let mut scoring = engine();
        scoring.complete_pattern(2, AccuracyRating::Good, false);
        let second = scoring.complete_pattern(2, AccuracyRating::Good, false);

        // 100 * 1.1 floored, plus 10 for a streak of two
        assert_eq!(second.points, 110 + 10);

        scoring.fail_pattern();
        assert_eq!(scoring.state().pattern_multiplier, 1.0);
        assert_eq!(scoring.state().pattern_streak, 0);
        assert_eq!(scoring.state().patterns_failed, 1);
    }

    #[test]
    fn finish_patterns_use_the_finish_bonus() {
        let mut scoring = engine();
        let award = scoring.complete_pattern(7, AccuracyRating::Perfect, true);

        assert_eq!(award.points, 1050);
        assert!(award.finish);
        assert_eq!(scoring.state().finish_moves, 1);
        assert_eq!(scoring.state().pattern_streak, 0);
    }

    #[test]
    fn accuracy_is_weighted() {
        let mut scoring = engine();
        scoring.record_note(AccuracyRating::Perfect);
        scoring.record_note(AccuracyRating::Good);
        scoring.record_note(AccuracyRating::Miss);
        scoring.record_note(AccuracyRating::Perfect);

        assert_relative_eq!(scoring.accuracy_percentage(), 62.5);
        assert_eq!(scoring.grade(), Grade::D);
    }

    #[test]
    fn experience_combines_all_terms() {
        let mut scoring = engine();
        for _ in 0..10 {
            scoring.record_note(AccuracyRating::Perfect);
        }
        scoring.complete_pattern(3, AccuracyRating::Perfect, false);
        scoring.complete_pattern(4, AccuracyRating::Perfect, true);

        let state = scoring.state().clone();
        // notes: 100+110+...+190 = 1450; patterns: 225 + floor(4*50*1.5*1.1*2) = 225 + 660
        assert_eq!(state.total_score, 1450 + 225 + 660);
        // 23 + 10 + 1 + 2 * 5 + 1 * 20
        assert_eq!(scoring.experience(), 64);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut scoring = engine();
        scoring.record_note(AccuracyRating::Good);
        scoring.complete_pattern(3, AccuracyRating::Good, false);
        scoring.reset();
        assert_eq!(*scoring.state(), ScoreState::default());
        assert_eq!(scoring.accuracy_percentage(), 0.0);
    }
}
