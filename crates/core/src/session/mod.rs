//! One play session: every component constructed once and wired explicitly.
//!
//! Per frame the session samples the beat scheduler, advances the sequencer on
//! a beat boundary and only then evaluates inputs queued since the previous
//! frame, so inputs always meet the freshest pattern.

use std::fmt;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    accuracy::{AccuracyEvaluator, AccuracyRating, TimingWindows},
    beat::{BeatFrame, BeatScheduler},
    clock::ClockSource,
    config::GameConfig,
    input::{InputClass, InputEvent, InputRouter},
    pool::{NoteFactory, NotePool, PoolStats},
    presentation::PresentationSink,
    scoring::{AccuracyCounts, Grade, NoteAward, ScoringEngine},
    sequencer::{DirectionOutcome, LevelSequencer, SequencerEvent},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Playing,
    Finished,
}

/// End-of-session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub seed: u64,
    pub total_score: u64,
    pub max_combo: u32,
    pub accuracy: f64,
    pub grade: Grade,
    pub experience: u64,
    pub counts: AccuracyCounts,
    pub patterns_completed: u32,
    pub patterns_failed: u32,
    pub finish_moves: u32,
    pub loops: u64,
    pub level: u32,
    pub pool: PoolStats,
}

pub struct GameSession {
    config: GameConfig,
    router: InputRouter,
    pool: NotePool,
    scheduler: BeatScheduler,
    sequencer: LevelSequencer,
    evaluator: AccuracyEvaluator,
    scoring: ScoringEngine,
    sink: Option<Box<dyn PresentationSink>>,
    seed: u64,
    rng: StdRng,
    state: SessionState,
}

impl GameSession {
    /// Validates `config` and builds every component from it.
    pub fn new(config: GameConfig) -> Result<Self> {
        let config = config.validated()?;
        let seed = config.seed.unwrap_or_else(rand::random);

        Ok(Self {
            router: InputRouter::new(&config.input),
            pool: NotePool::new(&config.pool),
            scheduler: BeatScheduler::new(&config.timing),
            sequencer: LevelSequencer::new(
                config.sequence.table.clone(),
                config.sequence.penalty_loops,
                config.sequence.note_spacing,
            ),
            evaluator: AccuracyEvaluator::new(TimingWindows::from(&config.timing)),
            scoring: ScoringEngine::new(config.scoring.clone()),
            sink: None,
            seed,
            rng: StdRng::seed_from_u64(seed),
            state: SessionState::Idle,
            config,
        })
    }

    pub fn with_clock(mut self, clock: impl ClockSource + 'static) -> Self {
        self.scheduler.attach_clock(clock);
        self
    }

    pub fn with_sink(mut self, sink: impl PresentationSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replaces the pool with one whose tokens come from `factory`.
    pub fn with_note_factory(mut self, factory: Box<dyn NoteFactory>) -> Self {
        self.pool = NotePool::with_factory(&self.config.pool, factory);
        self
    }

    /// Resets all state and starts the beat clock. Restarting a running
    /// session is allowed and replays the same seed.
    pub fn start(&mut self) {
        self.scheduler.stop(&mut self.router);
        self.sequencer.reset(&mut self.pool);
        self.pool.release_all();
        self.scoring.reset();
        self.router.reset_debounce();
        self.rng = StdRng::seed_from_u64(self.seed);

        let duration_ms = self.scheduler.clock_duration_ms();
        self.scheduler
            .start(self.config.timing.bpm, duration_ms, &mut self.router);
        self.state = SessionState::Playing;

        tracing::info!(seed = self.seed, duration_ms, "session started");

        let level = self.sequencer.level();
        let kind = self.sequencer.descriptor().kind;
        self.notify(|sink| {
            sink.on_ready();
            sink.on_level_changed(level, kind);
            sink.on_score_update(0);
            sink.on_combo_update(0);
        });
    }

    pub fn restart(&mut self) {
        self.start();
    }

    /// Runs one frame. Returns `None` unless the session is playing.
    pub fn tick(&mut self, dt_ms: f64) -> Option<BeatFrame> {
        if self.state != SessionState::Playing {
            return None;
        }

        let frame = self.scheduler.tick(dt_ms)?;

        if frame.crossed {
            let events = self.sequencer.advance(&mut self.pool, &mut self.rng);
            for event in events {
                self.apply_sequencer_event(event);
            }
        }

        for input in self.scheduler.drain_inputs() {
            self.evaluate_input(input);
        }

        if frame.finished {
            tracing::info!(time_ms = frame.time_ms, "song finished");
            self.stop();
        }

        Some(frame)
    }

    /// Device input. Returns whether the router accepted it.
    pub fn handle_input(&mut self, class: InputClass, time_ms: f64) -> bool {
        self.router.handle(class, time_ms)
    }

    /// Automated input, bypassing debounce.
    pub fn simulate_input(&mut self, class: InputClass, time_ms: f64) {
        self.router.simulate(class, time_ms);
    }

    /// Stops the beat clock and detaches from the router. Idempotent.
    pub fn stop(&mut self) {
        self.scheduler.stop(&mut self.router);
        if self.state == SessionState::Playing {
            self.state = SessionState::Finished;
            tracing::info!(score = self.scoring.state().total_score, "session stopped");
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let score = self.scoring.state();
        SessionSummary {
            seed: self.seed,
            total_score: score.total_score,
            max_combo: score.max_combo,
            accuracy: self.scoring.accuracy_percentage(),
            grade: self.scoring.grade(),
            experience: self.scoring.experience(),
            counts: score.accuracy_counts,
            patterns_completed: score.patterns_completed,
            patterns_failed: score.patterns_failed,
            finish_moves: score.finish_moves,
            loops: self.scheduler.current_loop(),
            level: self.sequencer.level(),
            pool: self.pool.stats(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn now_ms(&self) -> f64 {
        self.scheduler.now_ms()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut InputRouter {
        &mut self.router
    }

    pub fn pool(&self) -> &NotePool {
        &self.pool
    }

    pub fn scheduler(&self) -> &BeatScheduler {
        &self.scheduler
    }

    pub fn sequencer(&self) -> &LevelSequencer {
        &self.sequencer
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    fn apply_sequencer_event(&mut self, event: SequencerEvent) {
        match event {
            SequencerEvent::PatternExpired {
                required_notes,
                current_notes,
                finish,
            } => {
                tracing::debug!(required_notes, current_notes, "pattern expired");
                self.record_miss(finish);
            }
            SequencerEvent::LevelChanged { level, kind } => {
                tracing::info!(level, ?kind, "level changed");
                self.notify(|sink| sink.on_level_changed(level, kind));
            }
            SequencerEvent::PenaltyHold { remaining } => {
                tracing::debug!(remaining, "pattern held back by penalty");
            }
            other => tracing::trace!(event = ?other, "sequencer"),
        }
    }

    fn evaluate_input(&mut self, input: InputEvent) {
        match input.class.direction() {
            Some(kind) => match self.sequencer.register_direction(kind) {
                DirectionOutcome::Correct { index, ready, .. } => {
                    tracing::debug!(?kind, index, ready, "direction matched");
                    let required = self
                        .sequencer
                        .pattern()
                        .map_or(index + 1, |pattern| pattern.required_notes());
                    self.notify(|sink| sink.on_pattern_progress(index + 1, required));
                }
                DirectionOutcome::Wrong { .. } => {
                    let finish = self.sequencer.pattern().is_some_and(|p| p.is_finish());
                    self.record_miss(finish);
                }
                DirectionOutcome::Ignored => {
                    tracing::debug!(?kind, "direction with no open pattern");
                }
            },
            None => self.evaluate_sync(input.timestamp_ms),
        }
    }

    fn evaluate_sync(&mut self, time_ms: f64) {
        let Some(pattern) = self.sequencer.open_pattern() else {
            tracing::debug!(time_ms, "sync with no open pattern");
            return;
        };
        let finish = pattern.is_finish();

        let judgement = self.evaluator.classify_sync(
            time_ms,
            self.scheduler.last_beat_ms(),
            self.scheduler.beat_interval_ms(),
            pattern.current_notes(),
            pattern.required_notes(),
        );
        tracing::debug!(
            rating = ?judgement.rating,
            error_ms = judgement.error_ms,
            structural = judgement.structural,
            "sync judged"
        );

        if !judgement.rating.is_hit() {
            self.sequencer.fail_pattern();
            self.record_miss(finish);
            return;
        }

        let award = self.scoring.record_note(judgement.rating);
        if let Some(complexity) = self.sequencer.succeed_pattern().map(|done| done.required_notes()) {
            self.scoring
                .complete_pattern(complexity, judgement.rating, finish);
        }
        self.publish_note(award);
        self.notify(|sink| sink.on_pattern_resolved(true, finish));
    }

    /// Scores a MISS and fails the pattern it ended.
    fn record_miss(&mut self, finish: bool) {
        let award = self.scoring.record_note(AccuracyRating::Miss);
        self.scoring.fail_pattern();
        self.publish_note(award);
        self.notify(|sink| sink.on_pattern_resolved(false, finish));
    }

    fn publish_note(&mut self, award: NoteAward) {
        let total = self.scoring.state().total_score;
        let combo = self.scoring.state().current_combo;
        self.notify(|sink| {
            sink.on_hit_feedback(award.rating);
            sink.on_combo_update(combo);
            sink.on_score_update(total);
        });
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn PresentationSink)) {
        if let Some(sink) = self.sink.as_deref_mut() {
            f(sink);
        }
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("state", &self.state)
            .field("seed", &self.seed)
            .field("scheduler", &self.scheduler)
            .field("pool", &self.pool)
            .field("score", self.scoring.state())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
