//! Timing and pattern core of a rhythm game.
//!
//! Song time from a [`ClockSource`] is cut into beat boundaries by the
//! [`BeatScheduler`]; each boundary advances the [`LevelSequencer`], which
//! spawns patterns out of the [`NotePool`]. Player input flows through the
//! [`InputRouter`], is judged by the [`AccuracyEvaluator`] and scored by the
//! [`ScoringEngine`]. [`GameSession`] owns one of each and runs them per frame.

pub mod accuracy;
pub mod autoplay;
pub mod beat;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod pool;
pub mod presentation;
pub mod scoring;
pub mod sequencer;
pub mod session;

pub use accuracy::{AccuracyEvaluator, AccuracyRating, Judgement, TimingWindows};
pub use autoplay::AutoPlayer;
pub use beat::{BeatFrame, BeatScheduler};
pub use clock::{ClockSource, ManualClock, WallClock};
pub use config::{
    ExperienceWeights, GameConfig, InputConfig, PoolConfig, ScoringConfig, SequenceConfig,
    TimingConfig,
};
pub use error::{Result, RhythmError};
pub use input::{InputClass, InputEvent, InputRouter, ListenerHandle};
pub use pool::{NoteFactory, NoteId, NoteKind, NotePool, NoteToken, PoolStats, RenderHandle};
pub use presentation::{EventLog, PresentationEvent, PresentationSink};
pub use scoring::{AccuracyCounts, Grade, NoteAward, PatternAward, ScoreState, ScoringEngine};
pub use sequencer::{
    DirectionOutcome, LevelSequenceDescriptor, LevelSequencer, Pattern, PatternStatus, PhaseKind,
    SequencerEvent,
};
pub use session::{GameSession, SessionState, SessionSummary};
