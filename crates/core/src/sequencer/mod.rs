//! Table-driven difficulty ramp.
//!
//! Every beat boundary advances the sequencer once. The table is cyclic: after
//! the last descriptor it wraps to the first and clears any pending penalty.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pool::{NoteId, NoteKind, NotePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    /// Rest phase, no patterns.
    Off,
    Level,
    /// Climactic pattern scored with the finish bonus.
    Finish,
}

impl PhaseKind {
    pub fn spawns_patterns(self) -> bool {
        !matches!(self, PhaseKind::Off)
    }
}

/// One row of the sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSequenceDescriptor {
    pub kind: PhaseKind,
    pub required_notes: usize,
    /// Advances spent on this row before moving to the next one.
    pub loop_count: u32,
    /// Silent advances at the start of the row, before its loops begin.
    #[serde(default)]
    pub delay_loops: Option<u32>,
}

impl LevelSequenceDescriptor {
    pub const fn new(kind: PhaseKind, required_notes: usize, loop_count: u32) -> Self {
        Self {
            kind,
            required_notes,
            loop_count,
            delay_loops: None,
        }
    }

    pub const fn with_delay(mut self, delay_loops: u32) -> Self {
        self.delay_loops = Some(delay_loops);
        self
    }

    /// Rest, six levels of growing length and note count, a finish move, rest.
    pub fn default_table() -> Vec<Self> {
        vec![
            Self::new(PhaseKind::Off, 0, 2),
            Self::new(PhaseKind::Level, 1, 2),
            Self::new(PhaseKind::Level, 2, 2),
            Self::new(PhaseKind::Level, 3, 3),
            Self::new(PhaseKind::Level, 4, 3),
            Self::new(PhaseKind::Level, 5, 4),
            Self::new(PhaseKind::Level, 6, 4),
            Self::new(PhaseKind::Finish, 7, 1).with_delay(1),
            Self::new(PhaseKind::Off, 0, 1),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternStatus {
    /// Directional inputs still outstanding.
    Awaiting,
    /// Directional inputs done, waiting for the sync input.
    Ready,
    Succeeded,
    Failed,
}

/// A spawned pattern. Holds note ids only; the pool owns the tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    descriptor: LevelSequenceDescriptor,
    sequence: Vec<NoteKind>,
    notes: Vec<NoteId>,
    current_notes: usize,
    status: PatternStatus,
}

impl Pattern {
    /// Descriptor snapshot taken when the pattern spawned.
    pub fn descriptor(&self) -> LevelSequenceDescriptor {
        self.descriptor
    }

    pub fn required_notes(&self) -> usize {
        self.descriptor.required_notes
    }

    pub fn current_notes(&self) -> usize {
        self.current_notes
    }

    pub fn sequence(&self) -> &[NoteKind] {
        &self.sequence
    }

    pub fn notes(&self) -> &[NoteId] {
        &self.notes
    }

    pub fn status(&self) -> PatternStatus {
        self.status
    }

    pub fn is_finish(&self) -> bool {
        self.descriptor.kind == PhaseKind::Finish
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.status, PatternStatus::Succeeded | PatternStatus::Failed)
    }

    /// Direction the player has to press next, if any.
    pub fn expected(&self) -> Option<NoteKind> {
        match self.status {
            PatternStatus::Awaiting => self.sequence.get(self.current_notes).copied(),
            _ => None,
        }
    }
}

/// What an advance did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// The previous pattern was left unfinished and counts as a miss.
    PatternExpired {
        required_notes: usize,
        current_notes: usize,
        finish: bool,
    },
    NotesRecycled(usize),
    Delayed { remaining: u32 },
    TableWrapped,
    LevelChanged { level: u32, kind: PhaseKind },
    PenaltyHold { remaining: u32 },
    PatternSpawned { kind: PhaseKind, sequence: Vec<NoteKind>, notes: Vec<NoteId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionOutcome {
    /// Matched the next expected note. `ready` is set once the sequence is complete.
    Correct { note: NoteId, index: usize, ready: bool },
    Wrong { expected: NoteKind },
    /// Nothing to match: no pattern, a resolved one, or all notes already entered.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct LevelSequencer {
    table: Vec<LevelSequenceDescriptor>,
    levels: Vec<u32>,
    index: usize,
    loops_done: u32,
    delay_remaining: u32,
    penalty_remaining: u32,
    penalty_loops: u32,
    note_spacing: f32,
    pattern: Option<Pattern>,
    advances: u64,
}

impl LevelSequencer {
    pub fn new(table: Vec<LevelSequenceDescriptor>, penalty_loops: u32, note_spacing: f32) -> Self {
        let table = if table.is_empty() {
            tracing::warn!("empty sequence table, falling back to the default ramp");
            LevelSequenceDescriptor::default_table()
        } else {
            table
        };

        let mut level = 0;
        let levels = table
            .iter()
            .map(|entry| {
                if entry.kind.spawns_patterns() {
                    level += 1;
                }
                level
            })
            .collect();

        let mut sequencer = Self {
            table,
            levels,
            index: 0,
            loops_done: 0,
            delay_remaining: 0,
            penalty_remaining: 0,
            penalty_loops,
            note_spacing,
            pattern: None,
            advances: 0,
        };
        sequencer.rewind();
        sequencer
    }

    /// Returns to the first row, recycling any live pattern.
    pub fn reset(&mut self, pool: &mut NotePool) {
        if let Some(pattern) = self.pattern.take() {
            for id in pattern.notes {
                pool.release(id);
            }
        }
        self.rewind();
    }

    /// Runs one sequencer step. Call once per beat boundary.
    pub fn advance<R>(&mut self, pool: &mut NotePool, rng: &mut R) -> Vec<SequencerEvent>
    where
        R: Rng + ?Sized,
    {
        let mut events = Vec::new();
        self.advances += 1;

        if let Some(pattern) = self.pattern.as_mut() {
            if !pattern.is_resolved() {
                pattern.status = PatternStatus::Failed;
                self.penalty_remaining = self.penalty_loops;
                events.push(SequencerEvent::PatternExpired {
                    required_notes: pattern.required_notes(),
                    current_notes: pattern.current_notes,
                    finish: pattern.is_finish(),
                });
            }
        }

        if let Some(pattern) = self.pattern.take() {
            let count = pattern.notes.len();
            for id in pattern.notes {
                pool.release(id);
            }
            events.push(SequencerEvent::NotesRecycled(count));
        }

        if self.delay_remaining > 0 {
            self.delay_remaining -= 1;
            events.push(SequencerEvent::Delayed {
                remaining: self.delay_remaining,
            });
            return events;
        }

        if self.loops_done >= self.table[self.index].loop_count {
            self.enter_next_row(&mut events);

            if let Some(delay) = self.table[self.index].delay_loops.filter(|d| *d > 0) {
                self.delay_remaining = delay - 1;
                events.push(SequencerEvent::Delayed {
                    remaining: self.delay_remaining,
                });
                return events;
            }
        }

        self.loops_done += 1;
        let descriptor = self.table[self.index];

        let holding = self.penalty_remaining > 0;
        if holding {
            self.penalty_remaining -= 1;
        }

        if !descriptor.kind.spawns_patterns() {
            return events;
        }

        if holding {
            events.push(SequencerEvent::PenaltyHold {
                remaining: self.penalty_remaining,
            });
            return events;
        }

        events.push(self.spawn_pattern(descriptor, pool, rng));
        events
    }

    /// Feeds a directional input to the live pattern. A wrong direction fails
    /// the pattern and starts the cool-down.
    pub fn register_direction(&mut self, kind: NoteKind) -> DirectionOutcome {
        let Some(pattern) = self.pattern.as_mut() else {
            return DirectionOutcome::Ignored;
        };

        let Some(expected) = pattern.expected() else {
            return DirectionOutcome::Ignored;
        };

        if expected != kind {
            pattern.status = PatternStatus::Failed;
            self.penalty_remaining = self.penalty_loops;
            tracing::debug!(?expected, ?kind, "wrong direction, pattern broken");
            return DirectionOutcome::Wrong { expected };
        }

        let index = pattern.current_notes;
        pattern.current_notes += 1;
        let ready = pattern.current_notes >= pattern.required_notes();
        if ready {
            pattern.status = PatternStatus::Ready;
        }

        DirectionOutcome::Correct {
            note: pattern.notes[index],
            index,
            ready,
        }
    }

    /// Marks the live pattern as completed by a sync input.
    pub fn succeed_pattern(&mut self) -> Option<&Pattern> {
        let pattern = self.pattern.as_mut().filter(|p| !p.is_resolved())?;
        pattern.status = PatternStatus::Succeeded;
        Some(&*pattern)
    }

    /// Fails the live pattern and starts the cool-down.
    pub fn fail_pattern(&mut self) -> Option<&Pattern> {
        let pattern = self.pattern.as_mut().filter(|p| !p.is_resolved())?;
        pattern.status = PatternStatus::Failed;
        self.penalty_remaining = self.penalty_loops;
        Some(&*pattern)
    }

    /// Live pattern that still accepts input.
    pub fn open_pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref().filter(|p| !p.is_resolved())
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn descriptor(&self) -> LevelSequenceDescriptor {
        self.table[self.index]
    }

    pub fn table(&self) -> &[LevelSequenceDescriptor] {
        &self.table
    }

    pub fn row(&self) -> usize {
        self.index
    }

    /// Level number shown to the player: count of pattern rows up to the current one.
    pub fn level(&self) -> u32 {
        self.levels[self.index]
    }

    pub fn penalty_remaining(&self) -> u32 {
        self.penalty_remaining
    }

    pub fn delay_remaining(&self) -> u32 {
        self.delay_remaining
    }

    pub fn advances(&self) -> u64 {
        self.advances
    }

    fn rewind(&mut self) {
        self.index = 0;
        self.loops_done = 0;
        self.penalty_remaining = 0;
        self.advances = 0;
        self.pattern = None;
        self.delay_remaining = self.table[0].delay_loops.unwrap_or(0);
    }

    fn enter_next_row(&mut self, events: &mut Vec<SequencerEvent>) {
        for _ in 0..self.table.len() {
            self.index += 1;
            if self.index >= self.table.len() {
                self.index = 0;
                self.penalty_remaining = 0;
                events.push(SequencerEvent::TableWrapped);
            }
            if self.table[self.index].loop_count > 0 {
                break;
            }
        }

        self.loops_done = 0;
        let kind = self.table[self.index].kind;
        tracing::debug!(row = self.index, level = self.level(), ?kind, "sequence row changed");
        events.push(SequencerEvent::LevelChanged {
            level: self.level(),
            kind,
        });
    }

    fn spawn_pattern<R>(
        &mut self,
        descriptor: LevelSequenceDescriptor,
        pool: &mut NotePool,
        rng: &mut R,
    ) -> SequencerEvent
    where
        R: Rng + ?Sized,
    {
        let count = descriptor.required_notes;
        let sequence: Vec<NoteKind> = (0..count)
            .map(|_| {
                if rng.random_bool(0.5) {
                    NoteKind::Left
                } else {
                    NoteKind::Right
                }
            })
            .collect();

        let centre = (count as f32 - 1.0) / 2.0;
        let notes: Vec<NoteId> = sequence
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let (id, _) = pool.acquire(*kind);
                pool.place(id, (i as f32 - centre) * self.note_spacing);
                id
            })
            .collect();

        let status = if count == 0 {
            PatternStatus::Ready
        } else {
            PatternStatus::Awaiting
        };

        self.pattern = Some(Pattern {
            descriptor,
            sequence: sequence.clone(),
            notes: notes.clone(),
            current_notes: 0,
            status,
        });

        tracing::debug!(?sequence, kind = ?descriptor.kind, "pattern spawned");
        SequencerEvent::PatternSpawned {
            kind: descriptor.kind,
            sequence,
            notes,
        }
    }
}
