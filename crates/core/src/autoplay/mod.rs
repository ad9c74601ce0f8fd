use crate::{input::InputClass, sequencer::PatternStatus, session::GameSession};

/// Plays the open pattern through [`GameSession::simulate_input`].
///
/// Directions are entered one per `direction_gap_ms` once a pattern appears;
/// the sync input lands `offset_ms` after the next beat.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    offset_ms: f64,
    direction_gap_ms: f64,
    last_direction_ms: Option<f64>,
    synced_advance: Option<u64>,
    inputs_sent: u64,
}

impl Default for AutoPlayer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AutoPlayer {
    pub fn new(offset_ms: f64) -> Self {
        Self {
            offset_ms,
            direction_gap_ms: 120.0,
            last_direction_ms: None,
            synced_advance: None,
            inputs_sent: 0,
        }
    }

    pub fn with_direction_gap(mut self, gap_ms: f64) -> Self {
        self.direction_gap_ms = gap_ms.max(0.0);
        self
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn inputs_sent(&self) -> u64 {
        self.inputs_sent
    }

    /// Sends at most one input for the current frame. Call after
    /// [`GameSession::tick`].
    pub fn update(&mut self, session: &mut GameSession) {
        if !session.is_playing() {
            return;
        }

        let now = session.now_ms();
        let advance = session.sequencer().advances();
        let Some(pattern) = session.sequencer().open_pattern() else {
            return;
        };

        match pattern.status() {
            PatternStatus::Awaiting => {
                let Some(kind) = pattern.expected() else {
                    return;
                };
                let due = self
                    .last_direction_ms
                    .map_or(true, |last| now - last >= self.direction_gap_ms);
                if due {
                    session.simulate_input(InputClass::from(kind), now);
                    self.last_direction_ms = Some(now);
                    self.inputs_sent += 1;
                }
            }
            PatternStatus::Ready => {
                if self.synced_advance == Some(advance) {
                    return;
                }
                let scheduler = session.scheduler();
                let target = scheduler.last_beat_ms() + scheduler.beat_interval_ms() + self.offset_ms;
                if now >= target {
                    tracing::debug!(now, target, "autoplay sync");
                    session.simulate_input(InputClass::Sync, now);
                    self.synced_advance = Some(advance);
                    self.inputs_sent += 1;
                }
            }
            PatternStatus::Succeeded | PatternStatus::Failed => {}
        }
    }
}
