use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{accuracy::AccuracyRating, sequencer::PhaseKind};

/// Receives gameplay results for display. Every method is fire-and-forget and
/// defaults to doing nothing, so a sink only implements what it shows.
pub trait PresentationSink {
    fn on_ready(&mut self) {}

    fn on_score_update(&mut self, _total: u64) {}

    fn on_combo_update(&mut self, _combo: u32) {}

    fn on_level_changed(&mut self, _level: u32, _kind: PhaseKind) {}

    fn on_hit_feedback(&mut self, _rating: AccuracyRating) {}

    /// A directional input matched; `current` of `required` notes are in.
    fn on_pattern_progress(&mut self, _current: usize, _required: usize) {}

    fn on_pattern_resolved(&mut self, _success: bool, _finish: bool) {}
}

/// Everything a sink can be told, as data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PresentationEvent {
    Ready,
    Score(u64),
    Combo(u32),
    LevelChanged { level: u32, kind: PhaseKind },
    HitFeedback(AccuracyRating),
    PatternProgress { current: usize, required: usize },
    PatternResolved { success: bool, finish: bool },
}

/// Sink that records events into a shared log. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<PresentationEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: PresentationEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl PresentationSink for EventLog {
    fn on_ready(&mut self) {
        self.push(PresentationEvent::Ready);
    }

    fn on_score_update(&mut self, total: u64) {
        self.push(PresentationEvent::Score(total));
    }

    fn on_combo_update(&mut self, combo: u32) {
        self.push(PresentationEvent::Combo(combo));
    }

    fn on_level_changed(&mut self, level: u32, kind: PhaseKind) {
        self.push(PresentationEvent::LevelChanged { level, kind });
    }

    fn on_hit_feedback(&mut self, rating: AccuracyRating) {
        self.push(PresentationEvent::HitFeedback(rating));
    }

    fn on_pattern_progress(&mut self, current: usize, required: usize) {
        self.push(PresentationEvent::PatternProgress { current, required });
    }

    fn on_pattern_resolved(&mut self, success: bool, finish: bool) {
        self.push(PresentationEvent::PatternResolved { success, finish });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScoreOnly(u64);

    impl PresentationSink for ScoreOnly {
        fn on_score_update(&mut self, total: u64) {
            self.0 = total;
        }
    }

    #[test]
    fn default_methods_are_no_ops() {
        let mut sink = ScoreOnly(0);
        sink.on_ready();
        sink.on_combo_update(4);
        sink.on_score_update(120);
        assert_eq!(sink.0, 120);
    }

    #[test]
    fn log_clones_share_events() {
        let log = EventLog::new();
        let mut sink = log.clone();
        sink.on_ready();
        sink.on_hit_feedback(AccuracyRating::Good);

        assert_eq!(
            log.events(),
            vec![
                PresentationEvent::Ready,
                PresentationEvent::HitFeedback(AccuracyRating::Good)
            ]
        );
        log.clear();
        assert!(sink.is_empty());
    }
}
