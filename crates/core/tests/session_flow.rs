use approx::assert_relative_eq;
use rhythm_core::{
    AccuracyRating, AutoPlayer, ClockSource, EventLog, GameConfig, GameSession, InputClass,
    LevelSequenceDescriptor, ManualClock, NoteKind, PatternStatus, PhaseKind, PresentationEvent,
};

fn level_only(required_notes: usize) -> GameConfig {
    let mut config = GameConfig {
        seed: Some(42),
        ..GameConfig::default()
    };
    config.sequence.table = vec![LevelSequenceDescriptor::new(
        PhaseKind::Level,
        required_notes,
        50,
    )];
    config
}

fn session_with(config: GameConfig, clock: &ManualClock) -> GameSession {
    GameSession::new(config).unwrap().with_clock(clock.clone())
}

/// Moves the clock, optionally feeds one device input at that instant, then ticks.
fn step(session: &mut GameSession, clock: &ManualClock, time_ms: f64, input: Option<InputClass>) {
    clock.seek(time_ms);
    if let Some(class) = input {
        session.handle_input(class, time_ms);
    }
    session.tick(16.0);
}

fn opposite(kind: NoteKind) -> NoteKind {
    match kind {
        NoteKind::Left => NoteKind::Right,
        NoteKind::Right => NoteKind::Left,
    }
}

#[test]
fn three_note_pattern_with_perfect_sync() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(3), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    let sequence = session.sequencer().open_pattern().unwrap().sequence().to_vec();
    assert_eq!(sequence.len(), 3);

    for (i, kind) in sequence.iter().enumerate() {
        let t = 2300.0 + i as f64 * 150.0;
        step(&mut session, &clock, t, Some(InputClass::from(*kind)));
    }
    assert_eq!(
        session.sequencer().open_pattern().unwrap().status(),
        PatternStatus::Ready
    );

    step(&mut session, &clock, 4000.0, Some(InputClass::Sync));

    let score = session.scoring().state();
    // 100 for the perfect sync note, 3 * 50 * 1.5 for the pattern.
    assert_eq!(score.total_score, 100 + 225);
    assert_eq!(score.patterns_completed, 1);
    assert_eq!(score.accuracy_counts.perfect, 1);
    assert_relative_eq!(score.pattern_multiplier, 1.1);
}

#[test]
fn miss_suppresses_the_next_two_patterns() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(2), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    let expected = session.sequencer().open_pattern().unwrap().sequence()[0];
    step(
        &mut session,
        &clock,
        2300.0,
        Some(InputClass::from(opposite(expected))),
    );

    let score = session.scoring().state();
    assert_eq!(score.accuracy_counts.miss, 1);
    assert_eq!(score.patterns_failed, 1);
    assert_eq!(session.sequencer().penalty_remaining(), 2);

    for beat in [4150.0, 6150.0] {
        step(&mut session, &clock, beat, None);
        assert!(session.sequencer().pattern().is_none(), "spawned at {beat}");
        assert_eq!(session.pool().active_count(), 0);
    }

    step(&mut session, &clock, 8150.0, None);
    assert!(session.sequencer().open_pattern().is_some());
    assert_eq!(session.pool().active_count(), 2);
}

#[test]
fn sync_before_directions_is_a_structural_miss() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(3), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    step(&mut session, &clock, 4000.0, Some(InputClass::Sync));

    let score = session.scoring().state();
    assert_eq!(score.accuracy_counts.miss, 1);
    assert_eq!(score.total_score, 0);
    assert_eq!(session.sequencer().penalty_remaining(), 2);
}

#[test]
fn unfinished_pattern_counts_as_a_miss_at_the_boundary() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(2), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    step(&mut session, &clock, 4150.0, None);

    let score = session.scoring().state();
    assert_eq!(score.accuracy_counts.miss, 1);
    assert_eq!(score.patterns_failed, 1);
    assert!(session.sequencer().pattern().is_none());
}

#[test]
fn expiry_holds_that_advance_and_the_next() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(2), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    assert!(session.sequencer().open_pattern().is_some());

    // Left unfinished: this advance expires it and is the first held one.
    step(&mut session, &clock, 4150.0, None);
    assert!(session.sequencer().pattern().is_none());
    assert_eq!(session.sequencer().penalty_remaining(), 1);
    assert_eq!(session.pool().active_count(), 0);

    step(&mut session, &clock, 6150.0, None);
    assert!(session.sequencer().pattern().is_none());
    assert_eq!(session.sequencer().penalty_remaining(), 0);

    step(&mut session, &clock, 8150.0, None);
    assert!(session.sequencer().open_pattern().is_some());
    assert_eq!(session.pool().active_count(), 2);
    assert_eq!(session.scoring().state().accuracy_counts.miss, 1);
}

#[test]
fn sink_hears_pattern_progress_and_resolution() {
    let clock = ManualClock::new(120_000.0);
    let log = EventLog::new();
    let mut session = session_with(level_only(2), &clock).with_sink(log.clone());
    session.start();

    step(&mut session, &clock, 2150.0, None);
    let sequence = session.sequencer().open_pattern().unwrap().sequence().to_vec();
    log.clear();

    step(&mut session, &clock, 2300.0, Some(InputClass::from(sequence[0])));
    step(&mut session, &clock, 2450.0, Some(InputClass::from(sequence[1])));
    assert_eq!(
        log.events(),
        vec![
            PresentationEvent::PatternProgress {
                current: 1,
                required: 2
            },
            PresentationEvent::PatternProgress {
                current: 2,
                required: 2
            },
        ]
    );

    step(&mut session, &clock, 4000.0, Some(InputClass::Sync));
    assert_eq!(
        log.events().last(),
        Some(&PresentationEvent::PatternResolved {
            success: true,
            finish: false
        })
    );

    // The next pattern expires untouched and is reported as failed.
    log.clear();
    step(&mut session, &clock, 4150.0, None);
    step(&mut session, &clock, 6150.0, None);
    let events = log.events();
    assert!(events.contains(&PresentationEvent::HitFeedback(AccuracyRating::Miss)));
    assert_eq!(
        events.last(),
        Some(&PresentationEvent::PatternResolved {
            success: false,
            finish: false
        })
    );
}

#[test]
fn input_in_a_boundary_frame_meets_the_new_pattern() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(1), &clock);
    session.start();

    step(&mut session, &clock, 2150.0, None);
    let first = session.sequencer().open_pattern().unwrap().sequence()[0];
    step(&mut session, &clock, 2300.0, Some(InputClass::from(first)));
    step(&mut session, &clock, 4000.0, Some(InputClass::Sync));
    assert_eq!(session.scoring().state().patterns_completed, 1);

    // Queued before the boundary tick, evaluated after the new pattern spawns.
    clock.seek(4150.0);
    session.handle_input(InputClass::Left, 4140.0);
    session.tick(16.0);

    let pattern = session.sequencer().pattern().unwrap();
    match pattern.sequence()[0] {
        NoteKind::Left => assert_eq!(pattern.status(), PatternStatus::Ready),
        NoteKind::Right => assert_eq!(pattern.status(), PatternStatus::Failed),
    }
}

#[test]
fn stop_detaches_from_input() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(1), &clock);
    session.start();
    step(&mut session, &clock, 2150.0, None);

    session.stop();
    session.stop();

    for class in InputClass::ALL {
        assert_eq!(session.router().listener_count(class), 0);
    }

    let before = session.scoring().state().clone();
    step(&mut session, &clock, 4000.0, Some(InputClass::Sync));
    assert_eq!(*session.scoring().state(), before);
}

#[test]
fn restart_replays_the_same_patterns() {
    let clock = ManualClock::new(120_000.0);
    let mut session = session_with(level_only(4), &clock);

    session.start();
    step(&mut session, &clock, 2150.0, None);
    let first_run = session.sequencer().open_pattern().unwrap().sequence().to_vec();

    clock.reset();
    session.restart();
    assert_eq!(session.pool().active_count(), 0);
    step(&mut session, &clock, 2150.0, None);
    let second_run = session.sequencer().open_pattern().unwrap().sequence().to_vec();

    assert_eq!(first_run, second_run);
}

#[test]
fn autoplay_session_reports_a_clean_summary() {
    let clock = ManualClock::new(90_000.0);
    let log = EventLog::new();
    let config = GameConfig {
        seed: Some(8),
        ..GameConfig::default()
    };
    let mut session = GameSession::new(config)
        .unwrap()
        .with_clock(clock.clone())
        .with_sink(log.clone());
    let mut player = AutoPlayer::new(0.0);

    session.start();
    while session.is_playing() {
        clock.advance(1000.0 / 60.0);
        session.tick(1000.0 / 60.0);
        player.update(&mut session);
    }

    assert!(clock.current_time_ms() >= 90_000.0);
    let summary = session.summary();
    assert_eq!(summary.counts.miss, 0);
    assert_relative_eq!(summary.accuracy, 100.0);
    assert_eq!(summary.grade.to_string(), "S");
    assert!(summary.finish_moves >= 1);

    let pool = summary.pool;
    assert_eq!(
        pool.acquired - pool.released,
        session.pool().active_count() as u64
    );

    let events = log.events();
    assert_eq!(events[0], PresentationEvent::Ready);
    assert!(events.contains(&PresentationEvent::HitFeedback(AccuracyRating::Perfect)));
    assert!(events.contains(&PresentationEvent::LevelChanged {
        level: 7,
        kind: PhaseKind::Finish
    }));

    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("\"grade\":\"S\""));
}
