//! End-to-end pipeline test: JSONL source -> replay session -> inference ->
//! persistence -> broadcast, then analytics over the replayed history.

use liveline::{
    AnalyticsEngine, EventBus, GameEvent, JsonlReplayProvider, LivelineError,
    LogisticWinProbModel, MemoryStore, ModelRegistry, PlayProvider, RecordStore, ReplayManager,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

const GAME: &str = "2022_20_CIN_KC";

fn play_row(
    sequence: i64,
    qtr: i32,
    quarter_secs: i32,
    game_secs: i32,
    home: i32,
    away: i32,
    down: Option<i32>,
    ydstogo: Option<i32>,
    yardline_100: Option<i32>,
    posteam: &str,
    play_type: &str,
    desc: &str,
) -> serde_json::Value {
    json!({
        "game_id": GAME,
        "play_id": sequence + 1,
        "qtr": qtr,
        "quarter_seconds_remaining": quarter_secs,
        "game_seconds_remaining": game_secs,
        "half_seconds_remaining": game_secs.min(1800),
        "down": down,
        "ydstogo": ydstogo,
        "yardline_100": yardline_100,
        "posteam": posteam,
        "defteam": if posteam == "KC" { "CIN" } else { "KC" },
        "home_team": "KC",
        "away_team": "CIN",
        "total_home_score": home,
        "total_away_score": away,
        "play_type": play_type,
        "desc": desc,
        "season": 2022,
        "week": 20,
        "spread_line": -1.5,
        "home_opening_kickoff": 1
    })
}

/// A short game: a touchdown drive, a timeout, an end-of-half marker, two
/// gradeable fourth downs, and a final whistle with the home team up 7.
fn fixture_rows() -> Vec<serde_json::Value> {
    vec![
        play_row(0, 1, 900, 3600, 0, 0, None, None, None, "KC", "kickoff", "ball kicked to the end zone, touchback"),
        play_row(1, 1, 860, 3560, 0, 0, Some(1), Some(10), Some(75), "KC", "run", "run up the middle for 4 yards"),
        play_row(2, 1, 820, 3520, 0, 0, Some(2), Some(6), Some(71), "KC", "pass", "pass deep right for 56 yards, TOUCHDOWN"),
        play_row(3, 2, 600, 2400, 7, 0, None, None, None, "CIN", "timeout", "timeout #1 by CIN"),
        play_row(4, 2, 300, 2100, 7, 3, Some(4), Some(8), Some(70), "CIN", "punt", "punts 46 yards downfield, fair catch"),
        play_row(5, 2, 0, 1800, 7, 3, None, None, None, "KC", "end_of_half", "END QUARTER 2"),
        play_row(6, 3, 500, 1400, 7, 10, Some(1), Some(10), Some(60), "CIN", "pass", "pass intercepted at the 40, returned 15 yards"),
        play_row(7, 4, 700, 700, 14, 10, Some(4), Some(1), Some(5), "KC", "field_goal", "23 yard field goal is GOOD"),
        play_row(8, 4, 120, 120, 17, 10, Some(1), Some(10), Some(55), "CIN", "pass", "pass incomplete deep left"),
        play_row(9, 4, 0, 0, 17, 10, None, None, None, "KC", "end_of_game", "END GAME"),
    ]
}

fn write_fixture() -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("liveline_e2e_{}.jsonl", uuid::Uuid::new_v4()));
    let mut file = std::fs::File::create(&path).unwrap();
    for row in fixture_rows() {
        writeln!(file, "{}", row).unwrap();
    }
    path
}

struct Pipeline {
    manager: ReplayManager,
    store: Arc<MemoryStore>,
    bus: Arc<EventBus>,
}

fn pipeline() -> Pipeline {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::with_defaults());
    let manager = ReplayManager::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::new(ModelRegistry::with_model(Arc::new(
            LogisticWinProbModel::default_untrained(),
        ))),
        Arc::clone(&bus),
        5,
    );
    Pipeline {
        manager,
        store,
        bus,
    }
}

#[tokio::test]
async fn full_replay_persists_broadcasts_and_feeds_analytics() {
    let path = write_fixture();
    let Pipeline {
        manager,
        store,
        bus,
    } = pipeline();

    let provider = Arc::new(JsonlReplayProvider::load(&path, GAME, 100.0).unwrap());
    assert_eq!(provider.metadata().await.unwrap().total_plays, 10);

    let mut subscriber = bus.subscribe(GAME);
    manager.start(GAME, Arc::clone(&provider) as _).await.unwrap();

    // A second start for the same game while running must conflict
    let err = manager.start(GAME, provider as _).await.unwrap_err();
    assert!(matches!(err, LivelineError::ReplayConflict { .. }));

    manager.wait(GAME).await;

    // Every play persisted, sequences strictly increasing with no gaps
    let pairs = store.load_plays_with_estimates(GAME).await.unwrap();
    assert_eq!(pairs.len(), 10);
    let sequences: Vec<i64> = pairs.iter().map(|p| p.play.sequence).collect();
    assert_eq!(sequences, (0..10).collect::<Vec<i64>>());
    for pair in &pairs {
        assert!(
            (pair.estimate.home_wp + pair.estimate.away_wp - 1.0).abs() < 1e-9,
            "probabilities must sum to 1"
        );
    }

    // Mid-game zero clock (end of Q2, home up 4) must not clamp; the final
    // whistle with a 7-point lead must clamp to certainty.
    let halftime = &pairs[5];
    assert!(halftime.estimate.home_wp < 1.0);
    let final_play = &pairs[9];
    assert_eq!(final_play.estimate.home_wp, 1.0);
    assert_eq!(final_play.estimate.away_wp, 0.0);

    // Broadcast: one update per play, then a final status and completion
    let mut updates = 0;
    let mut saw_final_status = false;
    let mut saw_complete = false;
    let mut last_sequence = -1i64;
    while let Some(event) = subscriber
        .recv_timeout(std::time::Duration::from_millis(100))
        .await
    {
        match event {
            GameEvent::PlayUpdate { play, .. } => {
                assert!(play.sequence > last_sequence, "updates must be in order");
                last_sequence = play.sequence;
                updates += 1;
            }
            GameEvent::GameStatusChange {
                status,
                home_score,
                away_score,
                ..
            } => {
                assert_eq!(status.as_str(), "final");
                assert_eq!((home_score, away_score), (17, 10));
                saw_final_status = true;
            }
            GameEvent::ReplayComplete { game_id } => {
                assert_eq!(game_id, GAME);
                saw_complete = true;
            }
        }
    }
    assert_eq!(updates, 10);
    assert!(saw_final_status);
    assert!(saw_complete);

    // A viewer joining after the replay still catches up from the snapshot
    match bus.latest(GAME) {
        Some(GameEvent::PlayUpdate { play, .. }) => assert_eq!(play.sequence, 9),
        other => panic!("expected a cached play update, got {other:?}"),
    }

    // Stop after completion reports not-found
    let err = manager.stop(GAME).unwrap_err();
    assert!(matches!(err, LivelineError::ReplayNotFound { .. }));

    // Analytics over the same history
    let engine = AnalyticsEngine::new(Arc::clone(&store) as Arc<dyn RecordStore>);

    let momentum = engine.momentum(GAME, 3).await.unwrap();
    assert!(!momentum.swings.is_empty());
    assert_eq!(
        momentum.swings.iter().filter(|s| s.is_turning_point).count(),
        1
    );
    // Chronological presentation
    for window in momentum.swings.windows(2) {
        assert!(window[0].play.sequence < window[1].play.sequence);
    }

    let clutch = engine.clutch(GAME, 5).await.unwrap();
    assert!(!clutch.top_plays.is_empty());
    assert!(!clutch.top_drives.is_empty());

    let decisions = engine.decisions(GAME, 10).await.unwrap();
    // The punt and the field goal qualify; the kickoff and markers do not
    assert_eq!(decisions.decisions.len(), 2);
    for decision in &decisions.decisions {
        assert!(decision.decision_delta <= 1e-9);
    }

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn cancelled_replay_stops_early_without_terminal_event() {
    let path = write_fixture();
    let Pipeline {
        manager,
        store,
        bus,
    } = pipeline();

    // Slow pace so the cancel lands mid-game
    let provider = Arc::new(JsonlReplayProvider::load(&path, GAME, 10.0).unwrap());
    let mut subscriber = bus.subscribe(GAME);

    manager.start(GAME, provider as _).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    manager.stop(GAME).unwrap();
    manager.wait(GAME).await;

    let persisted = store.play_count(GAME).await;
    assert!(persisted > 0);
    assert!(persisted < 10, "cancellation must cut the replay short");

    // No completion event after a cancel, only play updates
    while let Some(event) = subscriber
        .recv_timeout(std::time::Duration::from_millis(50))
        .await
    {
        assert!(
            matches!(event, GameEvent::PlayUpdate { .. }),
            "cancelled replays must not emit terminal events, got {event:?}"
        );
    }

    std::fs::remove_file(path).ok();
}
