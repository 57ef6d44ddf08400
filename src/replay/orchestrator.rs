//! Replay manager: pulls plays from a source, runs inference, persists and
//! broadcasts each play, one task per game.
//!
//! Per play: persist -> features -> predict -> final-whistle clamp -> store
//! estimate + attributions -> broadcast. A single play's failure is logged
//! and skipped; the session keeps going. The only way a session fails to
//! start is a missing model (structural precondition).

use dashmap::DashMap;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::session::{SessionHandle, SessionState};
use crate::broadcast::EventBus;
use crate::domain::{GameEvent, GameState, GameStatus, PlayRecord, ProbabilityEstimate};
use crate::error::{LivelineError, Result};
use crate::ml::{FeatureVector, ModelRegistry, WinProbModel};
use crate::persistence::RecordStore;
use crate::providers::PlayProvider;

/// Force certainty once the game is actually over: final period (or later),
/// clock fully expired, and a winner on the scoreboard. Quarter-end rows in
/// Q1-Q3 also carry a zero clock but the game is not over, and a tie at 0:00
/// in Q4 means overtime. Neither clamps.
pub fn final_whistle_clamp(state: &GameState, home_wp: f64) -> f64 {
    if state.game_seconds_remaining == 0 && state.quarter >= 4 && state.score_differential != 0 {
        if state.score_differential > 0 {
            1.0
        } else {
            0.0
        }
    } else {
        home_wp
    }
}

pub struct ReplayManager {
    sessions: Arc<DashMap<String, SessionHandle>>,
    store: Arc<dyn RecordStore>,
    registry: Arc<ModelRegistry>,
    bus: Arc<EventBus>,
    top_attributions: usize,
}

impl ReplayManager {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<ModelRegistry>,
        bus: Arc<EventBus>,
        top_attributions: usize,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            registry,
            bus,
            top_attributions,
        }
    }

    /// Start a replay for a game. Errors with a conflict if one is already
    /// running for the same id, or a precondition failure if no model is
    /// loaded. The replay runs as its own task; this returns immediately.
    pub async fn start(&self, game_id: &str, provider: Arc<dyn PlayProvider>) -> Result<()> {
        // Structural precondition: a session without a model can never
        // produce an estimate, so refuse to start at all.
        let model = self.registry.current()?;

        // Reserve the slot first so two concurrent starts cannot both win.
        match self.sessions.entry(game_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(LivelineError::ReplayConflict {
                game_id: game_id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let cancelled = Arc::new(AtomicBool::new(false));
                let plays_processed = Arc::new(AtomicU64::new(0));

                let runner = SessionRunner {
                    game_id: game_id.to_string(),
                    store: Arc::clone(&self.store),
                    bus: Arc::clone(&self.bus),
                    model,
                    top_attributions: self.top_attributions,
                    cancelled: Arc::clone(&cancelled),
                    plays_processed: Arc::clone(&plays_processed),
                    sessions: Arc::clone(&self.sessions),
                };

                // Gate the task on slot registration: a fast replay must not
                // finish (and try to deregister) before its handle exists.
                let (registered_tx, registered_rx) = oneshot::channel();
                let join = tokio::spawn(async move {
                    let _ = registered_rx.await;
                    runner.run(provider).await;
                });

                slot.insert(SessionHandle::new(game_id, cancelled, plays_processed, join));
                let _ = registered_tx.send(());

                info!(game_id, "Replay started");
                Ok(())
            }
        }
    }

    /// Request cancellation of a running replay. Stopping a finished or
    /// unknown session reports not-found rather than crashing.
    pub fn stop(&self, game_id: &str) -> Result<()> {
        match self.sessions.get(game_id) {
            Some(handle) => {
                handle.cancel();
                info!(game_id, "Replay cancellation requested");
                Ok(())
            }
            None => Err(LivelineError::ReplayNotFound {
                game_id: game_id.to_string(),
            }),
        }
    }

    pub fn is_running(&self, game_id: &str) -> bool {
        self.sessions.contains_key(game_id)
    }

    /// (game_id, plays processed so far) for every active session.
    pub fn active_sessions(&self) -> Vec<(String, u64)> {
        self.sessions
            .iter()
            .map(|entry| (entry.game_id.clone(), entry.plays_processed()))
            .collect()
    }

    /// Block until the session task of a game finishes. Test support; the
    /// HTTP surface never waits on a replay.
    pub async fn wait(&self, game_id: &str) {
        let join = self.sessions.remove(game_id).map(|(_, handle)| handle.join);
        if let Some(join) = join {
            let _ = join.await;
        }
    }
}

/// Everything one replay task needs, moved into the spawned future.
struct SessionRunner {
    game_id: String,
    store: Arc<dyn RecordStore>,
    bus: Arc<EventBus>,
    model: Arc<dyn WinProbModel>,
    top_attributions: usize,
    cancelled: Arc<AtomicBool>,
    plays_processed: Arc<AtomicU64>,
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl SessionRunner {
    async fn run(self, provider: Arc<dyn PlayProvider>) {
        match provider.metadata().await {
            Ok(meta) => {
                if let Err(e) = self.store.upsert_game(&meta).await {
                    warn!(game_id = %self.game_id, "Failed to register game: {}", e);
                }
            }
            Err(e) => warn!(game_id = %self.game_id, "Play source metadata unavailable: {}", e),
        }

        let mut stream = provider.stream();
        let mut last_scores = (0, 0);
        let final_state;

        loop {
            // Cancellation is observed between plays; the play already in
            // flight completes before we get here.
            if self.cancelled.load(Ordering::SeqCst) {
                final_state = SessionState::Cancelled;
                break;
            }

            match stream.next().await {
                Some(state) => {
                    last_scores = (state.score_home, state.score_away);
                    match self.process_play(&state).await {
                        Ok(()) => {
                            self.plays_processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            // One bad play must not end the session
                            error!(
                                game_id = %self.game_id,
                                sequence = state.sequence,
                                "Error processing play: {}",
                                e
                            );
                        }
                    }
                }
                None => {
                    final_state = SessionState::Completed;
                    break;
                }
            }
        }

        if final_state == SessionState::Completed {
            self.bus.publish(
                &self.game_id,
                &GameEvent::GameStatusChange {
                    game_id: self.game_id.clone(),
                    status: GameStatus::Final,
                    home_score: last_scores.0,
                    away_score: last_scores.1,
                },
            );
            self.bus.publish(
                &self.game_id,
                &GameEvent::ReplayComplete {
                    game_id: self.game_id.clone(),
                },
            );
        }

        info!(
            game_id = %self.game_id,
            plays = self.plays_processed.load(Ordering::SeqCst),
            state = %final_state,
            "Replay finished"
        );

        // Free the registry slot so a later start for the same game works
        self.sessions.remove(&self.game_id);
    }

    async fn process_play(&self, state: &GameState) -> Result<()> {
        let play = PlayRecord::from_state(state);

        let features = FeatureVector::from_state(state);
        let home_wp = final_whistle_clamp(state, self.model.predict(&features));
        let attributions = self.model.explain(&features, self.top_attributions);

        let estimate = ProbabilityEstimate::new(play.id, self.model.version(), home_wp);
        let raw_payload = serde_json::Value::Object(state.raw_payload.clone());

        // Atomic per play: a failure here leaves no partial rows behind
        self.store
            .record_play(&play, &raw_payload, &estimate, &attributions)
            .await?;

        let event = GameEvent::PlayUpdate {
            game_id: self.game_id.clone(),
            play: (&play).into(),
            home_wp: estimate.home_wp,
            away_wp: estimate.away_wp,
            top_attributions: attributions,
        };
        self.bus.publish(&self.game_id, &event);
        self.bus.cache_latest(&self.game_id, event);

        Ok(())
    }
}
