//! In-memory store for tests and database-less demos.
//!
//! Implements the same atomicity contract as the Postgres adapter: a play
//! and its prediction rows appear together or not at all.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::domain::{Attribution, GameMetadata, PlayRecord, PlayWithEstimate, ProbabilityEstimate};
use crate::error::Result;

#[derive(Default)]
struct GameRows {
    meta: Option<GameMetadata>,
    plays: Vec<(PlayRecord, Vec<(ProbabilityEstimate, Vec<Attribution>)>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<String, GameRows>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plays persisted for a game (test helper).
    pub async fn play_count(&self, game_id: &str) -> usize {
        self.games
            .read()
            .await
            .get(game_id)
            .map(|g| g.plays.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_game(&self, meta: &GameMetadata) -> Result<()> {
        let mut games = self.games.write().await;
        games.entry(meta.game_id.clone()).or_default().meta = Some(meta.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<GameMetadata>> {
        let games = self.games.read().await;
        Ok(games.get(game_id).map(|g| {
            g.meta.clone().unwrap_or_else(|| GameMetadata {
                game_id: game_id.to_string(),
                home_team: None,
                away_team: None,
                season: None,
                week: None,
                total_plays: g.plays.len(),
            })
        }))
    }

    async fn record_play(
        &self,
        play: &PlayRecord,
        _raw_payload: &serde_json::Value,
        estimate: &ProbabilityEstimate,
        attributions: &[Attribution],
    ) -> Result<()> {
        let mut games = self.games.write().await;
        let game = games.entry(play.game_id.clone()).or_default();
        game.plays.push((
            play.clone(),
            vec![(estimate.clone(), attributions.to_vec())],
        ));
        Ok(())
    }

    async fn load_plays_with_estimates(&self, game_id: &str) -> Result<Vec<PlayWithEstimate>> {
        let games = self.games.read().await;
        let Some(game) = games.get(game_id) else {
            return Ok(Vec::new());
        };

        let mut pairs: Vec<PlayWithEstimate> = game
            .plays
            .iter()
            .filter_map(|(play, estimates)| {
                estimates
                    .iter()
                    .max_by_key(|(e, _)| e.predicted_at)
                    .map(|(estimate, _)| PlayWithEstimate {
                        play: play.clone(),
                        estimate: estimate.clone(),
                    })
            })
            .collect();

        pairs.sort_by_key(|p| p.play.sequence);
        Ok(pairs)
    }
}
