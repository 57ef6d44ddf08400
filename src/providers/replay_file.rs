//! File-backed replay provider.
//!
//! Reads an nflfastR play-by-play export in JSON Lines form (one play object
//! per line), filters to a single game, and yields normalized plays at a
//! configurable rate.
//!
//! nflfastR column mapping:
//!   qtr                        -> quarter
//!   quarter_seconds_remaining  -> quarter_seconds_remaining
//!   game_seconds_remaining     -> game_seconds_remaining
//!   half_seconds_remaining     -> half_seconds_remaining
//!   ydstogo / yards_to_go      -> yards_to_go
//!   yardline_100               -> yardline_100
//!   posteam / defteam          -> possession team codes
//!   total_home_score / _away_  -> score_home / score_away
//!   home_opening_kickoff       -> receive_2h_ko (with posteam side)
//!   play_type / desc           -> play_type / description

use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::PlayProvider;
use crate::domain::{GameMetadata, GameState};
use crate::error::{LivelineError, Result};

fn as_i32(row: &Map<String, Value>, key: &str) -> Option<i32> {
    row.get(key).and_then(Value::as_f64).map(|v| v as i32)
}

fn as_f64(row: &Map<String, Value>, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

fn as_str(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[derive(Debug)]
pub struct JsonlReplayProvider {
    game_id: String,
    plays: Arc<Vec<GameState>>,
    plays_per_second: f64,
}

impl JsonlReplayProvider {
    /// Load a JSONL export, keeping only rows whose `game_id` column matches.
    pub fn load<P: AsRef<Path>>(
        path: P,
        source_game_id: &str,
        plays_per_second: f64,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let mut plays = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: Map<String, Value> = match serde_json::from_str(line) {
                Ok(row) => row,
                Err(e) => {
                    warn!(line = line_no + 1, "Skipping malformed play row: {}", e);
                    continue;
                }
            };
            match as_str(&row, "game_id") {
                Some(id) if id == source_game_id => {}
                Some(_) => continue,
                // No game_id column: single-game export, keep every row
                None => {}
            }
            let sequence = plays.len() as i64;
            plays.push(Self::normalize(&row, source_game_id, sequence));
        }

        if plays.is_empty() {
            return Err(LivelineError::Provider(format!(
                "no plays found for game_id='{}' in {} (expected nflfastR ids like '2022_20_CIN_KC')",
                source_game_id,
                path.as_ref().display(),
            )));
        }

        info!(
            game_id = source_game_id,
            plays = plays.len(),
            speed = plays_per_second,
            "Loaded replay source"
        );

        Ok(Self {
            game_id: source_game_id.to_string(),
            plays: Arc::new(plays),
            plays_per_second,
        })
    }

    fn normalize(row: &Map<String, Value>, game_id: &str, sequence: i64) -> GameState {
        let score_home = as_i32(row, "total_home_score").unwrap_or(0);
        let score_away = as_i32(row, "total_away_score").unwrap_or(0);

        let posteam = as_str(row, "posteam");
        let home_team = as_str(row, "home_team");
        let posteam_is_home = i32::from(matches!(
            (&posteam, &home_team),
            (Some(p), Some(h)) if p == h
        ));

        // receive_2h_ko: whoever did NOT take the opening kickoff gets the
        // second-half ball, so it is home_opening_kickoff XOR posteam_is_home.
        let home_opening_kickoff = as_i32(row, "home_opening_kickoff").unwrap_or(0);
        let receive_2h_ko = i32::from(home_opening_kickoff != posteam_is_home);

        GameState {
            game_id: game_id.to_string(),
            play_number: as_i32(row, "play_id").unwrap_or(sequence as i32 + 1),
            sequence,
            quarter: as_i32(row, "qtr").unwrap_or(1),
            quarter_seconds_remaining: as_i32(row, "quarter_seconds_remaining").unwrap_or(0),
            game_seconds_remaining: as_i32(row, "game_seconds_remaining").unwrap_or(0),
            half_seconds_remaining: as_i32(row, "half_seconds_remaining").unwrap_or(0),
            down: as_i32(row, "down"),
            yards_to_go: as_i32(row, "yards_to_go").or_else(|| as_i32(row, "ydstogo")),
            yardline_100: as_i32(row, "yardline_100"),
            posteam_abbr: posteam,
            defteam_abbr: as_str(row, "defteam"),
            posteam_is_home,
            receive_2h_ko,
            posteam_timeouts_remaining: as_i32(row, "posteam_timeouts_remaining").unwrap_or(3),
            defteam_timeouts_remaining: as_i32(row, "defteam_timeouts_remaining").unwrap_or(3),
            score_home,
            score_away,
            score_differential: score_home - score_away,
            spread_line: as_f64(row, "spread_line"),
            ep: as_f64(row, "ep"),
            play_type: as_str(row, "play_type"),
            description: as_str(row, "desc").or_else(|| as_str(row, "description")),
            raw_payload: row.clone(),
        }
    }
}

#[async_trait::async_trait]
impl PlayProvider for JsonlReplayProvider {
    async fn metadata(&self) -> Result<GameMetadata> {
        let first = self
            .plays
            .first()
            .ok_or_else(|| LivelineError::Provider("empty play source".to_string()))?;
        Ok(GameMetadata {
            game_id: self.game_id.clone(),
            home_team: as_str(&first.raw_payload, "home_team"),
            away_team: as_str(&first.raw_payload, "away_team"),
            season: as_i32(&first.raw_payload, "season"),
            week: as_i32(&first.raw_payload, "week"),
            total_plays: self.plays.len(),
        })
    }

    fn stream(&self) -> BoxStream<'static, GameState> {
        let plays = Arc::clone(&self.plays);
        let delay = Duration::from_secs_f64(1.0 / self.plays_per_second);

        stream::unfold(0usize, move |idx| {
            let plays = Arc::clone(&plays);
            async move {
                let play = plays.get(idx)?.clone();
                if idx > 0 {
                    tokio::time::sleep(delay).await;
                }
                Some((play, idx + 1))
            }
        })
        .boxed()
    }
}
