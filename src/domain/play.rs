//! Play records: the normalized provider-side shape and the persisted row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One normalized play as produced by a play source, before persistence.
///
/// Field coverage mirrors the nflfastR play-by-play columns the model was
/// trained on. `sequence` is strictly increasing within a game and is the
/// canonical ordering key; `play_number` comes from the source and may
/// repeat or skip, so it must never be used for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub play_number: i32,
    pub sequence: i64,
    pub quarter: i32,
    /// Seconds remaining in the current quarter
    pub quarter_seconds_remaining: i32,
    /// Seconds remaining in the full game (0 at the final whistle)
    pub game_seconds_remaining: i32,
    /// Seconds remaining in the current half
    pub half_seconds_remaining: i32,
    pub down: Option<i32>,
    pub yards_to_go: Option<i32>,
    /// Distance from the opponent end zone (1-99), nflfastR convention
    pub yardline_100: Option<i32>,
    pub posteam_abbr: Option<String>,
    pub defteam_abbr: Option<String>,
    /// 1 if the possession team is the home team, else 0
    pub posteam_is_home: i32,
    /// 1 if the possession team receives the second-half kickoff
    pub receive_2h_ko: i32,
    pub posteam_timeouts_remaining: i32,
    pub defteam_timeouts_remaining: i32,
    pub score_home: i32,
    pub score_away: i32,
    pub score_differential: i32,
    /// Vegas pre-game spread, positive = home favored
    pub spread_line: Option<f64>,
    /// Expected points for the current possession
    pub ep: Option<f64>,
    pub play_type: Option<String>,
    pub description: Option<String>,
    /// Untouched source row, kept for audit
    #[serde(default)]
    pub raw_payload: serde_json::Map<String, serde_json::Value>,
}

/// A persisted play row, keyed by UUID with its game association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRecord {
    pub id: Uuid,
    pub game_id: String,
    pub play_number: i32,
    pub sequence: i64,
    pub quarter: i32,
    pub quarter_seconds_remaining: i32,
    pub down: Option<i32>,
    pub yards_to_go: Option<i32>,
    pub yardline_100: Option<i32>,
    pub posteam_abbr: Option<String>,
    pub score_home: i32,
    pub score_away: i32,
    pub play_type: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlayRecord {
    /// Build the persisted row for a normalized play.
    pub fn from_state(state: &GameState) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id: state.game_id.clone(),
            play_number: state.play_number,
            sequence: state.sequence,
            quarter: state.quarter,
            quarter_seconds_remaining: state.quarter_seconds_remaining,
            down: state.down,
            yards_to_go: state.yards_to_go,
            yardline_100: state.yardline_100,
            posteam_abbr: state.posteam_abbr.clone(),
            score_home: state.score_home,
            score_away: state.score_away,
            play_type: state.play_type.clone(),
            description: state.description.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn score_differential(&self) -> i32 {
        self.score_home - self.score_away
    }

    /// Total game seconds remaining derived from quarter + quarter clock.
    /// Overtime counts as the final period (no extra regulation time).
    pub fn game_seconds_remaining(&self) -> i32 {
        let q = self.quarter.min(4);
        (4 - q) * 900 + self.quarter_seconds_remaining
    }
}

/// Summary metadata a play source reports for a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub game_id: String,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub season: Option<i32>,
    pub week: Option<i32>,
    pub total_plays: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quarter: i32, quarter_secs: i32) -> PlayRecord {
        PlayRecord {
            id: Uuid::new_v4(),
            game_id: "g1".to_string(),
            play_number: 1,
            sequence: 0,
            quarter,
            quarter_seconds_remaining: quarter_secs,
            down: None,
            yards_to_go: None,
            yardline_100: None,
            posteam_abbr: None,
            score_home: 0,
            score_away: 0,
            play_type: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_game_seconds_from_quarter_clock() {
        // Start of Q1: 3 quarters ahead plus a full quarter clock
        assert_eq!(record(1, 900).game_seconds_remaining(), 3600);
        // Two minutes left in Q4
        assert_eq!(record(4, 120).game_seconds_remaining(), 120);
        // Overtime counts as the final period
        assert_eq!(record(5, 300).game_seconds_remaining(), 300);
    }
}
