//! Outbound events fanned out to live viewers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::play::PlayRecord;
use super::prediction::Attribution;

/// Game lifecycle status carried on status-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Final => "final",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Play fields exposed to viewers (the persisted row minus audit columns).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayBroadcast {
    pub id: Uuid,
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
}

impl From<&PlayRecord> for PlayBroadcast {
    fn from(play: &PlayRecord) -> Self {
        Self {
            id: play.id,
            play_number: play.play_number,
            sequence: play.sequence,
            quarter: play.quarter,
            quarter_seconds_remaining: play.quarter_seconds_remaining,
            down: play.down,
            yards_to_go: play.yards_to_go,
            yardline_100: play.yardline_100,
            posteam_abbr: play.posteam_abbr.clone(),
            score_home: play.score_home,
            score_away: play.score_away,
            play_type: play.play_type.clone(),
            description: play.description.clone(),
        }
    }
}

/// The discriminated event union pushed over the stream transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    PlayUpdate {
        game_id: String,
        play: PlayBroadcast,
        home_wp: f64,
        away_wp: f64,
        top_attributions: Vec<Attribution>,
    },
    GameStatusChange {
        game_id: String,
        status: GameStatus,
        home_score: i32,
        away_score: i32,
    },
    ReplayComplete {
        game_id: String,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> &str {
        match self {
            Self::PlayUpdate { game_id, .. } => game_id,
            Self::GameStatusChange { game_id, .. } => game_id,
            Self::ReplayComplete { game_id } => game_id,
        }
    }
}
