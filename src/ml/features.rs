//! Fixed-order feature extraction from a normalized play.
//!
//! The column order below is a contract with the trained model: do not
//! reorder without retraining and bumping the model version. The two derived
//! columns (spread_time, diff_time_ratio) are computed here at extraction
//! time; they are not raw inputs.

use crate::domain::GameState;

/// Feature columns in model input order.
pub const FEATURE_COLS: [&str; 14] = [
    "down",
    "yards_to_go",
    "yardline_100",
    "game_seconds_remaining",
    "half_seconds_remaining",
    "score_differential",
    "posteam_is_home",
    "posteam_timeouts_remaining",
    "defteam_timeouts_remaining",
    "receive_2h_ko",
    "spread_line",
    "spread_time",
    "diff_time_ratio",
    "ep",
];

pub const NUM_FEATURES: usize = FEATURE_COLS.len();

/// Fill values for absent inputs (safe neutral defaults, not imputed)
const FILL_VALUES: [f64; NUM_FEATURES] = [
    0.0,    // down: 0 = no scrimmage play (kickoff, PAT, etc.)
    10.0,   // yards_to_go
    50.0,   // yardline_100
    3600.0, // game_seconds_remaining
    1800.0, // half_seconds_remaining
    0.0,    // score_differential
    0.5,    // posteam_is_home: unknown possession team
    3.0,    // posteam_timeouts_remaining
    3.0,    // defteam_timeouts_remaining
    0.0,    // receive_2h_ko
    0.0,    // spread_line
    0.0,    // spread_time
    0.0,    // diff_time_ratio
    0.0,    // ep: neutral EP for non-standard plays
];

/// Human-readable labels for the attribution panel
const DISPLAY_NAMES: [&str; NUM_FEATURES] = [
    "Down",
    "Yards to Go",
    "Field Position",
    "Time Remaining",
    "Half Time Remaining",
    "Score Differential",
    "Possession (Home)",
    "Offense Timeouts",
    "Defense Timeouts",
    "Receives 2nd-Half Kickoff",
    "Pre-game Spread",
    "Spread x Time Remaining",
    "Lead x Time Elapsed",
    "Expected Points",
];

/// Display label for a feature column name.
pub fn display_name(feature: &str) -> &'static str {
    FEATURE_COLS
        .iter()
        .position(|c| *c == feature)
        .map(|i| DISPLAY_NAMES[i])
        .unwrap_or("Unknown")
}

/// A model input row in contract order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub [f64; NUM_FEATURES]);

impl FeatureVector {
    /// Extract model features from a normalized play, applying fill values
    /// for absent inputs and computing the derived columns.
    pub fn from_state(state: &GameState) -> Self {
        let game_secs = state.game_seconds_remaining as f64;
        let spread = state.spread_line.unwrap_or(FILL_VALUES[10]);
        let score_diff = state.score_differential as f64;

        let spread_time = spread * (game_secs / 3600.0);
        let diff_time_ratio = score_diff * (1.0 - game_secs / 3600.0);

        // posteam_is_home is only meaningful when possession is known
        let posteam_is_home = if state.posteam_abbr.is_some() {
            state.posteam_is_home as f64
        } else {
            FILL_VALUES[6]
        };

        Self([
            state.down.map(|d| d as f64).unwrap_or(FILL_VALUES[0]),
            state
                .yards_to_go
                .map(|y| y as f64)
                .unwrap_or(FILL_VALUES[1]),
            state
                .yardline_100
                .map(|y| y as f64)
                .unwrap_or(FILL_VALUES[2]),
            game_secs,
            state.half_seconds_remaining as f64,
            score_diff,
            posteam_is_home,
            state.posteam_timeouts_remaining as f64,
            state.defteam_timeouts_remaining as f64,
            state.receive_2h_ko as f64,
            spread,
            spread_time,
            diff_time_ratio,
            state.ep.unwrap_or(FILL_VALUES[13]),
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
