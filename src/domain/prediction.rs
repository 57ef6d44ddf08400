//! Win-probability estimates and per-feature attributions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::play::PlayRecord;

/// One win-probability prediction tied to a play.
///
/// Re-computation may produce several estimates for the same play; readers
/// take the most recently predicted one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityEstimate {
    pub id: Uuid,
    pub play_id: Uuid,
    pub model_version: String,
    pub home_wp: f64,
    pub away_wp: f64,
    pub predicted_at: DateTime<Utc>,
}

impl ProbabilityEstimate {
    pub fn new(play_id: Uuid, model_version: &str, home_wp: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            play_id,
            model_version: model_version.to_string(),
            home_wp,
            away_wp: 1.0 - home_wp,
            predicted_at: Utc::now(),
        }
    }
}

/// A signed per-feature contribution to one estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub feature_name: String,
    pub display_name: String,
    pub value: f64,
}

/// A persisted play joined with its most recent estimate, the unit all
/// analytics operate on.
#[derive(Debug, Clone)]
pub struct PlayWithEstimate {
    pub play: PlayRecord,
    pub estimate: ProbabilityEstimate,
}
