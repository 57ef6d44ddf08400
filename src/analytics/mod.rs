//! Post-hoc analytics over the persisted play/probability history.
//!
//! All three products share the same input: (play, latest estimate) pairs
//! sorted by sequence. Administrative plays carry no real win-probability
//! signal and are excluded from delta computation, but their probability
//! still becomes the next play's baseline, so a delta always spans exactly one
//! processed play.

pub mod clutch;
pub mod decisions;
pub mod momentum;

pub use clutch::{ClutchDrive, ClutchPlay, ClutchReport, TeamClutchTotals};
pub use decisions::{CoachDecision, DecisionOption, DecisionReport, FourthDownCall, Grade};
pub use momentum::{MomentumReport, MomentumSwing, SwingTag};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{PlayRecord, PlayWithEstimate};
use crate::error::{LivelineError, Result};
use crate::persistence::RecordStore;

/// Play types with no real win-probability signal
const JUNK_PLAY_TYPES: [&str; 8] = [
    "no_play",
    "qb_kneel",
    "qb_spike",
    "timeout",
    "end_of_quarter",
    "end_of_half",
    "end_of_game",
    "extra_point",
];

/// Description prefixes marking administrative end-of-period rows
const JUNK_DESC_PREFIXES: [&str; 6] = [
    "end quarter",
    "end game",
    "end of game",
    "end half",
    "end of half",
    "two-minute warning",
];

/// Administrative / non-action plays excluded from analytics deltas.
/// A missing play type marks the same end-of-period rows.
pub fn is_junk_play(play: &PlayRecord) -> bool {
    let Some(play_type) = play.play_type.as_deref() else {
        return true;
    };
    if JUNK_PLAY_TYPES.contains(&play_type.to_lowercase().as_str()) {
        return true;
    }
    let desc = play
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    JUNK_DESC_PREFIXES.iter().any(|p| desc.starts_with(p))
}

/// Compact play reference carried in every analytics row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRef {
    pub play_id: Uuid,
    pub sequence: i64,
    pub quarter: i32,
    pub quarter_seconds_remaining: i32,
    pub description: Option<String>,
}

impl From<&PlayRecord> for PlayRef {
    fn from(play: &PlayRecord) -> Self {
        Self {
            play_id: play.id,
            sequence: play.sequence,
            quarter: play.quarter,
            quarter_seconds_remaining: play.quarter_seconds_remaining,
            description: play.description.clone(),
        }
    }
}

/// One non-junk play with its probability movement, in sequence order.
pub(crate) struct ScoredDelta<'a> {
    pub pair: &'a PlayWithEstimate,
    pub wp_before: f64,
    pub delta: f64,
}

/// Per-play home-probability deltas. Junk plays contribute no delta but
/// always advance the baseline.
pub(crate) fn probability_deltas(pairs: &[PlayWithEstimate]) -> Vec<ScoredDelta<'_>> {
    let mut deltas = Vec::new();
    let Some(first) = pairs.first() else {
        return deltas;
    };

    let mut prev_wp = first.estimate.home_wp;
    for pair in &pairs[1..] {
        if is_junk_play(&pair.play) {
            prev_wp = pair.estimate.home_wp;
            continue;
        }
        deltas.push(ScoredDelta {
            pair,
            wp_before: prev_wp,
            delta: pair.estimate.home_wp - prev_wp,
        });
        prev_wp = pair.estimate.home_wp;
    }
    deltas
}

/// On-demand analytics over the persisted history of one game.
pub struct AnalyticsEngine {
    store: Arc<dyn RecordStore>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn load(&self, game_id: &str) -> Result<(Vec<PlayWithEstimate>, Option<String>)> {
        let meta = self
            .store
            .get_game(game_id)
            .await?
            .ok_or_else(|| LivelineError::GameNotFound(game_id.to_string()))?;
        let pairs = self.store.load_plays_with_estimates(game_id).await?;
        Ok((pairs, meta.home_team))
    }

    pub async fn momentum(&self, game_id: &str, top: usize) -> Result<MomentumReport> {
        let (pairs, _) = self.load(game_id).await?;
        Ok(momentum::momentum_swings(game_id, &pairs, top))
    }

    pub async fn clutch(&self, game_id: &str, top: usize) -> Result<ClutchReport> {
        let (pairs, home_team) = self.load(game_id).await?;
        Ok(clutch::clutch_index(
            game_id,
            home_team.as_deref(),
            &pairs,
            top,
        ))
    }

    pub async fn decisions(&self, game_id: &str, top: usize) -> Result<DecisionReport> {
        let (pairs, _) = self.load(game_id).await?;
        Ok(decisions::decision_grades(game_id, &pairs, top))
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{pair, pair_full};
    use super::*;
    use crate::domain::GameMetadata;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_junk_play_detection() {
        let timeout = pair_full(0, 0.5, Some("timeout"), None);
        assert!(is_junk_play(&timeout.play));

        let no_type = pair_full(0, 0.5, None, Some("some row"));
        assert!(is_junk_play(&no_type.play));

        let end_marker = pair_full(0, 0.5, Some("pass"), Some("END QUARTER 2"));
        assert!(is_junk_play(&end_marker.play));

        let real = pair_full(0, 0.5, Some("pass"), Some("pass deep right"));
        assert!(!is_junk_play(&real.play));
    }

    #[test]
    fn test_junk_advances_baseline_without_a_delta() {
        let pairs = vec![
            pair(0, 0.50),
            pair_full(1, 0.58, Some("timeout"), None), // junk, new baseline
            pair(2, 0.60),
        ];
        let deltas = probability_deltas(&pairs);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].pair.play.sequence, 2);
        // Delta measured against the junk play's probability, not play 0's
        assert!((deltas[0].delta - 0.02).abs() < 1e-9);
        assert!((deltas[0].wp_before - 0.58).abs() < 1e-9);
    }

    #[test]
    fn test_fewer_than_two_plays_has_no_deltas() {
        assert!(probability_deltas(&[]).is_empty());
        assert!(probability_deltas(&[pair(0, 0.5)]).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let engine = AnalyticsEngine::new(Arc::new(MemoryStore::new()));
        let err = engine.momentum("missing", 3).await.unwrap_err();
        assert!(matches!(err, LivelineError::GameNotFound(_)));
    }

    #[tokio::test]
    async fn test_known_game_with_no_plays_is_empty_report() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_game(&GameMetadata {
                game_id: "g1".to_string(),
                home_team: Some("KC".to_string()),
                away_team: Some("CIN".to_string()),
                season: Some(2022),
                week: Some(20),
                total_plays: 0,
            })
            .await
            .unwrap();

        let engine = AnalyticsEngine::new(store);
        let report = engine.momentum("g1", 3).await.unwrap();
        assert!(report.swings.is_empty());
    }
}
