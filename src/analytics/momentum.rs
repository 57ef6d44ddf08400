//! Momentum swings: the plays that moved win probability the most.

use serde::{Deserialize, Serialize};

use super::{probability_deltas, PlayRef};
use crate::domain::{PlayRecord, PlayWithEstimate};

const MAX_SWINGS: usize = 10;

/// What kind of play produced the swing. First keyword match wins; tags are
/// mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingTag {
    Turnover,
    Touchdown,
    FieldGoal,
    FourthDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumSwing {
    /// 1 = largest swing of the game
    pub rank: usize,
    pub play: PlayRef,
    pub wp_before: f64,
    pub wp_after: f64,
    pub delta_wp: f64,
    pub magnitude: f64,
    pub tag: Option<SwingTag>,
    pub is_turning_point: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumReport {
    pub game_id: String,
    /// Chronological order; `rank` carries the magnitude ordering
    pub swings: Vec<MomentumSwing>,
}

fn tag_play(play: &PlayRecord) -> Option<SwingTag> {
    let desc = play
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let play_type = play.play_type.as_deref().unwrap_or_default().to_lowercase();

    if desc.contains("intercept") || desc.contains("fumble") {
        return Some(SwingTag::Turnover);
    }
    if desc.contains("touchdown") || desc.contains(" td") {
        return Some(SwingTag::Touchdown);
    }
    if desc.contains("field goal") && desc.contains("good") {
        return Some(SwingTag::FieldGoal);
    }
    if play.down == Some(4)
        && matches!(
            play_type.as_str(),
            "run" | "pass" | "pass_incomplete" | "pass_complete" | "qb_scramble"
        )
    {
        return Some(SwingTag::FourthDown);
    }
    None
}

/// Top-N swings by |delta|, re-presented chronologically with rank assigned
/// by magnitude. The single largest swing is the turning point.
pub fn momentum_swings(
    game_id: &str,
    pairs: &[PlayWithEstimate],
    top: usize,
) -> MomentumReport {
    let top = top.clamp(1, MAX_SWINGS);

    let mut deltas = probability_deltas(pairs);
    deltas.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    deltas.truncate(top);

    let mut swings: Vec<MomentumSwing> = deltas
        .iter()
        .enumerate()
        .map(|(idx, scored)| MomentumSwing {
            rank: idx + 1,
            play: (&scored.pair.play).into(),
            wp_before: scored.wp_before,
            wp_after: scored.pair.estimate.home_wp,
            delta_wp: scored.delta,
            magnitude: scored.delta.abs(),
            tag: tag_play(&scored.pair.play),
            is_turning_point: idx == 0,
        })
        .collect();

    swings.sort_by_key(|s| s.play.sequence);

    MomentumReport {
        game_id: game_id.to_string(),
        swings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{pair, pair_full};

    #[test]
    fn test_top_two_swings_ranked_by_magnitude_listed_chronologically() {
        // Home probability path: 0.50 -> 0.55 -> 0.40 -> 0.90 -> 0.85
        let pairs = vec![
            pair(0, 0.50),
            pair(1, 0.55),
            pair(2, 0.40),
            pair(3, 0.90),
            pair(4, 0.85),
        ];

        let report = momentum_swings("g1", &pairs, 2);
        assert_eq!(report.swings.len(), 2);

        // Chronological output: the -0.15 swing (seq 2) before the +0.50 one
        assert_eq!(report.swings[0].play.sequence, 2);
        assert!((report.swings[0].delta_wp - (-0.15)).abs() < 1e-9);
        assert_eq!(report.swings[0].rank, 2);
        assert!(!report.swings[0].is_turning_point);

        assert_eq!(report.swings[1].play.sequence, 3);
        assert!((report.swings[1].delta_wp - 0.50).abs() < 1e-9);
        assert_eq!(report.swings[1].rank, 1);
        assert!(report.swings[1].is_turning_point);
    }

    #[test]
    fn test_top_is_clamped() {
        let pairs = vec![pair(0, 0.5), pair(1, 0.6), pair(2, 0.4)];
        let report = momentum_swings("g1", &pairs, 50);
        assert!(report.swings.len() <= MAX_SWINGS);

        let report = momentum_swings("g1", &pairs, 0);
        assert_eq!(report.swings.len(), 1);
    }

    #[test]
    fn test_tags_are_mutually_exclusive_first_match_wins() {
        // An interception returned for a touchdown tags as turnover
        let p = pair_full(
            1,
            0.3,
            Some("pass"),
            Some("pass intercepted, returned for touchdown"),
        );
        assert_eq!(tag_play(&p.play), Some(SwingTag::Turnover));

        let td = pair_full(1, 0.7, Some("pass"), Some("pass complete, TOUCHDOWN"));
        assert_eq!(tag_play(&td.play), Some(SwingTag::Touchdown));

        let fg = pair_full(1, 0.6, Some("field_goal"), Some("43 yard field goal is GOOD"));
        assert_eq!(tag_play(&fg.play), Some(SwingTag::FieldGoal));

        let mut fourth = pair_full(1, 0.6, Some("run"), Some("run up the middle"));
        fourth.play.down = Some(4);
        assert_eq!(tag_play(&fourth.play), Some(SwingTag::FourthDown));

        let plain = pair_full(1, 0.55, Some("run"), Some("run left end"));
        assert_eq!(tag_play(&plain.play), None);
    }

    #[test]
    fn test_empty_history_yields_empty_report() {
        let report = momentum_swings("g1", &[], 3);
        assert!(report.swings.is_empty());
    }
}
