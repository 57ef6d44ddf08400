//! Clutch index: how much each swing mattered, weighted by time pressure
//! and game closeness.

use serde::{Deserialize, Serialize};

use super::{probability_deltas, PlayRef};
use crate::domain::PlayWithEstimate;

const MAX_PLAYS: usize = 20;
const TOP_DRIVES: usize = 5;

/// Seconds remaining when the clutch window opens (last ~15 minutes)
const TIME_THRESHOLD: f64 = 900.0;
/// Steepness of the time sigmoid
const TIME_STEEPNESS: f64 = 300.0;
/// Score scale: one touchdown
const SCORE_SCALE: f64 = 7.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClutchPlay {
    pub rank: usize,
    pub play: PlayRef,
    pub delta_wp: f64,
    pub clutch_score: f64,
    pub time_factor: f64,
    pub close_factor: f64,
    pub score_diff: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClutchDrive {
    pub drive_number: usize,
    pub posteam_abbr: Option<String>,
    pub clutch_total: f64,
    pub play_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamClutchTotals {
    pub offense: f64,
    pub defense: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClutchReport {
    pub game_id: String,
    pub top_plays: Vec<ClutchPlay>,
    pub top_drives: Vec<ClutchDrive>,
    pub home: TeamClutchTotals,
    pub away: TeamClutchTotals,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Rises smoothly from ~0 to ~1 as the game approaches its final minutes.
fn time_factor(game_seconds_remaining: f64) -> f64 {
    sigmoid((TIME_THRESHOLD - game_seconds_remaining) / TIME_STEEPNESS)
}

/// Highest when the score is tied, decaying as one team pulls away.
fn close_factor(score_diff: i32) -> f64 {
    (-(score_diff.abs() as f64) / SCORE_SCALE).exp()
}

/// Clutch scores for every non-junk play, plus drive and team aggregates.
pub fn clutch_index(
    game_id: &str,
    home_abbr: Option<&str>,
    pairs: &[PlayWithEstimate],
    top: usize,
) -> ClutchReport {
    let top = top.clamp(1, MAX_PLAYS);

    // (clutch, delta, tf, cf, score_diff, pair) in chronological order
    let scored: Vec<_> = probability_deltas(pairs)
        .into_iter()
        .map(|d| {
            let play = &d.pair.play;
            let tf = time_factor(play.game_seconds_remaining() as f64);
            let cf = close_factor(play.score_differential());
            let clutch = d.delta.abs() * tf * cf;
            (clutch, d.delta, tf, cf, play.score_differential(), d.pair)
        })
        .collect();

    // Top plays by clutch score
    let mut ranked: Vec<_> = scored.iter().collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let top_plays: Vec<ClutchPlay> = ranked
        .iter()
        .take(top)
        .enumerate()
        .map(|(idx, (clutch, delta, tf, cf, score_diff, pair))| ClutchPlay {
            rank: idx + 1,
            play: (&pair.play).into(),
            delta_wp: *delta,
            clutch_score: *clutch,
            time_factor: *tf,
            close_factor: *cf,
            score_diff: *score_diff,
        })
        .collect();

    // Drive aggregation: consecutive plays with the same possession team.
    // Raw equality on the team code: a play with no possession team groups
    // only with adjacent possession-less plays, so a lone kickoff forms a
    // one-play synthetic drive.
    let mut drives: Vec<ClutchDrive> = Vec::new();
    let mut current_posteam: Option<Option<String>> = None;
    for (clutch, _, _, _, _, pair) in &scored {
        let posteam = pair.play.posteam_abbr.clone();
        if current_posteam.as_ref() != Some(&posteam) {
            current_posteam = Some(posteam.clone());
            drives.push(ClutchDrive {
                drive_number: drives.len() + 1,
                posteam_abbr: posteam,
                clutch_total: 0.0,
                play_count: 0,
            });
        }
        let drive = drives.last_mut().expect("drive opened above");
        drive.clutch_total += clutch;
        drive.play_count += 1;
    }
    drives.sort_by(|a, b| {
        b.clutch_total
            .partial_cmp(&a.clutch_total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    drives.truncate(TOP_DRIVES);

    // Team totals: credit the possession team's offense when the swing went
    // its way, otherwise the opposing defense (a turnover is a defensive
    // play, not an offensive debit).
    let mut home = TeamClutchTotals::default();
    let mut away = TeamClutchTotals::default();
    for (clutch, delta, _, _, _, pair) in &scored {
        let home_has_ball = match (pair.play.posteam_abbr.as_deref(), home_abbr) {
            (Some(posteam), Some(home)) => posteam == home,
            _ => false,
        };
        if home_has_ball {
            if *delta > 0.0 {
                home.offense += clutch;
            } else {
                away.defense += clutch;
            }
        } else if *delta < 0.0 {
            away.offense += clutch;
        } else {
            home.defense += clutch;
        }
    }

    ClutchReport {
        game_id: game_id.to_string(),
        top_plays,
        top_drives: drives,
        home,
        away,
    }
}
