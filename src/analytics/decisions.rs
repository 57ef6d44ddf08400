//! Fourth-down decision grades.
//!
//! For every graded fourth down, build counterfactual win probabilities for
//! go-for-it / punt / field-goal anchored on the probability before the
//! play, then grade the called play against the best available option. The
//! conversion table, punt yardage and field-goal curve are fixed parameters
//! calibrated to league-average historical aggregates; they are deliberately
//! independent of the live inference model.

use serde::{Deserialize, Serialize};

use super::{is_junk_play, PlayRef};
use crate::domain::{PlayRecord, PlayWithEstimate};

const MAX_DECISIONS: usize = 50;

/// League-average 4th-down conversion rate by yards-to-go bucket
const CONVERSION_RATES: [(i32, i32, f64); 6] = [
    (1, 1, 0.68),
    (2, 2, 0.62),
    (3, 3, 0.56),
    (4, 5, 0.50),
    (6, 10, 0.38),
    (11, 99, 0.22),
];

/// League-average net punt distance and the touchback spot
const NET_PUNT_YARDS: i32 = 42;
const TOUCHBACK_YARDLINE: i32 = 25;

/// Punting only makes sense outside field-goal territory
const PUNT_MIN_YARDLINE: i32 = 45;
/// Practical field-goal range (yardline_100)
const FG_MAX_YARDLINE: i32 = 52;
/// Snap depth plus end-zone depth added to the yardline for kick distance
const KICK_DISTANCE_OFFSET: i32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FourthDownCall {
    GoForIt,
    Punt,
    FieldGoal,
}

impl FourthDownCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoForIt => "go_for_it",
            Self::Punt => "punt",
            Self::FieldGoal => "field_goal",
        }
    }
}

/// Grade bands on decision_delta (inclusive lower bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Optimal,
    Questionable,
    Bad,
    VeryBad,
}

impl Grade {
    fn from_delta(decision_delta: f64) -> Self {
        if decision_delta >= -0.005 {
            Self::Optimal
        } else if decision_delta >= -0.020 {
            Self::Questionable
        } else if decision_delta >= -0.050 {
            Self::Bad
        } else {
            Self::VeryBad
        }
    }
}

/// One counterfactual action with its estimated win probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub wp: f64,
    pub detail: String,
}

/// The three candidate actions; an action whose precondition fails is
/// absent, not zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternatives {
    pub go_for_it: Option<DecisionOption>,
    pub punt: Option<DecisionOption>,
    pub field_goal: Option<DecisionOption>,
}

impl Alternatives {
    fn wp_of(&self, call: FourthDownCall) -> Option<f64> {
        match call {
            FourthDownCall::GoForIt => self.go_for_it.as_ref().map(|o| o.wp),
            FourthDownCall::Punt => self.punt.as_ref().map(|o| o.wp),
            FourthDownCall::FieldGoal => self.field_goal.as_ref().map(|o| o.wp),
        }
    }

    fn best(&self) -> Option<(FourthDownCall, f64)> {
        [
            FourthDownCall::GoForIt,
            FourthDownCall::Punt,
            FourthDownCall::FieldGoal,
        ]
        .into_iter()
        .filter_map(|call| self.wp_of(call).map(|wp| (call, wp)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachDecision {
    pub play: PlayRef,
    /// e.g. "4th & 2 at OPP 38"
    pub situation: String,
    pub actual: FourthDownCall,
    pub actual_wp_after: f64,
    pub alternatives: Alternatives,
    pub best_action: FourthDownCall,
    /// actual - best, always <= 0
    pub decision_delta: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReport {
    pub game_id: String,
    pub decisions: Vec<CoachDecision>,
}

fn conversion_rate(yards_to_go: Option<i32>) -> f64 {
    let ydg = yards_to_go.unwrap_or(10);
    CONVERSION_RATES
        .iter()
        .find(|(lo, hi, _)| ydg >= *lo && ydg <= *hi)
        .map(|(_, _, rate)| *rate)
        .unwrap_or(0.22)
}

/// P(field goal is good) for a kick distance in yards, fit to league
/// averages: 20 yd ~ 0.98, 40 yd ~ 0.87, 50 yd ~ 0.72, 60 yd ~ 0.52
fn fg_make_prob(kick_distance: f64) -> f64 {
    1.0 / (1.0 + (0.10 * (kick_distance - 37.0)).exp())
}

/// Opponent field position after a punt (their yardline_100), with the
/// touchback floor.
fn punt_expected_field_pos(yardline_100: i32) -> i32 {
    (yardline_100 - NET_PUNT_YARDS).max(TOUCHBACK_YARDLINE)
}

fn classify_actual(play: &PlayRecord) -> Option<FourthDownCall> {
    let play_type = play.play_type.as_deref().unwrap_or_default().to_lowercase();
    let desc = play
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    if play_type == "punt" {
        return Some(FourthDownCall::Punt);
    }
    if play_type == "field_goal" || play_type == "fg" || desc.contains("field goal") {
        return Some(FourthDownCall::FieldGoal);
    }
    if matches!(
        play_type.as_str(),
        "run" | "pass" | "qb_scramble" | "pass_incomplete" | "pass_complete"
    ) || play_type.contains("pass")
        || play_type.contains("rush")
        || play_type.contains("run")
    {
        return Some(FourthDownCall::GoForIt);
    }
    None
}

fn situation(play: &PlayRecord) -> String {
    let ydg = play
        .yards_to_go
        .map(|y| y.to_string())
        .unwrap_or_else(|| "?".to_string());
    let field = match play.yardline_100 {
        Some(yl) if yl <= 50 => format!("OPP {}", yl),
        Some(yl) => format!("OWN {}", 100 - yl),
        None => "?".to_string(),
    };
    format!("4th & {} at {}", ydg, field)
}

/// Counterfactual win probabilities for all three actions, anchored on the
/// probability immediately before the play. Each action is a binary gamble:
/// wp = p_success * wp_success_state + (1 - p_success) * wp_fail_state,
/// with the state probabilities approximated as wp_before plus or minus a
/// field-position- and time-scaled shift.
fn build_alternatives(play: &PlayRecord, wp_before: f64) -> Alternatives {
    let yardline_100 = play.yardline_100.unwrap_or(50);
    let p_conv = conversion_rate(play.yards_to_go);
    let game_secs = play.game_seconds_remaining() as f64;
    // 0 at kickoff, 1 at the final whistle
    let time_pressure = 1.0 - game_secs / 3600.0;

    // go_for_it: converting is worth more near the opponent end zone;
    // a failed attempt hands over progressively worse field position deep
    // in one's own territory.
    let field_value = (100 - yardline_100) as f64 / 100.0;
    let success_gain = 0.08 + 0.10 * field_value;
    let fail_loss = 0.12 + 0.08 * (1.0 - field_value);
    let wp_success = (wp_before + success_gain).min(0.97);
    let wp_fail = (wp_before - fail_loss).max(0.03);
    let wp_go = p_conv * wp_success + (1.0 - p_conv) * wp_fail;
    let go_for_it = Some(DecisionOption {
        wp: wp_go,
        detail: format!("p_conv={:.0}%", p_conv * 100.0),
    });

    // punt: only outside field-goal territory. Flips possession but buys
    // field position; blended heavily toward the baseline so a punt never
    // produces an implausible probability jump.
    let punt = if yardline_100 > PUNT_MIN_YARDLINE {
        let opp_field_pos = punt_expected_field_pos(yardline_100);
        let net_yards = yardline_100 - opp_field_pos;
        let field_pos_benefit = (net_yards as f64 / 10.0) * 0.03;
        let direction = if wp_before >= 0.50 { 1.0 } else { -1.0 };
        let wp_punt = (0.50 + field_pos_benefit * direction).clamp(0.25, 0.75);
        let wp_punt = 0.4 * wp_punt + 0.6 * wp_before;
        Some(DecisionOption {
            wp: wp_punt,
            detail: format!("expected_net={} yds", net_yards),
        })
    } else {
        None
    };

    // field_goal: only within practical range. Three points swing more when
    // the game is close and late; a miss hands over the ball near the spot.
    let field_goal = if yardline_100 <= FG_MAX_YARDLINE {
        let kick_distance = (yardline_100 + KICK_DISTANCE_OFFSET) as f64;
        let p_make = fg_make_prob(kick_distance);
        let mut points_value = 0.05 + 0.06 * time_pressure;
        if play.score_differential().abs() <= 3 {
            points_value *= 1.5;
        }
        let wp_made = (wp_before + points_value).min(0.95);
        let miss_penalty = 0.04 + 0.06 * time_pressure;
        let wp_missed = (wp_before - miss_penalty).max(0.05);
        let wp_fg = p_make * wp_made + (1.0 - p_make) * wp_missed;
        Some(DecisionOption {
            wp: wp_fg,
            detail: format!("p_make={:.0}%, dist={} yds", p_make * 100.0, kick_distance),
        })
    } else {
        None
    };

    Alternatives {
        go_for_it,
        punt,
        field_goal,
    }
}

/// Grade every qualifying fourth-down call, worst leverage first.
pub fn decision_grades(
    game_id: &str,
    pairs: &[PlayWithEstimate],
    top: usize,
) -> DecisionReport {
    let top = top.clamp(1, MAX_DECISIONS);

    let mut decisions: Vec<CoachDecision> = Vec::new();
    let mut prev_wp = pairs.first().map(|p| p.estimate.home_wp).unwrap_or(0.5);

    for pair in pairs {
        let play = &pair.play;
        let wp_after = pair.estimate.home_wp;

        if play.down != Some(4) || is_junk_play(play) {
            prev_wp = wp_after;
            continue;
        }
        // End-of-game kneels and victory formation are not decisions
        let desc = play
            .description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if desc.contains("kneel") || desc.contains("victory") {
            prev_wp = wp_after;
            continue;
        }

        let Some(actual) = classify_actual(play) else {
            prev_wp = wp_after;
            continue;
        };

        let alternatives = build_alternatives(play, prev_wp);
        let Some((best_action, best_wp)) = alternatives.best() else {
            prev_wp = wp_after;
            continue;
        };
        let actual_wp = alternatives.wp_of(actual).unwrap_or(wp_after);
        let decision_delta = actual_wp - best_wp;

        decisions.push(CoachDecision {
            play: play.into(),
            situation: situation(play),
            actual,
            actual_wp_after: wp_after,
            alternatives,
            best_action,
            decision_delta,
            grade: Grade::from_delta(decision_delta),
        });
        prev_wp = wp_after;
    }

    decisions.sort_by(|a, b| {
        b.decision_delta
            .abs()
            .partial_cmp(&a.decision_delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    decisions.truncate(top);

    DecisionReport {
        game_id: game_id.to_string(),
        decisions,
    }
}
