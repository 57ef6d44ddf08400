//! Logistic-regression win-probability model.
//!
//! Coefficients are trained offline on historical play-by-play outcomes and
//! serialized as JSON. Inference is a dot product plus sigmoid, fast enough
//! to run inline in the replay loop. Attributions are exact for a linear
//! model: contribution_i = coef_i * (x_i - mean_i), where mean_i is the
//! training-set feature mean stored with the model.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::features::{display_name, FeatureVector, FEATURE_COLS, NUM_FEATURES};
use super::WinProbModel;
use crate::domain::Attribution;
use crate::error::Result;

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    /// Date range of training data
    pub trained_on: String,
    pub n_samples: usize,
    /// Calibration metric (lower is better)
    pub brier_score: Option<f64>,
    pub log_loss: Option<f64>,
    pub calibrated: bool,
}

/// Logistic regression over the fixed feature contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticWinProbModel {
    pub intercept: f64,
    /// One coefficient per feature, in contract order
    pub coefficients: [f64; NUM_FEATURES],
    /// Training-set feature means, in contract order (attribution baseline)
    pub feature_means: [f64; NUM_FEATURES],
    pub metadata: ModelMetadata,
}

impl LogisticWinProbModel {
    /// Load model from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        Ok(model)
    }

    /// Save model to JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn logit(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.as_slice())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    /// Placeholder coefficients for tests and local demos.
    ///
    /// NOT a trained model; the signs are sensible (lead, field position and
    /// possession favor the home side as time runs out) but magnitudes are
    /// rough.
    pub fn default_untrained() -> Self {
        let mut coefficients = [0.0; NUM_FEATURES];
        coefficients[0] = -0.02; // down
        coefficients[1] = -0.01; // yards_to_go
        coefficients[2] = -0.004; // yardline_100 (far from opp end zone hurts)
        coefficients[5] = 0.16; // score_differential
        coefficients[6] = 0.08; // posteam_is_home
        coefficients[7] = 0.02; // posteam_timeouts_remaining
        coefficients[8] = -0.02; // defteam_timeouts_remaining
        coefficients[10] = -0.03; // spread_line
        coefficients[12] = 0.22; // diff_time_ratio: lead matters more late
        coefficients[13] = 0.015; // ep

        let mut feature_means = [0.0; NUM_FEATURES];
        feature_means[1] = 8.5;
        feature_means[2] = 50.0;
        feature_means[3] = 1800.0;
        feature_means[4] = 900.0;
        feature_means[6] = 0.5;
        feature_means[7] = 2.5;
        feature_means[8] = 2.5;
        feature_means[9] = 0.5;

        Self {
            intercept: 0.0,
            coefficients,
            feature_means,
            metadata: ModelMetadata {
                version: "0.1.0-untrained".to_string(),
                trained_on: "N/A".to_string(),
                n_samples: 0,
                brier_score: None,
                log_loss: None,
                calibrated: false,
            },
        }
    }
}

impl WinProbModel for LogisticWinProbModel {
    fn version(&self) -> &str {
        &self.metadata.version
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        Self::sigmoid(self.logit(features))
    }

    fn explain(&self, features: &FeatureVector, top_n: usize) -> Vec<Attribution> {
        let mut attributions: Vec<Attribution> = FEATURE_COLS
            .iter()
            .enumerate()
            .map(|(i, col)| Attribution {
                feature_name: col.to_string(),
                display_name: display_name(col).to_string(),
                value: self.coefficients[i] * (features.as_slice()[i] - self.feature_means[i]),
            })
            .collect();

        attributions.sort_by(|a, b| {
            b.value
                .abs()
                .partial_cmp(&a.value.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        attributions.truncate(top_n);
        attributions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameState;

    fn state_with(score_diff: i32, game_secs: i32) -> GameState {
        GameState {
            game_id: "g1".to_string(),
            play_number: 1,
            sequence: 0,
            quarter: 4,
            quarter_seconds_remaining: game_secs.min(900),
            game_seconds_remaining: game_secs,
            half_seconds_remaining: game_secs.min(1800),
            down: Some(1),
            yards_to_go: Some(10),
            yardline_100: Some(50),
            posteam_abbr: Some("KC".to_string()),
            defteam_abbr: Some("CIN".to_string()),
            posteam_is_home: 1,
            receive_2h_ko: 0,
            posteam_timeouts_remaining: 3,
            defteam_timeouts_remaining: 3,
            score_home: 20 + score_diff.max(0),
            score_away: 20 - score_diff.min(0),
            score_differential: score_diff,
            spread_line: None,
            ep: None,
            play_type: Some("run".to_string()),
            description: None,
            raw_payload: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((LogisticWinProbModel::sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(LogisticWinProbModel::sigmoid(10.0) > 0.99);
        assert!(LogisticWinProbModel::sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_lead_raises_home_probability() {
        let model = LogisticWinProbModel::default_untrained();
        let ahead = model.predict(&FeatureVector::from_state(&state_with(10, 300)));
        let behind = model.predict(&FeatureVector::from_state(&state_with(-10, 300)));
        assert!(
            ahead > 0.7,
            "up 10 late should be well above 70%, got {ahead:.3}"
        );
        assert!(behind < 0.3);
    }

    #[test]
    fn test_same_lead_counts_more_late() {
        let model = LogisticWinProbModel::default_untrained();
        let late = model.predict(&FeatureVector::from_state(&state_with(7, 120)));
        let early = model.predict(&FeatureVector::from_state(&state_with(7, 3000)));
        assert!(late > early, "a 7-point lead is worth more with 2:00 left");
    }

    #[test]
    fn test_explain_ranks_by_magnitude_and_truncates() {
        let model = LogisticWinProbModel::default_untrained();
        let features = FeatureVector::from_state(&state_with(14, 200));
        let attributions = model.explain(&features, 5);

        assert_eq!(attributions.len(), 5);
        for pair in attributions.windows(2) {
            assert!(pair[0].value.abs() >= pair[1].value.abs());
        }
        // A two-TD lead late should put the score terms on top
        assert!(attributions
            .iter()
            .take(2)
            .any(|a| a.feature_name == "score_differential"
                || a.feature_name == "diff_time_ratio"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let model = LogisticWinProbModel::default_untrained();
        let temp_path = std::env::temp_dir().join("liveline_test_wp_model.json");

        model.to_file(&temp_path).expect("failed to save model");
        let loaded = LogisticWinProbModel::from_file(&temp_path).expect("failed to load model");

        assert_eq!(model.intercept, loaded.intercept);
        assert_eq!(model.metadata.version, loaded.metadata.version);
        assert_eq!(model.coefficients, loaded.coefficients);

        std::fs::remove_file(&temp_path).ok();
    }
}
