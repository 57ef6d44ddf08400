//! Win-probability inference: feature contract, model, and registry.

pub mod features;
pub mod model;
pub mod registry;

pub use features::{FeatureVector, FEATURE_COLS, NUM_FEATURES};
pub use model::{LogisticWinProbModel, ModelMetadata};
pub use registry::ModelRegistry;

use crate::domain::Attribution;

/// Black-box win-probability capability.
///
/// Implementations take the fixed-order feature vector and return the home
/// team's win probability plus ranked signed per-feature contributions. The
/// feature order is a contract: it must not change without a model version
/// bump.
pub trait WinProbModel: Send + Sync + std::fmt::Debug {
    /// Model version identifier recorded with every estimate
    fn version(&self) -> &str;

    /// Home-team win probability in [0, 1]
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Top-N features by absolute contribution, descending
    fn explain(&self, features: &FeatureVector, top_n: usize) -> Vec<Attribution>;
}
