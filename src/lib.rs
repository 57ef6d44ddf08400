pub mod analytics;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod error;
pub mod ml;
pub mod persistence;
pub mod providers;
pub mod replay;

pub use analytics::AnalyticsEngine;
pub use broadcast::{EventBus, Subscription};
pub use config::AppConfig;
pub use domain::{
    Attribution, GameEvent, GameMetadata, GameState, PlayRecord, PlayWithEstimate,
    ProbabilityEstimate,
};
pub use error::{LivelineError, Result};
pub use ml::{FeatureVector, LogisticWinProbModel, ModelRegistry, WinProbModel};
pub use persistence::{MemoryStore, PostgresStore, RecordStore};
pub use providers::{JsonlReplayProvider, PlayProvider};
pub use replay::ReplayManager;
