//! Core domain types shared across the replay pipeline and analytics.

pub mod event;
pub mod play;
pub mod prediction;

pub use event::{GameEvent, GameStatus, PlayBroadcast};
pub use play::{GameMetadata, GameState, PlayRecord};
pub use prediction::{Attribution, PlayWithEstimate, ProbabilityEstimate};
