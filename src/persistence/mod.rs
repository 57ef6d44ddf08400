//! Durable storage of games, plays, predictions and attributions.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::domain::{Attribution, GameMetadata, PlayRecord, PlayWithEstimate, ProbabilityEstimate};
use crate::error::Result;

/// Append/query capability the replay pipeline and analytics run against.
///
/// `record_play` is atomic per play: either the play row, its estimate and
/// its attributions all become visible, or none do. The replay loop relies
/// on this to keep a failed play from leaving partial rows behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Register (or refresh) a game before its first play is written
    async fn upsert_game(&self, meta: &GameMetadata) -> Result<()>;

    async fn get_game(&self, game_id: &str) -> Result<Option<GameMetadata>>;

    /// Atomically append one play with its estimate and attributions
    async fn record_play(
        &self,
        play: &PlayRecord,
        raw_payload: &serde_json::Value,
        estimate: &ProbabilityEstimate,
        attributions: &[Attribution],
    ) -> Result<()>;

    /// All plays for a game that have at least one estimate, ordered by
    /// sequence, each paired with its most recent estimate
    async fn load_plays_with_estimates(&self, game_id: &str) -> Result<Vec<PlayWithEstimate>>;
}
