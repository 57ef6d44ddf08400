//! Play sources: capabilities that yield normalized plays for one game.

pub mod replay_file;

pub use replay_file::JsonlReplayProvider;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{GameMetadata, GameState};
use crate::error::Result;

/// A source of normalized plays for a single game.
///
/// `stream` yields plays in sequence order at the source's own pace and
/// terminates after the last play. The replay loop owns cancellation; a
/// provider only has to stop yielding when dropped.
#[async_trait]
pub trait PlayProvider: Send + Sync {
    /// Game-level metadata (teams, season, week, play count)
    async fn metadata(&self) -> Result<GameMetadata>;

    /// The paced sequence of plays, terminating after the last one
    fn stream(&self) -> BoxStream<'static, GameState>;
}
