//! Ephemeral per-replay session state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Replay session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => write!(f, "running"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Live handle to a running replay task.
///
/// The task outlives the request that started it; cancellation is a flag the
/// replay loop observes between plays, so the in-flight play always finishes
/// before the session exits.
pub struct SessionHandle {
    pub game_id: String,
    cancelled: Arc<AtomicBool>,
    plays_processed: Arc<AtomicU64>,
    pub join: JoinHandle<()>,
}

impl SessionHandle {
    pub fn new(
        game_id: &str,
        cancelled: Arc<AtomicBool>,
        plays_processed: Arc<AtomicU64>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            game_id: game_id.to_string(),
            cancelled,
            plays_processed,
            join,
        }
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn plays_processed(&self) -> u64 {
        self.plays_processed.load(Ordering::SeqCst)
    }
}
