//! Per-game event fan-out.
//!
//! One bounded queue per subscriber, keyed by game id. Publishing never
//! blocks: a full queue drops that subscriber's event (the next play-update
//! supersedes it, so slow consumers lose freshness, not correctness). A
//! single-slot latest-event cache lets a late joiner see the current state
//! immediately; the snapshot is handed over once at subscribe time and never
//! enqueued on the live queue, so subscribers never see it duplicated.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::GameEvent;

const DEFAULT_QUEUE_CAPACITY: usize = 200;
const DEFAULT_LATEST_TTL: Duration = Duration::from_secs(3600);

struct SubscriberSlot {
    id: Uuid,
    tx: mpsc::Sender<GameEvent>,
}

struct CachedLatest {
    event: GameEvent,
    stored_at: Instant,
}

type QueueMap = DashMap<String, Vec<SubscriberSlot>>;

/// Handle held by one viewer of one game. Dropping it (client disconnect)
/// deregisters the queue.
pub struct Subscription {
    pub id: Uuid,
    pub game_id: String,
    rx: mpsc::Receiver<GameEvent>,
    queues: Arc<QueueMap>,
}

impl Subscription {
    /// Next live event; `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<GameEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll-with-timeout, for transports that interleave
    /// keep-alives with live events.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<GameEvent> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut slots) = self.queues.get_mut(&self.game_id) {
            slots.retain(|s| s.id != self.id);
        }
    }
}

pub struct EventBus {
    queues: Arc<QueueMap>,
    latest: DashMap<String, CachedLatest>,
    queue_capacity: usize,
    latest_ttl: Duration,
}

impl EventBus {
    pub fn new(queue_capacity: usize, latest_ttl: Duration) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            latest: DashMap::new(),
            queue_capacity,
            latest_ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, DEFAULT_LATEST_TTL)
    }

    /// Register a new viewer for a game.
    pub fn subscribe(&self, game_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        self.queues
            .entry(game_id.to_string())
            .or_default()
            .push(SubscriberSlot { id, tx });

        debug!(
            game_id,
            subscribers = self.subscriber_count(game_id),
            "Subscriber added"
        );

        Subscription {
            id,
            game_id: game_id.to_string(),
            rx,
            queues: Arc::clone(&self.queues),
        }
    }

    /// Remove a viewer. Idempotent: unknown ids are ignored.
    pub fn unsubscribe(&self, game_id: &str, subscriber_id: Uuid) {
        if let Some(mut slots) = self.queues.get_mut(game_id) {
            slots.retain(|s| s.id != subscriber_id);
        }
        debug!(
            game_id,
            subscribers = self.subscriber_count(game_id),
            "Subscriber removed"
        );
    }

    /// Deliver an event to every current subscriber of a game.
    ///
    /// Never blocks and never fails: full queues drop the event for that
    /// subscriber only, and closed queues are pruned.
    pub fn publish(&self, game_id: &str, event: &GameEvent) {
        let Some(mut slots) = self.queues.get_mut(game_id) else {
            return;
        };

        slots.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(game_id, "Subscriber queue full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Refresh the latest-event snapshot for a game.
    pub fn cache_latest(&self, game_id: &str, event: GameEvent) {
        self.latest.insert(
            game_id.to_string(),
            CachedLatest {
                event,
                stored_at: Instant::now(),
            },
        );
    }

    /// Most recently published event for a game, unless it has expired.
    /// Expiry keeps stale state from one contest leaking into a later replay
    /// under the same identifier.
    pub fn latest(&self, game_id: &str) -> Option<GameEvent> {
        let entry = self.latest.get(game_id)?;
        if entry.stored_at.elapsed() > self.latest_ttl {
            drop(entry);
            self.latest.remove(game_id);
            return None;
        }
        Some(entry.event.clone())
    }

    pub fn subscriber_count(&self, game_id: &str) -> usize {
        self.queues.get(game_id).map(|s| s.len()).unwrap_or(0)
    }
}
