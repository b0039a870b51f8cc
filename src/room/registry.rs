//! Registry of running rooms

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::store::SessionRecorder;

use super::driver::{RoomDriver, RoomHandle};
use super::scheduler::Room;
use super::RoomId;

/// Public view of a room for the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub humans: usize,
    pub ai: usize,
    pub capacity: usize,
    pub round: usize,
    pub in_round: bool,
}

/// All rooms of this process. A room removes itself once its driver stops.
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    config: Arc<GameConfig>,
    recorder: Option<SessionRecorder>,
}

impl RoomRegistry {
    pub fn new(config: Arc<GameConfig>, recorder: Option<SessionRecorder>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            config,
            recorder,
        }
    }

    pub fn get(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_humans(&self) -> usize {
        self.rooms.iter().map(|r| r.value().human_count()).sum()
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|entry| {
                let room = entry.value();
                RoomSummary {
                    id: room.id,
                    humans: room.human_count(),
                    ai: room.ai_count(),
                    capacity: room.capacity(),
                    round: room.round(),
                    in_round: room.in_round(),
                }
            })
            .collect()
    }

    /// A room with a free human slot, starting a new one when none has room
    pub fn find_or_create(&self) -> RoomHandle {
        let available = self
            .rooms
            .iter()
            .filter(|r| r.value().has_free_slot())
            .max_by_key(|r| r.value().human_count())
            .map(|r| r.value().clone());

        available.unwrap_or_else(|| self.create())
    }

    /// Start a room on its own task
    pub fn create(&self) -> RoomHandle {
        let id = Uuid::new_v4();
        let seed: u64 = rand::random();
        let room = Room::new(id, self.config.clone(), seed, self.recorder.clone());
        let rules = &self.config.room;
        let (driver, handle) = RoomDriver::new(room, rules.request_queue, rules.capacity);

        self.rooms.insert(id, handle.clone());
        info!(room_id = %id, seed, "Room created");

        let rooms = self.rooms.clone();
        let tick_rate = self.config.tick.tick_rate;
        let grace = Duration::from_secs_f32(rules.empty_grace_secs.max(0.0));
        tokio::spawn(async move {
            driver.run(tick_rate, grace).await;
            rooms.remove(&id);
            info!(room_id = %id, "Room deregistered");
        });

        handle
    }

    /// Ask every room to stop
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|r| r.value().clone()).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry(capacity: usize) -> RoomRegistry {
        let mut config = GameConfig::default();
        config.room.capacity = capacity;
        config.room.empty_grace_secs = 0.5;
        RoomRegistry::new(Arc::new(config), None)
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_rooms_until_full() {
        let registry = registry(1);
        let first = registry.find_or_create();
        assert_eq!(registry.find_or_create().id, first.id);

        let (tx, _rx) = mpsc::channel(64);
        first.join("ace".into(), None, tx).await.unwrap();

        let second = registry.find_or_create();
        assert_ne!(second.id, first.id);
        assert_eq!(registry.room_count(), 2);
        assert_eq!(registry.total_humans(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_rooms_deregister() {
        let registry = registry(4);
        registry.create();
        assert_eq!(registry.room_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn summaries_reflect_counters() {
        let registry = registry(3);
        let room = registry.find_or_create();
        let (tx, _rx) = mpsc::channel(256);
        room.join("ace".into(), None, tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].humans, 1);
        assert_eq!(summaries[0].ai, 2);
        assert!(summaries[0].in_round);
    }
}
