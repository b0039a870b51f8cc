//! Per-room tick driver.
//!
//! Each room runs on its own task. Requests from connections arrive over a
//! bounded channel and are applied between ticks, so a tick always runs to
//! completion on a consistent room.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::{CombatantId, PendingCommand};
use crate::util::time::{unix_millis, Timer};
use crate::ws::protocol::ServerMsg;

use super::scheduler::{JoinAccepted, Room, RoomPhase};
use super::{JoinError, LeaveReason, RoomId};

/// Requests a connection can make of its room
#[derive(Debug)]
pub enum RoomRequest {
    Join {
        name: String,
        client_id: Option<String>,
        outbox: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<JoinAccepted, JoinError>>,
    },
    Input {
        combatant_id: CombatantId,
        command: PendingCommand,
    },
    Leave {
        combatant_id: CombatantId,
        reason: LeaveReason,
    },
    Shutdown,
}

/// Live counters published by the driver after every tick
#[derive(Debug, Default)]
struct RoomCounters {
    humans: AtomicUsize,
    ai: AtomicUsize,
    round: AtomicUsize,
    in_round: AtomicBool,
}

/// Handle for talking to a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    tx: mpsc::Sender<RoomRequest>,
    counters: Arc<RoomCounters>,
    capacity: usize,
}

impl RoomHandle {
    /// Ask the room to admit a human
    pub async fn join(
        &self,
        name: String,
        client_id: Option<String>,
        outbox: mpsc::Sender<ServerMsg>,
    ) -> Result<JoinAccepted, JoinError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RoomRequest::Join {
                name,
                client_id,
                outbox,
                reply,
            })
            .await
            .map_err(|_| JoinError::RoomClosed)?;
        response.await.map_err(|_| JoinError::RoomClosed)?
    }

    /// Forward a command; dropped when the room is backed up
    pub fn send_input(&self, combatant_id: CombatantId, command: PendingCommand) -> bool {
        self.tx
            .try_send(RoomRequest::Input { combatant_id, command })
            .is_ok()
    }

    pub async fn leave(&self, combatant_id: CombatantId, reason: LeaveReason) {
        let _ = self.tx.send(RoomRequest::Leave { combatant_id, reason }).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomRequest::Shutdown).await;
    }

    pub fn human_count(&self) -> usize {
        self.counters.humans.load(Ordering::Relaxed)
    }

    pub fn ai_count(&self) -> usize {
        self.counters.ai.load(Ordering::Relaxed)
    }

    pub fn round(&self) -> usize {
        self.counters.round.load(Ordering::Relaxed)
    }

    pub fn in_round(&self) -> bool {
        self.counters.in_round.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another human could still get in
    pub fn has_free_slot(&self) -> bool {
        !self.tx.is_closed() && self.human_count() < self.capacity
    }
}

/// The driver half of a room
pub struct RoomDriver {
    room: Room,
    rx: mpsc::Receiver<RoomRequest>,
    counters: Arc<RoomCounters>,
}

impl RoomDriver {
    pub fn new(room: Room, request_queue: usize, capacity: usize) -> (Self, RoomHandle) {
        let (tx, rx) = mpsc::channel(request_queue.max(1));
        let counters = Arc::new(RoomCounters::default());
        let handle = RoomHandle {
            id: room.id(),
            tx,
            counters: counters.clone(),
            capacity,
        };
        (Self { room, rx, counters }, handle)
    }

    /// Run until shut down, abandoned, or empty past the grace period.
    /// The room is cleared before this returns.
    pub async fn run(mut self, tick_rate: u32, empty_grace: Duration) {
        let room_id = self.room.id();
        info!(room_id = %room_id, "Room driver started");

        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        let tick_budget = tick_duration.as_micros() as u64;
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut empty_since: Option<Instant> = None;

        'running: loop {
            ticker.tick().await;

            // Apply everything that arrived since the last tick
            loop {
                match self.rx.try_recv() {
                    Ok(RoomRequest::Shutdown) => {
                        info!(room_id = %room_id, "Shutdown requested");
                        break 'running;
                    }
                    Ok(request) => self.apply(request),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        debug!(room_id = %room_id, "All room handles dropped");
                        break 'running;
                    }
                }
            }

            let timer = Timer::new();
            self.room.tick(unix_millis());
            let elapsed = timer.elapsed_micros();
            if elapsed > tick_budget {
                warn!(room_id = %room_id, elapsed_us = elapsed, budget_us = tick_budget, "Tick overran its budget");
            }
            self.publish();

            if self.room.human_count() == 0 {
                let since = *empty_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= empty_grace {
                    info!(room_id = %room_id, "Room empty past grace period");
                    break;
                }
            } else {
                empty_since = None;
            }
        }

        // Stop accepting requests before clearing state
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            if let RoomRequest::Join { reply, .. } = request {
                let _ = reply.send(Err(JoinError::RoomClosed));
            }
        }
        self.room.shutdown();
        self.publish();
        info!(room_id = %room_id, "Room driver stopped");
    }

    fn apply(&mut self, request: RoomRequest) {
        let room_id = self.room.id();
        match request {
            RoomRequest::Join {
                name,
                client_id,
                outbox,
                reply,
            } => {
                let result = self.room.join(&name, client_id, outbox, unix_millis());
                if let Err(e) = &result {
                    info!(room_id = %room_id, name = %name, error = %e, "Join rejected");
                }
                let _ = reply.send(result);
            }
            RoomRequest::Input { combatant_id, command } => {
                if let Err(e) = self.room.push_input(combatant_id, command, unix_millis()) {
                    debug!(room_id = %room_id, combatant_id = %combatant_id, error = %e, "Input dropped");
                }
            }
            RoomRequest::Leave { combatant_id, reason } => {
                self.room.leave(combatant_id, reason);
            }
            RoomRequest::Shutdown => {}
        }
        self.publish();
    }

    fn publish(&self) {
        self.counters.humans.store(self.room.human_count(), Ordering::Relaxed);
        self.counters.ai.store(self.room.ai_count(), Ordering::Relaxed);
        self.counters.round.store(self.room.round() as usize, Ordering::Relaxed);
        self.counters
            .in_round
            .store(self.room.phase() == RoomPhase::InRound, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use uuid::Uuid;

    fn driver(capacity: usize) -> (RoomDriver, RoomHandle) {
        let mut config = GameConfig::default();
        config.room.capacity = capacity;
        let room = Room::new(Uuid::new_v4(), Arc::new(config), 5, None);
        RoomDriver::new(room, 64, capacity)
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_answered_by_the_driver() {
        let (driver, handle) = driver(4);
        let task = tokio::spawn(driver.run(60, Duration::from_secs(30)));

        let (tx, mut rx) = mpsc::channel(256);
        let joined = handle.join("ace".into(), None, tx).await.unwrap();
        assert_eq!(joined.room_id, handle.id);
        assert!(matches!(rx.recv().await, Some(ServerMsg::Joined { .. })));
        assert_eq!(handle.human_count(), 1);
        assert_eq!(handle.ai_count(), 3);

        handle.shutdown().await;
        task.await.unwrap();
        assert_eq!(handle.human_count(), 0);
        assert!(!handle.has_free_slot());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_stops_after_grace() {
        let (driver, handle) = driver(4);
        let task = tokio::spawn(driver.run(60, Duration::from_millis(200)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(task.is_finished());
        let (tx, _rx) = mpsc::channel(8);
        assert_eq!(handle.join("late".into(), None, tx).await, Err(JoinError::RoomClosed));
    }
}
