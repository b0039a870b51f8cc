//! Room lifecycle.
//!
//! A `Room` owns one world plus the humans and AI controllers playing in it.
//! It is driven synchronously: the driver calls [`Room::tick`] at the tick
//! rate and applies joins, leaves and inputs between ticks, so nothing here
//! needs a lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::ai::AiController;
use crate::config::GameConfig;
use crate::game::{CombatantId, PendingCommand, SnapshotBuilder, World};
use crate::store::{SessionRecord, SessionRecorder};
use crate::ws::protocol::{ScoreEntry, ServerMsg};

use super::{InputError, JoinError, LeaveReason, RoomId};

const AI_NAMES: [&str; 8] = [
    "Bastion", "Havoc", "Warden", "Striker", "Rampart", "Vanguard", "Onager", "Sentinel",
];

const MAX_NAME_LEN: usize = 24;

/// Room phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Not enough participants; the world still runs
    Warmup,
    /// Round clock and kill limit are live
    InRound,
    /// Scoreboard shown, world frozen until restart
    RoundEnd,
}

/// Result of a successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAccepted {
    pub room_id: RoomId,
    pub combatant_id: CombatantId,
    pub seed: u64,
}

/// Connected human
#[derive(Debug)]
struct Participant {
    name: String,
    client_id: Option<String>,
    outbox: mpsc::Sender<ServerMsg>,
    last_input_ms: u64,
}

/// Cycles through AI callsigns, numbering repeats
#[derive(Debug, Default)]
struct AiNamer {
    issued: usize,
}

impl AiNamer {
    fn next_name(&mut self) -> String {
        let base = AI_NAMES[self.issued % AI_NAMES.len()];
        let lap = self.issued / AI_NAMES.len();
        self.issued += 1;
        if lap == 0 {
            base.to_string()
        } else {
            format!("{base} {}", lap + 1)
        }
    }
}

/// One arena: world, participants and round state
pub struct Room {
    id: RoomId,
    config: Arc<GameConfig>,
    world: World,
    phase: RoomPhase,
    round: u32,

    humans: BTreeMap<CombatantId, Participant>,
    bots: BTreeMap<CombatantId, AiController>,
    next_combatant_id: u32,
    names: AiNamer,

    snapshots: SnapshotBuilder,
    ticks: u64,
    afk_interval_ticks: u64,
    round_deadline_tick: Option<u64>,
    restart_at_ms: Option<u64>,
    closing: bool,

    rng: ChaCha8Rng,
    recorder: Option<SessionRecorder>,
}

impl Room {
    pub fn new(id: RoomId, config: Arc<GameConfig>, seed: u64, recorder: Option<SessionRecorder>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world = World::new(config.clone(), rng.gen());
        let snapshots = SnapshotBuilder::new(config.tick.snapshot_interval_ticks());
        let afk_interval_ticks = config.tick.ticks_for(config.room.afk_check_interval_secs).max(1);

        Self {
            id,
            config,
            world,
            phase: RoomPhase::Warmup,
            round: 0,
            humans: BTreeMap::new(),
            bots: BTreeMap::new(),
            next_combatant_id: 1,
            names: AiNamer::default(),
            snapshots,
            ticks: 0,
            afk_interval_ticks,
            round_deadline_tick: None,
            restart_at_ms: None,
            closing: false,
            rng,
            recorder,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for scripted scenarios
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn human_count(&self) -> usize {
        self.humans.len()
    }

    pub fn ai_count(&self) -> usize {
        self.bots.len()
    }

    pub fn is_human(&self, id: CombatantId) -> bool {
        self.humans.contains_key(&id)
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Admit a human. At capacity one AI gives up its slot; with no AI left
    /// the join is rejected.
    pub fn join(
        &mut self,
        name: &str,
        client_id: Option<String>,
        outbox: mpsc::Sender<ServerMsg>,
        now_ms: u64,
    ) -> Result<JoinAccepted, JoinError> {
        if self.closing {
            return Err(JoinError::RoomClosed);
        }

        if let Some(client_id) = client_id.as_deref() {
            let stale = self
                .humans
                .iter()
                .find(|(_, p)| p.client_id.as_deref() == Some(client_id))
                .map(|(id, _)| *id);
            if let Some(stale) = stale {
                info!(room_id = %self.id, combatant_id = %stale, "Client reconnected, replacing old session");
                self.leave(stale, LeaveReason::Superseded);
            }
        }

        let capacity = self.config.room.capacity;
        if self.humans.len() >= capacity {
            return Err(JoinError::RoomFull);
        }
        if self.world.len() >= capacity && !self.evict_one_ai() {
            return Err(JoinError::RoomFull);
        }

        let id = self.allocate_id();
        let name = sanitize_name(name, id);
        self.world.add_combatant(id, name.clone(), false);

        deliver(
            self.id,
            id,
            &outbox,
            ServerMsg::Joined {
                room_id: self.id,
                combatant_id: id,
                seed: self.world.seed(),
                config: (*self.config).clone(),
            },
        );
        self.broadcast(ServerMsg::PlayerJoined {
            combatant_id: id,
            name: name.clone(),
            is_ai: false,
        });

        if let Some(recorder) = &self.recorder {
            recorder.record(SessionRecord::session_started(self.id, id, &name, client_id.clone()));
        }
        info!(room_id = %self.id, combatant_id = %id, name = %name, humans = self.humans.len() + 1, "Player joined");

        self.humans.insert(
            id,
            Participant {
                name,
                client_id,
                outbox,
                last_input_ms: now_ms,
            },
        );
        self.snapshots.force_next();
        self.backfill_ai();
        self.try_begin_round();

        Ok(JoinAccepted {
            room_id: self.id,
            combatant_id: id,
            seed: self.world.seed(),
        })
    }

    /// Remove a human. Returns false when `id` is not a connected human.
    pub fn leave(&mut self, id: CombatantId, reason: LeaveReason) -> bool {
        let Some(participant) = self.humans.remove(&id) else {
            return false;
        };

        if matches!(
            reason,
            LeaveReason::Inactive | LeaveReason::Superseded | LeaveReason::RoomClosed
        ) {
            deliver(
                self.id,
                id,
                &participant.outbox,
                ServerMsg::Kicked {
                    reason: reason.as_str().to_string(),
                },
            );
        }

        let stats = self
            .world
            .remove_combatant(id)
            .map(|c| c.stats)
            .unwrap_or_default();
        if let Some(recorder) = &self.recorder {
            recorder.record(SessionRecord::session_ended(self.id, id, &participant.name, reason, stats));
        }
        info!(room_id = %self.id, combatant_id = %id, reason = reason.as_str(), "Player left");

        self.broadcast(ServerMsg::PlayerLeft {
            combatant_id: id,
            name: participant.name,
            is_ai: false,
        });

        // The reconnecting session takes this slot next; AI and round stay as they are
        if reason == LeaveReason::Superseded {
            return true;
        }

        if self.humans.is_empty() {
            let bots: Vec<CombatantId> = self.bots.keys().copied().collect();
            for bot in bots {
                self.remove_ai(bot);
            }
        } else {
            self.backfill_ai();
        }
        self.fall_back_to_warmup();
        true
    }

    /// Queue a human's command for the next tick
    pub fn push_input(&mut self, id: CombatantId, command: PendingCommand, now_ms: u64) -> Result<(), InputError> {
        let participant = self.humans.get_mut(&id).ok_or(InputError::UnknownCombatant(id))?;
        participant.last_input_ms = now_ms;

        if !command.turret_yaw.is_finite() || !command.gun_pitch.is_finite() {
            return Err(InputError::Malformed("non-finite aim angle"));
        }
        if self.world.enqueue_input(id, command) {
            Ok(())
        } else {
            Err(InputError::QueueFull)
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// One fixed step: AI, world, event relay, round clock, inactivity and
    /// snapshots. The world is frozen while the round-end board is shown.
    pub fn tick(&mut self, now_ms: u64) {
        self.ticks += 1;

        if self.phase == RoomPhase::RoundEnd {
            if self.restart_at_ms.map_or(true, |at| now_ms >= at) {
                self.restart_round();
            } else {
                self.check_inactivity(now_ms);
                return;
            }
        }

        self.drive_ai();
        let events = self.world.tick();
        let tick = self.world.tick_count();
        for event in events {
            self.broadcast(ServerMsg::Event { tick, event });
        }

        if self.phase == RoomPhase::InRound && self.round_over() {
            self.end_round(now_ms);
        }

        self.check_inactivity(now_ms);

        if self.snapshots.should_send() {
            self.broadcast_snapshots(now_ms);
        }
    }

    /// Kick everyone and drop all owned state
    pub fn shutdown(&mut self) {
        self.closing = true;
        let humans: Vec<CombatantId> = self.humans.keys().copied().collect();
        for id in humans {
            self.leave(id, LeaveReason::RoomClosed);
        }
        self.bots.clear();
        let leftovers: Vec<CombatantId> = self.world.combatants().map(|c| c.id).collect();
        for id in leftovers {
            self.world.remove_combatant(id);
        }
        info!(room_id = %self.id, rounds = self.round, "Room shut down");
    }

    /// Current standings, most kills first
    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        let mut rows: Vec<ScoreEntry> = self
            .world
            .combatants()
            .map(|c| ScoreEntry {
                combatant_id: c.id,
                name: c.name.clone(),
                is_ai: c.is_ai,
                kills: c.stats.kills,
                deaths: c.stats.deaths,
                hits: c.stats.hits,
                shots: c.stats.shots,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.kills
                .cmp(&a.kills)
                .then(a.deaths.cmp(&b.deaths))
                .then(a.combatant_id.cmp(&b.combatant_id))
        });
        rows
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn allocate_id(&mut self) -> CombatantId {
        let id = CombatantId(self.next_combatant_id);
        self.next_combatant_id += 1;
        id
    }

    /// Fill empty slots with AI while at least one human is present
    fn backfill_ai(&mut self) {
        if self.humans.is_empty() || self.closing {
            return;
        }
        while self.world.len() < self.config.room.capacity {
            let id = self.allocate_id();
            let name = self.names.next_name();
            self.world.add_combatant(id, name.clone(), true);
            self.bots.insert(
                id,
                AiController::new(id, self.config.ai.difficulty, &self.config.ai, self.rng.gen()),
            );
            debug!(room_id = %self.id, combatant_id = %id, name = %name, "AI joined");
            self.broadcast(ServerMsg::PlayerJoined {
                combatant_id: id,
                name,
                is_ai: true,
            });
        }
    }

    /// Free a slot by removing the newest AI
    fn evict_one_ai(&mut self) -> bool {
        match self.bots.keys().next_back().copied() {
            Some(id) => {
                self.remove_ai(id);
                true
            }
            None => false,
        }
    }

    fn remove_ai(&mut self, id: CombatantId) {
        self.bots.remove(&id);
        if let Some(combatant) = self.world.remove_combatant(id) {
            debug!(room_id = %self.id, combatant_id = %id, "AI removed");
            self.broadcast(ServerMsg::PlayerLeft {
                combatant_id: id,
                name: combatant.name,
                is_ai: true,
            });
        }
    }

    /// Leave warmup once enough humans are in, or AI is filling the gap.
    /// Only checked on join and round restart.
    fn try_begin_round(&mut self) {
        if self.phase != RoomPhase::Warmup || self.humans.is_empty() {
            return;
        }
        if self.humans.len() >= self.config.room.min_humans || !self.bots.is_empty() {
            self.begin_round();
        }
    }

    fn fall_back_to_warmup(&mut self) {
        if self.phase == RoomPhase::InRound && self.humans.len() < self.config.room.min_humans.max(1) {
            info!(room_id = %self.id, round = self.round, humans = self.humans.len(), "Not enough players, back to warmup");
            self.phase = RoomPhase::Warmup;
            self.round_deadline_tick = None;
        }
    }

    fn begin_round(&mut self) {
        self.round += 1;
        self.phase = RoomPhase::InRound;
        self.world.reset_stats();
        let duration = self.config.room.round_duration_secs;
        self.round_deadline_tick = Some(self.world.tick_count() + self.config.tick.ticks_for(duration));
        self.snapshots.force_next();

        info!(room_id = %self.id, round = self.round, seed = self.world.seed(), "Round started");
        self.broadcast(ServerMsg::RoundStarted {
            round: self.round,
            seed: self.world.seed(),
            duration_secs: duration,
        });
    }

    fn round_over(&self) -> bool {
        let timed_out = self
            .round_deadline_tick
            .map_or(false, |deadline| self.world.tick_count() >= deadline);
        let kill_limit = self.config.room.kill_limit;
        timed_out || self.world.combatants().any(|c| c.stats.kills >= kill_limit)
    }

    fn end_round(&mut self, now_ms: u64) {
        self.phase = RoomPhase::RoundEnd;
        self.round_deadline_tick = None;
        let delay = self.config.room.round_end_delay_secs;
        self.restart_at_ms = Some(now_ms + (delay * 1000.0) as u64);

        let scoreboard = self.scoreboard();
        info!(
            room_id = %self.id,
            round = self.round,
            leader = scoreboard.first().map(|s| s.name.as_str()).unwrap_or("-"),
            "Round ended"
        );
        if let Some(recorder) = &self.recorder {
            recorder.record(SessionRecord::round_finished(self.id, self.round, scoreboard.clone()));
        }
        self.broadcast(ServerMsg::RoundEnd {
            round: self.round,
            scoreboard,
            restart_in_secs: delay,
        });
    }

    fn restart_round(&mut self) {
        let seed = self.rng.gen();
        self.world.reset(seed);
        for (id, bot) in self.bots.iter_mut() {
            *bot = AiController::new(*id, self.config.ai.difficulty, &self.config.ai, self.rng.gen());
        }
        self.restart_at_ms = None;
        self.phase = RoomPhase::Warmup;
        self.try_begin_round();
    }

    fn drive_ai(&mut self) {
        let commands: Vec<(CombatantId, PendingCommand)> = self
            .bots
            .values_mut()
            .filter_map(|bot| bot.think(&self.world, &self.config).map(|cmd| (bot.id(), cmd)))
            .collect();
        for (id, command) in commands {
            self.world.enqueue_input(id, command);
        }
    }

    /// Evict humans idle past the timeout, on the check cadence only
    fn check_inactivity(&mut self, now_ms: u64) {
        if self.ticks % self.afk_interval_ticks != 0 {
            return;
        }
        let timeout_ms = (self.config.room.inactivity_timeout_secs * 1000.0) as u64;
        let idle: Vec<CombatantId> = self
            .humans
            .iter()
            .filter(|(_, p)| now_ms.saturating_sub(p.last_input_ms) >= timeout_ms)
            .map(|(id, _)| *id)
            .collect();

        for id in idle {
            info!(room_id = %self.id, combatant_id = %id, "Evicting inactive player");
            self.leave(id, LeaveReason::Inactive);
        }
    }

    fn broadcast_snapshots(&mut self, now_ms: u64) {
        if self.humans.is_empty() {
            return;
        }
        let snapshot_id = self.snapshots.next_id();
        let base = self.world.snapshot(None);

        for (id, participant) in &self.humans {
            let mut state = base.clone();
            state.last_processed_seq = self
                .world
                .combatant(*id)
                .map(|c| c.last_processed_seq)
                .unwrap_or(0);
            deliver(
                self.id,
                *id,
                &participant.outbox,
                ServerMsg::Snapshot {
                    snapshot_id,
                    server_time: now_ms,
                    state,
                },
            );
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for (id, participant) in &self.humans {
            deliver(self.id, *id, &participant.outbox, msg.clone());
        }
    }
}

/// Non-blocking send; a slow client loses messages rather than stalling the tick
fn deliver(room_id: RoomId, id: CombatantId, outbox: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    match outbox.try_send(msg) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(room_id = %room_id, combatant_id = %id, "Client outbox full, dropping message");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(room_id = %room_id, combatant_id = %id, "Client outbox closed");
        }
    }
}

fn sanitize_name(name: &str, id: CombatantId) -> String {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        format!("Player {id}")
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn config(capacity: usize, min_humans: usize) -> Arc<GameConfig> {
        let mut config = GameConfig::default();
        config.room.capacity = capacity;
        config.room.min_humans = min_humans;
        Arc::new(config)
    }

    fn room(config: Arc<GameConfig>) -> Room {
        Room::new(Uuid::new_v4(), config, 17, None)
    }

    fn outbox() -> (mpsc::Sender<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        mpsc::channel(1024)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn ai_names_cycle_with_suffix() {
        let mut namer = AiNamer::default();
        let names: Vec<String> = (0..AI_NAMES.len() + 2).map(|_| namer.next_name()).collect();
        assert_eq!(names[0], AI_NAMES[0]);
        assert_eq!(names[AI_NAMES.len()], format!("{} 2", AI_NAMES[0]));
        assert_eq!(names[AI_NAMES.len() + 1], format!("{} 2", AI_NAMES[1]));
    }

    #[test]
    fn first_human_is_backfilled_and_starts_round() {
        let mut room = room(config(4, 2));
        let (tx, mut rx) = outbox();
        let joined = room.join("ace", None, tx, 0).unwrap();

        assert_eq!(room.human_count(), 1);
        assert_eq!(room.ai_count(), 3);
        assert_eq!(room.phase(), RoomPhase::InRound);

        let messages = drain(&mut rx);
        assert!(matches!(
            messages.first(),
            Some(ServerMsg::Joined { combatant_id, .. }) if *combatant_id == joined.combatant_id
        ));
        assert!(messages.iter().any(|m| matches!(m, ServerMsg::RoundStarted { round: 1, .. })));
    }

    #[test]
    fn human_at_capacity_replaces_ai_until_none_left() {
        let mut room = room(config(3, 1));
        let mut receivers = Vec::new();
        for name in ["a", "b", "c"] {
            let (tx, rx) = outbox();
            receivers.push(rx);
            room.join(name, None, tx, 0).unwrap();
            assert_eq!(room.world().len(), 3);
        }
        assert_eq!(room.ai_count(), 0);

        let (tx, _rx) = outbox();
        assert_eq!(room.join("d", None, tx, 0), Err(JoinError::RoomFull));
    }

    #[test]
    fn last_human_leaving_clears_ai_and_reverts_to_warmup() {
        let mut room = room(config(4, 2));
        let (tx, _rx) = outbox();
        let joined = room.join("ace", None, tx, 0).unwrap();

        assert!(room.leave(joined.combatant_id, LeaveReason::Left));
        assert_eq!(room.ai_count(), 0);
        assert!(room.world().is_empty());
        assert_eq!(room.phase(), RoomPhase::Warmup);
        assert!(!room.leave(joined.combatant_id, LeaveReason::Left));
    }

    #[test]
    fn leaving_human_slot_is_backfilled() {
        let mut room = room(config(4, 1));
        let (tx_a, _rx_a) = outbox();
        let (tx_b, _rx_b) = outbox();
        room.join("a", None, tx_a, 0).unwrap();
        let b = room.join("b", None, tx_b, 0).unwrap();
        assert_eq!(room.ai_count(), 2);

        room.leave(b.combatant_id, LeaveReason::Disconnected);
        assert_eq!(room.ai_count(), 3);
        assert_eq!(room.world().len(), 4);
    }

    #[test]
    fn reconnect_supersedes_stale_session() {
        let mut room = room(config(4, 1));
        let (old_tx, mut old_rx) = outbox();
        let first = room.join("ace", Some("client-1".into()), old_tx, 0).unwrap();
        drain(&mut old_rx);

        let (new_tx, _new_rx) = outbox();
        let second = room.join("ace", Some("client-1".into()), new_tx, 10).unwrap();

        assert_ne!(first.combatant_id, second.combatant_id);
        assert_eq!(room.human_count(), 1);
        assert!(!room.is_human(first.combatant_id));
        assert!(drain(&mut old_rx)
            .iter()
            .any(|m| matches!(m, ServerMsg::Kicked { reason } if reason == "superseded")));
    }

    #[test]
    fn reconnect_keeps_round_and_ai_in_place() {
        let mut room = room(config(4, 2));
        let (old_tx, _old_rx) = outbox();
        room.join("ace", Some("client-1".into()), old_tx, 0).unwrap();
        assert_eq!(room.round(), 1);
        assert_eq!(room.ai_count(), 3);

        let (new_tx, mut new_rx) = outbox();
        room.join("ace", Some("client-1".into()), new_tx, 10).unwrap();

        assert_eq!(room.round(), 1);
        assert_eq!(room.phase(), RoomPhase::InRound);
        assert_eq!(room.ai_count(), 3);
        assert_eq!(room.world().len(), 4);
        assert!(!drain(&mut new_rx)
            .iter()
            .any(|m| matches!(m, ServerMsg::RoundStarted { .. })));
    }

    #[test]
    fn dropping_below_minimum_humans_reverts_to_warmup() {
        let mut room = room(config(4, 2));
        let (tx_a, _rx_a) = outbox();
        let (tx_b, _rx_b) = outbox();
        let a = room.join("a", None, tx_a, 0).unwrap();
        let b = room.join("b", None, tx_b, 0).unwrap();
        assert_eq!(room.phase(), RoomPhase::InRound);

        room.leave(b.combatant_id, LeaveReason::Left);
        assert_eq!(room.phase(), RoomPhase::Warmup);
        assert_eq!(room.ai_count(), 3);

        // Warmup score does not carry into the next round
        room.world_mut().combatant_mut(a.combatant_id).unwrap().stats.kills = 4;
        let (tx_c, _rx_c) = outbox();
        room.join("c", None, tx_c, 0).unwrap();
        assert_eq!(room.phase(), RoomPhase::InRound);
        assert_eq!(room.round(), 2);
        assert!(room.world().combatants().all(|c| c.stats.kills == 0));
    }

    #[test]
    fn snapshots_go_out_once_per_interval_with_own_input_seq() {
        let config = config(2, 2);
        let interval = config.tick.snapshot_interval_ticks() as u64;
        let mut room = room(config);
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, mut rx_b) = outbox();
        let a = room.join("a", None, tx_a, 0).unwrap().combatant_id;
        let b = room.join("b", None, tx_b, 0).unwrap().combatant_id;

        // Flush the snapshot forced by the joins
        room.tick(16);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let input = |seq| PendingCommand {
            seq,
            ..PendingCommand::default()
        };
        room.push_input(a, input(5), 20).unwrap();
        room.push_input(b, input(9), 20).unwrap();

        let snapshots = |rx: &mut mpsc::Receiver<ServerMsg>| -> Vec<(u64, u32)> {
            drain(rx)
                .into_iter()
                .filter_map(|m| match m {
                    ServerMsg::Snapshot { snapshot_id, state, .. } => {
                        Some((snapshot_id, state.last_processed_seq))
                    }
                    _ => None,
                })
                .collect()
        };

        let mut now = 16;
        for _ in 0..interval {
            now += 16;
            room.tick(now);
        }
        let first_a = snapshots(&mut rx_a);
        let first_b = snapshots(&mut rx_b);
        assert_eq!(first_a.len(), 1);
        assert_eq!(first_b.len(), 1);
        assert_eq!(first_a[0].1, 5);
        assert_eq!(first_b[0].1, 9);
        assert_eq!(first_a[0].0, first_b[0].0);

        for _ in 0..interval {
            now += 16;
            room.tick(now);
        }
        let second_a = snapshots(&mut rx_a);
        assert_eq!(second_a.len(), 1);
        assert!(second_a[0].0 > first_a[0].0);
        assert_eq!(second_a[0].1, 5);
    }

    #[test]
    fn malformed_input_is_rejected_without_side_effects() {
        let mut room = room(config(2, 1));
        let (tx, _rx) = outbox();
        let joined = room.join("ace", None, tx, 0).unwrap();

        let bad = PendingCommand {
            seq: 1,
            turret_yaw: f32::NAN,
            ..PendingCommand::default()
        };
        assert_eq!(
            room.push_input(joined.combatant_id, bad, 5),
            Err(InputError::Malformed("non-finite aim angle"))
        );
        assert_eq!(room.world().combatant(joined.combatant_id).unwrap().queued_inputs(), 0);
        assert_eq!(
            room.push_input(CombatantId(999), PendingCommand::default(), 5),
            Err(InputError::UnknownCombatant(CombatantId(999)))
        );
    }

    #[test]
    fn kill_limit_ends_round_and_restart_resets_world() {
        let mut config = GameConfig::default();
        config.room.capacity = 2;
        config.room.min_humans = 1;
        config.room.kill_limit = 1;
        let mut room = room(Arc::new(config.clone()));
        let (tx, mut rx) = outbox();
        let joined = room.join("ace", None, tx, 0).unwrap();
        let seed = room.world().seed();

        room.world_mut().combatant_mut(joined.combatant_id).unwrap().stats.kills = 1;
        room.tick(1_000);
        assert_eq!(room.phase(), RoomPhase::RoundEnd);

        let board = drain(&mut rx)
            .into_iter()
            .find_map(|m| match m {
                ServerMsg::RoundEnd { scoreboard, .. } => Some(scoreboard),
                _ => None,
            })
            .expect("scoreboard broadcast");
        assert_eq!(board[0].combatant_id, joined.combatant_id);
        assert!(board.windows(2).all(|w| w[0].kills >= w[1].kills));

        let frozen = room.world().tick_count();
        room.tick(1_100);
        assert_eq!(room.world().tick_count(), frozen);

        let restart = 1_000 + (config.room.round_end_delay_secs * 1000.0) as u64;
        room.tick(restart);
        assert_eq!(room.phase(), RoomPhase::InRound);
        assert_eq!(room.round(), 2);
        assert_ne!(room.world().seed(), seed);
        assert!(room.world().combatants().all(|c| c.stats.kills == 0));
    }

    #[test]
    fn round_timer_ends_round() {
        let mut config = GameConfig::default();
        config.room.capacity = 2;
        config.room.round_duration_secs = 0.5;
        let mut room = room(Arc::new(config.clone()));
        let (tx, _rx) = outbox();
        room.join("ace", None, tx, 0).unwrap();

        let ticks = config.tick.ticks_for(0.5);
        for i in 0..ticks - 1 {
            room.tick(i * 16);
            assert_eq!(room.phase(), RoomPhase::InRound);
        }
        room.tick(ticks * 16);
        assert_eq!(room.phase(), RoomPhase::RoundEnd);
    }

    #[test]
    fn shutdown_kicks_everyone_and_empties_world() {
        let mut room = room(config(4, 1));
        let (tx, mut rx) = outbox();
        room.join("ace", None, tx, 0).unwrap();
        drain(&mut rx);

        room.shutdown();
        assert!(room.world().is_empty());
        assert_eq!(room.ai_count(), 0);
        assert!(drain(&mut rx)
            .iter()
            .any(|m| matches!(m, ServerMsg::Kicked { reason } if reason == "room_closed")));

        let (tx, _rx) = outbox();
        assert_eq!(room.join("late", None, tx, 0), Err(JoinError::RoomClosed));
    }
}
