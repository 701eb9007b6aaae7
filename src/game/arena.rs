//! Arena actor and authoritative tick loop
//!
//! A single task owns the [`ArenaState`]. Client events and simulation ticks are processed
//! one at a time on that task, so handlers and the stepper never observe each other
//! mid-update.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::util::time::unix_millis;
use crate::ws::protocol::ClientMsg;

use super::handlers;
use super::physics::PhysicsSystem;
use super::snapshot::SnapshotTimer;
use super::state::ArenaState;
use super::{ClientEvent, InboundEvent, Outbound};

/// Tunables for the arena loop
#[derive(Debug, Clone)]
pub struct ArenaSettings {
    /// Stepper ticks per second
    pub tick_rate: u32,
    /// Wall-clock period between full snapshots
    pub snapshot_interval: Duration,
    /// Seed for respawn placement
    pub seed: u64,
    pub input_capacity: usize,
    pub broadcast_capacity: usize,
}

impl ArenaSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_rate: config.tick_rate,
            snapshot_interval: config.snapshot_interval,
            seed: config.arena_seed,
            ..Self::default()
        }
    }

    /// Period between ticks, never shorter than one microsecond
    pub fn tick_duration(&self) -> Duration {
        let micros = 1_000_000 / u64::from(self.tick_rate.max(1));
        Duration::from_micros(micros.max(1))
    }
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            snapshot_interval: Duration::from_secs(1),
            seed: 0,
            input_capacity: 1024,
            broadcast_capacity: 256,
        }
    }
}

/// Counters published by the arena task for the health endpoint
#[derive(Debug, Default)]
pub struct ArenaStats {
    tanks: AtomicUsize,
    bullets: AtomicUsize,
    tick: AtomicU64,
}

impl ArenaStats {
    pub fn tanks(&self) -> usize {
        self.tanks.load(Ordering::Relaxed)
    }

    pub fn bullets(&self) -> usize {
        self.bullets.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    fn record(&self, state: &ArenaState) {
        self.tanks.store(state.tank_count(), Ordering::Relaxed);
        self.bullets.store(state.bullet_count(), Ordering::Relaxed);
    }
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub input_tx: mpsc::Sender<ClientEvent>,
    pub outbound_tx: broadcast::Sender<Arc<Outbound>>,
    pub stats: Arc<ArenaStats>,
}

impl ArenaHandle {
    /// Receive every outbound message from now on; callers filter by target
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Outbound>> {
        self.outbound_tx.subscribe()
    }

    /// Queue an event for the arena. Returns false if the arena task is gone.
    pub async fn submit(&self, event: ClientEvent) -> bool {
        self.input_tx.send(event).await.is_ok()
    }
}

/// The authoritative arena
pub struct GameArena {
    state: ArenaState,
    rng: ChaCha8Rng,
    tick: u64,
    tick_duration: Duration,
    input_rx: mpsc::Receiver<ClientEvent>,
    outbound_tx: broadcast::Sender<Arc<Outbound>>,
    snapshot_timer: SnapshotTimer,
    stats: Arc<ArenaStats>,
}

impl GameArena {
    /// Create a new arena
    pub fn new(settings: ArenaSettings) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(settings.input_capacity);
        let (outbound_tx, _) = broadcast::channel(settings.broadcast_capacity);
        let stats = Arc::new(ArenaStats::default());

        let handle = ArenaHandle {
            input_tx,
            outbound_tx: outbound_tx.clone(),
            stats: stats.clone(),
        };

        let arena = Self {
            state: ArenaState::new(),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            tick: 0,
            tick_duration: settings.tick_duration(),
            input_rx,
            outbound_tx,
            snapshot_timer: SnapshotTimer::new(settings.snapshot_interval, Instant::now()),
            stats,
        };

        (arena, handle)
    }

    /// Run the tick loop for the lifetime of the process
    pub async fn run(mut self) {
        info!(tick_ms = self.tick_duration.as_millis() as u64, "Arena started");

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = tick_interval.tick() => {
                    self.run_tick(Instant::now());
                }
                Some(event) = self.input_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }
    }

    /// Apply one client event to the arena
    pub fn handle_event(&mut self, event: ClientEvent) {
        let sid = event.sid;
        trace!(
            sid = %sid,
            queued_ms = unix_millis().saturating_sub(event.received_at),
            "Handling client event"
        );

        let outbound = match event.event {
            InboundEvent::Message(ClientMsg::Join { tank }) => {
                match handlers::join(&mut self.state, sid, tank) {
                    Ok(outbound) => {
                        info!(sid = %sid, tanks = self.state.tank_count(), "Tank joined");
                        outbound
                    }
                    Err(e) => {
                        warn!(sid = %sid, error = %e, "Rejected join");
                        Vec::new()
                    }
                }
            }
            InboundEvent::Message(ClientMsg::Move(patch)) => {
                handlers::move_tank(&mut self.state, sid, patch)
            }
            InboundEvent::Message(ClientMsg::Fire(order)) => {
                handlers::fire(&mut self.state, sid, order)
            }
            InboundEvent::Disconnect => {
                let outbound = handlers::leave(&mut self.state, sid);
                if !outbound.is_empty() {
                    info!(sid = %sid, tanks = self.state.tank_count(), "Tank left");
                }
                outbound
            }
        };

        self.stats.record(&self.state);
        self.publish(outbound);
    }

    /// Advance the simulation one tick and emit a snapshot if one is due
    pub fn run_tick(&mut self, now: Instant) {
        self.tick += 1;

        let mut outbound = PhysicsSystem::step(&mut self.state, &mut self.rng);

        if self.snapshot_timer.should_send(now) {
            debug!(
                tick = self.tick,
                tanks = self.state.tank_count(),
                bullets = self.state.bullet_count(),
                "Broadcasting arena snapshot"
            );
            outbound.push(SnapshotTimer::build(&self.state));
        }

        self.stats.record(&self.state);
        self.stats.tick.store(self.tick, Ordering::Relaxed);
        self.publish(outbound);
    }

    /// Fan messages out to connection writers without waiting on any of them
    fn publish(&self, outbound: Vec<Outbound>) {
        for msg in outbound {
            // Err only means nobody is connected
            let _ = self.outbound_tx.send(Arc::new(msg));
        }
    }
}
