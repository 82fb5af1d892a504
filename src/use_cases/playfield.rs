// The per-session simulation actor.
//
// A single task owns the entity registry and the id counter. Everything else
// talks to it through the mailboxes behind `Playfield`, so the registry is
// never shared and needs no lock.

use super::broadcast::Broadcast;
use super::ticker::TickSource;
use crate::domain::{BulkPayload, EntityId, MoveEntry, Mover, Outbox, Packet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Channel capacities for a playfield and its broadcast.
#[derive(Debug, Clone, Copy)]
pub struct PlayfieldSettings {
    /// Capacity of the join, part and probe mailboxes.
    pub mailbox_capacity: usize,
    /// Capacity of the broadcast inbox between the tick and the fan-out task.
    pub broadcast_capacity: usize,
}

impl Default for PlayfieldSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            broadcast_capacity: 1024,
        }
    }
}

/// Returned when the playfield loop is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayfieldError {
    Closed,
}

impl fmt::Display for PlayfieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayfieldError::Closed => f.write_str("playfield is not running"),
        }
    }
}

impl std::error::Error for PlayfieldError {}

/// Answer to the running probe, taken between two loop iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningStatus {
    pub running: bool,
    /// Entities currently in the registry, including soft-deleted ones.
    pub members: usize,
    /// Highest id handed out so far.
    pub last_id: EntityId,
}

type Reply<T> = oneshot::Sender<T>;

/// Handle to a running playfield. Cheap to clone; every clone talks to the same loop.
#[derive(Clone)]
pub struct Playfield {
    join_tx: mpsc::Sender<(Arc<dyn Mover>, Reply<EntityId>)>,
    part_tx: mpsc::Sender<(Arc<dyn Mover>, Reply<()>)>,
    running_tx: mpsc::Sender<Reply<RunningStatus>>,
}

impl Playfield {
    /// Spawns the simulation loop driven by `ticker` and returns its handle.
    pub fn start(ticker: impl TickSource, settings: PlayfieldSettings) -> Self {
        let (join_tx, join_rx) = mpsc::channel(settings.mailbox_capacity);
        let (part_tx, part_rx) = mpsc::channel(settings.mailbox_capacity);
        let (running_tx, running_rx) = mpsc::channel(settings.mailbox_capacity);

        let state = FieldState {
            registry: HashMap::new(),
            last_id: EntityId(0),
            broadcast: Broadcast::new(settings.broadcast_capacity),
        };
        info!("playfield starting");
        tokio::spawn(run_loop(state, ticker, join_rx, part_rx, running_rx));

        Self {
            join_tx,
            part_tx,
            running_tx,
        }
    }

    /// Registers `entity` and returns the id it was given.
    ///
    /// Joining an entity that is already registered returns its existing id.
    pub async fn join(&self, entity: Arc<dyn Mover>) -> Result<EntityId, PlayfieldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.join_tx
            .send((entity, reply_tx))
            .await
            .map_err(|_| PlayfieldError::Closed)?;
        reply_rx.await.map_err(|_| PlayfieldError::Closed)
    }

    /// Asks the loop to remove `entity`. Resolves once the loop has processed it.
    ///
    /// Terminable entities are killed now and removed on the next tick, which
    /// announces them in that tick's kill list. Others are removed right away.
    pub async fn part(&self, entity: Arc<dyn Mover>) -> Result<(), PlayfieldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.part_tx
            .send((entity, reply_tx))
            .await
            .map_err(|_| PlayfieldError::Closed)?;
        reply_rx.await.map_err(|_| PlayfieldError::Closed)
    }

    /// Running probe. Resolves once the loop has finished whatever it was doing.
    pub async fn running(&self) -> Result<RunningStatus, PlayfieldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.running_tx
            .send(reply_tx)
            .await
            .map_err(|_| PlayfieldError::Closed)?;
        reply_rx.await.map_err(|_| PlayfieldError::Closed)
    }

    /// True when both handles drive the same loop.
    pub fn same_playfield(&self, other: &Playfield) -> bool {
        self.join_tx.same_channel(&other.join_tx)
    }
}

// Registry key: the address of the entity allocation. Stable while the
// registration holds its `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntityKey(usize);

impl EntityKey {
    fn of(entity: &Arc<dyn Mover>) -> Self {
        Self(Arc::as_ptr(entity) as *const () as usize)
    }
}

struct Registration {
    id: EntityId,
    entity: Arc<dyn Mover>,
    // The outbox subscribed to the broadcast, taken when unsubscribing.
    outbox: Option<Outbox>,
}

struct FieldState {
    registry: HashMap<EntityKey, Registration>,
    last_id: EntityId,
    broadcast: Broadcast,
}

impl FieldState {
    fn add(&mut self, entity: Arc<dyn Mover>) -> EntityId {
        let key = EntityKey::of(&entity);
        if let Some(existing) = self.registry.get(&key) {
            warn!(entity_id = %existing.id, "entity joined twice; keeping its id");
            return existing.id;
        }

        self.last_id = EntityId(self.last_id.0 + 1);
        let id = self.last_id;

        let outbox = entity.as_outbound().and_then(|outbound| outbound.outbox());
        if let Some(outbox) = &outbox {
            self.broadcast.add(outbox.clone());
        }

        self.registry.insert(key, Registration { id, entity, outbox });
        info!(entity_id = %id, members = self.registry.len(), "entity joined");
        id
    }

    fn part(&mut self, entity: &Arc<dyn Mover>) {
        let key = EntityKey::of(entity);
        let Some(registration) = self.registry.get_mut(&key) else {
            debug!("part for an entity that is not registered");
            return;
        };

        if let Some(terminable) = registration.entity.as_terminable() {
            if terminable.killed() {
                return;
            }
            terminable.kill();
            // The outbox closes as soon as nobody else holds it.
            unsubscribe(&self.broadcast, registration);
            info!(entity_id = %registration.id, "entity killed; removing on next tick");
            return;
        }

        if let Some(mut registration) = self.registry.remove(&key) {
            unsubscribe(&self.broadcast, &mut registration);
            info!(entity_id = %registration.id, "entity removed");
        }
    }

    /// Advances every entity one step and broadcasts the tick's batch.
    async fn tick(&mut self) {
        let mut bulk = BulkPayload::default();
        let mut dead = Vec::new();

        for (key, registration) in &self.registry {
            let entity = &registration.entity;
            if entity.as_terminable().is_some_and(|t| t.killed()) {
                dead.push(*key);
                bulk.kills.push(registration.id.to_string());
                continue;
            }

            entity.step(entity.direction());
            bulk.moves.push(MoveEntry {
                id: registration.id,
                positions: entity.positions(),
            });
        }

        for key in dead {
            if let Some(mut registration) = self.registry.remove(&key) {
                unsubscribe(&self.broadcast, &mut registration);
                info!(entity_id = %registration.id, "entity removed");
            }
        }

        trace!(
            moves = bulk.moves.len(),
            kills = bulk.kills.len(),
            "tick processed"
        );
        if self.broadcast.publish(Packet::bulk(bulk)).await.is_err() {
            warn!("broadcast inbox closed; dropping tick batch");
        }
    }

    fn status(&self) -> RunningStatus {
        RunningStatus {
            running: true,
            members: self.registry.len(),
            last_id: self.last_id,
        }
    }
}

fn unsubscribe(broadcast: &Broadcast, registration: &mut Registration) {
    if let Some(outbox) = registration.outbox.take() {
        broadcast.del(&outbox);
    }
}

async fn run_loop(
    mut state: FieldState,
    mut ticker: impl TickSource,
    mut join_rx: mpsc::Receiver<(Arc<dyn Mover>, Reply<EntityId>)>,
    mut part_rx: mpsc::Receiver<(Arc<dyn Mover>, Reply<()>)>,
    mut running_rx: mpsc::Receiver<Reply<RunningStatus>>,
) {
    loop {
        // No priority between branches; callers needing order wait on replies.
        tokio::select! {
            joined = join_rx.recv() => {
                let Some((entity, reply)) = joined else { break };
                let id = state.add(entity);
                let _ = reply.send(id);
            }
            parted = part_rx.recv() => {
                let Some((entity, reply)) = parted else { break };
                state.part(&entity);
                let _ = reply.send(());
            }
            _ = ticker.tick() => {
                state.tick().await;
            }
            probe = running_rx.recv() => {
                let Some(reply) = probe else { break };
                let _ = reply.send(state.status());
            }
        }
    }

    ticker.stop();
    info!(members = state.registry.len(), "playfield handles dropped; loop exiting");
}
