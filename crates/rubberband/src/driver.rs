use std::collections::HashMap;

use glam::Vec3;

use crate::error::SyncError;
use crate::net::{sequence_greater_than, SyncMessage, SyncPacket};
use crate::registry::EntityRegistry;
use crate::sync::{EntityId, SyncEvent, TransformSync};

/// Monotonic frame time in seconds.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    now: f32,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negative deltas are ignored so time never runs backwards.
    pub fn advance(&mut self, dt: f32) -> f32 {
        self.now += dt.max(0.0);
        self.frame += 1;
        self.now
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub packets: Vec<SyncPacket>,
    pub events: Vec<(EntityId, SyncEvent)>,
    /// Packets dropped for unknown entities, wrong roles or arriving out
    /// of order.
    pub ignored: usize,
    /// Payloads that failed to decode. Only the packet itself is lost; the
    /// rest of the frame is still applied.
    pub errors: Vec<(EntityId, SyncError)>,
}

/// Single per-frame driver for every synced entity of one process.
///
/// Each tick first applies all packets that arrived for the frame, then
/// updates entities in registry order, so interpolation always sees the
/// newest samples. Unreliable state updates that are not newer than the
/// newest state or forced position already applied for an entity are
/// discarded, so a late pre-teleport state can't drag an observer back.
#[derive(Debug, Default)]
pub struct SyncDriver {
    clock: FrameClock,
    registry: EntityRegistry,
    next_sequence: u32,
    newest_state: HashMap<EntityId, u32>,
}

impl SyncDriver {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            clock: FrameClock::new(),
            registry,
            next_sequence: 0,
            newest_state: HashMap::new(),
        }
    }

    pub fn now(&self) -> f32 {
        self.clock.now()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Removes one entity along with its ordering state.
    pub fn despawn(&mut self, id: EntityId) -> Option<TransformSync> {
        self.newest_state.remove(&id);
        self.registry.remove(id)
    }

    /// Stops the session; every entity is dropped.
    pub fn shutdown(&mut self) {
        self.registry.clear();
        self.newest_state.clear();
    }

    pub fn tick<I>(&mut self, dt: f32, inbound: I) -> TickReport
    where
        I: IntoIterator<Item = SyncPacket>,
    {
        let now = self.clock.advance(dt);
        let mut report = TickReport::default();

        for packet in inbound {
            let id = EntityId(packet.message.entity_id());
            let sequence = packet.sequence;
            match self.apply(packet, now, &mut report) {
                Ok(Some(event)) => report.events.push(event),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("packet {} for {} rejected: {}", sequence, id, err);
                    report.errors.push((id, err));
                }
            }
        }

        for sync in self.registry.iter_mut() {
            let output = sync.update(now, dt);
            let id = sync.id();
            report
                .events
                .extend(output.events.into_iter().map(|event| (id, event)));
            for message in output.messages {
                report
                    .packets
                    .push(SyncPacket::new(self.next_sequence, message));
                self.next_sequence = self.next_sequence.wrapping_add(1);
            }
        }

        report
    }

    fn apply(
        &mut self,
        packet: SyncPacket,
        now: f32,
        report: &mut TickReport,
    ) -> Result<Option<(EntityId, SyncEvent)>, SyncError> {
        let id = EntityId(packet.message.entity_id());
        let Some(sync) = self.registry.get_mut(id) else {
            // late packets for despawned entities are normal
            log::debug!("dropping packet {} for unknown entity {}", packet.sequence, id);
            self.newest_state.remove(&id);
            report.ignored += 1;
            return Ok(None);
        };
        let role = sync.role();

        match packet.message {
            SyncMessage::OwnerUpdate { payload, .. } if role.server => {
                sync.receive_owner_update(&payload, now)?;
            }
            SyncMessage::StateUpdate { payload, .. } if !role.server => {
                if is_outdated(&self.newest_state, id, packet.sequence) {
                    log::debug!("dropping out of order state {} for {}", packet.sequence, id);
                    report.ignored += 1;
                    return Ok(None);
                }
                sync.receive_state(&payload, now)?;
                self.newest_state.insert(id, packet.sequence);
            }
            SyncMessage::ForcePosition { position, .. } if !role.server => {
                let event = sync.receive_force_position(Vec3::from_array(position));
                // states sent before the correction must not undo it
                if !is_outdated(&self.newest_state, id, packet.sequence) {
                    self.newest_state.insert(id, packet.sequence);
                }
                return Ok(Some((id, event)));
            }
            message => {
                log::warn!("{} cannot handle {:?} as {:?}", id, message, role);
                report.ignored += 1;
            }
        }
        Ok(None)
    }
}

fn is_outdated(newest_state: &HashMap<EntityId, u32>, id: EntityId, sequence: u32) -> bool {
    newest_state
        .get(&id)
        .is_some_and(|&newest| !sequence_greater_than(sequence, newest))
}
