use std::fmt;

use glam::{Quat, Vec3};

use crate::config::SyncConfig;
use crate::error::{ConfigError, WireError};
use crate::net::SyncMessage;
use crate::state::{ReplicationState, Step, Transform};
use crate::wire::WireFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What this process is for one entity. A host is both server and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub server: bool,
    pub client: bool,
    /// This process moves the entity itself (the local player).
    pub local_owner: bool,
}

impl Role {
    /// Server without a local view, entity driven by a remote owner.
    pub fn dedicated_server() -> Self {
        Self {
            server: true,
            client: false,
            local_owner: false,
        }
    }

    /// Listen server viewing an entity owned by a remote client.
    pub fn host() -> Self {
        Self {
            server: true,
            client: true,
            local_owner: false,
        }
    }

    /// Listen server's own player.
    pub fn host_owner() -> Self {
        Self {
            server: true,
            client: true,
            local_owner: true,
        }
    }

    /// Client moving its own player.
    pub fn owner() -> Self {
        Self {
            server: false,
            client: true,
            local_owner: true,
        }
    }

    /// Client watching someone else's entity.
    pub fn observer() -> Self {
        Self {
            server: false,
            client: true,
            local_owner: false,
        }
    }

    fn interpolates(&self) -> bool {
        self.client && !self.local_owner
    }
}

/// Minimum-interval gate on a monotonic clock.
#[derive(Debug, Clone)]
pub struct SendGate {
    interval: f32,
    last_send: Option<f32>,
}

impl SendGate {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            last_send: None,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Opens at most once per interval and restarts the interval when it
    /// does, whether or not anything ends up being sent.
    pub fn try_open(&mut self, now: f32) -> bool {
        let open = self
            .last_send
            .is_none_or(|last| now - last >= self.interval);
        if open {
            self.last_send = Some(now);
        }
        open
    }
}

/// Snap or correction worth surfacing to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent {
    /// Observer gave up on a stalled window and jumped to the goal.
    Snapped { position: Vec3 },
    /// Authority noticed an outside move and is correcting observers.
    Rubberbanded { from: Vec3, to: Vec3 },
    /// Correction received from the authority.
    Forced { position: Vec3 },
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOutput {
    pub messages: Vec<SyncMessage>,
    pub events: Vec<SyncEvent>,
}

/// Transform replication for one entity.
///
/// Owns the displayed transform. Other systems move the entity through
/// [`TransformSync::transform_mut`]; the sync path itself only ever moves it
/// through [`TransformSync::set_position_and_rotation`].
#[derive(Debug, Clone)]
pub struct TransformSync {
    id: EntityId,
    role: Role,
    config: SyncConfig,
    format: WireFormat,
    transform: Transform,
    state: ReplicationState,
    gate: SendGate,
    last_sent: Option<Transform>,
    dirty: bool,
    last_velocity: Vec3,
}

impl TransformSync {
    pub fn new(
        id: EntityId,
        role: Role,
        config: SyncConfig,
        transform: Transform,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            role,
            format: config.wire_format(),
            state: ReplicationState::new(transform.position, config.rubberband_distance),
            gate: SendGate::new(config.send_interval),
            config,
            transform,
            last_sent: None,
            dirty: false,
            last_velocity: Vec3::ZERO,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Direct access for gameplay code (movement, respawn, teleport).
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn state(&self) -> &ReplicationState {
        &self.state
    }

    pub fn previous_position(&self) -> Vec3 {
        self.state.previous_displayed_position()
    }

    /// The one place the sync path moves the entity.
    pub fn set_position_and_rotation(&mut self, position: Vec3, rotation: Quat) {
        self.state.record_display(self.transform.position);
        self.transform = Transform::new(position, rotation);

        // the server only owns the position it applied for remote owners
        if self.role.server && !self.role.local_owner {
            self.state.guard_mut().record(position);
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.format
            .encode(self.transform.position, self.transform.rotation)
    }

    /// Applies a server broadcast. The payload is always fully decoded so a
    /// shared stream stays aligned, even when the owner ignores it.
    pub fn receive_state(&mut self, payload: &[u8], now: f32) -> Result<(), WireError> {
        let expected = self.format.payload_len();
        if payload.len() > expected {
            return Err(WireError::TrailingBytes {
                extra: payload.len() - expected,
            });
        }
        let mut cursor = payload;
        self.receive_from(&mut cursor, now)
    }

    /// Reads exactly one payload from the front of `cursor`.
    pub fn receive_from(&mut self, cursor: &mut &[u8], now: f32) -> Result<(), WireError> {
        let decoded = self.format.decode_from(cursor, self.transform.rotation)?;
        let temp = self.state.sample_for(
            decoded,
            now,
            self.transform.position,
            self.config.send_interval,
        );

        if !self.role.local_owner {
            self.state
                .apply_sample(temp, self.transform, self.config.send_interval);
        }
        Ok(())
    }

    /// Applies an owner update on the server and marks the entity for
    /// broadcast.
    pub fn receive_owner_update(&mut self, payload: &[u8], now: f32) -> Result<(), WireError> {
        self.receive_state(payload, now)?;

        // nothing interpolates on a dedicated server, take the goal as is
        if self.role.server && !self.role.client {
            if let Some(goal) = self.state.goal().copied() {
                self.set_position_and_rotation(goal.position(), goal.rotation());
            }
        }
        self.dirty = true;
        Ok(())
    }

    pub fn receive_force_position(&mut self, position: Vec3) -> SyncEvent {
        log::warn!("server forced position of {} to {}", self.id, position);
        self.set_position_and_rotation(position, self.transform.rotation);
        self.state.clear_window();
        SyncEvent::Forced { position }
    }

    /// Once-per-frame work for this entity.
    pub fn update(&mut self, now: f32, dt: f32) -> UpdateOutput {
        let mut output = UpdateOutput::default();

        if self.role.server {
            if self.take_changed() {
                output.messages.push(SyncMessage::StateUpdate {
                    entity_id: self.id.0,
                    payload: self.encode(),
                });
            }

            if !self.role.local_owner {
                self.check_divergence(&mut output);
            }
        }

        if self.role.client {
            if !self.role.server && self.role.local_owner && self.gate.try_open(now) {
                if self.take_changed() {
                    output.messages.push(SyncMessage::OwnerUpdate {
                        entity_id: self.id.0,
                        payload: self.encode(),
                    });
                }
            }

            if self.role.interpolates() {
                self.step_display(now, dt, &mut output);
            }
        }

        output
    }

    fn take_changed(&mut self) -> bool {
        let changed = self.dirty || self.last_sent != Some(self.transform);
        self.last_sent = Some(self.transform);
        self.dirty = false;
        changed
    }

    fn check_divergence(&mut self, output: &mut UpdateOutput) {
        let actual = self.transform.position;
        if !self.state.guard().diverged(actual) {
            return;
        }

        let from = self.state.last_authoritative_position();
        log::warn!(
            "{} moved outside sync from {} to {}, forcing position on observers",
            self.id,
            from,
            actual
        );
        output.messages.push(SyncMessage::ForcePosition {
            entity_id: self.id.0,
            position: actual.to_array(),
        });
        output.events.push(SyncEvent::Rubberbanded { from, to: actual });

        self.state.clear_window();
        self.state.guard_mut().record(actual);
    }

    fn step_display(&mut self, now: f32, dt: f32, output: &mut UpdateOutput) {
        match self
            .state
            .step(now, dt, self.transform, self.config.staleness_factor)
        {
            Step::Idle => {}
            Step::Interpolate(next) => self.set_position_and_rotation(next.position, next.rotation),
            Step::Snap(target, reason) => {
                log::debug!("{} snapped to goal ({:?})", self.id, reason);
                self.set_position_and_rotation(target.position, target.rotation);
                output.events.push(SyncEvent::Snapped {
                    position: target.position,
                });
            }
        }
    }

    /// Velocity guess from the last displayed step, smoothed over two
    /// frames. Free information for animation without extra bandwidth.
    pub fn estimate_velocity(&mut self) -> Vec3 {
        let (Some(start), Some(goal)) = (self.state.start(), self.state.goal()) else {
            return Vec3::ZERO;
        };
        let speed = start.speed().max(goal.speed());
        let delta = self.transform.position - self.state.previous_displayed_position();
        let velocity = delta.normalize_or_zero() * speed;

        let average = (velocity + self.last_velocity) / 2.0;
        self.last_velocity = velocity;
        average
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    #[test]
    fn send_gate_limits_rate() {
        let mut gate = SendGate::new(0.1);
        assert!(gate.try_open(0.0));
        assert!(!gate.try_open(0.05));
        assert!(gate.try_open(0.1));
        assert!(!gate.try_open(0.15));
        assert!(gate.try_open(0.35));
    }

    #[test]
    fn owner_sends_only_when_moved_and_gate_open() {
        let mut owner =
            TransformSync::new(EntityId(1), Role::owner(), config(), Transform::default()).unwrap();

        let first = owner.update(0.0, 0.016);
        assert_eq!(first.messages.len(), 1);
        assert!(matches!(first.messages[0], SyncMessage::OwnerUpdate { entity_id: 1, .. }));

        owner.transform_mut().position = Vec3::X;
        assert!(owner.update(0.05, 0.016).messages.is_empty());
        assert_eq!(owner.update(0.1, 0.016).messages.len(), 1);

        // unchanged since last send
        assert!(owner.update(0.2, 0.016).messages.is_empty());
    }

    #[test]
    fn owner_ignores_echoed_state_but_consumes_it() {
        let mut owner =
            TransformSync::new(EntityId(1), Role::owner(), config(), Transform::default()).unwrap();
        let payload = config()
            .wire_format()
            .encode(Vec3::new(9.0, 0.0, 0.0), Quat::IDENTITY);

        owner.receive_state(&payload, 1.0).unwrap();
        assert!(owner.state().goal().is_none());
        assert_eq!(owner.transform().position, Vec3::ZERO);
    }

    #[test]
    fn dedicated_server_applies_owner_update_directly() {
        let mut server = TransformSync::new(
            EntityId(2),
            Role::dedicated_server(),
            config(),
            Transform::default(),
        )
        .unwrap();
        let target = Vec3::new(1.0, 2.0, 3.0);
        let payload = config().wire_format().encode(target, Quat::IDENTITY);

        server.receive_owner_update(&payload, 0.5).unwrap();
        assert_eq!(server.transform().position, target);
        assert_eq!(server.state().last_authoritative_position(), target);

        let output = server.update(0.5, 0.016);
        assert!(matches!(
            output.messages.as_slice(),
            [SyncMessage::StateUpdate { entity_id: 2, .. }]
        ));
        assert!(output.events.is_empty());
    }

    #[test]
    fn server_rubberbands_outside_moves() {
        let mut server = TransformSync::new(
            EntityId(3),
            Role::dedicated_server(),
            config(),
            Transform::default(),
        )
        .unwrap();
        let payload = config().wire_format().encode(Vec3::X, Quat::IDENTITY);
        server.receive_owner_update(&payload, 0.1).unwrap();
        server.update(0.1, 0.016);

        // respawn moves the player far away behind the sync's back
        let spawn = Vec3::new(100.0, 0.0, 0.0);
        server.transform_mut().position = spawn;
        let output = server.update(0.2, 0.016);

        assert!(output.messages.iter().any(|m| matches!(
            m,
            SyncMessage::ForcePosition { entity_id: 3, position } if *position == spawn.to_array()
        )));
        assert_eq!(
            output.events,
            vec![SyncEvent::Rubberbanded {
                from: Vec3::X,
                to: spawn
            }]
        );
        assert!(server.state().start().is_none());
        assert!(server.state().goal().is_none());

        // fires once per outside move
        let output = server.update(0.3, 0.016);
        assert!(output.events.is_empty());
    }

    #[test]
    fn small_outside_moves_are_tolerated() {
        let mut server = TransformSync::new(
            EntityId(3),
            Role::dedicated_server(),
            config(),
            Transform::default(),
        )
        .unwrap();
        server.transform_mut().position = Vec3::new(4.0, 0.0, 0.0);
        let output = server.update(0.1, 0.016);
        assert!(output.events.is_empty());
    }

    #[test]
    fn host_owner_never_rubberbands_itself() {
        let mut host = TransformSync::new(
            EntityId(4),
            Role::host_owner(),
            config(),
            Transform::default(),
        )
        .unwrap();
        host.transform_mut().position = Vec3::new(50.0, 0.0, 0.0);
        let output = host.update(0.1, 0.016);
        assert!(output.events.is_empty());
        assert!(matches!(
            output.messages.as_slice(),
            [SyncMessage::StateUpdate { .. }]
        ));
    }

    #[test]
    fn force_position_clears_window() {
        let mut observer =
            TransformSync::new(EntityId(5), Role::observer(), config(), Transform::default())
                .unwrap();
        let payload = config().wire_format().encode(Vec3::X, Quat::IDENTITY);
        observer.receive_state(&payload, 0.1).unwrap();
        assert!(observer.state().goal().is_some());

        let event = observer.receive_force_position(Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(
            event,
            SyncEvent::Forced {
                position: Vec3::new(0.0, 0.0, 20.0)
            }
        );
        assert_eq!(observer.transform().position, Vec3::new(0.0, 0.0, 20.0));
        assert!(observer.state().start().is_none());
        assert!(observer.state().goal().is_none());
    }

    #[test]
    fn truncated_state_is_an_error() {
        let mut observer =
            TransformSync::new(EntityId(6), Role::observer(), config(), Transform::default())
                .unwrap();
        let err = observer.receive_state(&[0u8; 5], 0.0).unwrap_err();
        assert!(matches!(err, WireError::Truncated { expected: 15, actual: 5 }));
        assert!(observer.state().goal().is_none());
    }

    #[test]
    fn velocity_is_zero_without_window() {
        let mut observer =
            TransformSync::new(EntityId(7), Role::observer(), config(), Transform::default())
                .unwrap();
        assert_eq!(observer.estimate_velocity(), Vec3::ZERO);
    }

    #[test]
    fn velocity_follows_display_direction() {
        let mut observer =
            TransformSync::new(EntityId(7), Role::observer(), config(), Transform::default())
                .unwrap();
        let format = config().wire_format();
        observer
            .receive_state(&format.encode(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY), 0.1)
            .unwrap();
        observer.update(0.116, 0.016);

        let velocity = observer.estimate_velocity();
        assert!(velocity.x > 0.0);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = SyncConfig {
            send_interval: -1.0,
            ..Default::default()
        };
        assert!(TransformSync::new(EntityId(8), Role::observer(), bad, Transform::default()).is_err());
    }
}
