use anyhow::{Context, Result};
use glam::{Quat, Vec3};

use rubberband::{
    EntityId, EntityRegistry, LinkSimulator, PacketLossSimulation, Role, SyncConfig, SyncDriver,
    SyncEvent, Transform, TransformSync,
};

pub const PLAYER: EntityId = EntityId(1);

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub sync: SyncConfig,
    pub tick_rate: u32,
    pub duration: f32,
    /// Radius of the circle the owner walks, in world units.
    pub radius: f32,
    /// Owner walking speed in units per second.
    pub speed: f32,
    pub uplink: PacketLossSimulation,
    pub downlink: PacketLossSimulation,
    pub seed: u64,
    /// Server moves the player outside the sync path at this time.
    pub teleport_at: Option<f32>,
    pub teleport_offset: Vec3,
}

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub frames: u64,
    pub max_drift: f32,
    pub mean_drift: f32,
    pub final_drift: f32,
    pub snaps: u32,
    pub rubberbands: u32,
    pub forced: u32,
    pub ignored: usize,
    /// Packets whose payload failed to decode.
    pub rejected: usize,
    pub uplink_bytes: u64,
    pub downlink_bytes: u64,
    pub uplink_loss: f32,
    pub downlink_loss: f32,
}

/// Owner, dedicated server and one observer wired through simulated links,
/// all stepped on the same frame clock. The server's broadcast reaches the
/// owner over its own link so forced corrections come back to it.
pub struct Scenario {
    config: ScenarioConfig,
    owner: SyncDriver,
    server: SyncDriver,
    observer: SyncDriver,
    uplink: LinkSimulator,
    downlink: LinkSimulator,
    feedback: LinkSimulator,
    /// Shift applied to the scripted path after a forced correction.
    path_offset: Vec3,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.sync.validate().context("invalid sync settings")?;

        let start = Transform::from_position(path_position(&config, 0.0));
        let owner = single_entity(Role::owner(), &config.sync, start)?;
        let server = single_entity(Role::dedicated_server(), &config.sync, start)?;
        let observer = single_entity(Role::observer(), &config.sync, start)?;

        let uplink = LinkSimulator::new(config.uplink.clone(), config.seed);
        let downlink = LinkSimulator::new(config.downlink.clone(), config.seed.wrapping_add(1));
        let feedback = LinkSimulator::new(config.downlink.clone(), config.seed.wrapping_add(2));

        Ok(Self {
            config,
            owner,
            server,
            observer,
            uplink,
            downlink,
            feedback,
            path_offset: Vec3::ZERO,
        })
    }

    pub fn run(&mut self) -> Result<ScenarioReport> {
        let dt = 1.0 / self.config.tick_rate as f32;
        let frames = (self.config.duration * self.config.tick_rate as f32).ceil() as u64;
        let mut report = ScenarioReport::default();
        let mut teleport_pending = self.config.teleport_at;
        let mut drift_sum = 0.0_f32;

        for frame in 1..=frames {
            let now = frame as f32 * dt;

            let target = Transform::new(
                path_position(&self.config, now) + self.path_offset,
                path_rotation(&self.config, now),
            );
            *player(&mut self.owner)?.transform_mut() = target;

            let sent = self.owner.tick(dt, self.feedback.receive(now)?);
            tally(&sent.events, &mut report);
            for packet in &sent.packets {
                self.uplink.send(now, packet)?;
            }

            let inbound = self.uplink.receive(now)?;
            // an owner update applied in the same frame would overwrite the move
            if inbound.is_empty() && teleport_pending.is_some_and(|at| now >= at) {
                teleport_pending = None;
                let moved = player(&mut self.server)?;
                let destination = moved.transform().position + self.config.teleport_offset;
                log::info!("t={now:.2}s teleporting {PLAYER} to {destination}");
                moved.transform_mut().position = destination;
            }

            let broadcast = self.server.tick(dt, inbound);
            tally(&broadcast.events, &mut report);
            for packet in &broadcast.packets {
                self.downlink.send(now, packet)?;
                self.feedback.send(now, packet)?;
            }

            let watched = self.observer.tick(dt, self.downlink.receive(now)?);
            tally(&watched.events, &mut report);
            report.ignored += sent.ignored + broadcast.ignored + watched.ignored;
            report.rejected += sent.errors.len() + broadcast.errors.len() + watched.errors.len();

            if sent.events.iter().any(|(_, event)| matches!(event, SyncEvent::Forced { .. })) {
                let corrected = player(&mut self.owner)?.transform().position;
                self.path_offset += corrected - target.position;
            }

            let authoritative = player(&mut self.server)?.transform().position;
            let seen = player(&mut self.observer)?.transform().position;
            let drift = seen.distance(authoritative);
            drift_sum += drift;
            report.max_drift = report.max_drift.max(drift);
            report.final_drift = drift;

            if frame % self.config.tick_rate as u64 == 0 {
                log::info!(
                    "t={now:.1}s drift {drift:.3} (observer {seen}, server {authoritative}), {} in flight",
                    self.downlink.in_flight()
                );
            }
            report.frames = frame;
        }

        if report.frames > 0 {
            report.mean_drift = drift_sum / report.frames as f32;
        }
        report.uplink_bytes = self.uplink.stats().bytes_sent;
        report.downlink_bytes = self.downlink.stats().bytes_sent;
        report.uplink_loss = self.uplink.stats().loss_percent();
        report.downlink_loss = self.downlink.stats().loss_percent();

        self.owner.shutdown();
        self.server.shutdown();
        self.observer.shutdown();
        Ok(report)
    }
}

fn tally(events: &[(EntityId, SyncEvent)], report: &mut ScenarioReport) {
    for (id, event) in events {
        match event {
            SyncEvent::Snapped { position } => {
                log::debug!("{id} snapped to {position}");
                report.snaps += 1;
            }
            SyncEvent::Rubberbanded { from, to } => {
                log::info!("{id} rubberbanded from {from} to {to}");
                report.rubberbands += 1;
            }
            SyncEvent::Forced { position } => {
                log::debug!("{id} forced to {position}");
                report.forced += 1;
            }
        }
    }
}

fn single_entity(role: Role, sync: &SyncConfig, start: Transform) -> Result<SyncDriver> {
    let mut registry = EntityRegistry::new();
    registry.insert_named("player", TransformSync::new(PLAYER, role, sync.clone(), start)?)?;
    Ok(SyncDriver::new(registry))
}

fn player(driver: &mut SyncDriver) -> Result<&mut TransformSync> {
    driver
        .registry_mut()
        .get_mut(PLAYER)
        .with_context(|| format!("{PLAYER} is not registered"))
}

fn path_position(config: &ScenarioConfig, now: f32) -> Vec3 {
    if config.radius <= 0.0 {
        return Vec3::new(config.speed * now, 0.0, 0.0);
    }
    let angle = config.speed * now / config.radius;
    let (sin, cos) = angle.sin_cos();
    Vec3::new(config.radius * cos, 0.0, config.radius * sin)
}

/// Faces along the direction of travel.
fn path_rotation(config: &ScenarioConfig, now: f32) -> Quat {
    if config.radius <= 0.0 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(-(config.speed * now / config.radius))
}
