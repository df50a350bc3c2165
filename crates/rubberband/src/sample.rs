use glam::{Quat, Vec3};

/// One authoritative transform observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    timestamp: f32,
    position: Vec3,
    rotation: Quat,
    speed: f32,
}

impl Sample {
    pub fn new(timestamp: f32, position: Vec3, rotation: Quat, speed: f32) -> Self {
        Self {
            timestamp,
            position,
            rotation,
            speed,
        }
    }

    pub fn timestamp(&self) -> f32 {
        self.timestamp
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Estimated movement speed in units per second when this sample arrived.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Same sample moved to where the viewer currently is.
    pub fn anchored_at(self, position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..self
        }
    }
}

/// Speed implied by moving from `previous` to `position` at `timestamp`.
///
/// Without a previous sample the displayed position and one nominal send
/// interval stand in for it. Zero or negative elapsed time yields `0`.
pub fn estimate_speed(
    previous: Option<&Sample>,
    position: Vec3,
    timestamp: f32,
    displayed: Vec3,
    send_interval: f32,
) -> f32 {
    let (reference, elapsed) = match previous {
        Some(sample) => (sample.position, timestamp - sample.timestamp),
        None => (displayed, send_interval),
    };
    if elapsed > 0.0 {
        position.distance(reference) / elapsed
    } else {
        0.0
    }
}
