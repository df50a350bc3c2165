use glam::Vec3;

use crate::sample::Sample;

pub const DEFAULT_STALENESS_FACTOR: f32 = 5.0;
pub const DEFAULT_RUBBERBAND_DISTANCE: f32 = 5.0;

/// True when the goal has been waited on for more than `factor` times the
/// length of the segment leading up to it.
///
/// Distance alone can't tell a blocked path from a slow one, so this is
/// purely time based.
pub fn is_stale(start: &Sample, goal: &Sample, now: f32, factor: f32) -> bool {
    let segment = goal.timestamp() - start.timestamp();
    let waited = now - goal.timestamp();
    waited > segment * factor
}

/// Authority-side check for someone else having moved the object.
///
/// Tracks the last position the sync component itself applied. Anything
/// further away than `distance` means a respawn, teleport or similar moved
/// it, and observers must be corrected instead of interpolating across.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    distance: f32,
    last_applied: Vec3,
}

impl DivergenceGuard {
    pub fn new(distance: f32, position: Vec3) -> Self {
        Self {
            distance,
            last_applied: position,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn last_applied(&self) -> Vec3 {
        self.last_applied
    }

    pub fn record(&mut self, position: Vec3) {
        self.last_applied = position;
    }

    /// Compared by distance rather than equality since positions lose
    /// precision on the way through the codec.
    pub fn diverged(&self, actual: Vec3) -> bool {
        self.last_applied.distance(actual) > self.distance
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn at(timestamp: f32) -> Sample {
        Sample::new(timestamp, Vec3::ZERO, Quat::IDENTITY, 0.0)
    }

    #[test]
    fn stale_after_five_segments() {
        let start = at(0.0);
        let goal = at(1.0);
        assert!(!is_stale(&start, &goal, 6.0, DEFAULT_STALENESS_FACTOR));
        assert!(is_stale(&start, &goal, 6.01, DEFAULT_STALENESS_FACTOR));
    }

    #[test]
    fn zero_length_segment_is_stale_immediately_after() {
        let start = at(2.0);
        let goal = at(2.0);
        assert!(!is_stale(&start, &goal, 2.0, DEFAULT_STALENESS_FACTOR));
        assert!(is_stale(&start, &goal, 2.001, DEFAULT_STALENESS_FACTOR));
    }

    #[test]
    fn divergence_uses_distance_threshold() {
        let mut guard = DivergenceGuard::new(5.0, Vec3::ZERO);
        assert!(!guard.diverged(Vec3::new(4.9, 0.0, 0.0)));
        assert!(guard.diverged(Vec3::new(0.0, 5.1, 0.0)));

        guard.record(Vec3::new(0.0, 5.1, 0.0));
        assert!(!guard.diverged(Vec3::new(0.0, 5.1, 0.0)));
    }
}
