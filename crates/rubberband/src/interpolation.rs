use glam::{Quat, Vec3};

use crate::sample::Sample;

/// Progress through the rotation segment, in `[0, 1]`.
///
/// Time is measured from when `goal` arrived, so the segment being played
/// back is always the previous one (`start` to `goal`), one segment behind
/// the newest data.
pub fn interpolation_factor(start: &Sample, goal: &Sample, now: f32) -> f32 {
    let duration = goal.timestamp() - start.timestamp();
    if duration <= 0.0 {
        return 0.0;
    }
    ((now - goal.timestamp()) / duration).clamp(0.0, 1.0)
}

pub fn interpolate_rotation(start: &Sample, goal: &Sample, now: f32) -> Quat {
    let t = interpolation_factor(start, goal, now);
    let from = start.rotation();
    let mut to = goal.rotation();
    // take the short way round
    if from.dot(to) < 0.0 {
        to = -to;
    }
    from.slerp(to, t)
}

/// Constant-speed pursuit of `goal.position` at the faster of the two
/// samples' speeds; a just-started entity has `start.speed() == 0`.
pub fn interpolate_position(start: &Sample, goal: &Sample, current: Vec3, dt: f32) -> Vec3 {
    let speed = start.speed().max(goal.speed());
    move_towards(current, goal.position(), speed * dt)
}

/// Moves `current` at most `max_delta` towards `target`, landing on it
/// exactly when close enough.
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance == 0.0 {
        return target;
    }
    if max_delta <= 0.0 {
        return current;
    }
    current + delta / distance * max_delta
}
