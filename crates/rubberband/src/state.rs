use glam::{Quat, Vec3};

use crate::guard::{self, DivergenceGuard};
use crate::interpolation;
use crate::sample::{self, Sample};
use crate::wire::DecodedTransform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Where the new `start` came from when a sample was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// First sample of a window; `start` was made up from the display.
    Bootstrapped,
    /// Viewer was too far off; `start` is the previous goal as received.
    PreviousGoal,
    /// `start` is the previous goal moved to the displayed transform.
    Displayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapReason {
    Stale,
    MissingStart,
}

/// What the display should do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// No window to play back.
    Idle,
    Interpolate(Transform),
    /// Jump straight to the goal. The window is already cleared.
    Snap(Transform, SnapReason),
}

/// Interpolation window and bookkeeping for one replicated entity.
#[derive(Debug, Clone)]
pub struct ReplicationState {
    start: Option<Sample>,
    goal: Option<Sample>,
    guard: DivergenceGuard,
    previous_displayed_position: Vec3,
}

impl ReplicationState {
    pub fn new(position: Vec3, rubberband_distance: f32) -> Self {
        Self {
            start: None,
            goal: None,
            guard: DivergenceGuard::new(rubberband_distance, position),
            previous_displayed_position: position,
        }
    }

    pub fn start(&self) -> Option<&Sample> {
        self.start.as_ref()
    }

    pub fn goal(&self) -> Option<&Sample> {
        self.goal.as_ref()
    }

    pub fn has_window(&self) -> bool {
        self.start.is_some() || self.goal.is_some()
    }

    pub fn last_authoritative_position(&self) -> Vec3 {
        self.guard.last_applied()
    }

    pub fn previous_displayed_position(&self) -> Vec3 {
        self.previous_displayed_position
    }

    pub fn guard(&self) -> &DivergenceGuard {
        &self.guard
    }

    pub(crate) fn guard_mut(&mut self) -> &mut DivergenceGuard {
        &mut self.guard
    }

    pub(crate) fn record_display(&mut self, previous: Vec3) {
        self.previous_displayed_position = previous;
    }

    /// Builds the sample for a freshly decoded transform. Speed has to be
    /// estimated against the current goal before it becomes the new start.
    pub fn sample_for(
        &self,
        decoded: DecodedTransform,
        now: f32,
        displayed: Vec3,
        send_interval: f32,
    ) -> Sample {
        let speed = sample::estimate_speed(
            self.goal.as_ref(),
            decoded.position,
            now,
            displayed,
            send_interval,
        );
        Sample::new(now, decoded.position, decoded.rotation, speed)
    }

    /// Makes `temp` the new goal.
    ///
    /// The previous goal becomes the start, re-anchored to the displayed
    /// transform unless the viewer is further from it than the old and new
    /// segments combined (after a teleport or a long stall), so playback resumes
    /// from where the viewer is without popping.
    pub fn apply_sample(&mut self, temp: Sample, displayed: Transform, send_interval: f32) -> Anchor {
        let anchor = match (self.start, self.goal) {
            (Some(start), Some(goal)) => {
                let old_distance = start.position().distance(goal.position());
                let new_distance = goal.position().distance(temp.position());
                if displayed.position.distance(goal.position()) < old_distance + new_distance {
                    self.start = Some(goal.anchored_at(displayed.position, displayed.rotation));
                    Anchor::Displayed
                } else {
                    self.start = Some(goal);
                    Anchor::PreviousGoal
                }
            }
            _ => {
                self.start = Some(Sample::new(
                    temp.timestamp() - send_interval,
                    displayed.position,
                    displayed.rotation,
                    temp.speed(),
                ));
                Anchor::Bootstrapped
            }
        };
        self.goal = Some(temp);
        anchor
    }

    /// Drops both ends of the window together.
    pub fn clear_window(&mut self) {
        if self.has_window() {
            log::debug!("interpolation window cleared");
        }
        self.start = None;
        self.goal = None;
    }

    /// Decides the displayed transform for one tick of length `dt`.
    pub fn step(&mut self, now: f32, dt: f32, current: Transform, staleness_factor: f32) -> Step {
        let Some(goal) = self.goal else {
            return Step::Idle;
        };
        let target = Transform::new(goal.position(), goal.rotation());

        let Some(start) = self.start else {
            self.clear_window();
            return Step::Snap(target, SnapReason::MissingStart);
        };

        if guard::is_stale(&start, &goal, now, staleness_factor) {
            self.clear_window();
            return Step::Snap(target, SnapReason::Stale);
        }

        Step::Interpolate(Transform::new(
            interpolation::interpolate_position(&start, &goal, current.position, dt),
            interpolation::interpolate_rotation(&start, &goal, now),
        ))
    }

    #[cfg(test)]
    pub(crate) fn set_window(&mut self, start: Option<Sample>, goal: Option<Sample>) {
        self.start = start;
        self.goal = goal;
    }
}
