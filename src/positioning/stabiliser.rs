//! Deadzone stabiliser
//!
//! Works in screen millimetres. Two deadzones are tracked: the default one,
//! which follows the hand with the configured radius, and the current one,
//! which interaction modes enlarge while a click builds up. The current
//! radius can be shrunk back toward the default as the hand moves away from
//! the point it was held at.

use crate::geometry::{lerp, Vec2};

#[derive(Debug, Clone, Default)]
pub struct PositionStabiliser {
    default_radius: f32,
    current_radius: f32,

    shrinking: bool,
    shrink_speed: f32,

    previous_default: Option<Vec2>,
    previous_current: Vec2,

    offset: Vec2,
    last_raw: Vec2,
}

impl PositionStabiliser {
    pub fn new(default_radius_mm: f32) -> Self {
        Self {
            default_radius: default_radius_mm,
            current_radius: default_radius_mm,
            ..Default::default()
        }
    }

    pub fn default_radius(&self) -> f32 {
        self.default_radius
    }

    pub fn set_default_radius(&mut self, radius_mm: f32) {
        self.default_radius = radius_mm;
    }

    pub fn current_radius(&self) -> f32 {
        self.current_radius
    }

    pub fn set_current_radius(&mut self, radius_mm: f32) {
        self.current_radius = radius_mm;
    }

    pub fn is_shrinking(&self) -> bool {
        self.shrinking
    }

    /// Constrain `position` to the deadzones. The first call after a reset
    /// returns the position unchanged.
    pub fn apply_deadzone(&mut self, position: Vec2) -> Vec2 {
        self.last_raw = position;
        let position = position + self.offset;

        if self.default_radius == 0.0 {
            return position;
        }

        let (constrained_default, constrained_current) = match self.previous_default {
            None => (position, position),
            Some(previous_default) => {
                let constrained_default = Self::apply_deadzone_sized(previous_default, position, self.default_radius);
                if self.shrinking {
                    self.shrink(previous_default, constrained_default);
                }
                let constrained_current =
                    Self::apply_deadzone_sized(self.previous_current, position, self.current_radius);
                (constrained_default, constrained_current)
            }
        };

        self.previous_default = Some(constrained_default);
        self.previous_current = constrained_current;
        constrained_current
    }

    /// Keep `previous` while `current` is within `radius`; otherwise drag it
    /// so it sits exactly `radius` behind `current`
    pub fn apply_deadzone_sized(previous: Vec2, current: Vec2, radius: f32) -> Vec2 {
        if previous.distance(current) > radius {
            current + (previous - current).normalize() * radius
        } else {
            previous
        }
    }

    /// Start shrinking the current radius back toward the default. Does
    /// nothing when it is already at the default.
    pub fn start_shrinking(&mut self, speed: f32) {
        if self.current_radius == self.default_radius {
            return;
        }
        self.shrink_speed = speed;
        self.shrinking = true;
    }

    pub fn stop_shrinking(&mut self) {
        self.shrink_speed = 0.0;
        self.shrinking = false;
    }

    /// Grow the current radius with click progress (0..=1), quadratically
    pub fn scale_deadzone_by_progress(&mut self, progress: f32, max_increase_mm: f32) {
        let scaled = progress * progress;
        self.current_radius = lerp(self.default_radius, self.default_radius + max_increase_mm, scaled);
    }

    /// Remember how far the stabilised point is from the raw point, so the
    /// cursor does not jump when the deadzone is changed
    pub fn set_deadzone_offset(&mut self) {
        if self.default_radius > 0.0 {
            self.offset = self.previous_current - self.last_raw;
        }
    }

    pub fn reduce_deadzone_offset(&mut self) {
        self.offset *= 0.9;
    }

    pub fn reset(&mut self) {
        self.previous_default = None;
        self.shrink_speed = 0.0;
        self.shrinking = false;
        self.current_radius = self.default_radius;
    }

    // Shrink by how far the default deadzone moved away from the point the
    // current deadzone was holding
    fn shrink(&mut self, previous_default: Vec2, constrained_default: Vec2) {
        let default_change = constrained_default - previous_default;
        let constraint = previous_default - self.previous_current;

        if constraint != Vec2::ZERO {
            let away = (default_change.dot(constraint) / constraint.length()).max(0.0);
            self.current_radius -= away * self.shrink_speed;

            if self.current_radius < self.default_radius {
                self.current_radius = self.default_radius;
                self.stop_shrinking();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn test_deadzone_clamp() {
        let out = PositionStabiliser::apply_deadzone_sized(Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0);
        assert_eq!(out, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_within_radius_keeps_previous() {
        let previous = Vec2::new(3.0, 4.0);
        for p in [Vec2::new(3.5, 4.0), Vec2::new(1.0, 3.0), Vec2::new(3.0, 8.9)] {
            assert_eq!(PositionStabiliser::apply_deadzone_sized(previous, p, 5.0), previous);
        }
    }

    #[test]
    fn test_first_call_passes_through() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        assert_eq!(stabiliser.apply_deadzone(Vec2::new(100.0, 50.0)), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn test_stable_within_deadzone() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        let first = stabiliser.apply_deadzone(Vec2::new(100.0, 100.0));
        for p in [Vec2::new(102.0, 101.0), Vec2::new(98.0, 97.0), Vec2::new(100.0, 104.0)] {
            assert_eq!(stabiliser.apply_deadzone(p), first);
        }
    }

    #[test]
    fn test_follows_outside_deadzone() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        stabiliser.apply_deadzone(Vec2::ZERO);
        let out = stabiliser.apply_deadzone(Vec2::new(0.0, 20.0));
        assert!(approx(out, Vec2::new(0.0, 15.0)));
    }

    #[test]
    fn test_zero_radius_passes_through() {
        let mut stabiliser = PositionStabiliser::new(0.0);
        stabiliser.apply_deadzone(Vec2::ZERO);
        assert_eq!(stabiliser.apply_deadzone(Vec2::new(0.5, 0.0)), Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_start_shrinking_ignored_at_default() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        stabiliser.start_shrinking(0.5);
        assert!(!stabiliser.is_shrinking());

        stabiliser.set_current_radius(10.0);
        stabiliser.start_shrinking(0.5);
        assert!(stabiliser.is_shrinking());
    }

    #[test]
    fn test_shrink_stops_at_default() {
        let mut stabiliser = PositionStabiliser::new(2.0);
        stabiliser.apply_deadzone(Vec2::ZERO);
        stabiliser.set_current_radius(20.0);
        stabiliser.apply_deadzone(Vec2::new(10.0, 0.0));
        stabiliser.start_shrinking(1.0);

        for i in 2..40 {
            stabiliser.apply_deadzone(Vec2::new(10.0 * i as f32, 0.0));
        }
        assert_eq!(stabiliser.current_radius(), 2.0);
        assert!(!stabiliser.is_shrinking());
    }

    #[test]
    fn test_scale_by_progress() {
        let mut stabiliser = PositionStabiliser::new(4.0);
        stabiliser.scale_deadzone_by_progress(0.5, 20.0);
        assert!((stabiliser.current_radius() - 9.0).abs() < 1e-5);
        stabiliser.scale_deadzone_by_progress(1.0, 20.0);
        assert!((stabiliser.current_radius() - 24.0).abs() < 1e-5);
    }

    #[test]
    fn test_reset_restores_radius_and_first_call() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        stabiliser.apply_deadzone(Vec2::ZERO);
        stabiliser.set_current_radius(30.0);
        stabiliser.reset();

        assert_eq!(stabiliser.current_radius(), 5.0);
        assert_eq!(stabiliser.apply_deadzone(Vec2::new(50.0, 50.0)), Vec2::new(50.0, 50.0));
    }

    #[test]
    fn test_deadzone_offset_decays() {
        let mut stabiliser = PositionStabiliser::new(5.0);
        stabiliser.apply_deadzone(Vec2::ZERO);
        stabiliser.apply_deadzone(Vec2::new(3.0, 0.0));
        stabiliser.set_deadzone_offset();

        // Offset of -3 is carried into the next raw sample
        assert_eq!(stabiliser.apply_deadzone(Vec2::new(3.0, 0.0)), Vec2::ZERO);
        stabiliser.reduce_deadzone_offset();
        assert!(stabiliser.offset.x > -3.0);
    }
}
