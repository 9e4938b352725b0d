//! Touch plane
//!
//! An invisible plane at a fixed distance in front of the screen. Crossing
//! it presses, pulling back out releases. The release always lands where
//! the press started unless the hand dragged.

use super::module::{InteractionModule, TickContext};
use super::types::{InputAction, InputType};
use crate::config::{InteractionConfig, InteractionType, TrackedPosition};
use crate::geometry::{inverse_lerp, Vec2};
use crate::positioning::Positions;
use crate::tracking::HandSnapshot;

/// Progress is zero this far behind the plane
const ZERO_PROGRESS_DISTANCE_MM: f32 = 100.0;
/// Movement while pressed before it becomes a drag
const DRAG_START_DISTANCE_MM: f32 = 10.0;

pub struct TouchPlaneInteraction {
    plane_distance_mm: f32,
    tracked_position: TrackedPosition,

    pressing: bool,
    press_complete: bool,
    dragging: bool,
    /// Set once the hand has been seen in front of the plane
    hand_ready: bool,
    down_position: Vec2,
}

impl TouchPlaneInteraction {
    pub fn new() -> Self {
        let defaults = InteractionConfig::default();
        Self {
            plane_distance_mm: defaults.touch_plane_activation_distance_mm(),
            tracked_position: defaults.touch_plane.touch_plane_tracked_position,
            pressing: false,
            press_complete: false,
            dragging: false,
            hand_ready: false,
            down_position: Vec2::ZERO,
        }
    }

    fn reset_press(&mut self) {
        self.pressing = false;
        self.press_complete = false;
        self.dragging = false;
    }

    fn handle_hand(&mut self, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        let distance = ctx.distance_mm;
        let plane = self.plane_distance_mm;
        let progress = (1.0 - inverse_lerp(plane, plane + ZERO_PROGRESS_DISTANCE_MM, distance)).clamp(0.0, 1.0);
        let at_down = Positions::new(self.down_position, ctx.positions.distance_from_screen);

        if distance < plane {
            // A hand that first appears behind the plane does not press
            if !self.hand_ready {
                return None;
            }

            if !self.pressing {
                self.pressing = true;
                self.down_position = ctx.positions.cursor_position;
                Some(ctx.action(InteractionType::TouchPlane, InputType::Down, progress))
            } else if !ctx.ignore_dragging {
                if !self.dragging
                    && ctx.distance_mm_between(self.down_position, ctx.positions.cursor_position)
                        > DRAG_START_DISTANCE_MM
                {
                    self.dragging = true;
                }

                let input_type = if self.dragging {
                    InputType::Move
                } else {
                    InputType::None
                };
                Some(ctx.action(InteractionType::TouchPlane, input_type, progress))
            } else if !self.press_complete {
                self.press_complete = true;
                Some(ctx.action_at(InteractionType::TouchPlane, InputType::Up, at_down, progress))
            } else {
                None
            }
        } else {
            let action = if self.pressing && !self.press_complete {
                ctx.action_at(InteractionType::TouchPlane, InputType::Up, at_down, progress)
            } else {
                ctx.action(InteractionType::TouchPlane, InputType::Move, progress)
            };

            self.reset_press();
            self.hand_ready = true;
            Some(action)
        }
    }
}

impl Default for TouchPlaneInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionModule for TouchPlaneInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::TouchPlane
    }

    fn tracked_position(&self) -> TrackedPosition {
        self.tracked_position
    }

    fn on_config_updated(&mut self, config: &InteractionConfig, _ignore_dragging: bool) {
        self.plane_distance_mm = config.touch_plane_activation_distance_mm();
        self.tracked_position = config.touch_plane.touch_plane_tracked_position;
    }

    fn update(&mut self, hand: Option<&HandSnapshot>, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        if hand.is_none() {
            self.reset_press();
            self.hand_ready = false;
            return ctx.cancel_if_hand_lost(InteractionType::TouchPlane, 0.0);
        }

        self.handle_hand(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::module::test_support::Bench;

    fn setup(ignore_dragging: bool) -> (Bench, TouchPlaneInteraction) {
        let mut module = TouchPlaneInteraction::new();
        let mut config = InteractionConfig::default();
        config.touch_plane.touch_plane_activation_distance_cm = 5.0;
        module.on_config_updated(&config, ignore_dragging);
        (Bench::new(ignore_dragging), module)
    }

    fn input(action: Option<InputAction>) -> Option<InputType> {
        action.map(|a| a.input_type)
    }

    #[test]
    fn test_progress_ramps_toward_plane() {
        let (mut bench, mut module) = setup(true);
        let cursor = Vec2::new(300.0, 300.0);
        let far = bench.tick(&mut module, 0, cursor, 200.0).unwrap();
        assert_eq!(far.progress_to_click, 0.0);

        let halfway = bench.tick(&mut module, 16, cursor, 100.0).unwrap();
        assert!((halfway.progress_to_click - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_press_and_release_without_dragging() {
        let (mut bench, mut module) = setup(true);
        let start = Vec2::new(300.0, 300.0);
        assert_eq!(input(bench.tick(&mut module, 0, start, 80.0)), Some(InputType::Move));

        let down = bench.tick(&mut module, 16, start, 40.0).unwrap();
        assert_eq!(down.input_type, InputType::Down);
        assert_eq!(down.progress_to_click, 1.0);

        // UP lands at the press position even though the cursor moved
        let up = bench.tick(&mut module, 32, Vec2::new(350.0, 300.0), 30.0).unwrap();
        assert_eq!(up.input_type, InputType::Up);
        assert_eq!(up.cursor_position, start);

        assert!(bench.tick(&mut module, 48, start, 20.0).is_none());
        assert_eq!(input(bench.tick(&mut module, 64, start, 80.0)), Some(InputType::Move));
    }

    #[test]
    fn test_drag_after_threshold() {
        let (mut bench, mut module) = setup(false);
        let start = Vec2::new(300.0, 300.0);
        bench.tick(&mut module, 0, start, 80.0);
        assert_eq!(input(bench.tick(&mut module, 16, start, 40.0)), Some(InputType::Down));

        // 5 mm: still a press
        let nudge = Vec2::new(start.x + bench.screen.mm_to_px(5.0), start.y);
        assert_eq!(input(bench.tick(&mut module, 32, nudge, 40.0)), Some(InputType::None));

        let far = Vec2::new(start.x + bench.screen.mm_to_px(20.0), start.y);
        assert_eq!(input(bench.tick(&mut module, 48, far, 40.0)), Some(InputType::Move));

        let up = bench.tick(&mut module, 64, far, 80.0).unwrap();
        assert_eq!(up.input_type, InputType::Up);
        assert_eq!(up.cursor_position, start);
    }

    #[test]
    fn test_hand_appearing_behind_plane_does_not_press() {
        let (mut bench, mut module) = setup(true);
        let cursor = Vec2::new(300.0, 300.0);
        assert!(bench.tick(&mut module, 0, cursor, 20.0).is_none());
        assert!(bench.tick(&mut module, 16, cursor, 20.0).is_none());
    }

    #[test]
    fn test_lost_hand_cancels_and_needs_fresh_approach() {
        let (mut bench, mut module) = setup(true);
        let cursor = Vec2::new(300.0, 300.0);
        bench.tick(&mut module, 0, cursor, 80.0);
        bench.tick(&mut module, 16, cursor, 40.0);

        assert_eq!(input(bench.tick_without_hand(&mut module, 32)), Some(InputType::Cancel));
        assert!(bench.tick(&mut module, 48, cursor, 40.0).is_none());
    }

    #[test]
    fn test_tracked_position_follows_config() {
        let mut module = TouchPlaneInteraction::new();
        let mut config = InteractionConfig::default();
        config.touch_plane.touch_plane_tracked_position = TrackedPosition::Nearest;
        module.on_config_updated(&config, false);
        assert_eq!(module.tracked_position(), TrackedPosition::Nearest);
    }
}
