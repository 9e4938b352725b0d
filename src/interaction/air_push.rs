//! Air push
//!
//! A virtual spring between the finger and the screen. Moving toward the
//! screen builds up "applied force", faster movement with a stiffer spring;
//! sideways movement bleeds force away. A click fires when the force
//! reaches 1 and releases when it falls back under the unclick threshold.

use super::module::{InteractionModule, TickContext};
use super::types::{InputAction, InputType};
use crate::config::{InteractionConfig, InteractionType};
use crate::geometry::Vec2;
use crate::positioning::PositionStabiliser;
use crate::time::{Stopwatch, Timestamp};
use crate::tracking::HandSnapshot;

/// Clicks are ignored for this long after a hand appears
const COOLDOWN_ON_ENTRY_MS: u64 = 300;
/// A held click without dragging releases after this long
const CLICK_HOLD_MS: u64 = 1500;

// Speeds in mm/s and distances in mm
const SPEED_MIN: f32 = 150.0;
const SPEED_MAX: f32 = 500.0;
const DIST_AT_SPEED_MIN_MM: f32 = 42.0;
const DIST_AT_SPEED_MAX_MM: f32 = 8.0;
const HORIZONTAL_DECAY_DIST_MM: f32 = 50.0;

// Movement angle from the screen normal, degrees. Below theta one is
// "toward", above theta two is "away", in between is "sideways".
const THETA_ONE: f32 = 65.0;
const THETA_ONE_NO_DRAG: f32 = 15.0;
const THETA_TWO: f32 = 135.0;

const UNCLICK_THRESHOLD: f32 = 0.97;
const UNCLICK_THRESHOLD_DRAG: f32 = 0.97;
const FORCE_DECAY_TIME_S: f32 = 0.1;

/// Beyond the screen plane a fixed stiffness is used
const DIST_PAST_TOUCH_PLANE_MM: f32 = 20.0;

const DRAG_START_DISTANCE_MM: f32 = 30.0;
const DRAG_DEADZONE_SHRINK_RATE: f32 = 0.9;

const DEADZONE_MAX_SIZE_INCREASE_MM: f32 = 20.0;
const DEADZONE_SHRINK_RATE: f32 = 0.8;

pub struct AirPushInteraction {
    theta_one: f32,

    applied_force: f32,
    pressing: bool,
    dragging: bool,
    decaying_force: bool,
    cursor_press_position: Vec2,

    previous_time: Option<Timestamp>,
    previous_distance_mm: f32,
    previous_screen_pos: Vec2,

    click_hold: Stopwatch,
    hand_appeared: Stopwatch,
}

impl AirPushInteraction {
    pub fn new() -> Self {
        Self {
            theta_one: THETA_ONE,
            applied_force: 0.0,
            pressing: false,
            dragging: false,
            decaying_force: false,
            cursor_press_position: Vec2::ZERO,
            previous_time: None,
            previous_distance_mm: f32::INFINITY,
            previous_screen_pos: Vec2::ZERO,
            click_hold: Stopwatch::new(),
            hand_appeared: Stopwatch::new(),
        }
    }

    pub fn applied_force(&self) -> f32 {
        self.applied_force
    }

    fn action(&self, ctx: &TickContext<'_>, input_type: InputType) -> InputAction {
        ctx.action(InteractionType::Push, input_type, self.applied_force)
    }

    fn handle_hand(&mut self, ctx: &mut TickContext<'_>) -> InputAction {
        let now = ctx.timestamp;
        let cursor = ctx.positions.cursor_position;

        if self.hand_appeared.has_run_for(now, COOLDOWN_ON_ENTRY_MS) {
            self.hand_appeared.stop();
        }

        let action = match self.previous_time {
            Some(previous_time) if !self.hand_appeared.is_running() => {
                let dt = now.secs_since(previous_time);
                // Positive toward the screen
                let dz = -(ctx.distance_mm - self.previous_distance_mm);
                let velocity = dz / dt;
                let d_perp = ctx.screen.px_to_mm_vec(cursor - self.previous_screen_pos);

                let force_change = self.force_change(velocity, dt, d_perp, ctx.distance_mm);
                self.applied_force = (self.applied_force + force_change).clamp(0.0, 1.0);

                if !self.pressing {
                    adjust_deadzone(ctx.stabiliser, force_change);
                }

                let action = if self.pressing {
                    self.handle_pressing(ctx)
                } else if !self.decaying_force && self.applied_force >= 1.0 {
                    // Not while decaying, or a release could double-click
                    self.pressing = true;
                    self.cursor_press_position = cursor;
                    if !ctx.ignore_dragging {
                        self.click_hold.restart(now);
                    }
                    ctx.stabiliser.set_deadzone_offset();
                    ctx.stabiliser.set_current_radius(DRAG_START_DISTANCE_MM);
                    self.action(ctx, InputType::Down)
                } else {
                    if cursor != self.previous_screen_pos || ctx.distance_mm != self.previous_distance_mm {
                        ctx.stabiliser.reduce_deadzone_offset();
                    }
                    self.action(ctx, InputType::Move)
                };

                if self.decaying_force && self.applied_force <= UNCLICK_THRESHOLD - 0.1 {
                    self.decaying_force = false;
                }
                action
            }
            // Just found the hand: show it, but no clicks yet
            _ => self.action(ctx, InputType::Move),
        };

        self.previous_time = Some(now);
        self.previous_distance_mm = ctx.distance_mm;
        self.previous_screen_pos = cursor;
        action
    }

    fn handle_pressing(&mut self, ctx: &mut TickContext<'_>) -> InputAction {
        let cursor = ctx.positions.cursor_position;
        let threshold = if self.dragging {
            UNCLICK_THRESHOLD_DRAG
        } else {
            UNCLICK_THRESHOLD
        };

        if self.applied_force < threshold
            || ctx.ignore_dragging
            || self.click_hold.has_run_for(ctx.timestamp, CLICK_HOLD_MS)
        {
            self.pressing = false;
            self.dragging = false;
            self.cursor_press_position = Vec2::ZERO;
            self.click_hold.stop();
            self.decaying_force = true;
            self.action(ctx, InputType::Up)
        } else if self.dragging {
            ctx.stabiliser.reduce_deadzone_offset();
            self.action(ctx, InputType::Move)
        } else if self.cursor_press_position != cursor {
            self.dragging = true;
            ctx.stabiliser.start_shrinking(DRAG_DEADZONE_SHRINK_RATE);
            self.click_hold.stop();
            self.action(ctx, InputType::Move)
        } else {
            self.action(ctx, InputType::None)
        }
    }

    /// Change in applied force this tick.
    ///
    /// `velocity` is mm/s toward the screen, `dt` seconds, `d_perp` the
    /// sideways movement in mm and `distance_mm` the distance in front of
    /// the screen plane.
    fn force_change(&self, velocity: f32, dt: f32, d_perp: Vec2, distance_mm: f32) -> f32 {
        if dt < f32::EPSILON {
            return 0.0;
        }

        if distance_mm < 0.0 {
            // Past the screen plane: fixed stiffness, and never reduce force
            // so the user cannot edge ever closer
            let stiffness = 1.0 / DIST_PAST_TOUCH_PLANE_MM;
            return stiffness * velocity.max(0.0) * dt;
        }

        let angle = d_perp.length().atan2(velocity * dt).to_degrees();

        let mut change = if angle < self.theta_one || angle > THETA_TWO {
            let clamped = velocity.abs().clamp(SPEED_MIN, SPEED_MAX);
            let ratio = (clamped - SPEED_MIN) / (SPEED_MAX - SPEED_MIN);

            let stiffness_min = 1.0 / DIST_AT_SPEED_MIN_MM;
            let stiffness_max = 1.0 / DIST_AT_SPEED_MAX_MM;
            let k = stiffness_min + ratio * ratio * (stiffness_max - stiffness_min);

            k * velocity * dt
        } else if self.pressing {
            0.0
        } else {
            let v_perp = d_perp.length() / dt;
            -(1.0 / HORIZONTAL_DECAY_DIST_MM) * v_perp * dt
        };

        if self.decaying_force {
            change = if change <= 0.0 {
                change - (1.0 - (UNCLICK_THRESHOLD - 0.1)) * (dt / FORCE_DECAY_TIME_S)
            } else {
                0.0
            };
        }

        change
    }
}

impl Default for AirPushInteraction {
    fn default() -> Self {
        Self::new()
    }
}

// Grow the deadzone while force builds, shrink it once force drops
fn adjust_deadzone(stabiliser: &mut PositionStabiliser, force_change: f32) {
    if force_change < -f32::EPSILON {
        stabiliser.start_shrinking(DEADZONE_SHRINK_RATE);
    } else {
        stabiliser.stop_shrinking();

        let min = stabiliser.default_radius();
        let max = min + DEADZONE_MAX_SIZE_INCREASE_MM;
        let grown = stabiliser.current_radius() + DEADZONE_MAX_SIZE_INCREASE_MM * force_change;
        stabiliser.set_current_radius(grown.clamp(min, max));
    }
}

impl InteractionModule for AirPushInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Push
    }

    fn on_config_updated(&mut self, _config: &InteractionConfig, ignore_dragging: bool) {
        self.theta_one = if ignore_dragging { THETA_ONE_NO_DRAG } else { THETA_ONE };
    }

    fn update(&mut self, hand: Option<&HandSnapshot>, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        if hand.is_none() {
            self.applied_force = 0.0;
            self.pressing = false;
            self.dragging = false;
            // Held restarted until a hand shows up
            self.hand_appeared.restart(ctx.timestamp);
            return ctx.cancel_if_hand_lost(InteractionType::Push, self.applied_force);
        }

        Some(self.handle_hand(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::module::test_support::Bench;

    fn pushing_bench(ignore_dragging: bool) -> (Bench, AirPushInteraction) {
        let mut module = AirPushInteraction::new();
        module.on_config_updated(&InteractionConfig::default(), ignore_dragging);
        (Bench::new(ignore_dragging), module)
    }

    #[test]
    fn test_first_frame_is_move() {
        let (mut bench, mut module) = pushing_bench(true);
        let action = bench.tick(&mut module, 0, Vec2::new(500.0, 500.0), 150.0).unwrap();
        assert_eq!(action.input_type, InputType::Move);
        assert_eq!(action.interaction_type, InteractionType::Push);
    }

    #[test]
    fn test_fast_push_clicks_then_releases() {
        let (mut bench, mut module) = pushing_bench(true);
        let cursor = Vec2::new(500.0, 500.0);
        bench.tick(&mut module, 0, cursor, 150.0);

        // 10 mm in 16 ms toward the screen saturates the force
        let down = bench.tick(&mut module, 16, cursor, 140.0).unwrap();
        assert_eq!(down.input_type, InputType::Down);
        assert_eq!(module.applied_force(), 1.0);

        // Without dragging a click releases on the next tick
        let up = bench.tick(&mut module, 32, cursor, 135.0).unwrap();
        assert_eq!(up.input_type, InputType::Up);
    }

    #[test]
    fn test_no_double_click_while_force_decays() {
        let (mut bench, mut module) = pushing_bench(true);
        let cursor = Vec2::new(500.0, 500.0);
        bench.tick(&mut module, 0, cursor, 150.0);
        bench.tick(&mut module, 16, cursor, 140.0);
        bench.tick(&mut module, 32, cursor, 130.0);

        let again = bench.tick(&mut module, 48, cursor, 120.0).unwrap();
        assert_ne!(again.input_type, InputType::Down);
    }

    #[test]
    fn test_slow_approach_does_not_click() {
        let (mut bench, mut module) = pushing_bench(true);
        let cursor = Vec2::new(500.0, 500.0);
        let mut distance = 200.0;
        for i in 0..20 {
            let action = bench.tick(&mut module, i * 16, cursor, distance).unwrap();
            assert_eq!(action.input_type, InputType::Move);
            distance -= 0.5;
        }
        assert!(module.applied_force() < 1.0);
    }

    #[test]
    fn test_cooldown_after_hand_appears() {
        let (mut bench, mut module) = pushing_bench(true);
        assert!(bench.tick_without_hand(&mut module, 0).is_none());

        let cursor = Vec2::new(500.0, 500.0);
        bench.tick(&mut module, 16, cursor, 200.0);
        for (i, t) in (32..300).step_by(16).enumerate() {
            let action = bench.tick(&mut module, t, cursor, 190.0 - 10.0 * i as f32).unwrap();
            assert_eq!(action.input_type, InputType::Move);
        }
    }

    #[test]
    fn test_lost_hand_cancels() {
        let (mut bench, mut module) = pushing_bench(true);
        bench.tick(&mut module, 0, Vec2::new(500.0, 500.0), 150.0);
        let cancel = bench.tick_without_hand(&mut module, 16).unwrap();
        assert_eq!(cancel.input_type, InputType::Cancel);
        assert!(bench.tick_without_hand(&mut module, 32).is_none());
    }

    #[test]
    fn test_held_click_starts_drag_on_move() {
        let (mut bench, mut module) = pushing_bench(false);
        let cursor = Vec2::new(500.0, 500.0);
        bench.tick(&mut module, 0, cursor, 150.0);
        assert_eq!(bench.tick(&mut module, 16, cursor, 140.0).unwrap().input_type, InputType::Down);

        // Still pushing, cursor still: no input, just feedback
        let held = bench.tick(&mut module, 32, cursor, 130.0).unwrap();
        assert_eq!(held.input_type, InputType::None);

        let drag = bench.tick(&mut module, 48, Vec2::new(520.0, 500.0), 120.0).unwrap();
        assert_eq!(drag.input_type, InputType::Move);
    }

    #[test]
    fn test_click_hold_times_out() {
        let (mut bench, mut module) = pushing_bench(false);
        let cursor = Vec2::new(500.0, 500.0);
        bench.tick(&mut module, 0, cursor, 150.0);
        bench.tick(&mut module, 16, cursor, 140.0);

        let mut last = None;
        let mut distance = 140.0;
        for t in (32..1600).step_by(16) {
            distance -= 1.0;
            last = bench.tick(&mut module, t, cursor, distance);
            if last.map(|a| a.input_type) == Some(InputType::Up) {
                break;
            }
        }
        assert_eq!(last.unwrap().input_type, InputType::Up);
    }
}
