//! Grab
//!
//! Closing the hand presses, opening it releases. With dragging enabled the
//! press holds until the hand opens; without it, a grab is a click.

use super::module::{InteractionModule, TickContext};
use super::types::{InputAction, InputType};
use crate::config::InteractionType;
use crate::geometry::Vec2;
use crate::positioning::Positions;
use crate::time::Timestamp;
use crate::tracking::HandSnapshot;

const DEADZONE_ENLARGEMENT_MM: f32 = 20.0;
const DEADZONE_SHRINK_SPEED: f32 = 0.3;
/// Hands moving faster than this cannot start a grab, mm/s
const MAX_HAND_VELOCITY_MM_S: f32 = 150.0 * 1000.0;
const DRAG_START_DISTANCE_MM: f32 = 10.0;
/// Frames DOWN is held before the matching UP when not dragging
const REQUIRED_HOLD_FRAMES: u32 = 1;

/// Grab strength above which a hand starts grabbing
const GRAB_START_STRENGTH: f32 = 0.8;
/// Grab strength below which a grabbing hand lets go
const GRAB_RELEASE_STRENGTH: f32 = 0.6;

/// Grab detection with hysteresis over the stronger of grab and pinch
#[derive(Debug, Clone, Copy, Default)]
pub struct GrabDetector {
    grabbing: bool,
    strength: f32,
}

impl GrabDetector {
    pub fn update(&mut self, hand: &HandSnapshot) -> bool {
        self.strength = hand.grab_strength.max(hand.pinch_strength).clamp(0.0, 1.0);
        self.grabbing = if self.grabbing {
            self.strength >= GRAB_RELEASE_STRENGTH
        } else {
            self.strength > GRAB_START_STRENGTH
        };
        self.grabbing
    }

    pub fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    /// Strength from the last update
    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Default)]
pub struct GrabInteraction {
    detector: GrabDetector,

    pressing: bool,
    dragging: bool,
    require_hold: bool,
    held_frames: u32,
    require_click: bool,
    down_position: Vec2,

    previous: Option<(Timestamp, Positions)>,
}

impl GrabInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    // mm/s of the cursor point in world space, or the palm when there is no
    // previous sample
    fn hand_velocity(&self, hand: &HandSnapshot, ctx: &TickContext<'_>) -> f32 {
        match self.previous {
            Some((time, previous)) if ctx.timestamp.is_after(time) => {
                let dt = ctx.timestamp.secs_since(time);
                let current = ctx
                    .screen
                    .screen_to_world_mm(ctx.positions.cursor_position, ctx.distance_mm);
                let before = ctx
                    .screen
                    .screen_to_world_mm(previous.cursor_position, previous.distance_from_screen * 1000.0);
                (current - before).length() / dt
            }
            _ => hand.palm_velocity.length() * 1000.0,
        }
    }

    fn handle_hand(&mut self, hand: &HandSnapshot, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        let grabbing = self.detector.update(hand);
        let strength = self.detector.strength();
        let velocity = self.hand_velocity(hand, ctx);

        if grabbing && (self.pressing || velocity < MAX_HAND_VELOCITY_MM_S) {
            Some(self.press(ctx, strength))
        } else if self.pressing {
            self.release(ctx, strength)
        } else {
            Some(ctx.action(InteractionType::Grab, InputType::Move, strength))
        }
    }

    fn press(&mut self, ctx: &mut TickContext<'_>, strength: f32) -> InputAction {
        let cursor = ctx.positions.cursor_position;
        let at_down = Positions::new(self.down_position, ctx.positions.distance_from_screen);

        if !self.pressing {
            self.pressing = true;
            if ctx.ignore_dragging {
                self.require_hold = true;
                self.held_frames = 0;
                self.require_click = false;
            }

            ctx.stabiliser.stop_shrinking();
            ctx.stabiliser
                .set_current_radius(DEADZONE_ENLARGEMENT_MM + ctx.stabiliser.default_radius());
            self.down_position = cursor;
            return ctx.action(InteractionType::Grab, InputType::Down, strength);
        }

        if self.dragging {
            return ctx.action(InteractionType::Grab, InputType::Move, strength);
        }

        if ctx.ignore_dragging {
            if self.require_hold {
                if self.held_frames >= REQUIRED_HOLD_FRAMES {
                    self.require_hold = false;
                    self.require_click = true;
                }
                self.held_frames += 1;
                ctx.action_at(InteractionType::Grab, InputType::Move, at_down, strength)
            } else if self.require_click {
                ctx.stabiliser.start_shrinking(DEADZONE_SHRINK_SPEED);
                self.require_click = false;
                ctx.action_at(InteractionType::Grab, InputType::Up, at_down, strength)
            } else {
                ctx.action(InteractionType::Grab, InputType::Move, strength)
            }
        } else {
            if ctx.distance_mm_between(self.down_position, cursor) > DRAG_START_DISTANCE_MM {
                self.dragging = true;
                ctx.stabiliser.start_shrinking(DEADZONE_SHRINK_SPEED);
            }
            ctx.action_at(InteractionType::Grab, InputType::Move, at_down, strength)
        }
    }

    fn release(&mut self, ctx: &mut TickContext<'_>, strength: f32) -> Option<InputAction> {
        let mut action = None;

        if !ctx.ignore_dragging {
            if !self.require_hold && !self.require_click {
                action = Some(ctx.action(InteractionType::Grab, InputType::Up, strength));
            }
            ctx.stabiliser.start_shrinking(DEADZONE_SHRINK_SPEED);
        } else if self.require_hold || self.require_click {
            // Opened before the click completed
            let at_down = Positions::new(self.down_position, ctx.positions.distance_from_screen);
            action = Some(ctx.action_at(InteractionType::Grab, InputType::Up, at_down, strength));
            self.require_hold = false;
            self.require_click = false;
            ctx.stabiliser.start_shrinking(DEADZONE_SHRINK_SPEED);
        }

        self.pressing = false;
        self.dragging = false;
        action
    }
}

impl InteractionModule for GrabInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Grab
    }

    fn update(&mut self, hand: Option<&HandSnapshot>, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        let Some(hand) = hand else {
            self.detector.reset();
            self.previous = None;
            self.pressing = false;
            self.dragging = false;
            self.require_hold = false;
            self.require_click = false;
            return ctx.cancel_if_hand_lost(InteractionType::Grab, 0.0);
        };

        let action = self.handle_hand(hand, ctx);
        self.previous = Some((ctx.timestamp, ctx.positions));
        action
    }
}
