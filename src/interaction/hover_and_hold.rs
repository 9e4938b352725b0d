//! Hover and hold
//!
//! Holding the cursor still for the start time begins a countdown; staying
//! still until it completes fires a click. Moving the cursor at any point
//! abandons the countdown.

use super::module::{InteractionModule, TickContext};
use super::types::{InputAction, InputType};
use crate::config::{InteractionConfig, InteractionType};
use crate::geometry::{lerp, Vec2};
use crate::positioning::PositionStabiliser;
use crate::time::{Stopwatch, Timestamp};
use crate::tracking::HandSnapshot;

/// Extra radius of the hover zone over the default deadzone
const HOVER_DEADZONE_ENLARGEMENT_MM: f32 = 5.0;
/// Radius the deadzone grows to as the countdown completes
const TIMER_DEADZONE_ENLARGEMENT_MM: f32 = 5.0;
const DEADZONE_SHRINK_SPEED: f32 = 0.3;
/// How long DOWN is held before UP
const CLICK_HOLD_MS: u64 = 200;

/// Countdown reporting progress in `0..=1`.
///
/// Stopping holds the progress reached; resetting clears it.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTimer {
    limit_ms: f32,
    started: Option<Timestamp>,
    held: f32,
}

impl ProgressTimer {
    pub fn new(limit_ms: f32) -> Self {
        Self {
            limit_ms,
            started: None,
            held: 0.0,
        }
    }

    pub fn set_limit_ms(&mut self, limit_ms: f32) {
        self.limit_ms = limit_ms;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn progress(&self, now: Timestamp) -> f32 {
        match self.started {
            Some(_) if self.limit_ms <= 0.0 => 1.0,
            Some(started) => {
                let elapsed_ms = now.duration_since(started).as_secs_f32() * 1000.0;
                (elapsed_ms / self.limit_ms).min(1.0)
            }
            None => self.held,
        }
    }

    pub fn start(&mut self, now: Timestamp) {
        self.started = Some(now);
        self.held = 0.0;
    }

    pub fn stop(&mut self, now: Timestamp) {
        self.held = self.progress(now);
        self.started = None;
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.held = 0.0;
    }
}

pub struct HoverAndHoldInteraction {
    hover_trigger_ms: u64,
    progress_timer: ProgressTimer,
    hover_trigger_timer: Stopwatch,
    clicking_timer: Stopwatch,

    /// Hover-zone centre in screen millimetres
    previous_hover_mm: Vec2,
    previous_screen_pos: Vec2,

    hover_triggered: bool,
    triggered_radius: f32,
    click_held: bool,
    click_already_sent: bool,
}

impl HoverAndHoldInteraction {
    pub fn new() -> Self {
        let defaults = InteractionConfig::default().hover_and_hold;
        Self {
            hover_trigger_ms: (defaults.hover_start_time_s * 1000.0) as u64,
            progress_timer: ProgressTimer::new(defaults.hover_complete_time_s * 1000.0),
            hover_trigger_timer: Stopwatch::new(),
            clicking_timer: Stopwatch::new(),
            previous_hover_mm: Vec2::ZERO,
            previous_screen_pos: Vec2::ZERO,
            hover_triggered: false,
            triggered_radius: 0.0,
            click_held: false,
            click_already_sent: false,
        }
    }

    fn reset_hover(&mut self) {
        self.progress_timer.reset();
        self.hover_triggered = false;
        self.hover_trigger_timer.stop();
        self.click_held = false;
        self.click_already_sent = false;
        self.clicking_timer.stop();
    }

    fn handle_hand(&mut self, ctx: &mut TickContext<'_>) -> InputAction {
        let now = ctx.timestamp;

        // The hover zone is a wider deadzone of its own, so small drift
        // does not restart the countdown
        let cursor_mm = ctx.screen.px_to_mm_vec(ctx.positions.cursor_position);
        if !ctx.had_hand_last_frame {
            self.previous_hover_mm = cursor_mm;
        }
        let radius = ctx.stabiliser.default_radius() + HOVER_DEADZONE_ENLARGEMENT_MM;
        self.previous_hover_mm = PositionStabiliser::apply_deadzone_sized(self.previous_hover_mm, cursor_mm, radius);
        ctx.positions.cursor_position = ctx.screen.mm_to_px_vec(self.previous_hover_mm);

        let cursor = ctx.positions.cursor_position;
        let still = cursor == self.previous_screen_pos;
        let mut action = ctx.action(InteractionType::Hover, InputType::Move, self.progress_timer.progress(now));

        if !self.click_held && !self.hover_triggered && still {
            if !self.hover_trigger_timer.is_running() {
                self.hover_trigger_timer.restart(now);
            } else if self.hover_trigger_timer.elapsed_millis(now) > self.hover_trigger_ms {
                self.hover_triggered = true;
                self.hover_trigger_timer.stop();
                self.triggered_radius = ctx.stabiliser.current_radius();
            }
        }

        if self.hover_triggered {
            let max_radius = ctx.stabiliser.default_radius() + TIMER_DEADZONE_ENLARGEMENT_MM;

            if still {
                if !self.click_held {
                    let progress = self.progress_timer.progress(now);
                    if !self.progress_timer.is_running() && progress == 0.0 {
                        self.progress_timer.start(now);
                    } else if self.progress_timer.is_running() && progress >= 1.0 {
                        ctx.stabiliser.set_current_radius(max_radius);
                        self.progress_timer.stop(now);
                        self.click_held = true;
                        self.clicking_timer.restart(now);
                        action = ctx.action(InteractionType::Hover, InputType::Down, 1.0);
                    } else {
                        ctx.stabiliser
                            .set_current_radius(lerp(self.triggered_radius, max_radius, progress));
                    }
                } else if !self.click_already_sent && self.clicking_timer.elapsed_millis(now) > CLICK_HOLD_MS {
                    action = ctx.action(InteractionType::Hover, InputType::Up, self.progress_timer.progress(now));
                    self.click_already_sent = true;
                }
            } else {
                if self.click_held && !self.click_already_sent {
                    action = ctx.action(InteractionType::Hover, InputType::Up, self.progress_timer.progress(now));
                }
                self.reset_hover();
                ctx.stabiliser.start_shrinking(DEADZONE_SHRINK_SPEED);
            }
        }

        self.previous_screen_pos = cursor;
        action
    }
}

impl Default for HoverAndHoldInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionModule for HoverAndHoldInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Hover
    }

    fn on_config_updated(&mut self, config: &InteractionConfig, _ignore_dragging: bool) {
        self.hover_trigger_ms = (config.hover_and_hold.hover_start_time_s * 1000.0).max(0.0) as u64;
        self.progress_timer
            .set_limit_ms(config.hover_and_hold.hover_complete_time_s * 1000.0);
    }

    fn update(&mut self, hand: Option<&HandSnapshot>, ctx: &mut TickContext<'_>) -> Option<InputAction> {
        if hand.is_none() {
            self.reset_hover();
            return ctx.cancel_if_hand_lost(InteractionType::Hover, 0.0);
        }

        Some(self.handle_hand(ctx))
    }
}
