//! Interaction module interface
//!
//! The engine does the work common to every mode (tracked point, screen
//! projection, deadzone, interaction zone) and then hands the result to the
//! active module through a `TickContext`. A module decides whether this tick
//! produces an input action.

use super::types::{InputAction, InputType};
use crate::config::{InteractionConfig, InteractionType, TrackedPosition};
use crate::geometry::Vec2;
use crate::positioning::{PositionStabiliser, Positions, VirtualScreen};
use crate::time::Timestamp;
use crate::tracking::{Chirality, HandSnapshot, HandType};

/// Per-tick state shared with the active module
pub struct TickContext<'a> {
    pub timestamp: Timestamp,
    pub hand_type: HandType,
    pub chirality: Chirality,
    /// Stabilised positions; a module may replace them before emitting
    pub positions: Positions,
    pub distance_mm: f32,
    pub had_hand_last_frame: bool,
    pub ignore_dragging: bool,
    pub screen: &'a VirtualScreen,
    pub stabiliser: &'a mut PositionStabiliser,
}

impl TickContext<'_> {
    /// Action for the module's interaction at explicit positions
    pub fn action_at(
        &self,
        interaction_type: InteractionType,
        input_type: InputType,
        positions: Positions,
        progress: f32,
    ) -> InputAction {
        InputAction::new(
            self.timestamp,
            interaction_type,
            self.hand_type,
            self.chirality,
            input_type,
            positions,
            progress,
        )
    }

    /// Action at the current positions
    pub fn action(&self, interaction_type: InteractionType, input_type: InputType, progress: f32) -> InputAction {
        self.action_at(interaction_type, input_type, self.positions, progress)
    }

    /// CANCEL if a hand was present last tick, otherwise nothing
    pub fn cancel_if_hand_lost(&self, interaction_type: InteractionType, progress: f32) -> Option<InputAction> {
        self.had_hand_last_frame
            .then(|| self.action(interaction_type, InputType::Cancel, progress))
    }

    /// Distance between two cursor positions in screen millimetres
    pub fn distance_mm_between(&self, a: Vec2, b: Vec2) -> f32 {
        self.screen.px_to_mm_vec(a).distance(self.screen.px_to_mm_vec(b))
    }
}

/// One interaction mode
pub trait InteractionModule: Send {
    fn interaction_type(&self) -> InteractionType;

    /// Point on the hand that drives the cursor
    fn tracked_position(&self) -> TrackedPosition {
        TrackedPosition::IndexStable
    }

    /// Called once on creation and whenever interaction config changes
    fn on_config_updated(&mut self, _config: &InteractionConfig, _ignore_dragging: bool) {}

    /// `hand` is `None` when there is no primary hand or it is outside the
    /// interaction zone
    fn update(&mut self, hand: Option<&HandSnapshot>, ctx: &mut TickContext<'_>) -> Option<InputAction>;
}
