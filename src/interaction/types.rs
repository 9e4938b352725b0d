//! Input actions and their wire form

use crate::config::InteractionType;
use crate::geometry::Vec2;
use crate::positioning::Positions;
use crate::time::Timestamp;
use crate::tracking::{Chirality, HandType};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// What an input action asks the client to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    /// Feedback only: update cursor visuals, no input
    None,
    Cancel,
    Down,
    Move,
    Up,
}

/// Edge-triggered interaction zone transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionZoneState {
    HandEntered,
    HandExited,
}

/// One input event produced by the active interaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputAction {
    pub timestamp: Timestamp,
    pub interaction_type: InteractionType,
    pub hand_type: HandType,
    pub chirality: Chirality,
    pub input_type: InputType,
    pub cursor_position: Vec2,
    pub distance_from_screen: f32,
    pub progress_to_click: f32,
}

impl InputAction {
    pub fn new(
        timestamp: Timestamp,
        interaction_type: InteractionType,
        hand_type: HandType,
        chirality: Chirality,
        input_type: InputType,
        positions: Positions,
        progress_to_click: f32,
    ) -> Self {
        Self {
            timestamp,
            interaction_type,
            hand_type,
            chirality,
            input_type,
            cursor_position: positions.cursor_position,
            distance_from_screen: positions.distance_from_screen,
            progress_to_click,
        }
    }

    /// Only MOVE may be dropped by culling; anything else stops it
    pub fn is_cullable(&self) -> bool {
        self.input_type == InputType::Move
    }

    pub fn flags(&self) -> InteractionFlags {
        InteractionFlags::encode(self.interaction_type, self.hand_type, self.chirality, self.input_type)
    }

    pub fn to_wire(&self) -> WireInputAction {
        WireInputAction {
            timestamp: self.timestamp,
            interaction_flags: self.flags().bits(),
            cursor_position: self.cursor_position,
            distance_from_screen: self.distance_from_screen,
            progress_to_click: self.progress_to_click,
        }
    }

    pub fn from_wire(wire: &WireInputAction) -> Self {
        let flags = InteractionFlags::from_bits_truncate(wire.interaction_flags);
        Self {
            timestamp: wire.timestamp,
            interaction_type: flags.interaction_type(),
            hand_type: flags.hand_type(),
            chirality: flags.chirality(),
            input_type: flags.input_type(),
            cursor_position: wire.cursor_position,
            distance_from_screen: wire.distance_from_screen,
            progress_to_click: wire.progress_to_click,
        }
    }
}

bitflags! {
    /// Hand, input and interaction packed into one integer on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InteractionFlags: u32 {
        const LEFT = 1;
        const RIGHT = 2;

        const PRIMARY = 4;
        const SECONDARY = 8;

        const NONE_INPUT = 16;
        const CANCEL = 32;
        const DOWN = 64;
        const MOVE = 128;
        const UP = 256;

        const GRAB = 512;
        const HOVER = 1024;
        const PUSH = 2048;
        const TOUCHPLANE = 4096;
    }
}

impl InteractionFlags {
    pub fn encode(
        interaction_type: InteractionType,
        hand_type: HandType,
        chirality: Chirality,
        input_type: InputType,
    ) -> Self {
        let hand = match hand_type {
            HandType::Primary => Self::PRIMARY,
            HandType::Secondary => Self::SECONDARY,
        };
        let side = match chirality {
            Chirality::Left => Self::LEFT,
            Chirality::Right => Self::RIGHT,
        };
        let input = match input_type {
            InputType::None => Self::NONE_INPUT,
            InputType::Cancel => Self::CANCEL,
            InputType::Down => Self::DOWN,
            InputType::Move => Self::MOVE,
            InputType::Up => Self::UP,
        };
        let interaction = match interaction_type {
            InteractionType::Grab => Self::GRAB,
            InteractionType::Hover => Self::HOVER,
            InteractionType::Push => Self::PUSH,
            InteractionType::TouchPlane => Self::TOUCHPLANE,
        };
        hand | side | input | interaction
    }

    /// Right unless only LEFT is set
    pub fn chirality(&self) -> Chirality {
        if !self.contains(Self::RIGHT) && self.contains(Self::LEFT) {
            Chirality::Left
        } else {
            Chirality::Right
        }
    }

    /// Primary unless only SECONDARY is set
    pub fn hand_type(&self) -> HandType {
        if !self.contains(Self::PRIMARY) && self.contains(Self::SECONDARY) {
            HandType::Secondary
        } else {
            HandType::Primary
        }
    }

    /// NONE when no input bit is set
    pub fn input_type(&self) -> InputType {
        if self.contains(Self::CANCEL) {
            InputType::Cancel
        } else if self.contains(Self::UP) {
            InputType::Up
        } else if self.contains(Self::DOWN) {
            InputType::Down
        } else if self.contains(Self::MOVE) {
            InputType::Move
        } else {
            InputType::None
        }
    }

    /// PUSH when no interaction bit is set
    pub fn interaction_type(&self) -> InteractionType {
        if self.contains(Self::GRAB) {
            InteractionType::Grab
        } else if self.contains(Self::HOVER) {
            InteractionType::Hover
        } else if self.contains(Self::TOUCHPLANE) {
            InteractionType::TouchPlane
        } else {
            InteractionType::Push
        }
    }
}

/// `INPUT_ACTION` message content
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireInputAction {
    /// Microseconds
    pub timestamp: Timestamp,
    pub interaction_flags: u32,
    pub cursor_position: Vec2,
    pub distance_from_screen: f32,
    pub progress_to_click: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(input_type: InputType) -> InputAction {
        InputAction::new(
            Timestamp::from_micros(1_234),
            InteractionType::TouchPlane,
            HandType::Primary,
            Chirality::Left,
            input_type,
            Positions::new(Vec2::new(10.0, 20.0), 0.1),
            0.5,
        )
    }

    #[test]
    fn test_flag_bits() {
        let flags = action(InputType::Down).flags();
        assert_eq!(flags.bits(), 1 | 4 | 64 | 4096);
    }

    #[test]
    fn test_flags_decode() {
        let flags = InteractionFlags::from_bits_truncate(2 | 8 | 256 | 1024);
        assert_eq!(flags.chirality(), Chirality::Right);
        assert_eq!(flags.hand_type(), HandType::Secondary);
        assert_eq!(flags.input_type(), InputType::Up);
        assert_eq!(flags.interaction_type(), InteractionType::Hover);

        let empty = InteractionFlags::empty();
        assert_eq!(empty.chirality(), Chirality::Right);
        assert_eq!(empty.hand_type(), HandType::Primary);
        assert_eq!(empty.input_type(), InputType::None);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(action(InputType::Move).to_wire()).unwrap();
        assert_eq!(
            json,
            json!({
                "Timestamp": 1234,
                "InteractionFlags": 1 | 4 | 128 | 4096,
                "CursorPosition": { "x": 10.0, "y": 20.0 },
                "DistanceFromScreen": 0.1f32,
                "ProgressToClick": 0.5
            })
        );
    }

    #[test]
    fn test_from_wire_restores_action() {
        let original = action(InputType::Cancel);
        assert_eq!(InputAction::from_wire(&original.to_wire()), original);
    }

    #[test]
    fn test_only_moves_are_cullable() {
        assert!(action(InputType::Move).is_cullable());
        assert!(!action(InputType::None).is_cullable());
        assert!(!action(InputType::Down).is_cullable());
        assert!(!action(InputType::Up).is_cullable());
        assert!(!action(InputType::Cancel).is_cullable());
    }
}
