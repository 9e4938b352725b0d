//! Core types for hand tracking
//!
//! A `HandFrame` is what the external tracking collaborator hands over once
//! per tick. Positions are metres in the tracking device's coordinate space
//! until the positioning module transforms them into screen space.

use crate::geometry::Vec3;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Handedness of a tracked hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chirality {
    /// Left hand
    Left,
    /// Right hand
    Right,
}

impl Chirality {
    /// The other hand
    pub fn opposite(&self) -> Chirality {
        match self {
            Chirality::Left => Chirality::Right,
            Chirality::Right => Chirality::Left,
        }
    }
}

/// Which tracked slot a hand occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandType {
    /// First-elected hand; drives interactions
    Primary,
    /// The other hand, when present
    Secondary,
}

/// Finger identifiers, thumb first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FingerType {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Pinky = 4,
}

impl FingerType {
    pub const ALL: [FingerType; 5] = [
        FingerType::Thumb,
        FingerType::Index,
        FingerType::Middle,
        FingerType::Ring,
        FingerType::Pinky,
    ];
}

/// Bone identifiers, from the palm outward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoneType {
    Metacarpal = 0,
    Proximal = 1,
    Intermediate = 2,
    Distal = 3,
}

impl BoneType {
    pub const ALL: [BoneType; 4] = [
        BoneType::Metacarpal,
        BoneType::Proximal,
        BoneType::Intermediate,
        BoneType::Distal,
    ];
}

/// One finger: the far joint of each bone, metacarpal to distal.
///
/// `joints[3]` is the fingertip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Finger {
    pub joints: [Vec3; 4],
}

impl Finger {
    /// Far joint of a bone
    #[inline]
    pub fn joint(&self, bone: BoneType) -> Vec3 {
        self.joints[bone as usize]
    }

    #[inline]
    pub fn tip(&self) -> Vec3 {
        self.joints[BoneType::Distal as usize]
    }
}

/// One hand as seen in a single tracking frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandSnapshot {
    /// Tracking-provider id; stable while the hand stays in view
    pub id: u32,
    pub chirality: Chirality,
    pub palm_position: Vec3,
    /// Palm velocity in metres per second
    #[serde(default)]
    pub palm_velocity: Vec3,
    pub wrist_position: Vec3,
    /// Fingers indexed by `FingerType`
    pub fingers: [Finger; 5],
    /// 0 = open hand, 1 = fist
    #[serde(default)]
    pub grab_strength: f32,
    #[serde(default)]
    pub pinch_strength: f32,
}

impl HandSnapshot {
    /// Build a hand with every joint at `position`. Useful for synthetic sources.
    pub fn at(id: u32, chirality: Chirality, position: Vec3) -> Self {
        Self {
            id,
            chirality,
            palm_position: position,
            palm_velocity: Vec3::ZERO,
            wrist_position: position,
            fingers: [Finger { joints: [position; 4] }; 5],
            grab_strength: 0.0,
            pinch_strength: 0.0,
        }
    }

    #[inline]
    pub fn finger(&self, finger: FingerType) -> &Finger {
        &self.fingers[finger as usize]
    }

    #[inline]
    pub fn is_left(&self) -> bool {
        self.chirality == Chirality::Left
    }

    /// Apply a point transform to every position in the hand.
    /// Velocity is rotated but not translated.
    pub fn transformed(&self, point: impl Fn(Vec3) -> Vec3, direction: impl Fn(Vec3) -> Vec3) -> Self {
        let mut out = self.clone();
        out.palm_position = point(self.palm_position);
        out.wrist_position = point(self.wrist_position);
        out.palm_velocity = direction(self.palm_velocity);
        for finger in out.fingers.iter_mut() {
            for joint in finger.joints.iter_mut() {
                *joint = point(*joint);
            }
        }
        out
    }
}

/// All hands visible at one instant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandFrame {
    pub timestamp: Timestamp,
    pub hands: Vec<HandSnapshot>,
}

impl HandFrame {
    pub fn new(timestamp: Timestamp, hands: Vec<HandSnapshot>) -> Self {
        Self { timestamp, hands }
    }

    /// A frame with no hands
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            hands: Vec::new(),
        }
    }

    /// First hand of the given chirality
    pub fn hand(&self, chirality: Chirality) -> Option<&HandSnapshot> {
        self.hands.iter().find(|h| h.chirality == chirality)
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }
}
