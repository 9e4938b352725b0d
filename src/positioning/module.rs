//! Hand to cursor position
//!
//! Picks the tracked point on the hand, projects it onto the virtual
//! screen, and runs the deadzone stabiliser in millimetres.

use super::stabiliser::PositionStabiliser;
use super::virtual_screen::VirtualScreen;
use crate::config::TrackedPosition;
use crate::geometry::{Vec2, Vec3};
use crate::tracking::{BoneType, FingerType, HandSnapshot};
use serde::{Deserialize, Serialize};

/// Distance the stable index point is pushed away from the screen
const INDEX_STABLE_OFFSET_M: f32 = 0.0533;

/// How much nearer a new joint must be before `NEAREST` switches to it
const NEAREST_JOINT_BIAS_M: f32 = 0.01;

/// Cursor position for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Positions {
    /// Pixels from the bottom-left of the screen
    pub cursor_position: Vec2,
    /// Metres in front of the screen plane
    pub distance_from_screen: f32,
}

impl Positions {
    pub fn new(cursor_position: Vec2, distance_from_screen: f32) -> Self {
        Self {
            cursor_position,
            distance_from_screen,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositioningModule {
    screen: VirtualScreen,
    nearest_joint: Option<(FingerType, BoneType)>,
}

impl PositioningModule {
    pub fn new(screen: VirtualScreen) -> Self {
        Self {
            screen,
            nearest_joint: None,
        }
    }

    pub fn screen(&self) -> &VirtualScreen {
        &self.screen
    }

    pub fn set_screen(&mut self, screen: VirtualScreen) {
        self.screen = screen;
    }

    /// Project the chosen point on `hand` onto the screen
    pub fn calculate_positions(&mut self, hand: &HandSnapshot, tracked: TrackedPosition) -> Positions {
        let world = self.tracked_point(hand, tracked);
        let screen = self.screen.world_to_screen(world);
        Positions::new(screen.xy(), screen.z)
    }

    /// Run the deadzone on the cursor in millimetres
    pub fn apply_stabilisation(&self, positions: Positions, stabiliser: &mut PositionStabiliser) -> Positions {
        let mm = self.screen.px_to_mm_vec(positions.cursor_position);
        let stabilised = stabiliser.apply_deadzone(mm);
        Positions::new(self.screen.mm_to_px_vec(stabilised), positions.distance_from_screen)
    }

    /// World position of the tracked point
    pub fn tracked_point(&mut self, hand: &HandSnapshot, tracked: TrackedPosition) -> Vec3 {
        match tracked {
            TrackedPosition::IndexStable => {
                let index = hand.finger(FingerType::Index);
                let mut point = (index.joint(BoneType::Metacarpal) + index.joint(BoneType::Proximal)) / 2.0;
                point.z += INDEX_STABLE_OFFSET_M;
                point
            }
            TrackedPosition::IndexTip => hand.finger(FingerType::Index).tip(),
            TrackedPosition::Wrist => hand.wrist_position,
            TrackedPosition::Nearest => self.nearest_point(hand),
        }
    }

    pub fn reset(&mut self) {
        self.nearest_joint = None;
    }

    // Joint closest to the screen, preferring the one used last time
    fn nearest_point(&mut self, hand: &HandSnapshot) -> Vec3 {
        let mut best_distance = f32::INFINITY;
        let mut best_point = Vec3::ZERO;
        let mut best_joint = None;

        if let Some((finger, bone)) = self.nearest_joint {
            let point = hand.finger(finger).joint(bone);
            best_distance = point.z - NEAREST_JOINT_BIAS_M;
            best_point = point;
            best_joint = Some((finger, bone));
        }

        for finger in FingerType::ALL {
            for bone in BoneType::ALL {
                let point = hand.finger(finger).joint(bone);
                if point.z < best_distance {
                    best_distance = point.z;
                    best_point = point;
                    best_joint = Some((finger, bone));
                }
            }
        }

        self.nearest_joint = best_joint;
        best_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalConfig;
    use crate::tracking::Chirality;

    fn module() -> PositioningModule {
        PositioningModule::new(VirtualScreen::from_config(&PhysicalConfig {
            screen_width_px: 1000,
            screen_height_px: 1000,
            screen_height_m: 1.0,
            ..Default::default()
        }))
    }

    fn hand_with_index(metacarpal: Vec3, proximal: Vec3) -> HandSnapshot {
        let mut hand = HandSnapshot::at(1, Chirality::Right, Vec3::new(0.0, 0.0, 0.5));
        hand.fingers[FingerType::Index as usize].joints[0] = metacarpal;
        hand.fingers[FingerType::Index as usize].joints[1] = proximal;
        hand
    }

    #[test]
    fn test_index_stable_averages_and_offsets() {
        let mut module = module();
        let hand = hand_with_index(Vec3::new(1.0, 2.0, 2.99), Vec3::new(1.0, 2.0, 3.01));
        let point = module.tracked_point(&hand, TrackedPosition::IndexStable);
        assert!((point.x - 1.0).abs() < 1e-5);
        assert!((point.y - 2.0).abs() < 1e-5);
        assert!((point.z - 3.0533).abs() < 1e-5);
    }

    #[test]
    fn test_calculate_positions_projects() {
        let mut module = module();
        let mut hand = HandSnapshot::at(1, Chirality::Right, Vec3::ZERO);
        hand.wrist_position = Vec3::new(0.1, 0.2, 0.15);

        let positions = module.calculate_positions(&hand, TrackedPosition::Wrist);
        assert!((positions.cursor_position.x - 600.0).abs() < 1e-3);
        assert!((positions.cursor_position.y - 200.0).abs() < 1e-3);
        assert!((positions.distance_from_screen - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_prefers_last_joint_within_bias() {
        let mut module = module();
        let mut hand = HandSnapshot::at(1, Chirality::Right, Vec3::new(0.0, 0.0, 0.5));
        hand.fingers[FingerType::Index as usize].joints[3] = Vec3::new(0.0, 0.0, 0.10);
        let first = module.tracked_point(&hand, TrackedPosition::Nearest);
        assert_eq!(first.z, 0.10);

        // Middle tip only slightly nearer: stick with the index tip
        hand.fingers[FingerType::Middle as usize].joints[3] = Vec3::new(0.05, 0.0, 0.095);
        let second = module.tracked_point(&hand, TrackedPosition::Nearest);
        assert_eq!(second.x, 0.0);

        // Clearly nearer: switch
        hand.fingers[FingerType::Middle as usize].joints[3] = Vec3::new(0.05, 0.0, 0.05);
        let third = module.tracked_point(&hand, TrackedPosition::Nearest);
        assert_eq!(third.x, 0.05);
    }

    #[test]
    fn test_stabilisation_round_trips_units() {
        let module = module();
        let mut stabiliser = PositionStabiliser::new(5.0);
        let positions = Positions::new(Vec2::new(400.0, 300.0), 0.2);
        let out = module.apply_stabilisation(positions, &mut stabiliser);
        assert!((out.cursor_position.x - 400.0).abs() < 1e-3);
        assert!((out.cursor_position.y - 300.0).abs() < 1e-3);
        assert_eq!(out.distance_from_screen, 0.2);
    }
}
