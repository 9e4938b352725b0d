//! Screen geometry
//!
//! World space has its origin at the bottom centre of the screen, X to the
//! right, Y up, and Z out of the screen toward the user, in metres. Screen
//! space is pixels from the bottom-left corner plus the distance in front of
//! the screen plane.

use crate::config::PhysicalConfig;
use crate::geometry::{Quat, Vec2, Vec3};
use crate::tracking::{HandFrame, HandSnapshot};

/// Projection between world space and screen pixels
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualScreen {
    width_px: f32,
    height_px: f32,
    width_mm: f32,
    height_mm: f32,
    px_per_mm: f32,
}

impl VirtualScreen {
    pub fn from_config(config: &PhysicalConfig) -> Self {
        let height_mm = config.screen_height_m * 1000.0;
        let aspect_ratio = if config.screen_height_px <= 0 {
            0.0
        } else {
            config.screen_width_px as f32 / config.screen_height_px as f32
        };

        Self {
            width_px: config.screen_width_px as f32,
            height_px: config.screen_height_px as f32,
            width_mm: height_mm * aspect_ratio,
            height_mm,
            px_per_mm: config.screen_height_px as f32 / height_mm,
        }
    }

    pub fn width_px(&self) -> f32 {
        self.width_px
    }

    pub fn height_px(&self) -> f32 {
        self.height_px
    }

    pub fn width_mm(&self) -> f32 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f32 {
        self.height_mm
    }

    /// World position (metres) to screen pixels; `z` stays the distance
    /// from the screen plane in metres
    pub fn world_to_screen(&self, world: Vec3) -> Vec3 {
        Vec3::new(
            self.mm_to_px(world.x * 1000.0 + self.width_mm / 2.0),
            self.mm_to_px(world.y * 1000.0),
            world.z,
        )
    }

    /// Screen pixels plus distance back to a world position in millimetres
    pub fn screen_to_world_mm(&self, screen: Vec2, distance_mm: f32) -> Vec3 {
        Vec3::new(
            self.px_to_mm(screen.x) - self.width_mm / 2.0,
            self.px_to_mm(screen.y),
            distance_mm,
        )
    }

    /// Unit conversion only; zero when the screen has no usable size
    pub fn px_to_mm(&self, px: f32) -> f32 {
        if self.px_per_mm <= 0.0 || !self.px_per_mm.is_finite() {
            0.0
        } else {
            px / self.px_per_mm
        }
    }

    pub fn px_to_mm_vec(&self, px: Vec2) -> Vec2 {
        Vec2::new(self.px_to_mm(px.x), self.px_to_mm(px.y))
    }

    pub fn mm_to_px(&self, mm: f32) -> f32 {
        if self.px_per_mm <= 0.0 || !self.px_per_mm.is_finite() {
            0.0
        } else {
            mm * self.px_per_mm
        }
    }

    pub fn mm_to_px_vec(&self, mm: Vec2) -> Vec2 {
        Vec2::new(self.mm_to_px(mm.x), self.mm_to_px(mm.y))
    }
}

impl Default for VirtualScreen {
    fn default() -> Self {
        Self::from_config(&PhysicalConfig::default())
    }
}

/// Rigid transform from tracking-device space into world space.
///
/// Device space uses the same axes as world space, centred on the camera.
/// Positive `LeapRotationD.X` always tilts the camera toward the screen; a
/// camera mounted upside down above the screen is recognised by a Z
/// rotation of 180 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingTransform {
    rotation: Quat,
    translation: Vec3,
}

impl TrackingTransform {
    pub const IDENTITY: TrackingTransform = TrackingTransform {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn from_config(config: &PhysicalConfig) -> Self {
        let rot = config.leap_rotation_d;
        let pos = config.leap_position_relative_to_screen_bottom_m;

        let top_mounted = rot.z > 179.9 && rot.z < 180.1;
        let x_angle = if top_mounted { rot.x } else { -rot.x };

        let rotation = Quat::from_yaw_pitch_roll(
            rot.y.to_radians(),
            (x_angle + config.screen_rotation_d).to_radians(),
            rot.z.to_radians(),
        );

        let translation = if config.screen_rotation_d != 0.0 {
            // Camera offset expressed along the tilted screen
            let distance = (pos.y * pos.y + pos.z * pos.z).sqrt();
            // A camera at the screen bottom has no offset to tilt
            let offset_angle = if distance > 0.0 { (-pos.z / pos.y).atan() } else { 0.0 };
            let angle = offset_angle + config.screen_rotation_d.to_radians();

            let mut y = distance * angle.cos();
            if pos.z < 0.0 && pos.y < 0.0 {
                y = -y;
            }
            Vec3::new(pos.x, y, -(distance * angle.sin()))
        } else {
            Vec3::new(pos.x, pos.y, -pos.z)
        };

        Self { rotation, translation }
    }

    pub fn apply_point(&self, point: Vec3) -> Vec3 {
        self.rotation.rotate(point) + self.translation
    }

    pub fn apply_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.rotate(direction)
    }

    pub fn apply_hand(&self, hand: &HandSnapshot) -> HandSnapshot {
        hand.transformed(|p| self.apply_point(p), |d| self.apply_direction(d))
    }

    pub fn apply_frame(&self, frame: &HandFrame) -> HandFrame {
        HandFrame::new(frame.timestamp, frame.hands.iter().map(|h| self.apply_hand(h)).collect())
    }
}

impl Default for TrackingTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
