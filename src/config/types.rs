//! Interaction and physical configuration
//!
//! Full configuration types carry every field with its default. The
//! `*Partial` types mirror them with every field optional, so a change
//! request records exactly which fields the client set; `apply` merges only
//! those onto the current state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enum that accepts either its name or its declaration index on the wire
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumRepr {
    Name(String),
    Index(u64),
}

/// Interaction mode driving the active strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumRepr")]
pub enum InteractionType {
    #[serde(rename = "GRAB")]
    Grab,
    #[serde(rename = "HOVER")]
    Hover,
    #[serde(rename = "PUSH")]
    Push,
    #[serde(rename = "TOUCHPLANE")]
    TouchPlane,
}

impl InteractionType {
    /// Wire names in declaration order
    pub const NAMES: &'static [&'static str] = &["GRAB", "HOVER", "PUSH", "TOUCHPLANE"];

    pub const ALL: [InteractionType; 4] = [
        InteractionType::Grab,
        InteractionType::Hover,
        InteractionType::Push,
        InteractionType::TouchPlane,
    ];

    pub fn name(&self) -> &'static str {
        Self::NAMES[*self as usize]
    }
}

impl TryFrom<EnumRepr> for InteractionType {
    type Error = String;

    fn try_from(value: EnumRepr) -> Result<Self, Self::Error> {
        match value {
            EnumRepr::Name(name) => Self::NAMES
                .iter()
                .position(|n| n.eq_ignore_ascii_case(&name))
                .map(|i| Self::ALL[i])
                .ok_or_else(|| format!("unknown interaction type '{}'", name)),
            EnumRepr::Index(i) => Self::ALL
                .get(i as usize)
                .copied()
                .ok_or_else(|| format!("interaction type index {} out of range", i)),
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which point on the hand drives the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumRepr")]
pub enum TrackedPosition {
    /// Between the index metacarpal and proximal joints, offset toward the user
    #[serde(rename = "INDEX_STABLE")]
    IndexStable,
    #[serde(rename = "INDEX_TIP")]
    IndexTip,
    #[serde(rename = "WRIST")]
    Wrist,
    /// Whichever joint is closest to the screen
    #[serde(rename = "NEAREST")]
    Nearest,
}

impl TrackedPosition {
    pub const NAMES: &'static [&'static str] = &["INDEX_STABLE", "INDEX_TIP", "WRIST", "NEAREST"];

    pub const ALL: [TrackedPosition; 4] = [
        TrackedPosition::IndexStable,
        TrackedPosition::IndexTip,
        TrackedPosition::Wrist,
        TrackedPosition::Nearest,
    ];
}

impl TryFrom<EnumRepr> for TrackedPosition {
    type Error = String;

    fn try_from(value: EnumRepr) -> Result<Self, Self::Error> {
        match value {
            EnumRepr::Name(name) => Self::NAMES
                .iter()
                .position(|n| n.eq_ignore_ascii_case(&name))
                .map(|i| Self::ALL[i])
                .ok_or_else(|| format!("unknown tracked position '{}'", name)),
            EnumRepr::Index(i) => Self::ALL
                .get(i as usize)
                .copied()
                .ok_or_else(|| format!("tracked position index {} out of range", i)),
        }
    }
}

/// Vector as it appears in configuration (`{"X":..,"Y":..,"Z":..}`)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ConfigVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ConfigVector {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ConfigVectorPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl ConfigVector {
    fn apply(&mut self, partial: &ConfigVectorPartial) {
        merge(&mut self.x, partial.x);
        merge(&mut self.y, partial.y);
        merge(&mut self.z, partial.z);
    }
}

/// Hover-and-hold timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HoverAndHoldConfig {
    /// Seconds the cursor must rest before the hold timer starts
    pub hover_start_time_s: f32,
    /// Seconds of holding before a click fires
    pub hover_complete_time_s: f32,
}

impl Default for HoverAndHoldConfig {
    fn default() -> Self {
        Self {
            hover_start_time_s: 0.5,
            hover_complete_time_s: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HoverAndHoldPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_start_time_s: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_complete_time_s: Option<f32>,
}

/// Touch-plane settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TouchPlaneConfig {
    pub touch_plane_activation_distance_cm: f32,
    pub touch_plane_tracked_position: TrackedPosition,
}

impl Default for TouchPlaneConfig {
    fn default() -> Self {
        Self {
            touch_plane_activation_distance_cm: 5.0,
            touch_plane_tracked_position: TrackedPosition::Nearest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TouchPlanePartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_plane_activation_distance_cm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_plane_tracked_position: Option<TrackedPosition>,
}

/// How hands turn into input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InteractionConfig {
    pub use_scrolling_or_dragging: bool,
    /// Metres
    pub deadzone_radius: f32,
    pub interaction_zone_enabled: bool,
    pub interaction_min_distance_cm: f32,
    pub interaction_max_distance_cm: f32,
    pub interaction_type: InteractionType,
    pub hover_and_hold: HoverAndHoldConfig,
    pub touch_plane: TouchPlaneConfig,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            use_scrolling_or_dragging: false,
            deadzone_radius: 0.003,
            interaction_zone_enabled: false,
            interaction_min_distance_cm: 0.0,
            interaction_max_distance_cm: 25.0,
            interaction_type: InteractionType::Push,
            hover_and_hold: HoverAndHoldConfig::default(),
            touch_plane: TouchPlaneConfig::default(),
        }
    }
}

impl InteractionConfig {
    pub fn deadzone_radius_mm(&self) -> f32 {
        self.deadzone_radius * 1000.0
    }

    pub fn interaction_min_distance_mm(&self) -> f32 {
        self.interaction_min_distance_cm * 10.0
    }

    pub fn interaction_max_distance_mm(&self) -> f32 {
        self.interaction_max_distance_cm * 10.0
    }

    pub fn touch_plane_activation_distance_mm(&self) -> f32 {
        self.touch_plane.touch_plane_activation_distance_cm * 10.0
    }

    /// Merge the fields set in `partial`; returns true if anything changed
    pub fn apply(&mut self, partial: &InteractionConfigPartial) -> bool {
        let before = self.clone();

        merge(&mut self.use_scrolling_or_dragging, partial.use_scrolling_or_dragging);
        merge(&mut self.deadzone_radius, partial.deadzone_radius);
        merge(&mut self.interaction_zone_enabled, partial.interaction_zone_enabled);
        merge(&mut self.interaction_min_distance_cm, partial.interaction_min_distance_cm);
        merge(&mut self.interaction_max_distance_cm, partial.interaction_max_distance_cm);
        merge(&mut self.interaction_type, partial.interaction_type);

        if let Some(hh) = &partial.hover_and_hold {
            merge(&mut self.hover_and_hold.hover_start_time_s, hh.hover_start_time_s);
            merge(&mut self.hover_and_hold.hover_complete_time_s, hh.hover_complete_time_s);
        }
        if let Some(tp) = &partial.touch_plane {
            merge(
                &mut self.touch_plane.touch_plane_activation_distance_cm,
                tp.touch_plane_activation_distance_cm,
            );
            merge(
                &mut self.touch_plane.touch_plane_tracked_position,
                tp.touch_plane_tracked_position,
            );
        }

        *self != before
    }
}

/// Partial interaction config; `None` means "not set by this request"
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InteractionConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_scrolling_or_dragging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadzone_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_zone_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_min_distance_cm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_max_distance_cm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<InteractionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_and_hold: Option<HoverAndHoldPartial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_plane: Option<TouchPlanePartial>,
}

/// Screen and camera geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PhysicalConfig {
    pub screen_height_m: f32,
    /// Camera offset from the bottom centre of the screen, metres
    pub leap_position_relative_to_screen_bottom_m: ConfigVector,
    /// Camera rotation, degrees
    pub leap_rotation_d: ConfigVector,
    /// Screen tilt from vertical, degrees
    pub screen_rotation_d: f32,
    #[serde(rename = "ScreenWidthPX")]
    pub screen_width_px: i32,
    #[serde(rename = "ScreenHeightPX")]
    pub screen_height_px: i32,
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        Self {
            screen_height_m: 0.33,
            leap_position_relative_to_screen_bottom_m: ConfigVector::new(0.0, -0.12, -0.25),
            leap_rotation_d: ConfigVector::new(15.0, 0.0, 0.0),
            screen_rotation_d: 0.0,
            screen_width_px: 1080,
            screen_height_px: 1920,
        }
    }
}

impl PhysicalConfig {
    /// Screen dimensions usable for projection
    pub fn is_valid(&self) -> bool {
        self.screen_width_px > 0 && self.screen_height_px > 0
    }

    /// Merge the fields set in `partial`; returns true if anything changed
    pub fn apply(&mut self, partial: &PhysicalConfigPartial) -> bool {
        let before = self.clone();

        merge(&mut self.screen_height_m, partial.screen_height_m);
        if let Some(v) = &partial.leap_position_relative_to_screen_bottom_m {
            self.leap_position_relative_to_screen_bottom_m.apply(v);
        }
        if let Some(v) = &partial.leap_rotation_d {
            self.leap_rotation_d.apply(v);
        }
        merge(&mut self.screen_rotation_d, partial.screen_rotation_d);
        merge(&mut self.screen_width_px, partial.screen_width_px);
        merge(&mut self.screen_height_px, partial.screen_height_px);

        *self != before
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicalConfigPartial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_height_m: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leap_position_relative_to_screen_bottom_m: Option<ConfigVectorPartial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leap_rotation_d: Option<ConfigVectorPartial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_rotation_d: Option<f32>,
    #[serde(rename = "ScreenWidthPX", skip_serializing_if = "Option::is_none")]
    pub screen_width_px: Option<i32>,
    #[serde(rename = "ScreenHeightPX", skip_serializing_if = "Option::is_none")]
    pub screen_height_px: Option<i32>,
}

/// Load state of the persisted configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationState {
    NotLoaded,
    Loaded,
    Errored,
}

#[inline]
fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}
