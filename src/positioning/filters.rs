//! Optional cursor modifiers applied after the deadzone
//!
//! Both modifiers are constructed enabled or disabled from the service
//! tuning settings. A disabled modifier returns its input unchanged.

use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};

/// Tick rate the filter coefficients assume
const FILTER_RATE_HZ: f32 = 60.0;

/// A stateful transform of the cursor position
pub trait PositionModifier: Send {
    fn apply_modification(&mut self, position: Vec2) -> Vec2;

    /// Forget history; the next call behaves like the first
    fn reset(&mut self);
}

/// `[tuning]` section of the service settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionTuning {
    pub enable_one_euro_filter: bool,
    pub enable_velocity_extrapolation: bool,
}

/// Exponential smoothing for one axis
#[derive(Debug, Clone, Default)]
struct LowPass {
    last_filtered: Option<f32>,
}

impl LowPass {
    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        let filtered = match self.last_filtered {
            Some(last) => alpha * value + (1.0 - alpha) * last,
            None => value,
        };
        self.last_filtered = Some(filtered);
        filtered
    }
}

fn alpha(cutoff: f32) -> f32 {
    1.0 / (1.0 + FILTER_RATE_HZ / (2.0 * std::f32::consts::PI * cutoff))
}

/// One-euro filter: the cutoff rises with the filtered speed of the cursor,
/// so slow movement is smoothed heavily and fast movement barely lags.
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    enabled: bool,
    min_cutoff: f32,
    beta: f32,
    derivative_cutoff: f32,

    last_position: Option<Vec2>,
    dx: LowPass,
    dy: LowPass,
    x: LowPass,
    y: LowPass,
}

impl OneEuroFilter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            min_cutoff: 0.5,
            beta: 0.1,
            derivative_cutoff: 0.5,
            last_position: None,
            dx: LowPass::default(),
            dy: LowPass::default(),
            x: LowPass::default(),
            y: LowPass::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl PositionModifier for OneEuroFilter {
    fn apply_modification(&mut self, position: Vec2) -> Vec2 {
        if !self.enabled {
            return position;
        }

        let Some(last) = self.last_position else {
            self.last_position = Some(position);
            return position;
        };

        let delta = position - last;
        let speed_x = self.dx.filter(delta.x, alpha(self.derivative_cutoff)).abs();
        let x = self.x.filter(position.x, alpha(self.min_cutoff + self.beta * speed_x));

        let speed_y = self.dy.filter(delta.y, alpha(self.derivative_cutoff)).abs();
        let y = self.y.filter(position.y, alpha(self.min_cutoff + self.beta * speed_y));

        self.last_position = Some(position);
        Vec2::new(x, y)
    }

    fn reset(&mut self) {
        *self = Self::new(self.enabled);
    }
}

/// Linear extrapolation one sample ahead
#[derive(Debug, Clone)]
pub struct Extrapolation {
    enabled: bool,
    previous: Option<Vec2>,
}

impl Extrapolation {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, previous: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl PositionModifier for Extrapolation {
    fn apply_modification(&mut self, position: Vec2) -> Vec2 {
        if !self.enabled {
            return position;
        }

        let out = match self.previous {
            Some(previous) => position + (position - previous),
            None => position,
        };
        self.previous = Some(position);
        out
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}
