//! Position pipeline
//!
//! ```text
//! hand ──► tracked point ──► virtual screen ──► deadzone ──► one-euro ──► extrapolation ──► Positions
//!          (metres)          (pixels)           (mm)         (optional)   (optional)
//! ```

pub mod virtual_screen;
pub mod stabiliser;
pub mod filters;
pub mod module;

pub use virtual_screen::{TrackingTransform, VirtualScreen};
pub use stabiliser::PositionStabiliser;
pub use filters::{Extrapolation, OneEuroFilter, PositionModifier, PositionTuning};
pub use module::{PositioningModule, Positions};
