//! Interactions: turning a tracked hand into input actions
//!
//! One `InteractionModule` is active at a time inside the
//! `InteractionEngine`. The engine runs the position pipeline, applies the
//! interaction zone, and asks the module whether this tick is a press, a
//! release, a move or nothing.

pub mod types;
pub mod module;
pub mod air_push;
pub mod grab;
pub mod hover_and_hold;
pub mod touch_plane;
pub mod engine;

pub use types::{InputAction, InputType, InteractionFlags, InteractionZoneState, WireInputAction};
pub use module::{InteractionModule, TickContext};
pub use air_push::AirPushInteraction;
pub use grab::{GrabDetector, GrabInteraction};
pub use hover_and_hold::{HoverAndHoldInteraction, ProgressTimer};
pub use touch_plane::TouchPlaneInteraction;
pub use engine::{create_module, EngineOutput, InteractionEngine};
