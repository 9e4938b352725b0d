//! Interaction engine
//!
//! Owns the active interaction module and the position pipeline that feeds
//! it. Called once per tick with the primary hand.

use super::air_push::AirPushInteraction;
use super::grab::GrabInteraction;
use super::hover_and_hold::HoverAndHoldInteraction;
use super::module::{InteractionModule, TickContext};
use super::touch_plane::TouchPlaneInteraction;
use super::types::{InputAction, InputType, InteractionZoneState};
use crate::config::{InteractionConfig, InteractionType};
use crate::positioning::{
    Extrapolation, OneEuroFilter, PositionModifier, PositionStabiliser, PositionTuning, PositioningModule,
    Positions, VirtualScreen,
};
use crate::time::Timestamp;
use crate::tracking::{Chirality, HandSnapshot, HandType};
use tracing::{debug, info};

/// Result of one engine tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineOutput {
    pub action: Option<InputAction>,
    pub zone_event: Option<InteractionZoneState>,
}

/// Fresh module for `interaction_type`
pub fn create_module(interaction_type: InteractionType) -> Box<dyn InteractionModule> {
    match interaction_type {
        InteractionType::Push => Box::new(AirPushInteraction::new()),
        InteractionType::Grab => Box::new(GrabInteraction::new()),
        InteractionType::Hover => Box::new(HoverAndHoldInteraction::new()),
        InteractionType::TouchPlane => Box::new(TouchPlaneInteraction::new()),
    }
}

pub struct InteractionEngine {
    module: Box<dyn InteractionModule>,
    config: InteractionConfig,
    ignore_dragging: bool,

    positioning: PositioningModule,
    stabiliser: PositionStabiliser,
    one_euro: OneEuroFilter,
    extrapolation: Extrapolation,

    last_positions: Positions,
    chirality: Chirality,
    had_hand_last_frame: bool,
    zone_state: InteractionZoneState,
}

impl InteractionEngine {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen, tuning: PositionTuning) -> Self {
        let mut engine = Self {
            module: create_module(config.interaction_type),
            config: config.clone(),
            ignore_dragging: !config.use_scrolling_or_dragging,
            positioning: PositioningModule::new(screen),
            stabiliser: PositionStabiliser::new(config.deadzone_radius_mm()),
            one_euro: OneEuroFilter::new(tuning.enable_one_euro_filter),
            extrapolation: Extrapolation::new(tuning.enable_velocity_extrapolation),
            last_positions: Positions::default(),
            chirality: Chirality::Right,
            had_hand_last_frame: false,
            zone_state: InteractionZoneState::HandExited,
        };
        engine.apply_interaction_config(config);
        engine
    }

    pub fn active_type(&self) -> InteractionType {
        self.module.interaction_type()
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn screen(&self) -> &VirtualScreen {
        self.positioning.screen()
    }

    pub fn zone_state(&self) -> InteractionZoneState {
        self.zone_state
    }

    pub fn ignore_dragging(&self) -> bool {
        self.ignore_dragging
    }

    /// Screen geometry changed; positions from before are meaningless now
    pub fn set_screen(&mut self, screen: VirtualScreen) {
        self.positioning.set_screen(screen);
        self.reset_pipeline();
    }

    /// Apply new interaction settings, swapping modules when the type changed
    pub fn apply_interaction_config(&mut self, config: &InteractionConfig) {
        if config.interaction_type != self.module.interaction_type() {
            info!(
                from = %self.module.interaction_type(),
                to = %config.interaction_type,
                "switching interaction"
            );
            self.module = create_module(config.interaction_type);
            self.reset_pipeline();
        }

        self.ignore_dragging = !config.use_scrolling_or_dragging;
        self.stabiliser.set_default_radius(config.deadzone_radius_mm());
        self.stabiliser.reset();
        self.module.on_config_updated(config, self.ignore_dragging);
        self.config = config.clone();
    }

    /// Run one tick for the primary hand, or `None` when there is none
    pub fn update(&mut self, hand: Option<&HandSnapshot>, hand_type: HandType, timestamp: Timestamp) -> EngineOutput {
        let mut output = EngineOutput::default();
        let mut positions = self.last_positions;
        let mut active_hand = None;

        if let Some(hand) = hand {
            self.chirality = hand.chirality;
            positions = self.process_positions(hand);

            if self.in_zone(positions.distance_from_screen * 1000.0) {
                active_hand = Some(hand);
                output.zone_event = self.set_zone_state(InteractionZoneState::HandEntered);
            } else {
                output.zone_event = self.set_zone_state(InteractionZoneState::HandExited);
            }
        } else {
            output.zone_event = self.set_zone_state(InteractionZoneState::HandExited);
        }

        let mut ctx = TickContext {
            timestamp,
            hand_type,
            chirality: self.chirality,
            positions,
            distance_mm: positions.distance_from_screen * 1000.0,
            had_hand_last_frame: self.had_hand_last_frame,
            ignore_dragging: self.ignore_dragging,
            screen: self.positioning.screen(),
            stabiliser: &mut self.stabiliser,
        };

        let action = self.module.update(active_hand, &mut ctx);
        let emitted_positions = ctx.positions;

        output.action = match action {
            Some(action) if active_hand.is_none() && action.input_type != InputType::Cancel => {
                debug!(input = ?action.input_type, "dropping action without a hand");
                None
            }
            other => other,
        };

        if active_hand.is_some() {
            self.last_positions = emitted_positions;
        } else {
            self.reset_filters();
        }
        self.had_hand_last_frame = active_hand.is_some();
        output
    }

    fn process_positions(&mut self, hand: &HandSnapshot) -> Positions {
        let raw = self
            .positioning
            .calculate_positions(hand, self.module.tracked_position());
        let stabilised = self.positioning.apply_stabilisation(raw, &mut self.stabiliser);

        let filtered = self.one_euro.apply_modification(stabilised.cursor_position);
        let cursor = self.extrapolation.apply_modification(filtered);
        Positions::new(cursor, stabilised.distance_from_screen)
    }

    fn in_zone(&self, distance_mm: f32) -> bool {
        !self.config.interaction_zone_enabled
            || (distance_mm >= self.config.interaction_min_distance_mm()
                && distance_mm <= self.config.interaction_max_distance_mm())
    }

    // Edge-triggered; silent while the zone is disabled
    fn set_zone_state(&mut self, state: InteractionZoneState) -> Option<InteractionZoneState> {
        if !self.config.interaction_zone_enabled || self.zone_state == state {
            return None;
        }
        self.zone_state = state;
        Some(state)
    }

    fn reset_filters(&mut self) {
        self.one_euro.reset();
        self.extrapolation.reset();
    }

    fn reset_pipeline(&mut self) {
        self.positioning.reset();
        self.stabiliser.reset();
        self.reset_filters();
        self.had_hand_last_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    fn hand_at(z: f32) -> HandSnapshot {
        HandSnapshot::at(7, Chirality::Left, Vec3::new(0.0, 0.15, z))
    }

    fn engine_with(config: InteractionConfig) -> InteractionEngine {
        InteractionEngine::new(&config, VirtualScreen::default(), PositionTuning::default())
    }

    fn tick(engine: &mut InteractionEngine, hand: Option<&HandSnapshot>, t_ms: u64) -> EngineOutput {
        engine.update(hand, HandType::Primary, Timestamp::from_millis(t_ms))
    }

    #[test]
    fn test_creates_configured_module() {
        for interaction_type in InteractionType::ALL {
            let config = InteractionConfig {
                interaction_type,
                ..Default::default()
            };
            assert_eq!(engine_with(config).active_type(), interaction_type);
        }
    }

    #[test]
    fn test_switching_module() {
        let mut engine = engine_with(InteractionConfig::default());
        let config = InteractionConfig {
            interaction_type: InteractionType::Grab,
            ..Default::default()
        };
        engine.apply_interaction_config(&config);
        assert_eq!(engine.active_type(), InteractionType::Grab);

        // A switch starts the new module without a hand history
        let hand = hand_at(0.1);
        tick(&mut engine, Some(&hand), 0);
        engine.apply_interaction_config(&InteractionConfig {
            interaction_type: InteractionType::Hover,
            ..Default::default()
        });
        assert!(tick(&mut engine, None, 16).action.is_none());
    }

    #[test]
    fn test_no_hand_never_moves() {
        for interaction_type in InteractionType::ALL {
            let mut engine = engine_with(InteractionConfig {
                interaction_type,
                ..Default::default()
            });
            for t in 0..10 {
                assert!(tick(&mut engine, None, t * 16).action.is_none());
            }

            let hand = hand_at(0.1);
            tick(&mut engine, Some(&hand), 200);
            let lost = tick(&mut engine, None, 216).action;
            if let Some(action) = lost {
                assert_eq!(action.input_type, InputType::Cancel, "{interaction_type}");
                assert_eq!(action.chirality, Chirality::Left);
            }
        }
    }

    #[test]
    fn test_hand_produces_move() {
        let mut engine = engine_with(InteractionConfig {
            interaction_type: InteractionType::Grab,
            ..Default::default()
        });
        let hand = hand_at(0.1);
        let action = tick(&mut engine, Some(&hand), 0).action.unwrap();
        assert_eq!(action.input_type, InputType::Move);
        assert_eq!(action.interaction_type, InteractionType::Grab);
        assert!((action.distance_from_screen - 0.1533).abs() < 1e-4);
    }

    #[test]
    fn test_zone_events_are_edge_triggered() {
        let mut engine = engine_with(InteractionConfig {
            interaction_type: InteractionType::Grab,
            interaction_zone_enabled: true,
            interaction_min_distance_cm: 0.0,
            interaction_max_distance_cm: 20.0,
            ..Default::default()
        });

        let outside = hand_at(0.3);
        let inside = hand_at(0.1);

        let first = tick(&mut engine, Some(&outside), 0);
        assert_eq!(first.zone_event, None);
        assert!(first.action.is_none());

        let entered = tick(&mut engine, Some(&inside), 16);
        assert_eq!(entered.zone_event, Some(InteractionZoneState::HandEntered));
        assert_eq!(entered.action.unwrap().input_type, InputType::Move);
        assert_eq!(tick(&mut engine, Some(&inside), 32).zone_event, None);

        // Leaving the zone looks like losing the hand
        let exited = tick(&mut engine, Some(&outside), 48);
        assert_eq!(exited.zone_event, Some(InteractionZoneState::HandExited));
        assert_eq!(exited.action.unwrap().input_type, InputType::Cancel);
        assert_eq!(engine.zone_state(), InteractionZoneState::HandExited);
    }

    #[test]
    fn test_zone_disabled_is_silent() {
        let mut engine = engine_with(InteractionConfig::default());
        let hand = hand_at(0.5);
        assert_eq!(tick(&mut engine, Some(&hand), 0).zone_event, None);
        assert_eq!(tick(&mut engine, None, 16).zone_event, None);
    }

    #[test]
    fn test_ignore_dragging_follows_config() {
        let mut engine = engine_with(InteractionConfig::default());
        engine.apply_interaction_config(&InteractionConfig {
            use_scrolling_or_dragging: true,
            ..Default::default()
        });
        assert!(!engine.ignore_dragging());
        engine.apply_interaction_config(&InteractionConfig {
            use_scrolling_or_dragging: false,
            ..Default::default()
        });
        assert!(engine.ignore_dragging());
    }
}
