//! Hand lifecycle tracking
//!
//! Elects which visible hand is primary and which is secondary, keeps that
//! election stable across frames by chirality, and reports edge-triggered
//! presence changes.

use super::types::{Chirality, HandFrame, HandSnapshot, HandType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Presence transitions broadcast to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandPresence {
    /// Hand count went from zero to at least one
    HandFound,
    /// Hand count went from at least one to zero
    HandsLost,
}

/// A tracked slot: the chirality it follows plus the hand seen this frame
#[derive(Debug, Clone, Default)]
pub struct TrackedHandSlot {
    chirality: Option<Chirality>,
    hand: Option<HandSnapshot>,
}

impl TrackedHandSlot {
    pub fn chirality(&self) -> Option<Chirality> {
        self.chirality
    }

    pub fn hand(&self) -> Option<&HandSnapshot> {
        self.hand.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.chirality.is_some()
    }

    fn assign(&mut self, hand: Option<&HandSnapshot>) {
        self.chirality = hand.map(|h| h.chirality);
        self.hand = hand.cloned();
    }

    fn clear(&mut self) {
        self.chirality = None;
        self.hand = None;
    }
}

/// Result of one tracker update
#[derive(Debug, Clone, Default)]
pub struct HandUpdate {
    pub primary: Option<HandSnapshot>,
    pub secondary: Option<HandSnapshot>,
    pub presence: Option<HandPresence>,
}

/// Primary/secondary election across frames
#[derive(Debug, Default)]
pub struct HandTracker {
    primary: TrackedHandSlot,
    secondary: TrackedHandSlot,
    hands_last_frame: usize,
}

impl HandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the hands visible this frame. `None` means tracking is
    /// unavailable, which is handled exactly like an empty frame.
    pub fn update(&mut self, frame: Option<&HandFrame>) -> HandUpdate {
        let (left, right, count) = match frame {
            Some(f) => (
                f.hand(Chirality::Left),
                f.hand(Chirality::Right),
                f.hand_count(),
            ),
            None => (None, None, 0),
        };

        let presence = if count > 0 && self.hands_last_frame == 0 {
            Some(HandPresence::HandFound)
        } else if count == 0 && self.hands_last_frame > 0 {
            Some(HandPresence::HandsLost)
        } else {
            None
        };
        self.hands_last_frame = count;

        self.update_slot(HandType::Primary, left, right);
        self.update_slot(HandType::Secondary, left, right);

        if let Some(p) = presence {
            debug!(?p, hands = count, "Hand presence changed");
        }

        HandUpdate {
            primary: self.primary.hand.clone(),
            secondary: self.secondary.hand.clone(),
            presence,
        }
    }

    pub fn primary(&self) -> &TrackedHandSlot {
        &self.primary
    }

    pub fn secondary(&self) -> &TrackedHandSlot {
        &self.secondary
    }

    /// Forget all elections; the next frame starts from scratch
    pub fn reset(&mut self) {
        self.primary.clear();
        self.secondary.clear();
        self.hands_last_frame = 0;
    }

    fn update_slot(
        &mut self,
        slot: HandType,
        left: Option<&HandSnapshot>,
        right: Option<&HandSnapshot>,
    ) {
        let cached = match slot {
            HandType::Primary => self.primary.chirality,
            HandType::Secondary => self.secondary.chirality,
        };

        let still_present = match cached {
            Some(Chirality::Left) => left,
            Some(Chirality::Right) => right,
            None => None,
        };

        match (slot, still_present) {
            (HandType::Primary, Some(hand)) => self.primary.hand = Some(hand.clone()),
            (HandType::Secondary, Some(hand)) => self.secondary.hand = Some(hand.clone()),
            (HandType::Primary, None) => self.assign_new_primary(left, right),
            (HandType::Secondary, None) => self.assign_new_secondary(left, right),
        }
    }

    /// Re-electing primary also vacates secondary so both slots cannot
    /// settle on the same hand.
    fn assign_new_primary(&mut self, left: Option<&HandSnapshot>, right: Option<&HandSnapshot>) {
        self.primary.clear();
        self.secondary.clear();

        self.primary.assign(right.or(left));
    }

    fn assign_new_secondary(&mut self, left: Option<&HandSnapshot>, right: Option<&HandSnapshot>) {
        self.secondary.clear();

        let primary = self.primary.chirality;
        if right.is_some() && primary != Some(Chirality::Right) {
            self.secondary.assign(right);
        } else if left.is_some() && primary != Some(Chirality::Left) {
            self.secondary.assign(left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::time::Timestamp;

    fn hand(id: u32, chirality: Chirality) -> HandSnapshot {
        HandSnapshot::at(id, chirality, Vec3::new(0.0, 0.2, 0.1))
    }

    fn frame(hands: Vec<HandSnapshot>) -> HandFrame {
        HandFrame::new(Timestamp::from_millis(1), hands)
    }

    #[test]
    fn test_primary_prefers_right() {
        let mut tracker = HandTracker::new();
        let update = tracker.update(Some(&frame(vec![
            hand(1, Chirality::Left),
            hand(2, Chirality::Right),
        ])));

        assert_eq!(update.primary.map(|h| h.chirality), Some(Chirality::Right));
        assert_eq!(update.secondary.map(|h| h.chirality), Some(Chirality::Left));
    }

    #[test]
    fn test_single_left_hand_becomes_primary() {
        let mut tracker = HandTracker::new();
        let update = tracker.update(Some(&frame(vec![hand(1, Chirality::Left)])));
        assert_eq!(update.primary.map(|h| h.id), Some(1));
        assert!(update.secondary.is_none());
    }

    #[test]
    fn test_primary_persists_by_chirality() {
        let mut tracker = HandTracker::new();
        tracker.update(Some(&frame(vec![hand(1, Chirality::Left)])));

        // A right hand arriving later does not steal primary
        let update = tracker.update(Some(&frame(vec![
            hand(1, Chirality::Left),
            hand(2, Chirality::Right),
        ])));
        assert_eq!(update.primary.map(|h| h.chirality), Some(Chirality::Left));
        assert_eq!(update.secondary.map(|h| h.chirality), Some(Chirality::Right));
    }

    #[test]
    fn test_primary_lost_reelects_and_clears_secondary() {
        let mut tracker = HandTracker::new();
        tracker.update(Some(&frame(vec![
            hand(1, Chirality::Left),
            hand(2, Chirality::Right),
        ])));
        assert_eq!(tracker.primary().chirality(), Some(Chirality::Right));

        let update = tracker.update(Some(&frame(vec![hand(1, Chirality::Left)])));
        assert_eq!(update.primary.map(|h| h.chirality), Some(Chirality::Left));
        assert!(update.secondary.is_none());
        assert!(!tracker.secondary().is_occupied());
    }

    #[test]
    fn test_slots_never_share_chirality() {
        let mut tracker = HandTracker::new();
        let sequences = [
            vec![hand(1, Chirality::Left)],
            vec![hand(1, Chirality::Left), hand(2, Chirality::Right)],
            vec![hand(2, Chirality::Right)],
            vec![hand(1, Chirality::Left), hand(2, Chirality::Right)],
            vec![],
            vec![hand(2, Chirality::Right), hand(1, Chirality::Left)],
        ];

        for hands in sequences {
            tracker.update(Some(&frame(hands)));
            if let (Some(p), Some(s)) = (tracker.primary().chirality(), tracker.secondary().chirality()) {
                assert_ne!(p, s);
            }
        }
    }

    #[test]
    fn test_presence_is_edge_triggered() {
        let mut tracker = HandTracker::new();

        let update = tracker.update(Some(&frame(vec![hand(1, Chirality::Right)])));
        assert_eq!(update.presence, Some(HandPresence::HandFound));

        let update = tracker.update(Some(&frame(vec![hand(1, Chirality::Right)])));
        assert_eq!(update.presence, None);

        let update = tracker.update(Some(&frame(vec![])));
        assert_eq!(update.presence, Some(HandPresence::HandsLost));

        let update = tracker.update(Some(&frame(vec![])));
        assert_eq!(update.presence, None);
    }

    #[test]
    fn test_unavailable_tracking_is_zero_hands() {
        let mut tracker = HandTracker::new();
        tracker.update(Some(&frame(vec![hand(1, Chirality::Right)])));

        let update = tracker.update(None);
        assert_eq!(update.presence, Some(HandPresence::HandsLost));
        assert!(update.primary.is_none());
        assert!(update.secondary.is_none());
    }

    #[test]
    fn test_slot_hand_refreshes_each_frame() {
        let mut tracker = HandTracker::new();
        tracker.update(Some(&frame(vec![hand(1, Chirality::Right)])));

        let mut moved = hand(1, Chirality::Right);
        moved.palm_position = Vec3::new(0.1, 0.1, 0.1);
        let update = tracker.update(Some(&frame(vec![moved])));
        assert_eq!(
            update.primary.map(|h| h.palm_position),
            Some(Vec3::new(0.1, 0.1, 0.1))
        );
    }

    #[test]
    fn test_presence_serialization() {
        assert_eq!(
            serde_json::to_string(&HandPresence::HandsLost).unwrap(),
            "\"HANDS_LOST\""
        );
    }
}
