//! Culling input action queue
//!
//! Input actions are produced once per tick but only one is dispatched per
//! tick. When the backlog grows past the cull count, stale MOVE actions are
//! dropped from the front. Any other action (DOWN, UP, CANCEL, NONE) is never
//! dropped and stops the culling, so nothing after it is lost either.
//!
//! The same queue runs on both ends of the connection: the service drains it
//! into broadcasts, the client drains it into its callbacks.

use crate::geometry::Vec2;
use crate::interaction::{InputAction, InputType};
use std::collections::VecDeque;

/// Backlog size culling reduces to
pub const DEFAULT_CULL_TO_COUNT: usize = 2;

/// Queue counters for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputQueueStats {
    pub enqueued: u64,
    pub culled: u64,
    pub dispatched: u64,
    /// UP actions moved to the last known position
    pub up_corrections: u64,
}

#[derive(Debug)]
pub struct InputActionQueue {
    queue: VecDeque<InputAction>,
    cull_to_count: usize,
    /// Cursor of the most recent non-UP action to leave the queue
    last_position: Option<Vec2>,
    stats: InputQueueStats,
}

impl InputActionQueue {
    pub fn new() -> Self {
        Self::with_cull_to_count(DEFAULT_CULL_TO_COUNT)
    }

    pub fn with_cull_to_count(cull_to_count: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            cull_to_count,
            last_position: None,
            stats: InputQueueStats::default(),
        }
    }

    pub fn push(&mut self, action: InputAction) {
        self.stats.enqueued += 1;
        self.queue.push_back(action);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn cull_to_count(&self) -> usize {
        self.cull_to_count
    }

    pub fn stats(&self) -> InputQueueStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_position = None;
    }

    /// Cull the backlog, then take the next action to dispatch
    pub fn pop_next(&mut self) -> Option<InputAction> {
        self.cull();

        let mut action = self.queue.pop_front()?;
        if action.input_type == InputType::Up {
            if let Some(position) = self.last_position {
                if position != action.cursor_position {
                    self.stats.up_corrections += 1;
                }
                action.cursor_position = position;
            }
        } else {
            self.last_position = Some(action.cursor_position);
        }

        self.stats.dispatched += 1;
        Some(action)
    }

    fn cull(&mut self) {
        while self.queue.len() > self.cull_to_count {
            match self.queue.front() {
                Some(front) if front.is_cullable() => {
                    self.last_position = Some(front.cursor_position);
                    self.queue.pop_front();
                    self.stats.culled += 1;
                }
                _ => break,
            }
        }
    }
}

impl Default for InputActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteractionType;
    use crate::positioning::Positions;
    use crate::time::Timestamp;
    use crate::tracking::{Chirality, HandType};

    fn action(input_type: InputType, x: f32, y: f32) -> InputAction {
        InputAction::new(
            Timestamp::from_micros(0),
            InteractionType::Push,
            HandType::Primary,
            Chirality::Right,
            input_type,
            Positions::new(Vec2::new(x, y), 0.1),
            0.0,
        )
    }

    fn drain(queue: &mut InputActionQueue) -> Vec<InputAction> {
        std::iter::from_fn(|| queue.pop_next()).collect()
    }

    #[test]
    fn test_culls_stale_moves() {
        let mut queue = InputActionQueue::new();
        for i in 0..5 {
            queue.push(action(InputType::Move, i as f32, 0.0));
        }

        let first = queue.pop_next().unwrap();
        assert_eq!(first.cursor_position.x, 3.0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().culled, 3);
    }

    #[test]
    fn test_key_event_is_a_barrier() {
        let mut queue = InputActionQueue::with_cull_to_count(0);
        queue.push(action(InputType::Move, 0.0, 0.0));
        queue.push(action(InputType::Down, 1.0, 0.0));
        queue.push(action(InputType::Move, 2.0, 0.0));
        queue.push(action(InputType::Move, 3.0, 0.0));

        let down = queue.pop_next().unwrap();
        assert_eq!(down.input_type, InputType::Down);
        // Everything after the barrier survived this drain
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_none_stops_culling() {
        let mut queue = InputActionQueue::with_cull_to_count(0);
        queue.push(action(InputType::None, 1.0, 0.0));
        queue.push(action(InputType::Move, 2.0, 0.0));

        let first = queue.pop_next().unwrap();
        assert_eq!(first.input_type, InputType::None);
        assert_eq!(first.cursor_position.x, 1.0);
        assert_eq!(queue.stats().culled, 0);
        assert_eq!(queue.pop_next().unwrap().cursor_position.x, 2.0);
    }

    #[test]
    fn test_up_takes_last_known_position() {
        let mut queue = InputActionQueue::with_cull_to_count(0);
        queue.push(action(InputType::Move, 1.0, 1.0));
        queue.push(action(InputType::Up, 0.0, 0.0));

        let up = queue.pop_next().unwrap();
        assert_eq!(up.input_type, InputType::Up);
        assert_eq!(up.cursor_position, Vec2::new(1.0, 1.0));
        assert_eq!(queue.stats().up_corrections, 1);
    }

    #[test]
    fn test_up_without_history_keeps_position() {
        let mut queue = InputActionQueue::new();
        queue.push(action(InputType::Up, 4.0, 5.0));
        assert_eq!(queue.pop_next().unwrap().cursor_position, Vec2::new(4.0, 5.0));
    }

    #[test]
    fn test_one_dispatch_per_drain() {
        let mut queue = InputActionQueue::new();
        queue.push(action(InputType::Down, 0.0, 0.0));
        queue.push(action(InputType::Up, 0.0, 0.0));

        assert_eq!(queue.pop_next().unwrap().input_type, InputType::Down);
        assert_eq!(queue.len(), 1);
        let rest = drain(&mut queue);
        assert_eq!(rest.len(), 1);
        assert!(queue.pop_next().is_none());
    }
}
