//! Queues between producers and the tick thread

pub mod input_queue;
pub mod message_queue;

pub use input_queue::{InputActionQueue, InputQueueStats, DEFAULT_CULL_TO_COUNT};
pub use message_queue::{MessageQueue, DEFAULT_MESSAGE_QUEUE_CAPACITY};
