//! Consumer side of the protocol
//!
//! What an application embedding hand input runs: an async connection to
//! the service and a receiver that paces input actions to its own frame
//! loop.

pub mod connection;
pub mod receiver;

pub use connection::{ClientOptions, ServiceClient};
pub use receiver::{MessageReceiver, ReceiverUpdate, ServiceResponse};
