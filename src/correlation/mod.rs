//! Request/response correlation by request ID

pub mod store;

pub use store::{ResponseCallback, ResponseStore, DEFAULT_EXPIRY};
