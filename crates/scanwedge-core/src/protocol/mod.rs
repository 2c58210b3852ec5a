//! Protocol module containing the JSON envelope pushed to subscribers.

pub mod messages;

pub use messages::*;
