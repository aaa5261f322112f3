// Shared types for the Cahier realtime collaboration layer.

pub mod channel;
pub mod error;
pub mod protocol;
pub mod types;
