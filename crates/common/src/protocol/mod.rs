// Wire protocol for the cahier-rt.v1 realtime channel.

pub mod event;
pub mod ws;

pub const CURRENT_PROTOCOL_VERSION: &str = "cahier-rt.v1";
