// WebSocket frame types for the cahier-rt.v1 protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ChannelName;
use crate::protocol::event::{EventKind, RealtimeEvent};

/// Client -> Server frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Initial handshake. Must be the first frame on a connection.
    Hello {
        protocol_version: String,
        token: String,
    },

    /// Join a channel's broadcast scope.
    Subscribe {
        channel: ChannelName,
    },

    /// Leave a channel's broadcast scope.
    Unsubscribe {
        channel: ChannelName,
    },

    /// Publish an event to a channel (fanned out to other subscribers).
    Publish {
        channel: ChannelName,
        #[serde(flatten)]
        event: EventKind,
    },
}

/// Server -> Client frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake acknowledgement. Carries the connection id the registry
    /// uses for origin exclusion.
    HelloAck {
        connection_id: Uuid,
        server_time: DateTime<Utc>,
    },

    Subscribed {
        channel: ChannelName,
    },

    Unsubscribed {
        channel: ChannelName,
    },

    /// An event on a channel this connection is subscribed to.
    Event {
        #[serde(flatten)]
        event: RealtimeEvent,
    },

    Error {
        code: String,
        message: String,
        retryable: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CURRENT_PROTOCOL_VERSION;

    #[test]
    fn hello_frame_round_trips() {
        let frame = ClientFrame::Hello {
            protocol_version: CURRENT_PROTOCOL_VERSION.to_string(),
            token: "tok-123".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"hello\""));
        let decoded: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn publish_frame_flattens_event() {
        let frame = ClientFrame::Publish {
            channel: ChannelName::page(Uuid::new_v4()),
            event: EventKind::BlockDeleted { block_id: Uuid::new_v4() },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "publish");
        assert_eq!(json["message"], "block_deleted");
    }

    #[test]
    fn error_frame_decodes() {
        let raw = r#"{"type":"error","code":"CHANNEL_FORBIDDEN","message":"denied","retryable":false}"#;
        let decoded: ServerFrame = serde_json::from_str(raw).unwrap();
        match decoded {
            ServerFrame::Error { code, retryable, .. } => {
                assert_eq!(code, "CHANNEL_FORBIDDEN");
                assert!(!retryable);
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }
}
