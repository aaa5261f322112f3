// Realtime event envelope and the closed set of event payloads.
//
// The `message` tag mirrors the broadcast envelope used by the REST layer's
// publish endpoint, so the same JSON travels over Redis-style fan-out and
// the WebSocket unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::channel::ChannelName;
use crate::types::{Block, BlockKind, Comment, CursorPosition, Page, PresenceStatus};

/// Partial update to a page. Absent fields are left untouched on merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    /// Full new ordering of the page's blocks (reorder broadcast).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_order: Option<Vec<Uuid>>,
}

/// Partial update to a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

/// Partial update to a comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
}

/// Partial update to a workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspacePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// The closed set of event payloads carried on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum EventKind {
    BlockCreated { block: Block },
    BlockUpdated { block_id: Uuid, fields: BlockPatch },
    BlockDeleted { block_id: Uuid },
    PageCreated { page: Page },
    PageUpdated { page_id: Uuid, fields: PagePatch },
    PageDeleted { page_id: Uuid },
    CommentCreated { comment: Comment },
    CommentUpdated { comment_id: Uuid, fields: CommentPatch },
    UserPresence { user_id: Uuid, status: PresenceStatus },
    TypingIndicator { user_id: Uuid, block_id: Uuid, is_typing: bool },
    CursorPosition { user_id: Uuid, cursor: CursorPosition },
    WorkspaceUpdated { workspace_id: Uuid, fields: WorkspacePatch },
}

impl EventKind {
    /// Presence, typing, and cursor signals are routed to ephemeral UI
    /// state and never merged into cached resources.
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            Self::UserPresence { .. } | Self::TypingIndicator { .. } | Self::CursorPosition { .. }
        )
    }
}

/// A single event as delivered to channel subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    pub channel: ChannelName,
    #[serde(flatten)]
    pub event: EventKind,
    /// Connection that originated the event, when known. The registry uses
    /// this to skip echoing the event back to its sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
    /// User that initiated the mutation, stamped by the publish endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}
