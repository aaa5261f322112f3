// Error taxonomy for the realtime layer.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the realtime client, reconciler, and mutation
/// coordinator.
///
/// Transport and reconnection failures stay inside the realtime client;
/// mutation failures propagate exactly one level to the caller that issued
/// the mutation. Nothing here should take down the hosting view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No or invalid credential at connect time. Fatal, no retry.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure. Retried with backoff inside the client.
    #[error("connection error: {0}")]
    Connection(String),

    /// The REST call backing an optimistic mutation was rejected.
    /// Local state has already been reverted when this is returned.
    #[error("mutation rejected: {0}")]
    MutationRejected(String),

    /// Inbound event payload did not decode for its declared type.
    /// The event is dropped; subsequent events keep flowing.
    #[error("malformed event on channel `{channel}`: {reason}")]
    MalformedEvent { channel: String, reason: String },

    /// Event referenced a resource not present locally and not resolvable
    /// by queued replay.
    #[error("unknown resource reference: {resource_id}")]
    UnknownResource { resource_id: Uuid },
}

impl SyncError {
    pub fn malformed(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent { channel: channel.into(), reason: reason.into() }
    }
}
