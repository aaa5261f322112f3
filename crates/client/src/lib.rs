// Cahier realtime client core.
//
// Three pieces cooperate to keep a view of a shared workspace live:
//
//   - `realtime`: one WebSocket-style connection per browsing session,
//     multiplexing channel subscriptions, with automatic reconnection.
//   - `reconcile`: applies inbound channel events to locally cached
//     resource state, resolving against in-flight optimistic mutations.
//   - `mutate`: wraps locally-initiated edits in an optimistic-apply /
//     confirm-or-revert protocol against the REST API.
//
// All of it runs on a single logical thread; REST calls and the connect
// handshake are the only suspension points.

pub mod config;
pub mod mutate;
pub mod realtime;
pub mod reconcile;
pub mod view;
