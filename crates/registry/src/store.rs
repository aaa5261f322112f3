// Live connection registry: who is connected and what they listen to.
//
// One record per WebSocket connection. Fan-out enqueues to every
// subscriber while still holding the read lock: sends are non-blocking
// unbounded-channel pushes, and holding the lock keeps concurrent
// broadcasts on one channel in a single delivery order for all
// subscribers. A send failure means the connection's writer task is gone
// and the reader loop will clean up.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use cahier_common::channel::ChannelName;
use cahier_common::protocol::event::{EventKind, RealtimeEvent};
use cahier_common::protocol::ws::ServerFrame;

#[derive(Debug, Clone)]
struct ConnectionRecord {
    user_id: Uuid,
    subscriptions: HashSet<ChannelName>,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionStore {
    connections: Arc<RwLock<HashMap<Uuid, ConnectionRecord>>>,
}

impl ConnectionStore {
    pub async fn register(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        outbound: mpsc::UnboundedSender<ServerFrame>,
    ) {
        let mut guard = self.connections.write().await;
        guard.insert(
            connection_id,
            ConnectionRecord { user_id, subscriptions: HashSet::new(), outbound },
        );
    }

    pub async fn unregister(&self, connection_id: Uuid) {
        self.connections.write().await.remove(&connection_id);
    }

    pub async fn user_for(&self, connection_id: Uuid) -> Option<Uuid> {
        self.connections.read().await.get(&connection_id).map(|record| record.user_id)
    }

    /// Idempotent: subscribing twice is one subscription.
    pub async fn subscribe(&self, connection_id: Uuid, channel: ChannelName) -> bool {
        let mut guard = self.connections.write().await;
        match guard.get_mut(&connection_id) {
            Some(record) => {
                record.subscriptions.insert(channel);
                true
            }
            None => false,
        }
    }

    pub async fn unsubscribe(&self, connection_id: Uuid, channel: ChannelName) -> bool {
        let mut guard = self.connections.write().await;
        match guard.get_mut(&connection_id) {
            Some(record) => {
                record.subscriptions.remove(&channel);
                true
            }
            None => false,
        }
    }

    pub async fn is_subscribed(&self, connection_id: Uuid, channel: ChannelName) -> bool {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .map(|record| record.subscriptions.contains(&channel))
            .unwrap_or(false)
    }

    /// Deliver an event to every subscriber of its channel, skipping the
    /// originating connection. Returns the delivered count.
    pub async fn broadcast(&self, event: RealtimeEvent) -> usize {
        let guard = self.connections.read().await;
        let mut sent_count = 0;
        for (connection_id, record) in guard.iter() {
            if Some(*connection_id) == event.origin {
                continue;
            }
            if !record.subscriptions.contains(&event.channel) {
                continue;
            }
            if record.outbound.send(ServerFrame::Event { event: event.clone() }).is_ok() {
                sent_count += 1;
            } else {
                debug!(%connection_id, "dropping event for closed connection");
            }
        }
        sent_count
    }

    /// Assemble the broadcast envelope for an inbound publish, stamping
    /// origin, sender, and the server timestamp.
    pub fn envelope(
        channel: ChannelName,
        event: EventKind,
        origin: Option<Uuid>,
        sender_id: Option<Uuid>,
    ) -> RealtimeEvent {
        RealtimeEvent { channel, event, origin, sender_id, timestamp: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cahier_common::types::PresenceStatus;
    use tokio::sync::mpsc::unbounded_channel;

    fn presence_event(channel: ChannelName, origin: Option<Uuid>) -> RealtimeEvent {
        ConnectionStore::envelope(
            channel,
            EventKind::UserPresence { user_id: Uuid::new_v4(), status: PresenceStatus::Online },
            origin,
            None,
        )
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let store = ConnectionStore::default();
        let channel = ChannelName::page(Uuid::new_v4());

        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());
        store.register(conn_a, Uuid::new_v4(), tx_a).await;
        store.register(conn_b, Uuid::new_v4(), tx_b).await;
        store.subscribe(conn_a, channel).await;
        store.subscribe(conn_b, channel).await;

        let delivered = store.broadcast(presence_event(channel, None)).await;
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_excludes_the_originating_connection() {
        let store = ConnectionStore::default();
        let channel = ChannelName::page(Uuid::new_v4());

        let (tx_origin, mut rx_origin) = unbounded_channel();
        let (tx_other, mut rx_other) = unbounded_channel();
        let (conn_origin, conn_other) = (Uuid::new_v4(), Uuid::new_v4());
        store.register(conn_origin, Uuid::new_v4(), tx_origin).await;
        store.register(conn_other, Uuid::new_v4(), tx_other).await;
        store.subscribe(conn_origin, channel).await;
        store.subscribe(conn_other, channel).await;

        let delivered = store.broadcast(presence_event(channel, Some(conn_origin))).await;
        assert_eq!(delivered, 1);
        assert!(rx_origin.try_recv().is_err());
        assert!(rx_other.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_skips_other_channels() {
        let store = ConnectionStore::default();
        let (tx, mut rx) = unbounded_channel();
        let conn = Uuid::new_v4();
        store.register(conn, Uuid::new_v4(), tx).await;
        store.subscribe(conn, ChannelName::page(Uuid::new_v4())).await;

        let delivered =
            store.broadcast(presence_event(ChannelName::page(Uuid::new_v4()), None)).await;
        assert_eq!(delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcasts_deliver_in_publish_order_to_every_subscriber() {
        let store = ConnectionStore::default();
        let channel = ChannelName::page(Uuid::new_v4());

        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());
        store.register(conn_a, Uuid::new_v4(), tx_a).await;
        store.register(conn_b, Uuid::new_v4(), tx_b).await;
        store.subscribe(conn_a, channel).await;
        store.subscribe(conn_b, channel).await;

        let (first_id, second_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .broadcast(ConnectionStore::envelope(
                channel,
                EventKind::BlockDeleted { block_id: first_id },
                None,
                None,
            ))
            .await;
        store
            .broadcast(ConnectionStore::envelope(
                channel,
                EventKind::BlockDeleted { block_id: second_id },
                None,
                None,
            ))
            .await;

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in [first_id, second_id] {
                match rx.try_recv().expect("event delivered") {
                    ServerFrame::Event { event } => match event.event {
                        EventKind::BlockDeleted { block_id } => assert_eq!(block_id, expected),
                        other => panic!("expected block_deleted, got {other:?}"),
                    },
                    other => panic!("expected event frame, got {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let store = ConnectionStore::default();
        let channel = ChannelName::workspace(Uuid::new_v4());
        let (tx, mut rx) = unbounded_channel();
        let conn = Uuid::new_v4();
        store.register(conn, Uuid::new_v4(), tx).await;

        assert!(store.subscribe(conn, channel).await);
        assert!(store.subscribe(conn, channel).await);

        let delivered = store.broadcast(presence_event(channel, None)).await;
        assert_eq!(delivered, 1);
        rx.try_recv().expect("one copy");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregistered_connection_receives_nothing() {
        let store = ConnectionStore::default();
        let channel = ChannelName::page(Uuid::new_v4());
        let (tx, mut rx) = unbounded_channel();
        let conn = Uuid::new_v4();
        store.register(conn, Uuid::new_v4(), tx).await;
        store.subscribe(conn, channel).await;
        store.unregister(conn).await;

        let delivered = store.broadcast(presence_event(channel, None)).await;
        assert_eq!(delivered, 0);
        assert!(rx.try_recv().is_err());
    }
}
