// Per-view session: one open page or workspace view.
//
// Pairs the channel subscription with the view's reconciler and mutation
// coordinator so the lifecycle cannot drift: opening subscribes, closing
// unsubscribes, discards pending mutations without reverting, and tears
// the reconciler down. A closed session never touches the client again.

use cahier_common::channel::ChannelName;
use cahier_common::error::SyncError;
use cahier_common::protocol::event::{EventKind, RealtimeEvent};
use cahier_common::types::{Block, Comment, CursorPosition, Page, PresenceStatus, Workspace};
use uuid::Uuid;

use crate::mutate::{EventPublisher, MutationCoordinator};
use crate::realtime::{ChannelTransport, RealtimeClient};
use crate::reconcile::{Outcome, Reconciler};

pub struct ViewSession {
    channel: ChannelName,
    reconciler: Reconciler,
    coordinator: MutationCoordinator,
    closed: bool,
}

impl ViewSession {
    /// Open a view on a channel, subscribing through the shared client.
    /// Several sessions may open the same channel; the client refcounts
    /// the wire subscription.
    pub fn open<T: ChannelTransport>(
        client: &mut RealtimeClient<T>,
        channel: ChannelName,
    ) -> Result<Self, SyncError> {
        client.subscribe(channel)?;
        Ok(Self {
            channel,
            reconciler: Reconciler::new(),
            coordinator: MutationCoordinator::new(),
            closed: false,
        })
    }

    pub fn channel(&self) -> ChannelName {
        self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Install the initial REST snapshot; events that raced the load are
    /// replayed inside.
    pub fn complete_load(
        &mut self,
        workspace: Option<Workspace>,
        pages: Vec<Page>,
        blocks: Vec<Block>,
        comments: Vec<Comment>,
    ) {
        self.reconciler.complete_load(
            workspace,
            pages,
            blocks,
            comments,
            self.coordinator.pending_mut(),
        );
    }

    /// Route one inbound event. Returns `None` for events on other
    /// channels; the caller fans each polled event across all open
    /// sessions.
    pub fn handle_event(&mut self, event: &RealtimeEvent) -> Option<Outcome> {
        if event.channel != self.channel {
            return None;
        }
        Some(self.reconciler.apply(event, self.coordinator.pending_mut()))
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Split borrow for driving mutations: the coordinator's methods take
    /// the reconciler separately.
    pub fn parts_mut(&mut self) -> (&mut Reconciler, &mut MutationCoordinator, ChannelName) {
        (&mut self.reconciler, &mut self.coordinator, self.channel)
    }

    // ── Ephemeral signals ───────────────────────────────────────────
    //
    // Published directly, no REST call, no pending entry, nothing to
    // revert. Best-effort by construction.

    pub fn announce_presence<P: EventPublisher>(
        &mut self,
        publisher: &mut P,
        user_id: Uuid,
        status: PresenceStatus,
    ) -> Result<(), SyncError> {
        publisher.publish(self.channel, EventKind::UserPresence { user_id, status })
    }

    pub fn announce_typing<P: EventPublisher>(
        &mut self,
        publisher: &mut P,
        user_id: Uuid,
        block_id: Uuid,
        is_typing: bool,
    ) -> Result<(), SyncError> {
        publisher.publish(self.channel, EventKind::TypingIndicator { user_id, block_id, is_typing })
    }

    pub fn announce_cursor<P: EventPublisher>(
        &mut self,
        publisher: &mut P,
        user_id: Uuid,
        cursor: CursorPosition,
    ) -> Result<(), SyncError> {
        publisher.publish(self.channel, EventKind::CursorPosition { user_id, cursor })
    }

    /// Close the view: drop the channel reference, discard in-flight
    /// mutations without reverting, and tear down the reconciler so any
    /// straggler events are dropped.
    pub fn close<T: ChannelTransport>(
        &mut self,
        client: &mut RealtimeClient<T>,
    ) -> Result<(), SyncError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.coordinator.discard_all();
        self.reconciler.teardown();
        client.unsubscribe(self.channel)
    }
}
