// Optimistic mutation coordinator.
//
// Every local edit goes through three steps: snapshot-and-apply (stage),
// the REST call, then commit or reject. Staging applies the new value to
// the reconciler immediately and records a pending entry per touched
// field; commit resolves those entries against the server's canonical
// resource and publishes the event other subscribers converge on; reject
// reverts each field that was not superseded in the meantime.
//
// The stage/commit/reject split exists because REST completions arrive in
// any order relative to newer edits of the same field. A completion whose
// pending entry was superseded must neither revert nor re-publish; the
// newer mutation owns the field now.

pub mod pending;

use tracing::warn;
use uuid::Uuid;

use cahier_common::channel::ChannelName;
use cahier_common::error::SyncError;
use cahier_common::protocol::event::{
    BlockPatch, CommentPatch, EventKind, PagePatch, WorkspacePatch,
};
use cahier_common::types::{Block, Comment, Page, Workspace};
use chrono::Utc;

use crate::realtime::{ChannelTransport, RealtimeClient};
use crate::reconcile::tree::PageNode;
use crate::reconcile::Reconciler;
use pending::{Field, PendingMutation, PendingSet};

// ── Collaborator traits ─────────────────────────────────────────────

/// A rejected REST call: the `{success: false, message}` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// The CRUD layer the coordinator persists through. Implemented over
/// HTTP in the embedding shell; mocked in tests.
pub trait WorkspaceApi {
    fn create_block(&mut self, block: &Block) -> Result<Block, ApiError>;
    fn update_block(&mut self, block_id: Uuid, patch: &BlockPatch) -> Result<Block, ApiError>;
    fn delete_block(&mut self, block_id: Uuid) -> Result<(), ApiError>;
    fn reorder_blocks(&mut self, page_id: Uuid, order: &[Uuid]) -> Result<Vec<Uuid>, ApiError>;
    fn create_page(&mut self, page: &Page) -> Result<Page, ApiError>;
    fn update_page(&mut self, page_id: Uuid, patch: &PagePatch) -> Result<Page, ApiError>;
    fn delete_page(&mut self, page_id: Uuid) -> Result<(), ApiError>;
    fn create_comment(&mut self, comment: &Comment) -> Result<Comment, ApiError>;
    fn update_comment(
        &mut self,
        comment_id: Uuid,
        patch: &CommentPatch,
    ) -> Result<Comment, ApiError>;
    fn update_workspace(
        &mut self,
        workspace_id: Uuid,
        patch: &WorkspacePatch,
    ) -> Result<Workspace, ApiError>;
}

/// Where confirmed mutations are broadcast so other subscribers converge.
pub trait EventPublisher {
    fn publish(&mut self, channel: ChannelName, event: EventKind) -> Result<(), SyncError>;
}

impl<T: ChannelTransport> EventPublisher for RealtimeClient<T> {
    fn publish(&mut self, channel: ChannelName, event: EventKind) -> Result<(), SyncError> {
        RealtimeClient::publish(self, channel, event)
    }
}

// ── Staged mutations ────────────────────────────────────────────────

/// A field update that has been optimistically applied and awaits its
/// REST completion. `previous` holds the pre-mutation values of exactly
/// the staged fields, for revert.
#[derive(Debug, Clone)]
pub struct StagedUpdate<P> {
    pub resource_id: Uuid,
    channel: ChannelName,
    entries: Vec<(Field, Uuid)>,
    previous: P,
}

/// A staged wholesale reorder of a page's blocks.
#[derive(Debug, Clone)]
pub struct StagedReorder {
    pub page_id: Uuid,
    channel: ChannelName,
    mutation_id: Uuid,
    previous: Vec<Uuid>,
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Drives optimistic mutations for one view and owns its pending set.
#[derive(Debug, Default)]
pub struct MutationCoordinator {
    pending: PendingSet,
}

impl MutationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// The reconciler consults (and consumes) pending entries while
    /// applying inbound events.
    pub fn pending_mut(&mut self) -> &mut PendingSet {
        &mut self.pending
    }

    /// Drop every pending entry without reverting. Used on view teardown,
    /// where the cached state is discarded wholesale anyway.
    pub fn discard_all(&mut self) {
        self.pending.discard_all();
    }

    // ── Block updates ───────────────────────────────────────────────

    /// Apply a block patch optimistically and record it as pending.
    /// Supersedes any earlier pending edit of the same fields; the
    /// superseded edits are not reverted.
    pub fn stage_block_update(
        &mut self,
        reconciler: &mut Reconciler,
        channel: ChannelName,
        block_id: Uuid,
        patch: &BlockPatch,
    ) -> Result<StagedUpdate<BlockPatch>, SyncError> {
        let Some(block) = reconciler.block(block_id) else {
            return Err(SyncError::UnknownResource { resource_id: block_id });
        };
        let fields = block_fields(patch);
        let previous = block_snapshot(block, &fields);
        let entries = self.record_all(block_id, &fields);
        reconciler.force_block_patch(block_id, patch);
        Ok(StagedUpdate { resource_id: block_id, channel, entries, previous })
    }

    /// Resolve a staged block update against the server's canonical block.
    /// Fields still pending adopt the server value and are broadcast;
    /// superseded fields are left to the newer mutation.
    pub fn commit_block_update<P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        publisher: &mut P,
        staged: &StagedUpdate<BlockPatch>,
        server: &Block,
    ) -> Result<(), SyncError> {
        let mut confirmed = BlockPatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                block_field_from(&mut confirmed, server, *field);
            }
        }
        if confirmed == BlockPatch::default() {
            return Ok(());
        }
        reconciler.force_block_patch(staged.resource_id, &confirmed);
        self.broadcast(
            publisher,
            staged.channel,
            EventKind::BlockUpdated { block_id: staged.resource_id, fields: confirmed },
        );
        Ok(())
    }

    /// Revert a rejected block update. Only fields whose pending entry is
    /// still ours are restored.
    pub fn reject_block_update(
        &mut self,
        reconciler: &mut Reconciler,
        staged: &StagedUpdate<BlockPatch>,
        error: ApiError,
    ) -> SyncError {
        let mut revert = BlockPatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                block_patch_field(&mut revert, &staged.previous, *field);
            }
        }
        reconciler.force_block_patch(staged.resource_id, &revert);
        SyncError::MutationRejected(error.message)
    }

    pub fn update_block<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        block_id: Uuid,
        patch: &BlockPatch,
    ) -> Result<(), SyncError> {
        let staged = self.stage_block_update(reconciler, channel, block_id, patch)?;
        match api.update_block(block_id, patch) {
            Ok(server) => self.commit_block_update(reconciler, publisher, &staged, &server),
            Err(error) => Err(self.reject_block_update(reconciler, &staged, error)),
        }
    }

    // ── Block create / delete ───────────────────────────────────────

    pub fn create_block<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        block: Block,
    ) -> Result<(), SyncError> {
        let block_id = block.id;
        reconciler.insert_block(block.clone());
        match api.create_block(&block) {
            Ok(server) => {
                // Adopt the server copy (authoritative timestamps).
                reconciler.remove_block(block_id);
                reconciler.insert_block(server.clone());
                self.broadcast(publisher, channel, EventKind::BlockCreated { block: server });
                Ok(())
            }
            Err(error) => {
                reconciler.remove_block(block_id);
                Err(SyncError::MutationRejected(error.message))
            }
        }
    }

    pub fn delete_block<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        block_id: Uuid,
    ) -> Result<(), SyncError> {
        let Some(removed) = reconciler.remove_block(block_id) else {
            return Err(SyncError::UnknownResource { resource_id: block_id });
        };
        match api.delete_block(block_id) {
            Ok(()) => {
                self.broadcast(publisher, channel, EventKind::BlockDeleted { block_id });
                Ok(())
            }
            Err(error) => {
                reconciler.insert_block(removed);
                Err(SyncError::MutationRejected(error.message))
            }
        }
    }

    // ── Block reorder ───────────────────────────────────────────────

    /// Reorder is staged wholesale: one pending entry on the page's
    /// block_order field, reverted as a unit on rejection.
    pub fn stage_reorder(
        &mut self,
        reconciler: &mut Reconciler,
        channel: ChannelName,
        page_id: Uuid,
        order: &[Uuid],
    ) -> StagedReorder {
        let previous = reconciler.block_order();
        let mutation_id = Uuid::new_v4();
        self.pending.record(PendingMutation {
            mutation_id,
            resource_id: page_id,
            field: Field::BlockOrder,
            issued_at: Utc::now(),
        });
        reconciler.apply_block_order(order);
        StagedReorder { page_id, channel, mutation_id, previous }
    }

    pub fn commit_reorder<P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        publisher: &mut P,
        staged: &StagedReorder,
        server_order: &[Uuid],
    ) -> Result<(), SyncError> {
        if self
            .pending
            .resolve(staged.page_id, Field::BlockOrder, staged.mutation_id)
            .is_none()
        {
            return Ok(());
        }
        reconciler.apply_block_order(server_order);
        self.broadcast(
            publisher,
            staged.channel,
            EventKind::PageUpdated {
                page_id: staged.page_id,
                fields: PagePatch {
                    block_order: Some(server_order.to_vec()),
                    ..Default::default()
                },
            },
        );
        Ok(())
    }

    pub fn reject_reorder(
        &mut self,
        reconciler: &mut Reconciler,
        staged: &StagedReorder,
        error: ApiError,
    ) -> SyncError {
        if self
            .pending
            .resolve(staged.page_id, Field::BlockOrder, staged.mutation_id)
            .is_some()
        {
            reconciler.apply_block_order(&staged.previous);
        }
        SyncError::MutationRejected(error.message)
    }

    pub fn reorder_blocks<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        page_id: Uuid,
        order: &[Uuid],
    ) -> Result<(), SyncError> {
        let staged = self.stage_reorder(reconciler, channel, page_id, order);
        match api.reorder_blocks(page_id, order) {
            Ok(server_order) => {
                self.commit_reorder(reconciler, publisher, &staged, &server_order)
            }
            Err(error) => Err(self.reject_reorder(reconciler, &staged, error)),
        }
    }

    // ── Page updates ────────────────────────────────────────────────

    pub fn stage_page_update(
        &mut self,
        reconciler: &mut Reconciler,
        channel: ChannelName,
        page_id: Uuid,
        patch: &PagePatch,
    ) -> Result<StagedUpdate<PagePatch>, SyncError> {
        let Some(page) = reconciler.pages().get(page_id) else {
            return Err(SyncError::UnknownResource { resource_id: page_id });
        };
        let fields = page_fields(patch);
        let previous = page_snapshot(page, &fields);
        let entries = self.record_all(page_id, &fields);
        reconciler.force_page_patch(page_id, patch);
        Ok(StagedUpdate { resource_id: page_id, channel, entries, previous })
    }

    pub fn commit_page_update<P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        publisher: &mut P,
        staged: &StagedUpdate<PagePatch>,
        server: &Page,
    ) -> Result<(), SyncError> {
        let mut confirmed = PagePatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                page_field_from(&mut confirmed, server, *field);
            }
        }
        if confirmed == PagePatch::default() {
            return Ok(());
        }
        reconciler.force_page_patch(staged.resource_id, &confirmed);
        self.broadcast(
            publisher,
            staged.channel,
            EventKind::PageUpdated { page_id: staged.resource_id, fields: confirmed },
        );
        Ok(())
    }

    pub fn reject_page_update(
        &mut self,
        reconciler: &mut Reconciler,
        staged: &StagedUpdate<PagePatch>,
        error: ApiError,
    ) -> SyncError {
        let mut revert = PagePatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                page_patch_field(&mut revert, &staged.previous, *field);
            }
        }
        reconciler.force_page_patch(staged.resource_id, &revert);
        SyncError::MutationRejected(error.message)
    }

    pub fn update_page<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        page_id: Uuid,
        patch: &PagePatch,
    ) -> Result<(), SyncError> {
        let staged = self.stage_page_update(reconciler, channel, page_id, patch)?;
        match api.update_page(page_id, patch) {
            Ok(server) => self.commit_page_update(reconciler, publisher, &staged, &server),
            Err(error) => Err(self.reject_page_update(reconciler, &staged, error)),
        }
    }

    // ── Page create / delete ────────────────────────────────────────

    pub fn create_page<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        page: Page,
    ) -> Result<(), SyncError> {
        let page_id = page.id;
        reconciler.insert_page(page.clone());
        match api.create_page(&page) {
            Ok(server) => {
                reconciler.remove_page_subtree(page_id);
                reconciler.insert_page(server.clone());
                self.broadcast(publisher, channel, EventKind::PageCreated { page: server });
                Ok(())
            }
            Err(error) => {
                reconciler.remove_page_subtree(page_id);
                Err(SyncError::MutationRejected(error.message))
            }
        }
    }

    pub fn delete_page<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        page_id: Uuid,
    ) -> Result<(), SyncError> {
        let Some(removed) = reconciler.remove_page_subtree(page_id) else {
            return Err(SyncError::UnknownResource { resource_id: page_id });
        };
        match api.delete_page(page_id) {
            Ok(()) => {
                self.broadcast(publisher, channel, EventKind::PageDeleted { page_id });
                Ok(())
            }
            Err(error) => {
                restore_subtree(reconciler, removed);
                Err(SyncError::MutationRejected(error.message))
            }
        }
    }

    // ── Comments ────────────────────────────────────────────────────

    pub fn create_comment<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        comment: Comment,
    ) -> Result<(), SyncError> {
        let comment_id = comment.id;
        reconciler.insert_comment(comment.clone());
        match api.create_comment(&comment) {
            Ok(server) => {
                // Adopt the server copy (authoritative timestamps).
                reconciler.remove_comment(comment_id);
                reconciler.insert_comment(server.clone());
                self.broadcast(publisher, channel, EventKind::CommentCreated { comment: server });
                Ok(())
            }
            Err(error) => {
                reconciler.remove_comment(comment_id);
                Err(SyncError::MutationRejected(error.message))
            }
        }
    }

    pub fn stage_comment_update(
        &mut self,
        reconciler: &mut Reconciler,
        channel: ChannelName,
        comment_id: Uuid,
        patch: &CommentPatch,
    ) -> Result<StagedUpdate<CommentPatch>, SyncError> {
        let Some(comment) = reconciler.comment(comment_id) else {
            return Err(SyncError::UnknownResource { resource_id: comment_id });
        };
        let fields = comment_fields(patch);
        let previous = comment_snapshot(comment, &fields);
        let entries = self.record_all(comment_id, &fields);
        reconciler.force_comment_patch(comment_id, patch);
        Ok(StagedUpdate { resource_id: comment_id, channel, entries, previous })
    }

    pub fn commit_comment_update<P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        publisher: &mut P,
        staged: &StagedUpdate<CommentPatch>,
        server: &Comment,
    ) -> Result<(), SyncError> {
        let mut confirmed = CommentPatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                comment_field_from(&mut confirmed, server, *field);
            }
        }
        if confirmed == CommentPatch::default() {
            return Ok(());
        }
        reconciler.force_comment_patch(staged.resource_id, &confirmed);
        self.broadcast(
            publisher,
            staged.channel,
            EventKind::CommentUpdated { comment_id: staged.resource_id, fields: confirmed },
        );
        Ok(())
    }

    pub fn reject_comment_update(
        &mut self,
        reconciler: &mut Reconciler,
        staged: &StagedUpdate<CommentPatch>,
        error: ApiError,
    ) -> SyncError {
        let mut revert = CommentPatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                comment_patch_field(&mut revert, &staged.previous, *field);
            }
        }
        reconciler.force_comment_patch(staged.resource_id, &revert);
        SyncError::MutationRejected(error.message)
    }

    pub fn update_comment<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        comment_id: Uuid,
        patch: &CommentPatch,
    ) -> Result<(), SyncError> {
        let staged = self.stage_comment_update(reconciler, channel, comment_id, patch)?;
        match api.update_comment(comment_id, patch) {
            Ok(server) => self.commit_comment_update(reconciler, publisher, &staged, &server),
            Err(error) => Err(self.reject_comment_update(reconciler, &staged, error)),
        }
    }

    // ── Workspace updates ───────────────────────────────────────────

    pub fn stage_workspace_update(
        &mut self,
        reconciler: &mut Reconciler,
        channel: ChannelName,
        workspace_id: Uuid,
        patch: &WorkspacePatch,
    ) -> Result<StagedUpdate<WorkspacePatch>, SyncError> {
        let Some(workspace) = reconciler.workspace().filter(|w| w.id == workspace_id) else {
            return Err(SyncError::UnknownResource { resource_id: workspace_id });
        };
        let fields = workspace_fields(patch);
        let previous = workspace_snapshot(workspace, &fields);
        let entries = self.record_all(workspace_id, &fields);
        reconciler.force_workspace_patch(patch);
        Ok(StagedUpdate { resource_id: workspace_id, channel, entries, previous })
    }

    pub fn commit_workspace_update<P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        publisher: &mut P,
        staged: &StagedUpdate<WorkspacePatch>,
        server: &Workspace,
    ) -> Result<(), SyncError> {
        let mut confirmed = WorkspacePatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                workspace_field_from(&mut confirmed, server, *field);
            }
        }
        if confirmed == WorkspacePatch::default() {
            return Ok(());
        }
        reconciler.force_workspace_patch(&confirmed);
        self.broadcast(
            publisher,
            staged.channel,
            EventKind::WorkspaceUpdated {
                workspace_id: staged.resource_id,
                fields: confirmed,
            },
        );
        Ok(())
    }

    pub fn reject_workspace_update(
        &mut self,
        reconciler: &mut Reconciler,
        staged: &StagedUpdate<WorkspacePatch>,
        error: ApiError,
    ) -> SyncError {
        let mut revert = WorkspacePatch::default();
        for (field, mutation_id) in &staged.entries {
            if self.pending.resolve(staged.resource_id, *field, *mutation_id).is_some() {
                workspace_patch_field(&mut revert, &staged.previous, *field);
            }
        }
        reconciler.force_workspace_patch(&revert);
        SyncError::MutationRejected(error.message)
    }

    pub fn update_workspace<A: WorkspaceApi, P: EventPublisher>(
        &mut self,
        reconciler: &mut Reconciler,
        api: &mut A,
        publisher: &mut P,
        channel: ChannelName,
        workspace_id: Uuid,
        patch: &WorkspacePatch,
    ) -> Result<(), SyncError> {
        let staged = self.stage_workspace_update(reconciler, channel, workspace_id, patch)?;
        match api.update_workspace(workspace_id, patch) {
            Ok(server) => self.commit_workspace_update(reconciler, publisher, &staged, &server),
            Err(error) => Err(self.reject_workspace_update(reconciler, &staged, error)),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn record_all(&mut self, resource_id: Uuid, fields: &[Field]) -> Vec<(Field, Uuid)> {
        let issued_at = Utc::now();
        fields
            .iter()
            .map(|field| {
                let mutation_id = Uuid::new_v4();
                self.pending.record(PendingMutation {
                    mutation_id,
                    resource_id,
                    field: *field,
                    issued_at,
                });
                (*field, mutation_id)
            })
            .collect()
    }

    /// The REST write already succeeded; a publish failure only delays
    /// other subscribers until their next load, so it is logged, not
    /// propagated.
    fn broadcast<P: EventPublisher>(
        &mut self,
        publisher: &mut P,
        channel: ChannelName,
        event: EventKind,
    ) {
        if let Err(error) = publisher.publish(channel, event) {
            warn!(%channel, %error, "failed to broadcast confirmed mutation");
        }
    }
}

fn restore_subtree(reconciler: &mut Reconciler, node: PageNode) {
    // Parent-first so children reattach under their restored parent.
    reconciler.insert_page(node.page);
    for child in node.children {
        restore_subtree(reconciler, child);
    }
}

// ── Field plumbing ──────────────────────────────────────────────────

fn block_fields(patch: &BlockPatch) -> Vec<Field> {
    let mut fields = Vec::new();
    if patch.kind.is_some() {
        fields.push(Field::Kind);
    }
    if patch.content.is_some() {
        fields.push(Field::Content);
    }
    if patch.position.is_some() {
        fields.push(Field::Position);
    }
    fields
}

fn block_snapshot(block: &Block, fields: &[Field]) -> BlockPatch {
    let mut snapshot = BlockPatch::default();
    for field in fields {
        block_field_from(&mut snapshot, block, *field);
    }
    snapshot
}

fn block_field_from(patch: &mut BlockPatch, source: &Block, field: Field) {
    match field {
        Field::Kind => patch.kind = Some(source.kind),
        Field::Content => patch.content = Some(source.content.clone()),
        Field::Position => patch.position = Some(source.position),
        _ => {}
    }
}

fn block_patch_field(into: &mut BlockPatch, from: &BlockPatch, field: Field) {
    match field {
        Field::Kind => into.kind = from.kind,
        Field::Content => into.content = from.content.clone(),
        Field::Position => into.position = from.position,
        _ => {}
    }
}

fn page_fields(patch: &PagePatch) -> Vec<Field> {
    let mut fields = Vec::new();
    if patch.title.is_some() {
        fields.push(Field::Title);
    }
    if patch.icon.is_some() {
        fields.push(Field::Icon);
    }
    if patch.parent_id.is_some() {
        fields.push(Field::ParentId);
    }
    if patch.position.is_some() {
        fields.push(Field::Position);
    }
    fields
}

fn page_snapshot(page: &Page, fields: &[Field]) -> PagePatch {
    let mut snapshot = PagePatch::default();
    for field in fields {
        page_field_from(&mut snapshot, page, *field);
    }
    snapshot
}

fn page_field_from(patch: &mut PagePatch, source: &Page, field: Field) {
    match field {
        Field::Title => patch.title = Some(source.title.clone()),
        Field::Icon => patch.icon = source.icon.clone(),
        Field::ParentId => patch.parent_id = source.parent_id,
        Field::Position => patch.position = Some(source.position),
        _ => {}
    }
}

fn page_patch_field(into: &mut PagePatch, from: &PagePatch, field: Field) {
    match field {
        Field::Title => into.title = from.title.clone(),
        Field::Icon => into.icon = from.icon.clone(),
        Field::ParentId => into.parent_id = from.parent_id,
        Field::Position => into.position = from.position,
        _ => {}
    }
}

fn comment_fields(patch: &CommentPatch) -> Vec<Field> {
    let mut fields = Vec::new();
    if patch.body.is_some() {
        fields.push(Field::Body);
    }
    if patch.resolved.is_some() {
        fields.push(Field::Resolved);
    }
    fields
}

fn comment_snapshot(comment: &Comment, fields: &[Field]) -> CommentPatch {
    let mut snapshot = CommentPatch::default();
    for field in fields {
        comment_field_from(&mut snapshot, comment, *field);
    }
    snapshot
}

fn comment_field_from(patch: &mut CommentPatch, source: &Comment, field: Field) {
    match field {
        Field::Body => patch.body = Some(source.body.clone()),
        Field::Resolved => patch.resolved = Some(source.resolved),
        _ => {}
    }
}

fn comment_patch_field(into: &mut CommentPatch, from: &CommentPatch, field: Field) {
    match field {
        Field::Body => into.body = from.body.clone(),
        Field::Resolved => into.resolved = from.resolved,
        _ => {}
    }
}

fn workspace_fields(patch: &WorkspacePatch) -> Vec<Field> {
    let mut fields = Vec::new();
    if patch.name.is_some() {
        fields.push(Field::Name);
    }
    if patch.slug.is_some() {
        fields.push(Field::Slug);
    }
    fields
}

fn workspace_snapshot(workspace: &Workspace, fields: &[Field]) -> WorkspacePatch {
    let mut snapshot = WorkspacePatch::default();
    for field in fields {
        workspace_field_from(&mut snapshot, workspace, *field);
    }
    snapshot
}

fn workspace_field_from(patch: &mut WorkspacePatch, source: &Workspace, field: Field) {
    match field {
        Field::Name => patch.name = Some(source.name.clone()),
        Field::Slug => patch.slug = Some(source.slug.clone()),
        _ => {}
    }
}

fn workspace_patch_field(into: &mut WorkspacePatch, from: &WorkspacePatch, field: Field) {
    match field {
        Field::Name => into.name = from.name.clone(),
        Field::Slug => into.slug = from.slug.clone(),
        _ => {}
    }
}
