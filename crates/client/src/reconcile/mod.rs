// Event reconciler: applies inbound channel events to local state.
//
// Owns the per-view resource snapshot (page tree, ordered blocks,
// comments, workspace header) plus the ephemeral presence map. Decides
// precedence when an inbound event and an in-flight optimistic mutation
// touch the same field; see `PendingSet::admit_event`.
//
// Events that arrive before the initial REST load completes are queued
// and replayed once `complete_load` runs, or dropped when the view has
// been torn down in the meantime.

pub mod presence;
pub mod tree;

use std::collections::VecDeque;

use tracing::debug;
use uuid::Uuid;

use cahier_common::protocol::event::{
    BlockPatch, CommentPatch, EventKind, PagePatch, RealtimeEvent, WorkspacePatch,
};
use cahier_common::types::{Block, Comment, Page, Workspace};

use crate::mutate::pending::{Field, PendingSet};
use presence::PresenceMap;
use tree::PageTree;

/// What the reconciler did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Merged into local state.
    Applied,
    /// Entity already present; create was a no-op.
    Deduped,
    /// Initial load not finished; queued for replay.
    Queued,
    /// Referenced a resource not present locally; state unchanged.
    Unknown,
    /// View torn down; event discarded.
    Dropped,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    workspace: Option<Workspace>,
    pages: PageTree,
    /// Blocks of the open page, ordered by position.
    blocks: Vec<Block>,
    comments: Vec<Comment>,
    presence: PresenceMap,
    selected_block: Option<Uuid>,
    selected_page: Option<Uuid>,
    loaded: bool,
    torn_down: bool,
    queued: VecDeque<RealtimeEvent>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Install the initial REST snapshot and replay any events that
    /// arrived while the load was in flight.
    pub fn complete_load(
        &mut self,
        workspace: Option<Workspace>,
        pages: Vec<Page>,
        blocks: Vec<Block>,
        comments: Vec<Comment>,
        pending: &mut PendingSet,
    ) {
        self.workspace = workspace;
        self.pages = PageTree::new();
        for page in pages {
            self.pages.insert(page);
        }
        self.blocks = blocks;
        self.sort_blocks();
        self.comments = comments;
        self.loaded = true;

        let queued: Vec<RealtimeEvent> = self.queued.drain(..).collect();
        if !queued.is_empty() {
            debug!(count = queued.len(), "replaying events queued during initial load");
        }
        for event in queued {
            self.apply(&event, pending);
        }
    }

    /// Mark the view gone. Queued events are discarded and presence is
    /// cleared; later events are dropped rather than queued.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.queued.clear();
        self.presence.clear();
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn pages(&self) -> &PageTree {
        &self.pages
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: Uuid) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comment(&self, id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.id == id)
    }

    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    pub fn select_block(&mut self, id: Option<Uuid>) {
        self.selected_block = id;
    }

    pub fn selected_block(&self) -> Option<Uuid> {
        self.selected_block
    }

    pub fn select_page(&mut self, id: Option<Uuid>) {
        self.selected_page = id;
    }

    pub fn selected_page(&self) -> Option<Uuid> {
        self.selected_page
    }

    /// Current block ordering, used to snapshot before a reorder.
    pub fn block_order(&self) -> Vec<Uuid> {
        self.blocks.iter().map(|block| block.id).collect()
    }

    // ── Event application ───────────────────────────────────────────

    /// Apply one inbound event. Never panics on unknown references; the
    /// outcome tells the caller what happened.
    pub fn apply(&mut self, event: &RealtimeEvent, pending: &mut PendingSet) -> Outcome {
        if self.torn_down {
            return Outcome::Dropped;
        }

        // Presence signals bypass the load gate: they reference no cached
        // resource and are useful the moment the view opens.
        match &event.event {
            EventKind::UserPresence { user_id, status } => {
                self.presence.set_status(*user_id, *status, event.timestamp);
                return Outcome::Applied;
            }
            EventKind::TypingIndicator { user_id, block_id, is_typing } => {
                self.presence.set_typing(*user_id, *block_id, *is_typing, event.timestamp);
                return Outcome::Applied;
            }
            EventKind::CursorPosition { user_id, cursor } => {
                self.presence.set_cursor(*user_id, cursor.clone(), event.timestamp);
                return Outcome::Applied;
            }
            _ => {}
        }

        if !self.loaded {
            self.queued.push_back(event.clone());
            return Outcome::Queued;
        }

        match &event.event {
            EventKind::BlockCreated { block } => {
                if self.insert_block(block.clone()) {
                    Outcome::Applied
                } else {
                    Outcome::Deduped
                }
            }
            EventKind::BlockUpdated { block_id, fields } => {
                self.merge_block(*block_id, fields, event, pending)
            }
            EventKind::BlockDeleted { block_id } => match self.remove_block(*block_id) {
                Some(_) => Outcome::Applied,
                None => {
                    debug!(%block_id, "delete for block not present locally");
                    Outcome::Unknown
                }
            },
            EventKind::PageCreated { page } => {
                if self.pages.insert(page.clone()) {
                    Outcome::Applied
                } else {
                    Outcome::Deduped
                }
            }
            EventKind::PageUpdated { page_id, fields } => {
                self.merge_page(*page_id, fields, event, pending)
            }
            EventKind::PageDeleted { page_id } => match self.remove_page_subtree(*page_id) {
                Some(_) => Outcome::Applied,
                None => {
                    debug!(page_id = %page_id, "delete for page not present locally");
                    Outcome::Unknown
                }
            },
            EventKind::CommentCreated { comment } => {
                if self.insert_comment(comment.clone()) {
                    Outcome::Applied
                } else {
                    Outcome::Deduped
                }
            }
            EventKind::CommentUpdated { comment_id, fields } => {
                self.merge_comment(*comment_id, fields, event, pending)
            }
            EventKind::WorkspaceUpdated { workspace_id, fields } => {
                self.merge_workspace(*workspace_id, fields, event, pending)
            }
            // Ephemeral kinds were handled above.
            _ => Outcome::Applied,
        }
    }

    // ── Direct mutators (optimistic path and event merge share these) ──

    /// Insert a block keeping position order. False if the id exists.
    pub fn insert_block(&mut self, block: Block) -> bool {
        if self.blocks.iter().any(|existing| existing.id == block.id) {
            return false;
        }
        self.blocks.push(block);
        self.sort_blocks();
        true
    }

    /// Merge a patch onto a block unconditionally (no pending check).
    pub fn force_block_patch(&mut self, id: Uuid, patch: &BlockPatch) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|block| block.id == id) else {
            return false;
        };
        if let Some(kind) = patch.kind {
            block.kind = kind;
        }
        if let Some(content) = &patch.content {
            block.content = content.clone();
        }
        if let Some(position) = patch.position {
            block.position = position;
            self.sort_blocks();
        }
        true
    }

    /// Remove a block; clears the editor selection if it was selected.
    pub fn remove_block(&mut self, id: Uuid) -> Option<Block> {
        let index = self.blocks.iter().position(|block| block.id == id)?;
        if self.selected_block == Some(id) {
            self.selected_block = None;
        }
        Some(self.blocks.remove(index))
    }

    pub fn insert_page(&mut self, page: Page) -> bool {
        self.pages.insert(page)
    }

    pub fn force_page_patch(&mut self, id: Uuid, patch: &PagePatch) -> bool {
        let found = self.pages.apply_patch(id, patch);
        if found {
            if let Some(order) = &patch.block_order {
                self.apply_block_order(order);
            }
        }
        found
    }

    pub fn insert_comment(&mut self, comment: Comment) -> bool {
        if self.comments.iter().any(|existing| existing.id == comment.id) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    pub fn force_comment_patch(&mut self, id: Uuid, patch: &CommentPatch) -> bool {
        let Some(comment) = self.comments.iter_mut().find(|comment| comment.id == id) else {
            return false;
        };
        if let Some(body) = &patch.body {
            comment.body = body.clone();
        }
        if let Some(resolved) = patch.resolved {
            comment.resolved = resolved;
        }
        true
    }

    pub fn remove_comment(&mut self, id: Uuid) -> Option<Comment> {
        let index = self.comments.iter().position(|comment| comment.id == id)?;
        Some(self.comments.remove(index))
    }

    pub fn force_workspace_patch(&mut self, patch: &WorkspacePatch) -> bool {
        let Some(workspace) = self.workspace.as_mut() else {
            return false;
        };
        if let Some(name) = &patch.name {
            workspace.name = name.clone();
        }
        if let Some(slug) = &patch.slug {
            workspace.slug = slug.clone();
        }
        true
    }

    /// Remove a page with its whole subtree; clears the page selection if
    /// the selected page was inside it.
    pub fn remove_page_subtree(&mut self, id: Uuid) -> Option<tree::PageNode> {
        let removed = self.pages.remove(id)?;
        if let Some(selected) = self.selected_page {
            let mut stack = vec![&removed];
            while let Some(node) = stack.pop() {
                if node.page.id == selected {
                    self.selected_page = None;
                    break;
                }
                stack.extend(node.children.iter());
            }
        }
        Some(removed)
    }

    /// Reassign block positions to match the given id sequence. Ids not
    /// present locally are skipped; local blocks missing from the sequence
    /// keep their relative order after the sequenced ones.
    pub fn apply_block_order(&mut self, order: &[Uuid]) {
        for (index, id) in order.iter().enumerate() {
            if let Some(block) = self.blocks.iter_mut().find(|block| block.id == *id) {
                block.position = index as i32;
            }
        }
        let tail_start = order.len() as i32;
        let mut offset = 0;
        for block in self.blocks.iter_mut().filter(|block| !order.contains(&block.id)) {
            block.position = tail_start + offset;
            offset += 1;
        }
        self.sort_blocks();
    }

    // ── Merge helpers ───────────────────────────────────────────────

    fn merge_block(
        &mut self,
        block_id: Uuid,
        patch: &BlockPatch,
        event: &RealtimeEvent,
        pending: &mut PendingSet,
    ) -> Outcome {
        if self.block(block_id).is_none() {
            debug!(%block_id, "update for block not present locally");
            return Outcome::Unknown;
        }

        let mut admitted = BlockPatch::default();
        if patch.kind.is_some() && pending.admit_event(block_id, Field::Kind, event.timestamp) {
            admitted.kind = patch.kind;
        }
        if patch.content.is_some()
            && pending.admit_event(block_id, Field::Content, event.timestamp)
        {
            admitted.content = patch.content.clone();
        }
        if patch.position.is_some()
            && pending.admit_event(block_id, Field::Position, event.timestamp)
        {
            admitted.position = patch.position;
        }
        self.force_block_patch(block_id, &admitted);
        Outcome::Applied
    }

    fn merge_page(
        &mut self,
        page_id: Uuid,
        patch: &PagePatch,
        event: &RealtimeEvent,
        pending: &mut PendingSet,
    ) -> Outcome {
        if !self.pages.contains(page_id) {
            debug!(%page_id, "update for page not present locally");
            return Outcome::Unknown;
        }

        let mut admitted = PagePatch::default();
        if patch.title.is_some() && pending.admit_event(page_id, Field::Title, event.timestamp) {
            admitted.title = patch.title.clone();
        }
        if patch.icon.is_some() && pending.admit_event(page_id, Field::Icon, event.timestamp) {
            admitted.icon = patch.icon.clone();
        }
        if patch.parent_id.is_some()
            && pending.admit_event(page_id, Field::ParentId, event.timestamp)
        {
            admitted.parent_id = patch.parent_id;
        }
        if patch.position.is_some()
            && pending.admit_event(page_id, Field::Position, event.timestamp)
        {
            admitted.position = patch.position;
        }
        if patch.block_order.is_some()
            && pending.admit_event(page_id, Field::BlockOrder, event.timestamp)
        {
            admitted.block_order = patch.block_order.clone();
        }
        self.force_page_patch(page_id, &admitted);
        Outcome::Applied
    }

    fn merge_comment(
        &mut self,
        comment_id: Uuid,
        patch: &CommentPatch,
        event: &RealtimeEvent,
        pending: &mut PendingSet,
    ) -> Outcome {
        if self.comment(comment_id).is_none() {
            debug!(%comment_id, "update for comment not present locally");
            return Outcome::Unknown;
        }

        let mut admitted = CommentPatch::default();
        if patch.body.is_some() && pending.admit_event(comment_id, Field::Body, event.timestamp) {
            admitted.body = patch.body.clone();
        }
        if patch.resolved.is_some()
            && pending.admit_event(comment_id, Field::Resolved, event.timestamp)
        {
            admitted.resolved = patch.resolved;
        }
        self.force_comment_patch(comment_id, &admitted);
        Outcome::Applied
    }

    fn merge_workspace(
        &mut self,
        workspace_id: Uuid,
        patch: &WorkspacePatch,
        event: &RealtimeEvent,
        pending: &mut PendingSet,
    ) -> Outcome {
        let Some(workspace) = self.workspace.as_mut() else {
            return Outcome::Unknown;
        };
        if workspace.id != workspace_id {
            debug!(%workspace_id, "update for a different workspace");
            return Outcome::Unknown;
        }

        if let Some(name) = &patch.name {
            if pending.admit_event(workspace_id, Field::Name, event.timestamp) {
                workspace.name = name.clone();
            }
        }
        if let Some(slug) = &patch.slug {
            if pending.admit_event(workspace_id, Field::Slug, event.timestamp) {
                workspace.slug = slug.clone();
            }
        }
        Outcome::Applied
    }

    fn sort_blocks(&mut self) {
        self.blocks.sort_by_key(|block| block.position);
    }
}
