// Pending optimistic mutations, keyed by (resource, field).
//
// A record lives from optimistic apply until the REST call resolves or a
// postdating channel event confirms it. At most one record exists per
// (resource, field): a newer edit supersedes the older record without a
// revert, since the newer value is authoritative-pending.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The mutable fields a mutation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // Pages
    Title,
    Icon,
    ParentId,
    Position,
    /// Full block ordering of a page (reorder is a wholesale mutation).
    BlockOrder,
    // Blocks
    Kind,
    Content,
    // Comments
    Body,
    Resolved,
    // Workspaces
    Name,
    Slug,
}

/// A locally-issued change awaiting REST confirmation. The revert
/// snapshot is held by the coordinator's staged mutation, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMutation {
    /// Identifies one issuance; a superseded record's id goes stale so its
    /// late REST completion can be recognized and ignored.
    pub mutation_id: Uuid,
    pub resource_id: Uuid,
    pub field: Field,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    entries: HashMap<(Uuid, Field), PendingMutation>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, resource_id: Uuid, field: Field) -> Option<&PendingMutation> {
        self.entries.get(&(resource_id, field))
    }

    /// Record a mutation, superseding any existing record for the same
    /// (resource, field). Returns the superseded record, which must NOT be
    /// reverted.
    pub fn record(&mut self, mutation: PendingMutation) -> Option<PendingMutation> {
        self.entries.insert((mutation.resource_id, mutation.field), mutation)
    }

    /// Remove the record for (resource, field) if its id matches. A stale
    /// id means the mutation was superseded; the current record stays.
    pub fn resolve(
        &mut self,
        resource_id: Uuid,
        field: Field,
        mutation_id: Uuid,
    ) -> Option<PendingMutation> {
        match self.entries.get(&(resource_id, field)) {
            Some(current) if current.mutation_id == mutation_id => {
                self.entries.remove(&(resource_id, field))
            }
            _ => None,
        }
    }

    /// Decide whether an inbound event's value for (resource, field) should
    /// be applied over local state.
    ///
    /// With no pending record the event applies unconditionally. With one,
    /// an event that postdates the optimistic apply is its confirmation:
    /// the record is discarded and the event applies (server order is
    /// authoritative). An event predating the optimistic apply lost to the
    /// in-flight local write and is skipped.
    pub fn admit_event(&mut self, resource_id: Uuid, field: Field, at: DateTime<Utc>) -> bool {
        match self.entries.get(&(resource_id, field)) {
            None => true,
            Some(pending) if at >= pending.issued_at => {
                self.entries.remove(&(resource_id, field));
                true
            }
            Some(_) => false,
        }
    }

    /// Discard every record without reverting, e.g. on view teardown.
    pub fn discard_all(&mut self) {
        self.entries.clear();
    }
}
