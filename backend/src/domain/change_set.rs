//! Writes produced by a lending decision.

use crate::domain::{
    Grant, GrantDelta, Group, GroupId, Item, ItemCategory, ItemId, ItemPhoto, ItemStatus,
    LendingEvent, Membership, PhotoId, Transaction, UserId,
};

/// One write, applied in order by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create a group.
    InsertGroup(Group),
    /// Replace a group's attributes.
    UpdateGroup(Group),
    /// Delete a group with its memberships and every grant naming it.
    DeleteGroup(GroupId),
    /// Create a membership.
    InsertMembership(Membership),
    /// Replace a membership's attributes.
    UpdateMembership(Membership),
    /// Delete a membership.
    DeleteMembership {
        /// Group.
        group_id: GroupId,
        /// Member.
        user_id: UserId,
    },
    /// Create a catalogue category.
    InsertCategory(ItemCategory),
    /// Create an item with its category links.
    InsertItem(Item),
    /// Replace an item's attributes and category links.
    UpdateItem(Item),
    /// Delete an item, its photos, and grants on it.
    DeleteItem(ItemId),
    /// Write the item status projection.
    SetItemStatus {
        /// Item.
        item_id: ItemId,
        /// New status.
        status: ItemStatus,
    },
    /// Attach a photo.
    InsertPhoto(ItemPhoto),
    /// Detach a photo.
    DeletePhoto {
        /// Item.
        item_id: ItemId,
        /// Photo.
        photo_id: PhotoId,
    },
    /// Create a transaction.
    InsertTransaction(Transaction),
    /// Replace a transaction's status and audit fields.
    UpdateTransaction(Transaction),
    /// Ensure a grant row exists.
    Grant(Grant),
    /// Ensure a grant row is absent.
    Revoke(Grant),
}

/// Ordered writes plus the events to publish once they commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
    events: Vec<LendingEvent>,
}

impl ChangeSet {
    /// Append a write.
    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Append the rows of a grant delta, revokes first.
    pub fn grants(&mut self, delta: &GrantDelta) -> &mut Self {
        self.changes
            .extend(delta.revokes().iter().copied().map(Change::Revoke));
        self.changes
            .extend(delta.grants().iter().copied().map(Change::Grant));
        self
    }

    /// Queue an event for after commit.
    pub fn emit(&mut self, event: LendingEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    /// Writes in application order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Events to publish.
    pub fn events(&self) -> &[LendingEvent] {
        &self.events
    }

    /// Split into writes and events.
    pub fn into_parts(self) -> (Vec<Change>, Vec<LendingEvent>) {
        (self.changes, self.events)
    }
}

/// Outcome of a decision: the value returned to the caller and the writes
/// that produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<T> {
    /// Caller-facing result.
    pub value: T,
    /// Writes and events.
    pub changes: ChangeSet,
}

impl<T> Decision<T> {
    /// Pair a value with its writes.
    pub fn new(value: T, changes: ChangeSet) -> Self {
        Self { value, changes }
    }

    /// A value that needs no writes.
    pub fn read_only(value: T) -> Self {
        Self::new(value, ChangeSet::default())
    }
}
