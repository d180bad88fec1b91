//! Tables backing the in-memory lending store and the write-back of change
//! sets onto them.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::ports::LendingStoreError;
use crate::domain::{
    CategoryId, Change, Grant, Group, GroupId, Item, ItemCategory, ItemId, ItemRecord,
    LendingSnapshot, Membership, Principal, Resource, SnapshotScope, Transaction, TransactionId,
    UserId,
};

/// Row storage mirroring the relational schema.
#[derive(Debug, Clone, Default)]
pub(super) struct LendingTables {
    groups: BTreeMap<GroupId, Group>,
    memberships: BTreeMap<(GroupId, UserId), Membership>,
    categories: BTreeMap<CategoryId, ItemCategory>,
    items: BTreeMap<ItemId, Item>,
    transactions: BTreeMap<TransactionId, Transaction>,
    grants: BTreeSet<Grant>,
}

impl LendingTables {
    pub(super) fn snapshot(&self, scope: &SnapshotScope) -> LendingSnapshot {
        let mut snapshot = LendingSnapshot::default();
        let mut item_ids = scope.items.clone();

        for user in &scope.users {
            let held: Vec<Membership> = self
                .memberships
                .values()
                .filter(|m| m.user_id == *user)
                .cloned()
                .collect();
            snapshot.memberships.insert(*user, held);
            item_ids.extend(
                self.items
                    .values()
                    .filter(|item| item.owner == *user)
                    .map(|item| item.id),
            );
        }

        for group_id in &scope.groups {
            if let Some(group) = self.groups.get(group_id) {
                snapshot.groups.insert(*group_id, group.clone());
                let roster = self
                    .memberships
                    .values()
                    .filter(|m| m.group_id == *group_id)
                    .cloned()
                    .collect();
                snapshot.rosters.insert(*group_id, roster);
            }
        }

        for item_id in item_ids {
            let Some(item) = self.items.get(&item_id) else {
                continue;
            };
            let history: Vec<&Transaction> = self
                .transactions
                .values()
                .filter(|tx| tx.item_id == item_id)
                .collect();
            snapshot.items.insert(
                item_id,
                ItemRecord {
                    item: item.clone(),
                    open_transactions: history
                        .iter()
                        .filter(|tx| tx.status.is_open())
                        .map(|tx| (*tx).clone())
                        .collect(),
                    has_history: !history.is_empty(),
                },
            );
        }

        for category_id in &scope.categories {
            if let Some(category) = self.categories.get(category_id) {
                snapshot.categories.insert(*category_id, category.clone());
            }
        }

        snapshot.grants = self
            .grants
            .iter()
            .filter(|grant| match grant.resource {
                Resource::Item(id) => snapshot.items.contains_key(&id),
                Resource::Group(id) => snapshot.groups.contains_key(&id),
            } || matches!(grant.principal, Principal::User(u) if scope.users.contains(&u)))
            .copied()
            .collect();

        snapshot.group_named = scope.group_name.as_ref().and_then(|name| {
            self.groups
                .values()
                .find(|group| group.name == *name)
                .cloned()
        });

        snapshot
    }

    pub(super) fn grants_held_by(&self, principals: &[Principal]) -> Vec<Grant> {
        self.grants
            .iter()
            .filter(|grant| principals.contains(&grant.principal))
            .copied()
            .collect()
    }

    pub(super) fn transactions_involving(&self, user: UserId) -> Vec<Transaction> {
        let mut found: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|tx| tx.involves(user))
            .cloned()
            .collect();
        found.sort_by_key(|tx| std::cmp::Reverse(tx.updated_at));
        found
    }

    pub(super) fn categories(&self) -> Vec<ItemCategory> {
        let mut found: Vec<ItemCategory> = self.categories.values().cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Apply one write, enforcing the same uniqueness rules as the
    /// relational schema.
    pub(super) fn apply(&mut self, change: Change) -> Result<(), LendingStoreError> {
        match change {
            Change::InsertGroup(group) => {
                self.ensure_group_name_free(&group)?;
                if self.groups.insert(group.id, group).is_some() {
                    return Err(LendingStoreError::conflict("duplicate group id"));
                }
            }
            Change::UpdateGroup(group) => {
                self.ensure_group_name_free(&group)?;
                let row = self
                    .groups
                    .get_mut(&group.id)
                    .ok_or_else(|| missing("group", group.id))?;
                *row = group;
            }
            Change::DeleteGroup(id) => {
                self.groups.remove(&id);
                self.memberships.retain(|(group, _), _| *group != id);
                self.grants.retain(|grant| !grant.mentions_group(id));
            }
            Change::InsertMembership(membership) => {
                if !self.groups.contains_key(&membership.group_id) {
                    return Err(missing("group", membership.group_id));
                }
                let key = (membership.group_id, membership.user_id);
                if self.memberships.contains_key(&key) {
                    return Err(LendingStoreError::conflict(
                        "membership already exists for group and user",
                    ));
                }
                self.memberships.insert(key, membership);
            }
            Change::UpdateMembership(membership) => {
                let key = (membership.group_id, membership.user_id);
                let row = self
                    .memberships
                    .get_mut(&key)
                    .ok_or_else(|| missing("membership", membership.user_id))?;
                *row = membership;
            }
            Change::DeleteMembership { group_id, user_id } => {
                self.memberships.remove(&(group_id, user_id));
            }
            Change::InsertCategory(category) => {
                let folded = category.name.to_lowercase();
                if self.categories.values().any(|c| c.name.to_lowercase() == folded) {
                    return Err(LendingStoreError::conflict("category name already exists"));
                }
                self.categories.insert(category.id, category);
            }
            Change::InsertItem(item) => {
                if let Some(unknown) = item
                    .categories
                    .iter()
                    .find(|id| !self.categories.contains_key(id))
                {
                    return Err(missing("category", unknown));
                }
                self.items.insert(item.id, item);
            }
            Change::UpdateItem(item) => {
                let row = self
                    .items
                    .get_mut(&item.id)
                    .ok_or_else(|| missing("item", item.id))?;
                row.name = item.name;
                row.description = item.description;
                row.categories = item.categories;
                row.trust_level_required = item.trust_level_required;
                row.updated_at = item.updated_at;
            }
            Change::DeleteItem(id) => {
                if self.transactions.values().any(|tx| tx.item_id == id) {
                    return Err(LendingStoreError::conflict(
                        "item is referenced by transactions",
                    ));
                }
                self.items.remove(&id);
                self.grants.retain(|grant| !grant.targets_item(id));
            }
            Change::SetItemStatus { item_id, status } => {
                self.items
                    .get_mut(&item_id)
                    .ok_or_else(|| missing("item", item_id))?
                    .status = status;
            }
            Change::InsertPhoto(photo) => {
                self.items
                    .get_mut(&photo.item_id)
                    .ok_or_else(|| missing("item", photo.item_id))?
                    .photos
                    .push(photo);
            }
            Change::DeletePhoto { item_id, photo_id } => {
                self.items
                    .get_mut(&item_id)
                    .ok_or_else(|| missing("item", item_id))?
                    .photos
                    .retain(|photo| photo.id != photo_id);
            }
            Change::InsertTransaction(tx) => {
                let clash = self
                    .transactions
                    .values()
                    .any(|open| open.item_id == tx.item_id && open.status.is_open());
                if clash {
                    return Err(LendingStoreError::conflict(
                        "item already has an open transaction",
                    ));
                }
                self.transactions.insert(tx.id, tx);
            }
            Change::UpdateTransaction(tx) => {
                let row = self
                    .transactions
                    .get_mut(&tx.id)
                    .ok_or_else(|| missing("transaction", tx.id))?;
                *row = tx;
            }
            Change::Grant(grant) => {
                self.grants.insert(grant);
            }
            Change::Revoke(grant) => {
                self.grants.remove(&grant);
            }
        }
        Ok(())
    }

    fn ensure_group_name_free(&self, group: &Group) -> Result<(), LendingStoreError> {
        let taken = self
            .groups
            .values()
            .any(|other| other.id != group.id && other.name == group.name);
        if taken {
            return Err(LendingStoreError::conflict("group name already exists"));
        }
        Ok(())
    }
}

fn missing(what: &str, id: impl std::fmt::Display) -> LendingStoreError {
    LendingStoreError::query(format!("{what} {id} does not exist"))
}
