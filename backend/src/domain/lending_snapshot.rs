//! Consistent view of the lending state a decision runs against.
//!
//! A [`SnapshotScope`] names the aggregates a decision touches; the store
//! loads them, and everything reachable from them, into a
//! [`LendingSnapshot`] inside the same unit of work that later applies the
//! decision's writes.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    CategoryId, Error, Grant, Group, GroupId, GroupName, Item, ItemCategory, ItemId, Membership,
    Transaction, UserId,
};

/// Aggregates a decision needs to read.
///
/// - `items`: each item with its open transactions.
/// - `groups`: each group with its full roster.
/// - `users`: every membership the user holds, and every item they own.
/// - `categories`: category rows by id.
/// - `group_name`: the group currently holding that name, if any.
///
/// Grants are loaded for every group and item the snapshot contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotScope {
    /// Items to load.
    pub items: BTreeSet<ItemId>,
    /// Groups to load with rosters.
    pub groups: BTreeSet<GroupId>,
    /// Users whose memberships and owned items are loaded.
    pub users: BTreeSet<UserId>,
    /// Categories to load.
    pub categories: BTreeSet<CategoryId>,
    /// Group name to probe for uniqueness.
    pub group_name: Option<GroupName>,
}

impl SnapshotScope {
    /// Add an item.
    pub fn item(mut self, id: ItemId) -> Self {
        self.items.insert(id);
        self
    }

    /// Add a group.
    pub fn group(mut self, id: GroupId) -> Self {
        self.groups.insert(id);
        self
    }

    /// Add a user.
    pub fn user(mut self, id: UserId) -> Self {
        self.users.insert(id);
        self
    }

    /// Add categories.
    pub fn categories(mut self, ids: impl IntoIterator<Item = CategoryId>) -> Self {
        self.categories.extend(ids);
        self
    }

    /// Probe a group name.
    pub fn group_name(mut self, name: GroupName) -> Self {
        self.group_name = Some(name);
        self
    }
}

/// An item with the transaction state that drives its actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    /// Item row including categories and photos.
    pub item: Item,
    /// Transactions that are not terminal.
    pub open_transactions: Vec<Transaction>,
    /// Whether any transaction, open or closed, references the item.
    pub has_history: bool,
}

/// Loaded lending state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LendingSnapshot {
    /// Scoped items and items owned by scoped users.
    pub items: BTreeMap<ItemId, ItemRecord>,
    /// Scoped groups.
    pub groups: BTreeMap<GroupId, Group>,
    /// Full roster of each scoped group.
    pub rosters: BTreeMap<GroupId, Vec<Membership>>,
    /// Every membership held by each scoped user.
    pub memberships: BTreeMap<UserId, Vec<Membership>>,
    /// Scoped categories.
    pub categories: BTreeMap<CategoryId, ItemCategory>,
    /// Grants on loaded groups and items.
    pub grants: BTreeSet<Grant>,
    /// Group holding the probed name.
    pub group_named: Option<Group>,
}

impl LendingSnapshot {
    /// Item record by id.
    ///
    /// # Errors
    /// [`ErrorCode::NotFound`](crate::domain::ErrorCode::NotFound) when absent.
    pub fn item(&self, id: ItemId) -> Result<&ItemRecord, Error> {
        self.items
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("item {id} not found")))
    }

    /// Group by id.
    ///
    /// # Errors
    /// [`ErrorCode::NotFound`](crate::domain::ErrorCode::NotFound) when absent.
    pub fn group(&self, id: GroupId) -> Result<&Group, Error> {
        self.groups
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("group {id} not found")))
    }

    /// Roster of a loaded group.
    pub fn roster(&self, group: GroupId) -> &[Membership] {
        self.rosters.get(&group).map_or(&[], Vec::as_slice)
    }

    /// Membership of `user` in `group`, if loaded.
    pub fn membership(&self, group: GroupId, user: UserId) -> Option<&Membership> {
        self.roster(group)
            .iter()
            .chain(self.memberships_of(user))
            .find(|m| m.group_id == group && m.user_id == user)
    }

    /// Every membership `user` holds.
    pub fn memberships_of(&self, user: UserId) -> &[Membership] {
        self.memberships.get(&user).map_or(&[], Vec::as_slice)
    }

    /// Items owned by `user` among those loaded.
    pub fn items_owned_by(&self, user: UserId) -> impl Iterator<Item = &Item> + '_ {
        self.items
            .values()
            .map(|record| &record.item)
            .filter(move |item| item.owner == user)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{ErrorCode, MembershipStatus, TrustLevel};
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    fn scope_builder_accumulates() {
        let item = ItemId::random();
        let group = GroupId::random();
        let scope = SnapshotScope::default().item(item).group(group).group(group);
        assert_eq!(scope.items.len(), 1);
        assert_eq!(scope.groups.len(), 1);
    }

    #[rstest]
    fn missing_rows_are_not_found() {
        let snapshot = LendingSnapshot::default();
        let err = snapshot.item(ItemId::random()).expect_err("absent");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(snapshot.roster(GroupId::random()).is_empty());
    }

    #[rstest]
    fn membership_is_found_through_user_index() {
        let group = GroupId::random();
        let user = UserId::random();
        let membership = Membership::new(
            group,
            user,
            TrustLevel::Low,
            false,
            MembershipStatus::Active,
            Utc::now(),
        );
        let mut snapshot = LendingSnapshot::default();
        snapshot.memberships.insert(user, vec![membership.clone()]);
        assert_eq!(snapshot.membership(group, user), Some(&membership));
    }
}
