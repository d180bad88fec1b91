//! Permission projection.
//!
//! Grants are a denormalised table of `(principal, resource, capability)`
//! rows derived from item ownership, membership trust, and item trust
//! requirements. The functions here compute the grants and revokes a
//! mutation implies; the store persists them in the same unit of work as
//! the mutation itself.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, Item, ItemId, Membership, UserId};

/// Something a principal may do to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// See the resource.
    View,
    /// Change the resource.
    Edit,
    /// Remove the resource.
    Delete,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Self; 3] = [Self::View, Self::Edit, Self::Delete];

    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    /// Decode the stored representation.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

/// Holder of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// An individual user.
    User(UserId),
    /// Every active member of a group.
    Group(GroupId),
}

/// Object a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Resource {
    /// A lendable item.
    Item(ItemId),
    /// A group.
    Group(GroupId),
}

/// One row of the grant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Holder.
    pub principal: Principal,
    /// Target.
    pub resource: Resource,
    /// Permitted operation.
    pub capability: Capability,
}

impl Grant {
    /// Build a grant row.
    pub const fn new(principal: Principal, resource: Resource, capability: Capability) -> Self {
        Self {
            principal,
            resource,
            capability,
        }
    }

    /// Whether the row names `group` as principal or resource.
    pub fn mentions_group(&self, group: GroupId) -> bool {
        self.principal == Principal::Group(group) || self.resource == Resource::Group(group)
    }

    /// Whether the row targets `item`.
    pub fn targets_item(&self, item: ItemId) -> bool {
        self.resource == Resource::Item(item)
    }
}

/// Grants to add and revoke for one mutation.
///
/// Later decisions about the same row override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantDelta {
    grants: BTreeSet<Grant>,
    revokes: BTreeSet<Grant>,
}

impl GrantDelta {
    /// Record that `grant` must exist.
    pub fn grant(&mut self, grant: Grant) {
        self.revokes.remove(&grant);
        self.grants.insert(grant);
    }

    /// Record that `grant` must not exist.
    pub fn revoke(&mut self, grant: Grant) {
        self.grants.remove(&grant);
        self.revokes.insert(grant);
    }

    /// Grant or revoke depending on `allowed`.
    pub fn set(&mut self, grant: Grant, allowed: bool) {
        if allowed {
            self.grant(grant);
        } else {
            self.revoke(grant);
        }
    }

    /// Fold `other` into this delta; `other` wins on overlap.
    pub fn merge(&mut self, other: Self) {
        for grant in other.revokes {
            self.revoke(grant);
        }
        for grant in other.grants {
            self.grant(grant);
        }
    }

    /// Rows to insert.
    pub fn grants(&self) -> &BTreeSet<Grant> {
        &self.grants
    }

    /// Rows to delete.
    pub fn revokes(&self) -> &BTreeSet<Grant> {
        &self.revokes
    }

    /// Whether nothing changes.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.revokes.is_empty()
    }

    /// Apply the delta to an in-memory grant set.
    pub fn apply(&self, table: &mut BTreeSet<Grant>) {
        for grant in &self.revokes {
            table.remove(grant);
        }
        table.extend(self.grants.iter().copied());
    }
}

/// Owner capabilities on their own item.
pub fn owner_item_grants(item: &Item) -> GrantDelta {
    let mut delta = GrantDelta::default();
    for capability in Capability::ALL {
        delta.grant(Grant::new(
            Principal::User(item.owner),
            Resource::Item(item.id),
            capability,
        ));
    }
    delta
}

/// Group visibility of `item` through each of the owner's memberships.
///
/// A group sees the item iff the owner is an active member whose trust in
/// the group satisfies the item's requirement.
pub fn item_group_visibility<'a>(
    item: &Item,
    owner_memberships: impl IntoIterator<Item = &'a Membership>,
) -> GrantDelta {
    let mut delta = GrantDelta::default();
    for membership in owner_memberships {
        if membership.user_id != item.owner {
            continue;
        }
        delta.set(
            Grant::new(
                Principal::Group(membership.group_id),
                Resource::Item(item.id),
                Capability::View,
            ),
            shares_item(membership, item),
        );
    }
    delta
}

/// Grants implied by one membership row: the member's group capabilities and
/// the group's view of the member's items.
pub fn membership_grants<'a>(
    membership: &Membership,
    owned_items: impl IntoIterator<Item = &'a Item>,
) -> GrantDelta {
    let mut delta = GrantDelta::default();
    let member = Principal::User(membership.user_id);
    let group = Resource::Group(membership.group_id);
    delta.set(
        Grant::new(member, group, Capability::View),
        membership.is_active(),
    );
    for capability in [Capability::Edit, Capability::Delete] {
        delta.set(
            Grant::new(member, group, capability),
            membership.is_active_moderator(),
        );
    }
    for item in owned_items {
        if item.owner != membership.user_id {
            continue;
        }
        delta.set(
            Grant::new(
                Principal::Group(membership.group_id),
                Resource::Item(item.id),
                Capability::View,
            ),
            shares_item(membership, item),
        );
    }
    delta
}

/// Revocations required before `membership` is deleted.
pub fn membership_removal<'a>(
    membership: &Membership,
    owned_items: impl IntoIterator<Item = &'a Item>,
) -> GrantDelta {
    let mut delta = GrantDelta::default();
    let member = Principal::User(membership.user_id);
    for capability in Capability::ALL {
        delta.revoke(Grant::new(
            member,
            Resource::Group(membership.group_id),
            capability,
        ));
    }
    for item in owned_items {
        if item.owner == membership.user_id {
            delta.revoke(Grant::new(
                Principal::Group(membership.group_id),
                Resource::Item(item.id),
                Capability::View,
            ));
        }
    }
    delta
}

fn shares_item(membership: &Membership, item: &Item) -> bool {
    membership.is_active() && membership.trust_level.satisfies(item.trust_level_required)
}

/// Whether any of `principals` holds `capability` on `resource` in `table`.
pub fn holds<'a>(
    table: impl IntoIterator<Item = &'a Grant>,
    principals: &[Principal],
    resource: Resource,
    capability: Capability,
) -> bool {
    table.into_iter().any(|grant| {
        grant.resource == resource
            && grant.capability == capability
            && principals.contains(&grant.principal)
    })
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;
