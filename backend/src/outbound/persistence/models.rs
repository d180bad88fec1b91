//! Diesel row structs and their conversions to domain types.
//!
//! Rows never leave the persistence module. Decoding fails with
//! [`LendingStoreError::Query`] when a stored ordinal or label is unknown.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    grants, groups, item_categories, item_category_links, item_photos, items, memberships,
    transactions, users,
};
use crate::domain::ports::LendingStoreError;
use crate::domain::{
    Capability, CategoryId, Grant, Group, GroupId, GroupName, Item, ItemCategory, ItemId,
    ItemPhoto, ItemStatus, Membership, MembershipStatus, PhotoId, Principal, Resource,
    Transaction, TransactionId, TransactionStatus, TrustLevel, UserId,
};

fn corrupt(what: &str, detail: impl std::fmt::Display) -> LendingStoreError {
    LendingStoreError::query(format!("stored {what} is invalid: {detail}"))
}

fn trust_from_row(value: i16) -> Result<TrustLevel, LendingStoreError> {
    TrustLevel::from_ordinal(value).map_err(|err| corrupt("trust level", err))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Row read by the user directory.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Groups and memberships
// ---------------------------------------------------------------------------

/// Group row; also used for inserts and full updates.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct GroupRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub membership_requires_approval: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self {
            id: *group.id.as_uuid(),
            name: group.name.as_str().to_owned(),
            description: group.description.clone(),
            membership_requires_approval: group.membership_requires_approval,
            created_by: *group.created_by.as_uuid(),
            created_at: group.created_at,
            updated_by: *group.updated_by.as_uuid(),
            updated_at: group.updated_at,
        }
    }
}

impl TryFrom<GroupRow> for Group {
    type Error = LendingStoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: GroupId::from_uuid(row.id),
            name: GroupName::new(row.name).map_err(|err| corrupt("group name", err))?,
            description: row.description,
            membership_requires_approval: row.membership_requires_approval,
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            updated_by: UserId::from_uuid(row.updated_by),
            updated_at: row.updated_at,
        })
    }
}

/// Membership row; also used for inserts and full updates.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = memberships)]
#[diesel(primary_key(group_id, user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(crate) struct MembershipRow {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub trust_level: i16,
    pub is_moderator: bool,
    pub status: String,
    pub joined_at: DateTime<Utc>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub status_changed_reason: Option<String>,
}

impl From<&Membership> for MembershipRow {
    fn from(membership: &Membership) -> Self {
        Self {
            group_id: *membership.group_id.as_uuid(),
            user_id: *membership.user_id.as_uuid(),
            trust_level: membership.trust_level.ordinal(),
            is_moderator: membership.is_moderator,
            status: membership.status.as_str().to_owned(),
            joined_at: membership.joined_at,
            status_changed_at: membership.status_changed_at,
            status_changed_reason: membership.status_changed_reason.clone(),
        }
    }
}

impl TryFrom<MembershipRow> for Membership {
    type Error = LendingStoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Self {
            group_id: GroupId::from_uuid(row.group_id),
            user_id: UserId::from_uuid(row.user_id),
            trust_level: trust_from_row(row.trust_level)?,
            is_moderator: row.is_moderator,
            status: row
                .status
                .parse::<MembershipStatus>()
                .map_err(|err| corrupt("membership status", err))?,
            joined_at: row.joined_at,
            status_changed_at: row.status_changed_at,
            status_changed_reason: row.status_changed_reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Category row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = item_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<&ItemCategory> for CategoryRow {
    fn from(category: &ItemCategory) -> Self {
        Self {
            id: *category.id.as_uuid(),
            name: category.name.clone(),
            description: category.description.clone(),
        }
    }
}

impl From<CategoryRow> for ItemCategory {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            description: row.description,
        }
    }
}

/// Item row without its links.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ItemRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub trust_level_required: i16,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemRow {
    fn from(item: &Item) -> Self {
        Self {
            id: *item.id.as_uuid(),
            name: item.name.clone(),
            description: item.description.clone(),
            owner_id: *item.owner.as_uuid(),
            trust_level_required: item.trust_level_required.ordinal(),
            status: item.status.ordinal(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl ItemRow {
    /// Assemble the domain item from this row and its loaded links.
    pub(crate) fn into_item(
        self,
        categories: BTreeSet<CategoryId>,
        photos: Vec<ItemPhoto>,
    ) -> Result<Item, LendingStoreError> {
        Ok(Item {
            id: ItemId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            owner: UserId::from_uuid(self.owner_id),
            categories,
            trust_level_required: trust_from_row(self.trust_level_required)?,
            status: ItemStatus::from_ordinal(self.status)
                .ok_or_else(|| corrupt("item status", self.status))?,
            photos,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Editable item attributes; status and ownership are written elsewhere.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = items)]
pub(crate) struct ItemUpdate<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub trust_level_required: i16,
    pub updated_at: DateTime<Utc>,
}

/// Item-to-category link.
#[derive(Debug, Clone, Copy, Queryable, Selectable, Insertable)]
#[diesel(table_name = item_category_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CategoryLinkRow {
    pub item_id: Uuid,
    pub category_id: Uuid,
}

/// Photo row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = item_photos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PhotoRow {
    pub id: Uuid,
    pub item_id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ItemPhoto> for PhotoRow {
    fn from(photo: &ItemPhoto) -> Self {
        Self {
            id: *photo.id.as_uuid(),
            item_id: *photo.item_id.as_uuid(),
            url: photo.url.clone(),
            created_at: photo.created_at,
        }
    }
}

impl From<PhotoRow> for ItemPhoto {
    fn from(row: PhotoRow) -> Self {
        Self {
            id: PhotoId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            url: row.url,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Transaction row; also used for inserts and full updates.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TransactionRow {
    pub id: Uuid,
    pub item_id: Uuid,
    pub party1_id: Uuid,
    pub party2_id: Uuid,
    pub status: i16,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: *tx.id.as_uuid(),
            item_id: *tx.item_id.as_uuid(),
            party1_id: *tx.party1.as_uuid(),
            party2_id: *tx.party2.as_uuid(),
            status: tx.status.ordinal(),
            updated_by: *tx.updated_by.as_uuid(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LendingStoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TransactionId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            party1: UserId::from_uuid(row.party1_id),
            party2: UserId::from_uuid(row.party2_id),
            status: TransactionStatus::from_ordinal(row.status)
                .ok_or_else(|| corrupt("transaction status", row.status))?,
            updated_by: UserId::from_uuid(row.updated_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Grants
// ---------------------------------------------------------------------------

pub(crate) const KIND_USER: &str = "user";
pub(crate) const KIND_GROUP: &str = "group";
pub(crate) const KIND_ITEM: &str = "item";

/// Grant row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = grants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GrantRow {
    pub principal_kind: String,
    pub principal_id: Uuid,
    pub resource_kind: String,
    pub resource_id: Uuid,
    pub capability: String,
}

/// Stored (kind, id) pair for a principal.
pub(crate) fn principal_key(principal: Principal) -> (&'static str, Uuid) {
    match principal {
        Principal::User(id) => (KIND_USER, *id.as_uuid()),
        Principal::Group(id) => (KIND_GROUP, *id.as_uuid()),
    }
}

/// Stored (kind, id) pair for a resource.
pub(crate) fn resource_key(resource: Resource) -> (&'static str, Uuid) {
    match resource {
        Resource::Item(id) => (KIND_ITEM, *id.as_uuid()),
        Resource::Group(id) => (KIND_GROUP, *id.as_uuid()),
    }
}

impl From<&Grant> for GrantRow {
    fn from(grant: &Grant) -> Self {
        let (principal_kind, principal_id) = principal_key(grant.principal);
        let (resource_kind, resource_id) = resource_key(grant.resource);
        Self {
            principal_kind: principal_kind.to_owned(),
            principal_id,
            resource_kind: resource_kind.to_owned(),
            resource_id,
            capability: grant.capability.as_str().to_owned(),
        }
    }
}

impl TryFrom<GrantRow> for Grant {
    type Error = LendingStoreError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let principal = match row.principal_kind.as_str() {
            KIND_USER => Principal::User(UserId::from_uuid(row.principal_id)),
            KIND_GROUP => Principal::Group(GroupId::from_uuid(row.principal_id)),
            other => return Err(corrupt("principal kind", other)),
        };
        let resource = match row.resource_kind.as_str() {
            KIND_ITEM => Resource::Item(ItemId::from_uuid(row.resource_id)),
            KIND_GROUP => Resource::Group(GroupId::from_uuid(row.resource_id)),
            other => return Err(corrupt("resource kind", other)),
        };
        let capability = Capability::parse(&row.capability)
            .ok_or_else(|| corrupt("capability", &row.capability))?;
        Ok(Self::new(principal, resource, capability))
    }
}
