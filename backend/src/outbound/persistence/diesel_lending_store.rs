//! PostgreSQL-backed [`LendingStore`].
//!
//! Each unit of work runs in one SERIALIZABLE transaction: the snapshot is
//! read, the decision runs, and its change set is written before commit.
//! PostgreSQL serialisation failures and unique violations (including the
//! one-open-transaction-per-item index) surface as
//! [`LendingStoreError::Conflict`] so the caller can re-run the decision.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use super::error_mapping::{lending_pool_error, lending_store_error};
use super::models::{
    CategoryLinkRow, CategoryRow, GrantRow, GroupRow, ItemRow, ItemUpdate, KIND_GROUP, KIND_ITEM,
    KIND_USER, MembershipRow, PhotoRow, TransactionRow, principal_key, resource_key,
};
use super::pool::DbPool;
use super::schema::{
    grants, groups, item_categories, item_category_links, item_photos, items, memberships,
    transactions,
};
use crate::domain::ports::{LendingStore, LendingStoreError, UnitOfWorkError};
use crate::domain::{
    CategoryId, Change, Decision, Error, Grant, Group, GroupId, Item, ItemCategory, ItemId,
    ItemPhoto, ItemRecord, LendingSnapshot, Membership, Principal, SnapshotScope, Transaction,
    UserId,
};

/// Diesel implementation of the lending store.
#[derive(Clone)]
pub struct DieselLendingStore {
    pool: DbPool,
}

impl DieselLendingStore {
    /// Store drawing connections from `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failure inside a unit of work transaction.
#[derive(Debug)]
enum WorkFailure {
    Diesel(diesel::result::Error),
    Store(LendingStoreError),
    Rejected(Error),
}

impl From<diesel::result::Error> for WorkFailure {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<LendingStoreError> for WorkFailure {
    fn from(error: LendingStoreError) -> Self {
        Self::Store(error)
    }
}

impl From<WorkFailure> for UnitOfWorkError {
    fn from(failure: WorkFailure) -> Self {
        match failure {
            WorkFailure::Diesel(error) => Self::Store(lending_store_error(&error)),
            WorkFailure::Store(error) => Self::Store(error),
            WorkFailure::Rejected(error) => Self::Rejected(error),
        }
    }
}

fn db(error: diesel::result::Error) -> LendingStoreError {
    lending_store_error(&error)
}

fn uuids<'a, T: 'a>(ids: impl IntoIterator<Item = &'a T>, as_uuid: fn(&T) -> &Uuid) -> Vec<Uuid> {
    ids.into_iter().map(|id| *as_uuid(id)).collect()
}

fn missing(what: &str, id: impl std::fmt::Display) -> LendingStoreError {
    LendingStoreError::query(format!("{what} {id} does not exist"))
}

fn touched(rows: usize, what: &str, id: impl std::fmt::Display) -> Result<(), LendingStoreError> {
    if rows == 0 {
        return Err(missing(what, id));
    }
    Ok(())
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, LendingStoreError>
where
    T: TryFrom<R, Error = LendingStoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

async fn load_memberships_of_users(
    conn: &mut AsyncPgConnection,
    users: &[Uuid],
) -> Result<Vec<Membership>, LendingStoreError> {
    let rows: Vec<MembershipRow> = memberships::table
        .filter(memberships::user_id.eq_any(users))
        .select(MembershipRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    decode_all(rows)
}

async fn load_groups(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<(Vec<Group>, Vec<Membership>), LendingStoreError> {
    let group_rows: Vec<GroupRow> = groups::table
        .filter(groups::id.eq_any(ids))
        .select(GroupRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    let roster_rows: Vec<MembershipRow> = memberships::table
        .filter(memberships::group_id.eq_any(ids))
        .select(MembershipRow::as_select())
        .order(memberships::joined_at.asc())
        .load(conn)
        .await
        .map_err(db)?;
    Ok((decode_all(group_rows)?, decode_all(roster_rows)?))
}

async fn load_items(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> Result<Vec<ItemRecord>, LendingStoreError> {
    let item_rows: Vec<ItemRow> = items::table
        .filter(items::id.eq_any(ids))
        .select(ItemRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    let links: Vec<CategoryLinkRow> = item_category_links::table
        .filter(item_category_links::item_id.eq_any(ids))
        .select(CategoryLinkRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    let photo_rows: Vec<PhotoRow> = item_photos::table
        .filter(item_photos::item_id.eq_any(ids))
        .select(PhotoRow::as_select())
        .order((item_photos::created_at.asc(), item_photos::id.asc()))
        .load(conn)
        .await
        .map_err(db)?;
    let tx_rows: Vec<TransactionRow> = transactions::table
        .filter(transactions::item_id.eq_any(ids))
        .select(TransactionRow::as_select())
        .order(transactions::created_at.asc())
        .load(conn)
        .await
        .map_err(db)?;

    let mut categories: BTreeMap<Uuid, BTreeSet<CategoryId>> = BTreeMap::new();
    for link in links {
        categories
            .entry(link.item_id)
            .or_default()
            .insert(CategoryId::from_uuid(link.category_id));
    }
    let mut photos: BTreeMap<Uuid, Vec<ItemPhoto>> = BTreeMap::new();
    for row in photo_rows {
        photos.entry(row.item_id).or_default().push(row.into());
    }
    let mut history: BTreeMap<ItemId, Vec<Transaction>> = BTreeMap::new();
    for tx in decode_all::<_, Transaction>(tx_rows)? {
        history.entry(tx.item_id).or_default().push(tx);
    }

    item_rows
        .into_iter()
        .map(|row| {
            let key = row.id;
            let item: Item = row.into_item(
                categories.remove(&key).unwrap_or_default(),
                photos.remove(&key).unwrap_or_default(),
            )?;
            let all = history.remove(&item.id).unwrap_or_default();
            let has_history = !all.is_empty();
            Ok(ItemRecord {
                item,
                open_transactions: all.into_iter().filter(|tx| tx.status.is_open()).collect(),
                has_history,
            })
        })
        .collect()
}

async fn load_grants(
    conn: &mut AsyncPgConnection,
    item_ids: &[Uuid],
    group_ids: &[Uuid],
    user_ids: &[Uuid],
) -> Result<BTreeSet<Grant>, LendingStoreError> {
    let rows: Vec<GrantRow> = grants::table
        .filter(
            grants::resource_kind
                .eq(KIND_ITEM)
                .and(grants::resource_id.eq_any(item_ids))
                .or(grants::resource_kind
                    .eq(KIND_GROUP)
                    .and(grants::resource_id.eq_any(group_ids)))
                .or(grants::principal_kind
                    .eq(KIND_USER)
                    .and(grants::principal_id.eq_any(user_ids))),
        )
        .select(GrantRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    rows.into_iter().map(Grant::try_from).collect()
}

async fn load_snapshot(
    conn: &mut AsyncPgConnection,
    scope: &SnapshotScope,
) -> Result<LendingSnapshot, LendingStoreError> {
    let mut snapshot = LendingSnapshot::default();
    let user_ids = uuids(&scope.users, UserId::as_uuid);

    for user in &scope.users {
        snapshot.memberships.insert(*user, Vec::new());
    }
    for membership in load_memberships_of_users(conn, &user_ids).await? {
        snapshot
            .memberships
            .entry(membership.user_id)
            .or_default()
            .push(membership);
    }

    let owned: Vec<Uuid> = items::table
        .filter(items::owner_id.eq_any(&user_ids))
        .select(items::id)
        .load(conn)
        .await
        .map_err(db)?;
    let mut item_ids: BTreeSet<Uuid> = uuids(&scope.items, ItemId::as_uuid)
        .into_iter()
        .collect();
    item_ids.extend(owned);
    let item_ids: Vec<Uuid> = item_ids.into_iter().collect();

    let (loaded_groups, rosters) =
        load_groups(conn, &uuids(&scope.groups, GroupId::as_uuid)).await?;
    for group in loaded_groups {
        snapshot.rosters.insert(group.id, Vec::new());
        snapshot.groups.insert(group.id, group);
    }
    for membership in rosters {
        snapshot
            .rosters
            .entry(membership.group_id)
            .or_default()
            .push(membership);
    }

    for record in load_items(conn, &item_ids).await? {
        snapshot.items.insert(record.item.id, record);
    }

    let category_rows: Vec<CategoryRow> = item_categories::table
        .filter(item_categories::id.eq_any(uuids(&scope.categories, CategoryId::as_uuid)))
        .select(CategoryRow::as_select())
        .load(conn)
        .await
        .map_err(db)?;
    snapshot.categories = category_rows
        .into_iter()
        .map(|row| (CategoryId::from_uuid(row.id), ItemCategory::from(row)))
        .collect();

    let loaded_items = uuids(snapshot.items.keys(), ItemId::as_uuid);
    let loaded_groups = uuids(snapshot.groups.keys(), GroupId::as_uuid);
    snapshot.grants = load_grants(conn, &loaded_items, &loaded_groups, &user_ids).await?;

    if let Some(name) = &scope.group_name {
        let row: Option<GroupRow> = groups::table
            .filter(groups::name.eq(name.as_str()))
            .select(GroupRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(db)?;
        snapshot.group_named = row.map(Group::try_from).transpose()?;
    }

    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

async fn write_category_links(
    conn: &mut AsyncPgConnection,
    item: &Item,
) -> Result<(), WorkFailure> {
    let links: Vec<CategoryLinkRow> = item
        .categories
        .iter()
        .map(|category| CategoryLinkRow {
            item_id: *item.id.as_uuid(),
            category_id: *category.as_uuid(),
        })
        .collect();
    diesel::insert_into(item_category_links::table)
        .values(&links)
        .execute(conn)
        .await?;
    Ok(())
}

async fn delete_grant(conn: &mut AsyncPgConnection, grant: &Grant) -> Result<(), WorkFailure> {
    let (principal_kind, principal_id) = principal_key(grant.principal);
    let (resource_kind, resource_id) = resource_key(grant.resource);
    diesel::delete(
        grants::table
            .filter(grants::principal_kind.eq(principal_kind))
            .filter(grants::principal_id.eq(principal_id))
            .filter(grants::resource_kind.eq(resource_kind))
            .filter(grants::resource_id.eq(resource_id))
            .filter(grants::capability.eq(grant.capability.as_str())),
    )
    .execute(conn)
    .await?;
    Ok(())
}

async fn apply_group_change(
    conn: &mut AsyncPgConnection,
    change: &Change,
) -> Result<(), WorkFailure> {
    match change {
        Change::InsertGroup(group) => {
            diesel::insert_into(groups::table)
                .values(GroupRow::from(group))
                .execute(conn)
                .await?;
        }
        Change::UpdateGroup(group) => {
            let rows = diesel::update(groups::table.find(group.id.as_uuid()))
                .set(GroupRow::from(group))
                .execute(conn)
                .await?;
            touched(rows, "group", group.id)?;
        }
        Change::DeleteGroup(id) => {
            let id = *id.as_uuid();
            diesel::delete(
                grants::table.filter(
                    grants::principal_kind
                        .eq(KIND_GROUP)
                        .and(grants::principal_id.eq(id))
                        .or(grants::resource_kind
                            .eq(KIND_GROUP)
                            .and(grants::resource_id.eq(id))),
                ),
            )
            .execute(conn)
            .await?;
            diesel::delete(memberships::table.filter(memberships::group_id.eq(id)))
                .execute(conn)
                .await?;
            diesel::delete(groups::table.find(id))
                .execute(conn)
                .await?;
        }
        Change::InsertMembership(membership) => {
            diesel::insert_into(memberships::table)
                .values(MembershipRow::from(membership))
                .execute(conn)
                .await?;
        }
        Change::UpdateMembership(membership) => {
            let rows = diesel::update(
                memberships::table
                    .filter(memberships::group_id.eq(membership.group_id.as_uuid()))
                    .filter(memberships::user_id.eq(membership.user_id.as_uuid())),
            )
            .set(MembershipRow::from(membership))
            .execute(conn)
            .await?;
            touched(rows, "membership", membership.user_id)?;
        }
        Change::DeleteMembership { group_id, user_id } => {
            diesel::delete(
                memberships::table
                    .filter(memberships::group_id.eq(group_id.as_uuid()))
                    .filter(memberships::user_id.eq(user_id.as_uuid())),
            )
            .execute(conn)
            .await?;
        }
        other => debug!(?other, "not a group change"),
    }
    Ok(())
}

async fn apply_item_change(
    conn: &mut AsyncPgConnection,
    change: &Change,
) -> Result<(), WorkFailure> {
    match change {
        Change::InsertCategory(category) => {
            diesel::insert_into(item_categories::table)
                .values(CategoryRow::from(category))
                .execute(conn)
                .await?;
        }
        Change::InsertItem(item) => {
            diesel::insert_into(items::table)
                .values(ItemRow::from(item))
                .execute(conn)
                .await?;
            write_category_links(conn, item).await?;
        }
        Change::UpdateItem(item) => {
            let rows = diesel::update(items::table.find(item.id.as_uuid()))
                .set(ItemUpdate {
                    name: &item.name,
                    description: &item.description,
                    trust_level_required: item.trust_level_required.ordinal(),
                    updated_at: item.updated_at,
                })
                .execute(conn)
                .await?;
            touched(rows, "item", item.id)?;
            diesel::delete(
                item_category_links::table
                    .filter(item_category_links::item_id.eq(item.id.as_uuid())),
            )
            .execute(conn)
            .await?;
            write_category_links(conn, item).await?;
        }
        Change::DeleteItem(id) => {
            let id = *id.as_uuid();
            let referenced: i64 = transactions::table
                .filter(transactions::item_id.eq(id))
                .count()
                .get_result(conn)
                .await?;
            if referenced > 0 {
                return Err(
                    LendingStoreError::conflict("item is referenced by transactions").into(),
                );
            }
            diesel::delete(item_photos::table.filter(item_photos::item_id.eq(id)))
                .execute(conn)
                .await?;
            diesel::delete(item_category_links::table.filter(item_category_links::item_id.eq(id)))
                .execute(conn)
                .await?;
            diesel::delete(
                grants::table
                    .filter(grants::resource_kind.eq(KIND_ITEM))
                    .filter(grants::resource_id.eq(id)),
            )
            .execute(conn)
            .await?;
            diesel::delete(items::table.find(id)).execute(conn).await?;
        }
        Change::SetItemStatus { item_id, status } => {
            let rows = diesel::update(items::table.find(item_id.as_uuid()))
                .set(items::status.eq(status.ordinal()))
                .execute(conn)
                .await?;
            touched(rows, "item", item_id)?;
        }
        Change::InsertPhoto(photo) => {
            diesel::insert_into(item_photos::table)
                .values(PhotoRow::from(photo))
                .execute(conn)
                .await?;
        }
        Change::DeletePhoto { item_id, photo_id } => {
            diesel::delete(
                item_photos::table
                    .filter(item_photos::id.eq(photo_id.as_uuid()))
                    .filter(item_photos::item_id.eq(item_id.as_uuid())),
            )
            .execute(conn)
            .await?;
        }
        other => debug!(?other, "not an item change"),
    }
    Ok(())
}

async fn apply(conn: &mut AsyncPgConnection, change: &Change) -> Result<(), WorkFailure> {
    match change {
        Change::InsertGroup(_)
        | Change::UpdateGroup(_)
        | Change::DeleteGroup(_)
        | Change::InsertMembership(_)
        | Change::UpdateMembership(_)
        | Change::DeleteMembership { .. } => apply_group_change(conn, change).await,
        Change::InsertCategory(_)
        | Change::InsertItem(_)
        | Change::UpdateItem(_)
        | Change::DeleteItem(_)
        | Change::SetItemStatus { .. }
        | Change::InsertPhoto(_)
        | Change::DeletePhoto { .. } => apply_item_change(conn, change).await,
        Change::InsertTransaction(tx) => {
            diesel::insert_into(transactions::table)
                .values(TransactionRow::from(tx))
                .execute(conn)
                .await?;
            Ok(())
        }
        Change::UpdateTransaction(tx) => {
            let rows = diesel::update(transactions::table.find(tx.id.as_uuid()))
                .set(TransactionRow::from(tx))
                .execute(conn)
                .await?;
            touched(rows, "transaction", tx.id)?;
            Ok(())
        }
        Change::Grant(grant) => {
            diesel::insert_into(grants::table)
                .values(GrantRow::from(grant))
                .on_conflict_do_nothing()
                .execute(conn)
                .await?;
            Ok(())
        }
        Change::Revoke(grant) => delete_grant(conn, grant).await,
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

#[async_trait]
impl LendingStore for DieselLendingStore {
    async fn snapshot(&self, scope: &SnapshotScope) -> Result<LendingSnapshot, LendingStoreError> {
        let mut conn = self.pool.get().await.map_err(lending_pool_error)?;
        load_snapshot(&mut conn, scope).await
    }

    async fn grants_held_by(
        &self,
        principals: &[Principal],
    ) -> Result<Vec<Grant>, LendingStoreError> {
        let (users, groups): (Vec<Uuid>, Vec<Uuid>) =
            principals
                .iter()
                .fold((Vec::new(), Vec::new()), |(mut users, mut groups), p| {
                    match p {
                        Principal::User(id) => users.push(*id.as_uuid()),
                        Principal::Group(id) => groups.push(*id.as_uuid()),
                    }
                    (users, groups)
                });
        let mut conn = self.pool.get().await.map_err(lending_pool_error)?;
        let rows: Vec<GrantRow> = grants::table
            .filter(
                grants::principal_kind
                    .eq(KIND_USER)
                    .and(grants::principal_id.eq_any(&users))
                    .or(grants::principal_kind
                        .eq(KIND_GROUP)
                        .and(grants::principal_id.eq_any(&groups))),
            )
            .select(GrantRow::as_select())
            .load(&mut conn)
            .await
            .map_err(db)?;
        decode_all(rows)
    }

    async fn transactions_involving(
        &self,
        user: UserId,
    ) -> Result<Vec<Transaction>, LendingStoreError> {
        let mut conn = self.pool.get().await.map_err(lending_pool_error)?;
        let id = *user.as_uuid();
        let rows: Vec<TransactionRow> = transactions::table
            .filter(
                transactions::party1_id
                    .eq(id)
                    .or(transactions::party2_id.eq(id)),
            )
            .select(TransactionRow::as_select())
            .order(transactions::updated_at.desc())
            .load(&mut conn)
            .await
            .map_err(db)?;
        decode_all(rows)
    }

    async fn categories(&self) -> Result<Vec<ItemCategory>, LendingStoreError> {
        let mut conn = self.pool.get().await.map_err(lending_pool_error)?;
        let rows: Vec<CategoryRow> = item_categories::table
            .select(CategoryRow::as_select())
            .order(item_categories::name.asc())
            .load(&mut conn)
            .await
            .map_err(db)?;
        Ok(rows.into_iter().map(ItemCategory::from).collect())
    }

    async fn atomically<T, F>(
        &self,
        scope: &SnapshotScope,
        decide: F,
    ) -> Result<Decision<T>, UnitOfWorkError>
    where
        T: Send + 'static,
        F: Fn(&LendingSnapshot) -> Result<Decision<T>, Error> + Send + Sync,
    {
        let mut conn = self.pool.get().await.map_err(lending_pool_error)?;
        let outcome = conn
            .build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    let snapshot = load_snapshot(conn, scope).await?;
                    let decision = decide(&snapshot).map_err(WorkFailure::Rejected)?;
                    for change in decision.changes.changes() {
                        apply(conn, change).await?;
                    }
                    Ok::<_, WorkFailure>(decision)
                }
                .scope_boxed()
            })
            .await;
        outcome.map_err(UnitOfWorkError::from)
    }
}
