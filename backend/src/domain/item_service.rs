//! Driving service for items, photos, and the category catalogue.
//!
//! Item writes recompute the owner's grants and the item's group
//! visibility in the same unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::ports::{LendingEventSink, LendingStore};
use crate::domain::unit_of_work::{UnitOfWork, map_store_error};
use crate::domain::{
    CategoryId, Change, ChangeSet, Decision, Error, Item, ItemCategory, ItemChanges, ItemDraft,
    ItemId, ItemPhoto, ItemRecord, ItemValidationError, LendingSnapshot, PhotoId, SnapshotScope,
    UserId, item_group_visibility, owner_item_grants, validate_photo_url,
};

fn invalid(error: ItemValidationError) -> Error {
    Error::invalid_request(error.to_string())
}

fn owned_record(
    snapshot: &LendingSnapshot,
    item: ItemId,
    actor: UserId,
) -> Result<&ItemRecord, Error> {
    let record = snapshot.item(item)?;
    if record.item.owner != actor {
        return Err(Error::forbidden("only the owner may change this item"));
    }
    Ok(record)
}

fn ensure_categories_exist<'a>(
    snapshot: &LendingSnapshot,
    categories: impl IntoIterator<Item = &'a CategoryId>,
) -> Result<(), Error> {
    match categories
        .into_iter()
        .find(|id| !snapshot.categories.contains_key(id))
    {
        Some(unknown) => Err(Error::invalid_request(format!("unknown category {unknown}"))),
        None => Ok(()),
    }
}

/// Grant rows for an item written by its owner.
fn item_grant_changes(snapshot: &LendingSnapshot, item: &Item, changes: &mut ChangeSet) {
    let mut delta = owner_item_grants(item);
    delta.merge(item_group_visibility(item, snapshot.memberships_of(item.owner)));
    changes.grants(&delta);
}

fn new_photo(item_id: ItemId, url: String, now: DateTime<Utc>) -> ItemPhoto {
    ItemPhoto {
        id: PhotoId::random(),
        item_id,
        url,
        created_at: now,
    }
}

/// Item lifecycle service.
pub struct ItemService<S, E> {
    uow: UnitOfWork<S, E>,
    clock: Arc<dyn Clock>,
}

impl<S, E> ItemService<S, E> {
    /// Create the service.
    pub fn new(uow: UnitOfWork<S, E>, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }
}

impl<S, E> ItemService<S, E>
where
    S: LendingStore,
    E: LendingEventSink,
{
    /// Add a category to the catalogue.
    ///
    /// # Errors
    /// `InvalidRequest` for bad input and `Conflict` for a duplicate name.
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<ItemCategory, Error> {
        let category = ItemCategory::try_new(name, description).map_err(invalid)?;
        let folded = category.name.to_lowercase();
        let existing = self.list_categories().await?;
        if existing.iter().any(|c| c.name.to_lowercase() == folded) {
            return Err(Error::conflict(format!(
                "category {} already exists",
                category.name
            )));
        }
        self.uow
            .run("create_category", SnapshotScope::default(), move |_| {
                let mut changes = ChangeSet::default();
                changes.push(Change::InsertCategory(category.clone()));
                Ok(Decision::new(category.clone(), changes))
            })
            .await
    }

    /// The catalogue ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<ItemCategory>, Error> {
        self.uow
            .store()
            .categories()
            .await
            .map_err(map_store_error)
    }

    /// List a new item for `owner`.
    pub async fn create_item(&self, owner: UserId, draft: ItemDraft) -> Result<Item, Error> {
        let now = self.clock.utc();
        let item = draft.into_item(owner, now);
        let scope = SnapshotScope::default()
            .user(owner)
            .categories(item.categories.iter().copied());
        self.uow
            .run("create_item", scope, move |snapshot| {
                ensure_categories_exist(snapshot, &item.categories)?;
                let mut changes = ChangeSet::default();
                changes.push(Change::InsertItem(item.clone()));
                item_grant_changes(snapshot, &item, &mut changes);
                Ok(Decision::new(item.clone(), changes))
            })
            .await
    }

    /// Owner edits an item; visibility is re-projected when the trust
    /// requirement changes.
    pub async fn update_item(
        &self,
        actor: UserId,
        item_id: ItemId,
        changes: ItemChanges,
    ) -> Result<Item, Error> {
        let now = self.clock.utc();
        let scope = SnapshotScope::default()
            .item(item_id)
            .user(actor)
            .categories(changes.categories.iter().flatten().copied());
        self.uow
            .run("update_item", scope, move |snapshot| {
                let record = owned_record(snapshot, item_id, actor)?;
                if let Some(categories) = &changes.categories {
                    ensure_categories_exist(snapshot, categories)?;
                }
                let updated = changes.apply_to(&record.item, now).map_err(invalid)?;
                let mut writes = ChangeSet::default();
                writes.push(Change::UpdateItem(updated.clone()));
                item_grant_changes(snapshot, &updated, &mut writes);
                Ok(Decision::new(updated, writes))
            })
            .await
    }

    /// Owner deletes an item that has never been borrowed.
    ///
    /// # Errors
    /// `Conflict` once any transaction references the item.
    pub async fn delete_item(&self, actor: UserId, item_id: ItemId) -> Result<(), Error> {
        self.uow
            .run(
                "delete_item",
                SnapshotScope::default().item(item_id),
                move |snapshot| {
                    let record = owned_record(snapshot, item_id, actor)?;
                    if record.has_history {
                        return Err(Error::conflict(
                            "items with borrowing history cannot be deleted",
                        ));
                    }
                    let mut changes = ChangeSet::default();
                    changes.push(Change::DeleteItem(item_id));
                    Ok(Decision::new((), changes))
                },
            )
            .await
    }

    /// Owner attaches a photo reference.
    pub async fn add_item_photo(
        &self,
        actor: UserId,
        item_id: ItemId,
        url: &str,
    ) -> Result<ItemPhoto, Error> {
        let url = validate_photo_url(url).map_err(invalid)?;
        let photo = new_photo(item_id, url, self.clock.utc());
        self.uow
            .run(
                "add_item_photo",
                SnapshotScope::default().item(item_id),
                move |snapshot| {
                    owned_record(snapshot, item_id, actor)?;
                    let mut changes = ChangeSet::default();
                    changes.push(Change::InsertPhoto(photo.clone()));
                    Ok(Decision::new(photo.clone(), changes))
                },
            )
            .await
    }

    /// Owner detaches a photo.
    pub async fn remove_item_photo(
        &self,
        actor: UserId,
        item_id: ItemId,
        photo_id: PhotoId,
    ) -> Result<(), Error> {
        self.uow
            .run(
                "remove_item_photo",
                SnapshotScope::default().item(item_id),
                move |snapshot| {
                    let record = owned_record(snapshot, item_id, actor)?;
                    if !record.item.photos.iter().any(|p| p.id == photo_id) {
                        return Err(Error::not_found(format!("photo {photo_id} not found")));
                    }
                    let mut changes = ChangeSet::default();
                    changes.push(Change::DeletePhoto { item_id, photo_id });
                    Ok(Decision::new((), changes))
                },
            )
            .await
    }
}

#[cfg(test)]
#[path = "item_service_tests.rs"]
mod tests;
