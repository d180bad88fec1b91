//! Read-side queries over the grant table.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::LendingStore;
use crate::domain::unit_of_work::map_store_error;
use crate::domain::{
    Capability, Error, Grant, Group, Item, Principal, Resource, SnapshotScope, UserId, holds,
};

/// Answers "what can this user see or do".
pub struct VisibilityService<S> {
    store: Arc<S>,
}

impl<S> VisibilityService<S> {
    /// Create the service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: LendingStore> VisibilityService<S> {
    /// `user` plus every group where they are an active member.
    async fn principals_for(&self, user: UserId) -> Result<Vec<Principal>, Error> {
        let snapshot = self
            .store
            .snapshot(&SnapshotScope::default().user(user))
            .await
            .map_err(map_store_error)?;
        let mut principals = vec![Principal::User(user)];
        principals.extend(
            snapshot
                .memberships_of(user)
                .iter()
                .filter(|m| m.is_active())
                .map(|m| Principal::Group(m.group_id)),
        );
        Ok(principals)
    }

    async fn grants_for(&self, principals: &[Principal]) -> Result<Vec<Grant>, Error> {
        self.store
            .grants_held_by(principals)
            .await
            .map_err(map_store_error)
    }

    /// Items `user` may view, directly or through an active group.
    pub async fn items_visible_to(&self, user: UserId) -> Result<Vec<Item>, Error> {
        let principals = self.principals_for(user).await?;
        let grants = self.grants_for(&principals).await?;
        let scope = grants
            .iter()
            .filter(|g| g.capability == Capability::View)
            .filter_map(|g| match g.resource {
                Resource::Item(id) => Some(id),
                Resource::Group(_) => None,
            })
            .fold(SnapshotScope::default(), SnapshotScope::item);
        let snapshot = self.store.snapshot(&scope).await.map_err(map_store_error)?;
        debug!(%user, visible = snapshot.items.len(), "resolved visible items");
        Ok(snapshot.items.into_values().map(|r| r.item).collect())
    }

    /// Groups `user` may view.
    pub async fn groups_visible_to(&self, user: UserId) -> Result<Vec<Group>, Error> {
        let grants = self.grants_for(&[Principal::User(user)]).await?;
        let scope = grants
            .iter()
            .filter(|g| g.capability == Capability::View)
            .filter_map(|g| match g.resource {
                Resource::Group(id) => Some(id),
                Resource::Item(_) => None,
            })
            .fold(SnapshotScope::default(), SnapshotScope::group);
        let snapshot = self.store.snapshot(&scope).await.map_err(map_store_error)?;
        Ok(snapshot.groups.into_values().collect())
    }

    /// Whether `user` holds `capability` on `resource`.
    pub async fn has_capability(
        &self,
        user: UserId,
        resource: Resource,
        capability: Capability,
    ) -> Result<bool, Error> {
        let principals = self.principals_for(user).await?;
        let grants = self.grants_for(&principals).await?;
        Ok(holds(&grants, &principals, resource, capability))
    }
}
