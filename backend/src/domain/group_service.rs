//! Driving service for groups, memberships, and moderation.
//!
//! Every membership mutation runs through the moderation guard and the
//! permission projection inside one unit of work, so the roster, the
//! invariant check, and the grant table never disagree.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::ports::{LendingEventSink, LendingStore};
use crate::domain::unit_of_work::UnitOfWork;
use crate::domain::{
    Capability, Change, ChangeSet, Decision, Error, Group, GroupChanges, GroupDraft, GroupId,
    LendingEvent, LendingSnapshot, Membership, MembershipStatus, Principal, Resource,
    STATUS_REASON_MAX, SnapshotScope, TrustLevel, UserId, ensure_moderated_after, holds,
    membership_grants, membership_removal,
};

/// Result of asking to join a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "membership", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinOutcome {
    /// The user is now an active member.
    Joined(Membership),
    /// The user waits for a moderator.
    AwaitingApproval(Membership),
    /// The user was already active; nothing changed.
    AlreadyMember,
    /// The user was already waiting; nothing changed.
    AlreadyPending,
}

fn membership_of(
    snapshot: &LendingSnapshot,
    group: GroupId,
    user: UserId,
) -> Result<Membership, Error> {
    snapshot
        .membership(group, user)
        .cloned()
        .ok_or_else(|| {
            Error::not_found(format!("user {user} is not a member of group {group}"))
                .with_details(json!({ "groupId": group, "userId": user }))
        })
}

fn require_moderator(
    snapshot: &LendingSnapshot,
    group: GroupId,
    user: UserId,
) -> Result<(), Error> {
    if snapshot
        .membership(group, user)
        .is_some_and(Membership::is_active_moderator)
    {
        Ok(())
    } else {
        Err(Error::forbidden("only active moderators may moderate this group"))
    }
}

fn require_capability(
    snapshot: &LendingSnapshot,
    actor: UserId,
    group: GroupId,
    capability: Capability,
) -> Result<(), Error> {
    if holds(
        &snapshot.grants,
        &[Principal::User(actor)],
        Resource::Group(group),
        capability,
    ) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "{} permission required on group {group}",
            capability.as_str()
        )))
    }
}

/// Writes replacing `current` with `next`, after the moderation guard.
fn update_membership(
    snapshot: &LendingSnapshot,
    current: &Membership,
    next: Membership,
) -> Result<Decision<Membership>, Error> {
    ensure_moderated_after(snapshot.roster(current.group_id), current, Some(&next))?;
    let mut changes = ChangeSet::default();
    changes
        .push(Change::UpdateMembership(next.clone()))
        .grants(&membership_grants(&next, snapshot.items_owned_by(next.user_id)));
    Ok(Decision::new(next, changes))
}

/// Writes deleting `current`, after the moderation guard.
fn delete_membership(snapshot: &LendingSnapshot, current: &Membership) -> Result<ChangeSet, Error> {
    ensure_moderated_after(snapshot.roster(current.group_id), current, None)?;
    let mut changes = ChangeSet::default();
    changes
        .grants(&membership_removal(
            current,
            snapshot.items_owned_by(current.user_id),
        ))
        .push(Change::DeleteMembership {
            group_id: current.group_id,
            user_id: current.user_id,
        });
    Ok(changes)
}

/// Writes creating an active membership and announcing it to the group.
fn admit(snapshot: &LendingSnapshot, membership: Membership, changes: &mut ChangeSet) {
    changes.grants(&membership_grants(
        &membership,
        snapshot.items_owned_by(membership.user_id),
    ));
    for peer in snapshot.roster(membership.group_id) {
        if peer.is_active() && peer.user_id != membership.user_id {
            changes.emit(LendingEvent::GroupMemberJoined {
                recipient: peer.user_id,
                member: membership.user_id,
                group_id: membership.group_id,
            });
        }
    }
}

fn decide_join(
    snapshot: &LendingSnapshot,
    group_id: GroupId,
    user: UserId,
    trust_level: TrustLevel,
    now: DateTime<Utc>,
) -> Result<Decision<JoinOutcome>, Error> {
    let group = snapshot.group(group_id)?;
    if let Some(existing) = snapshot.membership(group_id, user) {
        return match existing.status {
            MembershipStatus::Active => Ok(Decision::read_only(JoinOutcome::AlreadyMember)),
            MembershipStatus::Pending => Ok(Decision::read_only(JoinOutcome::AlreadyPending)),
            status => Err(Error::forbidden(format!(
                "membership is {status}; rejoining is not allowed"
            ))),
        };
    }

    let mut changes = ChangeSet::default();
    if group.membership_requires_approval {
        let membership = Membership::new(
            group_id,
            user,
            trust_level,
            false,
            MembershipStatus::Pending,
            now,
        );
        changes.push(Change::InsertMembership(membership.clone()));
        return Ok(Decision::new(
            JoinOutcome::AwaitingApproval(membership),
            changes,
        ));
    }

    let membership = Membership::new(
        group_id,
        user,
        trust_level,
        false,
        MembershipStatus::Active,
        now,
    );
    changes.push(Change::InsertMembership(membership.clone()));
    admit(snapshot, membership.clone(), &mut changes);
    Ok(Decision::new(JoinOutcome::Joined(membership), changes))
}

/// Group and membership service.
pub struct GroupService<S, E> {
    uow: UnitOfWork<S, E>,
    clock: Arc<dyn Clock>,
}

impl<S, E> GroupService<S, E> {
    /// Create the service.
    pub fn new(uow: UnitOfWork<S, E>, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }
}

impl<S, E> GroupService<S, E>
where
    S: LendingStore,
    E: LendingEventSink,
{
    fn roster_scope(group: GroupId, user: UserId) -> SnapshotScope {
        SnapshotScope::default().group(group).user(user)
    }

    /// Create a group with `creator` as its first active moderator.
    ///
    /// # Errors
    /// `Conflict` when the name is taken.
    pub async fn create_group(
        &self,
        creator: UserId,
        draft: GroupDraft,
        initial_trust_level: TrustLevel,
    ) -> Result<Group, Error> {
        let now = self.clock.utc();
        let group_id = GroupId::random();
        let scope = SnapshotScope::default()
            .user(creator)
            .group_name(draft.name.clone());
        self.uow
            .run("create_group", scope, move |snapshot| {
                if snapshot.group_named.is_some() {
                    return Err(Error::conflict(format!(
                        "a group named {} already exists",
                        draft.name
                    )));
                }
                let group = Group {
                    id: group_id,
                    name: draft.name.clone(),
                    description: draft.description.clone(),
                    membership_requires_approval: draft.membership_requires_approval,
                    created_by: creator,
                    created_at: now,
                    updated_by: creator,
                    updated_at: now,
                };
                let founder = Membership::new(
                    group_id,
                    creator,
                    initial_trust_level,
                    true,
                    MembershipStatus::Active,
                    now,
                );
                let mut changes = ChangeSet::default();
                changes
                    .push(Change::InsertGroup(group.clone()))
                    .push(Change::InsertMembership(founder.clone()))
                    .grants(&membership_grants(
                        &founder,
                        snapshot.items_owned_by(creator),
                    ));
                Ok(Decision::new(group, changes))
            })
            .await
    }

    /// Add `user` directly as an active member.
    ///
    /// # Errors
    /// `ExistingMember` when any membership row already exists.
    pub async fn add_user(
        &self,
        group: GroupId,
        user: UserId,
        trust_level: TrustLevel,
        is_moderator: bool,
    ) -> Result<Membership, Error> {
        let now = self.clock.utc();
        self.uow
            .run("add_user", Self::roster_scope(group, user), move |snapshot| {
                snapshot.group(group)?;
                if snapshot.membership(group, user).is_some() {
                    return Err(Error::existing_member(format!(
                        "user {user} is already a member of group {group}"
                    )));
                }
                let membership = Membership::new(
                    group,
                    user,
                    trust_level,
                    is_moderator,
                    MembershipStatus::Active,
                    now,
                );
                let mut changes = ChangeSet::default();
                changes.push(Change::InsertMembership(membership.clone()));
                admit(snapshot, membership.clone(), &mut changes);
                Ok(Decision::new(membership, changes))
            })
            .await
    }

    /// Ask to join; groups requiring approval park the user in `Pending`.
    pub async fn join_group(
        &self,
        group: GroupId,
        user: UserId,
        trust_level: TrustLevel,
    ) -> Result<JoinOutcome, Error> {
        let now = self.clock.utc();
        self.uow
            .run("join_group", Self::roster_scope(group, user), move |snapshot| {
                decide_join(snapshot, group, user, trust_level, now)
            })
            .await
    }

    /// Delete `user`'s membership.
    ///
    /// # Errors
    /// `NotFound` for non-members and `ModeratorRequired` when the group
    /// would lose its last active moderator.
    pub async fn remove_user(&self, group: GroupId, user: UserId) -> Result<(), Error> {
        self.uow
            .run("remove_user", Self::roster_scope(group, user), move |snapshot| {
                let current = membership_of(snapshot, group, user)?;
                Ok(Decision::new((), delete_membership(snapshot, &current)?))
            })
            .await
    }

    /// The member leaves of their own accord.
    pub async fn leave_group(&self, group: GroupId, user: UserId) -> Result<(), Error> {
        self.uow
            .run("leave_group", Self::roster_scope(group, user), move |snapshot| {
                let current = membership_of(snapshot, group, user)?;
                Ok(Decision::new((), delete_membership(snapshot, &current)?))
            })
            .await
    }

    /// Change trust and/or the moderator flag.
    pub async fn update_user_membership(
        &self,
        group: GroupId,
        user: UserId,
        trust_level: Option<TrustLevel>,
        is_moderator: Option<bool>,
    ) -> Result<Membership, Error> {
        self.uow
            .run(
                "update_user_membership",
                Self::roster_scope(group, user),
                move |snapshot| {
                    let current = membership_of(snapshot, group, user)?;
                    let next = Membership {
                        trust_level: trust_level.unwrap_or(current.trust_level),
                        is_moderator: is_moderator.unwrap_or(current.is_moderator),
                        ..current.clone()
                    };
                    update_membership(snapshot, &current, next)
                },
            )
            .await
    }

    /// Member adjusts the trust they place in the group.
    pub async fn update_trust_level(
        &self,
        group: GroupId,
        user: UserId,
        trust_level: TrustLevel,
    ) -> Result<Membership, Error> {
        self.update_user_membership(group, user, Some(trust_level), None)
            .await
    }

    /// Moderator admits a pending member.
    pub async fn approve_member(
        &self,
        group: GroupId,
        moderator: UserId,
        user: UserId,
    ) -> Result<Membership, Error> {
        let now = self.clock.utc();
        let scope = Self::roster_scope(group, user).user(moderator);
        self.uow
            .run("approve_member", scope, move |snapshot| {
                require_moderator(snapshot, group, moderator)?;
                let current = membership_of(snapshot, group, user)?;
                if current.status != MembershipStatus::Pending {
                    return Err(Error::invalid_request(format!(
                        "membership is {}, not PENDING",
                        current.status
                    )));
                }
                let next = current.with_status(MembershipStatus::Active, None, now);
                let mut changes = ChangeSet::default();
                changes.push(Change::UpdateMembership(next.clone()));
                admit(snapshot, next.clone(), &mut changes);
                changes.emit(LendingEvent::GroupMembershipApproved {
                    recipient: user,
                    group_id: group,
                });
                Ok(Decision::new(next, changes))
            })
            .await
    }

    /// Moderator turns away a pending member.
    pub async fn deny_member(
        &self,
        group: GroupId,
        moderator: UserId,
        user: UserId,
    ) -> Result<(), Error> {
        let scope = Self::roster_scope(group, user).user(moderator);
        self.uow
            .run("deny_member", scope, move |snapshot| {
                require_moderator(snapshot, group, moderator)?;
                let current = membership_of(snapshot, group, user)?;
                if current.status != MembershipStatus::Pending {
                    return Err(Error::invalid_request(format!(
                        "membership is {}, not PENDING",
                        current.status
                    )));
                }
                Ok(Decision::new((), delete_membership(snapshot, &current)?))
            })
            .await
    }

    /// Moderator suspends, bans, ends, or reinstates a membership.
    pub async fn change_member_status(
        &self,
        group: GroupId,
        moderator: UserId,
        user: UserId,
        status: MembershipStatus,
        reason: Option<String>,
    ) -> Result<Membership, Error> {
        if status == MembershipStatus::Pending {
            return Err(Error::invalid_request(
                "memberships cannot be moved back to PENDING",
            ));
        }
        if reason
            .as_ref()
            .is_some_and(|r| r.chars().count() > STATUS_REASON_MAX)
        {
            return Err(Error::invalid_request(format!(
                "status reason must be at most {STATUS_REASON_MAX} characters"
            )));
        }
        let now = self.clock.utc();
        let scope = Self::roster_scope(group, user).user(moderator);
        self.uow
            .run("change_member_status", scope, move |snapshot| {
                require_moderator(snapshot, group, moderator)?;
                let current = membership_of(snapshot, group, user)?;
                let next = current.with_status(status, reason.clone(), now);
                update_membership(snapshot, &current, next)
            })
            .await
    }

    /// Moderator removes another member.
    pub async fn remove_member(
        &self,
        group: GroupId,
        moderator: UserId,
        user: UserId,
    ) -> Result<(), Error> {
        if moderator == user {
            return Err(Error::invalid_request(
                "moderators leave a group rather than remove themselves",
            ));
        }
        let scope = Self::roster_scope(group, user).user(moderator);
        self.uow
            .run("remove_member", scope, move |snapshot| {
                require_moderator(snapshot, group, moderator)?;
                let current = membership_of(snapshot, group, user)?;
                let mut changes = delete_membership(snapshot, &current)?;
                changes.emit(LendingEvent::GroupMemberRemoved {
                    recipient: user,
                    group_id: group,
                });
                Ok(Decision::new((), changes))
            })
            .await
    }

    /// Edit group attributes; requires `Edit` on the group.
    pub async fn update_group(
        &self,
        actor: UserId,
        group: GroupId,
        changes: GroupChanges,
    ) -> Result<Group, Error> {
        let now = self.clock.utc();
        let mut scope = Self::roster_scope(group, actor);
        if let Some(name) = &changes.name {
            scope = scope.group_name(name.clone());
        }
        self.uow
            .run("update_group", scope, move |snapshot| {
                let current = snapshot.group(group)?;
                require_capability(snapshot, actor, group, Capability::Edit)?;
                if changes.is_empty() {
                    return Ok(Decision::read_only(current.clone()));
                }
                if snapshot.group_named.as_ref().is_some_and(|g| g.id != group) {
                    return Err(Error::conflict("another group already uses that name"));
                }
                let updated = changes.apply_to(current, actor, now);
                let mut writes = ChangeSet::default();
                writes.push(Change::UpdateGroup(updated.clone()));
                Ok(Decision::new(updated, writes))
            })
            .await
    }

    /// Delete a group and everything hanging off it; requires `Delete`.
    ///
    /// The moderator guard does not apply to the cascade.
    pub async fn delete_group(&self, actor: UserId, group: GroupId) -> Result<(), Error> {
        self.uow
            .run("delete_group", Self::roster_scope(group, actor), move |snapshot| {
                snapshot.group(group)?;
                require_capability(snapshot, actor, group, Capability::Delete)?;
                let mut changes = ChangeSet::default();
                changes.push(Change::DeleteGroup(group));
                Ok(Decision::new((), changes))
            })
            .await
    }

    /// Memberships awaiting approval; moderators only.
    pub async fn pending_members(
        &self,
        group: GroupId,
        moderator: UserId,
    ) -> Result<Vec<Membership>, Error> {
        let snapshot = self
            .uow
            .snapshot(&Self::roster_scope(group, moderator))
            .await?;
        snapshot.group(group)?;
        require_moderator(&snapshot, group, moderator)?;
        Ok(snapshot
            .roster(group)
            .iter()
            .filter(|m| m.status == MembershipStatus::Pending)
            .cloned()
            .collect())
    }

    /// Active members of the group.
    pub async fn active_members(&self, group: GroupId) -> Result<Vec<Membership>, Error> {
        let snapshot = self
            .uow
            .snapshot(&SnapshotScope::default().group(group))
            .await?;
        snapshot.group(group)?;
        Ok(snapshot
            .roster(group)
            .iter()
            .filter(|m| m.is_active())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "group_service_tests.rs"]
mod tests;
