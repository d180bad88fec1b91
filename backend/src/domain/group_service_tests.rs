//! Tests for the group and moderation service.

use rstest::{fixture, rstest};

use super::*;
use crate::domain::{ErrorCode, GroupName};
use crate::test_support::LendingHarness;

struct Club {
    harness: LendingHarness,
    group: GroupId,
    founder: UserId,
    member: UserId,
}

#[fixture]
async fn club() -> Club {
    let harness = LendingHarness::new();
    let founder = harness.user("Fern").await;
    let member = harness.user("Milo").await;
    let group = harness
        .open_group(founder, "Tool library")
        .await
        .expect("group created");
    harness
        .groups
        .add_user(group, member, TrustLevel::Medium, false)
        .await
        .expect("member added");
    harness.events.take();
    Club {
        harness,
        group,
        founder,
        member,
    }
}

async fn can(club: &Club, user: UserId, capability: Capability) -> bool {
    club.harness
        .visibility
        .has_capability(user, Resource::Group(club.group), capability)
        .await
        .expect("capability check")
}

#[rstest]
#[tokio::test]
async fn creation_seeds_a_moderator(#[future] club: Club) {
    let club = club.await;
    let moderators: Vec<_> = club
        .harness
        .groups
        .active_members(club.group)
        .await
        .expect("members")
        .into_iter()
        .filter(|m| m.is_moderator)
        .map(|m| m.user_id)
        .collect();
    assert_eq!(moderators, vec![club.founder]);
    assert!(can(&club, club.founder, Capability::Delete).await);
    assert!(can(&club, club.member, Capability::View).await);
    assert!(!can(&club, club.member, Capability::Edit).await);
}

#[rstest]
#[tokio::test]
async fn duplicate_group_names_conflict(#[future] club: Club) {
    let club = club.await;
    let draft = GroupDraft::new("Tool library").expect("valid name");
    let error = club
        .harness
        .groups
        .create_group(club.member, draft, TrustLevel::High)
        .await
        .expect_err("name taken");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn sole_moderator_cannot_leave_or_be_demoted(#[future] club: Club) {
    let club = club.await;
    let groups = &club.harness.groups;

    let error = groups
        .remove_user(club.group, club.founder)
        .await
        .expect_err("last moderator");
    assert_eq!(error.code(), ErrorCode::ModeratorRequired);

    let error = groups
        .update_user_membership(club.group, club.founder, None, Some(false))
        .await
        .expect_err("last moderator");
    assert_eq!(error.code(), ErrorCode::ModeratorRequired);

    groups
        .update_user_membership(club.group, club.member, None, Some(true))
        .await
        .expect("promote second moderator");
    groups
        .remove_user(club.group, club.founder)
        .await
        .expect("founder may now leave");
    assert!(!can(&club, club.founder, Capability::View).await);
}

#[rstest]
#[tokio::test]
async fn adding_existing_member_is_rejected(#[future] club: Club) {
    let club = club.await;
    let error = club
        .harness
        .groups
        .add_user(club.group, club.member, TrustLevel::High, false)
        .await
        .expect_err("already a member");
    assert_eq!(error.code(), ErrorCode::ExistingMember);
}

#[rstest]
#[tokio::test]
async fn removing_non_member_is_not_found(#[future] club: Club) {
    let club = club.await;
    let error = club
        .harness
        .groups
        .remove_user(club.group, UserId::random())
        .await
        .expect_err("not a member");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn approval_flow_admits_pending_members() {
    let harness = LendingHarness::new();
    let founder = harness.user("Fern").await;
    let applicant = harness.user("Ava").await;
    let group = harness
        .groups
        .create_group(
            founder,
            GroupDraft::new("Closed circle").expect("valid name"),
            TrustLevel::High,
        )
        .await
        .expect("group created")
        .id;

    let outcome = harness
        .groups
        .join_group(group, applicant, TrustLevel::Low)
        .await
        .expect("join accepted");
    assert!(matches!(outcome, JoinOutcome::AwaitingApproval(_)));
    assert_eq!(
        harness
            .groups
            .join_group(group, applicant, TrustLevel::Low)
            .await
            .expect("repeat join"),
        JoinOutcome::AlreadyPending
    );

    let pending = harness
        .groups
        .pending_members(group, founder)
        .await
        .expect("moderator lists pending");
    assert_eq!(pending.len(), 1);

    let error = harness
        .groups
        .approve_member(group, applicant, applicant)
        .await
        .expect_err("applicant is not a moderator");
    assert_eq!(error.code(), ErrorCode::Forbidden);

    let approved = harness
        .groups
        .approve_member(group, founder, applicant)
        .await
        .expect("approved");
    assert_eq!(approved.status, MembershipStatus::Active);
    assert!(harness.events.events().contains(&LendingEvent::GroupMembershipApproved {
        recipient: applicant,
        group_id: group,
    }));
    assert!(harness.events.events().contains(&LendingEvent::GroupMemberJoined {
        recipient: founder,
        member: applicant,
        group_id: group,
    }));
}

#[rstest]
#[tokio::test]
async fn deny_deletes_pending_membership() {
    let harness = LendingHarness::new();
    let founder = harness.user("Fern").await;
    let applicant = harness.user("Ava").await;
    let group = harness
        .groups
        .create_group(
            founder,
            GroupDraft::new("Closed circle").expect("valid name"),
            TrustLevel::High,
        )
        .await
        .expect("group created")
        .id;
    harness
        .groups
        .join_group(group, applicant, TrustLevel::Low)
        .await
        .expect("join");

    harness
        .groups
        .deny_member(group, founder, applicant)
        .await
        .expect("denied");

    assert!(
        harness
            .groups
            .pending_members(group, founder)
            .await
            .expect("pending")
            .is_empty()
    );
}

#[rstest]
#[tokio::test]
async fn banned_members_cannot_rejoin(#[future] club: Club) {
    let club = club.await;
    let banned = club
        .harness
        .groups
        .change_member_status(
            club.group,
            club.founder,
            club.member,
            MembershipStatus::Banned,
            Some("never returned the drill".to_owned()),
        )
        .await
        .expect("ban succeeds");
    assert_eq!(
        banned.status_changed_reason.as_deref(),
        Some("never returned the drill")
    );
    assert!(!can(&club, club.member, Capability::View).await);

    let error = club
        .harness
        .groups
        .join_group(club.group, club.member, TrustLevel::High)
        .await
        .expect_err("banned");
    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn sole_moderator_cannot_suspend_themselves(#[future] club: Club) {
    let club = club.await;
    let error = club
        .harness
        .groups
        .change_member_status(
            club.group,
            club.founder,
            club.founder,
            MembershipStatus::Suspended,
            None,
        )
        .await
        .expect_err("would orphan group");
    assert_eq!(error.code(), ErrorCode::ModeratorRequired);
}

#[rstest]
#[tokio::test]
async fn remove_member_notifies_the_removed_user(#[future] club: Club) {
    let club = club.await;
    club.harness
        .groups
        .remove_member(club.group, club.founder, club.member)
        .await
        .expect("removed");

    assert_eq!(
        club.harness.events.events(),
        vec![LendingEvent::GroupMemberRemoved {
            recipient: club.member,
            group_id: club.group,
        }]
    );

    let error = club
        .harness
        .groups
        .remove_member(club.group, club.founder, club.founder)
        .await
        .expect_err("self removal");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn group_edits_need_edit_capability(#[future] club: Club) {
    let club = club.await;
    let rename = GroupChanges {
        name: Some(GroupName::new("Tool shed").expect("valid name")),
        ..GroupChanges::default()
    };

    let error = club
        .harness
        .groups
        .update_group(club.member, club.group, rename.clone())
        .await
        .expect_err("member lacks edit");
    assert_eq!(error.code(), ErrorCode::Forbidden);

    club.harness.clock.advance_minutes(5);
    let updated = club
        .harness
        .groups
        .update_group(club.founder, club.group, rename)
        .await
        .expect("moderator edits");
    assert_eq!(updated.name.as_str(), "Tool shed");
    assert_eq!(updated.updated_by, club.founder);
    assert!(updated.updated_at > updated.created_at);
}

#[rstest]
#[tokio::test]
async fn deleting_group_cascades_grants_but_keeps_item_ownership(#[future] club: Club) {
    let club = club.await;
    let item = club
        .harness
        .item(club.member, "Drill", TrustLevel::Low)
        .await
        .expect("item");
    assert!(
        club.harness
            .visibility
            .has_capability(club.founder, Resource::Item(item.id), Capability::View)
            .await
            .expect("check")
    );

    let error = club
        .harness
        .groups
        .delete_group(club.member, club.group)
        .await
        .expect_err("member lacks delete");
    assert_eq!(error.code(), ErrorCode::Forbidden);

    club.harness
        .groups
        .delete_group(club.founder, club.group)
        .await
        .expect("moderator deletes");

    let visibility = &club.harness.visibility;
    assert!(
        !visibility
            .has_capability(club.founder, Resource::Item(item.id), Capability::View)
            .await
            .expect("check")
    );
    assert!(
        visibility
            .has_capability(club.member, Resource::Item(item.id), Capability::Edit)
            .await
            .expect("check")
    );
    let error = club
        .harness
        .groups
        .active_members(club.group)
        .await
        .expect_err("group gone");
    assert_eq!(error.code(), ErrorCode::NotFound);
}
