//! Integration tests for trust-gated visibility and racing writers.

use std::sync::Arc;

use borrowd::domain::ports::LendingStore;
use borrowd::domain::{
    Capability, ErrorCode, GroupId, Item, ItemAction, ItemChanges, Resource, TrustLevel, UserId,
};
use borrowd::test_support::LendingHarness;
use futures::future::join_all;
use rstest::{fixture, rstest};

struct Street {
    harness: Arc<LendingHarness>,
    owner: UserId,
    neighbour: UserId,
    group: GroupId,
}

#[fixture]
async fn street() -> Street {
    let harness = Arc::new(LendingHarness::new());
    let moderator = harness.user("Mo").await;
    let owner = harness.user("Ava").await;
    let neighbour = harness.user("Bea").await;
    let group = harness
        .open_group(moderator, "Elm Street")
        .await
        .expect("create group");
    harness
        .groups
        .add_user(group, owner, TrustLevel::Medium, false)
        .await
        .expect("add owner");
    harness
        .groups
        .add_user(group, neighbour, TrustLevel::Low, false)
        .await
        .expect("add neighbour");
    Street {
        harness,
        owner,
        neighbour,
        group,
    }
}

async fn can_view(street: &Street, user: UserId, item: &Item) -> bool {
    street
        .harness
        .visibility
        .has_capability(user, Resource::Item(item.id), Capability::View)
        .await
        .expect("capability check")
}

#[rstest]
#[tokio::test]
async fn raising_owner_trust_reveals_item(#[future] street: Street) {
    let street = street.await;
    let drill = street
        .harness
        .item(street.owner, "Drill", TrustLevel::High)
        .await
        .expect("list drill");
    assert!(!can_view(&street, street.neighbour, &drill).await);
    assert!(can_view(&street, street.owner, &drill).await);

    street
        .harness
        .groups
        .update_trust_level(street.group, street.owner, TrustLevel::High)
        .await
        .expect("raise trust");
    assert!(can_view(&street, street.neighbour, &drill).await);

    let visible = street
        .harness
        .visibility
        .items_visible_to(street.neighbour)
        .await
        .expect("visible items");
    assert!(visible.iter().any(|item| item.id == drill.id));
}

#[rstest]
#[tokio::test]
async fn lowering_item_requirement_reveals_item(#[future] street: Street) {
    let street = street.await;
    let saw = street
        .harness
        .item(street.owner, "Saw", TrustLevel::High)
        .await
        .expect("list saw");
    assert!(!can_view(&street, street.neighbour, &saw).await);

    let changes = ItemChanges {
        trust_level_required: Some(TrustLevel::Medium),
        ..ItemChanges::default()
    };
    street
        .harness
        .items
        .update_item(street.owner, saw.id, changes)
        .await
        .expect("lower requirement");
    assert!(can_view(&street, street.neighbour, &saw).await);
}

#[rstest]
#[tokio::test]
async fn leaving_the_group_hides_items(#[future] street: Street) {
    let street = street.await;
    let tent = street
        .harness
        .item(street.owner, "Tent", TrustLevel::Low)
        .await
        .expect("list tent");
    assert!(can_view(&street, street.neighbour, &tent).await);

    street
        .harness
        .groups
        .leave_group(street.group, street.owner)
        .await
        .expect("owner leaves");
    assert!(!can_view(&street, street.neighbour, &tent).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_requests_create_one_transaction(#[future] street: Street) {
    let street = street.await;
    let kayak = street
        .harness
        .item(street.owner, "Kayak", TrustLevel::Low)
        .await
        .expect("list kayak");
    let mut requesters = vec![street.neighbour];
    for name in ["Cal", "Dee", "Eli"] {
        requesters.push(street.harness.user(name).await);
    }

    let actions = &street.harness.actions;
    let outcomes = join_all(
        requesters
            .iter()
            .map(|user| actions.process_action(kayak.id, *user, ItemAction::RequestItem)),
    )
    .await;

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    for error in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(error.code(), ErrorCode::ItemAlreadyRequested);
    }

    let mut on_kayak = 0;
    for user in &requesters {
        let transactions = street
            .harness
            .store
            .transactions_involving(*user)
            .await
            .expect("transactions load");
        on_kayak += transactions
            .iter()
            .filter(|tx| tx.item_id == kayak.id)
            .count();
    }
    assert_eq!(on_kayak, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_demotions_keep_one_moderator() {
    let harness = LendingHarness::new();
    let first = harness.user("Mo").await;
    let second = harness.user("Ned").await;
    let group = harness
        .open_group(first, "Oak Lane")
        .await
        .expect("create group");
    harness
        .groups
        .add_user(group, second, TrustLevel::High, true)
        .await
        .expect("add second moderator");

    let (demoted, removed) = tokio::join!(
        harness
            .groups
            .update_user_membership(group, first, None, Some(false)),
        harness.groups.remove_user(group, second),
    );

    let failures: Vec<ErrorCode> = [demoted.err(), removed.err()]
        .into_iter()
        .flatten()
        .map(|error| error.code())
        .collect();
    assert_eq!(failures, vec![ErrorCode::ModeratorRequired]);

    let moderators = harness
        .groups
        .active_members(group)
        .await
        .expect("active members")
        .into_iter()
        .filter(|membership| membership.is_active_moderator())
        .count();
    assert_eq!(moderators, 1);
}
