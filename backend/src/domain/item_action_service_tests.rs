//! Tests for the borrowing workflow service.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    FixtureLendingEventSink, FixtureUserDirectory, LendingStore, MockUserDirectory,
};
use crate::domain::{ErrorCode, Item, ItemStatus, TransactionStatus, TrustLevel};
use crate::test_support::{FixtureClock, LendingHarness};

struct Cast {
    harness: LendingHarness,
    owner: UserId,
    borrower: UserId,
    onlooker: UserId,
    item: Item,
}

#[fixture]
async fn cast() -> Cast {
    let harness = LendingHarness::new();
    let owner = harness.user("Olive").await;
    let borrower = harness.user("Bea").await;
    let onlooker = harness.user("Otto").await;
    let item = harness
        .item(owner, "Ladder", TrustLevel::Low)
        .await
        .expect("item created");
    Cast {
        harness,
        owner,
        borrower,
        onlooker,
        item,
    }
}

async fn item_status(cast: &Cast) -> ItemStatus {
    let snapshot = cast
        .harness
        .store
        .snapshot(&SnapshotScope::default().item(cast.item.id))
        .await
        .expect("snapshot loads");
    snapshot.item(cast.item.id).expect("item exists").item.status
}

async fn act(cast: &Cast, user: UserId, action: ItemAction) -> Result<Transaction, Error> {
    cast.harness
        .actions
        .process_action(cast.item.id, user, action)
        .await
}

#[rstest]
#[tokio::test]
async fn full_cycle_projects_item_status(#[future] cast: Cast) {
    let cast = cast.await;

    let requested = act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request succeeds");
    assert_eq!(requested.status, TransactionStatus::Requested);
    assert_eq!(requested.party1, cast.owner);
    assert_eq!(requested.updated_by, cast.borrower);
    assert_eq!(item_status(&cast).await, ItemStatus::Available);

    act(&cast, cast.owner, ItemAction::AcceptRequest)
        .await
        .expect("accept succeeds");
    assert_eq!(item_status(&cast).await, ItemStatus::Reserved);

    act(&cast, cast.borrower, ItemAction::MarkCollected)
        .await
        .expect("collection asserted");
    act(&cast, cast.owner, ItemAction::ConfirmCollected)
        .await
        .expect("collection confirmed");
    assert_eq!(item_status(&cast).await, ItemStatus::Borrowed);

    act(&cast, cast.borrower, ItemAction::MarkReturned)
        .await
        .expect("return asserted");
    let returned = act(&cast, cast.owner, ItemAction::ConfirmReturned)
        .await
        .expect("return confirmed");
    assert_eq!(returned.status, TransactionStatus::Returned);
    assert_eq!(item_status(&cast).await, ItemStatus::Available);

    let kinds: Vec<&str> = cast
        .harness
        .events
        .events()
        .iter()
        .map(LendingEvent::kind)
        .collect();
    assert_eq!(
        kinds,
        ["ITEM_REQUESTED", "ITEM_REQUEST_ACCEPTED", "ITEM_RETURNED"]
    );
}

#[rstest]
#[tokio::test]
async fn second_requester_is_told_item_is_requested(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("first request succeeds");

    let error = act(&cast, cast.onlooker, ItemAction::RequestItem)
        .await
        .expect_err("second request refused");

    assert_eq!(error.code(), ErrorCode::ItemAlreadyRequested);
    assert!(error.is_invalid_item_action());
}

#[rstest]
#[tokio::test]
async fn repeat_request_by_same_user_is_invalid(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("first request succeeds");

    let error = act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect_err("repeat refused");

    assert_eq!(error.code(), ErrorCode::InvalidItemAction);
}

#[rstest]
#[tokio::test]
async fn asserting_party_cannot_confirm_own_assertion(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request");
    act(&cast, cast.owner, ItemAction::AcceptRequest)
        .await
        .expect("accept");
    act(&cast, cast.owner, ItemAction::MarkCollected)
        .await
        .expect("owner asserts collection");

    let error = act(&cast, cast.owner, ItemAction::ConfirmCollected)
        .await
        .expect_err("owner cannot confirm");
    assert_eq!(error.code(), ErrorCode::InvalidItemAction);

    let context = cast
        .harness
        .actions
        .resolve_actions(cast.item.id, cast.borrower)
        .await
        .expect("resolves");
    assert_eq!(context.actions, vec![ItemAction::ConfirmCollected]);
    assert_eq!(
        context.status_text,
        "Olive marked item as collected, confirm you have received it."
    );
}

#[rstest]
#[tokio::test]
async fn status_text_hides_requester_from_onlookers(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request");

    let owner_view = cast
        .harness
        .actions
        .resolve_actions(cast.item.id, cast.owner)
        .await
        .expect("owner view");
    assert_eq!(
        owner_view.actions,
        vec![ItemAction::AcceptRequest, ItemAction::RejectRequest]
    );
    assert_eq!(owner_view.status_text, "Bea has requested to borrow this item!");

    let requester_view = cast
        .harness
        .actions
        .resolve_actions(cast.item.id, cast.borrower)
        .await
        .expect("requester view");
    assert_eq!(
        requester_view.status_text,
        "Requested to borrow, waiting on owner response..."
    );

    let onlooker_view = cast
        .harness
        .actions
        .resolve_actions(cast.item.id, cast.onlooker)
        .await
        .expect("onlooker view");
    assert!(onlooker_view.actions.is_empty());
    assert_eq!(onlooker_view.status_text, "Item is reserved");
}

#[rstest]
#[tokio::test]
async fn cancelling_accepted_borrow_frees_item_and_notifies_owner(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request");
    act(&cast, cast.owner, ItemAction::AcceptRequest)
        .await
        .expect("accept");
    cast.harness.events.take();

    let cancelled = act(&cast, cast.borrower, ItemAction::CancelRequest)
        .await
        .expect("cancel succeeds");

    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(item_status(&cast).await, ItemStatus::Available);
    assert_eq!(
        cast.harness.events.events(),
        vec![LendingEvent::ItemRequestCancelled {
            recipient: cast.owner,
            item_id: cast.item.id,
            transaction_id: cancelled.id,
        }]
    );
}

#[rstest]
#[tokio::test]
async fn owner_hears_of_return_only_once_confirmed(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request");
    act(&cast, cast.owner, ItemAction::AcceptRequest)
        .await
        .expect("accept");
    act(&cast, cast.borrower, ItemAction::MarkCollected)
        .await
        .expect("mark collected");
    act(&cast, cast.owner, ItemAction::ConfirmCollected)
        .await
        .expect("confirm collected");
    cast.harness.events.take();

    act(&cast, cast.borrower, ItemAction::MarkReturned)
        .await
        .expect("mark returned");
    assert!(cast.harness.events.take().is_empty());

    let returned = act(&cast, cast.owner, ItemAction::ConfirmReturned)
        .await
        .expect("confirm returned");
    assert_eq!(returned.status, TransactionStatus::Returned);
    assert_eq!(
        cast.harness.events.events(),
        vec![LendingEvent::ItemReturned {
            recipient: cast.owner,
            item_id: cast.item.id,
            transaction_id: returned.id,
        }]
    );
}

#[rstest]
#[tokio::test]
async fn dashboards_split_by_role(#[future] cast: Cast) {
    let cast = cast.await;
    act(&cast, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request");
    let actions = &cast.harness.actions;

    assert_eq!(
        actions
            .borrow_requests_to(cast.owner)
            .await
            .expect("to owner")
            .len(),
        1
    );
    assert!(
        actions
            .borrow_requests_from(cast.owner)
            .await
            .expect("from owner")
            .is_empty()
    );
    assert_eq!(
        actions
            .borrow_requests_from(cast.borrower)
            .await
            .expect("from borrower")
            .len(),
        1
    );
    assert!(
        actions
            .pending_transactions_for(cast.onlooker)
            .await
            .expect("onlooker")
            .is_empty()
    );

    act(&cast, cast.owner, ItemAction::AcceptRequest)
        .await
        .expect("accept");
    act(&cast, cast.borrower, ItemAction::MarkCollected)
        .await
        .expect("collect");
    assert!(
        actions
            .pending_transactions_for(cast.borrower)
            .await
            .expect("borrower pending")
            .is_empty()
    );
    assert_eq!(
        actions
            .current_borrows_for(cast.borrower)
            .await
            .expect("current borrows")
            .len(),
        1
    );
}

#[rstest]
#[tokio::test]
async fn unknown_item_is_not_found() {
    let harness = LendingHarness::new();
    let error = harness
        .actions
        .resolve_actions(ItemId::random(), UserId::random())
        .await
        .expect_err("missing item");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn directory_outage_surfaces_as_service_unavailable(#[future] cast: Cast) {
    let cast = cast.await;
    let mut directory = MockUserDirectory::new();
    directory
        .expect_find_user()
        .returning(|_| Err(UserDirectoryError::connection("directory offline")));
    let uow = UnitOfWork::new(
        Arc::clone(&cast.harness.store),
        Arc::clone(&cast.harness.events),
    );
    let service = ItemActionService::new(
        uow,
        Arc::new(directory),
        Arc::new(FixtureClock::default()),
    );

    let error = service
        .resolve_actions(cast.item.id, cast.borrower)
        .await
        .expect_err("directory down");
    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn unknown_users_get_generic_names(#[future] cast: Cast) {
    let cast = cast.await;
    let uow = UnitOfWork::new(
        Arc::clone(&cast.harness.store),
        Arc::new(FixtureLendingEventSink),
    );
    let service = ItemActionService::new(
        uow,
        Arc::new(FixtureUserDirectory),
        Arc::new(FixtureClock::default()),
    );

    service
        .process_action(cast.item.id, cast.borrower, ItemAction::RequestItem)
        .await
        .expect("request succeeds");
    let context = service
        .resolve_actions(cast.item.id, cast.owner)
        .await
        .expect("owner context");
    assert_eq!(context.status_text, "Someone has requested to borrow this item!");
}
