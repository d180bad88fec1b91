//! Tests for the item action resolver and transition decisions.

use super::*;
use crate::domain::{CategoryId, ErrorCode, ItemDraft};
use rstest::{fixture, rstest};
use TransactionStatus as S;

struct Fixture {
    item: Item,
    owner: UserId,
    borrower: UserId,
    stranger: UserId,
}

#[fixture]
fn fx() -> Fixture {
    let owner = UserId::random();
    let item = ItemDraft::try_new("Ladder", "Six metre", [CategoryId::random()])
        .expect("valid draft")
        .into_item(owner, Utc::now());
    Fixture {
        item,
        owner,
        borrower: UserId::random(),
        stranger: UserId::random(),
    }
}

fn tx_in(fx: &Fixture, status: TransactionStatus, updated_by: UserId) -> Transaction {
    let mut tx = Transaction::request(fx.item.id, fx.owner, fx.borrower, Utc::now());
    tx.status = status;
    tx.updated_by = updated_by;
    tx
}

fn item_for(fx: &Fixture, status: TransactionStatus) -> Item {
    let mut item = fx.item.clone();
    if let Some(projected) = status.item_status() {
        item.status = projected;
    }
    item
}

#[rstest]
fn available_item_offers_request_to_non_owner(fx: Fixture) {
    assert_eq!(
        legal_actions(&fx.item, &[], fx.stranger).expect("resolves"),
        vec![ItemAction::RequestItem]
    );
    assert!(legal_actions(&fx.item, &[], fx.owner).expect("resolves").is_empty());
}

#[rstest]
#[case(ItemStatus::Reserved)]
#[case(ItemStatus::Borrowed)]
fn unavailable_item_offers_nothing_to_strangers(fx: Fixture, #[case] status: ItemStatus) {
    let mut item = fx.item.clone();
    item.status = status;
    assert!(legal_actions(&item, &[], fx.stranger).expect("resolves").is_empty());
}

#[rstest]
#[case(
    S::Requested,
    vec![ItemAction::AcceptRequest, ItemAction::RejectRequest],
    vec![ItemAction::CancelRequest]
)]
#[case(
    S::Accepted,
    vec![ItemAction::MarkCollected, ItemAction::CancelRequest],
    vec![ItemAction::MarkCollected, ItemAction::CancelRequest]
)]
#[case(S::Collected, vec![ItemAction::MarkReturned], vec![ItemAction::MarkReturned])]
fn open_statuses_follow_the_action_table(
    fx: Fixture,
    #[case] status: TransactionStatus,
    #[case] owner_actions: Vec<ItemAction>,
    #[case] borrower_actions: Vec<ItemAction>,
) {
    let txs = [tx_in(&fx, status, fx.borrower)];
    let item = item_for(&fx, status);
    assert_eq!(legal_actions(&item, &txs, fx.owner).expect("owner"), owner_actions);
    assert_eq!(legal_actions(&item, &txs, fx.borrower).expect("borrower"), borrower_actions);
    assert!(legal_actions(&item, &txs, fx.stranger).expect("stranger").is_empty());
}

#[rstest]
#[case(S::CollectionAsserted, ItemAction::ConfirmCollected)]
#[case(S::ReturnAsserted, ItemAction::ConfirmReturned)]
fn asserter_never_confirms_own_assertion(
    fx: Fixture,
    #[case] status: TransactionStatus,
    #[case] confirm: ItemAction,
) {
    let item = item_for(&fx, status);
    for (asserter, other) in [(fx.owner, fx.borrower), (fx.borrower, fx.owner)] {
        let txs = [tx_in(&fx, status, asserter)];
        assert!(legal_actions(&item, &txs, asserter).expect("asserter").is_empty());
        assert_eq!(legal_actions(&item, &txs, other).expect("other"), vec![confirm]);
    }
}

#[rstest]
#[case(S::Rejected)]
#[case(S::Returned)]
#[case(S::Cancelled)]
fn closed_transactions_are_ignored(fx: Fixture, #[case] status: TransactionStatus) {
    let txs = [tx_in(&fx, status, fx.owner)];
    assert_eq!(
        legal_actions(&fx.item, &txs, fx.borrower).expect("resolves"),
        vec![ItemAction::RequestItem]
    );
}

#[rstest]
fn pending_request_blocks_other_requesters(fx: Fixture) {
    let txs = [tx_in(&fx, S::Requested, fx.borrower)];
    assert!(legal_actions(&fx.item, &txs, fx.stranger).expect("resolves").is_empty());

    let err = decide_action(&fx.item, &txs, fx.stranger, ItemAction::RequestItem, Utc::now())
        .expect_err("beaten to it");
    assert_eq!(err.code(), ErrorCode::ItemAlreadyRequested);
    assert!(err.is_invalid_item_action());
}

#[rstest]
fn repeated_request_by_same_user_is_invalid(fx: Fixture) {
    let txs = [tx_in(&fx, S::Requested, fx.borrower)];
    let err = decide_action(&fx.item, &txs, fx.borrower, ItemAction::RequestItem, Utc::now())
        .expect_err("already requested by self");
    assert_eq!(err.code(), ErrorCode::InvalidItemAction);
}

#[rstest]
fn two_open_transactions_for_one_user_are_loud(fx: Fixture) {
    let txs = [
        tx_in(&fx, S::Accepted, fx.owner),
        tx_in(&fx, S::Collected, fx.owner),
    ];
    let err = legal_actions(&fx.item, &txs, fx.borrower).expect_err("integrity violation");
    assert_eq!(err.code(), ErrorCode::DataIntegrity);
}

#[rstest]
fn request_creates_transaction_without_touching_item(fx: Fixture) {
    let transition = decide_action(&fx.item, &[], fx.borrower, ItemAction::RequestItem, Utc::now())
        .expect("request allowed");
    assert!(transition.created);
    assert_eq!(transition.item_status, None);
    assert_eq!(transition.transaction.status, S::Requested);
    assert_eq!(transition.transaction.party1, fx.owner);
    assert_eq!(transition.transaction.party2, fx.borrower);
    assert_eq!(transition.transaction.updated_by, fx.borrower);
}

#[rstest]
#[case(S::Requested, ItemAction::AcceptRequest, S::Accepted, Some(ItemStatus::Reserved))]
#[case(S::Requested, ItemAction::RejectRequest, S::Rejected, None)]
#[case(S::Accepted, ItemAction::CancelRequest, S::Cancelled, Some(ItemStatus::Available))]
#[case(
    S::CollectionAsserted,
    ItemAction::ConfirmCollected,
    S::Collected,
    Some(ItemStatus::Borrowed)
)]
#[case(S::ReturnAsserted, ItemAction::ConfirmReturned, S::Returned, Some(ItemStatus::Available))]
fn owner_transitions_project_item_status(
    fx: Fixture,
    #[case] from: TransactionStatus,
    #[case] action: ItemAction,
    #[case] to: TransactionStatus,
    #[case] item_status: Option<ItemStatus>,
) {
    let txs = [tx_in(&fx, from, fx.borrower)];
    let item = item_for(&fx, from);
    let transition = decide_action(&item, &txs, fx.owner, action, Utc::now()).expect("legal");
    assert_eq!(transition.transaction.status, to);
    assert_eq!(transition.transaction.updated_by, fx.owner);
    assert!(!transition.created);
    assert_eq!(transition.item_status, item_status);
}

#[rstest]
fn second_assertion_fails_after_first_wins(fx: Fixture) {
    let txs = [tx_in(&fx, S::CollectionAsserted, fx.borrower)];
    let item = item_for(&fx, S::CollectionAsserted);
    let err = decide_action(&item, &txs, fx.owner, ItemAction::MarkCollected, Utc::now())
        .expect_err("already asserted");
    assert_eq!(err.code(), ErrorCode::InvalidItemAction);
}

#[rstest]
fn action_labels_and_wire_names() {
    assert_eq!(ItemAction::ConfirmReturned.label(), "Confirm Returned");
    assert_eq!("CANCEL_REQUEST".parse::<ItemAction>(), Ok(ItemAction::CancelRequest));
    assert!("BORROW".parse::<ItemAction>().is_err());
}
