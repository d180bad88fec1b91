//! Item action resolution and the borrowing state machine.
//!
//! Everything here is pure: callers pass the item and its open transactions
//! and receive either the legal action set or the transition to persist.
//! [`ItemActionService`](crate::domain::ItemActionService) runs these
//! functions inside the store's unit of work so legality is re-derived
//! against committed state on every execution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::domain::{Error, Item, ItemStatus, Transaction, TransactionStatus, UserId};

/// A step a user may take on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemAction {
    /// Ask the owner to lend the item.
    RequestItem,
    /// Owner agrees to lend.
    AcceptRequest,
    /// Owner declines.
    RejectRequest,
    /// Either party asserts the handoff happened.
    MarkCollected,
    /// The other party confirms the handoff.
    ConfirmCollected,
    /// Either party asserts the item came back.
    MarkReturned,
    /// The other party confirms the return.
    ConfirmReturned,
    /// Withdraw before collection.
    CancelRequest,
}

/// Error returned when decoding an unknown action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown item action: {0}")]
pub struct UnknownItemAction(pub String);

impl ItemAction {
    /// Stable identifier used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestItem => "REQUEST_ITEM",
            Self::AcceptRequest => "ACCEPT_REQUEST",
            Self::RejectRequest => "REJECT_REQUEST",
            Self::MarkCollected => "MARK_COLLECTED",
            Self::ConfirmCollected => "CONFIRM_COLLECTED",
            Self::MarkReturned => "MARK_RETURNED",
            Self::ConfirmReturned => "CONFIRM_RETURNED",
            Self::CancelRequest => "CANCEL_REQUEST",
        }
    }

    /// Button label for the action.
    pub const fn label(self) -> &'static str {
        match self {
            Self::RequestItem => "Request Item",
            Self::AcceptRequest => "Accept Request",
            Self::RejectRequest => "Reject Request",
            Self::MarkCollected => "Mark Collected",
            Self::ConfirmCollected => "Confirm Collected",
            Self::MarkReturned => "Mark Returned",
            Self::ConfirmReturned => "Confirm Returned",
            Self::CancelRequest => "Cancel Request",
        }
    }

    /// Transaction status the action moves to.
    pub const fn target_status(self) -> TransactionStatus {
        match self {
            Self::RequestItem => TransactionStatus::Requested,
            Self::AcceptRequest => TransactionStatus::Accepted,
            Self::RejectRequest => TransactionStatus::Rejected,
            Self::MarkCollected => TransactionStatus::CollectionAsserted,
            Self::ConfirmCollected => TransactionStatus::Collected,
            Self::MarkReturned => TransactionStatus::ReturnAsserted,
            Self::ConfirmReturned => TransactionStatus::Returned,
            Self::CancelRequest => TransactionStatus::Cancelled,
        }
    }
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemAction {
    type Err = UnknownItemAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUEST_ITEM" => Ok(Self::RequestItem),
            "ACCEPT_REQUEST" => Ok(Self::AcceptRequest),
            "REJECT_REQUEST" => Ok(Self::RejectRequest),
            "MARK_COLLECTED" => Ok(Self::MarkCollected),
            "CONFIRM_COLLECTED" => Ok(Self::ConfirmCollected),
            "MARK_RETURNED" => Ok(Self::MarkReturned),
            "CONFIRM_RETURNED" => Ok(Self::ConfirmReturned),
            "CANCEL_REQUEST" => Ok(Self::CancelRequest),
            other => Err(UnknownItemAction(other.to_owned())),
        }
    }
}

/// Legal actions plus the sentence describing the item's state to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemActionContext {
    /// Actions the user may take now, in display order.
    pub actions: Vec<ItemAction>,
    /// Role-specific status sentence.
    pub status_text: String,
}

/// The open transaction involving `user`, if any.
///
/// # Errors
/// Returns [`ErrorCode::DataIntegrity`](crate::domain::ErrorCode::DataIntegrity)
/// when more than one open transaction involves the pair.
pub fn open_transaction_for<'a>(
    item: &Item,
    open_transactions: &'a [Transaction],
    user: UserId,
) -> Result<Option<&'a Transaction>, Error> {
    let mut matching = open_transactions
        .iter()
        .filter(|tx| tx.item_id == item.id && tx.status.is_open() && tx.involves(user));
    let first = matching.next();
    let extra = matching.count();
    if extra > 0 {
        error!(
            item_id = %item.id,
            user_id = %user,
            open = extra + 1,
            "multiple open transactions for item and user"
        );
        return Err(Error::data_integrity(format!(
            "item {} has {} open transactions involving user {user}",
            item.id,
            extra + 1
        ))
        .with_details(json!({ "itemId": item.id, "userId": user })));
    }
    Ok(first)
}

/// Requester of the item's pending request, if any.
pub fn requesting_user(
    item: &Item,
    open_transactions: &[Transaction],
) -> Result<Option<UserId>, Error> {
    single_party2(
        item,
        open_transactions,
        |s| s == TransactionStatus::Requested,
        "pending requests",
    )
}

/// Borrower holding or about to collect the item, if any.
pub fn current_borrower(
    item: &Item,
    open_transactions: &[Transaction],
) -> Result<Option<UserId>, Error> {
    single_party2(
        item,
        open_transactions,
        |s| {
            matches!(
                s,
                TransactionStatus::Accepted
                    | TransactionStatus::CollectionAsserted
                    | TransactionStatus::Collected
                    | TransactionStatus::ReturnAsserted
            )
        },
        "active borrows",
    )
}

fn single_party2(
    item: &Item,
    open_transactions: &[Transaction],
    wanted: impl Fn(TransactionStatus) -> bool,
    what: &str,
) -> Result<Option<UserId>, Error> {
    let mut matching = open_transactions
        .iter()
        .filter(|tx| tx.item_id == item.id && wanted(tx.status));
    let first = matching.next().map(|tx| tx.party2);
    if matching.next().is_some() {
        error!(item_id = %item.id, what, "item has more than one open transaction");
        return Err(Error::data_integrity(format!(
            "item {} has multiple {what}",
            item.id
        )));
    }
    Ok(first)
}

/// Actions `user` may take on `item` right now.
pub fn legal_actions(
    item: &Item,
    open_transactions: &[Transaction],
    user: UserId,
) -> Result<Vec<ItemAction>, Error> {
    let Some(tx) = open_transaction_for(item, open_transactions, user)? else {
        let can_request = item.status == ItemStatus::Available
            && item.owner != user
            && requesting_user(item, open_transactions)?.is_none();
        return Ok(if can_request {
            vec![ItemAction::RequestItem]
        } else {
            Vec::new()
        });
    };

    let is_owner = tx.party1 == user;
    let actions = match tx.status {
        TransactionStatus::Requested if is_owner => {
            vec![ItemAction::AcceptRequest, ItemAction::RejectRequest]
        }
        TransactionStatus::Requested => vec![ItemAction::CancelRequest],
        TransactionStatus::Accepted => vec![ItemAction::MarkCollected, ItemAction::CancelRequest],
        TransactionStatus::CollectionAsserted if tx.updated_by != user => {
            vec![ItemAction::ConfirmCollected]
        }
        TransactionStatus::Collected => vec![ItemAction::MarkReturned],
        TransactionStatus::ReturnAsserted if tx.updated_by != user => {
            vec![ItemAction::ConfirmReturned]
        }
        _ => Vec::new(),
    };
    Ok(actions)
}

/// Writes produced by executing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTransition {
    /// Transaction after the action.
    pub transaction: Transaction,
    /// Whether the transaction was created by this action.
    pub created: bool,
    /// Item status to persist, when it changes.
    pub item_status: Option<ItemStatus>,
}

/// Validate `action` against current state and compute the transition.
///
/// # Errors
/// - [`ErrorCode::ItemAlreadyRequested`](crate::domain::ErrorCode::ItemAlreadyRequested)
///   when another user's request is already pending.
/// - [`ErrorCode::InvalidItemAction`](crate::domain::ErrorCode::InvalidItemAction)
///   when the action is not currently legal for `user`.
pub fn decide_action(
    item: &Item,
    open_transactions: &[Transaction],
    user: UserId,
    action: ItemAction,
    now: DateTime<Utc>,
) -> Result<ActionTransition, Error> {
    if action == ItemAction::RequestItem
        && requesting_user(item, open_transactions)?.is_some_and(|requester| requester != user)
    {
        return Err(Error::item_already_requested(format!(
            "item {} already has a pending request from another user",
            item.id
        )));
    }

    let legal = legal_actions(item, open_transactions, user)?;
    if !legal.contains(&action) {
        return Err(Error::invalid_item_action(format!(
            "user {user} cannot perform {action} on item {} at this time",
            item.id
        ))
        .with_details(json!({ "action": action, "legalActions": legal })));
    }

    if action == ItemAction::RequestItem {
        return Ok(ActionTransition {
            transaction: Transaction::request(item.id, item.owner, user, now),
            created: true,
            item_status: None,
        });
    }

    let current = open_transaction_for(item, open_transactions, user)?
        .ok_or_else(|| Error::internal("legal action without an open transaction"))?;
    let transaction = current
        .advance(action.target_status(), user, now)
        .ok_or_else(|| Error::internal("legal action maps to an illegal transition"))?;
    let item_status = transaction
        .status
        .item_status()
        .filter(|status| *status != item.status);
    Ok(ActionTransition {
        transaction,
        created: false,
        item_status,
    })
}

#[cfg(test)]
#[path = "item_action_tests.rs"]
mod tests;
