//! Driving service for the borrowing workflow.
//!
//! Resolves the actions a user may take on an item and executes them.
//! Execution re-derives legality inside the store's unit of work, so two
//! racing callers can never both act on the same prior state.

use std::sync::Arc;

use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{LendingEventSink, LendingStore, UserDirectory, UserDirectoryError};
use crate::domain::unit_of_work::{UnitOfWork, map_store_error};
use crate::domain::{
    Change, ChangeSet, Decision, Error, ItemAction, ItemActionContext, ItemId, LendingEvent,
    PartyNames, SnapshotScope, Transaction, UserId, current_borrower, decide_action, legal_actions,
    requesting_user, status_text,
};

pub(crate) fn map_directory_error(error: UserDirectoryError) -> Error {
    match error {
        UserDirectoryError::Connection { message } => {
            Error::service_unavailable(format!("user directory unavailable: {message}"))
        }
        UserDirectoryError::Query { message } => {
            Error::internal(format!("user directory error: {message}"))
        }
    }
}

/// Event announcing `action` on `transaction`, if anyone should hear of it.
fn action_event(
    action: ItemAction,
    transaction: &Transaction,
    actor: UserId,
) -> Option<LendingEvent> {
    let item_id = transaction.item_id;
    let transaction_id = transaction.id;
    match action {
        ItemAction::RequestItem => Some(LendingEvent::ItemRequested {
            recipient: transaction.party1,
            borrower: transaction.party2,
            item_id,
            transaction_id,
        }),
        ItemAction::AcceptRequest => Some(LendingEvent::ItemRequestAccepted {
            recipient: transaction.party2,
            item_id,
            transaction_id,
        }),
        ItemAction::RejectRequest => Some(LendingEvent::ItemRequestDenied {
            recipient: transaction.party2,
            item_id,
            transaction_id,
        }),
        ItemAction::CancelRequest => Some(LendingEvent::ItemRequestCancelled {
            recipient: transaction.counterparty_of(actor),
            item_id,
            transaction_id,
        }),
        ItemAction::ConfirmReturned => Some(LendingEvent::ItemReturned {
            recipient: transaction.party1,
            item_id,
            transaction_id,
        }),
        _ => None,
    }
}

/// Borrowing workflow service.
pub struct ItemActionService<S, E, D> {
    uow: UnitOfWork<S, E>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, E, D> ItemActionService<S, E, D> {
    /// Create the service.
    pub fn new(uow: UnitOfWork<S, E>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            uow,
            directory,
            clock,
        }
    }
}

impl<S, E, D> ItemActionService<S, E, D>
where
    S: LendingStore,
    E: LendingEventSink,
    D: UserDirectory,
{
    async fn display_name(&self, user: UserId, fallback: &str) -> Result<String, Error> {
        let profile = self
            .directory
            .find_user(user)
            .await
            .map_err(map_directory_error)?;
        Ok(profile.map_or_else(
            || fallback.to_owned(),
            |p| p.display_name().to_string(),
        ))
    }

    async fn named(
        &self,
        user: Option<UserId>,
        fallback: &str,
    ) -> Result<Option<(UserId, String)>, Error> {
        match user {
            Some(id) => Ok(Some((id, self.display_name(id, fallback).await?))),
            None => Ok(None),
        }
    }

    /// Actions `user` may take on the item, with the matching status text.
    ///
    /// # Errors
    /// `NotFound` for unknown items and `DataIntegrity` when the item carries
    /// more than one open transaction for the user.
    pub async fn resolve_actions(
        &self,
        item_id: ItemId,
        user: UserId,
    ) -> Result<ItemActionContext, Error> {
        let snapshot = self
            .uow
            .snapshot(&SnapshotScope::default().item(item_id))
            .await?;
        let record = snapshot.item(item_id)?;
        let item = &record.item;
        let open = record.open_transactions.as_slice();

        let actions = legal_actions(item, open, user)?;
        let parties = PartyNames {
            owner: self.display_name(item.owner, "Owner").await?,
            requester: self.named(requesting_user(item, open)?, "Someone").await?,
            borrower: self.named(current_borrower(item, open)?, "Borrower").await?,
        };
        let status_text = status_text(item, user, &actions, &parties);
        debug!(%item_id, %user, actions = actions.len(), "resolved item actions");
        Ok(ItemActionContext {
            actions,
            status_text,
        })
    }

    /// Execute `action` on the item as `user`.
    ///
    /// # Errors
    /// - `ItemAlreadyRequested` when another user's request is pending.
    /// - `InvalidItemAction` when the action is not legal now.
    /// - `Conflict` when concurrent writers kept winning.
    pub async fn process_action(
        &self,
        item_id: ItemId,
        user: UserId,
        action: ItemAction,
    ) -> Result<Transaction, Error> {
        let now = self.clock.utc();
        self.uow
            .run(
                "process_action",
                SnapshotScope::default().item(item_id),
                move |snapshot| {
                    let record = snapshot.item(item_id)?;
                    let transition = decide_action(
                        &record.item,
                        &record.open_transactions,
                        user,
                        action,
                        now,
                    )?;
                    let transaction = transition.transaction;
                    let mut changes = ChangeSet::default();
                    changes.push(if transition.created {
                        Change::InsertTransaction(transaction.clone())
                    } else {
                        Change::UpdateTransaction(transaction.clone())
                    });
                    if let Some(status) = transition.item_status {
                        changes.push(Change::SetItemStatus { item_id, status });
                    }
                    if let Some(event) = action_event(action, &transaction, user) {
                        changes.emit(event);
                    }
                    Ok(Decision::new(transaction, changes))
                },
            )
            .await
    }

    async fn transactions_where(
        &self,
        user: UserId,
        keep: impl Fn(&Transaction) -> bool,
    ) -> Result<Vec<Transaction>, Error> {
        let all = self
            .uow
            .store()
            .transactions_involving(user)
            .await
            .map_err(map_store_error)?;
        Ok(all.into_iter().filter(|tx| keep(tx)).collect())
    }

    /// Transactions waiting on `user`, in either role.
    pub async fn pending_transactions_for(&self, user: UserId) -> Result<Vec<Transaction>, Error> {
        self.transactions_where(user, |tx| tx.is_pending_for(user))
            .await
    }

    /// Pending transactions on items `user` owns.
    pub async fn borrow_requests_to(&self, user: UserId) -> Result<Vec<Transaction>, Error> {
        self.transactions_where(user, |tx| tx.party1 == user && tx.is_pending_for(user))
            .await
    }

    /// Pending transactions where `user` is the borrower.
    pub async fn borrow_requests_from(&self, user: UserId) -> Result<Vec<Transaction>, Error> {
        self.transactions_where(user, |tx| tx.party2 == user && tx.is_pending_for(user))
            .await
    }

    /// Items `user` is borrowing right now.
    pub async fn current_borrows_for(&self, user: UserId) -> Result<Vec<Transaction>, Error> {
        self.transactions_where(user, |tx| tx.is_current_borrow_of(user))
            .await
    }
}

#[cfg(test)]
#[path = "item_action_service_tests.rs"]
mod tests;
