//! Borrowing transactions and their status graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, ItemStatus, TransactionId, UserId};

/// Status of one borrowing negotiation.
///
/// Edges: `Requested -> {Accepted, Rejected, Cancelled}`,
/// `Accepted -> {CollectionAsserted, Cancelled}`,
/// `CollectionAsserted -> Collected`, `Collected -> ReturnAsserted`,
/// `ReturnAsserted -> Returned`. `Rejected`, `Returned` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Borrower asked to borrow the item.
    Requested,
    /// Owner declined.
    Rejected,
    /// Owner agreed.
    Accepted,
    /// One party says the handoff happened.
    CollectionAsserted,
    /// Both parties agree the borrower has the item.
    Collected,
    /// One party says the item came back.
    ReturnAsserted,
    /// Both parties agree the item is back.
    Returned,
    /// Either party called it off before collection.
    Cancelled,
}

impl TransactionStatus {
    /// Statuses that keep a transaction open.
    pub const OPEN: [Self; 5] = [
        Self::Requested,
        Self::Accepted,
        Self::CollectionAsserted,
        Self::Collected,
        Self::ReturnAsserted,
    ];

    /// Stored ordinal.
    pub const fn ordinal(self) -> i16 {
        match self {
            Self::Requested => 10,
            Self::Rejected => 20,
            Self::Accepted => 30,
            Self::CollectionAsserted => 40,
            Self::Collected => 50,
            Self::ReturnAsserted => 60,
            Self::Returned => 70,
            Self::Cancelled => 80,
        }
    }

    /// Decode a stored ordinal.
    pub const fn from_ordinal(value: i16) -> Option<Self> {
        match value {
            10 => Some(Self::Requested),
            20 => Some(Self::Rejected),
            30 => Some(Self::Accepted),
            40 => Some(Self::CollectionAsserted),
            50 => Some(Self::Collected),
            60 => Some(Self::ReturnAsserted),
            70 => Some(Self::Returned),
            80 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the transaction has ended.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Returned | Self::Cancelled)
    }

    /// Whether the transaction is still in progress.
    pub const fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal successor.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Requested,
                Self::Accepted | Self::Rejected | Self::Cancelled
            ) | (Self::Accepted, Self::CollectionAsserted | Self::Cancelled)
                | (Self::CollectionAsserted, Self::Collected)
                | (Self::Collected, Self::ReturnAsserted)
                | (Self::ReturnAsserted, Self::Returned)
        )
    }

    /// Item status implied by entering this transaction status.
    ///
    /// `None` means the item status is left untouched.
    pub const fn item_status(self) -> Option<ItemStatus> {
        match self {
            Self::Requested | Self::Returned | Self::Cancelled => Some(ItemStatus::Available),
            Self::Accepted | Self::CollectionAsserted => Some(ItemStatus::Reserved),
            Self::Collected | Self::ReturnAsserted => Some(ItemStatus::Borrowed),
            Self::Rejected => None,
        }
    }
}

/// One negotiation between an owner and a borrower over one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Stable identifier.
    pub id: TransactionId,
    /// Item under negotiation.
    pub item_id: ItemId,
    /// Owner and lender.
    pub party1: UserId,
    /// Requester and borrower.
    pub party2: UserId,
    /// Current status.
    pub status: TransactionStatus,
    /// Last party to change the status.
    pub updated_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Open a new request from `borrower` to `owner`.
    pub fn request(item_id: ItemId, owner: UserId, borrower: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::random(),
            item_id,
            party1: owner,
            party2: borrower,
            status: TransactionStatus::Requested,
            updated_by: borrower,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user` is either party.
    pub fn involves(&self, user: UserId) -> bool {
        self.party1 == user || self.party2 == user
    }

    /// The party other than `user`.
    pub fn counterparty_of(&self, user: UserId) -> UserId {
        if self.party1 == user {
            self.party2
        } else {
            self.party1
        }
    }

    /// Whether the transaction is waiting on `user`'s side of the exchange.
    ///
    /// Requests and acceptances are pending for both parties; assertions
    /// are pending for the party that did not make them.
    pub fn is_pending_for(&self, user: UserId) -> bool {
        if !self.involves(user) {
            return false;
        }
        match self.status {
            TransactionStatus::Requested | TransactionStatus::Accepted => true,
            TransactionStatus::CollectionAsserted | TransactionStatus::ReturnAsserted => {
                self.updated_by != user
            }
            _ => false,
        }
    }

    /// Whether `user` is borrowing the item through this transaction.
    ///
    /// A borrow starts once collection is asserted and ends on return.
    pub fn is_current_borrow_of(&self, user: UserId) -> bool {
        self.party2 == user
            && matches!(
                self.status,
                TransactionStatus::CollectionAsserted
                    | TransactionStatus::Collected
                    | TransactionStatus::ReturnAsserted
            )
    }

    /// Copy of the transaction advanced to `status` by `actor`.
    ///
    /// Returns `None` when the edge does not exist.
    pub fn advance(
        &self,
        status: TransactionStatus,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if !self.status.can_transition_to(status) {
            return None;
        }
        Some(Self {
            status,
            updated_by: actor,
            updated_at: now,
            ..self.clone()
        })
    }
}
