//! Notification events emitted after lending state commits.
//!
//! Each event names its recipient. Delivery (email, push, in-app) belongs
//! to whatever implements
//! [`LendingEventSink`](crate::domain::ports::LendingEventSink).

use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, ItemId, TransactionId, UserId};

/// Something a user should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LendingEvent {
    /// A borrower asked for the recipient's item.
    ItemRequested {
        /// Owner being asked.
        recipient: UserId,
        /// Requester.
        borrower: UserId,
        /// Item requested.
        item_id: ItemId,
        /// New transaction.
        transaction_id: TransactionId,
    },
    /// The owner accepted the recipient's request.
    ItemRequestAccepted {
        /// Requester.
        recipient: UserId,
        /// Item.
        item_id: ItemId,
        /// Transaction.
        transaction_id: TransactionId,
    },
    /// The owner declined the recipient's request.
    ItemRequestDenied {
        /// Requester.
        recipient: UserId,
        /// Item.
        item_id: ItemId,
        /// Transaction.
        transaction_id: TransactionId,
    },
    /// The other party called off the borrow.
    ItemRequestCancelled {
        /// Party who did not cancel.
        recipient: UserId,
        /// Item.
        item_id: ItemId,
        /// Transaction.
        transaction_id: TransactionId,
    },
    /// The borrower says the item is back.
    ItemReturned {
        /// Owner.
        recipient: UserId,
        /// Item.
        item_id: ItemId,
        /// Transaction.
        transaction_id: TransactionId,
    },
    /// Someone joined a group the recipient belongs to.
    GroupMemberJoined {
        /// Existing active member.
        recipient: UserId,
        /// Newcomer.
        member: UserId,
        /// Group joined.
        group_id: GroupId,
    },
    /// A moderator approved the recipient's pending membership.
    GroupMembershipApproved {
        /// Newly active member.
        recipient: UserId,
        /// Group.
        group_id: GroupId,
    },
    /// The recipient was removed from a group.
    GroupMemberRemoved {
        /// Former member.
        recipient: UserId,
        /// Group.
        group_id: GroupId,
    },
}

impl LendingEvent {
    /// User the event is addressed to.
    pub fn recipient(&self) -> UserId {
        match self {
            Self::ItemRequested { recipient, .. }
            | Self::ItemRequestAccepted { recipient, .. }
            | Self::ItemRequestDenied { recipient, .. }
            | Self::ItemRequestCancelled { recipient, .. }
            | Self::ItemReturned { recipient, .. }
            | Self::GroupMemberJoined { recipient, .. }
            | Self::GroupMembershipApproved { recipient, .. }
            | Self::GroupMemberRemoved { recipient, .. } => *recipient,
        }
    }

    /// Stable event name.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ItemRequested { .. } => "ITEM_REQUESTED",
            Self::ItemRequestAccepted { .. } => "ITEM_REQUEST_ACCEPTED",
            Self::ItemRequestDenied { .. } => "ITEM_REQUEST_DENIED",
            Self::ItemRequestCancelled { .. } => "ITEM_REQUEST_CANCELLED",
            Self::ItemReturned { .. } => "ITEM_RETURNED",
            Self::GroupMemberJoined { .. } => "GROUP_MEMBER_JOINED",
            Self::GroupMembershipApproved { .. } => "GROUP_MEMBERSHIP_APPROVED",
            Self::GroupMemberRemoved { .. } => "GROUP_MEMBER_REMOVED",
        }
    }
}
