//! Role-specific status sentences shown next to the action buttons.
//!
//! Onlookers never learn who requested an item: the requester's name is only
//! rendered for the owner.

use crate::domain::{Item, ItemAction, ItemStatus, UserId};

/// Names of the people involved with an item, as far as the viewer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyNames {
    /// Owner's display name.
    pub owner: String,
    /// User with a pending request and their name.
    pub requester: Option<(UserId, String)>,
    /// User holding or about to collect the item and their name.
    pub borrower: Option<(UserId, String)>,
}

/// Render the sentence describing `item` to `viewer`.
pub fn status_text(
    item: &Item,
    viewer: UserId,
    actions: &[ItemAction],
    parties: &PartyNames,
) -> String {
    let has = |action: ItemAction| actions.contains(&action);
    let requester_name = parties
        .requester
        .as_ref()
        .map_or("Someone", |(_, name)| name.as_str());
    let borrower_name = parties
        .borrower
        .as_ref()
        .map_or("Borrower", |(_, name)| name.as_str());

    if item.owner == viewer {
        return if has(ItemAction::AcceptRequest) {
            format!("{requester_name} has requested to borrow this item!")
        } else if has(ItemAction::MarkCollected) && has(ItemAction::CancelRequest) {
            format!(
                "You've accepted {borrower_name}'s borrow request, please mark the item as Collected when you've given it to them."
            )
        } else if has(ItemAction::ConfirmCollected) {
            format!("{borrower_name} marked item as collected, confirm you have lent it.")
        } else if has(ItemAction::MarkReturned) {
            format!(
                "You are currently lending this item to {borrower_name}. Mark it as returned when you have received it back."
            )
        } else if has(ItemAction::ConfirmReturned) {
            format!("{borrower_name} marked item as returned, confirm you have received it back.")
        } else if item.status == ItemStatus::Reserved {
            format!(
                "You've marked this item as lent, waiting for {borrower_name} to confirm collected."
            )
        } else if item.status == ItemStatus::Borrowed {
            format!("Waiting for {borrower_name} to confirm returned.")
        } else {
            "This is your item and it is available for borrowing.".to_owned()
        };
    }

    let is_borrower = parties
        .borrower
        .as_ref()
        .is_some_and(|(id, _)| *id == viewer);
    if is_borrower {
        let owner_name = parties.owner.as_str();
        return if has(ItemAction::CancelRequest) {
            format!(
                "{owner_name} accepted request, mark Collected when you have received the item."
            )
        } else if has(ItemAction::ConfirmCollected) {
            format!("{owner_name} marked item as collected, confirm you have received it.")
        } else if has(ItemAction::MarkReturned) {
            format!(
                "You are currently borrowing this item. Mark it as returned when you have returned it to {owner_name}."
            )
        } else if has(ItemAction::ConfirmReturned) {
            format!("{owner_name} marked item as returned, confirm you have given it back.")
        } else if actions.is_empty() && item.status == ItemStatus::Reserved {
            "You're currently borrowing this item!".to_owned()
        } else if actions.is_empty() && item.status == ItemStatus::Borrowed {
            format!("Waiting {owner_name} confirmation of returned item.")
        } else {
            "Not available for borrowing".to_owned()
        };
    }

    if actions == [ItemAction::CancelRequest] {
        "Requested to borrow, waiting on owner response...".to_owned()
    } else if has(ItemAction::RequestItem) {
        "Available to request!".to_owned()
    } else if parties.requester.is_some() {
        "Item is reserved".to_owned()
    } else {
        "Not available for borrowing".to_owned()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{CategoryId, ItemDraft};
    use chrono::Utc;
    use rstest::{fixture, rstest};

    struct Cast {
        item: Item,
        owner: UserId,
        requester: UserId,
        onlooker: UserId,
    }

    #[fixture]
    fn cast() -> Cast {
        let owner = UserId::random();
        let item = ItemDraft::try_new("Kayak", "Two seats", [CategoryId::random()])
            .expect("valid draft")
            .into_item(owner, Utc::now());
        Cast {
            item,
            owner,
            requester: UserId::random(),
            onlooker: UserId::random(),
        }
    }

    fn pending(cast: &Cast) -> PartyNames {
        PartyNames {
            owner: "Olive".to_owned(),
            requester: Some((cast.requester, "Rita".to_owned())),
            borrower: None,
        }
    }

    #[rstest]
    fn owner_sees_requester_name(cast: Cast) {
        let text = status_text(
            &cast.item,
            cast.owner,
            &[ItemAction::AcceptRequest, ItemAction::RejectRequest],
            &pending(&cast),
        );
        assert_eq!(text, "Rita has requested to borrow this item!");
    }

    #[rstest]
    fn requester_sees_waiting_message(cast: Cast) {
        let text = status_text(
            &cast.item,
            cast.requester,
            &[ItemAction::CancelRequest],
            &pending(&cast),
        );
        assert_eq!(text, "Requested to borrow, waiting on owner response...");
    }

    #[rstest]
    fn onlooker_never_sees_requester_name(cast: Cast) {
        let text = status_text(&cast.item, cast.onlooker, &[], &pending(&cast));
        assert_eq!(text, "Item is reserved");
        assert!(!text.contains("Rita"));
    }

    #[rstest]
    fn onlooker_is_invited_to_request_available_item(cast: Cast) {
        let parties = PartyNames {
            owner: "Olive".to_owned(),
            requester: None,
            borrower: None,
        };
        let text = status_text(&cast.item, cast.onlooker, &[ItemAction::RequestItem], &parties);
        assert_eq!(text, "Available to request!");
    }

    #[rstest]
    fn borrower_is_told_to_confirm_collection(cast: Cast) {
        let mut item = cast.item.clone();
        item.status = ItemStatus::Reserved;
        let parties = PartyNames {
            owner: "Olive".to_owned(),
            requester: None,
            borrower: Some((cast.requester, "Rita".to_owned())),
        };
        let text = status_text(&item, cast.requester, &[ItemAction::ConfirmCollected], &parties);
        assert_eq!(
            text,
            "Olive marked item as collected, confirm you have received it."
        );
    }

    #[rstest]
    fn owner_waiting_on_borrower_confirmation(cast: Cast) {
        let mut item = cast.item.clone();
        item.status = ItemStatus::Reserved;
        let parties = PartyNames {
            owner: "Olive".to_owned(),
            requester: None,
            borrower: Some((cast.requester, "Rita".to_owned())),
        };
        let text = status_text(&item, cast.owner, &[], &parties);
        assert_eq!(
            text,
            "You've marked this item as lent, waiting for Rita to confirm collected."
        );
    }

    #[rstest]
    fn owner_of_idle_item(cast: Cast) {
        let parties = PartyNames {
            owner: "Olive".to_owned(),
            requester: None,
            borrower: None,
        };
        let text = status_text(&cast.item, cast.owner, &[], &parties);
        assert_eq!(text, "This is your item and it is available for borrowing.");
    }
}
