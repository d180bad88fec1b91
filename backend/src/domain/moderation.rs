//! Guard keeping at least one active moderator in every group.

use serde_json::json;

use crate::domain::{Error, Membership};

/// Check that replacing `current` with `next` leaves the group moderated.
///
/// `next` is `None` when the membership is being deleted. The check only
/// bites when `current` is an active moderator and `next` is not; it then
/// requires another active moderator in `roster`. Group deletion does not
/// call this guard.
///
/// # Errors
/// Returns [`ErrorCode::ModeratorRequired`](crate::domain::ErrorCode::ModeratorRequired)
/// when the group would be left without an active moderator.
pub fn ensure_moderated_after(
    roster: &[Membership],
    current: &Membership,
    next: Option<&Membership>,
) -> Result<(), Error> {
    let loses_moderator =
        current.is_active_moderator() && !next.is_some_and(Membership::is_active_moderator);
    if !loses_moderator {
        return Ok(());
    }
    let others = roster
        .iter()
        .filter(|m| m.group_id == current.group_id && m.user_id != current.user_id)
        .filter(|m| m.is_active_moderator())
        .count();
    if others == 0 {
        return Err(Error::moderator_required(
            "group must keep at least one active moderator",
        )
        .with_details(json!({
            "groupId": current.group_id,
            "userId": current.user_id,
        })));
    }
    Ok(())
}

/// Number of active moderators in `roster`.
pub fn active_moderator_count(roster: &[Membership]) -> usize {
    roster.iter().filter(|m| m.is_active_moderator()).count()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{ErrorCode, GroupId, MembershipStatus, TrustLevel, UserId};
    use chrono::Utc;
    use rstest::{fixture, rstest};

    #[fixture]
    fn group() -> GroupId {
        GroupId::random()
    }

    fn member(group: GroupId, moderator: bool, status: MembershipStatus) -> Membership {
        Membership::new(
            group,
            UserId::random(),
            TrustLevel::High,
            moderator,
            status,
            Utc::now(),
        )
    }

    #[rstest]
    fn sole_moderator_cannot_be_removed(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let roster = vec![m1.clone(), member(group, false, MembershipStatus::Active)];
        let err = ensure_moderated_after(&roster, &m1, None).expect_err("blocked");
        assert_eq!(err.code(), ErrorCode::ModeratorRequired);
    }

    #[rstest]
    fn sole_moderator_cannot_be_demoted(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let demoted = Membership {
            is_moderator: false,
            ..m1.clone()
        };
        let err = ensure_moderated_after(std::slice::from_ref(&m1), &m1, Some(&demoted))
            .expect_err("blocked");
        assert_eq!(err.code(), ErrorCode::ModeratorRequired);
    }

    #[rstest]
    fn sole_moderator_cannot_be_suspended(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let suspended = m1.with_status(MembershipStatus::Suspended, None, Utc::now());
        assert!(ensure_moderated_after(std::slice::from_ref(&m1), &m1, Some(&suspended)).is_err());
    }

    #[rstest]
    fn pending_moderators_do_not_count(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let roster = vec![m1.clone(), member(group, true, MembershipStatus::Pending)];
        assert!(ensure_moderated_after(&roster, &m1, None).is_err());
        assert_eq!(active_moderator_count(&roster), 1);
    }

    #[rstest]
    fn second_moderator_allows_removal(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let roster = vec![m1.clone(), member(group, true, MembershipStatus::Active)];
        assert!(ensure_moderated_after(&roster, &m1, None).is_ok());
    }

    #[rstest]
    fn non_moderator_changes_are_unchecked(group: GroupId) {
        let plain = member(group, false, MembershipStatus::Active);
        assert!(ensure_moderated_after(std::slice::from_ref(&plain), &plain, None).is_ok());
    }

    #[rstest]
    fn trust_change_keeps_moderator(group: GroupId) {
        let m1 = member(group, true, MembershipStatus::Active);
        let lowered = Membership {
            trust_level: TrustLevel::Low,
            ..m1.clone()
        };
        assert!(ensure_moderated_after(std::slice::from_ref(&m1), &m1, Some(&lowered)).is_ok());
    }
}
