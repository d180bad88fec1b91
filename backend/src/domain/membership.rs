//! Membership ledger entries joining users to groups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, TrustLevel, UserId};

/// Maximum length of a status change reason.
pub const STATUS_REASON_MAX: usize = 500;

/// Lifecycle state of a membership.
///
/// Only [`MembershipStatus::Active`] confers group capabilities or item
/// visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    /// Awaiting moderator approval.
    Pending,
    /// Full member.
    Active,
    /// Temporarily barred by a moderator.
    Suspended,
    /// Permanently barred by a moderator.
    Banned,
    /// Membership has lapsed.
    Ended,
}

/// Error returned when decoding an unknown membership status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown membership status: {0}")]
pub struct UnknownMembershipStatus(pub String);

impl MembershipStatus {
    /// Stored representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Banned => "BANNED",
            Self::Ended => "ENDED",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = UnknownMembershipStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "BANNED" => Ok(Self::Banned),
            "ENDED" => Ok(Self::Ended),
            other => Err(UnknownMembershipStatus(other.to_owned())),
        }
    }
}

/// A user's standing in one group. Unique per (group, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Group joined.
    pub group_id: GroupId,
    /// Member.
    pub user_id: UserId,
    /// Trust the member declares in the group.
    pub trust_level: TrustLevel,
    /// Whether the member moderates the group.
    pub is_moderator: bool,
    /// Lifecycle state.
    pub status: MembershipStatus,
    /// When the membership row was created.
    pub joined_at: DateTime<Utc>,
    /// When `status` last changed after creation.
    pub status_changed_at: Option<DateTime<Utc>>,
    /// Moderator-supplied reason for the last status change.
    pub status_changed_reason: Option<String>,
}

impl Membership {
    /// Start a membership at `joined_at`.
    pub fn new(
        group_id: GroupId,
        user_id: UserId,
        trust_level: TrustLevel,
        is_moderator: bool,
        status: MembershipStatus,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            user_id,
            trust_level,
            is_moderator,
            status,
            joined_at,
            status_changed_at: None,
            status_changed_reason: None,
        }
    }

    /// Whether the membership currently confers capabilities.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Whether the membership counts toward the moderator invariant.
    pub fn is_active_moderator(&self) -> bool {
        self.is_active() && self.is_moderator
    }

    /// Copy of the membership moved to `status`.
    pub fn with_status(
        &self,
        status: MembershipStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            status_changed_at: Some(at),
            status_changed_reason: reason,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn membership(status: MembershipStatus, is_moderator: bool) -> Membership {
        Membership::new(
            GroupId::random(),
            UserId::random(),
            TrustLevel::Medium,
            is_moderator,
            status,
            Utc::now(),
        )
    }

    #[rstest]
    #[case(MembershipStatus::Active, true, true)]
    #[case(MembershipStatus::Active, false, false)]
    #[case(MembershipStatus::Pending, true, false)]
    #[case(MembershipStatus::Suspended, true, false)]
    fn only_active_moderators_count(
        #[case] status: MembershipStatus,
        #[case] is_moderator: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(
            membership(status, is_moderator).is_active_moderator(),
            expected
        );
    }

    #[rstest]
    fn status_labels_round_trip() {
        for status in [
            MembershipStatus::Pending,
            MembershipStatus::Active,
            MembershipStatus::Suspended,
            MembershipStatus::Banned,
            MembershipStatus::Ended,
        ] {
            assert_eq!(status.as_str().parse::<MembershipStatus>(), Ok(status));
        }
        assert!("LAPSED".parse::<MembershipStatus>().is_err());
    }

    #[rstest]
    fn with_status_records_audit_fields() {
        let original = membership(MembershipStatus::Active, false);
        let at = original.joined_at + chrono::Duration::days(3);
        let suspended =
            original.with_status(MembershipStatus::Suspended, Some("late returns".into()), at);
        assert_eq!(suspended.status, MembershipStatus::Suspended);
        assert_eq!(suspended.status_changed_at, Some(at));
        assert_eq!(suspended.status_changed_reason.as_deref(), Some("late returns"));
        assert_eq!(suspended.trust_level, original.trust_level);
    }
}
