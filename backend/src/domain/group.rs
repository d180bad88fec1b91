//! Lending groups.
//!
//! A group is the unit of trust: members declare how much they trust the
//! group, and items are shown to the group when the owner's declared trust
//! meets the item's requirement. Membership rows live in
//! [`membership`](crate::domain::membership).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, UserId};

/// Maximum length of a group name.
pub const GROUP_NAME_MAX: usize = 50;
/// Maximum length of a group description.
pub const GROUP_DESCRIPTION_MAX: usize = 500;

/// Validation failures for group attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupValidationError {
    /// Name was blank after trimming.
    #[error("group name must not be empty")]
    EmptyName,
    /// Name exceeded [`GROUP_NAME_MAX`].
    #[error("group name must be at most {max} characters")]
    NameTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// Description exceeded [`GROUP_DESCRIPTION_MAX`].
    #[error("group description must be at most {max} characters")]
    DescriptionTooLong {
        /// Maximum permitted length.
        max: usize,
    },
}

/// Unique, trimmed group name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    /// Validate and construct a group name.
    pub fn new(raw: impl Into<String>) -> Result<Self, GroupValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GroupValidationError::EmptyName);
        }
        if trimmed.chars().count() > GROUP_NAME_MAX {
            return Err(GroupValidationError::NameTooLong {
                max: GROUP_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<GroupName> for String {
    fn from(value: GroupName) -> Self {
        value.0
    }
}

impl TryFrom<String> for GroupName {
    type Error = GroupValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validate an optional free-text group description.
pub fn validate_group_description(
    description: Option<String>,
) -> Result<Option<String>, GroupValidationError> {
    match description {
        Some(text) if text.chars().count() > GROUP_DESCRIPTION_MAX => {
            Err(GroupValidationError::DescriptionTooLong {
                max: GROUP_DESCRIPTION_MAX,
            })
        }
        Some(text) if text.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Persisted group aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Stable identifier.
    pub id: GroupId,
    /// Unique display name.
    pub name: GroupName,
    /// Optional free-text description.
    pub description: Option<String>,
    /// New joiners land in `Pending` until a moderator approves them.
    pub membership_requires_approval: bool,
    /// User who created the group.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// User who last edited the group.
    pub updated_by: UserId,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input accepted by group creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDraft {
    /// Requested group name.
    pub name: GroupName,
    /// Optional description.
    pub description: Option<String>,
    /// Whether joins need moderator approval.
    pub membership_requires_approval: bool,
}

impl GroupDraft {
    /// Build a draft with validated fields; approval defaults to required.
    pub fn new(name: impl Into<String>) -> Result<Self, GroupValidationError> {
        Ok(Self {
            name: GroupName::new(name)?,
            description: None,
            membership_requires_approval: true,
        })
    }

    /// Attach a description.
    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Result<Self, GroupValidationError> {
        self.description = validate_group_description(Some(description.into()))?;
        Ok(self)
    }

    /// Toggle whether new members need approval.
    pub fn with_membership_requires_approval(mut self, required: bool) -> Self {
        self.membership_requires_approval = required;
        self
    }
}

/// Partial update applied by moderators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupChanges {
    /// Replacement name.
    pub name: Option<GroupName>,
    /// Replacement description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// Replacement approval flag.
    pub membership_requires_approval: Option<bool>,
}

impl GroupChanges {
    /// Whether the update touches nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.membership_requires_approval.is_none()
    }

    /// Apply the changes to `group`, stamping the editor and time.
    pub fn apply_to(&self, group: &Group, editor: UserId, now: DateTime<Utc>) -> Group {
        let mut updated = group.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(required) = self.membership_requires_approval {
            updated.membership_requires_approval = required;
        }
        updated.updated_by = editor;
        updated.updated_at = now;
        updated
    }
}
