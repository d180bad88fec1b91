//! Borrower and lender identity as consumed from the identity provider.
//!
//! The lending core never authenticates anyone. It receives a
//! [`UserProfile`] from the [`UserDirectory`](crate::domain::ports::UserDirectory)
//! port and uses it as an opaque principal plus the name shown in status
//! text and notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Validation errors returned by [`UserProfile::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// The display name was blank.
    #[error("display name must not be empty")]
    EmptyDisplayName,
    /// The display name exceeded [`DISPLAY_NAME_MAX`] characters.
    #[error("display name must be at most {max} characters")]
    DisplayNameTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The email address was not plausibly formed.
    #[error("email address must contain a local part and a domain")]
    InvalidEmail,
}

/// Maximum allowed length for a display name.
pub const DISPLAY_NAME_MAX: usize = 100;

/// Human readable name for the user, as shown to counterparties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`].
    pub fn new(display_name: impl Into<String>) -> Result<Self, UserValidationError> {
        let display_name = display_name.into();
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            return Err(UserValidationError::EmptyDisplayName);
        }
        if trimmed.chars().count() > DISPLAY_NAME_MAX {
            return Err(UserValidationError::DisplayNameTooLong {
                max: DISPLAY_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Identity of a marketplace participant.
///
/// ## Invariants
/// - `display_name` is non-empty once trimmed.
/// - `email`, when present, has a non-empty local part and domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    id: UserId,
    display_name: DisplayName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl UserProfile {
    /// Build a profile from validated components.
    pub fn new(id: UserId, display_name: DisplayName, email: Option<String>) -> Self {
        Self {
            id,
            display_name,
            email,
        }
    }

    /// Fallible constructor validating the display name and email.
    pub fn try_new(
        id: UserId,
        display_name: impl Into<String>,
        email: Option<&str>,
    ) -> Result<Self, UserValidationError> {
        let display_name = DisplayName::new(display_name)?;
        let email = email.map(validate_email).transpose()?;
        Ok(Self::new(id, display_name, email))
    }

    /// Stable user identifier.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Name shown to other users.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Contact address, when known.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

fn validate_email(raw: &str) -> Result<String, UserValidationError> {
    let trimmed = raw.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(trimmed.to_owned())
        }
        _ => Err(UserValidationError::InvalidEmail),
    }
}
