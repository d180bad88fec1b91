//! Lendable items, their categories, and photos.
//!
//! `Item::status` is a projection of the item's open transaction. It is only
//! ever written alongside that transaction inside one unit of work; see
//! [`TransactionStatus::item_status`](crate::domain::TransactionStatus::item_status).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CategoryId, ItemId, PhotoId, TrustLevel, UserId};

/// Maximum length of an item name.
pub const ITEM_NAME_MAX: usize = 50;
/// Maximum length of an item description.
pub const ITEM_DESCRIPTION_MAX: usize = 500;
/// Maximum length of a category name.
pub const CATEGORY_NAME_MAX: usize = 50;
/// Maximum length of a category description.
pub const CATEGORY_DESCRIPTION_MAX: usize = 100;

/// Validation failures for item attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemValidationError {
    /// Name was blank after trimming.
    #[error("item name must not be empty")]
    EmptyName,
    /// Name exceeded [`ITEM_NAME_MAX`].
    #[error("item name must be at most {max} characters")]
    NameTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// Description exceeded [`ITEM_DESCRIPTION_MAX`].
    #[error("item description must be at most {max} characters")]
    DescriptionTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// An item must belong to at least one category.
    #[error("at least one category is required")]
    NoCategories,
    /// Category name was blank or too long.
    #[error("category name must be between 1 and {max} characters")]
    InvalidCategoryName {
        /// Maximum permitted length.
        max: usize,
    },
    /// Category description exceeded [`CATEGORY_DESCRIPTION_MAX`].
    #[error("category description must be at most {max} characters")]
    CategoryDescriptionTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// Photo reference was blank.
    #[error("photo reference must not be empty")]
    EmptyPhotoUrl,
}

/// Borrowing availability derived from the open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// No accepted transaction; may be requested.
    #[default]
    Available,
    /// A request was accepted and the handoff is pending.
    Reserved,
    /// The borrower holds the item.
    Borrowed,
}

impl ItemStatus {
    /// Stored ordinal.
    pub const fn ordinal(self) -> i16 {
        match self {
            Self::Available => 10,
            Self::Reserved => 20,
            Self::Borrowed => 30,
        }
    }

    /// Decode a stored ordinal.
    pub const fn from_ordinal(value: i16) -> Option<Self> {
        match value {
            10 => Some(Self::Available),
            20 => Some(Self::Reserved),
            30 => Some(Self::Borrowed),
            _ => None,
        }
    }
}

/// Catalogue label grouping similar items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCategory {
    /// Stable identifier.
    pub id: CategoryId,
    /// Short label.
    pub name: String,
    /// Optional longer explanation.
    pub description: Option<String>,
}

impl ItemCategory {
    /// Validate and build a new category.
    pub fn try_new(
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, ItemValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > CATEGORY_NAME_MAX {
            return Err(ItemValidationError::InvalidCategoryName {
                max: CATEGORY_NAME_MAX,
            });
        }
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > CATEGORY_DESCRIPTION_MAX)
        {
            return Err(ItemValidationError::CategoryDescriptionTooLong {
                max: CATEGORY_DESCRIPTION_MAX,
            });
        }
        Ok(Self {
            id: CategoryId::random(),
            name: trimmed.to_owned(),
            description,
        })
    }
}

/// Opaque reference to an uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPhoto {
    /// Stable identifier.
    pub id: PhotoId,
    /// Item shown in the photo.
    pub item_id: ItemId,
    /// Storage location, never dereferenced by the core.
    pub url: String,
    /// Upload timestamp.
    pub created_at: DateTime<Utc>,
}

/// Persisted item aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable identifier.
    pub id: ItemId,
    /// Short name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Lender.
    pub owner: UserId,
    /// Categories; never empty.
    pub categories: BTreeSet<CategoryId>,
    /// Minimum owner trust a group needs to see the item.
    pub trust_level_required: TrustLevel,
    /// Availability projection.
    pub status: ItemStatus,
    /// Attached photos, oldest first.
    pub photos: Vec<ItemPhoto>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input accepted by item creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    /// Short name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Initial categories.
    pub categories: BTreeSet<CategoryId>,
    /// Visibility requirement; defaults to [`TrustLevel::High`].
    pub trust_level_required: TrustLevel,
}

impl ItemDraft {
    /// Validate and build a draft.
    pub fn try_new(
        name: impl Into<String>,
        description: impl Into<String>,
        categories: impl IntoIterator<Item = CategoryId>,
    ) -> Result<Self, ItemValidationError> {
        let draft = Self {
            name: validate_item_name(name.into())?,
            description: validate_item_description(description.into())?,
            categories: categories.into_iter().collect(),
            trust_level_required: TrustLevel::default(),
        };
        if draft.categories.is_empty() {
            return Err(ItemValidationError::NoCategories);
        }
        Ok(draft)
    }

    /// Override the visibility requirement.
    pub fn with_trust_level_required(mut self, level: TrustLevel) -> Self {
        self.trust_level_required = level;
        self
    }

    /// Materialise the draft as a new available item.
    pub fn into_item(self, owner: UserId, now: DateTime<Utc>) -> Item {
        Item {
            id: ItemId::random(),
            name: self.name,
            description: self.description,
            owner,
            categories: self.categories,
            trust_level_required: self.trust_level_required,
            status: ItemStatus::Available,
            photos: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied by the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement categories; must not be empty.
    pub categories: Option<BTreeSet<CategoryId>>,
    /// Replacement visibility requirement.
    pub trust_level_required: Option<TrustLevel>,
}

impl ItemChanges {
    /// Apply validated changes to `item`.
    pub fn apply_to(&self, item: &Item, now: DateTime<Utc>) -> Result<Item, ItemValidationError> {
        let mut updated = item.clone();
        if let Some(name) = &self.name {
            updated.name = validate_item_name(name.clone())?;
        }
        if let Some(description) = &self.description {
            updated.description = validate_item_description(description.clone())?;
        }
        if let Some(categories) = &self.categories {
            if categories.is_empty() {
                return Err(ItemValidationError::NoCategories);
            }
            updated.categories = categories.clone();
        }
        if let Some(level) = self.trust_level_required {
            updated.trust_level_required = level;
        }
        updated.updated_at = now;
        Ok(updated)
    }
}

fn validate_item_name(raw: String) -> Result<String, ItemValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ItemValidationError::EmptyName);
    }
    if trimmed.chars().count() > ITEM_NAME_MAX {
        return Err(ItemValidationError::NameTooLong { max: ITEM_NAME_MAX });
    }
    Ok(trimmed.to_owned())
}

fn validate_item_description(raw: String) -> Result<String, ItemValidationError> {
    if raw.chars().count() > ITEM_DESCRIPTION_MAX {
        return Err(ItemValidationError::DescriptionTooLong {
            max: ITEM_DESCRIPTION_MAX,
        });
    }
    Ok(raw)
}

/// Validate a photo storage reference.
pub fn validate_photo_url(raw: &str) -> Result<String, ItemValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ItemValidationError::EmptyPhotoUrl);
    }
    Ok(trimmed.to_owned())
}
