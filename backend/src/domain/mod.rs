//! Lending domain: entities, pure engines, services, and ports.
//!
//! Purpose: model the borrowing state machine, trust-gated permissions, and
//! group moderation without depending on any adapter. Pure decision
//! functions compute writes; services run them inside the store's unit of
//! work.
//!
//! Public surface:
//! - Entities: [`Item`], [`Transaction`], [`Group`], [`Membership`],
//!   [`UserProfile`], [`Grant`].
//! - Engines: [`legal_actions`], [`decide_action`], [`status_text`],
//!   the permission projection functions, [`ensure_moderated_after`].
//! - Services: [`ItemActionService`], [`ItemService`], [`GroupService`],
//!   [`VisibilityService`], all built over a [`UnitOfWork`].
//! - [`Error`] / [`ErrorCode`]: the error contract for every operation.

pub mod change_set;
pub mod error;
pub mod events;
pub mod group;
pub mod group_service;
pub mod ids;
pub mod item;
pub mod item_action;
pub mod item_action_service;
pub mod item_service;
pub mod lending_snapshot;
pub mod membership;
pub mod moderation;
pub mod permissions;
pub mod ports;
pub mod status_text;
pub mod transaction;
pub mod trust_level;
pub mod unit_of_work;
pub mod user;
pub mod visibility_service;

pub use self::change_set::{Change, ChangeSet, Decision};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::events::LendingEvent;
pub use self::group::{
    GROUP_DESCRIPTION_MAX, GROUP_NAME_MAX, Group, GroupChanges, GroupDraft, GroupName,
    GroupValidationError, validate_group_description,
};
pub use self::group_service::{GroupService, JoinOutcome};
pub use self::ids::{
    CategoryId, GroupId, IdValidationError, ItemId, PhotoId, TransactionId, UserId,
};
pub use self::item::{
    CATEGORY_DESCRIPTION_MAX, CATEGORY_NAME_MAX, ITEM_DESCRIPTION_MAX, ITEM_NAME_MAX, Item,
    ItemCategory, ItemChanges, ItemDraft, ItemPhoto, ItemStatus, ItemValidationError,
    validate_photo_url,
};
pub use self::item_action::{
    ActionTransition, ItemAction, ItemActionContext, UnknownItemAction, current_borrower,
    decide_action, legal_actions, open_transaction_for, requesting_user,
};
pub use self::item_action_service::ItemActionService;
pub use self::item_service::ItemService;
pub use self::lending_snapshot::{ItemRecord, LendingSnapshot, SnapshotScope};
pub use self::membership::{
    Membership, MembershipStatus, STATUS_REASON_MAX, UnknownMembershipStatus,
};
pub use self::moderation::{active_moderator_count, ensure_moderated_after};
pub use self::permissions::{
    Capability, Grant, GrantDelta, Principal, Resource, holds, item_group_visibility,
    membership_grants, membership_removal, owner_item_grants,
};
pub use self::status_text::{PartyNames, status_text};
pub use self::transaction::{Transaction, TransactionStatus};
pub use self::trust_level::{TrustLevel, UnknownTrustLevel};
pub use self::unit_of_work::{DEFAULT_CONFLICT_RETRIES, UnitOfWork};
pub use self::user::{DISPLAY_NAME_MAX, DisplayName, UserProfile, UserValidationError};
pub use self::visibility_service::VisibilityService;

/// Result alias for lending operations.
///
/// # Examples
/// ```
/// use borrowd::domain::{Error, LendingResult};
///
/// fn refuse() -> LendingResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(refuse().is_err());
/// ```
pub type LendingResult<T> = Result<T, Error>;
