//! Diesel table definitions for the lending schema.
//!
//! These must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Identity rows read by the user directory.
    users (id) {
        /// Primary key.
        id -> Uuid,
        /// Name shown to other members.
        display_name -> Varchar,
        /// Optional contact address.
        email -> Nullable<Varchar>,
        /// Registration timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Lending circles. `name` is unique.
    groups (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        membership_requires_approval -> Bool,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_by -> Uuid,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per (group, user).
    memberships (group_id, user_id) {
        group_id -> Uuid,
        user_id -> Uuid,
        /// Ordinal: 1 low, 2 medium, 3 high.
        trust_level -> Int2,
        is_moderator -> Bool,
        /// `PENDING`, `ACTIVE`, `SUSPENDED`, `BANNED` or `ENDED`.
        status -> Varchar,
        joined_at -> Timestamptz,
        status_changed_at -> Nullable<Timestamptz>,
        status_changed_reason -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Catalogue categories. `name` is unique.
    item_categories (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    /// Lendable items.
    items (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Text,
        owner_id -> Uuid,
        /// Ordinal: 1 low, 2 medium, 3 high.
        trust_level_required -> Int2,
        /// Ordinal: 10 available, 20 reserved, 30 borrowed.
        status -> Int2,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Many-to-many link between items and categories.
    item_category_links (item_id, category_id) {
        item_id -> Uuid,
        category_id -> Uuid,
    }
}

diesel::table! {
    /// Photo references attached to an item.
    item_photos (id) {
        id -> Uuid,
        item_id -> Uuid,
        url -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Borrowing negotiations. A partial unique index allows one open row
    /// per item.
    transactions (id) {
        id -> Uuid,
        item_id -> Uuid,
        /// Owner.
        party1_id -> Uuid,
        /// Borrower.
        party2_id -> Uuid,
        /// Ordinal from 10 (requested) to 80 (cancelled).
        status -> Int2,
        updated_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Object-level capability rows.
    grants (principal_kind, principal_id, resource_kind, resource_id, capability) {
        /// `user` or `group`.
        principal_kind -> Varchar,
        principal_id -> Uuid,
        /// `item` or `group`.
        resource_kind -> Varchar,
        resource_id -> Uuid,
        /// `view`, `edit` or `delete`.
        capability -> Varchar,
    }
}

diesel::joinable!(memberships -> groups (group_id));
diesel::joinable!(item_category_links -> items (item_id));
diesel::joinable!(item_category_links -> item_categories (category_id));
diesel::joinable!(item_photos -> items (item_id));
diesel::joinable!(transactions -> items (item_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    groups,
    memberships,
    item_categories,
    items,
    item_category_links,
    item_photos,
    transactions,
    grants,
);
