//! Tests for the domain error payload and its kind predicates.

use super::*;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn moderator_error() -> Error {
    Error::moderator_required("group needs another moderator")
        .with_details(json!({"groupId": "g-1"}))
}

#[rstest]
fn invalid_request_constructor_sets_code() {
    let err = Error::invalid_request("bad");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn new_substitutes_a_description_for_blank_messages() {
    let err = Error::new(ErrorCode::ExistingMember, "  ");
    assert_eq!(err.code(), ErrorCode::ExistingMember);
    assert_eq!(err.message(), "user is already a member of this group");
}

#[rstest]
#[case(Error::invalid_item_action("nope"), true)]
#[case(Error::item_already_requested("beaten to it"), true)]
#[case(Error::existing_member("dup"), false)]
#[case(Error::conflict("retry"), false)]
fn item_action_predicate_covers_the_refinement(#[case] err: Error, #[case] expected: bool) {
    assert_eq!(err.is_invalid_item_action(), expected);
}

#[rstest]
fn errors_serialise_with_snake_case_codes(moderator_error: Error) {
    let value = serde_json::to_value(&moderator_error).expect("error serialises");
    assert_eq!(value.get("code"), Some(&json!("moderator_required")));
    assert_eq!(value.get("details"), Some(&json!({"groupId": "g-1"})));
}

#[rstest]
fn deserialisation_validates_the_message() {
    let payload = json!({"code": "not_found", "message": " "});
    let result = serde_json::from_value::<Error>(payload);
    assert!(result.is_err());
}

#[rstest]
fn serde_round_trip_preserves_details(moderator_error: Error) {
    let value = serde_json::to_value(&moderator_error).expect("error serialises");
    let restored: Error = serde_json::from_value(value).expect("error deserialises");
    assert_eq!(restored, moderator_error);
}

#[rstest]
fn display_uses_the_message() {
    let err = Error::data_integrity("two open transactions for item");
    assert_eq!(err.to_string(), "two open transactions for item");
}
