//! Strict vs lenient decoding of protocol payloads.

use serde_json::json;

use acp_host::acp::decode;
use acp_host::models::protocol::{
    ModesInfo, NewSessionResponse, PromptResponse, SetModeResponse, StopReason,
};
use acp_host::AppError;

#[test]
fn strict_reports_path_of_type_mismatch() {
    let err = decode::strict::<ModesInfo>(json!({
        "currentModeId": "code",
        "availableModes": [{"id": "code", "name": 7}]
    }))
    .expect_err("name must be a string");

    match err {
        AppError::Decode { path, message } => {
            assert_eq!(path, "availableModes[0].name");
            assert!(message.contains("invalid type"), "got {message}");
        }
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[test]
fn strict_reports_missing_required_field() {
    let err = decode::strict::<ModesInfo>(json!({"availableModes": []}))
        .expect_err("currentModeId is required");
    match err {
        AppError::Decode { message, .. } => {
            assert!(message.contains("missing field `currentModeId`"), "got {message}");
        }
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[test]
fn null_result_decodes_as_empty_object() {
    let _: SetModeResponse = decode::result(serde_json::Value::Null).expect("null is {}");
}

#[test]
fn null_result_still_requires_mandatory_fields() {
    let err = decode::result::<PromptResponse>(serde_json::Value::Null)
        .expect_err("stopReason is required");
    assert!(matches!(err, AppError::Decode { .. }));
}

#[test]
fn unknown_stop_reason_is_not_a_decode_error() {
    let resp: PromptResponse =
        decode::strict(json!({"stopReason": "refusal"})).expect("open-world enum");
    assert_eq!(resp.stop_reason, StopReason::Unknown);
}

/// Each optional field fails on its own; the others survive.
#[test]
fn lenient_fields_fail_independently() {
    let resp: NewSessionResponse = decode::strict(json!({
        "sessionId": "s-1",
        "modes": {"currentModeId": "ask", "availableModes": [{"id": "ask", "name": "Ask"}]},
        "models": "not an object",
        "configOptions": [{"id": "effort"}]
    }))
    .expect("sessionId is valid");

    assert_eq!(resp.session_id.as_str(), "s-1");
    assert_eq!(resp.modes.expect("modes kept").current_mode_id, "ask");
    assert!(resp.models.is_none());
    assert!(resp.config_options.is_none());
}

#[test]
fn null_optional_fields_are_absent() {
    let resp: NewSessionResponse =
        decode::strict(json!({"sessionId": "s-2", "modes": null})).expect("decode");
    assert!(resp.modes.is_none());
}
