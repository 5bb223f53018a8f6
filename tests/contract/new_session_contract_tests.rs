//! `session/new` response decoding: required `sessionId`, tolerant extras.

use serde_json::json;

use acp_host::acp::decode;
use acp_host::models::protocol::{NewSessionRequest, NewSessionResponse};
use acp_host::models::session::SessionId;
use acp_host::models::transport::{McpServerConfig, TransportConfig};
use acp_host::AppError;

fn decode(value: serde_json::Value) -> acp_host::Result<NewSessionResponse> {
    decode::strict(value)
}

// ─── Required field ───────────────────────────────────────────────────

#[test]
fn session_id_alone_is_enough() {
    let response = decode(json!({"sessionId": "s-1"})).unwrap();
    assert_eq!(response.session_id, SessionId::new("s-1"));
    assert!(response.modes.is_none());
    assert!(response.models.is_none());
    assert!(response.config_options.is_none());
}

#[test]
fn missing_session_id_fails() {
    let err = decode(json!({"modes": null})).expect_err("sessionId required");
    assert!(matches!(err, AppError::Decode { .. }), "got {err:?}");
    assert!(err.to_string().contains("sessionId"));
}

#[test]
fn non_string_session_id_fails() {
    let err = decode(json!({"sessionId": 17})).expect_err("must be a string");
    assert!(matches!(err, AppError::Decode { .. }));
    assert!(err.to_string().contains("sessionId"));
}

// ─── Optional fields ──────────────────────────────────────────────────

#[test]
fn well_formed_catalogs_decode() {
    let response = decode(json!({
        "sessionId": "s-2",
        "modes": {
            "currentModeId": "code",
            "availableModes": [
                {"id": "ask", "name": "Ask"},
                {"id": "code", "name": "Code", "description": "Edits files"}
            ]
        },
        "models": {
            "currentModelId": "fast",
            "availableModels": [{"modelId": "fast", "name": "Fast"}]
        },
        "configOptions": [{
            "id": "effort",
            "name": "Effort",
            "currentValue": "high",
            "options": [{"value": "low", "name": "Low"}, {"value": "high", "name": "High"}]
        }]
    }))
    .unwrap();

    let modes = response.modes.expect("modes");
    assert_eq!(modes.current().map(|m| m.name.as_str()), Some("Code"));
    let models = response.models.expect("models");
    assert_eq!(models.current().map(|m| m.model_id.as_str()), Some("fast"));
    let options = response.config_options.expect("config options");
    assert_eq!(options[0].current_value, "high");
    assert_eq!(options[0].options.len(), 2);
}

/// A broken `modes` object does not take `models` down with it.
#[test]
fn malformed_modes_are_dropped_alone() {
    let response = decode(json!({
        "sessionId": "s-3",
        "modes": {"currentModeId": 5, "availableModes": "nope"},
        "models": {
            "currentModelId": "m",
            "availableModels": [{"modelId": "m", "name": "M"}]
        }
    }))
    .unwrap();

    assert_eq!(response.session_id, SessionId::new("s-3"));
    assert!(response.modes.is_none());
    assert!(response.models.is_some());
}

#[test]
fn malformed_config_options_are_dropped() {
    let response = decode(json!({
        "sessionId": "s-4",
        "configOptions": {"not": "a list"}
    }))
    .unwrap();
    assert!(response.config_options.is_none());
}

#[test]
fn unknown_current_mode_is_tolerated() {
    let response = decode(json!({
        "sessionId": "s-5",
        "modes": {"currentModeId": "ghost", "availableModes": [{"id": "ask", "name": "Ask"}]}
    }))
    .unwrap();
    let modes = response.modes.expect("modes kept");
    assert!(modes.current().is_none());
}

// ─── Request ──────────────────────────────────────────────────────────

#[test]
fn request_carries_cwd_and_servers() {
    let request = NewSessionRequest {
        cwd: "/work/project".into(),
        mcp_servers: vec![McpServerConfig {
            name: "search".into(),
            transport: TransportConfig::Http {
                url: "https://search.invalid/mcp".into(),
                headers: Vec::new(),
            },
        }],
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "cwd": "/work/project",
            "mcpServers": [{"name": "search", "type": "http", "url": "https://search.invalid/mcp"}]
        })
    );
}
