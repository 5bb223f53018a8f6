//! Prompt content blocks.

use serde_json::json;

use acp_host::models::protocol::{ContentBlock, PromptRequest};
use acp_host::models::session::SessionId;

#[test]
fn prompt_request_shape() {
    let request = PromptRequest {
        session_id: SessionId::new("s-1"),
        prompt: vec![
            ContentBlock::text("Summarize"),
            ContentBlock::ResourceLink {
                uri: "file:///work/README.md".into(),
                name: "README.md".into(),
            },
            ContentBlock::Image {
                data: "iVBORw==".into(),
                mime_type: "image/png".into(),
            },
        ],
    };

    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "sessionId": "s-1",
            "prompt": [
                {"type": "text", "text": "Summarize"},
                {"type": "resource_link", "uri": "file:///work/README.md", "name": "README.md"},
                {"type": "image", "data": "iVBORw==", "mimeType": "image/png"}
            ]
        })
    );
}

#[test]
fn unknown_block_type_is_rejected() {
    assert!(serde_json::from_value::<ContentBlock>(json!({"type": "audio", "data": ""})).is_err());
}

#[test]
fn image_requires_mime_type() {
    assert!(serde_json::from_value::<ContentBlock>(json!({"type": "image", "data": "x"})).is_err());
}
