//! Transport descriptor decode/encode.

use serde_json::json;

use acp_host::models::transport::{EnvVariable, HttpHeader, McpServerConfig, TransportConfig};

#[test]
fn each_variant_decodes_and_reencodes() {
    let cases = [
        json!({"type": "stdio", "command": "node", "args": ["agent.js"], "env": [{"name": "A", "value": "1"}]}),
        json!({"type": "http", "url": "https://mcp.invalid", "headers": [{"name": "X-Key", "value": "k"}]}),
        json!({"type": "sse", "url": "https://mcp.invalid/sse"}),
    ];

    for wire in cases {
        let decoded: TransportConfig = serde_json::from_value(wire.clone()).expect("valid");
        assert_eq!(serde_json::to_value(&decoded).unwrap(), wire);
    }
}

#[test]
fn unknown_type_fails_with_offending_value() {
    let err = serde_json::from_value::<TransportConfig>(json!({"type": "grpc", "url": "x"}))
        .expect_err("closed set");
    assert!(
        err.to_string().contains("unrecognized transport type: grpc"),
        "got {err}"
    );
}

#[test]
fn non_string_type_fails() {
    let err = serde_json::from_value::<TransportConfig>(json!({"type": 1, "url": "x"}))
        .expect_err("type must be a string");
    assert!(err.to_string().contains("must be a string"));
}

#[test]
fn variant_fields_are_required() {
    assert!(serde_json::from_value::<TransportConfig>(json!({"type": "stdio"})).is_err());
    assert!(serde_json::from_value::<TransportConfig>(json!({"type": "http"})).is_err());
    assert!(
        serde_json::from_value::<TransportConfig>(json!({"type": "sse", "command": "x"})).is_err()
    );
}

#[test]
fn stdio_always_encodes_args_and_env() {
    let t = TransportConfig::Stdio {
        command: "agent".into(),
        args: Vec::new(),
        env: Vec::new(),
    };
    assert_eq!(
        serde_json::to_value(&t).unwrap(),
        json!({"type": "stdio", "command": "agent", "args": [], "env": []})
    );
}

#[test]
fn empty_headers_are_omitted() {
    let t = TransportConfig::Http {
        url: "http://x".into(),
        headers: Vec::new(),
    };
    assert_eq!(
        serde_json::to_value(&t).unwrap(),
        json!({"type": "http", "url": "http://x"})
    );
}

#[test]
fn mcp_server_flattens_transport_next_to_name() {
    let server = McpServerConfig {
        name: "fs".into(),
        transport: TransportConfig::Stdio {
            command: "mcp-fs".into(),
            args: vec!["--root".into(), "/tmp".into()],
            env: vec![EnvVariable {
                name: "DEBUG".into(),
                value: "1".into(),
            }],
        },
    };
    let wire = serde_json::to_value(&server).unwrap();
    assert_eq!(wire["name"], "fs");
    assert_eq!(wire["type"], "stdio");
    assert_eq!(wire["command"], "mcp-fs");

    let headers = vec![HttpHeader {
        name: "Authorization".into(),
        value: "Bearer t".into(),
    }];
    let sse = McpServerConfig {
        name: "events".into(),
        transport: TransportConfig::Sse {
            url: "https://e.invalid".into(),
            headers,
        },
    };
    let back: McpServerConfig =
        serde_json::from_value(serde_json::to_value(&sse).unwrap()).unwrap();
    assert_eq!(back, sse);
}

#[test]
fn kind_matches_discriminator() {
    let t: TransportConfig = serde_json::from_value(json!({"type": "sse", "url": "u"})).unwrap();
    assert_eq!(t.kind(), "sse");
}
