//! Integration tests against a real stdio MCP server process.
//!
//! The server is `tests/fixtures/calc_server.sh`, run under bash.

use chorus_mcp::{
    LaunchSpec, LifecycleManager, McpServersConfig, McpSession, ServerSources, ToolCollision,
};
use chorus_types::ChorusError;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CALC_SERVER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/calc_server.sh");

fn calc_spec() -> LaunchSpec {
    LaunchSpec {
        timeout_ms: 5000,
        ..LaunchSpec::new("bash", vec![CALC_SERVER.to_string()])
    }
}

fn labelled_spec(label: &str) -> LaunchSpec {
    let mut spec = calc_spec();
    spec.env.insert("CALC_LABEL".to_string(), label.to_string());
    spec
}

#[tokio::test]
async fn connect_lists_and_calls() {
    let session = McpSession::connect("calc", &calc_spec()).await.unwrap();
    assert_eq!(session.server_name(), "calc");

    let names: Vec<&str> = session.tools().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["evaluate_expression", "crash"]);
    assert_eq!(
        session.tools()[0].input_schema.as_value()["required"],
        json!(["expression"])
    );
    // No schema advertised: default object schema
    assert_eq!(session.tools()[1].input_schema.as_value()["type"], "object");

    let output = session
        .call_tool("evaluate_expression", json!({"expression": "2+2"}))
        .await
        .unwrap();
    assert!(!output.is_error);
    assert_eq!(output.text_content(), "4");

    let relisted = session.list_tools().await.unwrap();
    assert_eq!(relisted.len(), 2);

    session.close().await.unwrap();
    // Idempotent
    session.close().await.unwrap();
}

#[tokio::test]
async fn provider_reported_error_is_data() {
    let session = McpSession::connect("calc", &calc_spec()).await.unwrap();

    let output = session
        .call_tool("evaluate_expression", json!({"expression": "1/0"}))
        .await
        .unwrap();
    assert!(output.is_error);
    assert!(output.text_content().contains("invalid expression"));

    // The session is still usable afterwards
    let output = session
        .call_tool("evaluate_expression", json!({"expression": "6*7"}))
        .await
        .unwrap();
    assert_eq!(output.text_content(), "42");

    session.close().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_each_get_their_own_answer() {
    let session = Arc::new(McpSession::connect("calc", &calc_spec()).await.unwrap());

    let handles: Vec<_> = (1..=20u64)
        .map(|n| {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let output = session
                    .call_tool("evaluate_expression", json!({"expression": format!("{n}*{n}")}))
                    .await
                    .unwrap();
                (n, output.text_content())
            })
        })
        .collect();

    for handle in handles {
        let (n, answer) = handle.await.unwrap();
        assert_eq!(answer, (n * n).to_string());
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn non_utf8_output_does_not_break_the_session() {
    let mut spec = calc_spec();
    spec.env.insert("CALC_NOISE".to_string(), "1".to_string());
    let session = McpSession::connect("noisy", &spec).await.unwrap();
    assert_eq!(session.tools().len(), 2);

    let output = session
        .call_tool("evaluate_expression", json!({"expression": "5+5"}))
        .await
        .unwrap();
    assert_eq!(output.text_content(), "10");

    // Every tools/list is preceded by noise
    assert_eq!(session.list_tools().await.unwrap().len(), 2);

    session.close().await.unwrap();
}

#[tokio::test]
async fn json_rpc_error_is_tool_invocation_error() {
    let session = McpSession::connect("calc", &calc_spec()).await.unwrap();

    match session.call_tool("no_such_tool", json!({})).await {
        Err(ChorusError::ToolInvocation { tool, message }) => {
            assert_eq!(tool, "no_such_tool");
            assert!(message.contains("Unknown tool"));
            assert!(message.contains("-32602"));
        }
        other => panic!("Expected ToolInvocation, got: {other:?}"),
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn provider_crash_is_transport_error() {
    let session = McpSession::connect("calc", &calc_spec()).await.unwrap();

    match session.call_tool("crash", json!({})).await {
        Err(ChorusError::Transport { server, .. }) => assert_eq!(server, "calc"),
        other => panic!("Expected Transport, got: {other:?}"),
    }

    // Later calls fail fast instead of waiting for the request timeout
    let started = Instant::now();
    let result = session
        .call_tool("evaluate_expression", json!({"expression": "1+1"}))
        .await;
    assert!(matches!(result, Err(ChorusError::Transport { .. })));
    assert!(started.elapsed() < Duration::from_secs(4));

    session.close().await.unwrap();
}

#[tokio::test]
async fn crash_affects_only_its_own_session() {
    let config = McpServersConfig::default()
        .with_server("doomed", labelled_spec("doomed"))
        .with_server("steady", labelled_spec("steady"));
    let manager = LifecycleManager::start(&ServerSources::Config(config))
        .await
        .unwrap();

    let doomed = &manager.registry().sessions()[0];
    assert!(doomed.call_tool("crash", json!({})).await.is_err());

    let steady = &manager.registry().sessions()[1];
    let output = steady
        .call_tool("evaluate_expression", json!({"expression": "3+4"}))
        .await
        .unwrap();
    assert_eq!(output.text_content(), "steady:7");

    manager.stop().await;
}

#[tokio::test]
async fn lifecycle_merges_catalogs_first_wins() {
    let config = McpServersConfig::default()
        .with_server("first", labelled_spec("first"))
        .with_server("second", labelled_spec("second"));
    let manager = LifecycleManager::start(&ServerSources::Config(config))
        .await
        .unwrap();
    let registry = manager.shared_registry();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.catalog().len(), 2);
    assert_eq!(
        registry.collisions()[0],
        ToolCollision {
            tool: "evaluate_expression".to_string(),
            kept_server: "first".to_string(),
            shadowed_server: "second".to_string(),
        }
    );

    let output = registry
        .resolve_and_call("evaluate_expression", json!({"expression": "2+2"}))
        .await
        .unwrap();
    assert_eq!(output.text_content(), "first:4");

    let report = manager.stop().await;
    assert_eq!(report.closed, vec!["first", "second"]);
    assert!(report.is_clean());
}

#[tokio::test]
async fn lifecycle_fails_fast_on_bad_server() {
    let config = McpServersConfig::default()
        .with_server("calc", calc_spec())
        .with_server("bad", LaunchSpec::new("nonexistent_command_xyz123", vec![]))
        .with_server("never", calc_spec());

    match LifecycleManager::start(&ServerSources::Config(config)).await {
        Err(ChorusError::Connection { server, .. }) => assert_eq!(server, "bad"),
        Err(other) => panic!("Expected Connection, got: {other:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}
