//! End-to-end executor tests against the mock completion service

use std::sync::Arc;

use futures::StreamExt;
use async_trait::async_trait;
use orchestrator_agents::{
    AgentExecutor, BufferMemory, ExecutorConfig, FnConfirmation, Memory, MemoryStore, ReActAgent,
    ToolCallingAgent,
};
use orchestrator_core::{
    errors::{AgentError, MemoryError},
    AgentEvent, Message, MessageRole, ToolError,
};
use orchestrator_providers::{MockBackend, MockResponse};
use orchestrator_tools::{tool_fn, ToolRegistry, ToolSchema};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(tool_fn(
        ToolSchema::new("echo", "Echoes its input"),
        |input| async move { Ok(input.to_string()) },
    )));
    registry.register(Arc::new(tool_fn(
        ToolSchema::new("calculator", "Evaluate arithmetic").with_parameters(json!({
            "type": "object",
            "properties": {"expression": {"type": "string"}},
            "required": ["expression"]
        })),
        |input| async move {
            match input["expression"].as_str() {
                Some("2+2") => Ok("4".to_string()),
                Some(other) => Err(ToolError::ExecutionFailed(format!("cannot evaluate {}", other))),
                None => Err(ToolError::InvalidArguments("expression".to_string())),
            }
        },
    )));
    registry.register(Arc::new(tool_fn(
        ToolSchema::new("delete_file", "Delete a file")
            .with_parameters(json!({
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }))
            .with_confirmation(true),
        |input| async move { Ok(format!("deleted {}", input["path"].as_str().unwrap_or(""))) },
    )));
    registry.register(Arc::new(tool_fn(ToolSchema::new("fail", "Always fails"), |_| async move {
        Err(ToolError::ExecutionFailed("boom".to_string()))
    })));
    registry
}

fn tool_calling(backend: Arc<MockBackend>) -> AgentExecutor {
    let registry = registry();
    let strategy = Arc::new(ToolCallingAgent::new(backend, registry.clone()));
    AgentExecutor::new(strategy, registry)
}

async fn collect(executor: &AgentExecutor, input: &str) -> Vec<AgentEvent> {
    executor.stream(input).collect().await
}

#[tokio::test]
async fn test_stream_event_order() {
    init_tracing();
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("echo", json!({"a": 1})),
        MockResponse::text("done"),
    ]));

    let events = collect(&tool_calling(backend), "go").await;

    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], AgentEvent::ToolStart { action } if action.tool_name == "echo"));
    assert!(matches!(
        &events[1],
        AgentEvent::ToolEnd { observation, success: true, .. } if observation == r#"{"a":1}"#
    ));
    assert_eq!(
        events[2],
        AgentEvent::Token {
            content: "done".to_string()
        }
    );
    assert!(matches!(
        &events[3],
        AgentEvent::Finish { output, steps, stopped: None } if output == "done" && steps.len() == 1
    ));
}

#[tokio::test]
async fn test_stream_with_streaming_backend_emits_word_tokens() {
    let backend = Arc::new(
        MockBackend::new()
            .with_streaming(true)
            .with_response(MockResponse::text("all good here")),
    );

    let events = collect(&tool_calling(backend), "status?").await;
    let tokens: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();

    assert_eq!(tokens, vec!["all ", "good ", "here"]);
    assert_eq!(events.iter().filter(|e| e.is_finish()).count(), 1);
    assert!(events.last().unwrap().is_finish());
}

#[tokio::test]
async fn test_stream_error_then_finish() {
    let backend = Arc::new(MockBackend::new().with_response(MockResponse::error("down")));

    let events = collect(&tool_calling(backend), "hi").await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        AgentEvent::Error {
            message: "LLM error: API error: down".to_string()
        }
    );
    assert!(events[1].is_finish());
}

#[tokio::test]
async fn test_invoke_propagates_completion_errors() {
    let backend = Arc::new(MockBackend::new().with_response(MockResponse::error("down")));
    assert!(tool_calling(backend).invoke("hi").await.is_err());
}

#[tokio::test]
async fn test_rejected_action_records_observation() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("delete_file", json!({"path": "/etc"})),
        MockResponse::text("left it alone"),
    ]));
    let executor = tool_calling(backend)
        .with_config(ExecutorConfig::default().with_continue_on_error(false))
        .with_confirmation(Arc::new(FnConfirmation::always(false)));

    let events = collect(&executor, "clean up").await;

    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::HumanConfirm { approved: false, .. })));
    match events.last() {
        Some(AgentEvent::Finish { output, steps, .. }) => {
            assert_eq!(output, "left it alone");
            assert_eq!(steps[0].observation, "user rejected");
            assert!(!steps[0].success);
        }
        other => panic!("expected finish, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gated_and_parallel_steps_keep_action_order() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_calls(vec![
            ("delete_file", json!({"path": "/tmp/a"})),
            ("echo", json!({"b": 2})),
        ]),
        MockResponse::text("ok"),
    ]));
    let executor =
        tool_calling(backend).with_confirmation(Arc::new(FnConfirmation::always(true)));

    let output = executor.invoke("tidy").await.unwrap();

    assert_eq!(output.steps.len(), 2);
    assert_eq!(output.steps[0].action.tool_name, "delete_file");
    assert_eq!(output.steps[0].observation, "deleted /tmp/a");
    assert_eq!(output.steps[1].action.tool_name, "echo");
}

#[tokio::test]
async fn test_tool_failure_continues_by_default() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("fail", json!({})),
        MockResponse::text("recovered"),
    ]));

    let output = tool_calling(backend).invoke("try").await.unwrap();

    assert_eq!(output.output, "recovered");
    assert_eq!(output.steps[0].observation, "Error: Execution failed: boom");
    assert!(!output.steps[0].success);
}

#[tokio::test]
async fn test_tool_failure_stops_when_configured() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("fail", json!({})),
        MockResponse::text("unreachable"),
    ]));

    let output = tool_calling(backend.clone())
        .with_config(ExecutorConfig::default().with_continue_on_error(false))
        .invoke("try")
        .await
        .unwrap();

    assert_eq!(
        output.output,
        "execution stopped: tool 'fail' failed: Execution failed: boom"
    );
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_tool_is_failed_step() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("teleport", json!({})),
        MockResponse::text("no such tool"),
    ]));

    let output = tool_calling(backend).invoke("beam me up").await.unwrap();
    assert_eq!(output.steps[0].observation, "Error: Tool not found: teleport");
}

#[tokio::test]
async fn test_repeated_action_stops_run() {
    let backend = Arc::new(
        MockBackend::new().with_response(MockResponse::tool_call("echo", json!({"same": true}))),
    );

    let output = tool_calling(backend.clone()).invoke("loop").await.unwrap();

    assert_eq!(output.stopped.as_deref(), Some("repeated action 'echo' 3 times"));
    assert_eq!(output.output, "execution stopped: repeated action 'echo' 3 times");
    assert_eq!(output.steps.len(), 3);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn test_memory_carries_history_between_invocations() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::text("nice to meet you"),
        MockResponse::text("your name is Ada"),
    ]));
    let memory = Arc::new(BufferMemory::new(10));
    let executor = tool_calling(backend.clone()).with_memory(memory.clone());

    executor.invoke("my name is Ada").await.unwrap();
    executor.invoke("what is my name?").await.unwrap();

    let second = &backend.get_recorded_calls()[1];
    let roles: Vec<MessageRole> = second.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
    );

    assert_eq!(
        memory.load().await.unwrap(),
        vec![
            Message::human("my name is Ada"),
            Message::ai("nice to meet you"),
            Message::human("what is my name?"),
            Message::ai("your name is Ada"),
        ]
    );
}

#[tokio::test]
async fn test_memory_saved_when_stopped() {
    let backend = Arc::new(
        MockBackend::new().with_response(MockResponse::tool_call("echo", json!({"n": 1}))),
    );
    let memory = Arc::new(BufferMemory::new(10));
    let executor = tool_calling(backend)
        .with_config(ExecutorConfig::default().with_max_iterations(1))
        .with_memory(memory.clone());

    let output = executor.invoke("spin").await.unwrap();

    let saved = memory.load().await.unwrap();
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[2].role(), MessageRole::Tool);
    assert!(saved[3].is_ai_with_content(&output.output));
}

#[tokio::test]
async fn test_memory_saves_tool_round_trips() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("echo", json!({"text": "hi"})),
        MockResponse::text("done"),
    ]));
    let memory = Arc::new(BufferMemory::new(50));
    let executor = tool_calling(backend).with_memory(memory.clone());

    let output = executor.invoke("go").await.unwrap();
    let call_id = output.steps[0].action.id.clone();

    let saved = memory.load().await.unwrap();
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[0], Message::human("go"));
    match &saved[1] {
        Message::Ai { tool_calls, .. } => {
            assert_eq!(tool_calls.len(), 1);
            assert_eq!(tool_calls[0].id, call_id);
            assert_eq!(tool_calls[0].name, "echo");
        }
        other => panic!("expected tool-call message, got {:?}", other),
    }
    assert_eq!(
        saved[2],
        Message::tool(call_id, "echo", output.steps[0].observation.clone())
    );
    // Final answer recorded once
    assert_eq!(saved[3], Message::ai("done"));
}

struct UnreachableStore;

#[async_trait]
impl MemoryStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, MemoryError> {
        Err(MemoryError::StorageError("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), MemoryError> {
        Err(MemoryError::StorageError("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_memory_store_error_propagates() {
    let backend = Arc::new(MockBackend::new().with_response(MockResponse::text("unused")));
    let memory = Arc::new(BufferMemory::new(10).with_store(Arc::new(UnreachableStore), "conv"));
    let executor = tool_calling(backend.clone()).with_memory(memory);

    let err = executor.invoke("hello").await.unwrap_err();

    assert!(matches!(
        err,
        AgentError::MemoryError(MemoryError::StorageError(ref message)) if message == "connection refused"
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_react_agent_end_to_end() {
    let backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::text(
            "Thought: I need to add\nAction: calculator\nAction Input: {\"expression\":\"2+2\"}",
        ),
        MockResponse::text("Thought: I now know the final answer\nFinal Answer: 4"),
    ]));
    let registry = registry();
    let strategy = Arc::new(ReActAgent::new(backend.clone(), registry.clone()));
    let executor = AgentExecutor::new(strategy, registry);

    let output = executor.invoke("What is 2+2?").await.unwrap();

    assert_eq!(output.output, "4");
    assert_eq!(output.steps.len(), 1);
    assert_eq!(output.steps[0].observation, "4");

    let second = &backend.get_recorded_calls()[1];
    let last = &second.messages.last().unwrap().content;
    assert!(last.contains("Action: calculator"));
    assert!(last.contains("Observation: 4"));
    assert!(last.ends_with("Thought:"));
}
