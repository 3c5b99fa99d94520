//! Supervisor/worker runs against mock completion services

use std::sync::Arc;

use orchestrator_core::ToolError;
use orchestrator_crew::{
    MultiAgentConfig, MultiAgentExecutor, Supervisor, Worker, WorkerConfig, MAX_ITERATIONS_OUTPUT,
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

fn calculator_tools() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(tool_fn(
        ToolSchema::new("calculator", "Evaluate arithmetic"),
        |input| async move {
            match input["expression"].as_str() {
                Some("6*7") => Ok("42".to_string()),
                _ => Err(ToolError::ExecutionFailed("unsupported".to_string())),
            }
        },
    )));
    registry
}

fn calculator_config() -> WorkerConfig {
    WorkerConfig::new("calculator", "Does arithmetic").with_system_prompt("You compute.")
}

fn supervisor(responses: Vec<&str>) -> (Arc<MockBackend>, Supervisor) {
    let backend = Arc::new(
        MockBackend::new().with_responses(responses.into_iter().map(MockResponse::text).collect()),
    );
    let supervisor = Supervisor::new(
        backend.clone(),
        vec![
            calculator_config(),
            WorkerConfig::new("translator", "Translates text"),
        ],
    );
    (backend, supervisor)
}

#[tokio::test]
async fn test_route_then_finish_with_last_output() {
    init_tracing();
    let worker_backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::tool_call("calculator", json!({"expression": "6*7"})),
        MockResponse::text("The answer is 42"),
    ]));
    let worker = Worker::tool_calling(calculator_config(), worker_backend.clone(), calculator_tools());

    let (supervisor_backend, supervisor) = supervisor(vec![
        r#"{"next": "calculator", "instruction": "compute 6*7"}"#,
        "```json\n{\"next\": \"FINISH\", \"instruction\": \"\"}\n```",
    ]);

    let executor = MultiAgentExecutor::new(supervisor, vec![worker]);
    let result = executor.run("What is 6 times 7?", None).await.unwrap();

    assert!(result.finished);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.output, "The answer is 42");

    assert_eq!(result.results.len(), 1);
    let run = &result.results[0];
    assert_eq!(run.agent_name, "calculator");
    assert_eq!(run.input, "compute 6*7");
    assert!(run.success);
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].observation, "42");

    assert_eq!(result.qa_pairs.len(), 2);
    assert_eq!(result.qa_pairs[0].question, "compute 6*7");
    assert_eq!(result.qa_pairs[1].question, "What is 6 times 7?");
    assert_eq!(result.qa_pairs[1].answer, "The answer is 42");

    // Worker system prompt leads its own request
    let first = &worker_backend.get_recorded_calls()[0];
    assert_eq!(first.messages[0].content, "You compute.");

    // Second supervisor call sees the first result
    let second = &supervisor_backend.get_recorded_calls()[1];
    assert!(second
        .messages
        .iter()
        .any(|m| m.content.contains("calculator was asked: compute 6*7")));
}

#[tokio::test]
async fn test_unknown_worker_is_recorded_and_run_continues() {
    init_tracing();
    // "translator" is known to the supervisor but has no worker behind it
    let (_, supervisor) = supervisor(vec![
        r#"{"next": "translator", "instruction": "say hi in French"}"#,
        r#"{"next": "FINISH", "instruction": "Bonjour"}"#,
    ]);
    let worker = Worker::tool_calling(
        calculator_config(),
        Arc::new(MockBackend::new()),
        calculator_tools(),
    );

    let result = MultiAgentExecutor::new(supervisor, vec![worker])
        .run("Greet in French", None)
        .await
        .unwrap();

    assert!(result.finished);
    assert_eq!(result.output, "Bonjour");
    assert_eq!(result.results.len(), 1);
    assert!(!result.results[0].success);
    assert_eq!(
        result.results[0].error.as_deref(),
        Some("unknown worker: translator")
    );
    assert_eq!(result.qa_pairs[0].answer, "Error: unknown worker: translator");
}

#[tokio::test]
async fn test_roster_built_from_workers() {
    let supervisor_backend = Arc::new(MockBackend::new().with_responses(vec![
        MockResponse::text(r#"{"next": "translator", "instruction": "say hi"}"#),
        MockResponse::text(r#"{"next": "FINISH", "instruction": "6*7 is 42"}"#),
    ]));
    let worker = Worker::tool_calling(
        calculator_config(),
        Arc::new(MockBackend::new().with_response(MockResponse::text("42"))),
        calculator_tools(),
    );

    let result = MultiAgentExecutor::from_workers(supervisor_backend.clone(), vec![worker])
        .run("What is 6 times 7?", None)
        .await
        .unwrap();

    // "translator" is not on the roster, so routing falls back to the
    // only worker with the whole task
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].agent_name, "calculator");
    assert_eq!(result.results[0].input, "What is 6 times 7?");
    assert!(result.results[0].success);
    assert_eq!(result.output, "6*7 is 42");

    let prompt = &supervisor_backend.get_recorded_calls()[0].messages[0].content;
    assert!(prompt.contains("- calculator: Does arithmetic"));
    assert!(!prompt.contains("translator"));
}

#[tokio::test]
async fn test_completion_language_finishes() {
    let (_, supervisor) = supervisor(vec!["最终答案：四十二"]);

    let result = MultiAgentExecutor::new(supervisor, Vec::new())
        .run("answer", None)
        .await
        .unwrap();

    assert!(result.finished);
    assert_eq!(result.iterations, 1);
    assert!(result.results.is_empty());
    assert_eq!(result.output, "");
}

#[tokio::test]
async fn test_max_iterations_stops_run() {
    let (supervisor_backend, supervisor) =
        supervisor(vec![r#"{"next": "calculator", "instruction": "again"}"#]);
    let worker = Worker::tool_calling(
        calculator_config(),
        Arc::new(MockBackend::new().with_response(MockResponse::text("still working"))),
        calculator_tools(),
    );

    let result = MultiAgentExecutor::new(supervisor, vec![worker])
        .with_config(MultiAgentConfig::default().with_max_iterations(3))
        .run("loop forever", Some("1. keep going"))
        .await
        .unwrap();

    assert!(!result.finished);
    assert_eq!(result.output, MAX_ITERATIONS_OUTPUT);
    assert_eq!(result.iterations, 3);
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.qa_pairs.len(), 3);
    assert_eq!(supervisor_backend.call_count(), 3);

    let call = supervisor_backend.last_call().unwrap();
    assert!(call.messages.iter().any(|m| m.content == "Plan:\n1. keep going"));
}

#[tokio::test]
async fn test_worker_error_becomes_failed_result() {
    let (_, supervisor) = supervisor(vec![
        r#"{"next": "calculator", "instruction": "compute"}"#,
        r#"{"next": "FINISH", "instruction": ""}"#,
    ]);
    let worker = Worker::react(
        calculator_config(),
        Arc::new(MockBackend::new().with_response(MockResponse::error("service down"))),
        calculator_tools(),
    );

    let result = MultiAgentExecutor::new(supervisor, vec![worker])
        .run("compute", None)
        .await
        .unwrap();

    assert!(result.finished);
    assert_eq!(result.results.len(), 1);
    assert!(!result.results[0].success);
    assert!(result.results[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("service down"));
    // Nothing succeeded, so there is no output to fall back to
    assert_eq!(result.output, "");
}

#[tokio::test]
async fn test_supervisor_backend_error_propagates() {
    let backend = Arc::new(MockBackend::new().with_response(MockResponse::error("boom")));
    let supervisor = Supervisor::new(backend, vec![calculator_config()]);

    let result = MultiAgentExecutor::new(supervisor, Vec::new())
        .run("anything", None)
        .await;

    assert!(result.is_err());
}
