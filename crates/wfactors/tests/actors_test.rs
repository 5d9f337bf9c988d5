// crates/wfactors/tests/actors_test.rs

use std::collections::HashMap;
use std::sync::Arc;
use wfactors::standard_registry;
use wfcore::Value;
use wfruntime::{RuntimeConfig, Workflow, WorkflowDefinition, WorkflowRuntime};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn runtime() -> WorkflowRuntime {
    WorkflowRuntime::with_registry(Arc::new(standard_registry()), RuntimeConfig::default())
}

async fn run_json(json: &str) -> Workflow {
    let runtime = runtime();
    let definition = WorkflowDefinition::from_json(json).unwrap();
    let mut workflow = runtime.build(&definition).unwrap();
    runtime.execute(&mut workflow, 1).await.unwrap();
    workflow
}

#[test]
fn test_registry_lists_standard_actors() {
    let registry = standard_registry();
    assert_eq!(
        registry.list_actor_types(),
        vec![
            "accumulate", "add", "concat", "constant", "delay", "divide", "filter", "json_parse", "log",
            "multiply", "relay",
        ]
    );
    let metadata = registry.get_metadata("multiply").unwrap();
    assert_eq!(metadata.category, "arithmetic");
    assert_eq!(metadata.inputs, vec!["a", "b"]);
}

#[tokio::test]
async fn test_example_definition_runs() {
    init_tracing();
    let runtime = runtime();
    let mut workflow = runtime.build(&WorkflowDefinition::example()).unwrap();
    runtime.execute(&mut workflow, 2).await.unwrap();

    let store = workflow.store();
    for run in 1..=2 {
        for (step, doubled) in [(1, 2), (2, 4), (3, 6)] {
            assert_eq!(
                store.peek(&format!("/run{}/doubled/{}", run, step)),
                Some(Value::Integer(doubled))
            );
        }
    }
    assert_eq!(workflow.run_count(), 2);
}

#[tokio::test]
async fn test_divide_routes_division_by_zero() {
    init_tracing();
    let workflow = run_json(
        r#"{
            "name": "SafeDivision",
            "nodes": [
                { "kind": "actor", "name": "Divide", "actor": "divide",
                  "constants": { "a": 12 },
                  "sequences": { "b": [4, 0, 5] },
                  "outflows": { "quotient": "/quotient" },
                  "exception_outflows": [
                      { "kind": "DivideByZero", "label": "error", "expression": "/errors" }
                  ] }
            ]
        }"#,
    )
    .await;

    let store = workflow.store();
    assert_eq!(store.peek("/quotient/1"), Some(Value::Integer(3)));
    assert_eq!(store.peek("/quotient/2"), Some(Value::Number(2.4)));
    match store.peek("/errors/1") {
        Some(Value::Object(report)) => {
            assert_eq!(report["kind"], Value::from("DivideByZero"));
            assert_eq!(report["actor"], Value::from("Divide"));
        }
        other => panic!("expected an error report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_filter_drops_out_of_range_values() {
    init_tracing();
    let workflow = run_json(
        r#"{
            "name": "Filtering",
            "nodes": [
                { "kind": "actor", "name": "Keep", "actor": "filter",
                  "settings": { "min": 4, "max": 12 },
                  "sequences": { "value": [1, 5, 10, 15] },
                  "outflows": { "value": "/kept" } }
            ]
        }"#,
    )
    .await;
    assert_eq!(workflow.store().keys(), vec!["/kept/1", "/kept/2"]);
    assert_eq!(workflow.store().peek("/kept/2"), Some(Value::Integer(10)));
}

#[tokio::test]
async fn test_accumulate_resets_between_runs() {
    init_tracing();
    let runtime = runtime();
    let definition = WorkflowDefinition::from_json(
        r#"{
            "name": "RunningTotal",
            "run_prefix": "/run{RUN}",
            "nodes": [
                { "kind": "actor", "name": "Numbers", "actor": "relay",
                  "sequences": { "value": [1, 2, 3] },
                  "outflows": { "value": "/numbers" } },
                { "kind": "actor", "name": "Sum", "actor": "accumulate",
                  "inflows": { "value": "/numbers" },
                  "outflows": { "total": "/totals" } }
            ]
        }"#,
    )
    .unwrap();
    let mut workflow = runtime.build(&definition).unwrap();
    runtime.execute(&mut workflow, 2).await.unwrap();

    let store = workflow.store();
    assert_eq!(store.peek("/run1/totals/3"), Some(Value::Integer(6)));
    assert_eq!(store.peek("/run2/totals/1"), Some(Value::Integer(1)));
    assert_eq!(store.peek("/run2/totals/3"), Some(Value::Integer(6)));
}

#[tokio::test]
async fn test_constant_feeds_receive_once_inflow() {
    init_tracing();
    let workflow = run_json(
        r#"{
            "name": "Greetings",
            "nodes": [
                { "kind": "actor", "name": "Salutation", "actor": "constant",
                  "settings": { "value": "Hello" },
                  "outflows": { "value": "/salutation" } },
                { "kind": "actor", "name": "Names", "actor": "relay",
                  "sequences": { "value": ["Ann", "Bob"] },
                  "outflows": { "value": "/names" } },
                { "kind": "actor", "name": "Greet", "actor": "concat",
                  "settings": { "separator": " " },
                  "receive_once": { "a": "/salutation" },
                  "inflows": { "b": "/names" },
                  "outflows": { "text": "/greetings" } }
            ]
        }"#,
    )
    .await;

    let store = workflow.store();
    assert_eq!(store.peek("/salutation"), Some(Value::from("Hello")));
    assert_eq!(store.peek("/greetings/1"), Some(Value::from("Hello Ann")));
    assert_eq!(store.peek("/greetings/2"), Some(Value::from("Hello Bob")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delay_steps_concurrently_in_order() {
    init_tracing();
    let workflow = run_json(
        r#"{
            "name": "Delays",
            "director": { "kind": "mt-data-driven" },
            "nodes": [
                { "kind": "actor", "name": "Numbers", "actor": "relay",
                  "sequences": { "value": [1, 2, 3, 4, 5, 6] },
                  "outflows": { "value": "/numbers" } },
                { "kind": "actor", "name": "Wait", "actor": "delay",
                  "settings": { "delay_ms": 20 },
                  "max_concurrency": 3,
                  "inflows": { "value": "/numbers" },
                  "outflows": { "value": "/delayed" } }
            ]
        }"#,
    )
    .await;

    let store = workflow.store();
    for i in 1..=6i64 {
        assert_eq!(store.peek(&format!("/delayed/{}", i)), Some(Value::Integer(i)));
    }
}

#[tokio::test]
async fn test_json_parse_produces_structured_value() {
    init_tracing();
    let workflow = run_json(
        r#"{
            "name": "Parse",
            "nodes": [
                { "kind": "actor", "name": "Document", "actor": "json_parse",
                  "sequences": { "json": ["{\"x\": 1}"] },
                  "outflows": { "parsed": "/parsed" } }
            ]
        }"#,
    )
    .await;
    let expected = HashMap::from([("x".to_string(), Value::Integer(1))]);
    assert_eq!(workflow.store().peek("/parsed"), Some(Value::Object(expected)));
}

#[test]
fn test_invalid_setting_is_rejected() {
    let definition = WorkflowDefinition::from_json(
        r#"{
            "name": "BadDelay",
            "nodes": [
                { "kind": "actor", "name": "Wait", "actor": "delay",
                  "settings": { "delay_ms": "soon" },
                  "inflows": { "value": "/numbers" } }
            ]
        }"#,
    )
    .unwrap();
    let error = runtime().build(&definition).unwrap_err();
    assert!(error.to_string().contains("Failed to create actor Wait"));
}
