// crates/wfruntime/tests/exception_test.rs

use std::collections::HashMap;
use wfcore::{Actor, StepError, Value};
use wfruntime::{ActorNode, PublishSubscribeDirector, Workflow};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn divider() -> Actor {
    Actor::from_fn("Divider", |io| {
        let a = io.input_i64("a")?;
        let b = io.input_i64("b")?;
        if b == 0 {
            return Err(StepError::raise("DivideByZero", "cannot divide by zero"));
        }
        io.set_output("quotient", a / b);
        Ok(())
    })
}

fn divide_node() -> ActorNode {
    ActorNode::named("Divide", divider())
        .with_constant("a", 10)
        .with_sequence("b", vec![1.into(), 0.into(), 2.into()])
        .with_outflow("quotient", "/quotient")
        .unwrap()
}

async fn run(node: ActorNode) -> (Workflow, wfcore::Result<()>) {
    let mut workflow = Workflow::builder("Division")
        .director(PublishSubscribeDirector::new())
        .node(node)
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    let result = workflow.run().await;
    (workflow, result)
}

#[tokio::test]
async fn test_exception_routed_to_outflow() {
    init_tracing();
    let node = divide_node()
        .with_exception_outflow("DivideByZero", "error", "/errors")
        .unwrap();
    let (workflow, result) = run(node).await;
    result.unwrap();

    let store = workflow.store();
    assert_eq!(store.peek("/quotient/1"), Some(Value::Integer(10)));
    assert_eq!(store.peek("/quotient/2"), Some(Value::Integer(5)));
    let report = HashMap::from([
        ("actor".to_string(), Value::from("Divider")),
        ("kind".to_string(), Value::from("DivideByZero")),
        (
            "message".to_string(),
            Value::from("DivideByZero: cannot divide by zero"),
        ),
    ]);
    assert_eq!(store.peek("/errors/1"), Some(Value::Object(report)));
}

#[tokio::test]
async fn test_wildcard_route_catches_any_kind() {
    init_tracing();
    let node = divide_node().with_exception_outflow("*", "error", "/errors").unwrap();
    let (workflow, result) = run(node).await;
    result.unwrap();
    assert!(workflow.store().contains("/errors/1"));
    assert!(workflow.store().contains("/quotient/2"));
}

#[tokio::test]
async fn test_exception_ends_flow_when_configured() {
    init_tracing();
    let (workflow, result) = run(divide_node().with_end_flow_on_actor_exception(true)).await;
    result.unwrap();
    assert_eq!(workflow.store().keys(), vec!["/quotient/1"]);
}

#[tokio::test]
async fn test_unhandled_exception_fails_run() {
    init_tracing();
    let (workflow, result) = run(divide_node()).await;
    let error = result.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Actor Divider on node Divide threw an exception: Exception in step of actor Divider: DivideByZero: cannot divide by zero"
    );
    assert_eq!(workflow.store().keys(), vec!["/quotient/1"]);
}

#[tokio::test]
async fn test_null_output_can_end_flow() {
    init_tracing();
    let until_three = Actor::from_fn("UntilThree", |io| {
        let x = io.input_i64("x")?;
        if x < 3 {
            io.set_output("y", x);
        } else {
            io.set_output("y", Value::Null);
        }
        Ok(())
    });
    let node = ActorNode::named("Limit", until_three)
        .with_sequence("x", vec![1.into(), 2.into(), 3.into(), 4.into()])
        .with_outflow("y", "/limited")
        .unwrap()
        .with_end_flow_on_null(true);
    let (workflow, result) = run(node).await;
    result.unwrap();
    assert_eq!(workflow.store().keys(), vec!["/limited/1", "/limited/2"]);
}
