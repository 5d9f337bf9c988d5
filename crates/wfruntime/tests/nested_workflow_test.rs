// crates/wfruntime/tests/nested_workflow_test.rs

use wfcore::{Actor, Value, WorkflowContext};
use wfruntime::{ActorNode, PublishSubscribeDirector, Workflow, WorkflowBuilder, WorkflowState};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn relay() -> Actor {
    Actor::from_fn("Relay", |io| {
        let value = io.input("value")?.clone();
        io.set_output("value", value);
        Ok(())
    })
}

fn inner_doubler(context: &WorkflowContext) -> WorkflowBuilder {
    Workflow::builder("Doubler")
        .context(context.clone())
        .director(PublishSubscribeDirector::new())
        .input("x", "/x")
        .output("y", "/y")
        .node(
            ActorNode::named("DoubleIt", Actor::from_fn("Double", |io| {
                let x = io.input_i64("x")?;
                io.set_output("y", x * 2);
                Ok(())
            }))
            .with_inflow("x", "/x")
            .unwrap()
            .with_outflow("y", "/y")
            .unwrap(),
        )
}

fn outer_workflow(context: &WorkflowContext, inner: Workflow) -> Workflow {
    Workflow::builder("Outer")
        .context(context.clone())
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("CreateValues", relay())
                .with_sequence("value", vec![1.into(), 2.into(), 3.into()])
                .with_outflow("value", "/values")
                .unwrap(),
        )
        .node(
            ActorNode::named("Nested", inner.into_actor())
                .with_inflow("x", "/values")
                .unwrap()
                .with_outflow("y", "/results")
                .unwrap(),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_standalone_workflow_with_portals() {
    init_tracing();
    let context = WorkflowContext::new();
    let mut workflow = inner_doubler(&context).build().unwrap();
    workflow.set_input("x", 21);
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(workflow.output("y"), Some(&Value::Integer(42)));
    assert_eq!(workflow.store().peek("/x"), Some(Value::Integer(21)));
    assert_eq!(workflow.store().peek("/y/1"), Some(Value::Integer(42)));
    assert_eq!(workflow.state(), WorkflowState::Stepped);
}

#[tokio::test]
async fn test_nested_workflow_steps_per_input() {
    init_tracing();
    let context = WorkflowContext::new();
    let inner = inner_doubler(&context).uri_prefix("/sub{STEP}").build().unwrap();
    let mut outer = outer_workflow(&context, inner);
    outer.prepare().await.unwrap();
    outer.run().await.unwrap();

    let store = outer.store();
    assert_eq!(store.peek("/results/1"), Some(Value::Integer(2)));
    assert_eq!(store.peek("/results/2"), Some(Value::Integer(4)));
    assert_eq!(store.peek("/results/3"), Some(Value::Integer(6)));
    assert_eq!(store.peek("/sub2/x"), Some(Value::Integer(2)));
    assert_eq!(store.peek("/sub3/y/1"), Some(Value::Integer(6)));
    assert!(outer.last_wrapup().is_empty());
}

#[tokio::test]
async fn test_nested_workflow_needs_prefix_variable() {
    init_tracing();
    let context = WorkflowContext::new();
    let inner = inner_doubler(&context).build().unwrap();
    let mut outer = outer_workflow(&context, inner);
    outer.prepare().await.unwrap();
    let error = outer.run().await.unwrap_err();
    assert!(error.to_string().contains(
        "Nested workflows 'Doubler' requires a URI prefix with at least one variable unless they step only once."
    ));
}

#[tokio::test]
async fn test_nested_workflow_stepping_once_needs_no_prefix() {
    init_tracing();
    let context = WorkflowContext::new();
    let inner = inner_doubler(&context).steps_once(true).build().unwrap();
    let mut outer = Workflow::builder("OuterOnce")
        .context(context.clone())
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("Nested", inner.into_actor())
                .with_constant("x", 5)
                .with_outflow("y", "/result")
                .unwrap()
                .with_steps_once(true),
        )
        .build()
        .unwrap();
    outer.prepare().await.unwrap();
    outer.run().await.unwrap();
    assert_eq!(outer.store().peek("/result"), Some(Value::Integer(10)));
}
