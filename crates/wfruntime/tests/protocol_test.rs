// crates/wfruntime/tests/protocol_test.rs

use std::sync::Arc;
use wfcore::{Actor, DataProtocol, PortSignature, ProtocolRegistry, Value, WorkflowContext};
use wfruntime::{ActorNode, PublishSubscribeDirector, Workflow};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn greeter() -> Actor {
    Actor::from_fn("Greeter", |io| {
        let name = io.input_str("name")?.to_string();
        io.set_output("g", format!("Hello {}", name));
        Ok(())
    })
}

fn nosuffix_context() -> WorkflowContext {
    let mut protocols = ProtocolRegistry::default();
    protocols.register("nosuffix", Arc::new(DataProtocol::without_suffixes()));
    WorkflowContext::new().with_protocols(protocols)
}

fn greeting_workflow(steps_once: bool) -> Workflow {
    Workflow::builder("Greetings")
        .context(nosuffix_context())
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("Greet", greeter())
                .with_sequence("name", vec!["Ann".into(), "Bo".into(), "Cy".into()])
                .with_outflow("g", "nosuffix:/greeting")
                .unwrap()
                .with_steps_once(steps_once),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_repeated_outflow_without_suffixes_needs_variable() {
    init_tracing();
    let mut workflow = greeting_workflow(false);
    workflow.elaborate().unwrap();
    let error = workflow.configure().unwrap_err();
    assert_eq!(
        error.to_string(),
        "URI template for outflow g must include at least one variable."
    );
}

#[tokio::test]
async fn test_stepping_once_publishes_bare_uri() {
    init_tracing();
    let mut workflow = greeting_workflow(true);
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(workflow.store().keys(), vec!["/greeting"]);
    assert_eq!(
        workflow.store().peek("/greeting"),
        Some(Value::String("Hello Ann".to_string()))
    );
}

#[tokio::test]
async fn test_template_variable_allows_repeated_firing() {
    init_tracing();
    let mut workflow = Workflow::builder("GreetingsByStep")
        .context(nosuffix_context())
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("Greet", greeter())
                .with_sequence("name", vec!["Ann".into(), "Bo".into()])
                .with_outflow("g", "nosuffix:/greeting/{STEP}")
                .unwrap(),
        )
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(workflow.store().keys(), vec!["/greeting/1", "/greeting/2"]);
    assert_eq!(
        workflow.store().peek("/greeting/2"),
        Some(Value::String("Hello Bo".to_string()))
    );
}

#[tokio::test]
async fn test_control_inflow_gates_without_binding() {
    init_tracing();
    let counter = Actor::from_fn("Counter", |io| {
        let step = io.step_count();
        io.set_output("count", step as i64);
        Ok(())
    })
    .with_output(PortSignature::new("count"));

    let mut workflow = Workflow::builder("ControlledCount")
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("Tick", Actor::from_fn("Ticker", |io| {
                let value = io.input("tick")?.clone();
                io.set_output("tick", value);
                Ok(())
            }))
            .with_sequence("tick", vec![true.into(), true.into()])
            .with_outflow("tick", "control:/ticks")
            .unwrap(),
        )
        .node(
            ActorNode::named("Count", counter)
                .with_inflow("go", "control:/ticks")
                .unwrap()
                .with_outflow("count", "/counts")
                .unwrap(),
        )
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(workflow.store().peek("/counts/1"), Some(Value::Integer(1)));
    assert_eq!(workflow.store().peek("/counts/2"), Some(Value::Integer(2)));
    assert!(!workflow.store().contains("/counts/3"));
}

#[tokio::test]
async fn test_control_inflow_named_like_input_is_rejected() {
    init_tracing();
    let actor = Actor::from_fn("Echo", |io| {
        let value = io.input("go")?.clone();
        io.set_output("out", value);
        Ok(())
    })
    .with_input(PortSignature::new("go"))
    .with_output(PortSignature::new("out"));

    let mut workflow = Workflow::builder("BadControl")
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::named("Source", Actor::from_fn("Ticker", |io| {
                let value = io.input("tick")?.clone();
                io.set_output("tick", value);
                Ok(())
            }))
            .with_sequence("tick", vec![true.into()])
            .with_outflow("tick", "control:/ticks")
            .unwrap(),
        )
        .node(
            ActorNode::named("Echo", actor)
                .with_inflow("go", "control:/ticks")
                .unwrap()
                .with_outflow("out", "/out")
                .unwrap(),
        )
        .build()
        .unwrap();
    workflow.elaborate().unwrap();
    let error = workflow.configure().unwrap_err();
    assert!(error.to_string().contains("control inflow 'go'"));
}
