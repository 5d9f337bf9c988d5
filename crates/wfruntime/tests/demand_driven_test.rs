// crates/wfruntime/tests/demand_driven_test.rs

use wfcore::{Actor, Value};
use wfruntime::{ActorNode, DemandDrivenDirector, Director, DirectorKind, Workflow};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn doubling_workflow(director: DemandDrivenDirector) -> Workflow {
    Workflow::builder("DemandDoubles")
        .director(director)
        .node(
            ActorNode::named("CreateValues", Actor::from_fn("Relay", |io| {
                let value = io.input("value")?.clone();
                io.set_output("value", value);
                Ok(())
            }))
            .with_sequence("value", vec![1.into(), 2.into(), 3.into()])
            .with_outflow("value", "/values")
            .unwrap(),
        )
        .node(
            ActorNode::named("DoubleValues", Actor::from_fn("Doubler", |io| {
                let x = io.input_i64("x")?;
                io.set_output("y", x * 2);
                Ok(())
            }))
            .with_inflow("x", "/values")
            .unwrap()
            .with_outflow("y", "/doubled")
            .unwrap(),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_each_round_pulls_one_value_through() {
    init_tracing();
    let director = DemandDrivenDirector::new().with_firing_count(3);
    assert_eq!(director.kind(), DirectorKind::DemandDriven);
    let mut workflow = doubling_workflow(director);
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    let store = workflow.store();
    assert_eq!(store.peek("/doubled/1"), Some(Value::Integer(2)));
    assert_eq!(store.peek("/doubled/2"), Some(Value::Integer(4)));
    assert_eq!(store.peek("/doubled/3"), Some(Value::Integer(6)));
    assert!(workflow.last_wrapup().is_empty());
}

#[tokio::test]
async fn test_firing_count_limits_rounds() {
    init_tracing();
    let mut workflow = doubling_workflow(DemandDrivenDirector::new().with_firing_count(2));
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    let store = workflow.store();
    assert_eq!(
        store.keys(),
        vec!["/doubled/1", "/doubled/2", "/values/1", "/values/2"]
    );
}

#[tokio::test]
async fn test_default_is_a_single_round() {
    init_tracing();
    let director = DemandDrivenDirector::default();
    assert_eq!(director.firing_count(), 1);
    let mut workflow = doubling_workflow(director);
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();
    assert_eq!(workflow.store().keys(), vec!["/doubled/1", "/values/1"]);
}
