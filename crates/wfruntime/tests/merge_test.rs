// crates/wfruntime/tests/merge_test.rs

use wfcore::{Actor, Value};
use wfruntime::{
    ActorNode, DirectorKind, MergeNode, MergePolicy, MtDataDrivenDirector, PublishSubscribeDirector,
    Workflow, WorkflowBuilder,
};

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

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Integer(*v)).collect()
}

fn source(name: &str, values: &[i64], uri: &str) -> ActorNode {
    ActorNode::named(name, relay())
        .with_sequence("value", ints(values))
        .with_outflow("value", uri)
        .unwrap()
}

fn merge_workflow(name: &str, policy: MergePolicy) -> WorkflowBuilder {
    Workflow::builder(name)
        .node(source("CreateEvens", &[2, 4, 6, 8], "/evens"))
        .node(source("CreateOdds", &[1, 3, 5], "/odds"))
        .node(source("CreateOthers", &[13, 75, 60, 15, 20], "/others"))
        .node(
            MergeNode::new("MergeSequences")
                .with_policy(policy)
                .with_inflow("a", "/evens")
                .unwrap()
                .with_inflow("b", "/odds")
                .unwrap()
                .with_inflow("c", "/others")
                .unwrap()
                .with_outflow("merged", "/merged")
                .unwrap(),
        )
}

fn merged_values(workflow: &Workflow) -> Vec<i64> {
    (1..=workflow.store().len())
        .filter_map(|i| workflow.store().peek(&format!("/merged/{}", i)))
        .filter_map(|v| v.as_i64())
        .collect()
}

#[tokio::test]
async fn test_merge_interleaves_by_readiness() {
    init_tracing();
    let mut workflow = merge_workflow("MergeThreeSequences", MergePolicy::ArrivalOrder)
        .director(PublishSubscribeDirector::new())
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(
        merged_values(&workflow),
        vec![2, 1, 13, 4, 3, 75, 6, 5, 60, 8, 15, 20]
    );
    assert!(workflow.store().contains("/evens/4"));
    assert!(workflow.store().contains("/odds/3"));
    assert!(workflow.store().contains("/others/5"));
    assert!(!workflow.store().contains("/merged/13"));
    assert!(workflow.last_wrapup().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_merge_keeps_every_value_concurrently() {
    init_tracing();
    let mut workflow = merge_workflow("MergeConcurrently", MergePolicy::RoundRobin)
        .director(MtDataDrivenDirector::new())
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    let merged = merged_values(&workflow);
    let evens: Vec<i64> = merged.iter().copied().filter(|v| [2, 4, 6, 8].contains(v)).collect();
    assert_eq!(evens, vec![2, 4, 6, 8]);

    let mut sorted = merged;
    sorted.sort();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6, 8, 13, 15, 20, 60, 75]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_merge_under_every_director() {
    init_tracing();
    for kind in [DirectorKind::PublishSubscribe, DirectorKind::DataDriven, DirectorKind::MtDataDriven] {
        let mut workflow = merge_workflow("MergeAnyDirector", MergePolicy::ArrivalOrder)
            .boxed_director(kind.create())
            .build()
            .unwrap();
        workflow.prepare().await.unwrap();
        workflow.run().await.unwrap();
        assert_eq!(merged_values(&workflow).len(), 12, "director {}", kind);
    }
}
