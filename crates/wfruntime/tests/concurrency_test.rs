// crates/wfruntime/tests/concurrency_test.rs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wfcore::{Actor, ActorBody, PortSignature, StepError, StepIo, Value};
use wfruntime::{ActorNode, DirectorKind, MtDataDrivenDirector, Workflow};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Squares its input, taking longer for smaller inputs and tracking how
/// many steps overlap
struct SlowSquare {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl ActorBody for SlowSquare {
    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        let x = io.input_i64("x")?;
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis((10 - x as u64) * 10)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        io.set_output("y", x * x);
        Ok(())
    }

    fn duplicate(&self) -> Option<Box<dyn ActorBody>> {
        Some(Box::new(SlowSquare {
            running: self.running.clone(),
            peak: self.peak.clone(),
        }))
    }
}

fn square_workflow(
    name: &str,
    kind: DirectorKind,
    max_concurrency: usize,
    ordered: bool,
    peak: Arc<AtomicUsize>,
) -> Workflow {
    let square = Actor::new(
        "SlowSquare",
        SlowSquare {
            running: Arc::new(AtomicUsize::new(0)),
            peak,
        },
    )
    .with_input(PortSignature::new("x").with_type("Integer"))
    .with_output(PortSignature::new("y"));

    let relay = Actor::from_fn("Relay", |io| {
        let value = io.input("value")?.clone();
        io.set_output("value", value);
        Ok(())
    });

    Workflow::builder(name)
        .boxed_director(kind.create())
        .node(
            ActorNode::named("CreateValues", relay)
                .with_sequence("value", (1..=8i64).map(Value::from).collect())
                .with_outflow("value", "/values")
                .unwrap(),
        )
        .node(
            ActorNode::named("Square", square)
                .with_inflow("x", "/values")
                .unwrap()
                .with_outflow("y", "/squares")
                .unwrap()
                .with_max_concurrency(max_concurrency, ordered),
        )
        .build()
        .unwrap()
}

fn squares(workflow: &Workflow) -> Vec<i64> {
    (1..=8)
        .filter_map(|i| workflow.store().peek(&format!("/squares/{}", i)))
        .filter_map(|v| v.as_i64())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ordered_concurrent_node_keeps_submission_order() {
    init_tracing();
    let peak = Arc::new(AtomicUsize::new(0));
    let mut workflow = square_workflow(
        "OrderedSquares",
        DirectorKind::MtDataDriven,
        4,
        true,
        peak.clone(),
    );
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(squares(&workflow), vec![1, 4, 9, 16, 25, 36, 49, 64]);
    assert!(peak.load(Ordering::SeqCst) > 1);
    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert!(workflow.last_wrapup().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unordered_concurrent_node_keeps_every_result() {
    init_tracing();
    let peak = Arc::new(AtomicUsize::new(0));
    let mut workflow = square_workflow(
        "UnorderedSquares",
        DirectorKind::MtDataDriven,
        4,
        false,
        peak.clone(),
    );
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    let mut results = squares(&workflow);
    assert_eq!(results.len(), 8);
    results.sort();
    assert_eq!(results, vec![1, 4, 9, 16, 25, 36, 49, 64]);
    assert!(peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_node_under_single_threaded_director() {
    init_tracing();
    let peak = Arc::new(AtomicUsize::new(0));
    let mut workflow = square_workflow(
        "SequentialSquares",
        DirectorKind::PublishSubscribe,
        4,
        true,
        peak,
    );
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();

    assert_eq!(squares(&workflow), vec![1, 4, 9, 16, 25, 36, 49, 64]);
}

#[tokio::test]
async fn test_uncloneable_actor_rejected_in_concurrent_node() {
    init_tracing();
    let stateful = Actor::from_fn("Accumulator", |io| {
        let x = io.input_i64("x")?;
        io.set_output("y", x);
        Ok(())
    })
    .with_stateful(true);

    let mut workflow = Workflow::builder("StatefulConcurrency")
        .director(MtDataDrivenDirector::new())
        .node(
            ActorNode::named("Accumulate", stateful)
                .with_inflow("x", "/values")
                .unwrap()
                .with_outflow("y", "/sums")
                .unwrap()
                .with_max_concurrency(3, true),
        )
        .node(
            ActorNode::named("CreateValues", Actor::from_fn("Relay", |io| {
                let value = io.input("value")?.clone();
                io.set_output("value", value);
                Ok(())
            }))
            .with_sequence("value", vec![1.into()])
            .with_outflow("value", "/values")
            .unwrap(),
        )
        .build()
        .unwrap();
    workflow.elaborate().unwrap();
    let error = workflow.configure().unwrap_err();
    assert_eq!(
        error.to_string(),
        "Uncloneable actor Accumulator cannot be used within concurrent node Accumulate"
    );
}
