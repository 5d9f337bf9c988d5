// crates/wfruntime/tests/steps_once_test.rs

use std::sync::Arc;
use wfcore::{Actor, BufferSink, Value, WorkflowContext};
use wfruntime::{ActorNode, DirectorKind, Workflow};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn copy(input: &'static str, output: &'static str) -> Actor {
    Actor::from_fn("Copy", move |io| {
        let value = io.input(input)?.clone();
        io.set_output(output, value);
        Ok(())
    })
}

/// Producer publishes three values; the copier steps once and strands the rest
async fn run_second_node_steps_once(kind: DirectorKind) -> (Workflow, String) {
    let sink = BufferSink::new();
    let context = WorkflowContext::new().with_diagnostics(Arc::new(sink.clone()));
    let printer = Actor::from_fn("Print", |io| {
        tracing::info!("{}", io.input("value")?);
        Ok(())
    });
    let mut workflow = Workflow::builder("SecondNodeStepsOnce")
        .context(context)
        .boxed_director(kind.create())
        .node(
            ActorNode::named("valueProducer", copy("constant", "value"))
                .with_sequence("constant", vec![2.into(), 4.into(), 6.into()])
                .with_outflow("value", "/value")
                .unwrap(),
        )
        .node(
            ActorNode::named("valueCopier", copy("original", "copy"))
                .with_inflow("original", "/value")
                .unwrap()
                .with_outflow("copy", "/copy")
                .unwrap()
                .with_steps_once(true),
        )
        .node(
            ActorNode::named("valuePrinter", printer)
                .with_inflow("value", "/copy")
                .unwrap(),
        )
        .build()
        .unwrap();
    workflow.prepare().await.unwrap();
    workflow.run().await.unwrap();
    (workflow, sink.contents())
}

fn check_store(workflow: &Workflow) {
    let store = workflow.store();
    assert_eq!(store.keys(), vec!["/copy", "/value/1", "/value/2", "/value/3"]);
    assert_eq!(store.peek("/value/2"), Some(Value::Integer(4)));
    assert_eq!(store.peek("/copy"), Some(Value::Integer(2)));
}

#[tokio::test]
async fn test_second_node_steps_once_publish_subscribe() {
    init_tracing();
    let (workflow, warning) = run_second_node_steps_once(DirectorKind::PublishSubscribe).await;
    check_store(&workflow);
    assert_eq!(
        warning,
        "Warning:  Run 1 of workflow <SecondNodeStepsOnce> wrapped up with unused data packets:\n\
1 packet in inflow 'original' on node [valueCopier] with URI '/value/2'\n\
1 packet in queue 'original' on node [valueCopier] with URI '/value/3'\n"
    );
}

#[tokio::test]
async fn test_second_node_steps_once_data_driven() {
    init_tracing();
    let (workflow, warning) = run_second_node_steps_once(DirectorKind::DataDriven).await;
    check_store(&workflow);
    assert_eq!(
        warning,
        "Warning:  Run 1 of workflow <SecondNodeStepsOnce> wrapped up with unused data packets:\n\
1 packet in outflow 'output' on node [BufferNode-for-valueCopier-original] with URI '/value/3'\n\
1 packet in inflow 'original' on node [valueCopier] with URI '/value/2'\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_node_steps_once_mt_data_driven() {
    init_tracing();
    let (workflow, warning) = run_second_node_steps_once(DirectorKind::MtDataDriven).await;
    check_store(&workflow);
    assert_eq!(
        warning,
        "Warning:  Run 1 of workflow <SecondNodeStepsOnce> wrapped up with unused data packets:\n\
2 packets in queue 'original' on node [valueCopier] with URIs '/value/2', '/value/3'\n"
    );
}
