// crates/wfruntime/tests/graph_test.rs

use wfcore::Actor;
use wfruntime::{
    ActorNode, BufferNode, BufferPlacement, DataDrivenDirector, NodeKind, PublishSubscribeDirector,
    Workflow, WorkflowNode,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn relay(name: &str) -> Actor {
    Actor::from_fn(name, |io| {
        let value = io.input("value")?.clone();
        io.set_output("value", value);
        Ok(())
    })
}

fn source(name: &str, uri: &str) -> ActorNode {
    ActorNode::named(name, relay("Relay"))
        .with_sequence("value", vec![1.into(), 2.into()])
        .with_outflow("value", uri)
        .unwrap()
}

fn pipe(name: &str, from: &str, to: &str) -> ActorNode {
    ActorNode::named(name, relay("Relay"))
        .with_inflow("value", from)
        .unwrap()
        .with_outflow("value", to)
        .unwrap()
}

#[test]
fn test_analyze_binds_inflows_to_outflows() {
    init_tracing();
    let mut workflow = Workflow::builder("Pipeline")
        .director(PublishSubscribeDirector::new())
        .node(source("Source", "/a"))
        .node(pipe("First", "/a", "/b"))
        .node(pipe("Second", "/b", "/c"))
        .build()
        .unwrap();
    workflow.elaborate().unwrap();

    let graph = workflow.graph();
    assert_eq!(graph.edges().len(), 2);
    assert_eq!(graph.sinks(), vec![2]);
    assert_eq!(graph.upstream(2), vec![1]);
    assert_eq!(graph.subscribers(0, "value"), vec![(1, "value".to_string())]);
    assert!(graph.to_dot().contains("digraph"));

    let first = graph.node(1);
    assert!(first.core().outflow("value").unwrap().has_receivers());
    assert!(!graph.node(2).core().outflow("value").unwrap().has_receivers());
}

#[test]
fn test_unbound_inflow_is_rejected() {
    init_tracing();
    let mut workflow = Workflow::builder("Dangling")
        .director(PublishSubscribeDirector::new())
        .node(pipe("Orphan", "/nowhere", "/out"))
        .build()
        .unwrap();
    let error = workflow.elaborate().unwrap_err();
    assert_eq!(
        error.to_string(),
        "No outflow matching inflow expression for node Orphan: /nowhere"
    );
}

#[test]
fn test_duplicate_node_names_are_rejected() {
    init_tracing();
    let mut workflow = Workflow::builder("Twins")
        .director(PublishSubscribeDirector::new())
        .node(source("Same", "/a"))
        .node(source("Same", "/b"))
        .build()
        .unwrap();
    assert!(workflow.elaborate().unwrap_err().to_string().contains("duplicate node name 'Same'"));
}

#[test]
fn test_anonymous_nodes_are_named() {
    init_tracing();
    let mut workflow = Workflow::builder("Anonymous")
        .director(PublishSubscribeDirector::new())
        .node(
            ActorNode::new(relay("Relay"))
                .with_sequence("value", vec![1.into()])
                .with_outflow("value", "/a")
                .unwrap(),
        )
        .build()
        .unwrap();
    workflow.elaborate().unwrap();
    assert_eq!(workflow.graph().node(0).name(), "anonymous_node_1");
}

#[test]
fn test_data_driven_inserts_buffers() {
    init_tracing();
    let mut workflow = Workflow::builder("Buffered")
        .director(DataDrivenDirector::new())
        .node(source("Source", "/a"))
        .node(pipe("Consumer", "/a", "/b"))
        .build()
        .unwrap();
    workflow.elaborate().unwrap();

    let graph = workflow.graph();
    assert_eq!(graph.len(), 3);
    let buffer = workflow
        .node::<BufferNode>("BufferNode-for-Consumer-value")
        .expect("buffer inserted");
    assert!(buffer.core().is_hidden());
    assert_eq!(buffer.core().inflow_labels(), vec!["input"]);
    assert_eq!(buffer.core().outflow_labels(), vec!["output"]);
    let consumer = graph.index_of("Consumer").unwrap();
    let feeders: Vec<&str> = graph
        .upstream(consumer)
        .into_iter()
        .map(|i| graph.node(i).name())
        .collect();
    assert_eq!(feeders, vec!["BufferNode-for-Consumer-value"]);
}

#[test]
fn test_buffers_only_for_multiply_fed_inflows() {
    init_tracing();
    let mut workflow = Workflow::builder("SelectiveBuffers")
        .director(DataDrivenDirector::new().with_buffer_placement(BufferPlacement::MultiplyFed))
        .node(source("Left", "/shared"))
        .node(source("Right", "/shared"))
        .node(pipe("Joined", "/shared", "/joined"))
        .node(pipe("Single", "/joined", "/single"))
        .build()
        .unwrap();
    workflow.elaborate().unwrap();

    let buffers = workflow
        .graph()
        .nodes()
        .iter()
        .filter(|n| n.kind() == NodeKind::Buffer)
        .count();
    assert_eq!(buffers, 1);
    assert!(workflow.node::<BufferNode>("BufferNode-for-Joined-value").is_some());
}
