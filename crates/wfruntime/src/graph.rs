use crate::nodes::WorkflowNode;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use wfcore::{Result, WorkflowError};

/// One outflow-to-inflow binding between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub outflow: String,
    pub to: usize,
    pub inflow: String,
}

/// The nodes of a workflow and the bindings between them.
///
/// Node indices are stable for the life of the graph; edges are derived
/// by [`WorkflowGraph::analyze`] from inflow and outflow URI templates.
pub struct WorkflowGraph {
    nodes: Vec<Box<dyn WorkflowNode>>,
    edges: Vec<Edge>,
    graph: DiGraph<String, String>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            graph: DiGraph::new(),
        }
    }

    pub fn add_node(&mut self, node: Box<dyn WorkflowNode>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Box<dyn WorkflowNode>] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Box<dyn WorkflowNode>] {
        &mut self.nodes
    }

    pub fn node(&self, index: usize) -> &dyn WorkflowNode {
        self.nodes[index].as_ref()
    }

    pub fn node_mut(&mut self, index: usize) -> &mut Box<dyn WorkflowNode> {
        &mut self.nodes[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name() == name)
    }

    /// Typed access to the node called `name`
    pub fn find<T: 'static>(&self, name: &str) -> Option<&T> {
        self.index_of(name)
            .and_then(|i| self.nodes[i].as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        let index = self.index_of(name)?;
        self.nodes[index].as_any_mut().downcast_mut::<T>()
    }

    /// Move the nodes out, e.g. to share them across tasks; edges are kept
    pub(crate) fn take_nodes(&mut self) -> Vec<Box<dyn WorkflowNode>> {
        std::mem::take(&mut self.nodes)
    }

    pub(crate) fn restore_nodes(&mut self, nodes: Vec<Box<dyn WorkflowNode>>) {
        self.nodes = nodes;
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Bind every inflow to the outflows publishing on the same path
    pub fn analyze(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name().to_string()) {
                return Err(WorkflowError::Invalid(format!("duplicate node name '{}'", node.name())).into());
            }
        }

        let mut publishers: HashMap<String, Vec<(usize, String)>> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            for outflow in node.core().outflows() {
                publishers
                    .entry(outflow.binding())
                    .or_default()
                    .push((index, outflow.label().to_string()));
            }
        }

        let mut edges = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            for inflow in node.core().inflows() {
                let sources = publishers.get(inflow.binding()).ok_or_else(|| {
                    WorkflowError::UnboundInflow {
                        node: node.name().to_string(),
                        expression: inflow.template().expression().to_string(),
                    }
                })?;
                for (from, outflow) in sources {
                    edges.push(Edge {
                        from: *from,
                        outflow: outflow.clone(),
                        to: index,
                        inflow: inflow.label().to_string(),
                    });
                }
            }
        }

        for (index, node) in self.nodes.iter_mut().enumerate() {
            for label in node.core().outflow_labels() {
                let listened = edges.iter().any(|e| e.from == index && e.outflow == label);
                node.core_mut().set_outflow_receivers(&label, listened)?;
            }
        }

        let mut graph = DiGraph::new();
        for node in &self.nodes {
            graph.add_node(node.name().to_string());
        }
        for edge in &edges {
            graph.add_edge(
                NodeIndex::new(edge.from),
                NodeIndex::new(edge.to),
                format!("{} -> {}", edge.outflow, edge.inflow),
            );
        }
        tracing::debug!(nodes = self.nodes.len(), edges = edges.len(), "workflow graph analyzed");
        self.graph = graph;
        self.edges = edges;
        Ok(())
    }

    /// Nodes and inflows fed by outflow `label` of node `from`, ordered by
    /// node name
    pub fn subscribers(&self, from: usize, label: &str) -> Vec<(usize, String)> {
        let mut subscribers: Vec<(usize, String)> = self
            .edges
            .iter()
            .filter(|e| e.from == from && e.outflow == label)
            .map(|e| (e.to, e.inflow.clone()))
            .collect();
        subscribers.sort_by(|a, b| {
            self.nodes[a.0]
                .name()
                .cmp(self.nodes[b.0].name())
                .then_with(|| a.1.cmp(&b.1))
        });
        subscribers
    }

    /// Edges feeding inflow `label` of node `to`
    pub fn sources(&self, to: usize, label: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.to == to && e.inflow == label)
            .collect()
    }

    /// Nodes with an outflow bound to one of `index`'s inflows
    pub fn upstream(&self, index: usize) -> Vec<usize> {
        let mut upstream: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(index), Direction::Incoming)
            .map(NodeIndex::index)
            .collect();
        upstream.sort_unstable();
        upstream.dedup();
        upstream
    }

    /// Nodes that feed no other node
    pub fn sinks(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .filter(|&i| self.graph.neighbors_directed(i, Direction::Outgoing).next().is_none())
            .map(NodeIndex::index)
            .collect()
    }

    /// Graphviz rendering of the analyzed graph
    pub fn to_dot(&self) -> String {
        format!("{:?}", Dot::new(&self.graph))
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}
