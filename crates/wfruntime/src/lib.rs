//! Workflow execution runtime
//!
//! This crate provides the workflow nodes, the graph they form, the
//! directors that schedule them, and the `Workflow` that ties a graph to a
//! director. Workflows can be assembled in code with [`WorkflowBuilder`]
//! or loaded from a JSON [`WorkflowDefinition`] through an
//! [`ActorRegistry`].

pub mod definition;
pub mod directors;
pub mod graph;
pub mod nodes;
mod registry;
mod runtime;
mod sequences;
mod workflow;

pub use definition::{NodeDefinition, WorkflowDefinition};
pub use directors::{
    BufferPlacement, DataDrivenDirector, DemandDrivenDirector, Director, DirectorKind,
    MtDataDrivenDirector, PublishSubscribeDirector,
};
pub use graph::{Edge, WorkflowGraph};
pub use nodes::{
    ActorNode, ActorNodeConfig, BufferNode, InPortal, MergeNode, MergePolicy, NodeKind, OutPortal,
    WorkflowNode,
};
pub use registry::{ActorFactory, ActorMetadata, ActorRegistry};
pub use runtime::{RuntimeConfig, WorkflowRuntime};
pub use sequences::Sequences;
pub use workflow::{Workflow, WorkflowBuilder, WorkflowState};

pub use wfcore::Result;
