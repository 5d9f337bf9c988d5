//! Core abstractions for the workflow engine
//!
//! This crate provides the dataflow model (values, URI templates, packets,
//! protocols and the packet store), the actor lifecycle with cloning, and
//! the completion services that step actors synchronously or concurrently.

pub mod actor;
mod context;
pub mod data;
mod error;
pub mod events;
pub mod service;
mod value;
mod wrapup;

pub use actor::{Actor, ActorBody, ActorHooks, ActorSignature, ActorState, FnActor, PortSignature, StepIo};
pub use context::WorkflowContext;
pub use data::{
    ControlProtocol, DataProtocol, Packet, PacketStore, Protocol, ProtocolRegistry, PublishedResource, Uri,
    UriTemplate,
};
pub use error::{ActorError, FlowError, StepError, WorkflowError};
pub use events::{EventBus, EventTraceRecorder, NoopTraceRecorder, RunEvent, RunId, TraceRecorder};
pub use service::{
    ActorCompletionService, ActorRunner, Completion, OrderedActorCompletionService, ServiceState,
    SynchronousActorCompletionService, UnorderedActorCompletionService, Variables,
};
pub use value::Value;
pub use wrapup::{BufferSink, DiagnosticSink, StderrSink, UnusedDataKind, UnusedDataRecord, WrapupResult};

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, FlowError>;
