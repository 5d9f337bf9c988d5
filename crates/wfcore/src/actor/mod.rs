//! Actor lifecycle, signatures and the body capability interface

mod body;
mod instance;
mod signature;
mod state;
mod status;

pub use body::{ActorBody, ActorHooks, FnActor, StepIo};
pub use instance::{Actor, ActorDefinition, BodyFactory};
pub use signature::{ActorSignature, PortSignature};
pub use state::ActorState;
pub use status::ActorStatus;
