//! Completion services: bounded pools that step actors and hand back
//! finished runners

mod asynchronous;
mod runner;
mod synchronous;

pub use asynchronous::{
    AsyncCompletionService, CompletionOrder, DeliveryOrder, OrderedActorCompletionService,
    SubmissionOrder, UnorderedActorCompletionService,
};
pub use runner::{ActorRunner, RunnerHandle, Variables};
pub use synchronous::SynchronousActorCompletionService;

use crate::actor::Actor;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    Stopped,
    Idle,
    Active,
    /// Synchronous service holding a result that has not been taken
    Blocked,
    ShuttingDown,
    ShutDown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "STOPPED",
            ServiceState::Idle => "IDLE",
            ServiceState::Active => "ACTIVE",
            ServiceState::Blocked => "BLOCKED",
            ServiceState::ShuttingDown => "SHUTTING_DOWN",
            ServiceState::ShutDown => "SHUT_DOWN",
        };
        f.write_str(name)
    }
}

/// Result of [`ActorCompletionService::take`]
#[derive(Debug)]
pub enum Completion {
    Runner(ActorRunner),
    /// Sentinel returned once after the last runner of a shut-down service
    EndOfActorRunners,
}

impl Completion {
    pub fn is_end_of_runners(&self) -> bool {
        matches!(self, Completion::EndOfActorRunners)
    }

    pub fn into_runner(self) -> Option<ActorRunner> {
        match self {
            Completion::Runner(runner) => Some(runner),
            Completion::EndOfActorRunners => None,
        }
    }
}

/// A pool that steps submitted actors and returns their runners.
///
/// `start` moves a stopped service to idle. `submit` steps the actor (or a
/// clone of it) with the given variables, blocking while the service is at
/// capacity. `take` waits for a finished runner. After `shutdown`, `take`
/// drains what remains, then yields [`Completion::EndOfActorRunners`] once
/// and the service is stopped again.
#[async_trait]
pub trait ActorCompletionService: Send + Sync {
    fn kind(&self) -> &'static str;

    fn capacity(&self) -> usize;

    fn state(&self) -> ServiceState;

    /// Runners submitted but not yet taken
    fn in_flight(&self) -> usize;

    fn start(&self) -> Result<()>;

    async fn submit(&self, actor: &mut Actor, variables: Variables) -> Result<()>;

    async fn take(&self) -> Result<Completion>;

    fn shutdown(&self);
}
