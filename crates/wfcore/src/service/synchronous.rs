use super::{ActorCompletionService, ActorRunner, Completion, ServiceState, Variables};
use crate::actor::Actor;
use crate::{FlowError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Inner {
    state: ServiceState,
    runner: Option<ActorRunner>,
}

/// Steps the submitted actor itself, inline, one step at a time.
///
/// A submit moves the service to BLOCKED until the result is taken. A
/// shutdown while blocked leaves the service SHUTTING_DOWN until the held
/// runner is taken, then SHUT_DOWN.
#[derive(Debug)]
pub struct SynchronousActorCompletionService {
    inner: Mutex<Inner>,
}

impl SynchronousActorCompletionService {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ServiceState::Stopped,
                runner: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SynchronousActorCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActorCompletionService for SynchronousActorCompletionService {
    fn kind(&self) -> &'static str {
        "synchronous"
    }

    fn capacity(&self) -> usize {
        1
    }

    fn state(&self) -> ServiceState {
        self.lock().state
    }

    fn in_flight(&self) -> usize {
        let inner = self.lock();
        usize::from(match inner.state {
            ServiceState::Blocked => true,
            ServiceState::ShuttingDown => inner.runner.is_some(),
            _ => false,
        })
    }

    fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != ServiceState::Stopped {
            return Err(FlowError::illegal_state(
                "Service cannot be started because it is already active",
            ));
        }
        inner.state = ServiceState::Idle;
        inner.runner = None;
        Ok(())
    }

    async fn submit(&self, actor: &mut Actor, variables: Variables) -> Result<()> {
        {
            let mut inner = self.lock();
            match inner.state {
                ServiceState::Stopped => {
                    return Err(FlowError::illegal_state(
                        "Actor cannot be submitted because the service is stopped",
                    ))
                }
                ServiceState::ShutDown | ServiceState::ShuttingDown => {
                    return Err(FlowError::illegal_state(
                        "Actor cannot be submitted because the service is shut down",
                    ))
                }
                ServiceState::Blocked => {
                    return Err(FlowError::illegal_state(
                        "Actor cannot be submitted without taking the prior one",
                    ))
                }
                ServiceState::Idle | ServiceState::Active => {}
            }
            inner.state = ServiceState::Blocked;
        }

        let runner = ActorRunner::run_in_place(actor, variables).await;
        self.lock().runner = Some(runner);
        Ok(())
    }

    async fn take(&self) -> Result<Completion> {
        let mut inner = self.lock();
        match inner.state {
            ServiceState::Stopped => Err(FlowError::illegal_state(
                "Cannot take a runner when the service is stopped",
            )),
            ServiceState::ShutDown => {
                inner.state = ServiceState::Stopped;
                Ok(Completion::EndOfActorRunners)
            }
            ServiceState::Blocked | ServiceState::ShuttingDown => match inner.runner.take() {
                Some(runner) => {
                    inner.state = if inner.state == ServiceState::ShuttingDown {
                        ServiceState::ShutDown
                    } else {
                        ServiceState::Idle
                    };
                    Ok(Completion::Runner(runner))
                }
                None => Err(FlowError::illegal_state(
                    "Cannot take a runner before submitting one",
                )),
            },
            _ => Err(FlowError::illegal_state(
                "Cannot take a runner before submitting one",
            )),
        }
    }

    fn shutdown(&self) {
        let mut inner = self.lock();
        match inner.state {
            ServiceState::Idle | ServiceState::Active => inner.state = ServiceState::ShutDown,
            ServiceState::Blocked => inner.state = ServiceState::ShuttingDown,
            _ => {}
        }
    }
}
