use super::{ActorCompletionService, ActorRunner, Completion, ServiceState, Variables};
use crate::actor::Actor;
use crate::{FlowError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify, Semaphore};

/// Policy deciding which buffered runner `take` hands out next
pub trait DeliveryOrder: Send + Sync + 'static {
    const KIND: &'static str;

    /// Pick the next deliverable runner from `finished`, keyed by
    /// submission sequence; `next` is the sequence of the oldest runner not
    /// yet delivered
    fn next_ready(finished: &mut BTreeMap<u64, ActorRunner>, next: u64) -> Option<ActorRunner>;
}

/// Runners are delivered in the order they were submitted
#[derive(Debug)]
pub struct SubmissionOrder;

impl DeliveryOrder for SubmissionOrder {
    const KIND: &'static str = "ordered";

    fn next_ready(finished: &mut BTreeMap<u64, ActorRunner>, next: u64) -> Option<ActorRunner> {
        finished.remove(&next)
    }
}

/// Runners are delivered as soon as they finish
#[derive(Debug)]
pub struct CompletionOrder;

impl DeliveryOrder for CompletionOrder {
    const KIND: &'static str = "unordered";

    fn next_ready(finished: &mut BTreeMap<u64, ActorRunner>, _next: u64) -> Option<ActorRunner> {
        finished.pop_first().map(|(_, runner)| runner)
    }
}

pub type OrderedActorCompletionService = AsyncCompletionService<SubmissionOrder>;
pub type UnorderedActorCompletionService = AsyncCompletionService<CompletionOrder>;

#[derive(Debug)]
struct Inner {
    state: ServiceState,
    in_flight: usize,
    submitted: u64,
}

struct Finished {
    receiver: mpsc::UnboundedReceiver<ActorRunner>,
    buffer: BTreeMap<u64, ActorRunner>,
    delivered: u64,
}

/// Steps clones of submitted actors concurrently, up to `capacity` at once.
///
/// Each submit clones the actor, so concurrent steps never share a body.
/// A submit at capacity waits for a take to free a slot. Finished runners
/// travel over a channel and are buffered until the delivery order allows
/// them out.
pub struct AsyncCompletionService<D: DeliveryOrder> {
    capacity: usize,
    inner: Mutex<Inner>,
    slots: Arc<Semaphore>,
    sender: mpsc::UnboundedSender<ActorRunner>,
    finished: tokio::sync::Mutex<Finished>,
    state_changed: Notify,
    _order: PhantomData<D>,
}

impl<D: DeliveryOrder> AsyncCompletionService<D> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            capacity,
            inner: Mutex::new(Inner {
                state: ServiceState::Stopped,
                in_flight: 0,
                submitted: 0,
            }),
            slots: Arc::new(Semaphore::new(capacity)),
            sender,
            finished: tokio::sync::Mutex::new(Finished {
                receiver,
                buffer: BTreeMap::new(),
                delivered: 0,
            }),
            state_changed: Notify::new(),
            _order: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_submittable(state: ServiceState) -> Result<()> {
        match state {
            ServiceState::Stopped => Err(FlowError::illegal_state(
                "Actor cannot be submitted because the service is stopped",
            )),
            ServiceState::ShuttingDown => Err(FlowError::illegal_state(
                "Actor cannot be submitted because the service is being shut down",
            )),
            ServiceState::ShutDown => Err(FlowError::illegal_state(
                "Actor cannot be submitted because the service is shut down",
            )),
            _ => Ok(()),
        }
    }

    /// Account for a delivered runner and free its slot
    fn release(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            if inner.in_flight == 0 {
                inner.state = match inner.state {
                    ServiceState::Active => ServiceState::Idle,
                    ServiceState::ShuttingDown => ServiceState::ShutDown,
                    other => other,
                };
            }
        }
        self.slots.add_permits(1);
    }
}

#[async_trait]
impl<D: DeliveryOrder> ActorCompletionService for AsyncCompletionService<D> {
    fn kind(&self) -> &'static str {
        D::KIND
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn state(&self) -> ServiceState {
        self.lock().state
    }

    fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            ServiceState::Stopped => {
                inner.state = ServiceState::Idle;
                Ok(())
            }
            ServiceState::ShuttingDown => Err(FlowError::illegal_state(
                "Service cannot be started because it is shutting down",
            )),
            ServiceState::ShutDown => Err(FlowError::illegal_state(
                "Service cannot be started because it is shut down",
            )),
            _ => Err(FlowError::illegal_state(
                "Service cannot be started because it is already active",
            )),
        }
    }

    async fn submit(&self, actor: &mut Actor, variables: Variables) -> Result<()> {
        Self::check_submittable(self.state())?;

        let mut clone = actor.clone_actor()?;
        clone.activate_clone().await?;

        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FlowError::illegal_state("Completion service slots were closed"))?;

        let sequence = {
            let mut inner = self.lock();
            Self::check_submittable(inner.state)?;
            inner.state = ServiceState::Active;
            inner.in_flight += 1;
            let sequence = inner.submitted;
            inner.submitted += 1;
            sequence
        };
        permit.forget();

        tracing::trace!(actor = %actor.name(), sequence, service = D::KIND, "submitted");
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let runner = ActorRunner::execute(clone, variables, sequence).await;
            // the receiver lives as long as the service
            let _ = sender.send(runner);
        });
        Ok(())
    }

    async fn take(&self) -> Result<Completion> {
        let mut finished = self.finished.lock().await;
        loop {
            {
                let mut inner = self.lock();
                match inner.state {
                    ServiceState::Stopped => {
                        return Err(FlowError::illegal_state(
                            "Cannot take a runner because service is stopped",
                        ))
                    }
                    ServiceState::ShutDown => {
                        inner.state = ServiceState::Stopped;
                        return Ok(Completion::EndOfActorRunners);
                    }
                    _ => {}
                }
            }

            let next = finished.delivered;
            if let Some(runner) = D::next_ready(&mut finished.buffer, next) {
                finished.delivered += 1;
                self.release();
                return Ok(Completion::Runner(runner));
            }

            let received = tokio::select! {
                received = finished.receiver.recv() => Some(received),
                _ = self.state_changed.notified() => None,
            };
            match received {
                Some(Some(runner)) => {
                    finished.buffer.insert(runner.sequence(), runner);
                }
                Some(None) => {
                    return Err(FlowError::Execution(
                        "Completion channel closed unexpectedly".to_string(),
                    ))
                }
                None => {}
            }
        }
    }

    fn shutdown(&self) {
        {
            let mut inner = self.lock();
            inner.state = match inner.state {
                ServiceState::Idle => ServiceState::ShutDown,
                ServiceState::Active => ServiceState::ShuttingDown,
                other => other,
            };
        }
        self.state_changed.notify_one();
    }
}
