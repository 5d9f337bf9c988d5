use super::{queue_records, Director, DirectorKind, InflowQueues};
use crate::graph::WorkflowGraph;
use crate::nodes::WorkflowNode;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use wfcore::{FlowError, Packet, Result, WrapupResult};

/// A node shared between its producer and consumer tasks
struct NodeSlot {
    node: Mutex<Box<dyn WorkflowNode>>,
    queues: StdMutex<BTreeMap<String, VecDeque<Packet>>>,
    /// Set when new work may be available; cleared by the producer
    wake: AtomicBool,
    notify: Notify,
    permits: Arc<Semaphore>,
}

impl NodeSlot {
    fn new(node: Box<dyn WorkflowNode>) -> Self {
        let permits = Arc::new(Semaphore::new(node.max_concurrent_steps().max(1)));
        Self {
            node: Mutex::new(node),
            queues: StdMutex::new(BTreeMap::new()),
            wake: AtomicBool::new(false),
            notify: Notify::new(),
            permits,
        }
    }

    fn wake(&self) {
        self.wake.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn enqueue(&self, label: &str, packet: Packet) {
        let mut queues = self.queues.lock().unwrap_or_else(|p| p.into_inner());
        queues.entry(label.to_string()).or_default().push_back(packet);
    }

    fn dequeue(&self, label: &str) -> Option<Packet> {
        let mut queues = self.queues.lock().unwrap_or_else(|p| p.into_inner());
        queues.get_mut(label).and_then(VecDeque::pop_front)
    }
}

/// State shared by every task of one run
struct RunState {
    slots: Vec<NodeSlot>,
    subscribers: Vec<HashMap<String, Vec<(usize, String)>>>,
    halt: CancellationToken,
    error: StdMutex<Option<FlowError>>,
    live: AtomicUsize,
    waiting: AtomicUsize,
    in_flight: AtomicUsize,
}

impl RunState {
    fn fail(&self, error: FlowError) {
        tracing::error!(error = %error, "halting run");
        let mut slot = self.error.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(error);
        }
        self.halt.cancel();
    }

    /// Halt once every live producer is idle, no step is in flight and no
    /// producer has a pending wake
    fn check_quiescent(&self) {
        let live = self.live.load(Ordering::SeqCst);
        let idle = self.waiting.load(Ordering::SeqCst) >= live
            && self.in_flight.load(Ordering::SeqCst) == 0
            && !self.slots.iter().any(|s| s.wake.load(Ordering::SeqCst));
        if idle {
            tracing::debug!("graph quiescent");
            self.halt.cancel();
        }
    }
}

/// Multi-threaded data-driven scheduler.
///
/// Each node gets a producer task that feeds its inflow queues and starts
/// firings, and a consumer task that waits for those firings to complete
/// and forwards the results to subscriber queues. A node whose maximum
/// concurrency exceeds one keeps that many firings in flight through its
/// completion service.
#[derive(Debug, Default)]
pub struct MtDataDrivenDirector {
    nodes_step_once: bool,
    leftover: InflowQueues,
}

impl MtDataDrivenDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes_step_once(mut self, nodes_step_once: bool) -> Self {
        self.nodes_step_once = nodes_step_once;
        self
    }

    /// Move one queued packet into each ready inflow
    async fn process_input_queues(slot: &NodeSlot, node: &mut Box<dyn WorkflowNode>) -> Result<bool> {
        let mut delivered = false;
        for label in node.core().inflow_labels() {
            if !node.ready_for_input_packet(&label) {
                continue;
            }
            if let Some(packet) = slot.dequeue(&label) {
                node.set_input_packet(&label, packet).await?;
                delivered = true;
            }
        }
        Ok(delivered)
    }

    async fn produce(state: Arc<RunState>, index: usize) {
        let slot = &state.slots[index];
        let (sender, receiver) = mpsc::unbounded_channel::<OwnedSemaphorePermit>();
        let consumer = tokio::spawn(Self::consume(state.clone(), index, receiver));

        loop {
            let permit = tokio::select! {
                _ = state.halt.cancelled() => break,
                permit = slot.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let mut node = slot.node.lock().await;
            if node.core().has_finished() {
                break;
            }
            match node.start_trigger().await {
                Ok(true) => {
                    drop(node);
                    state.in_flight.fetch_add(1, Ordering::SeqCst);
                    if sender.send(permit).is_err() {
                        state.in_flight.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    state.fail(error);
                    break;
                }
            }
            let processed = match Self::process_input_queues(slot, &mut node).await {
                Ok(processed) => processed,
                Err(error) => {
                    state.fail(error);
                    break;
                }
            };
            drop(node);
            drop(permit);
            if processed {
                continue;
            }

            state.waiting.fetch_add(1, Ordering::SeqCst);
            if !slot.wake.load(Ordering::SeqCst) {
                state.check_quiescent();
                tokio::select! {
                    _ = state.halt.cancelled() => {
                        state.waiting.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                    _ = slot.notify.notified() => {}
                }
            }
            state.waiting.fetch_sub(1, Ordering::SeqCst);
            slot.wake.store(false, Ordering::SeqCst);
        }

        drop(sender);
        if let Err(error) = consumer.await {
            state.fail(FlowError::Execution(format!("consumer task failed: {}", error)));
        }
        state.live.fetch_sub(1, Ordering::SeqCst);
        state.check_quiescent();
    }

    async fn consume(
        state: Arc<RunState>,
        index: usize,
        mut receiver: mpsc::UnboundedReceiver<OwnedSemaphorePermit>,
    ) {
        let slot = &state.slots[index];
        while let Some(permit) = receiver.recv().await {
            match Self::complete_firing(slot).await {
                Ok(outputs) => {
                    for (label, packet) in outputs {
                        let Some(subscribers) = state.subscribers[index].get(&label) else {
                            continue;
                        };
                        for (to, inflow) in subscribers {
                            state.slots[*to].enqueue(inflow, packet.clone());
                            state.slots[*to].wake();
                        }
                    }
                }
                Err(error) => state.fail(error),
            }
            drop(permit);
            slot.wake();
            state.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Wait for the oldest started firing, finish it and collect outputs
    async fn complete_firing(slot: &NodeSlot) -> Result<Vec<(String, Packet)>> {
        let service = slot.node.lock().await.completion_service();
        let completion = match service {
            Some(service) => Some(service.take().await?),
            None => None,
        };
        let mut node = slot.node.lock().await;
        node.finish_trigger(completion).await?;
        let mut outputs = Vec::new();
        for label in node.core().outflow_labels() {
            if node.output_packet_ready(&label) {
                outputs.push((label.clone(), node.get_output_packet(&label)?));
            }
        }
        Ok(outputs)
    }
}

#[async_trait]
impl Director for MtDataDrivenDirector {
    fn kind(&self) -> DirectorKind {
        DirectorKind::MtDataDriven
    }

    fn nodes_step_once(&self) -> bool {
        self.nodes_step_once
    }

    async fn run(&mut self, graph: &mut WorkflowGraph) -> Result<()> {
        self.leftover.clear();
        let subscribers: Vec<HashMap<String, Vec<(usize, String)>>> = (0..graph.len())
            .map(|index| {
                graph
                    .node(index)
                    .core()
                    .outflow_labels()
                    .into_iter()
                    .map(|label| {
                        let fed = graph.subscribers(index, &label);
                        (label, fed)
                    })
                    .collect()
            })
            .collect();

        let nodes = graph.take_nodes();
        let count = nodes.len();
        let state = Arc::new(RunState {
            slots: nodes.into_iter().map(NodeSlot::new).collect(),
            subscribers,
            halt: CancellationToken::new(),
            error: StdMutex::new(None),
            live: AtomicUsize::new(count),
            waiting: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        });

        let producers: Vec<_> = (0..count)
            .map(|index| tokio::spawn(Self::produce(state.clone(), index)))
            .collect();
        let mut panicked = None;
        for producer in producers {
            if let Err(error) = producer.await {
                panicked = Some(FlowError::Execution(format!("producer task failed: {}", error)));
            }
        }

        let state = Arc::try_unwrap(state)
            .map_err(|_| FlowError::illegal_state("node tasks outlived the run"))?;
        let mut nodes = Vec::with_capacity(count);
        for (index, slot) in state.slots.into_iter().enumerate() {
            let queues = slot.queues.into_inner().unwrap_or_else(|p| p.into_inner());
            for (label, queue) in queues {
                if !queue.is_empty() {
                    self.leftover.insert((index, label), queue);
                }
            }
            nodes.push(slot.node.into_inner());
        }
        graph.restore_nodes(nodes);

        let error = state.error.into_inner().unwrap_or_else(|p| p.into_inner());
        match error.or(panicked) {
            Some(error) => Err(error),
            None => {
                tracing::debug!("mt-data-driven run complete");
                Ok(())
            }
        }
    }

    async fn wrapup(&mut self, graph: &WorkflowGraph) -> Result<WrapupResult> {
        Ok(queue_records(graph, &mut self.leftover))
    }

    fn reset(&mut self) {
        self.leftover.clear();
    }
}
