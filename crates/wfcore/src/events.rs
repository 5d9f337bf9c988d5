use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted while a workflow runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        workflow: String,
        run: u64,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        workflow: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        run_id: RunId,
        node: String,
        step: u64,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        run_id: RunId,
        node: String,
        step: u64,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    PacketSent {
        run_id: RunId,
        node: String,
        label: String,
        uri: String,
        data: Value,
        timestamp: DateTime<Utc>,
    },
    PacketReceived {
        run_id: RunId,
        node: String,
        label: String,
        uri: String,
        timestamp: DateTime<Utc>,
    },
}

/// Call interface for recording run provenance
pub trait TraceRecorder: Send + Sync {
    /// Begin a new run and return its id
    fn run_started(&self, workflow: &str, run: u64) -> RunId;

    fn run_completed(&self, run_id: RunId, workflow: &str, success: bool, duration_ms: u64);

    fn step_started(&self, run_id: RunId, node: &str, step: u64);

    fn step_completed(&self, run_id: RunId, node: &str, step: u64, success: bool);

    fn packet_sent(&self, run_id: RunId, node: &str, label: &str, uri: &str, data: &Value);

    fn packet_received(&self, run_id: RunId, node: &str, label: &str, uri: &str);
}

/// Recorder that discards everything
#[derive(Debug, Clone, Default)]
pub struct NoopTraceRecorder;

impl TraceRecorder for NoopTraceRecorder {
    fn run_started(&self, _workflow: &str, _run: u64) -> RunId {
        Uuid::new_v4()
    }

    fn run_completed(&self, _run_id: RunId, _workflow: &str, _success: bool, _duration_ms: u64) {}

    fn step_started(&self, _run_id: RunId, _node: &str, _step: u64) {}

    fn step_completed(&self, _run_id: RunId, _node: &str, _step: u64, _success: bool) {}

    fn packet_sent(&self, _run_id: RunId, _node: &str, _label: &str, _uri: &str, _data: &Value) {}

    fn packet_received(&self, _run_id: RunId, _node: &str, _label: &str, _uri: &str) {}
}

/// Broadcast bus for run events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }
}

/// Recorder publishing every call as a [`RunEvent`] on an [`EventBus`]
#[derive(Debug, Clone)]
pub struct EventTraceRecorder {
    bus: Arc<EventBus>,
}

impl EventTraceRecorder {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl TraceRecorder for EventTraceRecorder {
    fn run_started(&self, workflow: &str, run: u64) -> RunId {
        let run_id = Uuid::new_v4();
        self.bus.emit(RunEvent::RunStarted {
            run_id,
            workflow: workflow.to_string(),
            run,
            timestamp: Utc::now(),
        });
        run_id
    }

    fn run_completed(&self, run_id: RunId, workflow: &str, success: bool, duration_ms: u64) {
        self.bus.emit(RunEvent::RunCompleted {
            run_id,
            workflow: workflow.to_string(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    fn step_started(&self, run_id: RunId, node: &str, step: u64) {
        self.bus.emit(RunEvent::StepStarted {
            run_id,
            node: node.to_string(),
            step,
            timestamp: Utc::now(),
        });
    }

    fn step_completed(&self, run_id: RunId, node: &str, step: u64, success: bool) {
        self.bus.emit(RunEvent::StepCompleted {
            run_id,
            node: node.to_string(),
            step,
            success,
            timestamp: Utc::now(),
        });
    }

    fn packet_sent(&self, run_id: RunId, node: &str, label: &str, uri: &str, data: &Value) {
        self.bus.emit(RunEvent::PacketSent {
            run_id,
            node: node.to_string(),
            label: label.to_string(),
            uri: uri.to_string(),
            data: data.clone(),
            timestamp: Utc::now(),
        });
    }

    fn packet_received(&self, run_id: RunId, node: &str, label: &str, uri: &str) {
        self.bus.emit(RunEvent::PacketReceived {
            run_id,
            node: node.to_string(),
            label: label.to_string(),
            uri: uri.to_string(),
            timestamp: Utc::now(),
        });
    }
}
