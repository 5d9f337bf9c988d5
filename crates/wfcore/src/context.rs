use crate::data::{PacketStore, ProtocolRegistry};
use crate::events::{NoopTraceRecorder, RunId, TraceRecorder};
use crate::wrapup::{DiagnosticSink, StderrSink};
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Services shared by every node and director of a workflow
#[derive(Clone)]
pub struct WorkflowContext {
    store: PacketStore,
    protocols: Arc<ProtocolRegistry>,
    recorder: Arc<dyn TraceRecorder>,
    diagnostics: Arc<dyn DiagnosticSink>,
    run_id: Arc<Mutex<RunId>>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self {
            store: PacketStore::new(),
            protocols: Arc::new(ProtocolRegistry::default()),
            recorder: Arc::new(NoopTraceRecorder),
            diagnostics: Arc::new(StderrSink),
            run_id: Arc::new(Mutex::new(Uuid::nil())),
        }
    }

    pub fn with_store(mut self, store: PacketStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = Arc::new(protocols);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TraceRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn store(&self) -> &PacketStore {
        &self.store
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn recorder(&self) -> &dyn TraceRecorder {
        self.recorder.as_ref()
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    pub fn run_id(&self) -> RunId {
        *self.run_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_run_id(&self, run_id: RunId) {
        *self.run_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = run_id;
    }
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("store", &self.store)
            .field("protocols", &self.protocols.schemes())
            .field("run_id", &self.run_id())
            .finish()
    }
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new()
    }
}
