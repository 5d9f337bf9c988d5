use crate::definition::WorkflowDefinition;
use crate::directors::DirectorKind;
use crate::registry::ActorRegistry;
use crate::workflow::Workflow;
use std::sync::Arc;
use wfcore::{EventBus, EventTraceRecorder, Result, RunEvent, WorkflowContext};

/// Main runtime for building and running workflows from definitions
pub struct WorkflowRuntime {
    registry: Arc<ActorRegistry>,
    config: RuntimeConfig,
    event_bus: Arc<EventBus>,
}

impl WorkflowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ActorRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<ActorRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            config,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A fresh context whose run events go to this runtime's event bus
    pub fn context(&self) -> WorkflowContext {
        WorkflowContext::new().with_recorder(Arc::new(EventTraceRecorder::new(self.event_bus.clone())))
    }

    /// Build a workflow from a definition with a fresh context
    pub fn build(&self, definition: &WorkflowDefinition) -> Result<Workflow> {
        definition.build(&self.registry, &self.config, self.context())
    }

    /// Prepare a workflow and run it `runs` times
    pub async fn execute(&self, workflow: &mut Workflow, runs: u64) -> Result<()> {
        workflow.prepare().await?;
        for _ in 0..runs.max(1) {
            workflow.run().await?;
        }
        workflow.wrapup()
    }

    /// Subscribe to run events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for WorkflowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Director used when a definition names none
    pub default_director: DirectorKind,
    pub event_buffer_size: usize,
    /// Node concurrency used when a definition names none
    pub default_max_concurrency: usize,
    /// Report unused data packets at the end of each run
    pub unused_data_warnings: bool,
}

impl RuntimeConfig {
    pub fn with_default_director(mut self, director: DirectorKind) -> Self {
        self.default_director = director;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_default_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.default_max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_unused_data_warnings(mut self, enabled: bool) -> Self {
        self.unused_data_warnings = enabled;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_director: DirectorKind::PublishSubscribe,
            event_buffer_size: 1000,
            default_max_concurrency: 1,
            unused_data_warnings: true,
        }
    }
}
