use crate::directors::Director;
use crate::graph::WorkflowGraph;
use crate::nodes::{InPortal, NodeKind, OutPortal, WorkflowNode};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;
use wfcore::{
    Actor, ActorBody, ActorHooks, FlowError, PacketStore, PortSignature, Result, StepError, StepIo,
    UriTemplate, Value, Variables, WorkflowContext, WrapupResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Constructed,
    Elaborated,
    Configured,
    Initialized,
    Stepped,
    WrappedUp,
    Disposed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Constructed => "CONSTRUCTED",
            WorkflowState::Elaborated => "ELABORATED",
            WorkflowState::Configured => "CONFIGURED",
            WorkflowState::Initialized => "INITIALIZED",
            WorkflowState::Stepped => "STEPPED",
            WorkflowState::WrappedUp => "WRAPPED_UP",
            WorkflowState::Disposed => "DISPOSED",
        };
        f.write_str(name)
    }
}

/// A graph of nodes driven by a director.
///
/// A workflow is elaborated, configured and initialized once, then run
/// one or more times. Used as an actor body it becomes a node of an
/// enclosing workflow, with its in-portal and out-portal bridging the
/// enclosing node's inputs and outputs.
pub struct Workflow {
    name: String,
    graph: WorkflowGraph,
    director: Option<Box<dyn Director>>,
    context: WorkflowContext,
    state: WorkflowState,
    uri_prefix: Option<UriTemplate>,
    run_prefix: Option<UriTemplate>,
    step_prefix: String,
    run_count: u64,
    steps_once: bool,
    report_unused: bool,
    inputs: HashMap<String, Value>,
    outputs: BTreeMap<String, Value>,
    last_wrapup: WrapupResult,
}

impl Workflow {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn store(&self) -> &PacketStore {
        self.context.store()
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn director(&self) -> Option<&dyn Director> {
        self.director.as_deref()
    }

    pub fn set_director(&mut self, director: Box<dyn Director>) {
        self.director = Some(director);
    }

    /// Typed access to node `name`
    pub fn node<T: 'static>(&self, name: &str) -> Option<&T> {
        self.graph.find::<T>(name)
    }

    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    /// Unused-data records from the most recent run
    pub fn last_wrapup(&self) -> &WrapupResult {
        &self.last_wrapup
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    pub fn output(&self, label: &str) -> Option<&Value> {
        self.outputs.get(label)
    }

    /// Stage a value for the in-portal outflow `label`
    pub fn set_input(&mut self, label: impl Into<String>, value: impl Into<Value>) {
        self.inputs.insert(label.into(), value.into());
    }

    fn require(&self, operation: &str, allowed: &[WorkflowState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FlowError::illegal_state(format!(
                "Workflow {} cannot {} while {}",
                self.name, operation, self.state
            )))
        }
    }

    pub fn elaborate(&mut self) -> Result<()> {
        self.require("elaborate", &[WorkflowState::Constructed])?;
        let director = self.director.as_mut().ok_or_else(|| {
            FlowError::illegal_state(format!("No director set for workflow {}", self.name))
        })?;

        let mut anonymous = 0;
        let step_once = director.nodes_step_once();
        for node in self.graph.nodes_mut() {
            if !node.core().has_name() {
                anonymous += 1;
                node.core_mut().set_name(format!("anonymous_node_{}", anonymous));
            }
            if step_once {
                node.core_mut().set_steps_once(true);
            }
            node.elaborate()?;
        }

        loop {
            self.graph.analyze()?;
            if !director.elaborate(&mut self.graph)? {
                break;
            }
        }
        tracing::debug!(workflow = %self.name, nodes = self.graph.len(), "workflow elaborated");
        self.state = WorkflowState::Elaborated;
        Ok(())
    }

    pub fn configure(&mut self) -> Result<()> {
        self.require("configure", &[WorkflowState::Elaborated])?;
        for node in self.graph.nodes_mut() {
            node.configure(&self.context)?;
        }
        if let Some(director) = self.director.as_mut() {
            director.configure(&self.graph)?;
        }
        self.state = WorkflowState::Configured;
        Ok(())
    }

    pub async fn initialize(&mut self) -> Result<()> {
        self.require(
            "initialize",
            &[
                WorkflowState::Configured,
                WorkflowState::Initialized,
                WorkflowState::Stepped,
                WorkflowState::WrappedUp,
            ],
        )?;
        if let Some(director) = self.director.as_mut() {
            director.initialize(&mut self.graph).await?;
        }
        self.run_count = 0;
        self.state = WorkflowState::Initialized;
        Ok(())
    }

    /// Elaborate, configure and initialize as far as needed to run
    pub async fn prepare(&mut self) -> Result<()> {
        if self.state == WorkflowState::Constructed {
            self.elaborate()?;
        }
        if self.state == WorkflowState::Elaborated {
            self.configure()?;
        }
        self.initialize().await
    }

    fn run_uri_prefix(&self, variables: &Variables) -> Result<String> {
        let mut prefix = self.step_prefix.clone();
        if let Some(template) = &self.uri_prefix {
            prefix.push_str(&template.expand(variables, "", "")?.0.path().to_string());
        }
        if let Some(template) = &self.run_prefix {
            prefix.push_str(&template.expand(variables, "", "")?.0.path().to_string());
        }
        Ok(prefix)
    }

    /// Run the graph to quiescence once
    pub async fn run(&mut self) -> Result<()> {
        self.require("run", &[WorkflowState::Initialized, WorkflowState::Stepped])?;
        if self.run_count > 0 && self.run_prefix.is_none() {
            return Err(FlowError::illegal_state(
                "May not rerun a workflow without reinitializing unless a run prefix is provided.",
            ));
        }
        self.run_count += 1;
        let run = self.run_count;
        let started = Instant::now();
        let run_id = self.context.recorder().run_started(&self.name, run);
        self.context.set_run_id(run_id);
        tracing::info!(workflow = %self.name, run, "workflow run started");

        let result = self.run_graph(run).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.context
            .recorder()
            .run_completed(run_id, &self.name, result.is_ok(), duration_ms);
        match &result {
            Ok(()) => tracing::info!(workflow = %self.name, run, duration_ms, "workflow run completed"),
            Err(error) => tracing::error!(workflow = %self.name, run, error = %error, "workflow run failed"),
        }
        result
    }

    async fn run_graph(&mut self, run: u64) -> Result<()> {
        let variables = Variables::from([("RUN".to_string(), Value::from(run))]);
        let prefix = self.run_uri_prefix(&variables)?;
        self.outputs.clear();

        for node in self.graph.nodes_mut() {
            let core = node.core_mut();
            core.set_uri_prefix(prefix.clone());
            core.set_run(run);
            node.initialize().await?;
        }
        if let Some(portal) = self.graph.find_mut::<InPortal>("InPortal") {
            portal.clear_inputs();
            for (label, value) in &self.inputs {
                portal.set_input(label.clone(), value.clone());
            }
        }

        let director = self.director.as_mut().ok_or_else(|| {
            FlowError::illegal_state(format!("No director set for workflow {}", self.name))
        })?;
        director.run(&mut self.graph).await?;

        let mut wrapup = WrapupResult::new();
        for node in self.graph.nodes_mut() {
            wrapup.extend(node.wrapup().await?);
        }
        wrapup.extend(director.wrapup(&self.graph).await?);
        if self.report_unused {
            if let Some(text) = wrapup.report(&self.name, run) {
                tracing::warn!("{}", text.trim_end());
                self.context.diagnostics().emit(&text);
            }
        }
        self.last_wrapup = wrapup;

        if let Some(portal) = self.graph.find::<OutPortal>("OutPortal") {
            self.outputs = portal.outputs().clone();
        }
        self.state = WorkflowState::Stepped;
        Ok(())
    }

    pub fn wrapup(&mut self) -> Result<()> {
        self.require(
            "wrap up",
            &[WorkflowState::Initialized, WorkflowState::Stepped, WorkflowState::WrappedUp],
        )?;
        self.state = WorkflowState::WrappedUp;
        Ok(())
    }

    pub async fn dispose(&mut self) -> Result<()> {
        for node in self.graph.nodes_mut() {
            node.dispose().await?;
        }
        if let Some(director) = self.director.as_mut() {
            director.dispose().await?;
        }
        self.state = WorkflowState::Disposed;
        Ok(())
    }

    /// Forget all runs: node state, run counter and published data
    pub fn reset(&mut self) {
        for node in self.graph.nodes_mut() {
            node.reset();
        }
        if let Some(director) = self.director.as_mut() {
            director.reset();
        }
        self.context.store().clear();
        self.run_count = 0;
        self.outputs.clear();
        self.last_wrapup = WrapupResult::new();
        if matches!(
            self.state,
            WorkflowState::Initialized | WorkflowState::Stepped | WorkflowState::WrappedUp
        ) {
            self.state = WorkflowState::Configured;
        }
    }

    fn check_nesting(&self) -> Result<()> {
        let has_variable = self
            .uri_prefix
            .as_ref()
            .map(|t| t.variable_count() > 0)
            .unwrap_or(false);
        if !self.steps_once && !has_variable {
            return Err(FlowError::illegal_state(format!(
                "Nested workflows '{}' requires a URI prefix with at least one variable unless they step only once.",
                self.name
            )));
        }
        Ok(())
    }

    /// Wrap this workflow in an actor whose inputs are the in-portal
    /// outflows and whose outputs are the out-portal inflows
    pub fn into_actor(self) -> Actor {
        let inputs: Vec<String> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| n.kind() == NodeKind::InPortal)
            .flat_map(|n| n.core().outflow_labels())
            .collect();
        let outputs: Vec<String> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| n.kind() == NodeKind::OutPortal)
            .flat_map(|n| n.core().inflow_labels())
            .collect();
        let name = self.name.clone();
        let mut actor = Actor::new(name, self).with_cloneable(false);
        for input in inputs {
            actor = actor.with_input(PortSignature::new(input).nullable());
        }
        for output in outputs {
            actor = actor.with_output(PortSignature::new(output).nullable());
        }
        actor
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.graph.len())
            .field("run_count", &self.run_count)
            .finish()
    }
}

fn step_failure(error: FlowError) -> StepError {
    StepError::Failed(error.to_string())
}

#[async_trait]
impl ActorBody for Workflow {
    fn hooks(&self) -> ActorHooks {
        ActorHooks {
            initialize: true,
            step: true,
            wrapup: true,
            set_status: false,
        }
    }

    async fn initialize(&mut self, _io: &mut StepIo<'_>) -> std::result::Result<(), StepError> {
        self.check_nesting().map_err(step_failure)?;
        if self.state == WorkflowState::Constructed {
            self.elaborate().map_err(step_failure)?;
        }
        if self.state == WorkflowState::Elaborated {
            self.configure().map_err(step_failure)?;
        }
        Workflow::initialize(self).await.map_err(step_failure)
    }

    async fn step(&mut self, io: &mut StepIo<'_>) -> std::result::Result<(), StepError> {
        self.step_prefix = match &self.uri_prefix {
            Some(template) => template
                .expand(io.variables(), "", "")
                .map_err(|e| step_failure(e.into()))?
                .0
                .path()
                .to_string(),
            None => String::new(),
        };
        let uri_prefix = self.uri_prefix.take();
        self.inputs = io
            .inputs()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let result = match Workflow::initialize(self).await {
            Ok(()) => self.run().await,
            Err(error) => Err(error),
        };
        self.uri_prefix = uri_prefix;
        result.map_err(step_failure)?;

        for (label, value) in self.outputs.clone() {
            io.set_output(&label, value);
        }
        Ok(())
    }

    async fn wrapup(&mut self, _io: &mut StepIo<'_>) -> std::result::Result<(), StepError> {
        Workflow::wrapup(self).map_err(step_failure)
    }
}

/// Assembles a [`Workflow`] from nodes, a director and portal bindings
pub struct WorkflowBuilder {
    name: String,
    nodes: Vec<Box<dyn WorkflowNode>>,
    director: Option<Box<dyn Director>>,
    context: Option<WorkflowContext>,
    uri_prefix: Option<String>,
    run_prefix: Option<String>,
    inputs: Vec<(String, String)>,
    outputs: Vec<(String, String)>,
    steps_once: bool,
    report_unused: bool,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            director: None,
            context: None,
            uri_prefix: None,
            run_prefix: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            steps_once: false,
            report_unused: true,
        }
    }

    pub fn node(mut self, node: impl WorkflowNode + 'static) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    pub fn boxed_node(mut self, node: Box<dyn WorkflowNode>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn director(mut self, director: impl Director + 'static) -> Self {
        self.director = Some(Box::new(director));
        self
    }

    pub fn boxed_director(mut self, director: Box<dyn Director>) -> Self {
        self.director = Some(director);
        self
    }

    pub fn context(mut self, context: WorkflowContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Prefix prepended to every published URI; variables bind from the
    /// enclosing node when nested
    pub fn uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.uri_prefix = Some(prefix.into());
        self
    }

    /// Per-run prefix such as `/run{RUN}`, which permits reruns
    pub fn run_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_prefix = Some(prefix.into());
        self
    }

    /// Workflow input `label`, published by the in-portal at `expression`
    pub fn input(mut self, label: impl Into<String>, expression: impl Into<String>) -> Self {
        self.inputs.push((label.into(), expression.into()));
        self
    }

    /// Workflow output `label`, collected by the out-portal from `expression`
    pub fn output(mut self, label: impl Into<String>, expression: impl Into<String>) -> Self {
        self.outputs.push((label.into(), expression.into()));
        self
    }

    pub fn steps_once(mut self, steps_once: bool) -> Self {
        self.steps_once = steps_once;
        self
    }

    pub fn report_unused_data(mut self, report: bool) -> Self {
        self.report_unused = report;
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let mut graph = WorkflowGraph::new();
        if !self.inputs.is_empty() {
            let mut portal = InPortal::new();
            for (label, expression) in &self.inputs {
                portal = portal.with_outflow(label, expression)?;
            }
            graph.add_node(Box::new(portal));
        }
        for node in self.nodes {
            graph.add_node(node);
        }
        if !self.outputs.is_empty() {
            let mut portal = OutPortal::new();
            for (label, expression) in &self.outputs {
                portal = portal.with_inflow(label, expression)?;
            }
            graph.add_node(Box::new(portal));
        }

        Ok(Workflow {
            name: self.name,
            graph,
            director: self.director,
            context: self.context.unwrap_or_default(),
            state: WorkflowState::Constructed,
            uri_prefix: self.uri_prefix.as_deref().map(UriTemplate::parse).transpose()?,
            run_prefix: self.run_prefix.as_deref().map(UriTemplate::parse).transpose()?,
            step_prefix: String::new(),
            run_count: 0,
            steps_once: self.steps_once,
            report_unused: self.report_unused,
            inputs: HashMap::new(),
            outputs: BTreeMap::new(),
            last_wrapup: WrapupResult::new(),
        })
    }
}
