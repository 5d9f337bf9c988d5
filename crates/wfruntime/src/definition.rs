//! Declarative JSON workflow definitions
//!
//! A definition names a director and a list of nodes. Actor nodes refer to
//! actor types registered in an [`ActorRegistry`]; plain JSON values in
//! settings, constants and sequences are converted with
//! [`Value::from_json`].

use crate::directors::{
    BufferPlacement, DataDrivenDirector, DemandDrivenDirector, Director, DirectorKind,
    MtDataDrivenDirector, PublishSubscribeDirector,
};
use crate::nodes::{ActorNode, MergeNode, MergePolicy, WorkflowNode};
use crate::registry::ActorRegistry;
use crate::runtime::RuntimeConfig;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use wfcore::{FlowError, Result, Value, WorkflowContext, WorkflowError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<DirectorDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_prefix: Option<String>,
    /// Workflow input label to the URI the in-portal publishes it on
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    /// Workflow output label to the URI the out-portal collects it from
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
    pub nodes: Vec<NodeDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorDefinition {
    #[serde(default)]
    pub kind: Option<DirectorKind>,
    #[serde(default)]
    pub nodes_step_once: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firing_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_placement: Option<BufferPlacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDefinition {
    Actor(ActorNodeDefinition),
    Merge(MergeNodeDefinition),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorNodeDefinition {
    pub name: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inflows: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub receive_once: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outflows: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exception_outflows: Vec<ExceptionOutflowDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub initial_values: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sequences: BTreeMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    pub repeat_values: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default = "default_ordered")]
    pub ordered: bool,
    #[serde(default)]
    pub steps_once: bool,
    #[serde(default)]
    pub end_flow_on_null: bool,
    #[serde(default)]
    pub end_flow_on_no_output: bool,
    #[serde(default)]
    pub end_flow_on_actor_exception: bool,
}

fn default_ordered() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionOutflowDefinition {
    /// Error kind to route, or `*` for any
    pub kind: String,
    pub label: String,
    pub expression: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeNodeDefinition {
    pub name: String,
    #[serde(default)]
    pub policy: MergePolicy,
    pub inflows: BTreeMap<String, String>,
    pub outflows: BTreeMap<String, String>,
}

fn to_values<'a>(json: impl IntoIterator<Item = (&'a String, &'a serde_json::Value)>) -> Vec<(String, Value)> {
    json.into_iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
        .collect()
}

impl WorkflowDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn director_kind(&self, config: &RuntimeConfig) -> DirectorKind {
        self.director
            .as_ref()
            .and_then(|d| d.kind)
            .unwrap_or(config.default_director)
    }

    /// Replace the director kind, keeping its other options
    pub fn set_director_kind(&mut self, kind: DirectorKind) {
        self.director.get_or_insert_with(DirectorDefinition::default).kind = Some(kind);
    }

    fn create_director(&self, config: &RuntimeConfig) -> Box<dyn Director> {
        let options = self.director.clone().unwrap_or_default();
        let step_once = options.nodes_step_once;
        match self.director_kind(config) {
            DirectorKind::PublishSubscribe => {
                Box::new(PublishSubscribeDirector::new().with_nodes_step_once(step_once))
            }
            DirectorKind::DataDriven => Box::new(
                DataDrivenDirector::new()
                    .with_nodes_step_once(step_once)
                    .with_buffer_placement(options.buffer_placement.unwrap_or_default()),
            ),
            DirectorKind::MtDataDriven => {
                Box::new(MtDataDrivenDirector::new().with_nodes_step_once(step_once))
            }
            DirectorKind::DemandDriven => Box::new(
                DemandDrivenDirector::new()
                    .with_nodes_step_once(step_once)
                    .with_firing_count(options.firing_count.unwrap_or(1)),
            ),
        }
    }

    fn build_actor_node(
        definition: &ActorNodeDefinition,
        registry: &ActorRegistry,
        config: &RuntimeConfig,
    ) -> Result<ActorNode> {
        let settings: HashMap<String, Value> = to_values(&definition.settings).into_iter().collect();
        let actor = registry.create_actor(&definition.actor, &definition.name, &settings)?;

        let mut node = ActorNode::named(&definition.name, actor)
            .with_max_concurrency(
                definition.max_concurrency.unwrap_or(config.default_max_concurrency),
                definition.ordered,
            )
            .with_steps_once(definition.steps_once)
            .with_repeat_values(definition.repeat_values)
            .with_end_flow_on_null(definition.end_flow_on_null)
            .with_end_flow_on_no_output(definition.end_flow_on_no_output)
            .with_end_flow_on_actor_exception(definition.end_flow_on_actor_exception);
        for (label, expression) in &definition.inflows {
            node = node.with_inflow(label, expression)?;
        }
        for (label, expression) in &definition.receive_once {
            node = node.with_receive_once_inflow(label, expression)?;
        }
        for (label, expression) in &definition.outflows {
            node = node.with_outflow(label, expression)?;
        }
        for route in &definition.exception_outflows {
            node = node.with_exception_outflow(&route.kind, &route.label, &route.expression)?;
        }
        for (name, value) in to_values(&definition.constants) {
            node = node.with_constant(name, value);
        }
        for (name, value) in to_values(&definition.initial_values) {
            node = node.with_initial_value(name, value);
        }
        for (name, values) in &definition.sequences {
            node = node.with_sequence(name.clone(), values.iter().cloned().map(Value::from_json).collect());
        }
        Ok(node)
    }

    fn build_merge_node(definition: &MergeNodeDefinition) -> Result<MergeNode> {
        let mut node = MergeNode::new(&definition.name).with_policy(definition.policy);
        for (label, expression) in &definition.inflows {
            node = node.with_inflow(label, expression)?;
        }
        for (label, expression) in &definition.outflows {
            node = node.with_outflow(label, expression)?;
        }
        Ok(node)
    }

    /// Build an unelaborated workflow, creating actors through `registry`
    pub fn build(
        &self,
        registry: &ActorRegistry,
        config: &RuntimeConfig,
        context: WorkflowContext,
    ) -> Result<Workflow> {
        if self.nodes.is_empty() {
            return Err(FlowError::Workflow(WorkflowError::Invalid(format!(
                "workflow {} declares no nodes",
                self.name
            ))));
        }

        let mut builder = Workflow::builder(&self.name)
            .boxed_director(self.create_director(config))
            .context(context)
            .report_unused_data(config.unused_data_warnings);
        if let Some(prefix) = &self.uri_prefix {
            builder = builder.uri_prefix(prefix);
        }
        if let Some(prefix) = &self.run_prefix {
            builder = builder.run_prefix(prefix);
        }
        for (label, expression) in &self.inputs {
            builder = builder.input(label, expression);
        }
        for (label, expression) in &self.outputs {
            builder = builder.output(label, expression);
        }
        for definition in &self.nodes {
            let node: Box<dyn WorkflowNode> = match definition {
                NodeDefinition::Actor(actor) => Box::new(Self::build_actor_node(actor, registry, config)?),
                NodeDefinition::Merge(merge) => Box::new(Self::build_merge_node(merge)?),
            };
            builder = builder.boxed_node(node);
        }
        builder.build()
    }

    /// A small definition: a sequence doubled and collected
    pub fn example() -> Self {
        WorkflowDefinition {
            name: "DoubleSequence".to_string(),
            description: Some("Doubles each value of a sequence".to_string()),
            director: Some(DirectorDefinition {
                kind: Some(DirectorKind::PublishSubscribe),
                ..Default::default()
            }),
            uri_prefix: None,
            run_prefix: Some("/run{RUN}".to_string()),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            nodes: vec![
                NodeDefinition::Actor(ActorNodeDefinition {
                    name: "CreateValues".to_string(),
                    actor: "relay".to_string(),
                    sequences: BTreeMap::from([(
                        "value".to_string(),
                        vec![1.into(), 2.into(), 3.into()],
                    )]),
                    outflows: BTreeMap::from([("value".to_string(), "/values".to_string())]),
                    ordered: true,
                    ..Default::default()
                }),
                NodeDefinition::Actor(ActorNodeDefinition {
                    name: "DoubleValues".to_string(),
                    actor: "multiply".to_string(),
                    inflows: BTreeMap::from([("a".to_string(), "/values".to_string())]),
                    constants: BTreeMap::from([("b".to_string(), 2.into())]),
                    outflows: BTreeMap::from([("product".to_string(), "/doubled".to_string())]),
                    ordered: true,
                    ..Default::default()
                }),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_nodes() {
        let json = r#"{
            "name": "Merge",
            "director": { "kind": "data-driven", "buffer_placement": "multiply_fed" },
            "nodes": [
                { "kind": "actor", "name": "A", "actor": "relay",
                  "sequences": { "value": [1, 2] }, "outflows": { "value": "/a" } },
                { "kind": "merge", "name": "M", "policy": "round_robin",
                  "inflows": { "a": "/a" }, "outflows": { "out": "/m" } }
            ]
        }"#;
        let definition = WorkflowDefinition::from_json(json).unwrap();
        assert_eq!(definition.director_kind(&RuntimeConfig::default()), DirectorKind::DataDriven);
        assert_eq!(definition.nodes.len(), 2);
        match &definition.nodes[0] {
            NodeDefinition::Actor(actor) => {
                assert!(actor.ordered);
                assert_eq!(actor.sequences["value"].len(), 2);
            }
            other => panic!("unexpected node {:?}", other),
        }
        match &definition.nodes[1] {
            NodeDefinition::Merge(merge) => assert_eq!(merge.policy, MergePolicy::RoundRobin),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_default_director_from_config() {
        let mut definition = WorkflowDefinition::example();
        definition.director = None;
        let config = RuntimeConfig::default().with_default_director(DirectorKind::DemandDriven);
        assert_eq!(definition.director_kind(&config), DirectorKind::DemandDriven);
        definition.set_director_kind(DirectorKind::MtDataDriven);
        assert_eq!(definition.director_kind(&config), DirectorKind::MtDataDriven);
    }

    #[test]
    fn test_example_survives_json() {
        let json = WorkflowDefinition::example().to_json_pretty().unwrap();
        let parsed = WorkflowDefinition::from_json(&json).unwrap();
        assert_eq!(parsed.name, "DoubleSequence");
        assert_eq!(parsed.nodes.len(), 2);
    }

    #[test]
    fn test_unknown_actor_type_fails_build() {
        let definition = WorkflowDefinition::example();
        let error = definition
            .build(&ActorRegistry::new(), &RuntimeConfig::default(), WorkflowContext::new())
            .unwrap_err();
        assert!(error.to_string().contains("Unknown actor type: relay"));
    }
}
