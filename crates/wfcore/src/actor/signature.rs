use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declaration of one named input, output or state variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSignature {
    pub name: String,
    #[serde(default)]
    pub nullable: bool,
    /// Declared value type (`Value::type_name`), or `None` for any
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    /// Optional inputs may be absent; a closed stream sets them to null
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "enabled")]
    pub default_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl PortSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            type_name: None,
            default: None,
            optional: false,
            default_enabled: true,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.nullable = true;
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.default_enabled = false;
        self
    }
}

/// Inputs, outputs and state variables declared by an actor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorSignature {
    #[serde(default)]
    pub inputs: BTreeMap<String, PortSignature>,
    #[serde(default)]
    pub outputs: BTreeMap<String, PortSignature>,
    #[serde(default)]
    pub state: BTreeMap<String, PortSignature>,
}

impl ActorSignature {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn input(&self, name: &str) -> Option<&PortSignature> {
        self.inputs.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&PortSignature> {
        self.outputs.get(name)
    }
}
