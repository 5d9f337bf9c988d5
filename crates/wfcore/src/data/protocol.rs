use super::packet::{Packet, PublishedResource};
use super::uri::{Uri, UriTemplate};
use crate::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How data addressed by a URI scheme is packaged and routed
pub trait Protocol: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Whether an outflow may disambiguate successive packets by appending
    /// a step-count suffix to the path
    fn supports_suffixes(&self) -> bool;

    /// Control packets wake a node without delivering an actor input
    fn is_control(&self) -> bool {
        false
    }

    /// Package `data` published at `uri`; `bindings` are the values bound to
    /// the template's variables, in order
    fn create_packet(
        &self,
        template: &UriTemplate,
        uri: Uri,
        bindings: Vec<Value>,
        data: Value,
    ) -> Packet {
        let metadata = template
            .variable_names()
            .into_iter()
            .map(str::to_string)
            .zip(bindings)
            .collect();
        let key = uri.path().to_string();
        Packet::single(PublishedResource::new(uri, key, data), metadata)
    }
}

/// Plain in-memory data transfer
#[derive(Debug, Clone)]
pub struct DataProtocol {
    suffixes: bool,
}

impl DataProtocol {
    pub fn new() -> Self {
        Self { suffixes: true }
    }

    /// A data protocol that cannot add path suffixes, so every outflow on
    /// it must either step once or carry a template variable
    pub fn without_suffixes() -> Self {
        Self { suffixes: false }
    }
}

impl Default for DataProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for DataProtocol {
    fn name(&self) -> &str {
        "data"
    }

    fn supports_suffixes(&self) -> bool {
        self.suffixes
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlProtocol;

impl Protocol for ControlProtocol {
    fn name(&self) -> &str {
        "control"
    }

    fn supports_suffixes(&self) -> bool {
        true
    }

    fn is_control(&self) -> bool {
        true
    }
}

/// Maps URI schemes to protocols.
///
/// The empty scheme and `data` resolve to [`DataProtocol`]; `control`
/// resolves to [`ControlProtocol`].
#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<dyn Protocol>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            protocols: HashMap::new(),
        }
    }

    pub fn register(&mut self, scheme: impl Into<String>, protocol: Arc<dyn Protocol>) {
        let scheme = scheme.into();
        tracing::debug!("Registering protocol for scheme: {:?}", scheme);
        self.protocols.insert(scheme, protocol);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn Protocol>> {
        self.protocols.get(scheme).cloned()
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        schemes.sort();
        schemes
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        let data: Arc<dyn Protocol> = Arc::new(DataProtocol::new());
        registry.register("", data.clone());
        registry.register("data", data);
        registry.register("control", Arc::new(ControlProtocol));
        registry
    }
}
