use std::collections::HashMap;
use std::sync::Arc;
use wfcore::{Actor, ActorError, Value, WorkflowError};

/// Factory trait for creating actor instances
pub trait ActorFactory: Send + Sync {
    /// Create a new actor named `name` from the given settings
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError>;

    /// Get actor type identifier
    fn actor_type(&self) -> &str;

    /// Optional: describe the actor type for listings
    fn metadata(&self) -> ActorMetadata {
        ActorMetadata::default()
    }
}

/// Metadata about an actor type
#[derive(Debug, Clone)]
pub struct ActorMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Default for ActorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

/// Registry of available actor types
pub struct ActorRegistry {
    factories: HashMap<String, Arc<dyn ActorFactory>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an actor factory
    pub fn register(&mut self, factory: Arc<dyn ActorFactory>) {
        let actor_type = factory.actor_type().to_string();
        tracing::info!("Registering actor type: {}", actor_type);
        self.factories.insert(actor_type, factory);
    }

    /// Create an actor instance from an actor type and settings
    pub fn create_actor(
        &self,
        actor_type: &str,
        name: &str,
        settings: &HashMap<String, Value>,
    ) -> Result<Actor, WorkflowError> {
        let factory = self
            .factories
            .get(actor_type)
            .ok_or_else(|| WorkflowError::UnknownActorType(actor_type.to_string()))?;

        factory
            .create(name, settings)
            .map_err(|e| WorkflowError::Invalid(format!("Failed to create actor {}: {}", name, e)))
    }

    pub fn has_actor_type(&self, actor_type: &str) -> bool {
        self.factories.contains_key(actor_type)
    }

    /// All registered actor types, sorted
    pub fn list_actor_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, actor_type: &str) -> Option<ActorMetadata> {
        self.factories.get(actor_type).map(|f| f.metadata())
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
