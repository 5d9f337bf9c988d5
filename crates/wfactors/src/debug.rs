use std::collections::HashMap;
use wfcore::{Actor, ActorError, PortSignature, Value};
use wfruntime::{ActorFactory, ActorMetadata};

/// Logs each value it receives and passes it through
pub struct LogActorFactory;

impl ActorFactory for LogActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let label = settings
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();
        let actor = Actor::from_fn(name, move |io| {
            let value = io.input("value")?.clone();
            tracing::info!(actor = %io.actor_name(), step = io.step_count(), "{}: {}", label, value);
            for (key, variable) in io.variables() {
                tracing::debug!("  {}: {}", key, variable);
            }
            io.set_output("value", value);
            Ok(())
        })
        .with_input(PortSignature::new("value").nullable())
        .with_output(PortSignature::new("value").nullable());
        Ok(actor)
    }

    fn actor_type(&self) -> &str {
        "log"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
            inputs: vec!["value".to_string()],
            outputs: vec!["value".to_string()],
        }
    }
}
