use async_trait::async_trait;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use wfcore::{Actor, ActorBody, ActorError, PortSignature, StepError, StepIo, Value};
use wfruntime::{ActorFactory, ActorMetadata};

/// Delays each value before passing it through
#[derive(Debug, Clone)]
pub struct DelayActor {
    delay: Duration,
}

impl DelayActor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ActorBody for DelayActor {
    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        tracing::debug!(actor = %io.actor_name(), "delaying for {:?}", self.delay);
        sleep(self.delay).await;
        let value = io.input("value")?.clone();
        io.set_output("value", value);
        Ok(())
    }

    fn duplicate(&self) -> Option<Box<dyn ActorBody>> {
        Some(Box::new(self.clone()))
    }
}

pub struct DelayActorFactory;

impl ActorFactory for DelayActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        // Default to 1 second if not specified
        let delay_ms = match settings.get("delay_ms") {
            None => 1000,
            Some(value) => value.as_i64().filter(|ms| *ms >= 0).ok_or_else(|| ActorError::Declaration {
                actor: name.to_string(),
                message: format!("setting 'delay_ms' must be a non-negative integer, got {}", value),
            })?,
        };
        Ok(Actor::new(name, DelayActor::new(Duration::from_millis(delay_ms as u64)))
            .with_input(PortSignature::new("value"))
            .with_output(PortSignature::new("value")))
    }

    fn actor_type(&self) -> &str {
        "delay"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Delay each value for delay_ms milliseconds".to_string(),
            category: "time".to_string(),
            inputs: vec!["value".to_string()],
            outputs: vec!["value".to_string()],
        }
    }
}
