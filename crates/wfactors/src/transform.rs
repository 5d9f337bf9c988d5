use std::collections::HashMap;
use wfcore::{Actor, ActorError, PortSignature, StepError, Value};
use wfruntime::{ActorFactory, ActorMetadata};

fn setting_number(actor: &str, settings: &HashMap<String, Value>, key: &str) -> Result<Option<f64>, ActorError> {
    match settings.get(key) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| ActorError::Declaration {
            actor: actor.to_string(),
            message: format!("setting '{}' must be a number, got {}", key, value.type_name()),
        }),
    }
}

/// Passes its input through unchanged
pub struct RelayActorFactory;

impl ActorFactory for RelayActorFactory {
    fn create(&self, name: &str, _settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        Ok(Actor::from_fn(name, |io| {
            let value = io.input("value")?.clone();
            io.set_output("value", value);
            Ok(())
        })
        .with_input(PortSignature::new("value"))
        .with_output(PortSignature::new("value")))
    }

    fn actor_type(&self) -> &str {
        "relay"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Pass a value through unchanged".to_string(),
            category: "transform".to_string(),
            inputs: vec!["value".to_string()],
            outputs: vec!["value".to_string()],
        }
    }
}

/// Emits the value of its `value` setting
pub struct ConstantActorFactory;

impl ActorFactory for ConstantActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let value = settings.get("value").cloned().ok_or_else(|| ActorError::Declaration {
            actor: name.to_string(),
            message: "constant actor requires a 'value' setting".to_string(),
        })?;
        Ok(Actor::from_fn(name, |io| {
            let value = io.setting("value").cloned().unwrap_or_default();
            io.set_output("value", value);
            Ok(())
        })
        .with_setting("value", value)
        .with_output(PortSignature::new("value")))
    }

    fn actor_type(&self) -> &str {
        "constant"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Emit a configured value".to_string(),
            category: "transform".to_string(),
            inputs: vec![],
            outputs: vec!["value".to_string()],
        }
    }
}

/// Forwards numeric values within `[min, max]` and drops the rest
pub struct FilterActorFactory;

impl ActorFactory for FilterActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let min = setting_number(name, settings, "min")?.unwrap_or(f64::NEG_INFINITY);
        let max = setting_number(name, settings, "max")?.unwrap_or(f64::INFINITY);
        Ok(Actor::from_fn(name, move |io| {
            let number = io.input_f64("value")?;
            if (min..=max).contains(&number) {
                let value = io.input("value")?.clone();
                io.set_output("value", value);
            } else {
                io.disable_output("value");
            }
            Ok(())
        })
        .with_input(PortSignature::new("value").with_type("Number"))
        .with_output(PortSignature::new("value")))
    }

    fn actor_type(&self) -> &str {
        "filter"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Forward numbers between the min and max settings".to_string(),
            category: "transform".to_string(),
            inputs: vec!["value".to_string()],
            outputs: vec!["value".to_string()],
        }
    }
}

/// Joins inputs `a` and `b` as text
pub struct ConcatActorFactory;

impl ActorFactory for ConcatActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let separator = settings
            .get("separator")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Ok(Actor::from_fn(name, move |io| {
            let text = format!("{}{}{}", io.input("a")?, separator, io.input("b")?);
            io.set_output("text", text);
            Ok(())
        })
        .with_input(PortSignature::new("a"))
        .with_input(PortSignature::new("b"))
        .with_output(PortSignature::new("text").with_type("String")))
    }

    fn actor_type(&self) -> &str {
        "concat"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Concatenate two values as text".to_string(),
            category: "transform".to_string(),
            inputs: vec!["a".to_string(), "b".to_string()],
            outputs: vec!["text".to_string()],
        }
    }
}

/// Parse a JSON string into a structured value
pub struct JsonParseActorFactory;

impl ActorFactory for JsonParseActorFactory {
    fn create(&self, name: &str, _settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        Ok(Actor::from_fn(name, |io| {
            let input = io.input_str("json")?;
            let parsed: serde_json::Value = serde_json::from_str(input)
                .map_err(|e| StepError::raise("JsonParseError", e.to_string()))?;
            io.set_output("parsed", Value::from_json(parsed));
            Ok(())
        })
        .with_input(PortSignature::new("json").with_type("String"))
        .with_output(PortSignature::new("parsed")))
    }

    fn actor_type(&self) -> &str {
        "json_parse"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
            inputs: vec!["json".to_string()],
            outputs: vec!["parsed".to_string()],
        }
    }
}
