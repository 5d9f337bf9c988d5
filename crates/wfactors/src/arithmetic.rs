use async_trait::async_trait;
use std::collections::HashMap;
use wfcore::{Actor, ActorBody, ActorError, ActorHooks, PortSignature, StepError, StepIo, Value};
use wfruntime::{ActorFactory, ActorMetadata};

/// Apply `int_op` when both operands are integers, `float_op` otherwise
fn binary(
    io: &StepIo<'_>,
    left: &str,
    right: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, StepError> {
    let a = io.input(left)?;
    let b = io.input(right)?;
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        if let Some(result) = int_op(*x, *y) {
            return Ok(Value::Integer(result));
        }
    }
    Ok(Value::Number(float_op(io.input_f64(left)?, io.input_f64(right)?)))
}

fn numeric_ports(actor: Actor, output: &str) -> Actor {
    actor
        .with_input(PortSignature::new("a").with_type("Number"))
        .with_input(PortSignature::new("b").with_type("Number"))
        .with_output(PortSignature::new(output))
}

pub struct AddActorFactory;

impl ActorFactory for AddActorFactory {
    fn create(&self, name: &str, _settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let actor = Actor::from_fn(name, |io| {
            let sum = binary(io, "a", "b", i64::checked_add, |x, y| x + y)?;
            io.set_output("sum", sum);
            Ok(())
        });
        Ok(numeric_ports(actor, "sum"))
    }

    fn actor_type(&self) -> &str {
        "add"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Adds inputs a and b".to_string(),
            category: "arithmetic".to_string(),
            inputs: vec!["a".to_string(), "b".to_string()],
            outputs: vec!["sum".to_string()],
        }
    }
}

pub struct MultiplyActorFactory;

impl ActorFactory for MultiplyActorFactory {
    fn create(&self, name: &str, _settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let actor = Actor::from_fn(name, |io| {
            let product = binary(io, "a", "b", i64::checked_mul, |x, y| x * y)?;
            io.set_output("product", product);
            Ok(())
        });
        Ok(numeric_ports(actor, "product"))
    }

    fn actor_type(&self) -> &str {
        "multiply"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Multiplies inputs a and b".to_string(),
            category: "arithmetic".to_string(),
            inputs: vec!["a".to_string(), "b".to_string()],
            outputs: vec!["product".to_string()],
        }
    }
}

/// Divides `a` by `b`, raising `DivideByZero` for a zero divisor
pub struct DivideActorFactory;

impl ActorFactory for DivideActorFactory {
    fn create(&self, name: &str, _settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let actor = Actor::from_fn(name, |io| {
            if io.input_f64("b")? == 0.0 {
                return Err(StepError::raise("DivideByZero", "cannot divide by zero"));
            }
            let quotient = binary(
                io,
                "a",
                "b",
                |x, y| x.checked_rem(y).filter(|r| *r == 0).and_then(|_| x.checked_div(y)),
                |x, y| x / y,
            )?;
            io.set_output("quotient", quotient);
            Ok(())
        });
        Ok(numeric_ports(actor, "quotient"))
    }

    fn actor_type(&self) -> &str {
        "divide"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Divides input a by input b".to_string(),
            category: "arithmetic".to_string(),
            inputs: vec!["a".to_string(), "b".to_string()],
            outputs: vec!["quotient".to_string()],
        }
    }
}

/// Running total of every value received since initialization
#[derive(Debug, Default)]
struct Accumulator {
    total: f64,
    integral: bool,
}

#[async_trait]
impl ActorBody for Accumulator {
    fn hooks(&self) -> ActorHooks {
        ActorHooks {
            initialize: true,
            ..ActorHooks::STEP_ONLY
        }
    }

    async fn initialize(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        let start = io.setting("start").cloned().unwrap_or(Value::Integer(0));
        self.integral = matches!(start, Value::Integer(_));
        self.total = start.as_f64().unwrap_or(0.0);
        Ok(())
    }

    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        let value = io.input("value")?;
        self.integral &= matches!(value, Value::Integer(_));
        self.total += io.input_f64("value")?;
        if self.integral {
            io.set_output("total", self.total as i64);
        } else {
            io.set_output("total", self.total);
        }
        Ok(())
    }
}

pub struct AccumulateActorFactory;

impl ActorFactory for AccumulateActorFactory {
    fn create(&self, name: &str, settings: &HashMap<String, Value>) -> Result<Actor, ActorError> {
        let mut actor = Actor::new(name, Accumulator::default())
            .with_input(PortSignature::new("value").with_type("Number"))
            .with_output(PortSignature::new("total"))
            .with_stateful(true);
        if let Some(start) = settings.get("start") {
            if start.as_f64().is_none() {
                return Err(ActorError::Declaration {
                    actor: name.to_string(),
                    message: format!("setting 'start' must be a number, got {}", start.type_name()),
                });
            }
            actor = actor.with_setting("start", start.clone());
        }
        Ok(actor)
    }

    fn actor_type(&self) -> &str {
        "accumulate"
    }

    fn metadata(&self) -> ActorMetadata {
        ActorMetadata {
            description: "Emits the running total of its input values".to_string(),
            category: "arithmetic".to_string(),
            inputs: vec!["value".to_string()],
            outputs: vec!["total".to_string()],
        }
    }
}
