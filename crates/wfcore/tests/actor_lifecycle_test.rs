// crates/wfcore/tests/actor_lifecycle_test.rs

use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wfcore::{
    Actor, ActorBody, ActorError, ActorHooks, ActorRunner, ActorState, PortSignature, StepError,
    StepIo, Value, Variables,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn doubler() -> Actor {
    Actor::from_fn("Doubler", |io| {
        let x = io.input_i64("x")?;
        io.set_output("y", x * 2);
        Ok(())
    })
    .with_input(PortSignature::new("x").with_type("Integer"))
    .with_output(PortSignature::new("y"))
}

async fn bring_up(actor: &mut Actor) {
    actor.after_properties_set().unwrap();
    actor.elaborate().unwrap();
    actor.configure().unwrap();
    actor.initialize().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_order_is_enforced() {
    init_tracing();
    let mut actor = doubler();

    let err = actor.step().await.unwrap_err();
    assert!(matches!(err, ActorError::IllegalState { state: ActorState::Constructed, .. }));
    assert!(actor.configure().is_err(), "configure before elaborate");
    assert!(actor.initialize().await.is_err(), "initialize before configure");
    let err = actor.dispose().unwrap_err();
    assert!(matches!(err, ActorError::IllegalState { state: ActorState::Constructed, .. }));

    bring_up(&mut actor).await;
    assert_eq!(actor.state(), ActorState::Initialized);
    let err = actor.initialize().await.unwrap_err();
    assert!(matches!(err, ActorError::IllegalState { state: ActorState::Initialized, .. }));
    let err = actor.dispose().unwrap_err();
    assert!(matches!(err, ActorError::IllegalState { state: ActorState::Initialized, .. }));

    actor.set_input_value("x", Value::Integer(21)).unwrap();
    actor.step().await.unwrap();
    actor.step().await.unwrap();
    assert_eq!(actor.state(), ActorState::Stepped);
    assert_eq!(actor.output_value("y"), Some(&Value::Integer(42)));
    assert_eq!(actor.run_count(), 2);

    actor.wrapup().await.unwrap();
    assert!(actor.step().await.is_err(), "step after wrapup");
    actor.dispose().unwrap();
    assert_eq!(actor.state(), ActorState::Disposed);
    actor.dispose().unwrap();
    assert_eq!(actor.state(), ActorState::Disposed);
}

#[tokio::test]
async fn test_null_and_type_contracts() {
    let mut actor = doubler();
    bring_up(&mut actor).await;

    let err = actor.set_input_value("x", Value::Null).unwrap_err();
    assert!(matches!(err, ActorError::NullInput { ref input, .. } if input == "x"));

    actor.set_input_value("x", Value::from("seven")).unwrap();
    let err = actor.step().await.unwrap_err();
    assert!(matches!(err, ActorError::InputType { ref expected, .. } if expected == "Integer"));

    actor.set_input_value("x", Value::Integer(1)).unwrap();
    actor.step().await.unwrap();
    assert_eq!(actor.output_value("y"), Some(&Value::Integer(2)));
}

#[tokio::test]
async fn test_missing_output_is_a_null_output_error() {
    let mut actor = Actor::from_fn("Silent", |_io| Ok(()))
        .with_output(PortSignature::new("y"));
    bring_up(&mut actor).await;
    let err = actor.step().await.unwrap_err();
    assert!(matches!(err, ActorError::NullOutput { ref output, .. } if output == "y"));

    let mut nullable = Actor::from_fn("Quiet", |_io| Ok(()))
        .with_output(PortSignature::new("y").nullable());
    bring_up(&mut nullable).await;
    nullable.step().await.unwrap();
}

#[tokio::test]
async fn test_step_failure_names_actor_and_keeps_cause() {
    let mut actor = Actor::from_fn("Fragile", |io| {
        if io.input_i64("x")? < 0 {
            return Err(StepError::raise("NegativeInput", "x must not be negative"));
        }
        Ok(())
    })
    .with_input(PortSignature::new("x"));
    bring_up(&mut actor).await;

    actor.set_input_value("x", Value::Integer(-1)).unwrap();
    let err = actor.step().await.unwrap_err();
    assert_eq!(err.actor(), "Fragile");
    assert_eq!(err.kind(), "NegativeInput");
    let cause = err.source().expect("original cause");
    assert_eq!(cause.to_string(), "NegativeInput: x must not be negative");

    actor.set_input_value("x", Value::Integer(1)).unwrap();
    actor.step().await.expect("actor stays steppable after a failed step");
}

#[tokio::test]
async fn test_unresolved_required_hook_fails_configure() {
    let mut actor = doubler().requiring_hooks(ActorHooks {
        initialize: true,
        ..ActorHooks::STEP_ONLY
    });
    actor.after_properties_set().unwrap();
    actor.elaborate().unwrap();
    let err = actor.configure().unwrap_err();
    assert!(matches!(err, ActorError::Declaration { .. }));
    assert!(err.to_string().contains("initialize"));
}

struct Counting {
    initialized: Arc<AtomicUsize>,
    total: i64,
}

#[async_trait]
impl ActorBody for Counting {
    fn hooks(&self) -> ActorHooks {
        ActorHooks {
            initialize: true,
            ..ActorHooks::STEP_ONLY
        }
    }

    async fn initialize(&mut self, _io: &mut StepIo<'_>) -> Result<(), StepError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        self.total = 0;
        Ok(())
    }

    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        self.total += io.input_i64("x")?;
        io.set_output("total", self.total);
        Ok(())
    }
}

#[tokio::test]
async fn test_clone_uses_factory_and_leaves_master_untouched() {
    init_tracing();
    let initialized = Arc::new(AtomicUsize::new(0));
    let counter = initialized.clone();
    let mut master = Actor::new(
        "Counter",
        Counting {
            initialized: initialized.clone(),
            total: 0,
        },
    )
    .with_input(PortSignature::new("x"))
    .with_output(PortSignature::new("total"))
    .with_factory(move || {
        Ok(Box::new(Counting {
            initialized: counter.clone(),
            total: 0,
        }) as Box<dyn ActorBody>)
    });

    master.after_properties_set().unwrap();
    let err = master.clone_actor().unwrap_err();
    assert!(err.to_string().starts_with("cloning actor Counter failed"));
    assert_eq!(master.state(), ActorState::PropertiesSet);

    master.elaborate().unwrap();
    master.configure().unwrap();
    master.initialize().await.unwrap();
    assert_eq!(initialized.load(Ordering::SeqCst), 1);

    master.set_input_value("x", Value::Integer(5)).unwrap();
    let mut clone = master.clone_actor().unwrap();
    assert_eq!(clone.state(), ActorState::Constructed);
    clone.activate_clone().await.unwrap();
    assert_eq!(initialized.load(Ordering::SeqCst), 2, "fresh body is initialized");
    assert_eq!(clone.input_value("x"), Some(&Value::Integer(5)));

    let runner = ActorRunner::execute(clone, Variables::new(), 0).await;
    assert_eq!(runner.output_value("total"), Some(&Value::Integer(5)));
    assert_eq!(master.state(), ActorState::Initialized);
    assert_eq!(master.run_count(), 0);
}

#[tokio::test]
async fn test_runner_captures_panics() {
    init_tracing();
    let mut actor = Actor::from_fn("Panicky", |_io| panic!("boom"));
    bring_up(&mut actor).await;

    let handle = ActorRunner::start(actor, Variables::new());
    let runner = handle.wait_for_completion().await.unwrap();
    let err = runner.exception().expect("captured panic");
    assert_eq!(err.actor(), "Panicky");
    assert!(err.to_string().contains("boom"));
    assert_eq!(runner.actor().map(Actor::state), Some(ActorState::Stepped));
}
