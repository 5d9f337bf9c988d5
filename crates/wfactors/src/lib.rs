//! Standard actor library
//!
//! Collection of built-in actors for common operations

mod arithmetic;
mod debug;
mod time;
mod transform;

pub use arithmetic::{AccumulateActorFactory, AddActorFactory, DivideActorFactory, MultiplyActorFactory};
pub use debug::LogActorFactory;
pub use time::{DelayActor, DelayActorFactory};
pub use transform::{
    ConcatActorFactory, ConstantActorFactory, FilterActorFactory, JsonParseActorFactory, RelayActorFactory,
};
use wfruntime::ActorRegistry;

use std::sync::Arc;

/// Register all standard actors with a registry
pub fn register_all(registry: &mut ActorRegistry) {
    registry.register(Arc::new(arithmetic::AddActorFactory));
    registry.register(Arc::new(arithmetic::MultiplyActorFactory));
    registry.register(Arc::new(arithmetic::DivideActorFactory));
    registry.register(Arc::new(arithmetic::AccumulateActorFactory));
    registry.register(Arc::new(debug::LogActorFactory));
    registry.register(Arc::new(time::DelayActorFactory));
    registry.register(Arc::new(transform::RelayActorFactory));
    registry.register(Arc::new(transform::ConstantActorFactory));
    registry.register(Arc::new(transform::FilterActorFactory));
    registry.register(Arc::new(transform::ConcatActorFactory));
    registry.register(Arc::new(transform::JsonParseActorFactory));
}

/// A registry holding every standard actor
pub fn standard_registry() -> ActorRegistry {
    let mut registry = ActorRegistry::new();
    register_all(&mut registry);
    registry
}
