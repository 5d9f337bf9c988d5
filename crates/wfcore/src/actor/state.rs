use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an actor; each transition requires its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorState {
    Constructed,
    PropertiesSet,
    Elaborated,
    Configured,
    Initialized,
    Stepped,
    WrappedUp,
    Disposed,
}

impl ActorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorState::Constructed => "CONSTRUCTED",
            ActorState::PropertiesSet => "PROPERTIES_SET",
            ActorState::Elaborated => "ELABORATED",
            ActorState::Configured => "CONFIGURED",
            ActorState::Initialized => "INITIALIZED",
            ActorState::Stepped => "STEPPED",
            ActorState::WrappedUp => "WRAPPED_UP",
            ActorState::Disposed => "DISPOSED",
        }
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
