//! The application context.
//!
//! Every collaborator is constructed once at process start and handed to
//! handlers through this bundle; nothing is reached ambiently.

use std::sync::Arc;

use agent_relay_bridge::{CommandBridge, PubSub};
use agent_relay_core::auth::AuthVerifier;
use agent_relay_session::SessionStore;
use agent_relay_stream::{StreamMultiplexer, TurnComposer};

/// Shared per-process application state.
pub struct AppContext {
    pub verifier: Arc<dyn AuthVerifier>,
    pub sessions: Arc<SessionStore>,
    pub composer: Arc<TurnComposer>,
    pub multiplexer: Arc<StreamMultiplexer>,
    pub bridge: Arc<CommandBridge>,
    /// Shared pub/sub layer; command replies are published here.
    pub pubsub: Arc<dyn PubSub>,
}

impl AppContext {
    /// Bundle the collaborators for handler injection.
    pub fn new(
        verifier: Arc<dyn AuthVerifier>,
        sessions: Arc<SessionStore>,
        composer: Arc<TurnComposer>,
        multiplexer: Arc<StreamMultiplexer>,
        bridge: Arc<CommandBridge>,
        pubsub: Arc<dyn PubSub>,
    ) -> Self {
        Self {
            verifier,
            sessions,
            composer,
            multiplexer,
            bridge,
            pubsub,
        }
    }
}
