//! Distributed remote-command bridge.
//!
//! Provides:
//! - `CommandBridge` - Correlate an outbound client command with its
//!   out-of-band reply across a stateless worker fleet
//! - `PubSub` - The shared pub/sub seam (memory, Redis)

pub mod bridge;
pub mod pubsub;

pub use bridge::{BridgeConfig, BridgeError, CommandBridge, CommandOutcome, RemoteCommand};
pub use pubsub::{PubSub, PubSubError, Subscription};
