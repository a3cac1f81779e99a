//! Ephemeral session store for the agent-relay backend.
//!
//! Provides:
//! - `SessionStore` - Per-conversation session lifecycle with sliding TTL
//! - `SharedStore` - The low-latency shared store seam (memory, Redis)
//! - `SandboxClient` - Best-effort teardown of attached execution resources

pub mod backend;
pub mod sandbox;
pub mod store;

pub use backend::{SharedStore, StoreError};
pub use sandbox::{HttpSandboxClient, NoopSandboxClient, SandboxClient, SandboxError};
pub use store::{Session, SessionConfig, SessionError, SessionStore};
