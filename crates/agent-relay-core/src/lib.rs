//! Core types and trait seams for the agent-relay backend.
//!
//! This crate provides the fundamental building blocks:
//! - `ClientEvent` - Typed server-to-client event protocol
//! - `RunChunk` / `RunMetrics` - Agent run collaborator wire types
//! - `Media` / `TurnMedia` - Binary media attached to a message turn
//! - Trait seams: push channel, agent runner, auth, metrics, media store

pub mod auth;
pub mod event;
pub mod media;
pub mod traits;

pub use auth::{AuthErrorKind, AuthVerifier, AuthenticatedUser, StaticTokenVerifier};
pub use event::{ClientEvent, RunChunk, RunMetrics, StepKind, TaskRunStatus};
pub use media::{FileRef, Media, MediaKind, TurnMedia};
pub use traits::{
    AgentRun, AgentRunner, ClientSink, ContextSource, MediaStore, MemoryMetrics, MetricsSink,
    NoopContextSource, RunRequest,
};
