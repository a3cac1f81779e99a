//! Turn orchestration for live conversations.
//!
//! Provides:
//! - `TurnComposer` - Assemble a run request from an inbound message
//!   (session lookup, media materialization, historical context)
//! - `StreamMultiplexer` - Flatten a tree-shaped agent run into one
//!   ordered client event sequence per message turn

pub mod classify;
pub mod multiplexer;
pub mod turn;

pub use classify::{ContentClass, StreamEvent};
pub use multiplexer::{StreamConfig, StreamMultiplexer};
pub use turn::{TurnComposer, TurnError, TurnInput};
